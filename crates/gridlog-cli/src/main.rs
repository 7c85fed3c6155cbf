//! Gridlog CLI - capture utility meter readings from the terminal
//!
//! Readings and photos captured here land in the local durable queue and
//! drain to the remote stores on `gridlog sync`.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gridlog_core::db::{Database, LibSqlPhotoQueue, LibSqlReadingQueue};
use gridlog_core::gateway::{
    HttpRecordGateway, RecordGateway, RecordsApiConfig, S3BlobGateway, S3Config,
};
use gridlog_core::models::{PendingReading, QueuedPhoto, PENDING_READING_ID};
use gridlog_core::sync::{DrainOutcome, TracingNotifier};
use gridlog_core::{Reading, SyncService, TempId};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "gridlog")]
#[command(about = "Offline-first capture for utility meter readings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a reading captured as JSON (from a file or stdin)
    Add {
        /// Path to a reading JSON document; stdin when omitted
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Queue a photo for a reading
    Photo {
        /// Temp id, server id, or PENDING when no reading exists yet
        #[arg(long, default_value = PENDING_READING_ID)]
        reading_id: String,
        /// Path to the image file
        path: PathBuf,
    },
    /// List queued readings and photos
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending counts
    Status,
    /// Delete a reading and its queued photos
    Delete {
        /// Temp id (local delete) or server id (remote delete)
        reading_id: String,
    },
    /// Drain the offline queues to the remote stores
    Sync,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] gridlog_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No reading JSON provided (pass --file or pipe to stdin)")]
    EmptyReadingInput,
    #[error(
        "Sync is not configured. Set GRIDLOG_API_BASE_URL and the GRIDLOG_S3_* variables to enable `gridlog sync`."
    )]
    SyncNotConfigured,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridlog=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { file } => run_add(file.as_deref(), &db_path).await?,
        Commands::Photo { reading_id, path } => run_photo(&reading_id, &path, &db_path).await?,
        Commands::Queue { json } => run_queue(json, &db_path).await?,
        Commands::Status => run_status(&db_path).await?,
        Commands::Delete { reading_id } => run_delete(&reading_id, &db_path).await?,
        Commands::Sync => run_sync(&db_path).await?,
    }

    Ok(())
}

fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(path) = std::env::var("GRIDLOG_DB_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridlog")
        .join("gridlog.db")
}

async fn open_database(db_path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(db_path).await?)
}

async fn run_add(file: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            if io::stdin().is_terminal() {
                return Err(CliError::EmptyReadingInput);
            }
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    if raw.trim().is_empty() {
        return Err(CliError::EmptyReadingInput);
    }

    let payload: Reading = serde_json::from_str(&raw)?;
    payload.validate()?;

    let db = open_database(db_path).await?;
    let queue = LibSqlReadingQueue::new(db.connection());
    let temp_id = queue.enqueue(&payload).await?;

    println!("{temp_id}");
    Ok(())
}

async fn run_photo(reading_id: &str, path: &Path, db_path: &Path) -> Result<(), CliError> {
    let content = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map_or_else(|| "photo".to_string(), |name| name.to_string_lossy().to_string());
    let mime_type = guess_mime_type(&file_name);
    let local_ref = format!("local-{}", Uuid::now_v7());

    let db = open_database(db_path).await?;
    let queue = LibSqlPhotoQueue::new(db.connection());
    queue
        .enqueue(reading_id, &content, &local_ref, &file_name, mime_type)
        .await?;

    println!("{local_ref}");
    Ok(())
}

fn guess_mime_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

#[derive(Debug, Serialize)]
struct QueueView {
    readings: Vec<ReadingView>,
    photos: Vec<PhotoView>,
}

#[derive(Debug, Serialize)]
struct ReadingView {
    temp_id: String,
    meter_no: String,
    customer_name: String,
    queued_at: i64,
}

#[derive(Debug, Serialize)]
struct PhotoView {
    local_ref: String,
    reading_id: String,
    file_name: String,
    size_bytes: usize,
    corrupt: bool,
}

fn reading_view(pending: &PendingReading) -> ReadingView {
    ReadingView {
        temp_id: pending.temp_id.as_str().to_string(),
        meter_no: pending.payload.meter_no.clone(),
        customer_name: pending.payload.customer_name.clone(),
        queued_at: pending.queued_at,
    }
}

fn photo_view(photo: &QueuedPhoto) -> PhotoView {
    PhotoView {
        local_ref: photo.local_ref.clone(),
        reading_id: photo.reading_id.clone(),
        file_name: photo.file_name.clone(),
        size_bytes: photo.content.as_ref().map_or(0, Vec::len),
        corrupt: photo.content.is_none(),
    }
}

async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let readings = LibSqlReadingQueue::new(db.connection());
    let photos = LibSqlPhotoQueue::new(db.connection());

    let view = QueueView {
        readings: readings.list_all().await?.iter().map(reading_view).collect(),
        photos: photos.list_all().await?.iter().map(photo_view).collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if view.readings.is_empty() && view.photos.is_empty() {
        println!("Nothing queued.");
        return Ok(());
    }

    for reading in &view.readings {
        println!(
            "reading {}  meter {}  customer {}",
            reading.temp_id, reading.meter_no, reading.customer_name
        );
    }
    for photo in &view.photos {
        let note = if photo.corrupt { "  [corrupt]" } else { "" };
        println!(
            "photo   {}  reading {}  {} ({} bytes){note}",
            photo.local_ref, photo.reading_id, photo.file_name, photo.size_bytes
        );
    }
    Ok(())
}

async fn run_status(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let readings = LibSqlReadingQueue::new(db.connection());
    let photos = LibSqlPhotoQueue::new(db.connection());

    println!(
        "{} reading(s) and {} photo(s) pending sync",
        readings.len().await?,
        photos.len().await?
    );
    Ok(())
}

async fn run_delete(reading_id: &str, db_path: &Path) -> Result<(), CliError> {
    if TempId::is_temp(reading_id) {
        let temp_id: TempId = reading_id.parse()?;

        let db = open_database(db_path).await?;
        let readings = LibSqlReadingQueue::new(db.connection());
        let photos = LibSqlPhotoQueue::new(db.connection());
        readings.remove(&temp_id).await?;
        let dropped = photos.remove_all_for_reading(temp_id.as_str()).await?;

        println!("Removed {temp_id} and {dropped} queued photo(s)");
        return Ok(());
    }

    // Synced reading: delete remotely, then drop any still-queued photos
    let config = RecordsApiConfig::from_env()?.ok_or(CliError::SyncNotConfigured)?;
    let records = HttpRecordGateway::new(config)?;
    records.delete(reading_id).await?;

    let db = open_database(db_path).await?;
    let photos = LibSqlPhotoQueue::new(db.connection());
    let dropped = photos.remove_all_for_reading(reading_id).await?;

    println!("Deleted {reading_id} and removed {dropped} queued photo(s)");
    Ok(())
}

async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let records_config = RecordsApiConfig::from_env()?.ok_or(CliError::SyncNotConfigured)?;
    let s3_config = S3Config::from_env()?.ok_or(CliError::SyncNotConfigured)?;

    let records = HttpRecordGateway::new(records_config)?;
    let blobs = S3BlobGateway::new(s3_config);
    let service = SyncService::open_path(db_path, records, blobs, TracingNotifier).await?;

    let drain = service.trigger_sync_now().await?;
    match drain {
        DrainOutcome::AlreadyRunning => println!("A sync is already running."),
        DrainOutcome::Completed(outcome) => {
            println!(
                "Synced {} reading(s) and {} photo(s); {} reading(s) and {} photo(s) still pending; {} photo(s) discarded.",
                outcome.records_synced,
                outcome.photos_synced,
                outcome.records_failed,
                outcome.photos_failed,
                outcome.photos_discarded
            );
        }
    }
    let (readings, photos) = service.pending_counts().await?;
    if readings + photos > 0 {
        println!("{readings} reading(s) and {photos} photo(s) remain queued.");
    }
    println!("Sync state: {}", drain.state());
    Ok(())
}
