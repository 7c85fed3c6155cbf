//! Meter reading payload model

use serde::{Deserialize, Serialize};

/// Whether the technician could access the customer's meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerAccess {
    Yes,
    No,
}

/// Billing tariff class for the metered premises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffClass {
    Residential,
    Commercial,
}

/// Primary activity observed at the premises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Residential,
    Factory,
    Church,
    School,
    Shop,
}

/// Electrical phase of the installed meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "1ph")]
    Single,
    #[serde(rename = "3ph")]
    Three,
}

/// Workflow status of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Pending,
    Completed,
    Anomaly,
}

/// A utility meter reading as captured in the field.
///
/// This is the payload sent to the remote record store; it never carries
/// the server-assigned identifier. Wire names are camelCase to match the
/// remote document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Capture timestamp (ISO 8601).
    pub date_time: String,
    pub customer_access: CustomerAccess,
    pub meter_no: String,
    pub region: String,
    pub district: String,
    /// GPS coordinates as "lat,lng".
    pub gps_location: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_contact: String,
    /// Service point number.
    #[serde(default)]
    pub spn: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub geo_code: String,
    pub tariff_class: TariffClass,
    pub activities: Activity,
    pub phase: Phase,
    /// Meter register value in kWh.
    pub reading: f64,
    #[serde(default)]
    pub credit_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<String>,
    #[serde(default)]
    pub area_location: String,
    #[serde(default)]
    pub remarks: String,
    /// Photo locators: local refs while queued, durable URLs once synced.
    #[serde(default)]
    pub photos: Vec<String>,
    pub technician: String,
    pub status: ReadingStatus,
}

impl Reading {
    /// Validate the fields the remote store requires before enqueueing.
    pub fn validate(&self) -> crate::Result<()> {
        let mut missing = Vec::new();
        if self.meter_no.trim().is_empty() {
            missing.push("meterNo");
        }
        if self.customer_name.trim().is_empty() {
            missing.push("customerName");
        }
        if self.gps_location.trim().is_empty() {
            missing.push("gpsLocation");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Reading is missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}
