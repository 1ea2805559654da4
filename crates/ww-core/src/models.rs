//! # Domain Models
//!
//! These structs represent the core entities of WasteWise and the logical
//! document schema they are persisted under. Field names on the wire match
//! the stored documents (`binLocation`, `reportText`, ...), so a document
//! either decodes into one of these types or is rejected at the boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub type BinId = String;
pub type ReportId = String;
pub type ImageId = String;
pub type UserId = String;

/// Collection names in the document store.
pub mod collections {
    pub const BINS: &str = "bins";
    pub const REPORTS: &str = "reports";
    pub const BIN_IMAGES: &str = "bin_images";
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns `true` if latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Category labels a bin accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteType {
    #[serde(rename = "General Trash")]
    GeneralTrash,
    #[serde(rename = "General Recyclables")]
    GeneralRecyclables,
    #[serde(rename = "E-waste")]
    EWaste,
    #[serde(rename = "Hazardous Waste")]
    HazardousWaste,
}

impl WasteType {
    pub const ALL: [WasteType; 4] = [
        WasteType::GeneralTrash,
        WasteType::GeneralRecyclables,
        WasteType::EWaste,
        WasteType::HazardousWaste,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WasteType::GeneralTrash => "General Trash",
            WasteType::GeneralRecyclables => "General Recyclables",
            WasteType::EWaste => "E-waste",
            WasteType::HazardousWaste => "Hazardous Waste",
        }
    }

    /// Case-insensitive lookup by display label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reserved moderation flag on a bin. Stored as `null`/`true`/`false`.
/// Nothing transitions it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum ApprovalState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl From<Option<bool>> for ApprovalState {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => ApprovalState::Pending,
            Some(true) => ApprovalState::Approved,
            Some(false) => ApprovalState::Rejected,
        }
    }
}

impl From<ApprovalState> for Option<bool> {
    fn from(value: ApprovalState) -> Self {
        match value {
            ApprovalState::Pending => None,
            ApprovalState::Approved => Some(true),
            ApprovalState::Rejected => Some(false),
        }
    }
}

/// A physical waste-disposal location recorded by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    #[serde(rename = "binLocation")]
    pub location: Coordinate,
    #[serde(rename = "binDescription", default)]
    pub description: Option<String>,
    #[serde(rename = "binImageId")]
    pub image_id: ImageId,
    #[serde(rename = "binType", default)]
    pub types: Vec<WasteType>,
    #[serde(rename = "addedBy")]
    pub added_by: UserId,
    #[serde(rename = "binApproval", default)]
    pub approval: ApprovalState,
    #[serde(rename = "dateAdded")]
    pub created_at: DateTime<Utc>,
}

impl Bin {
    pub fn accepts(&self, waste_type: WasteType) -> bool {
        self.types.contains(&waste_type)
    }
}

/// Caller-supplied fields for a new bin. `created_at` is stamped by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct BinDraft {
    pub location: Coordinate,
    pub description: Option<String>,
    pub image_id: ImageId,
    pub types: Vec<WasteType>,
    pub added_by: UserId,
}

/// A community claim that a bin's information needs attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub bin_id: BinId,
    #[serde(rename = "reportText")]
    pub text: String,
    #[serde(rename = "uid", default)]
    pub submitted_by: Option<UserId>,
    pub true_count: u32,
    pub false_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Stored image bytes for a bin, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinImage {
    pub filename: String,
    #[serde(rename = "base64Data")]
    pub encoded_data: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Post-increment counters of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub true_count: u32,
    pub false_count: u32,
}

/// A record paired with the identifier the store assigned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

/// A bin joined with its reports and resolved image, as delivered to map clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinView {
    pub id: BinId,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub types: Vec<WasteType>,
    pub bin_image_id: ImageId,
    pub base64_image: Option<String>,
    pub reports: Vec<Stored<Report>>,
}

/// One label/confidence pair from an image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

/// Image bytes normalized for upload, plus the filename to record.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A raw document as held by a `DocumentStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self { id: id.into(), data }
    }

    /// Deserializes the document body into a typed record.
    /// Missing or mistyped fields are an error rather than a default.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<Stored<T>> {
        let record = T::deserialize(&self.data)?;
        Ok(Stored {
            id: self.id.clone(),
            record,
        })
    }
}
