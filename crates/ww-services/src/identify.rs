//! # Waste identification
//!
//! Maps image-classifier labels onto a material category with disposal
//! advice and the bin category that accepts it.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use log::{debug, info};
use serde::Serialize;
use ww_core::{AppError, ImageLabeler, Prediction, Result, WasteType};

/// Predictions at or above this score are also matched word by word.
pub const HIGH_CONFIDENCE: f64 = 0.8;
/// Predictions below this score are ignored by label matching.
pub const MIN_CONFIDENCE: f64 = 0.05;
/// Score a "garbage" label needs to count as mixed waste.
pub const GARBAGE_FALLBACK_SCORE: f64 = 0.9;

/// Label fragments shorter than this are not matched.
const MIN_FRAGMENT_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Material {
    Plastic,
    Glass,
    Paper,
    #[serde(rename = "e-waste")]
    EWaste,
    Food,
    Metal,
    #[serde(rename = "mixed waste")]
    MixedWaste,
}

impl Material {
    pub fn label(&self) -> &'static str {
        match self {
            Material::Plastic => "plastic",
            Material::Glass => "glass",
            Material::Paper => "paper",
            Material::EWaste => "e-waste",
            Material::Food => "food",
            Material::Metal => "metal",
            Material::MixedWaste => "mixed waste",
        }
    }

    pub fn disposal(&self) -> &'static str {
        match self {
            Material::Plastic => "Recycle in plastic bins.",
            Material::Glass => "Recycle in glass bins.",
            Material::Paper => "Recycle in paper bins.",
            Material::EWaste => "Dispose of at e-waste collection centers.",
            Material::Food => "Compost or dispose of in food waste bins.",
            Material::Metal => "Recycle in metal bins.",
            Material::MixedWaste => {
                "Separate recyclables and dispose of according to local regulations."
            }
        }
    }

    /// The bin category to look for when disposing of this material.
    pub fn bin_type(&self) -> WasteType {
        match self {
            Material::Plastic | Material::Glass | Material::Paper | Material::Metal => {
                WasteType::GeneralRecyclables
            }
            Material::EWaste => WasteType::EWaste,
            Material::Food | Material::MixedWaste => WasteType::GeneralTrash,
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifier labels (lowercase) and the material they indicate. Order
/// matters: the first matching entry wins.
const CATEGORY_MAP: &[(&str, Material)] = &[
    ("pop bottle, soda bottle", Material::Plastic),
    ("water bottle", Material::Plastic),
    ("beer glass", Material::Glass),
    ("soap dispenser", Material::Plastic),
    ("newspaper", Material::Paper),
    ("laptop", Material::EWaste),
    ("notebook, notebook computer", Material::EWaste),
    ("battery", Material::EWaste),
    ("food scraps", Material::Food),
    ("apple core", Material::Food),
    ("plastic bag", Material::Plastic),
    ("aluminum can", Material::Metal),
    ("cardboard box", Material::Paper),
    ("carton", Material::Paper),
    ("trash can", Material::Plastic),
    ("garbage can", Material::Plastic),
    ("wastebin", Material::Plastic),
    ("ashcan", Material::Plastic),
    ("dustbin", Material::Plastic),
    ("trash barrel", Material::Plastic),
    ("trash bin", Material::Plastic),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    pub material: Material,
    pub confidence: f64,
    pub disposal: &'static str,
    pub bin_type: WasteType,
}

impl Identification {
    fn new(material: Material, confidence: f64) -> Self {
        Self {
            material,
            confidence,
            disposal: material.disposal(),
            bin_type: material.bin_type(),
        }
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn match_fragments(label: &str) -> Option<Material> {
    label
        .split(|c: char| c == ',' || c == '/' || c == '-' || c.is_whitespace())
        .map(str::trim)
        .filter(|part| part.chars().count() >= MIN_FRAGMENT_CHARS)
        .find_map(|part| {
            CATEGORY_MAP
                .iter()
                .find(|(key, _)| overlaps(key, part))
                .map(|(_, material)| *material)
        })
}

fn match_label(label: &str) -> Option<Material> {
    CATEGORY_MAP
        .iter()
        .find(|(key, _)| *key == label)
        .or_else(|| CATEGORY_MAP.iter().find(|(key, _)| overlaps(label, key)))
        .map(|(_, material)| *material)
}

/// Picks a material for a set of predictions, in classifier order.
///
/// Each prediction is tried in turn: fragment matching when it is highly
/// confident, then whole-label matching when it clears [`MIN_CONFIDENCE`].
/// If none match, any label mentioning trash or waste, or a very confident
/// "garbage" label, is reported as mixed waste.
pub fn identify(predictions: &[Prediction]) -> Option<Identification> {
    for p in predictions {
        let label = p.label.trim().to_lowercase();
        if label.is_empty() {
            continue;
        }
        let mut material = None;
        if p.score >= HIGH_CONFIDENCE {
            material = match_fragments(&label);
        }
        if material.is_none() && p.score >= MIN_CONFIDENCE {
            material = match_label(&label);
        }
        if let Some(material) = material {
            debug!("label {:?} ({:.2}) identified as {}", p.label, p.score, material);
            return Some(Identification::new(material, p.score));
        }
    }

    predictions
        .iter()
        .find(|p| {
            let label = p.label.to_lowercase();
            (p.score > GARBAGE_FALLBACK_SCORE && label.contains("garbage"))
                || label.contains("trash")
                || label.contains("waste")
        })
        .map(|p| Identification::new(Material::MixedWaste, p.score))
}

pub struct WasteIdentifier {
    labeler: Arc<dyn ImageLabeler>,
}

impl WasteIdentifier {
    pub fn new(labeler: Arc<dyn ImageLabeler>) -> Self {
        Self { labeler }
    }

    /// Classifies a photo and identifies the item in it. `None` means
    /// nothing recognizable as waste was found.
    pub async fn identify_image(&self, image: &[u8]) -> Result<Option<Identification>> {
        if image.is_empty() {
            return Err(AppError::Validation("a photo of the item is required".into()));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let predictions = self
            .labeler
            .labels(&encoded)
            .await
            .map_err(AppError::network)?;
        let found = identify(&predictions);
        match &found {
            Some(id) => info!("identified {} ({:.2})", id.material, id.confidence),
            None => info!("no waste identified among {} labels", predictions.len()),
        }
        Ok(found)
    }
}
