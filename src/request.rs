//! Render Requests - Invocation Payload
//!
//! One JSON payload describes one document: the template locator, the data
//! record, the code/image specs and where the result goes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{display_value, resolve, resolve_truthy};

/// Binding path used to name the output document when the payload gives none.
pub const DEFAULT_OUTPUT_NAME: &str = "item.orderItemId";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template_path: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(default)]
    pub barcodes: Vec<AssetSpec>,
    #[serde(default)]
    pub matrixcodes: Vec<AssetSpec>,
    #[serde(default)]
    pub images: Vec<AssetSpec>,
    #[serde(default)]
    pub output_path: String,
    #[serde(default)]
    pub output_bucket: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,

    /// The payload exactly as received, for whole-payload path lookups
    #[serde(skip)]
    payload: Value,
}

impl RenderRequest {
    pub fn from_value(payload: Value) -> Result<Self, serde_json::Error> {
        let mut request: RenderRequest = serde_json::from_value(payload.clone())?;
        request.payload = payload;
        Ok(request)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Specs in processing order: barcodes, matrix codes, images.
    pub fn specs(&self) -> impl Iterator<Item = (AssetKind, &AssetSpec)> {
        let barcodes = self.barcodes.iter().map(|s| (AssetKind::Barcode, s));
        let matrices = self.matrixcodes.iter().map(|s| (AssetKind::Matrix, s));
        let images = self.images.iter().map(|s| (AssetKind::Image, s));
        barcodes.chain(matrices).chain(images)
    }

    /// Resolve an asset data path: `variables` first, then the whole payload.
    pub fn resolve_data(&self, path: &str) -> Option<&Value> {
        resolve_truthy(&[&self.variables, &self.payload], path)
    }

    /// Work out where the rendered document is written.
    pub fn destination(&self, fallback_name: &str, default_output_name: &str) -> Destination {
        let name_path = self.output_name.as_deref().unwrap_or(default_output_name);
        let name = resolve_truthy(&[&self.variables], name_path)
            .map(display_value)
            .unwrap_or_else(|| fallback_name.to_string());
        let file_name = format!("{}.pdf", name);

        let bucket = self.output_bucket.clone().or_else(|| {
            resolve(&self.variables, "bucket")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let prefix = self.output_path.trim_end_matches('/');
        match bucket {
            Some(bucket) => {
                let key = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{}/{}", prefix.trim_start_matches('/'), file_name)
                };
                Destination::Object { bucket, key }
            }
            None if prefix.to_ascii_lowercase().ends_with(".pdf") => {
                Destination::Locator(prefix.to_string())
            }
            None if prefix.is_empty() => Destination::Locator(file_name),
            None => Destination::Locator(format!("{}/{}", prefix, file_name)),
        }
    }
}

/// Where the finished document is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Object { bucket: String, key: String },
    /// Local path or `s3://` locator
    Locator(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Destination::Locator(locator) => f.write_str(locator),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Barcode,
    Matrix,
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Barcode => "barcode",
            AssetKind::Matrix => "matrix",
            AssetKind::Image => "image",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot ids may be written as strings or bare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRef {
    Name(String),
    Number(serde_json::Number),
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRef::Name(name) => f.write_str(name),
            SlotRef::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Target image slot id
    #[serde(default)]
    pub id: Option<SlotRef>,
    /// Binding path for the encoded data (or, for images, the locator)
    #[serde(default)]
    pub data: Option<String>,
    /// Direct image locator
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub attributes: AssetAttributes,
}

impl AssetSpec {
    pub fn slot_id(&self) -> Option<String> {
        self.id.as_ref().map(|id| id.to_string()).filter(|id| !id.is_empty())
    }

    /// The string to encode (barcode, matrix) or fetch (image), if any.
    ///
    /// `None` means the asset spec is skipped: its data path resolved to nothing.
    pub fn input(&self, kind: AssetKind, request: &RenderRequest) -> Option<String> {
        if kind == AssetKind::Image {
            if let Some(source) = self.source.as_deref().filter(|s| !s.is_empty()) {
                return Some(source.to_string());
            }
        }
        let path = self.data.as_deref()?;
        request.resolve_data(path).map(display_value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetAttributes {
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: Offset,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for AssetAttributes {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            offset: Offset::default(),
        }
    }
}

/// Directional deltas. Only `right` and `down` move the asset; `top` and
/// `bottom` are accepted and carried but have no effect on placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Offset {
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub down: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub bottom: f64,
}
