//! Asset Generation
//!
//! Thin facade over the symbol encoders and the image fetcher. Every asset
//! comes back with its intrinsic size; placement never looks inside the
//! content.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use barcoders::generators::image::{Color, Image, Rotation};
use barcoders::sym::code128::Code128;
use datamatrix::{DataMatrix, SymbolList};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::request::AssetKind;
use crate::storage::{Locator, Storage, StorageError};
use crate::template::{Element, SVG_NS};

/// Code 128 character-set B selector understood by the encoder.
const CODE128_SET_B: char = 'Ɓ';

const FALLBACK_MIME: &str = "image/png";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Barcode encoding failed for {data:?}: {reason}")]
    Barcode { data: String, reason: String },

    #[error("Data Matrix encoding failed for {data:?}: {reason}")]
    Matrix { data: String, reason: String },

    #[error("Image fetch failed: {0}")]
    Fetch(#[from] StorageError),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetContent {
    /// An `<svg>` element whose children are inserted into the template
    Vector(Element),
    Raster { bytes: Vec<u8>, mime: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAsset {
    pub width: f64,
    pub height: f64,
    pub content: AssetContent,
}

impl GeneratedAsset {
    /// Wrap raster bytes, sniffing format and pixel size from the header.
    /// A header too short to carry a size gives 0×0.
    pub fn raster(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .unwrap_or((0, 0));
        Self {
            width: width as f64,
            height: height as f64,
            content: AssetContent::Raster { bytes, mime },
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.content, AssetContent::Vector(_))
    }
}

pub trait AssetGenerator: Send + Sync {
    /// Code 128 raster without human-readable text.
    fn barcode(&self, data: &str) -> Result<GeneratedAsset, AssetError>;

    /// Data Matrix as vector markup: one unit square per dark module.
    fn matrix(&self, data: &str) -> Result<GeneratedAsset, AssetError>;

    /// Fetch a raster image. `scratch` is the invocation's private directory.
    fn image(&self, locator: &str, scratch: &Path) -> Result<GeneratedAsset, AssetError>;

    fn generate(
        &self,
        kind: AssetKind,
        input: &str,
        scratch: &Path,
    ) -> Result<GeneratedAsset, AssetError> {
        match kind {
            AssetKind::Barcode => self.barcode(input),
            AssetKind::Matrix => self.matrix(input),
            AssetKind::Image => self.image(input, scratch),
        }
    }
}

/// Default generator backed by `barcoders`, `datamatrix` and [`Storage`].
pub struct SymbolGenerator {
    storage: Arc<Storage>,
    barcode_height: u32,
    barcode_xdim: u32,
}

impl SymbolGenerator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            barcode_height: 80,
            barcode_xdim: 2,
        }
    }

    pub fn with_barcode_geometry(mut self, height: u32, xdim: u32) -> Self {
        self.barcode_height = height;
        self.barcode_xdim = xdim.max(1);
        self
    }
}

impl AssetGenerator for SymbolGenerator {
    fn barcode(&self, data: &str) -> Result<GeneratedAsset, AssetError> {
        let fail = |reason: String| AssetError::Barcode {
            data: data.to_string(),
            reason,
        };
        let symbol = Code128::new(format!("{}{}", CODE128_SET_B, data))
            .map_err(|e| fail(format!("{:?}", e)))?;
        let png = Image::PNG {
            height: self.barcode_height,
            xdim: self.barcode_xdim,
            rotation: Rotation::Zero,
            foreground: Color::new([0, 0, 0, 255]),
            background: Color::new([255, 255, 255, 255]),
        };
        let bytes = png
            .generate(&symbol.encode()[..])
            .map_err(|e| fail(format!("{:?}", e)))?;
        let asset = GeneratedAsset::raster(bytes);
        debug!(width = asset.width, height = asset.height, "barcode generated");
        Ok(asset)
    }

    fn matrix(&self, data: &str) -> Result<GeneratedAsset, AssetError> {
        let symbol = DataMatrix::encode(data.as_bytes(), SymbolList::default()).map_err(|e| {
            AssetError::Matrix {
                data: data.to_string(),
                reason: format!("{:?}", e),
            }
        })?;
        let bitmap = symbol.bitmap();
        let asset = module_grid(bitmap.width(), bitmap.height(), bitmap.pixels());
        debug!(width = asset.width, height = asset.height, "matrix generated");
        Ok(asset)
    }

    fn image(&self, locator: &str, scratch: &Path) -> Result<GeneratedAsset, AssetError> {
        let locator = Locator::parse(locator)?;
        let bytes = match &locator {
            Locator::Object { .. } => {
                let name = format!(
                    "image-{}-{}",
                    Uuid::new_v4().simple(),
                    locator.file_name().unwrap_or("download")
                );
                let path = self.storage.download_to(&locator, &scratch.join(name))?;
                fs::read(path)?
            }
            _ => self.storage.fetch(&locator)?,
        };
        let asset = GeneratedAsset::raster(bytes);
        debug!(%locator, width = asset.width, height = asset.height, "image fetched");
        Ok(asset)
    }
}

/// Build the vector asset for a module grid from dark-module coordinates.
pub fn module_grid(
    width: usize,
    height: usize,
    dark: impl IntoIterator<Item = (usize, usize)>,
) -> GeneratedAsset {
    let mut svg = Element::new("svg")
        .with_attr("xmlns", SVG_NS)
        .with_attr("width", width.to_string())
        .with_attr("height", height.to_string());
    for (x, y) in dark {
        svg = svg.with_child(
            Element::new("rect")
                .with_attr("x", x.to_string())
                .with_attr("y", y.to_string())
                .with_attr("width", "1")
                .with_attr("height", "1")
                .with_attr("fill", "black"),
        );
    }
    GeneratedAsset {
        width: width as f64,
        height: height as f64,
        content: AssetContent::Vector(svg),
    }
}
