//! Rasterization - Composed SVG to PDF
//!
//! The page takes the drawing's own size, with content anchored at the page
//! origin.

use std::fs;
use std::path::Path;

use svg2pdf::usvg;
use svg2pdf::{ConversionOptions, PageOptions};
use thiserror::Error;
use tracing::debug;

use crate::template::Template;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("Composed SVG rejected by renderer: {0}")]
    Svg(String),

    #[error("PDF conversion failed: {0}")]
    Conversion(String),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Rasterizer: Send + Sync {
    /// Render the composed template. `scratch` is the invocation's private
    /// directory for intermediate files.
    fn rasterize(&self, template: &Template, scratch: &Path) -> Result<Vec<u8>, RasterizeError>;
}

/// `usvg` + `svg2pdf` renderer.
pub struct PdfRasterizer {
    load_system_fonts: bool,
}

impl PdfRasterizer {
    pub fn new(load_system_fonts: bool) -> Self {
        Self { load_system_fonts }
    }
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Rasterizer for PdfRasterizer {
    fn rasterize(&self, template: &Template, scratch: &Path) -> Result<Vec<u8>, RasterizeError> {
        // The composed SVG goes through a scratch file, the intermediate
        // format the renderer reads from.
        let svg_path = scratch.join("composed.svg");
        fs::write(&svg_path, template.to_svg_string())?;
        let source = fs::read_to_string(&svg_path)?;

        let mut options = usvg::Options::default();
        options.resources_dir = Some(scratch.to_path_buf());
        if self.load_system_fonts {
            options.fontdb_mut().load_system_fonts();
        }

        let tree = usvg::Tree::from_str(&source, &options)
            .map_err(|e| RasterizeError::Svg(e.to_string()))?;
        let size = tree.size();
        debug!(width = size.width(), height = size.height(), "page size from drawing");

        let pdf = svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
            .map_err(|e| RasterizeError::Conversion(format!("{:?}", e)))?;
        debug!(bytes = pdf.len(), "pdf rendered");
        Ok(pdf)
    }
}
