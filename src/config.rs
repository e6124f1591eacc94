//! Render Configuration

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use crate::request::DEFAULT_OUTPUT_NAME;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Parent directory for per-invocation scratch space (system temp if unset)
    pub scratch_root: Option<PathBuf>,
    /// Barcode bar height in pixels
    pub barcode_height: u32,
    /// Width of the narrowest barcode bar in pixels
    pub barcode_xdim: u32,
    pub http_timeout: Duration,
    /// Load system fonts before rasterizing so template text renders
    pub load_system_fonts: bool,
    /// Binding path naming the output document when the payload has no `output_name`
    pub default_output_name: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            barcode_height: 80,
            barcode_xdim: 2,
            http_timeout: Duration::from_secs(30),
            load_system_fonts: true,
            default_output_name: DEFAULT_OUTPUT_NAME.to_string(),
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_barcode_height(mut self, height: u32) -> Self {
        self.barcode_height = height;
        self
    }

    pub fn with_barcode_xdim(mut self, xdim: u32) -> Self {
        self.barcode_xdim = xdim;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_load_system_fonts(mut self, load: bool) -> Self {
        self.load_system_fonts = load;
        self
    }

    pub fn with_default_output_name(mut self, path: impl Into<String>) -> Self {
        self.default_output_name = path.into();
        self
    }

    /// Create a fresh scratch directory for one invocation. It is removed
    /// when the returned handle drops.
    pub fn scratch_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("labelforge-");
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}
