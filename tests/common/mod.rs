//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use labelforge_core::assets::{module_grid, AssetContent, AssetError};
use labelforge_core::rasterize::RasterizeError;
use labelforge_core::storage::{HttpFetch, StorageError};
use labelforge_core::{
    AssetGenerator, FsObjectStore, GeneratedAsset, RenderConfig, RenderPipeline, Rasterizer,
    Storage, Template,
};
use tempfile::TempDir;

pub const LABEL: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="200">
<g id="layer1">
  <text id="item.name">NAME</text>
  <text id="item.orderItemId"><tspan>ORDER</tspan></text>
  <text id="item.missing">PLACEHOLDER</text>
  <image id="dm" width="100" height="100" transform="translate(10,10)"/>
  <image id="bc" x="3" y="4" width="120" height="40"/>
  <image id="logo" width="50" height="50"/>
</g>
</svg>"#;

/// Counts generator calls; matrices are a fixed 10x10 grid with three
/// dark modules, everything else a tiny raster.
#[derive(Default)]
pub struct CountingGenerator {
    pub calls: Arc<AtomicUsize>,
}

impl CountingGenerator {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn tiny_raster() -> GeneratedAsset {
    GeneratedAsset {
        width: 60.0,
        height: 20.0,
        content: AssetContent::Raster {
            bytes: b"png".to_vec(),
            mime: "image/png".to_string(),
        },
    }
}

impl AssetGenerator for CountingGenerator {
    fn barcode(&self, _data: &str) -> Result<GeneratedAsset, AssetError> {
        self.tick();
        Ok(tiny_raster())
    }

    fn matrix(&self, _data: &str) -> Result<GeneratedAsset, AssetError> {
        self.tick();
        Ok(module_grid(10, 10, vec![(0, 0), (1, 0), (9, 9)]))
    }

    fn image(&self, _locator: &str, _scratch: &Path) -> Result<GeneratedAsset, AssetError> {
        self.tick();
        Ok(tiny_raster())
    }
}

/// "Rasterizes" to the serialized SVG so stored output can be inspected.
pub struct SvgRasterizer;

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, template: &Template, _scratch: &Path) -> Result<Vec<u8>, RasterizeError> {
        Ok(template.to_svg_string().into_bytes())
    }
}

pub struct NoNetwork;

impl HttpFetch for NoNetwork {
    fn get(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported(url.to_string()))
    }
}

/// A filesystem object store with the label template at `s3://labels/label.svg`.
pub struct Harness {
    pub store: TempDir,
    pub scratch: TempDir,
    pub calls: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        let harness = Self {
            store: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        harness.put("labels", "label.svg", LABEL.as_bytes());
        harness
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: &[u8]) {
        let path = self.store.path().join(bucket).join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    pub fn storage(&self) -> Arc<Storage> {
        Arc::new(Storage::new(
            Box::new(FsObjectStore::new(self.store.path())),
            Box::new(NoNetwork),
        ))
    }

    pub fn config(&self) -> RenderConfig {
        RenderConfig::new().with_scratch_root(self.scratch.path())
    }

    /// Pipeline with the counting generator and the SVG "rasterizer".
    pub fn pipeline(&self) -> RenderPipeline {
        let generator = CountingGenerator {
            calls: Arc::clone(&self.calls),
        };
        RenderPipeline::new(
            self.storage(),
            Box::new(generator),
            Box::new(SvgRasterizer),
            self.config(),
        )
    }

    pub fn generator_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> PathBuf {
        self.store.path().join(bucket).join(key)
    }

    pub fn stored(&self, bucket: &str, key: &str) -> Template {
        Template::from_bytes(fs::read(self.object(bucket, key)).unwrap()).unwrap()
    }

    /// Scratch directories left behind by finished invocations.
    pub fn scratch_leftovers(&self) -> usize {
        fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
