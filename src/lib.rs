//! LabelForge Core - Data-Driven Label Compositor
//!
//! An SVG template plus one JSON record becomes one finished PDF:
//! 1. Templates are contracts: text slots and image slots are addressed by id
//! 2. Resolution misses are not errors: unbound slots keep their placeholder
//! 3. The template's geometry decides placement; the request only nudges it
//! 4. Validation precedes I/O, storage follows success

pub mod assets;
pub mod binder;
pub mod compositor;
pub mod config;
pub mod hashing;
pub mod pipeline;
pub mod rasterize;
pub mod record;
pub mod request;
pub mod storage;
pub mod template;
pub mod transform;
pub mod validation;

pub use assets::{AssetError, AssetGenerator, GeneratedAsset, SymbolGenerator};
pub use compositor::Placement;
pub use config::RenderConfig;
pub use hashing::{canonical_json, compute_job_hash, sha256_hex};
pub use pipeline::{PipelineError, RenderPipeline, RenderStatus, RenderedDocument};
pub use rasterize::{PdfRasterizer, Rasterizer};
pub use request::{AssetAttributes, AssetKind, AssetSpec, RenderRequest};
pub use storage::{FsObjectStore, Locator, ReqwestFetcher, S3ObjectStore, Storage};
pub use template::Template;
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
