//! Render Pipeline - Single Entry Point
//!
//! One request in, one stored PDF (or one error) out:
//! validate -> load template -> bind text -> generate and place assets ->
//! rasterize -> store. Validation runs before any I/O and the document is
//! stored only after every earlier step succeeded.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::assets::{AssetError, AssetGenerator, SymbolGenerator};
use crate::binder::bind_text;
use crate::compositor::{has_slot, place, Placement};
use crate::config::RenderConfig;
use crate::hashing::{compute_job_hash, sha256_hex};
use crate::rasterize::{PdfRasterizer, RasterizeError, Rasterizer};
use crate::request::{AssetKind, AssetSpec, RenderRequest};
use crate::storage::{Locator, Storage, StorageError};
use crate::template::{Template, TemplateError};
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed request: {0}")]
    MalformedSpec(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] StorageError),

    #[error("Asset generation failed: {0}")]
    Generate(#[from] AssetError),

    #[error("Rasterization failed: {0}")]
    Rasterize(#[from] RasterizeError),

    #[error("Storing {destination} failed: {source}")]
    Store {
        destination: String,
        #[source]
        source: StorageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happened to one asset spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpecOutcome {
    Placed { slots: usize },
    SlotMissing,
    /// Data path resolved to nothing; nothing generated
    DataAbsent,
}

impl From<Placement> for SpecOutcome {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Placed { slots } => SpecOutcome::Placed { slots },
            Placement::SlotMissing => SpecOutcome::SlotMissing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecReport {
    pub kind: AssetKind,
    pub slot: String,
    #[serde(flatten)]
    pub outcome: SpecOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompositionReport {
    /// Text slots replaced from the record
    pub text_bound: usize,
    pub specs: Vec<SpecReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub invocation_id: String,
    pub url: String,
    /// Digest of the stored PDF bytes
    pub sha256: String,
    pub job_hash: String,
    pub rendered_at: DateTime<Utc>,
    pub composition: CompositionReport,
}

/// The object printed for the caller of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStatus {
    pub status: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderStatus {
    pub fn success(document: &RenderedDocument) -> Self {
        Self {
            status: "success".to_string(),
            url: document.url.clone(),
            sha256: Some(document.sha256.clone()),
            rendered_at: Some(document.rendered_at),
            error: None,
        }
    }

    pub fn failure(error: &PipelineError) -> Self {
        Self {
            status: "error".to_string(),
            url: String::new(),
            sha256: None,
            rendered_at: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// One-line JSON for stdout. Always valid JSON, even if serialization fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({"status": "error", "url": "", "error": e.to_string()}).to_string()
        })
    }
}

impl From<&Result<RenderedDocument, PipelineError>> for RenderStatus {
    fn from(result: &Result<RenderedDocument, PipelineError>) -> Self {
        match result {
            Ok(document) => RenderStatus::success(document),
            Err(error) => RenderStatus::failure(error),
        }
    }
}

/// The render pipeline - single entry point for all label operations
pub struct RenderPipeline {
    storage: Arc<Storage>,
    generator: Box<dyn AssetGenerator>,
    rasterizer: Box<dyn Rasterizer>,
    validator: Validator,
    config: RenderConfig,
}

impl RenderPipeline {
    pub fn new(
        storage: Arc<Storage>,
        generator: Box<dyn AssetGenerator>,
        rasterizer: Box<dyn Rasterizer>,
        config: RenderConfig,
    ) -> Self {
        Self {
            storage,
            generator,
            rasterizer,
            validator: Validator::new(),
            config,
        }
    }

    /// Pipeline with the stock symbol generator and PDF rasterizer.
    pub fn with_defaults(storage: Arc<Storage>, config: RenderConfig) -> Self {
        let generator = SymbolGenerator::new(Arc::clone(&storage))
            .with_barcode_geometry(config.barcode_height, config.barcode_xdim);
        let rasterizer = PdfRasterizer::new(config.load_system_fonts);
        Self::new(storage, Box::new(generator), Box::new(rasterizer), config)
    }

    pub fn validate(&self, request: &RenderRequest) -> ValidationResult {
        self.validator.validate(request)
    }

    /// Parse a raw payload and render it.
    pub fn render_payload(&self, payload: Value) -> Result<RenderedDocument, PipelineError> {
        let request = RenderRequest::from_value(payload)
            .map_err(|e| PipelineError::MalformedSpec(e.to_string()))?;
        self.render(&request)
    }

    /// Render one request to a stored PDF.
    ///
    /// CRITICAL: validation always runs first. A malformed request never
    /// touches storage.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, PipelineError> {
        let invocation_id = Uuid::new_v4().to_string();
        let span = info_span!("render", invocation = %invocation_id);
        let _entered = span.enter();

        let validation = self.validate(request);
        for warning in validation.warnings() {
            warn!(rule = %warning.rule, location = ?warning.location, "{}", warning.message);
        }
        if !validation.valid {
            return Err(PipelineError::MalformedSpec(validation.error_summary()));
        }

        let job_hash = compute_job_hash(request, ENGINE_VERSION)?;
        info!(%job_hash, template = %request.template_path, "render started");

        let scratch = self.config.scratch_dir()?;
        let mut template = self.load_template(request, scratch.path())?;

        let composition = self.compose_into(&mut template, request, scratch.path())?;

        let pdf = self.rasterizer.rasterize(&template, scratch.path())?;
        let sha256 = sha256_hex(&pdf);

        let destination =
            request.destination(&invocation_id, &self.config.default_output_name);
        let url = self
            .storage
            .store(&destination, &pdf)
            .map_err(|source| PipelineError::Store {
                destination: destination.to_string(),
                source,
            })?;
        info!(%url, %sha256, bytes = pdf.len(), "document stored");

        Ok(RenderedDocument {
            invocation_id,
            url,
            sha256,
            job_hash,
            rendered_at: Utc::now(),
            composition,
        })
    }

    /// Bind text and place every asset spec into `template`.
    pub fn compose_into(
        &self,
        template: &mut Template,
        request: &RenderRequest,
        scratch: &Path,
    ) -> Result<CompositionReport, PipelineError> {
        let bound = bind_text(template, &request.variables);
        debug!(bound = bound.bound, unresolved = bound.unresolved.len(), "text bound");

        let mut report = CompositionReport {
            text_bound: bound.bound,
            specs: Vec::new(),
        };
        for (kind, spec) in request.specs() {
            let outcome = self.compose_spec(template, request, kind, spec, scratch)?;
            report.specs.push(outcome);
        }
        Ok(report)
    }

    fn compose_spec(
        &self,
        template: &mut Template,
        request: &RenderRequest,
        kind: AssetKind,
        spec: &AssetSpec,
        scratch: &Path,
    ) -> Result<SpecReport, PipelineError> {
        let slot = spec
            .slot_id()
            .ok_or_else(|| PipelineError::MalformedSpec(format!("{} spec without id", kind)))?;

        let outcome = match spec.input(kind, request) {
            None => {
                debug!(%kind, %slot, "data absent, skipped");
                SpecOutcome::DataAbsent
            }
            Some(_) if !has_slot(template, &slot) => {
                debug!(%kind, %slot, "no slot in template, skipped");
                SpecOutcome::SlotMissing
            }
            Some(input) => {
                let asset = self.generator.generate(kind, &input, scratch)?;
                place(template, &slot, &spec.attributes, &asset).into()
            }
        };
        Ok(SpecReport { kind, slot, outcome })
    }

    fn load_template(
        &self,
        request: &RenderRequest,
        scratch: &Path,
    ) -> Result<Template, PipelineError> {
        let locator = Locator::parse(&request.template_path)?;
        let bytes = match &locator {
            Locator::Local(_) => self.storage.fetch(&locator)?,
            _ => {
                let name = format!("template-{}", locator.file_name().unwrap_or("template.svg"));
                let path = self.storage.download_to(&locator, &scratch.join(name))?;
                fs::read(path)?
            }
        };
        let template = Template::from_bytes(bytes)?;
        debug!(%locator, "template loaded");
        Ok(template)
    }
}
