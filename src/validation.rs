//! Request Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Any error-severity violation makes the request malformed; warnings are
//! reported and rendering continues.

use serde::{Deserialize, Serialize};

use crate::request::{AssetKind, AssetSpec, RenderRequest};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    /// `barcodes[0]`-style pointer to the offending spec, if any
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
    }

    /// `rule: message` pairs for the error-severity violations.
    pub fn error_summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| match &v.location {
                Some(at) => format!("{} ({}): {}", v.rule, at, v.message),
                None => format!("{}: {}", v.rule, v.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation>;
}

fn list_name(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Barcode => "barcodes",
        AssetKind::Matrix => "matrixcodes",
        AssetKind::Image => "images",
    }
}

/// Apply `check` to every spec, tagging violations with their location.
fn per_spec(
    rule: &'static str,
    request: &RenderRequest,
    check: impl Fn(AssetKind, &AssetSpec) -> Option<(ViolationSeverity, String)>,
) -> Vec<ValidationViolation> {
    let mut counters = [0usize; 3];
    let mut violations = vec![];
    for (kind, spec) in request.specs() {
        let index = counters[kind as usize];
        counters[kind as usize] += 1;
        if let Some((severity, message)) = check(kind, spec) {
            violations.push(ValidationViolation {
                rule: rule.to_string(),
                severity,
                message,
                location: Some(format!("{}[{}]", list_name(kind), index)),
            });
        }
    }
    violations
}

// --- Concrete Rules ---

pub struct TemplatePathRule;

impl ValidationRule for TemplatePathRule {
    fn name(&self) -> &'static str { "template_path" }

    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation> {
        if request.template_path.trim().is_empty() {
            vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                message: "Template locator is empty".to_string(),
                location: None,
            }]
        } else {
            vec![]
        }
    }
}

pub struct SlotTargetRule;

impl ValidationRule for SlotTargetRule {
    fn name(&self) -> &'static str { "slot_target" }

    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation> {
        per_spec(self.name(), request, |_, spec| {
            spec.slot_id()
                .is_none()
                .then(|| (ViolationSeverity::Error, "Missing target slot id".to_string()))
        })
    }
}

pub struct DataSourceRule;

impl ValidationRule for DataSourceRule {
    fn name(&self) -> &'static str { "data_source" }

    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation> {
        per_spec(self.name(), request, |kind, spec| {
            let has_data = spec.data.as_deref().map_or(false, |d| !d.is_empty());
            let has_source = spec.source.as_deref().map_or(false, |s| !s.is_empty());
            match kind {
                AssetKind::Image if !has_data && !has_source => Some((
                    ViolationSeverity::Error,
                    "Image spec needs a `source` locator or a `data` path".to_string(),
                )),
                AssetKind::Barcode | AssetKind::Matrix if !has_data => Some((
                    ViolationSeverity::Error,
                    "Missing `data` binding path".to_string(),
                )),
                _ => None,
            }
        })
    }
}

pub struct ScaleRule;

impl ValidationRule for ScaleRule {
    fn name(&self) -> &'static str { "scale" }

    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation> {
        per_spec(self.name(), request, |_, spec| {
            let scale = spec.attributes.scale;
            if !scale.is_finite() {
                Some((
                    ViolationSeverity::Error,
                    format!("Scale must be a number, got {}", scale),
                ))
            } else if scale <= 0.0 {
                Some((
                    ViolationSeverity::Warning,
                    format!("Scale {} collapses or mirrors the asset", scale),
                ))
            } else {
                None
            }
        })
    }
}

pub struct InertOffsetRule;

impl ValidationRule for InertOffsetRule {
    fn name(&self) -> &'static str { "inert_offset" }

    fn validate(&self, request: &RenderRequest) -> Vec<ValidationViolation> {
        per_spec(self.name(), request, |_, spec| {
            let offset = &spec.attributes.offset;
            (offset.top != 0.0 || offset.bottom != 0.0).then(|| {
                (
                    ViolationSeverity::Warning,
                    "Offsets `top`/`bottom` are accepted but do not move the asset".to_string(),
                )
            })
        })
    }
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(TemplatePathRule),
                Box::new(SlotTargetRule),
                Box::new(DataSourceRule),
                Box::new(ScaleRule),
                Box::new(InertOffsetRule),
            ],
        }
    }

    pub fn validate(&self, request: &RenderRequest) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(request))
            .collect();

        let valid = !violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult { valid, violations }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(payload: serde_json::Value) -> RenderRequest {
        RenderRequest::from_value(payload).unwrap()
    }

    #[test]
    fn test_well_formed_request_is_valid() {
        let result = Validator::new().validate(&request(json!({
            "template_path": "label.svg",
            "barcodes": [{"id": "bc", "data": "orderId"}],
            "images": [{"id": "logo", "source": "https://example.com/a.png"}]
        })));
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let result = Validator::new().validate(&request(json!({
            "template_path": "label.svg",
            "barcodes": [{"id": "bc", "data": "a"}, {"data": "b"}]
        })));
        assert!(!result.valid);
        let v = &result.violations[0];
        assert_eq!(v.rule, "slot_target");
        assert_eq!(v.location.as_deref(), Some("barcodes[1]"));
        assert!(result.error_summary().contains("barcodes[1]"));
    }

    #[test]
    fn test_image_without_locator_is_an_error() {
        let result = Validator::new().validate(&request(json!({
            "template_path": "label.svg",
            "images": [{"id": "logo"}]
        })));
        assert!(result.has_errors());
        assert_eq!(result.violations[0].rule, "data_source");
    }

    #[test]
    fn test_non_positive_scale_only_warns() {
        let result = Validator::new().validate(&request(json!({
            "template_path": "label.svg",
            "matrixcodes": [
                {"id": "dm", "data": "x", "attributes": {"scale": 0}},
                {"id": "dm2", "data": "x", "attributes": {"scale": -1.5}}
            ]
        })));
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 2);
        assert!(result.warnings().all(|v| v.rule == "scale"));
    }

    #[test]
    fn test_non_finite_scale_is_an_error() {
        let mut request = request(json!({
            "template_path": "label.svg",
            "matrixcodes": [{"id": "dm", "data": "x"}]
        }));
        request.matrixcodes[0].attributes.scale = f64::NAN;
        let result = Validator::new().validate(&request);
        assert!(!result.valid);
        assert_eq!(result.violations[0].rule, "scale");
    }

    #[test]
    fn test_inert_offsets_only_warn() {
        let result = Validator::new().validate(&request(json!({
            "template_path": "label.svg",
            "matrixcodes": [{"id": "dm", "data": "x",
                "attributes": {"offset": {"top": 4, "bottom": 1}}}]
        })));
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 1);
    }

    #[test]
    fn test_empty_template_path() {
        let result = Validator::new().validate(&request(json!({"template_path": " "})));
        assert!(!result.valid);
        assert_eq!(result.violations[0].location, None);
    }
}
