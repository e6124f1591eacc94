//! Text Binding
//!
//! Every `<text>` element whose `id` is a binding path gets its literal
//! content replaced by the resolved value. Unresolved or falsy values leave
//! the template's placeholder text in place.

use serde_json::Value;
use tracing::debug;

use crate::record::{display_value, resolve_truthy};
use crate::template::Template;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Number of text slots whose content was replaced
    pub bound: usize,
    /// Slot ids that did not resolve, in document order
    pub unresolved: Vec<String>,
}

/// Substitute text slots in `template` from `record`.
pub fn bind_text(template: &mut Template, record: &Value) -> BindReport {
    let mut report = BindReport::default();

    template.root_mut().walk_mut(&mut |element| {
        if !element.is("text") {
            return;
        }
        let Some(id) = element.id() else {
            return;
        };
        let Some(value) = resolve_truthy(&[record], id) else {
            report.unresolved.push(id.to_string());
            return;
        };
        let text = display_value(value);

        let has_runs = element.child_elements().any(|c| c.is("tspan"));
        if has_runs {
            for run in element.child_elements_mut().filter(|c| c.is("tspan")) {
                run.set_text(text.clone());
            }
        } else {
            element.set_text(text);
        }
        report.bound += 1;
    });

    debug!(
        bound = report.bound,
        unresolved = report.unresolved.len(),
        "text slots bound"
    );
    report
}
