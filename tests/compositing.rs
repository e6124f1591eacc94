//! End-to-end composition through the pipeline.

mod common;

use std::sync::Arc;

use common::{Harness, SvgRasterizer};
use labelforge_core::pipeline::SpecOutcome;
use labelforge_core::{PdfRasterizer, RenderPipeline, RenderRequest, SymbolGenerator, Template};
use pretty_assertions::assert_eq;
use serde_json::json;

fn render(harness: &Harness, payload: serde_json::Value) -> Template {
    let request = RenderRequest::from_value(payload).unwrap();
    harness.pipeline().render(&request).unwrap();
    harness.stored("out", "A-1.pdf")
}

#[test]
fn matrix_lands_in_its_slot() {
    let harness = Harness::new();
    let stored = render(
        &harness,
        json!({
            "template_path": "s3://labels/label.svg",
            "variables": {"item": {"orderItemId": "A-1"}},
            "matrixcodes": [{
                "id": "dm",
                "data": "item.orderItemId",
                "attributes": {"scale": 0.5, "offset": {"right": 5, "down": 5}},
            }],
            "output_bucket": "out",
        }),
    );

    assert_eq!(harness.generator_calls(), 1);
    let nodes = stored.root().find_by_id("dm");
    assert_eq!(nodes.len(), 1);
    let group = nodes[0];
    assert!(group.is("g"));
    assert_eq!(
        group.attr("transform"),
        Some("translate(10,10) translate(5, 5) scale(0.5)")
    );
    let fit = group.child_elements().next().unwrap();
    assert_eq!(fit.child_elements().filter(|e| e.is("rect")).count(), 3);
}

#[test]
fn text_slots_bind_from_variables() {
    let harness = Harness::new();
    let stored = render(
        &harness,
        json!({
            "template_path": "s3://labels/label.svg",
            "variables": {"item": {"orderItemId": "A-1", "name": "Widget & Co"}},
            "output_bucket": "out",
        }),
    );

    let text = |id: &str| stored.root().find_by_id(id)[0].text_content();
    assert_eq!(text("item.name"), "Widget & Co");
    // tspan runs take the value, the text element keeps its structure
    let order = stored.root().find_by_id("item.orderItemId")[0];
    assert_eq!(order.child_elements().next().unwrap().text_content(), "A-1");
    assert_eq!(text("item.missing"), "PLACEHOLDER");
}

#[test]
fn asset_data_falls_back_to_whole_payload() {
    let harness = Harness::new();
    let request = RenderRequest::from_value(json!({
        "template_path": "s3://labels/label.svg",
        "variables": {"item": {"orderItemId": "A-1"}},
        "shipment": {"tracking": "1Z999"},
        "barcodes": [{"id": "bc", "data": "shipment.tracking"}],
        "output_bucket": "out",
    }))
    .unwrap();

    let document = harness.pipeline().render(&request).unwrap();
    assert_eq!(
        document.composition.specs[0].outcome,
        SpecOutcome::Placed { slots: 1 }
    );

    let stored = harness.stored("out", "A-1.pdf");
    let image = stored.root().find_by_id("bc")[0];
    assert_eq!(image.attr("transform"), Some("translate(0, 0)"));
    assert_eq!(image.attr("x"), Some("3"));
    assert_eq!(image.attr("y"), Some("4"));
    assert_eq!(image.attr("width"), Some("120"));
    assert!(image
        .attr("xlink:href")
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[test]
fn specs_are_processed_barcodes_then_matrices_then_images() {
    let harness = Harness::new();
    let request = RenderRequest::from_value(json!({
        "template_path": "s3://labels/label.svg",
        "variables": {"item": {"orderItemId": "A-1", "sku": "S"}},
        "images": [{"id": "logo", "source": "s3://media/logo.png"}],
        "matrixcodes": [{"id": "dm", "data": "item.sku"}],
        "barcodes": [{"id": "bc", "data": "item.sku"}],
        "output_bucket": "out",
    }))
    .unwrap();

    let document = harness.pipeline().render(&request).unwrap();
    let slots: Vec<_> = document
        .composition
        .specs
        .iter()
        .map(|s| s.slot.as_str())
        .collect();
    assert_eq!(slots, vec!["bc", "dm", "logo"]);
    assert_eq!(harness.generator_calls(), 3);
}

#[test]
fn real_symbols_compose_and_image_failure_stores_nothing() {
    let harness = Harness::new();
    let storage = harness.storage();
    let pipeline = RenderPipeline::new(
        Arc::clone(&storage),
        Box::new(SymbolGenerator::new(Arc::clone(&storage))),
        Box::new(SvgRasterizer),
        harness.config(),
    );

    let ok = RenderRequest::from_value(json!({
        "template_path": "s3://labels/label.svg",
        "variables": {"item": {"orderItemId": "A-1"}},
        "barcodes": [{"id": "bc", "data": "item.orderItemId"}],
        "matrixcodes": [{"id": "dm", "data": "item.orderItemId"}],
        "output_bucket": "out",
    }))
    .unwrap();
    pipeline.render(&ok).unwrap();
    let stored = harness.stored("out", "A-1.pdf");
    assert!(stored.root().find_by_id("dm")[0].is("g"));
    assert!(stored.root().find_by_id("bc")[0].attr("xlink:href").is_some());

    let missing_image = RenderRequest::from_value(json!({
        "template_path": "s3://labels/label.svg",
        "variables": {"item": {"orderItemId": "B-2"}},
        "images": [{"id": "logo", "source": "s3://media/absent.png"}],
        "output_bucket": "out",
    }))
    .unwrap();
    assert!(pipeline.render(&missing_image).is_err());
    assert!(!harness.object("out", "B-2.pdf").exists());
}

#[test]
fn pdf_output_end_to_end() {
    let harness = Harness::new();
    let storage = harness.storage();
    let pipeline = RenderPipeline::new(
        Arc::clone(&storage),
        Box::new(SymbolGenerator::new(Arc::clone(&storage))),
        Box::new(PdfRasterizer::new(false)),
        harness.config(),
    );
    let local = harness.scratch.path().join("out/label.pdf");

    let request = RenderRequest::from_value(json!({
        "template_path": "s3://labels/label.svg",
        "variables": {"item": {"orderItemId": "A-1"}},
        "matrixcodes": [{"id": "dm", "data": "item.orderItemId"}],
        "output_path": local.display().to_string(),
    }))
    .unwrap();

    let document = pipeline.render(&request).unwrap();
    assert_eq!(document.url, local.display().to_string());
    let bytes = std::fs::read(&local).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
