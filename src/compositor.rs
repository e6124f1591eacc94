//! Placement Compositor
//!
//! Swaps an `<image>` placeholder slot for a generated asset. The slot's own
//! geometry decides where the asset lands:
//!
//! - size: slot `width`/`height` times the asset spec's `scale`
//! - position: slot `x`/`y`, moved by the asset spec's `right`/`down` offset
//!   in the slot's local coordinates (after its existing `transform`)
//!
//! The replacement's transform is always `<existing> translate(R, D)`, with
//! `scale(S)` appended for vector assets. Raster assets carry the scale in
//! their `width`/`height` and keep the slot's `x`/`y` attributes. Vector
//! assets keep the slot origin and the grid-to-slot fit in an inner group.
//!
//! Slots are looked up per `<g>`: each group contributes at most its first
//! direct-child match, and every group in the document is visited. Slots
//! outside any group, or ids no group holds, are left alone.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::debug;

use crate::assets::{AssetContent, GeneratedAsset};
use crate::request::AssetAttributes;
use crate::template::{Element, Node, Template, XLINK_NS};
use crate::transform::PlacementTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Placement {
    /// Asset inserted into this many groups
    Placed { slots: usize },
    /// No group holds the slot; template untouched
    SlotMissing,
}

/// Geometry read off a placeholder slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub transform: Option<String>,
}

impl SlotGeometry {
    pub fn read(slot: &Element) -> Self {
        let length = |key| slot.attr(key).and_then(parse_length).unwrap_or(0.0);
        Self {
            x: length("x"),
            y: length("y"),
            width: length("width"),
            height: length("height"),
            transform: slot.attr("transform").map(str::to_string),
        }
    }
}

/// Unit-less or `px` lengths; anything else is treated as unset.
fn parse_length(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let raw = raw.strip_suffix("px").unwrap_or(raw);
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Final size and transform for one placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementGeometry {
    pub width: f64,
    pub height: f64,
    pub transform: PlacementTransform,
}

impl PlacementGeometry {
    /// `embed_scale` appends `scale(S)` to the transform (vector assets);
    /// otherwise scale only affects the adjusted size.
    pub fn compute(slot: &SlotGeometry, attributes: &AssetAttributes, embed_scale: bool) -> Self {
        let scale = attributes.scale;
        let offset = &attributes.offset;
        let transform = PlacementTransform::from_existing(slot.transform.as_deref())
            .then_translate(offset.right, offset.down);
        let transform = if embed_scale {
            transform.then_scale(scale)
        } else {
            transform
        };
        Self {
            width: slot.width * scale,
            height: slot.height * scale,
            transform,
        }
    }
}

fn is_slot(node: &Node, slot_id: &str) -> bool {
    node.as_element()
        .map_or(false, |e| e.is("image") && e.id() == Some(slot_id))
}

/// `svg:image` + `g` -> `svg:g`, keeping whatever prefix the template uses.
fn sibling_name(qualified: &str, local: &str) -> String {
    match qualified.rsplit_once(':') {
        Some((prefix, _)) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Whether any group holds an image slot with this id.
pub fn has_slot(template: &Template, slot_id: &str) -> bool {
    let mut found = false;
    template.root().walk(&mut |element| {
        if element.is("g") && element.children.iter().any(|n| is_slot(n, slot_id)) {
            found = true;
        }
    });
    found
}

/// Replace every group's `slot_id` image slot with `asset`.
///
/// A vector replacement is a wrapper `<g>` holding an inner `<g>` that holds
/// the module rects. The nesting is deliberate: the inner group maps the
/// asset's grid onto the slot box, so the on-page size is slot size × scale
/// while the wrapper's transform stays `<existing> translate(R, D) scale(S)`.
/// The inner group is omitted when the grid already matches a slot at the
/// origin.
pub fn place(
    template: &mut Template,
    slot_id: &str,
    attributes: &AssetAttributes,
    asset: &GeneratedAsset,
) -> Placement {
    let mut placed = 0;

    template.root_mut().walk_mut(&mut |group| {
        if !group.is("g") {
            return;
        }
        let Some(index) = group.children.iter().position(|n| is_slot(n, slot_id)) else {
            return;
        };
        if let Node::Element(slot) = group.children.remove(index) {
            let replacement = replacement(&slot, slot_id, attributes, asset);
            group.children.push(Node::Element(replacement));
            placed += 1;
        }
    });

    if placed == 0 {
        debug!(slot = slot_id, "slot not found, placement dropped");
        return Placement::SlotMissing;
    }
    if !asset.is_vector() {
        template.ensure_namespace("xlink", XLINK_NS);
    }
    debug!(slot = slot_id, groups = placed, "asset placed");
    Placement::Placed { slots: placed }
}

fn replacement(
    slot: &Element,
    slot_id: &str,
    attributes: &AssetAttributes,
    asset: &GeneratedAsset,
) -> Element {
    let geometry = SlotGeometry::read(slot);
    match &asset.content {
        AssetContent::Vector(svg) => {
            let placement = PlacementGeometry::compute(&geometry, attributes, true);
            let mut wrapper = Element::new(sibling_name(&slot.name, "g"))
                .with_attr("id", slot_id)
                .with_attr("transform", placement.transform.to_string())
                .with_attr("width", placement.width.to_string())
                .with_attr("height", placement.height.to_string());
            let modules = svg.children.clone();
            match inner_transform(&geometry, attributes.scale, asset) {
                Some(fit) => {
                    let mut inner = Element::new(sibling_name(&slot.name, "g"))
                        .with_attr("transform", fit.to_string());
                    inner.children = modules;
                    wrapper.children.push(Node::Element(inner));
                }
                None => wrapper.children = modules,
            }
            wrapper
        }
        AssetContent::Raster { bytes, mime } => {
            let placement = PlacementGeometry::compute(&geometry, attributes, false);
            let mut image = Element::new(sibling_name(&slot.name, "image"))
                .with_attr("id", slot_id)
                .with_attr("width", placement.width.to_string())
                .with_attr("height", placement.height.to_string())
                .with_attr("transform", placement.transform.to_string());
            for key in ["x", "y", "preserveAspectRatio"] {
                if let Some(value) = slot.attr(key) {
                    image.set_attr(key, value);
                }
            }
            image.set_attr(
                "xlink:href",
                format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
            );
            image
        }
    }
}

/// Transform of the group between the wrapper and the module rects: the slot
/// origin (undoing the wrapper's scale so it lands on the slot's `x`/`y`),
/// then the fit of the asset's intrinsic grid onto the slot's box. `None`
/// when neither applies.
fn inner_transform(
    slot: &SlotGeometry,
    scale: f64,
    asset: &GeneratedAsset,
) -> Option<PlacementTransform> {
    let mut inner = PlacementTransform::default();
    if slot.x != 0.0 || slot.y != 0.0 {
        let unscale = if scale != 0.0 { scale } else { 1.0 };
        inner = inner.then_translate(slot.x / unscale, slot.y / unscale);
    }
    let sized = asset.width > 0.0 && asset.height > 0.0 && slot.width > 0.0 && slot.height > 0.0;
    if sized {
        let sx = slot.width / asset.width;
        let sy = slot.height / asset.height;
        if sx != 1.0 || sy != 1.0 {
            inner = inner.then_scale_xy(sx, sy);
        }
    }
    (!inner.ops().is_empty()).then_some(inner)
}
