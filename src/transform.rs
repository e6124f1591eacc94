//! Placement Transforms
//!
//! A placement transform is an ordered list of operations serialized into
//! an SVG `transform` attribute. Composition order is fixed: whatever the
//! slot already carried, then the offset translation, then (for vector
//! assets) the scale.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Transform text copied verbatim from the template slot
    Existing(String),
    Translate { x: f64, y: f64 },
    Scale { x: f64, y: f64 },
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::Existing(raw) => f.write_str(raw),
            TransformOp::Translate { x, y } => write!(f, "translate({}, {})", x, y),
            TransformOp::Scale { x, y } if x == y => write!(f, "scale({})", x),
            TransformOp::Scale { x, y } => write!(f, "scale({}, {})", x, y),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementTransform {
    ops: Vec<TransformOp>,
}

impl PlacementTransform {
    /// Start from a slot's `transform` attribute. Missing or blank
    /// transforms contribute nothing.
    pub fn from_existing(existing: Option<&str>) -> Self {
        let ops = match existing.map(str::trim) {
            Some(raw) if !raw.is_empty() => vec![TransformOp::Existing(raw.to_string())],
            _ => vec![],
        };
        Self { ops }
    }

    pub fn then_translate(mut self, x: f64, y: f64) -> Self {
        self.ops.push(TransformOp::Translate { x, y });
        self
    }

    pub fn then_scale(self, scale: f64) -> Self {
        self.then_scale_xy(scale, scale)
    }

    pub fn then_scale_xy(mut self, x: f64, y: f64) -> Self {
        self.ops.push(TransformOp::Scale { x, y });
        self
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }
}

impl fmt::Display for PlacementTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_order() {
        let t = PlacementTransform::from_existing(Some("translate(10,10)"))
            .then_translate(5.0, 5.0)
            .then_scale(0.5);
        assert_eq!(t.to_string(), "translate(10,10) translate(5, 5) scale(0.5)");
        assert!(matches!(t.ops()[0], TransformOp::Existing(_)));
        assert!(matches!(t.ops()[2], TransformOp::Scale { .. }));
    }

    #[test]
    fn test_blank_existing_is_dropped() {
        let t = PlacementTransform::from_existing(None).then_translate(0.0, 0.0);
        assert_eq!(t.to_string(), "translate(0, 0)");

        let t = PlacementTransform::from_existing(Some("   ")).then_translate(1.5, -2.0);
        assert_eq!(t.to_string(), "translate(1.5, -2)");
    }

    #[test]
    fn test_non_uniform_scale() {
        let t = PlacementTransform::default().then_scale_xy(2.0, 0.5);
        assert_eq!(t.to_string(), "scale(2, 0.5)");
    }

    #[test]
    fn test_existing_matrix_kept_verbatim() {
        let t = PlacementTransform::from_existing(Some("matrix(1,0,0,1,3.2,4)"))
            .then_translate(0.0, 0.0);
        assert_eq!(t.to_string(), "matrix(1,0,0,1,3.2,4) translate(0, 0)");
    }
}
