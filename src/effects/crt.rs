use crate::{
    footprint::{Rect, EXPANSION_MARGIN},
    shader,
};

use super::EffectType;

/// The CRT screen simulation.  Curvature and chromatic aberration move pixels by an amount that
/// depends on the parameters, so the footprint is padded by a fixed margin in both directions.
#[derive(Debug, Clone)]
pub struct Crt {
    margin: i32,
    shader_name: String,
}

impl Crt {
    pub fn new(shader_name: impl Into<String>) -> Self {
        Self {
            margin: EXPANSION_MARGIN,
            shader_name: shader_name.into(),
        }
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }
}

impl Default for Crt {
    fn default() -> Self {
        Self::new(shader::CRT)
    }
}

impl EffectType for Crt {
    fn shader_name(&self) -> &str {
        &self.shader_name
    }

    fn transform_bbox(&self, r: Rect) -> Rect {
        r.expand(self.margin)
    }

    fn inv_transform_bbox(&self, r: Rect) -> Rect {
        // Symmetric: any output pixel may read from up to `margin` away in the input
        r.expand(self.margin)
    }

    // Edges of the curved screen are transparent, so nothing is ever guaranteed opaque
}
