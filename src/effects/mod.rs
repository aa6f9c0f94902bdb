//! Image effects (i.e. any transformation)

mod crt;

use std::fmt::Debug;

pub use crt::Crt;

use crate::footprint::Rect;

/// Trait implemented by all effect types
pub trait EffectType: Debug {
    /// Name of the shader resource which implements this effect
    fn shader_name(&self) -> &str;

    /// Given a [`Rect`] `r` in _input space_, return the smallest [`Rect`] in _output space_ which
    /// is affected by the pixels in `r`.
    fn transform_bbox(&self, rect: Rect) -> Rect;

    /// Given a [`Rect`] `r` in _output space_, return the smallest [`Rect`] in _input space_ which
    /// covers the pre-image of every point within `r`.
    fn inv_transform_bbox(&self, rect: Rect) -> Rect;

    /// The part of the output which is guaranteed to be opaque, given the input covers `rect`.
    /// Defaults to nothing.
    fn opaque_sub_rect(&self, _rect: Rect) -> Rect {
        Rect::EMPTY
    }
}
