//! Rectangle propagation between an effect's input and output.
//!
//! The host asks two questions of every effect: "which output pixels can this input region
//! affect?" and "which input pixels do I need to produce this output region?".  The CRT effect
//! distorts the image, so both answers are larger than the rect being asked about.

use std::fmt::{Debug, Formatter};

use cgmath::Point2;

use crate::{
    effects::EffectType,
    error::{CrtError, CrtResult},
};

/// Distance (in device pixels) by which the CRT footprint grows in every direction.  This is a
/// fixed worst case and doesn't depend on the curvature or aberration values.
pub const EXPANSION_MARGIN: i32 = 2000;

/// The effect has exactly one input and one output
const INPUT_COUNT: usize = 1;

//////////
// RECT //
//////////

/// An axis-aligned integer rectangle in device pixels
// Invariant (for non-degenerate rects): max.x >= min.x && max.y >= min.y
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    min: Point2<i32>,
    max: Point2<i32>,
}

impl Rect {
    /// The rect which covers nothing.  Used as the opaque sub-rect of effects which can't promise
    /// any opaque pixels.
    pub const EMPTY: Self = Self {
        min: Point2 { x: 0, y: 0 },
        max: Point2 { x: 0, y: 0 },
    };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            min: Point2::new(left, top),
            max: Point2::new(right, bottom),
        }
    }

    /// Creates a [`Rect`] with a given size and where the minimum corner is the origin
    pub fn from_origin(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn left(self) -> i32 {
        self.min.x
    }

    pub fn top(self) -> i32 {
        self.min.y
    }

    pub fn right(self) -> i32 {
        self.max.x
    }

    pub fn bottom(self) -> i32 {
        self.max.y
    }

    pub fn min(self) -> Point2<i32> {
        self.min
    }

    pub fn max(self) -> Point2<i32> {
        self.max
    }

    /// Width, or 0 for degenerate rects
    pub fn width(self) -> u32 {
        self.max.x.saturating_sub(self.min.x).max(0) as u32
    }

    /// Height, or 0 for degenerate rects
    pub fn height(self) -> u32 {
        self.max.y.saturating_sub(self.min.y).max(0) as u32
    }

    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grows `self` by `margin` on every side, saturating at the limits of `i32`
    pub fn expand(self, margin: i32) -> Self {
        Self::new(
            self.min.x.saturating_sub(margin),
            self.min.y.saturating_sub(margin),
            self.max.x.saturating_add(margin),
            self.max.y.saturating_add(margin),
        )
    }

    /// Shrinks `self` by `margin` on every side.  Undoes [`Rect::expand`] unless that saturated.
    pub fn contract(self, margin: i32) -> Self {
        self.expand(-margin)
    }
}

impl Debug for Rect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect(({:?}, {:?}) - ({:?}, {:?}))",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

/////////////
// MAPPING //
/////////////

/// Result of mapping the input rects forward through an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRects {
    /// Every output pixel which can be affected by the input
    pub output: Rect,
    /// Region of the output which is guaranteed to be fully opaque
    pub opaque_sub_rect: Rect,
}

/// Given the rects covered by each input, compute the rect covered by the output.  `effect` must
/// be given exactly one input rect.
pub fn map_input_rects_to_output_rect(
    effect: &(impl EffectType + ?Sized),
    input_rects: &[Rect],
) -> CrtResult<OutputRects> {
    let input = single(input_rects.len()).map(|()| input_rects[0])?;
    Ok(OutputRects {
        output: effect.transform_bbox(input),
        opaque_sub_rect: effect.opaque_sub_rect(input),
    })
}

/// Given the output rect the host wants rendered, fill `input_rects` with the input regions
/// required to render it.  `input_rects` must have exactly one slot; nothing is written on
/// error.
pub fn map_output_rect_to_input_rects(
    effect: &(impl EffectType + ?Sized),
    output_rect: Rect,
    input_rects: &mut [Rect],
) -> CrtResult<()> {
    single(input_rects.len())?;
    input_rects[0] = effect.inv_transform_bbox(output_rect);
    Ok(())
}

fn single(found: usize) -> CrtResult<()> {
    if found == INPUT_COUNT {
        Ok(())
    } else {
        log::error!("footprint mapping given {} rects, expected {}", found, INPUT_COUNT);
        Err(CrtError::Topology {
            expected: INPUT_COUNT,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Crt;

    #[test]
    fn input_maps_to_expanded_output() {
        let rects = map_input_rects_to_output_rect(&Crt::default(), &[Rect::new(100, 100, 200, 200)])
            .unwrap();
        assert_eq!(rects.output, Rect::new(-1900, -1900, 2200, 2200));
        assert_eq!(rects.opaque_sub_rect, Rect::new(0, 0, 0, 0));
    }

    #[test]
    fn output_maps_to_expanded_input() {
        let mut input = [Rect::EMPTY];
        map_output_rect_to_input_rects(&Crt::default(), Rect::from_origin(1920, 1080), &mut input)
            .unwrap();
        assert_eq!(input[0], Rect::new(-2000, -2000, 3920, 3080));
    }

    #[test]
    fn round_trip_expands_by_twice_the_margin() {
        let crt = Crt::default();
        let r = Rect::new(-15, 40, 640, 480);
        let out = map_input_rects_to_output_rect(&crt, &[r]).unwrap().output;
        let mut back = [Rect::EMPTY];
        map_output_rect_to_input_rects(&crt, out, &mut back).unwrap();
        assert_eq!(back[0], r.expand(2 * EXPANSION_MARGIN));
        assert_eq!(back[0].contract(2 * EXPANSION_MARGIN), r);
    }

    #[test]
    fn wrong_arity_is_a_topology_violation() {
        let crt = Crt::default();
        let r = Rect::from_origin(10, 10);
        assert_eq!(
            map_input_rects_to_output_rect(&crt, &[]),
            Err(CrtError::Topology {
                expected: 1,
                found: 0
            })
        );
        assert_eq!(
            map_input_rects_to_output_rect(&crt, &[r, r]),
            Err(CrtError::Topology {
                expected: 1,
                found: 2
            })
        );

        let mut none: [Rect; 0] = [];
        assert!(map_output_rect_to_input_rects(&crt, r, &mut none).is_err());
        let mut two = [Rect::EMPTY; 2];
        assert_eq!(
            map_output_rect_to_input_rects(&crt, r, &mut two),
            Err(CrtError::Topology {
                expected: 1,
                found: 2
            })
        );
        // Nothing is written on failure
        assert_eq!(two, [Rect::EMPTY; 2]);
    }

    #[test]
    fn expansion_saturates() {
        let r = Rect::new(i32::MIN + 5, 0, i32::MAX - 5, 10).expand(EXPANSION_MARGIN);
        assert_eq!(r.left(), i32::MIN);
        assert_eq!(r.right(), i32::MAX);
        assert_eq!(r.top(), -2000);
    }

    #[test]
    fn degenerate_rects_have_zero_size() {
        assert!(Rect::EMPTY.is_empty());
        assert_eq!(Rect::new(10, 10, 0, 0).width(), 0);
        assert_eq!(Rect::new(0, 0, 30, 20).width(), 30);
        assert_eq!(Rect::new(0, 0, 30, 20).height(), 20);
    }
}
