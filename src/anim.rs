//! Animated effect parameters, and sampling them into a [`CrtParams`] snapshot for each frame.

use cgmath::Vector2;
use itertools::Itertools;

use crate::{error::CrtResult, types::CrtParams};

/// A point on the item's timeline, as handed to parameter sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTime {
    /// Frame index relative to the start of the item
    pub frame: i64,
    /// Length of the item in frames
    pub duration: i64,
    /// Integer frame rate of the timeline
    pub fps: u32,
}

/// Something which can produce the full set of parameters for any frame
pub trait ParamSource {
    /// Sample every animatable parameter.  [`CrtParams::time`] is left for the caller to fill in.
    fn sample(&self, at: SampleTime) -> CrtResult<CrtParams>;
}

/// A scalar which can vary over the timeline
pub trait Animated {
    fn sample(&self, frame: i64, duration: i64, fps: u32) -> f64;
}

impl Animated for f64 {
    fn sample(&self, _frame: i64, _duration: i64, _fps: u32) -> f64 {
        *self
    }
}

///////////////
// ANIMATION //
///////////////

/// Where a [`Keyframe`] sits on the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyTime {
    /// Absolute frame index within the item
    Frame(i64),
    /// Seconds from the start of the item
    Seconds(f64),
    /// Fraction of the item's length; `0.0` is the first frame and `1.0` the last
    Fraction(f64),
}

impl KeyTime {
    /// The (possibly fractional) frame index of this time, for an item of the given length
    fn resolve(self, duration: i64, fps: u32) -> f64 {
        match self {
            Self::Frame(f) => f as f64,
            Self::Seconds(s) => s * fps as f64,
            Self::Fraction(t) => t * duration.saturating_sub(1).max(1) as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub at: KeyTime,
    pub value: f64,
}

/// A keyframed scalar track.  Values are linearly interpolated between keyframes and held
/// before the first/after the last.  A track with no keyframes always returns its default.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    default: f64,
    keyframes: Vec<Keyframe>,
}

impl Animation {
    pub fn constant(value: f64) -> Self {
        Self {
            default: value,
            keyframes: Vec::new(),
        }
    }

    /// Moves through `values` at an even pace over the whole length of the item
    pub fn spread(values: impl IntoIterator<Item = f64>) -> Self {
        let values = values.into_iter().collect_vec();
        let default = values.first().copied().unwrap_or_default();
        let last_idx = values.len().saturating_sub(1).max(1) as f64;
        Self {
            default,
            keyframes: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| Keyframe {
                    at: KeyTime::Fraction(i as f64 / last_idx),
                    value,
                })
                .collect_vec(),
        }
    }

    /// Adds a keyframe.  Keyframes can be added in any order.
    pub fn key(mut self, at: KeyTime, value: f64) -> Self {
        self.keyframes.push(Keyframe { at, value });
        self
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }
}

impl Animated for Animation {
    fn sample(&self, frame: i64, duration: i64, fps: u32) -> f64 {
        match self.keyframes.as_slice() {
            [] => return self.default,
            [only] => return only.value,
            _ => {}
        }
        // Keys can't be sorted up-front, because the order of mixed `KeyTime`s depends on the
        // item's length and frame rate
        let keys = self
            .keyframes
            .iter()
            .map(|k| (k.at.resolve(duration, fps), k.value))
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect_vec();

        let f = frame as f64;
        let idx = keys.partition_point(|(at, _)| *at <= f);
        if idx == 0 {
            return keys[0].1;
        }
        if idx >= keys.len() {
            return keys[keys.len() - 1].1;
        }
        let (a_at, a) = keys[idx - 1];
        let (b_at, b) = keys[idx];
        let t = (f - a_at) / (b_at - a_at);
        a + (b - a) * t
    }
}

//////////////
// SETTINGS //
//////////////

/// The user-facing settings of a CRT effect: one animation track per parameter.  The canvas size
/// is animated per axis, and time comes from the timeline rather than a track.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtSettings {
    pub canvas_width: Animation,
    pub canvas_height: Animation,
    pub curvature: Animation,
    pub chromatic_aberration: Animation,
    pub vignette: Animation,
    pub scanline_intensity: Animation,
    pub scanline_density: Animation,
    pub noise_amount: Animation,
    pub flicker_amount: Animation,
    pub phosphor_mask_intensity: Animation,
    pub phosphor_mask_size: Animation,
    pub brightness: Animation,
    pub contrast: Animation,
}

impl Default for CrtSettings {
    fn default() -> Self {
        Self {
            canvas_width: Animation::constant(1920.0),
            canvas_height: Animation::constant(1080.0),
            curvature: Animation::constant(0.15),
            chromatic_aberration: Animation::constant(0.8),
            vignette: Animation::constant(0.3),
            scanline_intensity: Animation::constant(0.4),
            scanline_density: Animation::constant(1.0),
            noise_amount: Animation::constant(0.03),
            flicker_amount: Animation::constant(0.02),
            phosphor_mask_intensity: Animation::constant(0.5),
            phosphor_mask_size: Animation::constant(3.0),
            brightness: Animation::constant(1.1),
            contrast: Animation::constant(1.2),
        }
    }
}

impl ParamSource for CrtSettings {
    fn sample(&self, at: SampleTime) -> CrtResult<CrtParams> {
        let s = |anim: &Animation| anim.sample(at.frame, at.duration, at.fps) as f32;
        let params = CrtParams {
            canvas_size: Vector2::new(s(&self.canvas_width), s(&self.canvas_height)),
            curvature: s(&self.curvature),
            chromatic_aberration: s(&self.chromatic_aberration),
            vignette: s(&self.vignette),
            scanline_intensity: s(&self.scanline_intensity),
            scanline_density: s(&self.scanline_density),
            noise_amount: s(&self.noise_amount),
            flicker_amount: s(&self.flicker_amount),
            phosphor_mask_intensity: s(&self.phosphor_mask_intensity),
            phosphor_mask_size: s(&self.phosphor_mask_size),
            brightness: s(&self.brightness),
            contrast: s(&self.contrast),
            time: 0.0,
        };
        params.check_finite()?;
        Ok(params)
    }
}
