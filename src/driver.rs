//! Per-frame updates of an [`EffectInstance`], driven by the host's compositing ticks.

use cgmath::Vector2;
use log::{error, warn};

use crate::{
    anim::{ParamSource, SampleTime},
    error::{CrtError, CrtResult},
    footprint::{OutputRects, Rect},
    instance::EffectInstance,
    surface::Surface,
    types::{time_seconds, Param},
};

/// How the host will place the stage's output.  The CRT effect never changes this; it is handed
/// back exactly as it came in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawDescription {
    pub position: Vector2<f32>,
    pub zoom: Vector2<f32>,
    /// Rotation in degrees
    pub rotation: f32,
    pub opacity: f32,
}

impl Default for DrawDescription {
    fn default() -> Self {
        Self {
            position: Vector2::new(0.0, 0.0),
            zoom: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Everything the host tells the stage about the frame being composited
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescription {
    /// Frame index relative to the start of the item
    pub frame: i64,
    /// Length of the item in frames
    pub duration: i64,
    /// Timeline frame rate.  May be fractional (e.g. 29.97).
    pub fps: f64,
    pub draw: DrawDescription,
}

/// The result of one compositing tick
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub draw: DrawDescription,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every parameter was sampled and uploaded
    Applied,
    /// The shader wasn't updated this frame
    PassThrough(Reason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// The instance isn't enabled (not created yet, creation failed, or destroyed)
    Disabled,
    /// Updating failed for this frame only.  The next frame tries again.
    Failed(CrtError),
}

/// Drives one [`EffectInstance`] from a [`ParamSource`].  This is the object the host talks to.
pub struct FrameDriver<S: Surface, P: ParamSource> {
    instance: EffectInstance<S>,
    source: P,
}

impl<S: Surface, P: ParamSource> FrameDriver<S, P> {
    pub fn new(instance: EffectInstance<S>, source: P) -> Self {
        Self { instance, source }
    }

    /// Bring the parameters up to date with `desc`.  Never fails: anything which goes wrong is
    /// logged and the frame passes through untouched.
    pub fn update(&mut self, desc: &FrameDescription) -> Tick {
        let outcome = if !self.instance.is_enabled() {
            Outcome::PassThrough(Reason::Disabled)
        } else {
            match self.try_update(desc) {
                Ok(()) => Outcome::Applied,
                Err(e) => {
                    let label = &self.instance.config().label;
                    if e.is_transient() {
                        warn!("{} frame {} passed through: {}", label, desc.frame, e);
                    } else {
                        // Retrying next frame won't help; the host is miswired or a resource
                        // is missing
                        error!("{} frame {} passed through: {}", label, desc.frame, e);
                    }
                    Outcome::PassThrough(Reason::Failed(e))
                }
            }
        };
        Tick {
            draw: desc.draw,
            outcome,
        }
    }

    fn try_update(&mut self, desc: &FrameDescription) -> CrtResult<()> {
        if !(desc.fps > 0.0 && desc.fps.is_finite()) {
            return Err(CrtError::NonFinite { param: Param::Time });
        }
        let at = SampleTime {
            frame: desc.frame,
            duration: desc.duration,
            // Samplers work with whole frame rates; only `Time` sees the fractional part
            fps: desc.fps as u32,
        };
        let mut params = self.source.sample(at)?;
        params.time = time_seconds(desc.frame, desc.fps);
        params.check_finite()?;
        self.instance.apply_parameters(&params)
    }

    ///////////////////
    // HOST PIPELINE //
    ///////////////////

    pub fn create(&mut self) -> Option<&S::Output> {
        self.instance.create()
    }

    pub fn set_input(&mut self, input: Option<S::Image>) {
        self.instance.set_input(input);
    }

    pub fn clear_input(&mut self) {
        self.instance.clear_input();
    }

    pub fn render(&mut self, output_rect: Rect) -> CrtResult<()> {
        self.instance.render(output_rect)
    }

    pub fn map_input_rects_to_output_rect(&self, input_rects: &[Rect]) -> CrtResult<OutputRects> {
        self.instance.map_input_rects_to_output_rect(input_rects)
    }

    pub fn map_output_rect_to_input_rects(
        &self,
        output_rect: Rect,
        input_rects: &mut [Rect],
    ) -> CrtResult<()> {
        self.instance
            .map_output_rect_to_input_rects(output_rect, input_rects)
    }

    pub fn instance(&self) -> &EffectInstance<S> {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut EffectInstance<S> {
        &mut self.instance
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }
}
