//! A CRT-screen post-processing stage for a video compositor.
//!
//! The stage has one input image and one output image.  Each frame, the host asks a
//! [`FrameDriver`] to sample the effect's parameters and upload them to the GPU, then asks for a
//! region of the output to be rendered.  The output footprint is the input footprint grown by
//! [`EXPANSION_MARGIN`] on every side, so that screen curvature has room to sample from.
//!
//! All GPU access goes through the [`Surface`] trait: [`WgpuSurface`] renders with wgpu, and
//! `surface::Recorder` (behind the `testing` feature) just logs what it was asked to do.

pub mod anim;
pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod footprint;
pub mod gpu;
pub mod instance;
pub mod shader;
pub mod surface;
pub mod tex;
pub mod types;

pub use anim::{Animation, CrtSettings, KeyTime, ParamSource, SampleTime};
pub use config::EffectConfig;
pub use driver::{DrawDescription, FrameDescription, FrameDriver, Outcome, Reason, Tick};
pub use error::{CrtError, CrtResult};
pub use footprint::{OutputRects, Rect, EXPANSION_MARGIN};
pub use gpu::WgpuSurface;
pub use instance::{EffectInstance, State};
pub use surface::Surface;
pub use types::{Constants, CrtParams, Param, Value};
