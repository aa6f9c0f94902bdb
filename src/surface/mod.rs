//! The seam between an [`EffectInstance`](crate::instance::EffectInstance) and whatever actually
//! runs the shader.

#[cfg(any(test, feature = "testing"))]
mod recorder;

#[cfg(any(test, feature = "testing"))]
pub use recorder::{Call, Failures, Recorder};

use crate::{error::CrtResult, footprint::Rect};

/// The pair of rects over which a single draw call operates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    /// Region of the input which the shader may read
    pub input: Rect,
    /// Region of the output which is being rendered
    pub output: Rect,
}

/// GPU resources required by one effect instance.  Creation and release are synchronous.
pub trait Surface {
    /// A compiled shader, plus any state needed to draw with it
    type Shader;
    /// Handle to an image owned by the host, which can be bound as the effect's input
    type Image: Clone;
    /// The image into which the effect renders
    type Output;

    fn create_shader(&mut self, label: &str, source: &str) -> CrtResult<Self::Shader>;

    fn create_output(&mut self, label: &str, shader: &Self::Shader) -> CrtResult<Self::Output>;

    /// Bind (or unbind, if `None`) the image which `shader` reads from
    fn bind_input(&mut self, shader: &mut Self::Shader, input: Option<&Self::Image>);

    /// Replace the contents of `shader`'s constant buffer with `constants`
    fn upload_constants(&mut self, shader: &Self::Shader, constants: &[u8]) -> CrtResult<()>;

    fn draw(
        &mut self,
        shader: &Self::Shader,
        output: &mut Self::Output,
        footprint: Footprint,
    ) -> CrtResult<()>;

    fn release_output(&mut self, output: Self::Output) {
        drop(output);
    }

    fn release_shader(&mut self, shader: Self::Shader) {
        drop(shader);
    }
}
