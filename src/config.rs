use crate::shader;

/// Static configuration of one effect instance, fixed for its whole lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectConfig {
    /// Used to label GPU resources and log messages
    pub label: String,
    /// Resource name of the pixel shader (see [`shader::load`])
    pub shader: String,
}

impl EffectConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_shader(mut self, shader: impl Into<String>) -> Self {
        self.shader = shader.into();
        self
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            label: "CRT".to_owned(),
            shader: shader::CRT.to_owned(),
        }
    }
}
