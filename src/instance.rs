use log::{debug, error, trace};

use crate::{
    config::EffectConfig,
    effects::{Crt, EffectType},
    error::CrtResult,
    footprint::{self, OutputRects, Rect},
    shader,
    surface::{Footprint, Surface},
    types::{Constants, CrtParams, Param, Value},
};

/// Lifecycle of an [`EffectInstance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// [`EffectInstance::create`] hasn't been called yet
    Uncreated,
    /// GPU resources are live and parameter updates reach the shader
    Enabled,
    /// Creation failed.  The instance holds no GPU resources and ignores updates.
    Disabled,
    Destroyed,
}

/// The GPU resources held by an enabled instance.  These are always acquired and released
/// together.
struct Live<S: Surface> {
    shader: S::Shader,
    output: S::Output,
}

/// One CRT stage in the host's effect chain.  Owns its shader, constant buffer and output image;
/// the input image belongs to the host and is only held until it is cleared or replaced.
pub struct EffectInstance<S: Surface> {
    config: EffectConfig,
    effect: Crt,
    surface: S,
    state: State,
    live: Option<Live<S>>,
    input: Option<S::Image>,

    /// The last complete parameter snapshot, and its packed form
    params: CrtParams,
    constants: Constants,
}

impl<S: Surface> EffectInstance<S> {
    pub fn new(surface: S, config: EffectConfig) -> Self {
        let params = CrtParams::default();
        Self {
            effect: Crt::new(config.shader.clone()),
            config,
            surface,
            state: State::Uncreated,
            live: None,
            input: None,

            constants: Constants::pack(&params),
            params,
        }
    }

    /// Acquire the shader and output image.  Returns the output image, or `None` if the instance
    /// is (or has just become) disabled.  Failure is never retried.
    pub fn create(&mut self) -> Option<&S::Output> {
        match self.state {
            State::Enabled => {}
            State::Uncreated => match self.acquire() {
                Ok(live) => {
                    debug!("{} effect created", self.config.label);
                    self.live = Some(live);
                    self.state = State::Enabled;
                }
                Err(e) => {
                    error!("Failed to create {} effect: {}", self.config.label, e);
                    self.state = State::Disabled;
                }
            },
            State::Disabled | State::Destroyed => {}
        }
        self.output()
    }

    /// Creates the GPU resources, releasing anything partially acquired if a later step fails
    fn acquire(&mut self) -> CrtResult<Live<S>> {
        let source = shader::load(self.effect.shader_name())?;
        let shader = self.surface.create_shader(&self.config.label, source)?;
        match self.surface.create_output(&self.config.label, &shader) {
            Ok(output) => Ok(Live { shader, output }),
            Err(e) => {
                self.surface.release_shader(shader);
                Err(e)
            }
        }
    }

    /// Bind the host's input image, or unbind it with `None`.  Does nothing unless enabled.
    pub fn set_input(&mut self, input: Option<S::Image>) {
        match &mut self.live {
            Some(live) => {
                self.surface.bind_input(&mut live.shader, input.as_ref());
                self.input = input;
            }
            None => trace!("Ignoring input for {:?} {} effect", self.state, self.config.label),
        }
    }

    /// Drop the reference to the input image.  Safe to call any number of times, in any state.
    pub fn clear_input(&mut self) {
        if self.input.take().is_some() {
            if let Some(live) = &mut self.live {
                self.surface.bind_input(&mut live.shader, None);
            }
        }
    }

    /// Change a single parameter.  The whole constant buffer is repacked and uploaded.
    pub fn set_value(&mut self, param: Param, value: Value) -> CrtResult<()> {
        self.params.set(param, value)?;
        self.upload()
    }

    /// Replace every parameter at once, with one repack and one upload
    pub fn apply_parameters(&mut self, params: &CrtParams) -> CrtResult<()> {
        self.params = *params;
        self.upload()
    }

    fn upload(&mut self) -> CrtResult<()> {
        self.constants = Constants::pack(&self.params);
        match &self.live {
            Some(live) => {
                trace!("Uploading {} constants: {:?}", self.config.label, self.params);
                self.surface
                    .upload_constants(&live.shader, self.constants.as_bytes())
            }
            // Not an error: the host may still be building or tearing down the chain
            None => {
                trace!("Not uploading constants to {:?} effect", self.state);
                Ok(())
            }
        }
    }

    /// Render `output_rect` of the output image, reading from the input footprint of that rect
    pub fn render(&mut self, output_rect: Rect) -> CrtResult<()> {
        let live = match &mut self.live {
            Some(live) => live,
            None => return Ok(()),
        };
        let mut input = [Rect::EMPTY];
        footprint::map_output_rect_to_input_rects(&self.effect, output_rect, &mut input)?;
        let footprint = Footprint {
            input: input[0],
            output: output_rect,
        };
        self.surface.draw(&live.shader, &mut live.output, footprint)
    }

    /// Release all GPU resources and the input reference.  Idempotent; also run on drop.
    pub fn destroy(&mut self) {
        self.input = None;
        if let Some(Live { shader, output }) = self.live.take() {
            self.surface.release_output(output);
            self.surface.release_shader(shader);
            debug!("{} effect destroyed", self.config.label);
        }
        self.state = State::Destroyed;
    }

    ///////////////
    // FOOTPRINT //
    ///////////////

    pub fn map_input_rects_to_output_rect(&self, input_rects: &[Rect]) -> CrtResult<OutputRects> {
        footprint::map_input_rects_to_output_rect(&self.effect, input_rects)
    }

    pub fn map_output_rect_to_input_rects(
        &self,
        output_rect: Rect,
        input_rects: &mut [Rect],
    ) -> CrtResult<()> {
        footprint::map_output_rect_to_input_rects(&self.effect, output_rect, input_rects)
    }

    ///////////////
    // ACCESSORS //
    ///////////////

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == State::Enabled
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn effect(&self) -> &Crt {
        &self.effect
    }

    pub fn params(&self) -> &CrtParams {
        &self.params
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn output(&self) -> Option<&S::Output> {
        self.live.as_ref().map(|live| &live.output)
    }

    pub fn input(&self) -> Option<&S::Image> {
        self.input.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: Surface> Drop for EffectInstance<S> {
    fn drop(&mut self) {
        if self.state != State::Destroyed {
            self.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector2;

    use super::*;
    use crate::{
        surface::{Call, Failures, Recorder},
        types::read_value,
    };

    fn created() -> (EffectInstance<Recorder>, Recorder) {
        let recorder = Recorder::new();
        let mut instance = EffectInstance::new(recorder.clone(), EffectConfig::default());
        assert_eq!(instance.create(), Some(&2));
        (instance, recorder)
    }

    #[test]
    fn create_acquires_shader_then_output() {
        let (instance, recorder) = created();
        assert_eq!(instance.state(), State::Enabled);
        assert_eq!(
            recorder.calls(),
            vec![Call::CreateShader(1), Call::CreateOutput(2)]
        );
    }

    #[test]
    fn create_twice_reuses_resources() {
        let (mut instance, recorder) = created();
        assert_eq!(instance.create(), Some(&2));
        assert_eq!(recorder.calls().len(), 2);
    }

    #[test]
    fn failed_output_releases_shader() {
        let recorder = Recorder::failing(Failures {
            create_output: true,
            ..Failures::default()
        });
        let mut instance = EffectInstance::new(recorder.clone(), EffectConfig::default());
        assert_eq!(instance.create(), None);
        assert_eq!(instance.state(), State::Disabled);
        assert_eq!(
            recorder.calls(),
            vec![Call::CreateShader(1), Call::ReleaseShader(1)]
        );

        // No retries, even if the surface would now succeed
        recorder.set_failures(Failures::default());
        assert_eq!(instance.create(), None);
        assert_eq!(recorder.calls().len(), 2);
    }

    #[test]
    fn missing_shader_disables_without_touching_gpu() {
        let recorder = Recorder::new();
        let config = EffectConfig::default().with_shader("CRTShader.cso");
        let mut instance = EffectInstance::new(recorder.clone(), config);
        assert_eq!(instance.create(), None);
        assert_eq!(instance.state(), State::Disabled);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn disabled_instance_ignores_updates() {
        let recorder = Recorder::failing(Failures {
            create_shader: true,
            ..Failures::default()
        });
        let mut instance = EffectInstance::new(recorder.clone(), EffectConfig::default());
        // Uncreated
        assert!(instance.apply_parameters(&CrtParams::default()).is_ok());
        assert!(instance.set_value(Param::Curvature, Value::F32(0.3)).is_ok());
        // Disabled
        assert_eq!(instance.create(), None);
        assert!(instance.apply_parameters(&CrtParams::default()).is_ok());
        instance.set_input(Some(7));
        assert!(instance.render(Rect::from_origin(10, 10)).is_ok());

        assert_eq!(recorder.count(|c| matches!(c, Call::Upload(_))), 0);
        assert!(recorder.calls().is_empty());
        assert_eq!(instance.input(), None);
    }

    #[test]
    fn apply_parameters_uploads_once() {
        let (mut instance, recorder) = created();
        let params = CrtParams {
            curvature: 0.15,
            brightness: 1.1,
            contrast: 1.2,
            time: 1.0,
            ..CrtParams::default()
        };
        instance.apply_parameters(&params).unwrap();

        let uploads = recorder.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].len(), 64);
        assert_eq!(read_value(&uploads[0], Param::Time), Some(Value::F32(1.0)));
        assert_eq!(
            read_value(&uploads[0], Param::Curvature),
            Some(Value::F32(0.15))
        );
    }

    #[test]
    fn set_value_repacks_whole_buffer() {
        let (mut instance, recorder) = created();
        instance
            .set_value(Param::CanvasSize, Value::Vec2(Vector2::new(640.0, 480.0)))
            .unwrap();
        instance.set_value(Param::Vignette, Value::F32(0.9)).unwrap();

        let uploads = recorder.uploads();
        assert_eq!(uploads.len(), 2);
        // The second upload still carries the first change
        assert_eq!(
            read_value(&uploads[1], Param::CanvasSize),
            Some(Value::Vec2(Vector2::new(640.0, 480.0)))
        );
        assert_eq!(read_value(&uploads[1], Param::Vignette), Some(Value::F32(0.9)));
        assert_eq!(uploads[1], instance.constants().as_bytes());
    }

    #[test]
    fn mistyped_value_is_rejected_without_upload() {
        let (mut instance, recorder) = created();
        assert!(instance.set_value(Param::Time, Value::Vec2(Vector2::new(0.0, 0.0))).is_err());
        assert!(recorder.uploads().is_empty());
    }

    #[test]
    fn input_binding_and_clearing() {
        let (mut instance, recorder) = created();
        instance.set_input(Some(7));
        assert_eq!(instance.input(), Some(&7));
        instance.clear_input();
        instance.clear_input();
        assert_eq!(instance.input(), None);
        assert_eq!(
            recorder.count(|c| matches!(c, Call::BindInput(_))),
            2,
            "second clear should be a no-op"
        );
        assert_eq!(recorder.calls()[3], Call::BindInput(None));
    }

    #[test]
    fn render_draws_over_expanded_footprint() {
        let (mut instance, recorder) = created();
        instance.render(Rect::from_origin(1920, 1080)).unwrap();
        assert_eq!(
            recorder.calls().last(),
            Some(&Call::Draw(Footprint {
                input: Rect::new(-2000, -2000, 3920, 3080),
                output: Rect::from_origin(1920, 1080),
            }))
        );
    }

    #[test]
    fn drop_releases_everything_once() {
        let (mut instance, recorder) = created();
        instance.set_input(Some(7));
        instance.destroy();
        assert_eq!(instance.state(), State::Destroyed);
        assert_eq!(instance.input(), None);
        instance.destroy();
        drop(instance);
        assert_eq!(recorder.count(|c| matches!(c, Call::ReleaseOutput(2))), 1);
        assert_eq!(recorder.count(|c| matches!(c, Call::ReleaseShader(1))), 1);
    }

    #[test]
    fn dropping_enabled_instance_releases_resources() {
        let (instance, recorder) = created();
        drop(instance);
        assert_eq!(
            &recorder.calls()[2..],
            &[Call::ReleaseOutput(2), Call::ReleaseShader(1)]
        );
    }

    #[test]
    fn destroyed_instance_cannot_be_recreated() {
        let (mut instance, recorder) = created();
        instance.destroy();
        assert_eq!(instance.create(), None);
        assert_eq!(recorder.count(|c| matches!(c, Call::CreateShader(_))), 1);
    }
}
