//! Runs whole clips through a `FrameDriver`, the way a host would.

use crt_fx::{
    surface::{Call, Failures, Recorder},
    types::read_value,
    Animation, CrtError, CrtParams, CrtResult, CrtSettings, DrawDescription, EffectConfig,
    EffectInstance, FrameDescription, FrameDriver, Outcome, Param, ParamSource, Reason, Rect,
    SampleTime, State, Value, EXPANSION_MARGIN,
};

const DURATION: i64 = 100;

fn frame(frame: i64) -> FrameDescription {
    FrameDescription {
        frame,
        duration: DURATION,
        fps: 30.0,
        draw: DrawDescription::default(),
    }
}

/// Default settings, except that sampling fails on one frame
struct FailsOn {
    frame: i64,
    settings: CrtSettings,
}

impl ParamSource for FailsOn {
    fn sample(&self, at: SampleTime) -> CrtResult<CrtParams> {
        if at.frame == self.frame {
            return Err(CrtError::sample("keyframe store unavailable"));
        }
        self.settings.sample(at)
    }
}

fn driver_failing_on(bad_frame: i64) -> (FrameDriver<Recorder, FailsOn>, Recorder) {
    let recorder = Recorder::new();
    let instance = EffectInstance::new(recorder.clone(), EffectConfig::default());
    let source = FailsOn {
        frame: bad_frame,
        settings: CrtSettings {
            vignette: Animation::spread([0.0, 1.0]),
            ..CrtSettings::default()
        },
    };
    let mut driver = FrameDriver::new(instance, source);
    assert!(driver.create().is_some());
    (driver, recorder)
}

#[test]
fn one_bad_frame_in_a_clip_only_affects_itself() {
    let (mut driver, recorder) = driver_failing_on(50);

    let mut passed_through = Vec::new();
    for f in 0..DURATION {
        let tick = driver.update(&frame(f));
        assert_eq!(tick.draw, DrawDescription::default());
        if let Outcome::PassThrough(reason) = tick.outcome {
            passed_through.push((f, reason));
        }
    }

    assert_eq!(
        passed_through,
        vec![(
            50,
            Reason::Failed(CrtError::sample("keyframe store unavailable"))
        )]
    );
    let uploads = recorder.uploads();
    assert_eq!(uploads.len(), DURATION as usize - 1);
    // Frames 49 and 51 land either side of the gap
    assert_eq!(
        read_value(&uploads[49], Param::Time),
        Some(Value::F32((49.0f64 / 30.0) as f32))
    );
    assert_eq!(
        read_value(&uploads[50], Param::Time),
        Some(Value::F32((51.0f64 / 30.0) as f32))
    );
    assert_eq!(driver.instance().state(), State::Enabled);
}

#[test]
fn surface_errors_mid_clip_are_recovered() {
    let (mut driver, recorder) = driver_failing_on(-1);
    for f in 0..10 {
        if f == 5 {
            recorder.set_failures(Failures {
                upload: true,
                ..Failures::default()
            });
        }
        let outcome = driver.update(&frame(f)).outcome;
        if f == 5 {
            assert!(matches!(
                outcome,
                Outcome::PassThrough(Reason::Failed(CrtError::Surface(_)))
            ));
            recorder.set_failures(Failures::default());
        } else {
            assert_eq!(outcome, Outcome::Applied);
        }
    }
    assert_eq!(recorder.uploads().len(), 9);
}

#[test]
fn failed_creation_disables_the_whole_clip() {
    let recorder = Recorder::failing(Failures {
        create_output: true,
        ..Failures::default()
    });
    let instance = EffectInstance::new(recorder.clone(), EffectConfig::default());
    let mut driver = FrameDriver::new(instance, CrtSettings::default());
    assert!(driver.create().is_none());

    // The shader was created, then released when the output couldn't be
    assert_eq!(recorder.calls(), vec![Call::CreateShader(1), Call::ReleaseShader(1)]);

    recorder.set_failures(Failures::default());
    assert!(driver.create().is_none());
    for f in 0..DURATION {
        assert_eq!(
            driver.update(&frame(f)).outcome,
            Outcome::PassThrough(Reason::Disabled)
        );
    }
    assert!(driver.render(Rect::from_origin(64, 64)).is_ok());
    assert_eq!(recorder.calls().len(), 2);
}

#[test]
fn host_pipeline_round_trip() {
    let (mut driver, recorder) = driver_failing_on(-1);
    driver.set_input(Some(7));

    let frame_rect = Rect::from_origin(1920, 1080);
    let affected = driver.map_input_rects_to_output_rect(&[frame_rect]).unwrap();
    assert_eq!(affected.output, frame_rect.expand(EXPANSION_MARGIN));
    assert_eq!(affected.opaque_sub_rect, Rect::EMPTY);

    driver.update(&frame(0));
    driver.render(frame_rect).unwrap();
    driver.clear_input();
    driver.clear_input();
    drop(driver);

    let calls = recorder.calls();
    assert_eq!(
        calls.iter().filter(|c| matches!(c, Call::BindInput(None))).count(),
        1
    );
    assert!(calls.contains(&Call::Draw(crt_fx::surface::Footprint {
        input: frame_rect.expand(EXPANSION_MARGIN),
        output: frame_rect,
    })));
    // Dropping the driver releases the output, then the shader
    assert_eq!(
        &calls[calls.len() - 2..],
        &[Call::ReleaseOutput(2), Call::ReleaseShader(1)]
    );
}
