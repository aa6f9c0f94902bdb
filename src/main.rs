use crt_fx::{
    Animation, CrtSettings, DrawDescription, EffectConfig, EffectInstance, FrameDescription,
    FrameDriver, Outcome, WgpuSurface,
};

const FRAME_COUNT: i64 = 4;
const FPS: f64 = 30.0;

fn main() {
    env_logger::init();

    // Create the GPU surface, and load the image which the effect will be applied to
    let surface = WgpuSurface::headless().expect("Failed to open a GPU device");
    let input = match std::env::args().nth(1) {
        Some(path) => surface.load_image(&path).expect("Failed to load input image"),
        None => surface
            .upload_image("Test card", &test_card(640, 480))
            .expect("Failed to upload test card"),
    };
    let bounds = input.bounds();

    // Sweep the curvature over the length of the clip, so the output frames are all different
    let settings = CrtSettings {
        canvas_width: Animation::constant(bounds.width() as f64),
        canvas_height: Animation::constant(bounds.height() as f64),
        curvature: Animation::spread([0.0, 0.3]),
        ..CrtSettings::default()
    };
    let instance = EffectInstance::new(surface, EffectConfig::default());
    let mut driver = FrameDriver::new(instance, settings);
    if driver.create().is_none() {
        eprintln!("CRT effect couldn't be created; see the log for details");
        std::process::exit(1);
    }
    driver.set_input(Some(input));

    for frame in 0..FRAME_COUNT {
        let tick = driver.update(&FrameDescription {
            frame,
            duration: FRAME_COUNT,
            fps: FPS,
            draw: DrawDescription::default(),
        });
        if tick.outcome != Outcome::Applied {
            log::warn!("Frame {} rendered without updated parameters", frame);
        }
        driver.render(bounds).expect("Failed to render frame");

        let instance = driver.instance();
        let output = instance.output().expect("Enabled effect has no output");
        let image = instance
            .surface()
            .read_output(output)
            .expect("Failed to read output");
        image
            .save(format!("out-{}.png", frame))
            .expect("Failed to save output");
    }

    // Show how far the effect can reach outside the input
    let footprint = driver
        .map_input_rects_to_output_rect(&[bounds])
        .expect("Single input");
    println!("{:?} affects {:?}", bounds, footprint.output);
}

/// Vertical colour bars, so that curvature and colour fringes are easy to see
fn test_card(width: u32, height: u32) -> image::RgbaImage {
    const BARS: [[u8; 3]; 7] = [
        [192, 192, 192],
        [192, 192, 0],
        [0, 192, 192],
        [0, 192, 0],
        [192, 0, 192],
        [192, 0, 0],
        [0, 0, 192],
    ];
    image::RgbaImage::from_fn(width, height, |x, _y| {
        let [r, g, b] = BARS[(x * BARS.len() as u32 / width) as usize];
        image::Rgba([r, g, b, u8::MAX])
    })
}
