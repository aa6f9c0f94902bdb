//! Custom types used for storing effect parameters and sending them to the GPU.

use std::mem::{offset_of, size_of};

use cgmath::Vector2;

use crate::error::{CrtError, CrtResult};

/// Enum of the different types which can be sent to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 32-bit floating point number
    F32,
    /// Pair of 32-bit floats
    Vec2,
}

/// Possible values of a dynamic [`Type`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    F32(f32),
    Vec2(Vector2<f32>),
}

impl Value {
    pub fn type_(self) -> Type {
        match self {
            Self::F32(_) => Type::F32,
            Self::Vec2(_) => Type::Vec2,
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            Self::F32(v) => v.is_finite(),
            Self::Vec2(v) => v.x.is_finite() && v.y.is_finite(),
        }
    }
}

////////////////
// PARAMETERS //
////////////////

/// The 13 inputs of the CRT shader.  The discriminants are the property indices used by the
/// host to address each parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    CanvasSize = 0,
    Curvature = 1,
    ChromaticAberration = 2,
    Vignette = 3,
    ScanlineIntensity = 4,
    ScanlineDensity = 5,
    NoiseAmount = 6,
    FlickerAmount = 7,
    PhosphorMaskIntensity = 8,
    PhosphorMaskSize = 9,
    Brightness = 10,
    Contrast = 11,
    Time = 12,
}

impl Param {
    pub const ALL: [Param; 13] = [
        Self::CanvasSize,
        Self::Curvature,
        Self::ChromaticAberration,
        Self::Vignette,
        Self::ScanlineIntensity,
        Self::ScanlineDensity,
        Self::NoiseAmount,
        Self::FlickerAmount,
        Self::PhosphorMaskIntensity,
        Self::PhosphorMaskSize,
        Self::Brightness,
        Self::Contrast,
        Self::Time,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn type_(self) -> Type {
        match self {
            Self::CanvasSize => Type::Vec2,
            _ => Type::F32,
        }
    }

    /// Byte offset of this parameter within [`Constants`]
    pub fn offset(self) -> usize {
        match self {
            Self::CanvasSize => offset_of!(Constants, canvas_size),
            Self::Curvature => offset_of!(Constants, curvature),
            Self::ChromaticAberration => offset_of!(Constants, chromatic_aberration),
            Self::Vignette => offset_of!(Constants, vignette),
            Self::ScanlineIntensity => offset_of!(Constants, scanline_intensity),
            Self::ScanlineDensity => offset_of!(Constants, scanline_density),
            Self::NoiseAmount => offset_of!(Constants, noise_amount),
            Self::FlickerAmount => offset_of!(Constants, flicker_amount),
            Self::PhosphorMaskIntensity => offset_of!(Constants, phosphor_mask_intensity),
            Self::PhosphorMaskSize => offset_of!(Constants, phosphor_mask_size),
            Self::Brightness => offset_of!(Constants, brightness),
            Self::Contrast => offset_of!(Constants, contrast),
            Self::Time => offset_of!(Constants, time),
        }
    }
}

/// A complete snapshot of every parameter's value for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrtParams {
    pub canvas_size: Vector2<f32>,
    pub curvature: f32,
    pub chromatic_aberration: f32,
    pub vignette: f32,
    pub scanline_intensity: f32,
    pub scanline_density: f32,
    pub noise_amount: f32,
    pub flicker_amount: f32,
    pub phosphor_mask_intensity: f32,
    pub phosphor_mask_size: f32,
    pub brightness: f32,
    pub contrast: f32,
    /// Seconds since the start of the item.  Derived from the frame position rather than
    /// animated.
    pub time: f32,
}

impl Default for CrtParams {
    fn default() -> Self {
        Self {
            canvas_size: Vector2::new(1920.0, 1080.0),
            curvature: 0.15,
            chromatic_aberration: 0.8,
            vignette: 0.3,
            scanline_intensity: 0.4,
            scanline_density: 1.0,
            noise_amount: 0.03,
            flicker_amount: 0.02,
            phosphor_mask_intensity: 0.5,
            phosphor_mask_size: 3.0,
            brightness: 1.1,
            contrast: 1.2,
            time: 0.0,
        }
    }
}

impl CrtParams {
    pub fn get(&self, param: Param) -> Value {
        match param {
            Param::CanvasSize => Value::Vec2(self.canvas_size),
            _ => Value::F32(*self.scalar(param)),
        }
    }

    /// Overwrite one parameter, checking that `value` has the right [`Type`]
    pub fn set(&mut self, param: Param, value: Value) -> CrtResult<()> {
        match (param, value) {
            (Param::CanvasSize, Value::Vec2(v)) => self.canvas_size = v,
            (Param::CanvasSize, _) | (_, Value::Vec2(_)) => {
                return Err(CrtError::TypeMismatch {
                    param,
                    expected: param.type_(),
                    found: value.type_(),
                })
            }
            (_, Value::F32(v)) => *self.scalar_mut(param) = v,
        }
        Ok(())
    }

    /// Returns an error naming the first parameter which isn't finite
    pub fn check_finite(&self) -> CrtResult<()> {
        match Param::ALL.iter().find(|p| !self.get(**p).is_finite()) {
            Some(&param) => Err(CrtError::NonFinite { param }),
            None => Ok(()),
        }
    }

    fn scalar(&self, param: Param) -> &f32 {
        match param {
            // `canvas_size` is the only vector, so callers never get here with it
            Param::CanvasSize => &self.canvas_size.x,
            Param::Curvature => &self.curvature,
            Param::ChromaticAberration => &self.chromatic_aberration,
            Param::Vignette => &self.vignette,
            Param::ScanlineIntensity => &self.scanline_intensity,
            Param::ScanlineDensity => &self.scanline_density,
            Param::NoiseAmount => &self.noise_amount,
            Param::FlickerAmount => &self.flicker_amount,
            Param::PhosphorMaskIntensity => &self.phosphor_mask_intensity,
            Param::PhosphorMaskSize => &self.phosphor_mask_size,
            Param::Brightness => &self.brightness,
            Param::Contrast => &self.contrast,
            Param::Time => &self.time,
        }
    }

    fn scalar_mut(&mut self, param: Param) -> &mut f32 {
        match param {
            Param::CanvasSize => &mut self.canvas_size.x,
            Param::Curvature => &mut self.curvature,
            Param::ChromaticAberration => &mut self.chromatic_aberration,
            Param::Vignette => &mut self.vignette,
            Param::ScanlineIntensity => &mut self.scanline_intensity,
            Param::ScanlineDensity => &mut self.scanline_density,
            Param::NoiseAmount => &mut self.noise_amount,
            Param::FlickerAmount => &mut self.flicker_amount,
            Param::PhosphorMaskIntensity => &mut self.phosphor_mask_intensity,
            Param::PhosphorMaskSize => &mut self.phosphor_mask_size,
            Param::Brightness => &mut self.brightness,
            Param::Contrast => &mut self.contrast,
            Param::Time => &mut self.time,
        }
    }
}

/// Converts a frame position into shader time in seconds.  The division happens in `f64` so that
/// long items don't drift the scanline phase; the result is only narrowed at the end.
pub fn time_seconds(frame: i64, fps: f64) -> f32 {
    (frame as f64 / fps) as f32
}

/////////////////////
// CONSTANT BUFFER //
/////////////////////

/// The binary layout of the CRT shader's constant buffer.  Every offset here is part of the ABI
/// shared with `shader/crt.wgsl`; changing one means changing the shader too.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Constants {
    canvas_size: [f32; 2],
    curvature: f32,
    chromatic_aberration: f32,
    vignette: f32,
    scanline_intensity: f32,
    scanline_density: f32,
    noise_amount: f32,
    flicker_amount: f32,
    phosphor_mask_intensity: f32,
    phosphor_mask_size: f32,
    brightness: f32,
    contrast: f32,
    time: f32,
    // Rounds the struct up to a multiple of 16 bytes, as required for uniform buffers
    padding: [f32; 2],
}

pub const CONSTANTS_SIZE: usize = 64;

const _: () = assert!(size_of::<Constants>() == CONSTANTS_SIZE);
const _: () = assert!(size_of::<Constants>() % 16 == 0);
const _: () = assert!(offset_of!(Constants, canvas_size) == 0);
const _: () = assert!(offset_of!(Constants, curvature) == 8);
const _: () = assert!(offset_of!(Constants, chromatic_aberration) == 12);
const _: () = assert!(offset_of!(Constants, vignette) == 16);
const _: () = assert!(offset_of!(Constants, scanline_intensity) == 20);
const _: () = assert!(offset_of!(Constants, scanline_density) == 24);
const _: () = assert!(offset_of!(Constants, noise_amount) == 28);
const _: () = assert!(offset_of!(Constants, flicker_amount) == 32);
const _: () = assert!(offset_of!(Constants, phosphor_mask_intensity) == 36);
const _: () = assert!(offset_of!(Constants, phosphor_mask_size) == 40);
const _: () = assert!(offset_of!(Constants, brightness) == 44);
const _: () = assert!(offset_of!(Constants, contrast) == 48);
const _: () = assert!(offset_of!(Constants, time) == 52);
const _: () = assert!(offset_of!(Constants, padding) == 56);

impl Constants {
    /// Lays out a full parameter snapshot.  Never fails; out-of-range values are the shader's
    /// problem.
    pub fn pack(params: &CrtParams) -> Self {
        Self {
            canvas_size: params.canvas_size.into(),
            curvature: params.curvature,
            chromatic_aberration: params.chromatic_aberration,
            vignette: params.vignette,
            scanline_intensity: params.scanline_intensity,
            scanline_density: params.scanline_density,
            noise_amount: params.noise_amount,
            flicker_amount: params.flicker_amount,
            phosphor_mask_intensity: params.phosphor_mask_intensity,
            phosphor_mask_size: params.phosphor_mask_size,
            brightness: params.brightness,
            contrast: params.contrast,
            time: params.time,
            padding: [0.0; 2],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn to_bytes(self) -> [u8; CONSTANTS_SIZE] {
        bytemuck::cast(self)
    }
}

/// Reads the value of `param` back out of a packed constant buffer, or `None` if `bytes` is too
/// short to contain it.
pub fn read_value(bytes: &[u8], param: Param) -> Option<Value> {
    let read_f32 = |offset: usize| {
        bytes
            .get(offset..offset + size_of::<f32>())
            .map(bytemuck::pod_read_unaligned::<f32>)
    };
    let offset = param.offset();
    Some(match param.type_() {
        Type::F32 => Value::F32(read_f32(offset)?),
        Type::Vec2 => Value::Vec2(Vector2::new(
            read_f32(offset)?,
            read_f32(offset + size_of::<f32>())?,
        )),
    })
}
