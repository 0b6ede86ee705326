use math::hcm::{vec2, Vec2};
use rand::Rng;
use std::str::FromStr;

/// What each camera ray evaluates to. `Color` is the product sampler; the others are
/// debugging aids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    Color,
    Normal,
    Uv,
    Eyelight,
}

impl FromStr for SamplerKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "color" => Ok(SamplerKind::Color),
            "normal" => Ok(SamplerKind::Normal),
            "uv" => Ok(SamplerKind::Uv),
            "eyelight" => Ok(SamplerKind::Eyelight),
            other => Err(format!("unknown sampler {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antialiasing {
    RandomSampling,
    SuperSampling,
}

impl FromStr for Antialiasing {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "random_sampling" => Ok(Antialiasing::RandomSampling),
            "super_sampling" => Ok(Antialiasing::SuperSampling),
            other => Err(format!("unknown antialiasing {:?}", other)),
        }
    }
}

impl Antialiasing {
    /// Sub-pixel offset in [0, 1)^2 for accumulated sample `pass` out of `total`.
    /// Supersampling walks a deterministic ceil(sqrt(N))-wide grid of cell centers;
    /// random sampling draws from the per-pixel RNG.
    pub fn sample_offset<R: Rng>(self, pass: u32, total: u32, rng: &mut R) -> Vec2 {
        match self {
            Antialiasing::RandomSampling => vec2(rng.gen::<f32>(), rng.gen::<f32>()),
            Antialiasing::SuperSampling => {
                let grid = (total as f32).sqrt().ceil() as u32;
                let cell = pass % (grid * grid);
                vec2(
                    (cell % grid) as f32 + 0.5,
                    (cell / grid) as f32 + 0.5,
                ) / grid as f32
            }
        }
    }
}
