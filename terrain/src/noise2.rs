use crate::utils::{HeightMap2D, inverse_lerp};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const MIN_SCALE: f32 = 0.01;

// How the accumulated octave sum is mapped into [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizeMode {
    // Divide by the theoretical maximum octave sum (with a 0.9 estimate
    // factor) and clamp at zero. Consistent absolute scale across tiles,
    // required when neighboring tiles must line up seamlessly.
    Global,
    // Rescale so the tile's own minimum maps to 0 and maximum to 1.
    // Higher local contrast, breaks cross-tile continuity.
    Local,
}

// Fractal noise parameters. Immutable per generation call; `validate`
// clamps out-of-range values instead of failing.
#[derive(Clone, Debug)]
pub struct NoiseSettings {
    pub scale: f32,
    pub octaves: usize,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: u64,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            seed: 0,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseSettings {
    pub fn validate(&mut self) {
        self.scale = self.scale.max(MIN_SCALE);
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
    }
}

// 2D gradient noise primitive with a seeded permutation table
// (256 entries duplicated into 512 to avoid modulo on lookups).
pub struct Perlin2 {
    perm: [u8; 512],
}

impl Perlin2 {
    pub fn from_seed(seed: u64) -> Self {
        let mut p: Vec<u8> = (0..=255).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        // Fisher-Yates shuffle p[0..256]
        for i in (1..256).rev() {
            let j = rng.random_range(0..=i);
            p.swap(i, j);
        }
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }
        Self { perm }
    }

    // Ken Perlin's fade curve: 6t^5 - 15t^4 + 10t^3. First and second
    // derivatives are zero at t=0 and t=1.
    #[inline]
    fn fade(t: f32) -> f32 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    #[inline]
    fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + t * (b - a)
    }

    // Hash the low 4 bits into one of the 2D gradient directions and
    // return its influence on (x, y).
    #[inline]
    fn grad(hash: u8, x: f32, y: f32) -> f32 {
        let h = hash & 0xF;
        let u = if h < 8 { x } else { y };
        let v = if h < 8 { y } else { x };
        let su = if (h & 1) == 0 { u } else { -u };
        let sv = if (h & 2) == 0 { v } else { -v };
        su + sv
    }

    // Raw single-octave gradient noise at (x, y), range ≈ [-1, 1].
    fn noise(&self, x: f32, y: f32) -> f32 {
        let xi = (x.floor() as i32 & 255) as usize;
        let yi = (y.floor() as i32 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let u = Self::fade(xf);
        let v = Self::fade(yf);

        let aa = self.perm[(self.perm[xi] as usize + yi) & 255];
        let ab = self.perm[(self.perm[xi] as usize + ((yi + 1) & 255)) & 255];
        let ba = self.perm[(self.perm[(xi + 1) & 255] as usize + yi) & 255];
        let bb = self.perm[(self.perm[(xi + 1) & 255] as usize + ((yi + 1) & 255)) & 255];

        let x1 = Self::lerp(Self::grad(aa, xf, yf), Self::grad(ba, xf - 1.0, yf), u);
        let x2 = Self::lerp(
            Self::grad(ab, xf, yf - 1.0),
            Self::grad(bb, xf - 1.0, yf - 1.0),
            u,
        );
        Self::lerp(x1, x2, v) * std::f32::consts::FRAC_1_SQRT_2
    }

    // Gradient noise remapped to its native [0, 1] range.
    #[inline]
    pub fn sample01(&self, x: f32, y: f32) -> f32 {
        self.noise(x, y) * 0.5 + 0.5
    }
}

// Generate a width×height grid of layered gradient noise around
// `sample_centre`. One 2D offset is drawn per octave from a generator
// seeded with `settings.seed` (shifted by the centre so neighboring
// tiles sample a continuous underlying field). Deterministic for
// identical seed + settings + centre, and safe to call concurrently:
// every invocation owns its generator.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    settings: &NoiseSettings,
    sample_centre: Vec2,
) -> HeightMap2D {
    let mut settings = settings.clone();
    settings.validate();

    let mut prng = ChaCha8Rng::seed_from_u64(settings.seed);
    let octave_offsets: Vec<Vec2> = (0..settings.octaves)
        .map(|_| {
            Vec2::new(
                prng.random_range(-100_000..100_000) as f32 + sample_centre.x,
                prng.random_range(-100_000..100_000) as f32 - sample_centre.y,
            )
        })
        .collect();
    let max_possible_height: f32 = (0..settings.octaves)
        .map(|i| settings.persistence.powi(i as i32))
        .sum();

    let perlin = Perlin2::from_seed(settings.seed);
    let half_width = width as f32 / 2.0;
    let half_height = height as f32 / 2.0;
    let mut min_local = f32::MAX;
    let mut max_local = f32::MIN;
    let mut noise_map = vec![vec![0.0f32; width]; height];

    for y in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0;
            let mut frequency = 1.0;
            let mut noise_height = 0.0;
            for offset in &octave_offsets {
                let sample_x = (x as f32 - half_width + offset.x) / settings.scale * frequency;
                let sample_y = (y as f32 - half_height + offset.y) / settings.scale * frequency;
                let perlin_value = perlin.sample01(sample_x, sample_y) * 2.0 - 1.0;
                noise_height += perlin_value * amplitude;
                amplitude *= settings.persistence;
                frequency *= settings.lacunarity;
            }
            min_local = min_local.min(noise_height);
            max_local = max_local.max(noise_height);
            noise_map[y][x] = match settings.normalize_mode {
                NormalizeMode::Global => {
                    ((noise_height + 1.0) / (max_possible_height / 0.9)).max(0.0)
                }
                NormalizeMode::Local => noise_height,
            };
        }
    }

    if settings.normalize_mode == NormalizeMode::Local {
        for row in noise_map.iter_mut() {
            for value in row.iter_mut() {
                *value = inverse_lerp(min_local, max_local, *value);
            }
        }
    }

    noise_map
}
