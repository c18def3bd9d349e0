use crate::noise2::{NoiseSettings, generate_noise_map};
use crate::utils::HeightMap2D;
use glam::Vec2;

// Piecewise-linear transfer curve over [0, 1], sampled by keyframes.
// Cheap to clone, which is how worker threads get their private copy
// before evaluating it.
#[derive(Clone, Debug)]
pub struct HeightCurve {
    keys: Vec<(f32, f32)>,
}

impl HeightCurve {
    // Keys are (time, value) pairs; they are sorted by time on
    // construction. At least one key is required.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        assert!(!keys.is_empty(), "height curve needs at least one key");
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    // Identity ramp: evaluate(t) == t over [0, 1].
    pub fn linear() -> Self {
        Self::new(vec![(0.0, 0.0), (1.0, 1.0)])
    }

    // Sample the curve at `t`. Outside the key range the end values
    // are held constant.
    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.keys.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                let f = (t - t0) / span;
                return v0 + (v1 - v0) * f;
            }
        }
        last.1
    }
}

// Elevation settings: noise layered through the transfer curve and a
// world-space height multiplier.
#[derive(Clone, Debug)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    pub height_multiplier: f32,
    pub curve: HeightCurve,
}

impl HeightMapSettings {
    // World-space elevation bounds, used by color-ramp material
    // binding on the host side.
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.curve.evaluate(0.0)
    }

    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.curve.evaluate(1.0)
    }
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 1.0,
            curve: HeightCurve::linear(),
        }
    }
}

// Elevation samples for one tile plus the observed value range.
// Built once per (tile, settings) pair, immutable afterwards.
#[derive(Clone, Debug)]
pub struct HeightMap {
    pub values: HeightMap2D,
    pub min_value: f32,
    pub max_value: f32,
}

// Run the noise sampler and push every sample through the transfer
// curve: `value = raw * curve(raw) * height_multiplier`. The curve is
// cloned first so concurrent generation calls never share an
// evaluator.
pub fn generate_height_map(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    sample_centre: Vec2,
) -> HeightMap {
    let mut values = generate_noise_map(width, height, &settings.noise, sample_centre);
    let curve = settings.curve.clone();
    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;
    for row in values.iter_mut() {
        for v in row.iter_mut() {
            let value = *v * curve.evaluate(*v) * settings.height_multiplier;
            *v = value;
            min_value = min_value.min(value);
            max_value = max_value.max(value);
        }
    }
    HeightMap {
        values,
        min_value,
        max_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise2::NormalizeMode;

    #[test]
    fn curve_holds_end_values_outside_domain() {
        let curve = HeightCurve::new(vec![(0.0, 0.2), (1.0, 0.8)]);
        assert_eq!(curve.evaluate(-1.0), 0.2);
        assert_eq!(curve.evaluate(2.0), 0.8);
    }

    #[test]
    fn curve_interpolates_linearly() {
        let curve = HeightCurve::new(vec![(0.0, 0.0), (0.5, 1.0), (1.0, 0.0)]);
        assert!((curve.evaluate(0.25) - 0.5).abs() < 1e-6);
        assert!((curve.evaluate(0.75) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn curve_sorts_unordered_keys() {
        let curve = HeightCurve::new(vec![(1.0, 1.0), (0.0, 0.0)]);
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn height_map_tracks_min_max() {
        let settings = HeightMapSettings {
            height_multiplier: 10.0,
            ..Default::default()
        };
        let hm = generate_height_map(33, 33, &settings, Vec2::ZERO);
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for row in &hm.values {
            for &v in row {
                min = min.min(v);
                max = max.max(v);
            }
        }
        assert_eq!(hm.min_value, min);
        assert_eq!(hm.max_value, max);
        assert!(max > min);
    }

    #[test]
    fn multiplier_scales_elevation() {
        let mut settings = HeightMapSettings::default();
        settings.noise.normalize_mode = NormalizeMode::Local;
        let base = generate_height_map(17, 17, &settings, Vec2::ZERO);
        settings.height_multiplier = 3.0;
        let scaled = generate_height_map(17, 17, &settings, Vec2::ZERO);
        for y in 0..17 {
            for x in 0..17 {
                assert!((scaled.values[y][x] - base.values[y][x] * 3.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn min_max_height_follow_curve_ends() {
        let settings = HeightMapSettings {
            height_multiplier: 20.0,
            curve: HeightCurve::new(vec![(0.0, 0.1), (1.0, 0.9)]),
            ..Default::default()
        };
        assert!((settings.min_height() - 2.0).abs() < 1e-6);
        assert!((settings.max_height() - 18.0).abs() < 1e-6);
    }
}
