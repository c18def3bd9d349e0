use crate::heightfield::HeightMap;
use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{Gradient, LinSrgb};

// 2D height map: row-major Vec<Vec<f32>> of size height×width
// access as `map[y][x]`.
pub type HeightMap2D = Vec<Vec<f32>>;

// flatten a 2D height map (row-major) into a single Vec<f32>
// For converting to an image buffer (e.g. grayscale u8) in the host UI
pub fn flatten2(map: &HeightMap2D) -> Vec<f32> {
    map.iter().flat_map(|row| row.iter().cloned()).collect()
}

// Where does `v` sit between `a` and `b`? Result clamped to [0, 1].
// Returns 0 for a degenerate range.
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() < f32::EPSILON {
        return 0.0;
    }
    ((v - a) / (b - a)).clamp(0.0, 1.0)
}

// Grayscale preview of a height map: min maps to black, max to white.
pub fn height_map_to_image(height_map: &HeightMap) -> GrayImage {
    let height = height_map.values.len();
    let width = height_map.values[0].len();
    let mut img = GrayImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let t = inverse_lerp(
                height_map.min_value,
                height_map.max_value,
                height_map.values[y][x],
            );
            let gray = (t * 255.0).round() as u8;
            img.put_pixel(x as u32, y as u32, Luma([gray]));
        }
    }
    img
}

// Color ramp shared by the demo binaries:
// deep water, sand, grass, rock, snow.
pub fn terrain_gradient() -> Gradient<LinSrgb> {
    Gradient::with_domain(vec![
        (0.00, LinSrgb::new(0.0, 0.0, 0.5)),
        (0.30, LinSrgb::new(0.8, 0.8, 0.5)),
        (0.50, LinSrgb::new(0.1, 0.6, 0.2)),
        (0.75, LinSrgb::new(0.5, 0.4, 0.3)),
        (1.00, LinSrgb::new(1.0, 1.0, 1.0)),
    ])
}

// Color preview of a height map through the terrain gradient.
pub fn height_map_to_color_image(height_map: &HeightMap) -> RgbImage {
    let gradient = terrain_gradient();
    let height = height_map.values.len();
    let width = height_map.values[0].len();
    let mut img = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let t = inverse_lerp(
                height_map.min_value,
                height_map.max_value,
                height_map.values[y][x],
            );
            let col: LinSrgb = gradient.get(t);
            let rgb = col.into_format::<u8>();
            img.put_pixel(x as u32, y as u32, Rgb([rgb.red, rgb.green, rgb.blue]));
        }
    }
    img
}
