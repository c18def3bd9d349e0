use glam::Vec2;
use std::path::Path;
use terrain::heightfield::{HeightCurve, HeightMapSettings, generate_height_map};
use terrain::noise2::{NoiseSettings, NormalizeMode};
use terrain::utils::{height_map_to_color_image, height_map_to_image};

fn main() {
    // One 481×481 tile, locally normalized so the previews use the
    // full value range.
    let settings = HeightMapSettings {
        noise: NoiseSettings {
            scale: 120.0,
            octaves: 6,
            persistence: 0.55,
            lacunarity: 2.0,
            seed: 2025,
            normalize_mode: NormalizeMode::Local,
        },
        height_multiplier: 40.0,
        // Flatten the low end into plains, keep the peaks steep.
        curve: HeightCurve::new(vec![(0.0, 0.0), (0.4, 0.1), (0.7, 0.5), (1.0, 1.0)]),
    };

    let height_map = generate_height_map(481, 481, &settings, Vec2::ZERO);
    println!(
        "height range: {:.2} .. {:.2}",
        height_map.min_value, height_map.max_value
    );

    height_map_to_image(&height_map)
        .save(Path::new("heightmap_gray.png"))
        .expect("failed to write heightmap_gray.png");
    height_map_to_color_image(&height_map)
        .save(Path::new("heightmap_color.png"))
        .expect("failed to write heightmap_color.png");
    println!("wrote heightmap_gray.png and heightmap_color.png");
}
