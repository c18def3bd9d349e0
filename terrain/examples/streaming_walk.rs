use glam::Vec3;
use terrain::chunk::{ChunkCoord, LodLevel, LodPolicy, TerrainScene};
use terrain::heightfield::HeightMapSettings;
use terrain::mesh::{MeshSettings, SurfaceMesh};
use terrain::world::ChunkManager;

// Headless stand-in for a scene graph: just counts what the streamer
// asks it to do.
#[derive(Default)]
struct ConsoleScene {
    displays: usize,
    colliders: usize,
}

impl TerrainScene for ConsoleScene {
    fn set_visible(&mut self, _coord: ChunkCoord, _visible: bool) {}

    fn display_mesh(&mut self, coord: ChunkCoord, mesh: &SurfaceMesh) {
        self.displays += 1;
        println!(
            "  display ({:>3}, {:>3}): {} verts, {} tris",
            coord.x,
            coord.y,
            mesh.vertices.len(),
            mesh.triangles.len()
        );
    }

    fn install_collision_mesh(&mut self, coord: ChunkCoord, _mesh: &SurfaceMesh) {
        self.colliders += 1;
        println!("  collider ({:>3}, {:>3})", coord.x, coord.y);
    }
}

fn main() {
    let policy = LodPolicy::new(
        vec![
            LodLevel {
                lod: 0,
                visible_dst_threshold: 150.0,
            },
            LodLevel {
                lod: 2,
                visible_dst_threshold: 300.0,
            },
            LodLevel {
                lod: 4,
                visible_dst_threshold: 450.0,
            },
        ],
        0,
    );
    let mut manager = ChunkManager::new(
        HeightMapSettings {
            height_multiplier: 30.0,
            ..Default::default()
        },
        MeshSettings::default(),
        policy,
    );
    let mut scene = ConsoleScene::default();

    // Walk the viewer east for a while, ticking the streamer the way
    // a host engine would once per frame.
    let mut viewer = Vec3::ZERO;
    for step in 0..600 {
        viewer.x += 2.0;
        manager.tick(viewer, &mut scene);
        if step % 100 == 0 {
            println!(
                "step {:>3}: viewer x = {:>6.1}, {} chunks ({} visible), {} jobs in flight",
                step,
                viewer.x,
                manager.chunk_count(),
                manager.visible_count(),
                manager.in_flight_jobs()
            );
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    // Let outstanding generation finish and drain the results.
    while manager.in_flight_jobs() > 0 {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    manager.tick(viewer, &mut scene);

    println!(
        "done: {} chunks tracked, {} visible, {} meshes displayed, {} colliders installed",
        manager.chunk_count(),
        manager.visible_count(),
        scene.displays,
        scene.colliders
    );
}
