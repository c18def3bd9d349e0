use crate::dispatch::JobDispatcher;
use crate::heightfield::{HeightMap, HeightMapSettings, generate_height_map};
use crate::mesh::{MeshSettings, NUM_SUPPORTED_LODS, SurfaceMesh, generate_terrain_mesh};
use glam::Vec2;
use log::debug;
use std::sync::Arc;

// Once a chunk is closer than this (in world units), its collider-LOD
// mesh is installed as the collision surface.
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

// Tile identity on the implicit infinite grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

// One LOD level and the viewer distance up to which it is shown.
#[derive(Clone, Copy, Debug)]
pub struct LodLevel {
    pub lod: usize,
    pub visible_dst_threshold: f32,
}

impl LodLevel {
    pub fn sqr_visible_dst_threshold(self) -> f32 {
        self.visible_dst_threshold * self.visible_dst_threshold
    }
}

// Ordered distance thresholds plus the level that doubles as the
// collision mesh. A malformed policy is a programming error, not a
// runtime condition.
#[derive(Clone, Debug)]
pub struct LodPolicy {
    levels: Vec<LodLevel>,
    collider_lod_index: usize,
}

impl LodPolicy {
    pub fn new(levels: Vec<LodLevel>, collider_lod_index: usize) -> Self {
        assert!(!levels.is_empty(), "LOD policy needs at least one level");
        assert!(
            levels
                .windows(2)
                .all(|w| w[0].visible_dst_threshold < w[1].visible_dst_threshold),
            "LOD thresholds must be strictly increasing"
        );
        assert!(
            levels.iter().all(|l| l.lod < NUM_SUPPORTED_LODS),
            "LOD level out of supported range"
        );
        assert!(collider_lod_index < levels.len());
        Self {
            levels,
            collider_lod_index,
        }
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn collider_lod_index(&self) -> usize {
        self.collider_lod_index
    }

    // Visibility cut-off: the last (coarsest) threshold.
    pub fn max_view_dst(&self) -> f32 {
        self.levels[self.levels.len() - 1].visible_dst_threshold
    }

    // Lowest-indexed entry whose threshold covers the distance, i.e.
    // ties break toward finer detail. Level 0 if nothing qualifies.
    pub fn select(&self, viewer_dst: f32) -> usize {
        self.levels
            .iter()
            .position(|l| viewer_dst <= l.visible_dst_threshold)
            .unwrap_or(0)
    }
}

// Completion events produced on worker threads and routed back to the
// owning chunk by the manager's drain loop.
pub enum ChunkEvent {
    HeightMapReady {
        coord: ChunkCoord,
        height_map: HeightMap,
    },
    MeshReady {
        coord: ChunkCoord,
        lod_index: usize,
        mesh: SurfaceMesh,
    },
}

// Host-side scene attachment. The core only ever toggles visibility,
// swaps the displayed mesh, and installs the collision surface; how
// those map onto a scene graph is the renderer's business.
pub trait TerrainScene {
    fn set_visible(&mut self, coord: ChunkCoord, visible: bool);
    fn display_mesh(&mut self, coord: ChunkCoord, mesh: &SurfaceMesh);
    fn install_collision_mesh(&mut self, coord: ChunkCoord, mesh: &SurfaceMesh);
}

// Per-LOD mesh cache entry. Append-only: once a mesh is available it
// is never rebuilt, and a slot has at most one outstanding request.
enum LodSlot {
    NotRequested,
    Requested,
    Available(SurfaceMesh),
}

// Axis-aligned tile bounds in the ground plane.
#[derive(Clone, Copy, Debug)]
struct Rect2 {
    min: Vec2,
    max: Vec2,
}

impl Rect2 {
    fn from_centre_size(centre: Vec2, size: Vec2) -> Self {
        Self {
            min: centre - size / 2.0,
            max: centre + size / 2.0,
        }
    }

    // Squared distance from `point` to the nearest edge (zero inside).
    fn sqr_distance(&self, point: Vec2) -> f32 {
        let closest = point.clamp(self.min, self.max);
        (point - closest).length_squared()
    }
}

// Per-tile state machine: owns the elevation field once loaded, the
// per-LOD mesh cache, and the visibility / collision flags. All
// heavy generation is pushed to the dispatcher; this type only reacts
// to evaluation ticks and completion events on the owning thread.
pub struct TerrainChunk {
    coord: ChunkCoord,
    sample_centre: Vec2,
    bounds: Rect2,
    height_settings: Arc<HeightMapSettings>,
    mesh_settings: MeshSettings,
    policy: Arc<LodPolicy>,
    height_map: Option<Arc<HeightMap>>,
    lod_slots: Vec<LodSlot>,
    previous_lod_index: Option<usize>,
    visible: bool,
    collider_installed: bool,
    max_view_dst: f32,
}

impl TerrainChunk {
    pub fn new(
        coord: ChunkCoord,
        height_settings: Arc<HeightMapSettings>,
        mesh_settings: MeshSettings,
        policy: Arc<LodPolicy>,
        scene: &mut dyn TerrainScene,
    ) -> Self {
        let mesh_world_size = mesh_settings.mesh_world_size();
        let sample_centre = coord.as_vec2() * mesh_world_size / mesh_settings.mesh_scale;
        let position = coord.as_vec2() * mesh_world_size;
        let bounds = Rect2::from_centre_size(position, Vec2::splat(mesh_world_size));
        let lod_slots = (0..policy.levels().len())
            .map(|_| LodSlot::NotRequested)
            .collect();
        let max_view_dst = policy.max_view_dst();
        scene.set_visible(coord, false);
        Self {
            coord,
            sample_centre,
            bounds,
            height_settings,
            mesh_settings,
            policy,
            height_map: None,
            lod_slots,
            previous_lod_index: None,
            visible: false,
            collider_installed: false,
            max_view_dst,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn displayed_lod_index(&self) -> Option<usize> {
        self.previous_lod_index
    }

    pub fn has_height_map(&self) -> bool {
        self.height_map.is_some()
    }

    pub fn collider_installed(&self) -> bool {
        self.collider_installed
    }

    // Kick off the asynchronous elevation-field build. Until the
    // result comes back the chunk stays inert.
    pub fn load(&self, dispatcher: &JobDispatcher<ChunkEvent>) {
        let coord = self.coord;
        let settings = Arc::clone(&self.height_settings);
        let centre = self.sample_centre;
        let n = self.mesh_settings.verts_per_line();
        debug!("chunk ({}, {}): requesting height map", coord.x, coord.y);
        dispatcher.submit(move || ChunkEvent::HeightMapReady {
            coord,
            height_map: generate_height_map(n, n, &settings, centre),
        });
    }

    pub fn on_height_map_received(
        &mut self,
        height_map: HeightMap,
        viewer_position: Vec2,
        scene: &mut dyn TerrainScene,
        dispatcher: &JobDispatcher<ChunkEvent>,
    ) -> Option<bool> {
        self.height_map = Some(Arc::new(height_map));
        self.evaluate(viewer_position, scene, dispatcher)
    }

    pub fn on_mesh_ready(
        &mut self,
        lod_index: usize,
        mesh: SurfaceMesh,
        viewer_position: Vec2,
        scene: &mut dyn TerrainScene,
        dispatcher: &JobDispatcher<ChunkEvent>,
    ) -> Option<bool> {
        debug_assert!(
            matches!(self.lod_slots[lod_index], LodSlot::Requested),
            "mesh completion for a slot that was never requested"
        );
        self.lod_slots[lod_index] = LodSlot::Available(mesh);
        let visibility_change = self.evaluate(viewer_position, scene, dispatcher);
        if lod_index == self.policy.collider_lod_index() {
            self.update_collision(viewer_position, scene, dispatcher);
        }
        visibility_change
    }

    // One evaluation tick. Visibility and LOD selection derive purely
    // from the viewer distance at this moment. Returns the visibility
    // transition, if any. Exactly one notification per transition.
    pub fn evaluate(
        &mut self,
        viewer_position: Vec2,
        scene: &mut dyn TerrainScene,
        dispatcher: &JobDispatcher<ChunkEvent>,
    ) -> Option<bool> {
        if self.height_map.is_none() {
            return None;
        }

        let viewer_dst = self.bounds.sqr_distance(viewer_position).sqrt();
        let was_visible = self.visible;
        let visible = viewer_dst <= self.max_view_dst;

        if visible {
            let lod_index = self.policy.select(viewer_dst);
            if Some(lod_index) != self.previous_lod_index {
                match &self.lod_slots[lod_index] {
                    LodSlot::Available(mesh) => {
                        self.previous_lod_index = Some(lod_index);
                        scene.display_mesh(self.coord, mesh);
                    }
                    LodSlot::NotRequested => self.request_mesh(lod_index, dispatcher),
                    // Already in flight; completions are coalesced.
                    LodSlot::Requested => {}
                }
            }
            self.update_collision(viewer_position, scene, dispatcher);
        }

        if was_visible != visible {
            self.visible = visible;
            scene.set_visible(self.coord, visible);
            return Some(visible);
        }
        None
    }

    // Distance-gated collision policy: request the collider LOD once
    // inside its visibility threshold, install it exactly once when
    // the viewer is nearly on top of the tile and the mesh exists.
    pub fn update_collision(
        &mut self,
        viewer_position: Vec2,
        scene: &mut dyn TerrainScene,
        dispatcher: &JobDispatcher<ChunkEvent>,
    ) {
        if self.collider_installed || self.height_map.is_none() {
            return;
        }

        let sqr_dst = self.bounds.sqr_distance(viewer_position);
        let collider_index = self.policy.collider_lod_index();
        if sqr_dst >= self.policy.levels()[collider_index].sqr_visible_dst_threshold() {
            return;
        }

        if matches!(self.lod_slots[collider_index], LodSlot::NotRequested) {
            self.request_mesh(collider_index, dispatcher);
        }

        let activation = COLLIDER_GENERATION_DISTANCE_THRESHOLD.powi(2);
        if sqr_dst >= activation {
            return;
        }
        if let LodSlot::Available(mesh) = &self.lod_slots[collider_index] {
            scene.install_collision_mesh(self.coord, mesh);
            self.collider_installed = true;
        }
    }

    // Hide without a visibility notification; used by the manager
    // when a chunk's coordinate falls out of view range.
    pub fn hide(&mut self, scene: &mut dyn TerrainScene) {
        self.visible = false;
        scene.set_visible(self.coord, false);
    }

    fn request_mesh(&mut self, lod_index: usize, dispatcher: &JobDispatcher<ChunkEvent>) {
        let height_map = Arc::clone(
            self.height_map
                .as_ref()
                .expect("mesh requested before height map arrived"),
        );
        let settings = self.mesh_settings.clone();
        let lod = self.policy.levels()[lod_index].lod;
        let coord = self.coord;
        self.lod_slots[lod_index] = LodSlot::Requested;
        debug!(
            "chunk ({}, {}): requesting mesh for LOD {}",
            coord.x, coord.y, lod
        );
        dispatcher.submit(move || ChunkEvent::MeshReady {
            coord,
            lod_index,
            mesh: generate_terrain_mesh(&height_map.values, &settings, lod),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingScene {
        visibility_calls: Vec<(ChunkCoord, bool)>,
        display_count: usize,
        collision_count: usize,
    }

    impl TerrainScene for RecordingScene {
        fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
            self.visibility_calls.push((coord, visible));
        }

        fn display_mesh(&mut self, _coord: ChunkCoord, _mesh: &SurfaceMesh) {
            self.display_count += 1;
        }

        fn install_collision_mesh(&mut self, _coord: ChunkCoord, _mesh: &SurfaceMesh) {
            self.collision_count += 1;
        }
    }

    fn test_policy() -> Arc<LodPolicy> {
        Arc::new(LodPolicy::new(
            vec![
                LodLevel {
                    lod: 0,
                    visible_dst_threshold: 200.0,
                },
                LodLevel {
                    lod: 1,
                    visible_dst_threshold: 400.0,
                },
                LodLevel {
                    lod: 2,
                    visible_dst_threshold: 600.0,
                },
            ],
            0,
        ))
    }

    fn make_chunk(scene: &mut RecordingScene) -> TerrainChunk {
        TerrainChunk::new(
            ChunkCoord::new(0, 0),
            Arc::new(HeightMapSettings {
                height_multiplier: 10.0,
                ..Default::default()
            }),
            MeshSettings::default(),
            test_policy(),
            scene,
        )
    }

    // Wait for all background jobs to finish, then route every queued
    // completion into the chunk.
    fn settle(
        chunk: &mut TerrainChunk,
        dispatcher: &JobDispatcher<ChunkEvent>,
        scene: &mut RecordingScene,
        viewer: Vec2,
    ) {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            while dispatcher.in_flight() > 0 {
                assert!(Instant::now() < deadline, "background jobs stalled");
                std::thread::sleep(Duration::from_millis(1));
            }
            let events = dispatcher.drain();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    ChunkEvent::HeightMapReady { height_map, .. } => {
                        chunk.on_height_map_received(height_map, viewer, scene, dispatcher);
                    }
                    ChunkEvent::MeshReady {
                        lod_index, mesh, ..
                    } => {
                        chunk.on_mesh_ready(lod_index, mesh, viewer, scene, dispatcher);
                    }
                }
            }
        }
    }

    #[test]
    fn policy_selects_finest_qualifying_level() {
        let policy = test_policy();
        assert_eq!(policy.select(0.0), 0);
        assert_eq!(policy.select(200.0), 0);
        assert_eq!(policy.select(250.0), 1);
        assert_eq!(policy.select(500.0), 2);
        // Beyond every threshold the fallback is level 0.
        assert_eq!(policy.select(1e9), 0);
        assert_eq!(policy.max_view_dst(), 600.0);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn policy_rejects_unordered_thresholds() {
        LodPolicy::new(
            vec![
                LodLevel {
                    lod: 0,
                    visible_dst_threshold: 300.0,
                },
                LodLevel {
                    lod: 1,
                    visible_dst_threshold: 300.0,
                },
            ],
            0,
        );
    }

    #[test]
    fn lod_walk_swaps_display_exactly_once_per_change() {
        let mut scene = RecordingScene::default();
        let dispatcher = JobDispatcher::new();
        let mut chunk = make_chunk(&mut scene);

        // Mesh world size is 125, so the tile spans ±62.5 around the
        // origin; viewer x = 62.5 + d gives edge distance d.
        let at = |d: f32| Vec2::new(62.5 + d, 0.0);

        chunk.load(&dispatcher);
        settle(&mut chunk, &dispatcher, &mut scene, Vec2::ZERO);
        assert!(chunk.has_height_map());
        assert_eq!(chunk.displayed_lod_index(), Some(0));
        let displays_after_lod0 = scene.display_count;
        assert_eq!(displays_after_lod0, 1);

        chunk.evaluate(at(500.0), &mut scene, &dispatcher);
        settle(&mut chunk, &dispatcher, &mut scene, at(500.0));
        assert_eq!(chunk.displayed_lod_index(), Some(2));
        assert_eq!(scene.display_count, 2);

        // Crossing back under 400 re-selects LOD 1 with exactly one
        // display swap.
        chunk.evaluate(at(350.0), &mut scene, &dispatcher);
        settle(&mut chunk, &dispatcher, &mut scene, at(350.0));
        assert_eq!(chunk.displayed_lod_index(), Some(1));
        assert_eq!(scene.display_count, 3);

        // Re-evaluating at the same distance is a no-op.
        chunk.evaluate(at(350.0), &mut scene, &dispatcher);
        assert_eq!(scene.display_count, 3);
    }

    #[test]
    fn visibility_notifications_fire_once_per_transition() {
        let mut scene = RecordingScene::default();
        let dispatcher = JobDispatcher::new();
        let mut chunk = make_chunk(&mut scene);
        // Creation parks the chunk invisible.
        assert_eq!(scene.visibility_calls, vec![(ChunkCoord::new(0, 0), false)]);

        chunk.load(&dispatcher);
        settle(&mut chunk, &dispatcher, &mut scene, Vec2::ZERO);
        assert!(chunk.is_visible());
        assert_eq!(scene.visibility_calls.last(), Some(&(ChunkCoord::new(0, 0), true)));
        let calls_when_visible = scene.visibility_calls.len();

        // Still visible: no extra notification.
        chunk.evaluate(Vec2::new(100.0, 0.0), &mut scene, &dispatcher);
        assert_eq!(scene.visibility_calls.len(), calls_when_visible);

        // Past the last threshold: exactly one hide notification.
        chunk.evaluate(Vec2::new(700.0, 0.0), &mut scene, &dispatcher);
        assert!(!chunk.is_visible());
        assert_eq!(scene.visibility_calls.len(), calls_when_visible + 1);
        assert_eq!(scene.visibility_calls.last(), Some(&(ChunkCoord::new(0, 0), false)));
    }

    #[test]
    fn collider_installs_exactly_once() {
        let mut scene = RecordingScene::default();
        let dispatcher = JobDispatcher::new();
        let mut chunk = make_chunk(&mut scene);

        chunk.load(&dispatcher);
        // Viewer inside the tile: distance 0, well under the
        // activation radius.
        settle(&mut chunk, &dispatcher, &mut scene, Vec2::ZERO);
        assert!(chunk.collider_installed());
        assert_eq!(scene.collision_count, 1);

        chunk.evaluate(Vec2::ZERO, &mut scene, &dispatcher);
        chunk.update_collision(Vec2::ZERO, &mut scene, &dispatcher);
        assert_eq!(scene.collision_count, 1);
    }

    #[test]
    fn distant_viewer_requests_no_collider() {
        let mut scene = RecordingScene::default();
        let dispatcher = JobDispatcher::new();
        let mut chunk = make_chunk(&mut scene);

        chunk.load(&dispatcher);
        let far = Vec2::new(62.5 + 500.0, 0.0);
        settle(&mut chunk, &dispatcher, &mut scene, far);
        // LOD 2 was displayed but the collider (LOD 0 slot, threshold
        // 200) stays uninstalled.
        assert_eq!(chunk.displayed_lod_index(), Some(2));
        assert!(!chunk.collider_installed());
        assert_eq!(scene.collision_count, 0);
    }
}
