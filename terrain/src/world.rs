use crate::chunk::{ChunkCoord, ChunkEvent, LodPolicy, TerrainChunk, TerrainScene};
use crate::dispatch::JobDispatcher;
use crate::heightfield::HeightMapSettings;
use crate::mesh::MeshSettings;
use glam::{Vec2, Vec3};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// Viewer movement (in world units) below which chunk visibility is
// not re-evaluated. Completion events are still routed every tick.
pub const VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 = 25.0;
const SQR_VIEWER_MOVE_THRESHOLD: f32 =
    VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE * VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE;

// Streams tiles around the viewer. Tracks every chunk ever created
// (no eviction; hidden chunks keep their cached meshes), a list of
// the currently visible ones, and the dispatcher that runs all
// generation jobs.
pub struct ChunkManager {
    height_settings: Arc<HeightMapSettings>,
    mesh_settings: MeshSettings,
    policy: Arc<LodPolicy>,
    dispatcher: JobDispatcher<ChunkEvent>,
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    visible_chunks: Vec<ChunkCoord>,
    mesh_world_size: f32,
    chunk_visibility_radius: i32,
    viewer_position: Vec2,
    // Viewer position at the last full visibility pass; None until
    // the first tick forces one.
    last_update_position: Option<Vec2>,
    last_tick_position: Option<Vec2>,
}

impl ChunkManager {
    pub fn new(
        height_settings: HeightMapSettings,
        mesh_settings: MeshSettings,
        policy: LodPolicy,
    ) -> Self {
        let mut mesh_settings = mesh_settings;
        mesh_settings.validate();
        let mesh_world_size = mesh_settings.mesh_world_size();
        let chunk_visibility_radius = (policy.max_view_dst() / mesh_world_size).round() as i32;
        Self {
            height_settings: Arc::new(height_settings),
            mesh_settings,
            policy: Arc::new(policy),
            dispatcher: JobDispatcher::new(),
            chunks: HashMap::new(),
            visible_chunks: Vec::new(),
            mesh_world_size,
            chunk_visibility_radius,
            viewer_position: Vec2::ZERO,
            last_update_position: None,
            last_tick_position: None,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible_chunks.len()
    }

    pub fn in_flight_jobs(&self) -> usize {
        self.dispatcher.in_flight()
    }

    pub fn chunk_visibility_radius(&self) -> i32 {
        self.chunk_visibility_radius
    }

    // One control-loop step. The viewer lives in 3D; streaming only
    // cares about its ground-plane position.
    pub fn tick(&mut self, viewer: Vec3, scene: &mut dyn TerrainScene) {
        self.viewer_position = Vec2::new(viewer.x, viewer.z);
        self.route_events(scene);

        if self.last_tick_position != Some(self.viewer_position) {
            // Collision installation reacts to every movement, not
            // just debounced visibility passes.
            let visible = self.visible_chunks.clone();
            for coord in visible {
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.update_collision(self.viewer_position, scene, &self.dispatcher);
                }
            }
        }
        self.last_tick_position = Some(self.viewer_position);

        let moved_far_enough = match self.last_update_position {
            None => true,
            Some(old) => (self.viewer_position - old).length_squared() > SQR_VIEWER_MOVE_THRESHOLD,
        };
        if moved_far_enough {
            self.last_update_position = Some(self.viewer_position);
            self.update_visible_chunks(scene);
        }
    }

    // Deliver every finished background job to its chunk.
    fn route_events(&mut self, scene: &mut dyn TerrainScene) {
        for event in self.dispatcher.drain() {
            let change = match event {
                ChunkEvent::HeightMapReady { coord, height_map } => {
                    match self.chunks.get_mut(&coord) {
                        Some(chunk) => (
                            coord,
                            chunk.on_height_map_received(
                                height_map,
                                self.viewer_position,
                                scene,
                                &self.dispatcher,
                            ),
                        ),
                        None => continue,
                    }
                }
                ChunkEvent::MeshReady {
                    coord,
                    lod_index,
                    mesh,
                } => match self.chunks.get_mut(&coord) {
                    Some(chunk) => (
                        coord,
                        chunk.on_mesh_ready(
                            lod_index,
                            mesh,
                            self.viewer_position,
                            scene,
                            &self.dispatcher,
                        ),
                    ),
                    None => continue,
                },
            };
            self.apply_visibility_change(change.0, change.1);
        }
    }

    fn update_visible_chunks(&mut self, scene: &mut dyn TerrainScene) {
        let mut already_updated = HashSet::new();

        // Currently visible chunks first; ones the viewer left behind
        // hide themselves here.
        for coord in self.visible_chunks.clone() {
            already_updated.insert(coord);
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                let change = chunk.evaluate(self.viewer_position, scene, &self.dispatcher);
                self.apply_visibility_change(coord, change);
            }
        }

        let current = ChunkCoord::new(
            (self.viewer_position.x / self.mesh_world_size).round() as i32,
            (self.viewer_position.y / self.mesh_world_size).round() as i32,
        );
        let radius = self.chunk_visibility_radius;
        for y_offset in -radius..=radius {
            for x_offset in -radius..=radius {
                let coord = ChunkCoord::new(current.x + x_offset, current.y + y_offset);
                if already_updated.contains(&coord) {
                    continue;
                }
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    let change = chunk.evaluate(self.viewer_position, scene, &self.dispatcher);
                    self.apply_visibility_change(coord, change);
                } else {
                    debug!("creating chunk ({}, {})", coord.x, coord.y);
                    let chunk = TerrainChunk::new(
                        coord,
                        Arc::clone(&self.height_settings),
                        self.mesh_settings.clone(),
                        Arc::clone(&self.policy),
                        scene,
                    );
                    chunk.load(&self.dispatcher);
                    self.chunks.insert(coord, chunk);
                }
            }
        }

        // Coordinate-level backstop: anything still marked visible
        // outside the square is forced hidden.
        let stale: Vec<ChunkCoord> = self
            .visible_chunks
            .iter()
            .copied()
            .filter(|c| (c.x - current.x).abs() > radius || (c.y - current.y).abs() > radius)
            .collect();
        for coord in stale {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.hide(scene);
            }
            self.visible_chunks.retain(|c| *c != coord);
        }
    }

    fn apply_visibility_change(&mut self, coord: ChunkCoord, change: Option<bool>) {
        match change {
            Some(true) => {
                if !self.visible_chunks.contains(&coord) {
                    self.visible_chunks.push(coord);
                }
            }
            Some(false) => self.visible_chunks.retain(|c| *c != coord),
            None => {}
        }
    }
}
