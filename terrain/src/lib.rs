// terrain holds the streaming pipeline: noise sampling, height map
// synthesis, LOD mesh assembly, and the chunk controllers that keep
// the grid around the viewer populated.
pub mod chunk;
pub mod dispatch;
pub mod heightfield;
pub mod mesh;
pub mod noise2;
mod normals;
pub mod utils;
pub mod world;

pub use chunk::{ChunkCoord, ChunkEvent, LodLevel, LodPolicy, TerrainChunk, TerrainScene};
pub use dispatch::JobDispatcher;
pub use heightfield::{HeightCurve, HeightMap, HeightMapSettings, generate_height_map};
pub use mesh::{MeshSettings, SurfaceMesh, generate_terrain_mesh};
pub use noise2::{NoiseSettings, NormalizeMode, Perlin2, generate_noise_map};
pub use utils::{HeightMap2D, flatten2, height_map_to_image};
pub use world::ChunkManager;
