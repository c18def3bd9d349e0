use crate::normals;
use crate::utils::HeightMap2D;
use glam::{Vec2, Vec3};

pub const NUM_SUPPORTED_LODS: usize = 5;
pub const SUPPORTED_CHUNK_SIZES: [usize; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];
// Flat shading triples the vertex count, so only the small sizes are
// allowed for it.
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

// Mesh parameters shared by every chunk. The grid always carries a
// 1-vertex mesh-edge border plus a 1-vertex skirt border on each
// side, hence the +5 / -3 in the derived values.
#[derive(Clone, Debug)]
pub struct MeshSettings {
    pub mesh_scale: f32,
    pub flat_shading: bool,
    pub chunk_size_index: usize,
    pub flat_shaded_chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 2.5,
            flat_shading: false,
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    pub fn validate(&mut self) {
        self.chunk_size_index = self.chunk_size_index.min(SUPPORTED_CHUNK_SIZES.len() - 1);
        self.flat_shaded_chunk_size_index = self
            .flat_shaded_chunk_size_index
            .min(NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES - 1);
    }

    pub fn verts_per_line(&self) -> usize {
        let index = if self.flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index] + 5
    }

    pub fn mesh_world_size(&self) -> f32 {
        (self.verts_per_line() - 3) as f32 * self.mesh_scale
    }
}

// Finished, immutable triangulated surface. Triangle indices are
// 0-based into `vertices`; the skirt staging buffers never leak here.
#[derive(Clone, Debug)]
pub struct SurfaceMesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<[u32; 3]>,
    pub normals: Option<Vec<Vec3>>,
}

impl SurfaceMesh {
    // Generic recompute-normals-from-winding primitive, the stand-in
    // for what a rendering backend offers. For flat-shaded meshes each
    // vertex belongs to exactly one triangle, yielding hard per-face
    // normals.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for tri in &self.triangles {
            let [a, b, c] = tri.map(|i| i as usize);
            let normal =
                (self.vertices[b] - self.vertices[a]).cross(self.vertices[c] - self.vertices[a]);
            normals[a] += normal;
            normals[b] += normal;
            normals[c] += normal;
        }
        for n in normals.iter_mut() {
            *n = n.normalize_or_zero();
        }
        self.normals = Some(normals);
    }
}

// Classification of a grid cell for a given LOD stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VertexKind {
    // Skirt ring, allocated in a separate negatively-indexed buffer
    // and used only for border normal computation. Never rendered.
    OutOfMesh,
    // Interior vertex not on the stride; omitted from this LOD.
    Skipped,
    // The ring that is present at every LOD, keeping the outer
    // silhouette stable across LOD transitions.
    MeshEdge,
    // Bridges the always-present edge ring to the strided interior;
    // its height is interpolated to avoid T-junction cracks.
    EdgeConnection,
    // Strided interior vertex, the bulk of the coarse geometry.
    Main,
}

pub(crate) fn classify(x: usize, y: usize, n: usize, skip: usize) -> VertexKind {
    if x == 0 || x == n - 1 || y == 0 || y == n - 1 {
        return VertexKind::OutOfMesh;
    }
    if x > 2
        && x < n - 3
        && y > 2
        && y < n - 3
        && ((x - 2) % skip != 0 || (y - 2) % skip != 0)
    {
        return VertexKind::Skipped;
    }
    if x == 1 || x == n - 2 || y == 1 || y == n - 2 {
        return VertexKind::MeshEdge;
    }
    if (x - 2) % skip == 0 && (y - 2) % skip == 0 {
        return VertexKind::Main;
    }
    VertexKind::EdgeConnection
}

// Mesh under construction. Skirt vertices and triangles live in
// separate buffers, addressed through the negative staging indices,
// until the normal baker has consumed them.
pub(crate) struct MeshData {
    pub(crate) vertices: Vec<Vec3>,
    pub(crate) uvs: Vec<Vec2>,
    pub(crate) triangles: Vec<i32>,
    pub(crate) out_of_mesh_vertices: Vec<Vec3>,
    pub(crate) out_of_mesh_triangles: Vec<i32>,
    pub(crate) flat_shading: bool,
}

impl MeshData {
    fn new(n: usize, skip: usize, flat_shading: bool) -> Self {
        let num_mesh_edge_vertices = (n - 2) * 4 - 4;
        let num_edge_connection_vertices = (skip - 1) * (n - 5) / skip * 4;
        let num_main_vertices_per_line = (n - 5) / skip + 1;
        let num_main_vertices = num_main_vertices_per_line * num_main_vertices_per_line;
        let vertex_count =
            num_mesh_edge_vertices + num_edge_connection_vertices + num_main_vertices;

        let num_mesh_edge_triangles = 8 * (n - 4);
        let num_main_triangles =
            (num_main_vertices_per_line - 1) * (num_main_vertices_per_line - 1) * 2;

        Self {
            vertices: vec![Vec3::ZERO; vertex_count],
            uvs: vec![Vec2::ZERO; vertex_count],
            triangles: Vec::with_capacity((num_mesh_edge_triangles + num_main_triangles) * 3),
            out_of_mesh_vertices: vec![Vec3::ZERO; n * 4 - 4],
            out_of_mesh_triangles: Vec::with_capacity(24 * (n - 2)),
            flat_shading,
        }
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, vertex_index: i32) {
        if vertex_index < 0 {
            self.out_of_mesh_vertices[(-vertex_index - 1) as usize] = position;
        } else {
            self.vertices[vertex_index as usize] = position;
            self.uvs[vertex_index as usize] = uv;
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.out_of_mesh_triangles.extend_from_slice(&[a, b, c]);
        } else {
            self.triangles.extend_from_slice(&[a, b, c]);
        }
    }

    // Resolve a staging index against the right buffer.
    pub(crate) fn position(&self, index: i32) -> Vec3 {
        if index < 0 {
            self.out_of_mesh_vertices[(-index - 1) as usize]
        } else {
            self.vertices[index as usize]
        }
    }

    pub(crate) fn into_surface_mesh(self, normals: Option<Vec<Vec3>>) -> SurfaceMesh {
        let triangles = self
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
            .collect();
        SurfaceMesh {
            vertices: self.vertices,
            uvs: self.uvs,
            triangles,
            normals,
        }
    }
}

pub(crate) fn skip_increment(lod: usize) -> usize {
    if lod == 0 { 1 } else { lod * 2 }
}

// Triangulate one LOD of an elevation grid into a seam-free surface.
//
// The outer two rings are present at every LOD while only the
// interior decimates with the stride; edge-connection vertices blend
// their height across the stride so a coarse interior meets the
// always-fine edge ring without cracks. The skirt ring is emitted to
// separate staging buffers for border-correct normals and discarded
// before the finished mesh is returned.
pub fn generate_terrain_mesh(
    height_map: &HeightMap2D,
    settings: &MeshSettings,
    lod: usize,
) -> SurfaceMesh {
    let mut settings = settings.clone();
    settings.validate();
    let lod = lod.min(NUM_SUPPORTED_LODS - 1);
    let skip = skip_increment(lod);
    let n = settings.verts_per_line();
    let mesh_world_size = settings.mesh_world_size();
    let top_left = Vec2::new(-1.0, 1.0) * mesh_world_size / 2.0;

    let mut mesh_data = MeshData::new(n, skip, settings.flat_shading);

    let mut vertex_indices_map = vec![vec![0i32; n]; n];
    let mut mesh_vertex_index = 0i32;
    let mut out_of_mesh_vertex_index = -1i32;
    for y in 0..n {
        for x in 0..n {
            match classify(x, y, n, skip) {
                VertexKind::OutOfMesh => {
                    vertex_indices_map[y][x] = out_of_mesh_vertex_index;
                    out_of_mesh_vertex_index -= 1;
                }
                VertexKind::Skipped => {}
                _ => {
                    vertex_indices_map[y][x] = mesh_vertex_index;
                    mesh_vertex_index += 1;
                }
            }
        }
    }

    for y in 0..n {
        for x in 0..n {
            let kind = classify(x, y, n, skip);
            if kind == VertexKind::Skipped {
                continue;
            }

            let vertex_index = vertex_indices_map[y][x];
            let percent = Vec2::new(x as f32 - 1.0, y as f32 - 1.0) / (n - 3) as f32;
            let vertex_position_2d = top_left + Vec2::new(percent.x, -percent.y) * mesh_world_size;
            let mut height = height_map[y][x];

            if kind == VertexKind::EdgeConnection {
                // Blend between the two main vertices bracketing this
                // cell along the stride, so the coarse interior and
                // the fine edge ring meet without a gap.
                let is_vertical = x == 2 || x == n - 3;
                let dst_to_main_a = (if is_vertical { y } else { x } - 2) % skip;
                let dst_to_main_b = skip - dst_to_main_a;
                let dst_percent = dst_to_main_a as f32 / skip as f32;
                let height_main_a = if is_vertical {
                    height_map[y - dst_to_main_a][x]
                } else {
                    height_map[y][x - dst_to_main_a]
                };
                let height_main_b = if is_vertical {
                    height_map[y + dst_to_main_b][x]
                } else {
                    height_map[y][x + dst_to_main_b]
                };
                height = height_main_a * (1.0 - dst_percent) + height_main_b * dst_percent;
            }

            mesh_data.add_vertex(
                Vec3::new(vertex_position_2d.x, height, vertex_position_2d.y),
                percent,
                vertex_index,
            );

            // The first connection step would double-cover the corner.
            let create_triangle = x < n - 1
                && y < n - 1
                && (kind != VertexKind::EdgeConnection || (x != 2 && y != 2));
            if !create_triangle {
                continue;
            }

            let current_increment =
                if kind == VertexKind::Main && x != n - 3 && y != n - 3 { skip } else { 1 };
            let a = vertex_indices_map[y][x];
            let b = vertex_indices_map[y][x + current_increment];
            let c = vertex_indices_map[y + current_increment][x];
            let d = vertex_indices_map[y + current_increment][x + current_increment];
            mesh_data.add_triangle(a, d, c);
            mesh_data.add_triangle(d, a, b);
        }
    }

    normals::process_mesh(mesh_data)
}
