use crate::mesh::{MeshData, SurfaceMesh};
use glam::Vec3;

// Finalize a staged mesh: smooth meshes get baked per-vertex normals,
// flat meshes get their vertices split per triangle and hard normals
// recomputed from the winding.
pub(crate) fn process_mesh(mesh_data: MeshData) -> SurfaceMesh {
    if mesh_data.flat_shading {
        flat_shade(mesh_data)
    } else {
        let normals = bake_smooth_normals(&mesh_data);
        mesh_data.into_surface_mesh(Some(normals))
    }
}

// Accumulate the unnormalized cross-product normal of every triangle
// into its three vertices, then normalize. The invisible skirt
// triangles contribute too, which is what keeps normals physically
// correct at tile borders; contributions aimed at skirt-only
// (negative) indices are dropped along with the skirt itself.
pub(crate) fn bake_smooth_normals(mesh_data: &MeshData) -> Vec<Vec3> {
    let mut vertex_normals = vec![Vec3::ZERO; mesh_data.vertices.len()];

    for tri in mesh_data.triangles.chunks_exact(3) {
        let normal = surface_normal(mesh_data, tri[0], tri[1], tri[2]);
        for &index in tri {
            vertex_normals[index as usize] += normal;
        }
    }

    for tri in mesh_data.out_of_mesh_triangles.chunks_exact(3) {
        let normal = surface_normal(mesh_data, tri[0], tri[1], tri[2]);
        for &index in tri {
            if index >= 0 {
                vertex_normals[index as usize] += normal;
            }
        }
    }

    for normal in vertex_normals.iter_mut() {
        *normal = normal.normalize_or_zero();
    }
    vertex_normals
}

fn surface_normal(mesh_data: &MeshData, a: i32, b: i32, c: i32) -> Vec3 {
    let point_a = mesh_data.position(a);
    let side_ab = mesh_data.position(b) - point_a;
    let side_ac = mesh_data.position(c) - point_a;
    side_ab.cross(side_ac)
}

// Give every triangle its own unshared vertex triple (vertex count
// becomes exactly 3× triangle count) so recomputing normals from the
// winding yields hard per-face shading.
pub(crate) fn flat_shade(mesh_data: MeshData) -> SurfaceMesh {
    let mut flat_vertices = Vec::with_capacity(mesh_data.triangles.len());
    let mut flat_uvs = Vec::with_capacity(mesh_data.triangles.len());
    let mut triangles = Vec::with_capacity(mesh_data.triangles.len() / 3);

    for (i, tri) in mesh_data.triangles.chunks_exact(3).enumerate() {
        for &index in tri {
            flat_vertices.push(mesh_data.vertices[index as usize]);
            flat_uvs.push(mesh_data.uvs[index as usize]);
        }
        let base = (i * 3) as u32;
        triangles.push([base, base + 1, base + 2]);
    }

    let mut mesh = SurfaceMesh {
        vertices: flat_vertices,
        uvs: flat_uvs,
        triangles,
        normals: None,
    };
    mesh.recalculate_normals();
    mesh
}
