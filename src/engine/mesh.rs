// Procedural mesh types, triangulation and the packed mesh buffer.
//
// Pipeline:
//   builder fn → PolyMesh → triangulate_smooth() → RenderMesh → MeshBuffer → GPU
//
// Every game mesh lives in one vertex buffer and one index buffer. An entity
// only carries a MeshId; MeshBuffer resolves it to an index range at draw time.

use std::collections::HashMap;
use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

use super::resource::{IndexRange, MeshId, MeshSource};

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex.
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
///   @location(2) uv:       vec2<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
    pub uv:       [f32; 2],
}

impl GpuVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// ============================================================================
// POLY MESH
// ============================================================================

/// Intermediate polygon mesh for procedural construction.
/// Faces are n-gons with CCW winding seen from outside.
/// Only used at startup; heap allocation per face is fine.
#[derive(Debug, Default)]
pub struct PolyMesh {
    pub positions: Vec<Vec3>,
    pub uvs:       Vec<Vec2>,
    pub faces:     Vec<Vec<usize>>,
}

impl PolyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Vec3, uv: Vec2) -> usize {
        let idx = self.positions.len();
        self.positions.push(pos);
        self.uvs.push(uv);
        idx
    }

    /// Add a face by vertex indices (CCW order).
    pub fn add_face(&mut self, indices: Vec<usize>) {
        debug_assert!(indices.len() >= 3, "Face must have at least 3 vertices");
        self.faces.push(indices);
    }

    pub fn vertex_count(&self) -> usize { self.positions.len() }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// Triangulated mesh with per-vertex normals, ready to pack into a `MeshBuffer`.
#[derive(Debug, Clone)]
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u32>,
}

impl RenderMesh {
    pub fn index_count(&self) -> usize  { self.indices.len() }
}

// ============================================================================
// TRIANGULATION + SMOOTH NORMALS
// ============================================================================

/// Convert a PolyMesh to a RenderMesh with smooth (area-weighted) normals.
///
/// Vertices are shared across triangles through the index buffer, so a
/// vertex normal is the sum of the unnormalized normals of every triangle
/// touching it (cross product magnitude = 2×area). Faces are fan-triangulated
/// from their first vertex.
pub fn triangulate_smooth(poly: &PolyMesh) -> RenderMesh {
    let mut normal_accum: Vec<Vec3> = vec![Vec3::ZERO; poly.vertex_count()];
    let mut indices: Vec<u32> = Vec::new();

    for face in &poly.faces {
        for i in 1..(face.len() - 1) {
            let (a, b, c) = (face[0], face[i], face[i + 1]);
            let weighted_normal = (poly.positions[b] - poly.positions[a])
                .cross(poly.positions[c] - poly.positions[a]);
            normal_accum[a] += weighted_normal;
            normal_accum[b] += weighted_normal;
            normal_accum[c] += weighted_normal;
            indices.extend([a as u32, b as u32, c as u32]);
        }
    }

    let vertices = poly.positions.iter()
        .zip(&poly.uvs)
        .zip(&normal_accum)
        .map(|((pos, uv), n)| GpuVertex {
            position: pos.to_array(),
            normal:   n.normalize_or_zero().to_array(),
            uv:       uv.to_array(),
        })
        .collect();

    RenderMesh { vertices, indices }
}

/// Like `triangulate_smooth`, but every face gets its own vertices so normals
/// are flat. Used for hard-edged shapes (the fighter, shots).
pub fn triangulate_flat(poly: &PolyMesh) -> RenderMesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in &poly.faces {
        let base = vertices.len() as u32;
        let p0 = poly.positions[face[0]];
        let mut normal = Vec3::ZERO;
        for i in 1..(face.len() - 1) {
            normal += (poly.positions[face[i]] - p0).cross(poly.positions[face[i + 1]] - p0);
        }
        let normal = normal.normalize_or_zero().to_array();
        for &v in face {
            vertices.push(GpuVertex {
                position: poly.positions[v].to_array(),
                normal,
                uv: poly.uvs[v].to_array(),
            });
        }
        for i in 1..(face.len() as u32 - 1) {
            indices.extend([base, base + i, base + i + 1]);
        }
    }

    RenderMesh { vertices, indices }
}

// ============================================================================
// PROCEDURAL SHAPES
// ============================================================================

/// Ring torus around the Y axis.
/// `major` is the ring radius, `minor` the tube radius.
pub fn torus(major: f32, minor: f32, rings: usize, sides: usize) -> PolyMesh {
    let mut poly = PolyMesh::new();
    // Seam vertices are duplicated so uv wraps cleanly.
    for r in 0..=rings {
        let u = r as f32 / rings as f32;
        let (su, cu) = (u * TAU).sin_cos();
        for s in 0..=sides {
            let v = s as f32 / sides as f32;
            let (sv, cv) = (v * TAU).sin_cos();
            let radial = major + minor * cv;
            poly.add_vertex(Vec3::new(radial * cu, minor * sv, radial * su), Vec2::new(u, v));
        }
    }
    let row = sides + 1;
    for r in 0..rings {
        for s in 0..sides {
            let a = r * row + s;
            let b = (r + 1) * row + s;
            poly.add_face(vec![a, a + 1, b + 1, b]);
        }
    }
    poly
}

/// Axis-aligned box centered on the origin.
pub fn cuboid(half: Vec3) -> PolyMesh {
    let mut poly = PolyMesh::new();
    // (normal axis, u axis, v axis) per face, CCW seen from outside.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    for (n, u, v) in faces {
        let corner = |su: f32, sv: f32| (n + u * su + v * sv) * half;
        let quad = [
            poly.add_vertex(corner(-1.0, -1.0), Vec2::new(0.0, 1.0)),
            poly.add_vertex(corner(1.0, -1.0), Vec2::new(1.0, 1.0)),
            poly.add_vertex(corner(1.0, 1.0), Vec2::new(1.0, 0.0)),
            poly.add_vertex(corner(-1.0, 1.0), Vec2::new(0.0, 0.0)),
        ];
        poly.add_face(quad.to_vec());
    }
    poly
}

/// Dart-shaped fighter pointing along +Z, about 2 m long and wide.
pub fn fighter() -> PolyMesh {
    let mut poly = PolyMesh::new();
    let nose = poly.add_vertex(Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.5, 0.0));
    let left = poly.add_vertex(Vec3::new(-1.0, 0.0, -0.8), Vec2::new(0.0, 1.0));
    let right = poly.add_vertex(Vec3::new(1.0, 0.0, -0.8), Vec2::new(1.0, 1.0));
    let top = poly.add_vertex(Vec3::new(0.0, 0.35, -0.6), Vec2::new(0.5, 0.8));
    let bottom = poly.add_vertex(Vec3::new(0.0, -0.2, -0.6), Vec2::new(0.5, 0.9));
    let tail = poly.add_vertex(Vec3::new(0.0, 0.0, -1.0), Vec2::new(0.5, 1.0));
    poly.add_face(vec![nose, top, left]);
    poly.add_face(vec![nose, right, top]);
    poly.add_face(vec![nose, left, bottom]);
    poly.add_face(vec![nose, bottom, right]);
    poly.add_face(vec![left, top, tail]);
    poly.add_face(vec![top, right, tail]);
    poly.add_face(vec![bottom, left, tail]);
    poly.add_face(vec![right, bottom, tail]);
    poly
}

/// UV sphere, used for blasts.
pub fn sphere(radius: f32, stacks: usize, slices: usize) -> PolyMesh {
    let mut poly = PolyMesh::new();
    for st in 0..=stacks {
        let v = st as f32 / stacks as f32;
        let (sp, cp) = (v * std::f32::consts::PI).sin_cos();
        for sl in 0..=slices {
            let u = sl as f32 / slices as f32;
            let (sa, ca) = (u * TAU).sin_cos();
            poly.add_vertex(Vec3::new(sp * ca, cp, sp * sa) * radius, Vec2::new(u, v));
        }
    }
    let row = slices + 1;
    for st in 0..stacks {
        for sl in 0..slices {
            let a = st * row + sl;
            let b = a + row;
            if st == 0 {
                poly.add_face(vec![a, b + 1, b]);
            } else if st == stacks - 1 {
                poly.add_face(vec![a, a + 1, b]);
            } else {
                poly.add_face(vec![a, a + 1, b + 1, b]);
            }
        }
    }
    poly
}

// ============================================================================
// MESH BUFFER
// ============================================================================

/// All meshes of the game packed into one vertex and one index array.
///
/// Names are resolved to `MeshId`s once at startup; draws look the id up
/// through `MeshSource`.
#[derive(Debug, Default)]
pub struct MeshBuffer {
    vertices: Vec<GpuVertex>,
    indices:  Vec<u32>,
    ranges:   Vec<IndexRange>,
    names:    HashMap<String, MeshId>,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `mesh` under `name`. Re-adding a name replaces what the name
    /// resolves to; the old geometry stays packed.
    pub fn add(&mut self, name: &str, mesh: &RenderMesh) -> MeshId {
        let range = IndexRange {
            first_index: self.indices.len() as u32,
            index_count: mesh.index_count() as u32,
            base_vertex: self.vertices.len() as i32,
        };
        self.vertices.extend_from_slice(&mesh.vertices);
        self.indices.extend_from_slice(&mesh.indices);

        let id = MeshId(self.ranges.len() as u32);
        self.ranges.push(range);
        self.names.insert(name.to_string(), id);
        log::debug!("Mesh '{name}' -> {id:?}: {} vertices, {} indices", mesh.vertices.len(), range.index_count);
        id
    }

    pub fn id(&self, name: &str) -> Option<MeshId> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Upload the packed arrays.
    pub fn upload(&self, device: &wgpu::Device) -> GpuMeshes {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: self.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: self.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::info!(
            "Uploaded {} meshes ({} vertices, {} indices)",
            self.ranges.len(),
            self.vertices.len(),
            self.indices.len()
        );
        GpuMeshes { vertex_buffer, index_buffer }
    }
}

impl MeshSource for MeshBuffer {
    fn index_range(&self, mesh: MeshId) -> Option<IndexRange> {
        self.ranges.get(mesh.0 as usize).copied()
    }
}

/// Device copies of a `MeshBuffer`, bound once per render pass.
pub struct GpuMeshes {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer:  wgpu::Buffer,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_closed_and_outward(mesh: &RenderMesh) {
        // Every triangle's normal should point away from the origin for
        // these origin-centered convex(ish) shapes.
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| Vec3::from_array(mesh.vertices[i as usize].position);
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let n = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(n.dot(centroid) >= -1e-4, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn cuboid_has_six_quads_facing_out() {
        let poly = cuboid(Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(poly.faces.len(), 6);
        let mesh = triangulate_flat(&poly);
        assert_eq!(mesh.index_count(), 36);
        assert_closed_and_outward(&mesh);
    }

    #[test]
    fn fighter_faces_point_out() {
        let mesh = triangulate_flat(&fighter());
        assert_eq!(mesh.index_count(), 24);
        assert_closed_and_outward(&mesh);
    }

    #[test]
    fn sphere_normals_are_radial() {
        let mesh = triangulate_smooth(&sphere(1.0, 8, 12));
        for v in &mesh.vertices {
            let n = Vec3::from_array(v.normal);
            let p = Vec3::from_array(v.position);
            if n != Vec3::ZERO && p.y.abs() < 0.99 {
                assert!(n.dot(p.normalize()) > 0.9);
            }
        }
    }

    #[test]
    fn torus_vertices_lie_on_tube() {
        let poly = torus(1.0, 0.3, 16, 8);
        assert_eq!(poly.vertex_count(), 17 * 9);
        assert_eq!(poly.faces.len(), 16 * 8);
        for p in &poly.positions {
            let ring = Vec3::new(p.x, 0.0, p.z).normalize() * 1.0;
            assert!(((*p - ring).length() - 0.3).abs() < 1e-4);
        }
    }

    #[test]
    fn mesh_buffer_packs_ranges() {
        let mut buffer = MeshBuffer::new();
        let a = buffer.add("box", &triangulate_flat(&cuboid(Vec3::ONE)));
        let b = buffer.add("fighter", &triangulate_flat(&fighter()));

        assert_eq!(buffer.id("fighter"), Some(b));
        assert_eq!(buffer.id("nope"), None);
        assert_eq!(
            buffer.index_range(a),
            Some(IndexRange { first_index: 0, index_count: 36, base_vertex: 0 })
        );
        assert_eq!(
            buffer.index_range(b),
            Some(IndexRange { first_index: 36, index_count: 24, base_vertex: 24 })
        );
        assert_eq!(buffer.index_range(MeshId(2)), None);
        assert_eq!(buffer.vertex_bytes().len(), 48 * std::mem::size_of::<GpuVertex>());
    }
}
