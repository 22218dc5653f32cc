//! Vertex and index buffers produced by the triangulator.
//!
//! A [`ChunkMesh`] starts out in world space with three fresh vertices per
//! triangle (flat shading by construction). Before it is handed to a render
//! sink it is moved into the chunk's local frame with [`ChunkMesh::to_local`]
//! and, when smooth normals are enabled, collapsed with [`ChunkMesh::smoothed`].

use std::collections::HashMap;

use cgmath::{Point3, Vector3};

/// A mesh vertex.
///
/// # Memory Layout
/// - Position: 3x f32 (12 bytes)
///
/// Total size: 12 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in world or chunk-local space, depending on the mesh stage
    pub position: [f32; 3],
}

impl Vertex {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position: [position.x, position.y, position.z],
        }
    }

    pub fn point(&self) -> Point3<f32> {
        Point3::from(self.position)
    }

    // Exact bit pattern, with -0.0 folded into 0.0 so both dedup together.
    fn key(&self) -> [u32; 3] {
        self.position.map(|component| {
            if component == 0.0 {
                0.0f32.to_bits()
            } else {
                component.to_bits()
            }
        })
    }
}

/// The triangles of one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the mesh while keeping its buffers allocated.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Appends a triangle with three new vertices and sequential indices.
    pub fn push_triangle(&mut self, corners: [Point3<f32>; 3]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(corners.iter().map(|&corner| Vertex::new(corner)));
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Moves every vertex into the frame of a chunk centered at `origin`.
    pub fn to_local(&mut self, origin: Point3<f32>) {
        let offset = Vector3::new(origin.x, origin.y, origin.z);
        for vertex in &mut self.vertices {
            *vertex = Vertex::new(vertex.point() - offset);
        }
    }

    /// Returns a copy of this mesh with identical positions merged into one
    /// shared vertex.
    ///
    /// Vertices keep the order in which their position first appears and the
    /// indices are remapped, so the triangle list is unchanged.
    pub fn smoothed(&self) -> ChunkMesh {
        let mut lookup: HashMap<[u32; 3], u32> = HashMap::with_capacity(self.vertices.len());
        let mut vertices = Vec::with_capacity(self.vertices.len() / 2);
        let mut indices = Vec::with_capacity(self.indices.len());

        for &index in &self.indices {
            let vertex = self.vertices[index as usize];
            let shared = *lookup.entry(vertex.key()).or_insert_with(|| {
                vertices.push(vertex);
                (vertices.len() - 1) as u32
            });
            indices.push(shared);
        }

        ChunkMesh { vertices, indices }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Raw vertex bytes, ready for upload into a vertex buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
