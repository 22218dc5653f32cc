use std::collections::HashMap;

use super::{ChunkHandle, RenderSink};
use crate::engine_state::meshing::Vertex;

/// The last mesh applied to one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// How many times a mesh was applied to this chunk
    pub updates: usize,
}

impl StoredMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An in-memory [`RenderSink`] keyed by chunk handle.
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: HashMap<ChunkHandle, StoredMesh>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chunk: ChunkHandle) -> Option<&StoredMesh> {
        self.meshes.get(&chunk)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(StoredMesh::triangle_count).sum()
    }

    pub fn total_updates(&self) -> usize {
        self.meshes.values().map(|mesh| mesh.updates).sum()
    }
}

impl RenderSink for MeshStore {
    fn apply_mesh(&mut self, chunk: ChunkHandle, vertices: &[Vertex], indices: &[u32]) {
        let mesh = self.meshes.entry(chunk).or_default();
        mesh.vertices.clear();
        mesh.vertices.extend_from_slice(vertices);
        mesh.indices.clear();
        mesh.indices.extend_from_slice(indices);
        mesh.updates += 1;
    }

    fn release_chunk(&mut self, chunk: ChunkHandle) {
        self.meshes.remove(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_replaces_the_previous_mesh() {
        let mut store = MeshStore::new();
        let vertex = Vertex { position: [1.0, 2.0, 3.0] };
        store.apply_mesh(ChunkHandle(0), &[vertex; 6], &[0, 1, 2, 3, 4, 5]);
        store.apply_mesh(ChunkHandle(0), &[vertex; 3], &[0, 1, 2]);

        let mesh = store.get(ChunkHandle(0)).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.updates, 2);
        assert_eq!(store.total_triangles(), 1);

        store.release_chunk(ChunkHandle(0));
        assert!(store.is_empty());
    }
}
