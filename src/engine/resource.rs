// Render resources the entity pool refers to but never owns.
//
// Meshes, textures and programs live in the renderer; entities only carry
// these small copyable ids. Draw resolves them through `MeshSource` and
// hands them to a `RenderSink` unchanged.

/// Handle to a mesh registered in a [`MeshSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Handle to a texture owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to a shader program (render pipeline) owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Slice of the shared index buffer that draws one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub first_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
}

impl IndexRange {
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.first_index..self.first_index + self.index_count
    }
}

/// Resolves mesh handles to index ranges.
pub trait MeshSource {
    fn index_range(&self, mesh: MeshId) -> Option<IndexRange>;
}

/// Receives the per-entity binds and draws issued by `EntityBuffer::draw`.
pub trait RenderSink {
    fn bind_program(&mut self, program: ProgramId);
    fn bind_texture(&mut self, texture: TextureId);
    /// Bind the `size` byte window of the entity uniform block at `offset`.
    fn bind_entity_block(&mut self, offset: u64, size: u64);
    fn draw_indexed(&mut self, range: IndexRange);
}
