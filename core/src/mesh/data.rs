//! CPU-side geometry data.

use std::sync::Arc;

use super::layout::VertexLayout;

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Number of primitives formed by `element_count` vertices or indices.
    pub fn primitive_count(&self, element_count: u32) -> u32 {
        match self {
            Self::PointList => element_count,
            Self::LineList => element_count / 2,
            Self::LineStrip => element_count.saturating_sub(1),
            Self::TriangleList => element_count / 3,
            Self::TriangleStrip => element_count.saturating_sub(2),
        }
    }
}

/// Index element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Size in bytes of each index.
    pub fn size(&self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Geometry ready to be drawn: one interleaved vertex stream plus optional indices.
///
/// Renderables hand out geometry as `Arc<GeometryData>` so the same mesh
/// can appear in many render operations without copying bytes.
#[derive(Debug, Clone)]
pub struct GeometryData {
    layout: Arc<VertexLayout>,
    topology: PrimitiveTopology,
    vertex_data: Vec<u8>,
    vertex_count: u32,
    index_data: Option<Vec<u8>>,
    index_format: Option<IndexFormat>,
    index_count: u32,
    label: Option<String>,
}

impl GeometryData {
    /// Create empty geometry with the given layout.
    pub fn new(layout: Arc<VertexLayout>) -> Self {
        Self {
            layout,
            topology: PrimitiveTopology::TriangleList,
            vertex_data: Vec::new(),
            vertex_count: 0,
            index_data: None,
            index_format: None,
            index_count: 0,
            label: None,
        }
    }

    /// Set vertex bytes. The vertex count is derived from the layout stride.
    pub fn with_vertex_data(mut self, data: Vec<u8>) -> Self {
        let stride = self.layout.stride.max(1) as usize;
        self.vertex_count = (data.len() / stride) as u32;
        self.vertex_data = data;
        self
    }

    /// Set u16 indices.
    pub fn with_indices_u16(mut self, indices: &[u16]) -> Self {
        self.index_data = Some(bytemuck::cast_slice(indices).to_vec());
        self.index_format = Some(IndexFormat::Uint16);
        self.index_count = indices.len() as u32;
        self
    }

    /// Set u32 indices.
    pub fn with_indices_u32(mut self, indices: &[u32]) -> Self {
        self.index_data = Some(bytemuck::cast_slice(indices).to_vec());
        self.index_format = Some(IndexFormat::Uint32);
        self.index_count = indices.len() as u32;
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn layout(&self) -> &Arc<VertexLayout> {
        &self.layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertex_data(&self) -> &[u8] {
        &self.vertex_data
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_data(&self) -> Option<&[u8]> {
        self.index_data.as_deref()
    }

    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_format
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_indexed(&self) -> bool {
        self.index_format.is_some() && self.index_count > 0
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Number of primitives a draw of this geometry submits.
    pub fn primitive_count(&self) -> u32 {
        let elements = if self.is_indexed() {
            self.index_count
        } else {
            self.vertex_count
        };
        self.topology.primitive_count(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_from_stride() {
        let geo = GeometryData::new(VertexLayout::position_uv()).with_vertex_data(vec![0u8; 60]);
        assert_eq!(geo.vertex_count(), 3);
        assert!(!geo.is_indexed());
        assert_eq!(geo.primitive_count(), 1);
    }

    #[test]
    fn test_indexed_primitive_count() {
        let geo = GeometryData::new(VertexLayout::position_uv())
            .with_vertex_data(vec![0u8; 80])
            .with_indices_u16(&[0, 1, 2, 2, 3, 0]);
        assert_eq!(geo.index_count(), 6);
        assert_eq!(geo.index_format(), Some(IndexFormat::Uint16));
        assert_eq!(geo.index_data().map(|d| d.len()), Some(12));
        assert_eq!(geo.primitive_count(), 2);
    }

    #[test]
    fn test_strip_topology_counts() {
        assert_eq!(PrimitiveTopology::TriangleStrip.primitive_count(4), 2);
        assert_eq!(PrimitiveTopology::TriangleStrip.primitive_count(1), 0);
        assert_eq!(PrimitiveTopology::LineList.primitive_count(6), 3);
    }
}
