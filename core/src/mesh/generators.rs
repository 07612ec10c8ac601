//! Geometry generators for shapes the renderer uses directly.

use std::f32::consts::PI;

use super::data::GeometryData;
use super::layout::VertexLayout;

/// Position + normal + uv vertex.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PnuVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

/// Position + uv vertex.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PuVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

/// Generate a quad covering the whole viewport in clip space.
///
/// Positions span [-1, 1] on X and Y at depth 0. UV (0,0) is the top-left
/// corner so post-processing effects can sample render targets directly.
pub fn fullscreen_quad() -> GeometryData {
    let vertices = [
        PuVertex {
            position: [-1.0, -1.0, 0.0],
            uv: [0.0, 1.0],
        },
        PuVertex {
            position: [1.0, -1.0, 0.0],
            uv: [1.0, 1.0],
        },
        PuVertex {
            position: [1.0, 1.0, 0.0],
            uv: [1.0, 0.0],
        },
        PuVertex {
            position: [-1.0, 1.0, 0.0],
            uv: [0.0, 0.0],
        },
    ];
    let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];

    GeometryData::new(VertexLayout::position_uv())
        .with_vertex_data(bytemuck::cast_slice(&vertices).to_vec())
        .with_indices_u16(&indices)
        .with_label("fullscreen_quad")
}

/// Generate an axis-aligned cube centered at the origin.
///
/// Each face has its own four vertices so normals stay flat.
pub fn cube(half_extent: f32) -> GeometryData {
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (n, u, v) in faces {
        let base = vertices.len() as u16;
        for (cu, cv) in corners {
            let position = [
                (n[0] + u[0] * cu + v[0] * cv) * half_extent,
                (n[1] + u[1] * cu + v[1] * cv) * half_extent,
                (n[2] + u[2] * cu + v[2] * cv) * half_extent,
            ];
            vertices.push(PnuVertex {
                position,
                normal: n,
                uv: [(cu + 1.0) * 0.5, (1.0 - cv) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    GeometryData::new(VertexLayout::position_normal_uv())
        .with_vertex_data(bytemuck::cast_slice(&vertices).to_vec())
        .with_indices_u16(&indices)
        .with_label("cube")
}

/// Generate a UV sphere.
///
/// `segments` run around the equator, `rings` from pole to pole.
pub fn sphere(radius: f32, segments: u32, rings: u32) -> GeometryData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let x = sin_theta * cos_phi;
            let y = cos_theta;
            let z = sin_theta * sin_phi;

            vertices.push(PnuVertex {
                position: [x * radius, y * radius, z * radius],
                normal: [x, y, z],
                uv: [segment as f32 / segments as f32, ring as f32 / rings as f32],
            });
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            indices.extend_from_slice(&[current, next, current + 1, current + 1, next, next + 1]);
        }
    }

    GeometryData::new(VertexLayout::position_normal_uv())
        .with_vertex_data(bytemuck::cast_slice(&vertices).to_vec())
        .with_indices_u32(&indices)
        .with_label("sphere")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullscreen_quad() {
        let quad = fullscreen_quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 6);
        assert_eq!(quad.primitive_count(), 2);
        assert_eq!(quad.vertex_data().len(), 4 * 20);
    }

    #[test]
    fn test_cube() {
        let cube = cube(0.5);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.primitive_count(), 12);
    }

    #[test]
    fn test_cube_vertices_on_surface() {
        let cube = cube(2.0);
        let verts: Vec<f32> = cube
            .vertex_data()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        for v in verts.chunks(8) {
            let max = v[0].abs().max(v[1].abs()).max(v[2].abs());
            assert!((max - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sphere() {
        let mesh = sphere(1.0, 8, 4);
        // (rings+1) * (segments+1)
        assert_eq!(mesh.vertex_count(), 45);
        // rings * segments * 6
        assert_eq!(mesh.index_count(), 192);
    }
}
