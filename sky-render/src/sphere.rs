use std::f32::consts::{PI, TAU};

/// Indexed triangle list of a UV sphere, before any displacement.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseTopology {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl BaseTopology {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Generate an outward-facing UV sphere with `(height_segments + 1) ×
/// (width_segments + 1)` vertices.
///
/// Every vertex of a pole row sits at exactly `(0, ±radius, 0)` while its UV
/// is shifted half a segment towards the face it belongs to, so pole vertices
/// are duplicates with differing UVs. The last column repeats the first at
/// `u = 1`; those seam vertices keep their own UV so the panorama does not
/// wrap across the final column of faces.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> BaseTopology {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let row_len = (width_segments + 1) as usize;
    let vertex_count = row_len * (height_segments + 1) as usize;
    let mut positions = Vec::with_capacity(vertex_count);
    let mut uvs = Vec::with_capacity(vertex_count);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };

        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let position = if iy == 0 {
                [0.0, radius, 0.0]
            } else if iy == height_segments {
                [0.0, -radius, 0.0]
            } else {
                let phi = u * TAU;
                let theta = v * PI;
                [
                    -radius * phi.cos() * theta.sin(),
                    radius * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                ]
            };
            positions.push(position);
            uvs.push([u + u_offset, 1.0 - v]);
        }
    }

    let mut indices = Vec::with_capacity(width_segments as usize * height_segments as usize * 6);
    let at = |ix: u32, iy: u32| iy * (width_segments + 1) + ix;
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = at(ix + 1, iy);
            let b = at(ix, iy);
            let c = at(ix, iy + 1);
            let d = at(ix + 1, iy + 1);

            // Pole rows collapse one triangle of each quad.
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    BaseTopology {
        positions,
        uvs,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::prelude::Vec3;

    #[test]
    fn vertex_and_triangle_counts() {
        let topology = uv_sphere(1.0, 64, 32);
        assert_eq!(topology.vertex_count(), 65 * 33);
        assert_eq!(topology.uvs.len(), topology.vertex_count());
        // Full quads everywhere except one triangle per pole-row quad.
        assert_eq!(topology.triangle_count(), 64 * 32 * 2 - 2 * 64);
    }

    #[test]
    fn vertices_lie_on_the_sphere() {
        let topology = uv_sphere(2.5, 16, 8);
        for p in &topology.positions {
            assert!((Vec3::from_array(*p).length() - 2.5).abs() < 1e-5);
        }
    }

    #[test]
    fn poles_are_exact_duplicates() {
        let topology = uv_sphere(1.0, 8, 4);
        let row = 9;
        for ix in 0..row {
            assert_eq!(topology.positions[ix], [0.0, 1.0, 0.0]);
            assert_eq!(topology.positions[4 * row + ix], [0.0, -1.0, 0.0]);
        }
        assert_ne!(topology.uvs[0], topology.uvs[1]);
    }

    #[test]
    fn triangles_face_outwards() {
        let topology = uv_sphere(1.0, 16, 8);
        for tri in topology.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(topology.positions[i as usize]));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }
}
