use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};
use bevy::render::render_asset::RenderAssetUsages;
use sky_utils::SkyboxSettings;

use crate::depth::{DepthField, wrap_unit};
use crate::sphere::BaseTopology;

/// Inverse-depth displacement: `clamp(scale / depth, min * scale, max * scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementParams {
    pub scale: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for DisplacementParams {
    fn default() -> Self {
        Self {
            scale: 10.0,
            min: 0.1,
            max: 10.0,
        }
    }
}

impl DisplacementParams {
    pub fn from_settings(settings: &SkyboxSettings) -> Self {
        Self {
            scale: settings.scale,
            min: settings.min,
            max: settings.max,
        }
    }

    pub fn displacement(&self, raw_depth: f32) -> f32 {
        let lo = self.min * self.scale;
        let hi = self.max * self.scale;
        let d = self.scale / raw_depth;
        // Zero depth divides to +inf and clamps to the far limit; NaN goes there too.
        if d.is_nan() { hi } else { d.clamp(lo, hi) }
    }
}

/// Displaced, inward-facing skybox geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacedMesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

pub struct SphereMeshBuilder<'a> {
    field: &'a DepthField,
    params: DisplacementParams,
}

impl<'a> SphereMeshBuilder<'a> {
    pub fn new(field: &'a DepthField, params: DisplacementParams) -> Self {
        Self { field, params }
    }

    /// Consumes the base topology; panics if its buffers disagree in length.
    pub fn build(&self, topology: BaseTopology) -> DisplacedMesh {
        check_topology(&topology);
        let BaseTopology {
            mut positions,
            mut uvs,
            mut indices,
        } = topology;

        stitch_uvs(&positions, &mut uvs);
        self.displace(&mut positions, &uvs);
        reverse_winding(&mut indices);

        DisplacedMesh {
            positions,
            uvs,
            indices,
        }
    }

    fn displace(&self, positions: &mut [[f32; 3]], uvs: &[[f32; 2]]) {
        for (position, uv) in positions.iter_mut().zip(uvs) {
            let u = wrap_unit(uv[0]);
            let v = (1.0 - uv[1]).clamp(0.0, 1.0);
            let d = self.params.displacement(self.field.sample(u, v));
            *position = (Vec3::from_array(*position) * d).to_array();
        }
    }
}

fn check_topology(topology: &BaseTopology) {
    assert_eq!(
        topology.positions.len(),
        topology.uvs.len(),
        "position and uv buffers differ in vertex count"
    );
    assert!(
        topology.indices.len() % 3 == 0,
        "index buffer length {} is not a multiple of 3",
        topology.indices.len()
    );
    let vertex_count = topology.positions.len();
    if let Some(bad) = topology.indices.iter().find(|&&i| i as usize >= vertex_count) {
        panic!("index {bad} out of range for {vertex_count} vertices");
    }
}

fn position_key(p: &[f32; 3]) -> [u32; 3] {
    // +0.0 and -0.0 are the same point.
    p.map(|c| if c == 0.0 { 0u32 } else { c.to_bits() })
}

/// Gives every vertex the UV of the first vertex seen at its exact position.
pub fn stitch_uvs(positions: &[[f32; 3]], uvs: &mut [[f32; 2]]) {
    let mut first_seen: HashMap<[u32; 3], usize> = HashMap::with_capacity(positions.len());
    for (i, position) in positions.iter().enumerate() {
        match first_seen.entry(position_key(position)) {
            Entry::Occupied(canonical) => uvs[i] = uvs[*canonical.get()],
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
        }
    }
}

pub fn reverse_winding(indices: &mut [u32]) {
    for tri in indices.chunks_exact_mut(3) {
        tri.swap(0, 2);
    }
}

/// `mix(normalize(p) * far_radius, p * amount, amount)` per vertex.
///
/// `amount = 1` reproduces the displaced positions and `amount = 0` flattens
/// the skybox onto a sphere of radius `far_radius`.
pub fn blend_positions(positions: &[[f32; 3]], far_radius: f32, amount: f32) -> Vec<[f32; 3]> {
    positions
        .iter()
        .map(|p| {
            let p = Vec3::from_array(*p);
            let flat = p.normalize_or_zero() * far_radius;
            flat.lerp(p * amount, amount).to_array()
        })
        .collect()
}

impl DisplacedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned bounds of the positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from_array(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    pub fn to_render_mesh(&self, far_radius: f32, blend: f32) -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_POSITION,
            blend_positions(&self.positions, far_radius, blend),
        );
        // Bevy samples images top-down.
        let uvs: Vec<[f32; 2]> = self.uvs.iter().map(|uv| [uv[0], 1.0 - uv[1]]).collect();
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh.compute_normals();
        mesh
    }
}

/// Rewrites the position attribute of an existing render mesh for a new blend.
pub fn apply_blend(mesh: &mut Mesh, displaced: &DisplacedMesh, far_radius: f32, blend: f32) {
    let blended = blend_positions(&displaced.positions, far_radius, blend);
    if let Some(VertexAttributeValues::Float32x3(positions)) =
        mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION)
    {
        *positions = blended;
    } else {
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, blended);
    }
    mesh.compute_normals();
}
