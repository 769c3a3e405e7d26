use std::sync::Arc;

use bevy::prelude::*;
use sky_utils::ResolvedSkybox;

use crate::skybox_mesh::DisplacedMesh;

/// Requests a skybox build for this entity; the build starts once.
#[derive(Component, Debug, Clone)]
pub struct SkyboxSource(pub ResolvedSkybox);

/// World identity taken from the descriptor id.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct WorldIdentity(pub String);

/// Finished, fully displaced geometry in the entity's local space.
#[derive(Component, Debug, Clone)]
pub struct SkyboxGeometry(pub Arc<DisplacedMesh>);

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct SkyboxDepthBlend {
    /// 0 = flat sphere at `far_radius`, 1 = full depth.
    pub amount: f32,
    pub far_radius: f32,
}

impl Default for SkyboxDepthBlend {
    fn default() -> Self {
        Self {
            amount: 1.0,
            far_radius: 20.0,
        }
    }
}
