use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sky_utils::SkyboxSettings;

pub mod bvh;
pub mod collision;
pub mod floor;
pub mod spawn;

pub use collision::{
    CollisionGuard, CollisionWorld, GeometryHandle, PhysicsScene, RaycastBatch, Raycaster,
    down_orientation, ray_direction,
};
pub use floor::{FloorBounds, FloorRaycaster, HitMap, HitMapCell, SpawnPose, select_spawn};
pub use spawn::{SpawnManager, SpawnTicket};

/// Random source for yaw and spawn choice; seeded when the settings say so.
#[derive(Resource, Debug)]
pub struct SkyboxRng(pub StdRng);

impl SkyboxRng {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(StdRng::seed_from_u64(seed)),
            None => Self(StdRng::from_entropy()),
        }
    }
}

pub struct SkySimPlugin;

impl Plugin for SkySimPlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<SkyboxSettings>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(PhysicsScene::new(CollisionWorld::with_max_distance(
            settings.raycast_max_distance,
        )))
        .insert_resource(SkyboxRng::from_seed(settings.seed))
        .init_resource::<SpawnManager>();
    }
}

#[cfg(test)]
mod tests;
