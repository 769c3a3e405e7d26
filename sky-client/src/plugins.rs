use bevy::prelude::*;

use crate::floor_async::FloorAsyncResources;
use crate::skybox_systems;

pub struct ClientSkyboxPlugin;

impl Plugin for ClientSkyboxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FloorAsyncResources>()
            .add_systems(
                Startup,
                (
                    skybox_systems::spawn_player,
                    skybox_systems::spawn_requested_skybox,
                ),
            )
            .add_systems(
                Update,
                (
                    skybox_systems::skybox_toggle_system,
                    skybox_systems::attach_skybox_physics,
                    skybox_systems::sync_skybox_physics
                        .after(skybox_systems::attach_skybox_physics)
                        .after(skybox_systems::skybox_toggle_system),
                    skybox_systems::apply_floor_results.after(skybox_systems::sync_skybox_physics),
                    skybox_systems::apply_pending_spawns.after(skybox_systems::apply_floor_results),
                    skybox_systems::draw_hit_map_system.after(skybox_systems::apply_floor_results),
                ),
            );
    }
}
