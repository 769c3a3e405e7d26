use bevy::prelude::*;
use rand::Rng;
use sky_render::{SkyboxGeometry, SkyboxSource, WorldIdentity};
use sky_sim::{
    CollisionGuard, FloorBounds, HitMap, HitMapCell, PhysicsScene, SkyboxRng, SpawnManager,
};
use sky_utils::{ResolvedSkybox, SkyboxSettings};
use tracing::{debug, info, warn};

use crate::assembler::place_spawn;
use crate::floor_async::{FloorAsyncResources, FloorJob};

#[derive(Component)]
pub struct Player;

#[derive(Component)]
pub struct PlayerCamera;

/// The skybox the app was launched with.
#[derive(Resource, Debug, Clone)]
pub struct SkyboxRequest(pub ResolvedSkybox);

/// Whether the skybox takes part in raycasts.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkyboxPhysics {
    pub enabled: bool,
}

/// Registered collision body; removing the component releases it.
#[derive(Component, Debug)]
pub struct SkyboxCollision(pub CollisionGuard);

#[derive(Component, Debug)]
pub struct SkyboxHitMap(pub HitMap);

pub fn spawn_player(mut commands: Commands, settings: Res<SkyboxSettings>) {
    commands
        .spawn((Player, Transform::default(), Visibility::default()))
        .with_children(|parent| {
            parent.spawn((
                Camera3d::default(),
                PlayerCamera,
                Transform::from_xyz(0.0, settings.eye_height, 0.0),
            ));
        });
}

pub fn spawn_requested_skybox(mut commands: Commands, request: Option<Res<SkyboxRequest>>) {
    let Some(request) = request else {
        return;
    };
    info!(id = %request.0.id, "loading skybox");
    commands.spawn((
        SkyboxSource(request.0.clone()),
        Transform::default(),
        Visibility::default(),
    ));
}

pub fn attach_skybox_physics(
    mut commands: Commands,
    settings: Res<SkyboxSettings>,
    skyboxes: Query<Entity, (Added<SkyboxGeometry>, Without<SkyboxPhysics>)>,
) {
    for entity in &skyboxes {
        commands.entity(entity).insert(SkyboxPhysics {
            enabled: settings.physics,
        });
    }
}

pub fn skybox_toggle_system(
    keys: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<SkyboxSettings>,
    mut physics: Query<&mut SkyboxPhysics>,
) {
    if keys.just_pressed(KeyCode::KeyP) {
        for mut toggle in &mut physics {
            toggle.enabled = !toggle.enabled;
        }
    }
    if keys.just_pressed(KeyCode::KeyH) {
        settings.show_hit_map = !settings.show_hit_map;
    }
}

/// Floor discovery for this skybox is running on the floor runtime.
#[derive(Component, Debug)]
pub struct FloorDiscoveryPending;

#[allow(clippy::type_complexity)]
pub fn sync_skybox_physics(
    mut commands: Commands,
    scene: Res<PhysicsScene>,
    settings: Res<SkyboxSettings>,
    floor_async: Res<FloorAsyncResources>,
    mut rng: ResMut<SkyboxRng>,
    mut spawns: ResMut<SpawnManager>,
    skyboxes: Query<(
        Entity,
        &SkyboxGeometry,
        &Transform,
        Ref<SkyboxPhysics>,
        Option<&SkyboxCollision>,
        Has<SkyboxHitMap>,
        Has<FloorDiscoveryPending>,
        Option<&WorldIdentity>,
    )>,
) {
    for (entity, geometry, transform, physics, collision, has_hit_map, pending, identity) in
        &skyboxes
    {
        if !physics.is_changed() {
            continue;
        }
        let id = identity.map(|w| w.0.as_str()).unwrap_or("unnamed");

        if !physics.enabled {
            if let Some(collision) = collision {
                info!(id, handle = ?collision.0.handle(), "skybox physics off, releasing collision body");
                commands.entity(entity).remove::<SkyboxCollision>();
            }
            continue;
        }
        if collision.is_some() {
            continue;
        }

        let mesh = &geometry.0;
        let guard = scene.register(&mesh.positions, &mesh.indices, transform);
        commands.entity(entity).insert(SkyboxCollision(guard));

        // The floor and the spawn are found once; later toggles only restore the body.
        if has_hit_map || pending {
            debug!(id, "skybox physics back on, collision body restored");
            continue;
        }

        let bounds = FloorBounds::from_points(
            mesh.positions
                .iter()
                .map(|p| transform.transform_point(Vec3::from_array(*p))),
        );
        let Some(bounds) = bounds else {
            warn!(id, "skybox geometry is empty");
            place_spawn(&mut spawns, None, id);
            continue;
        };

        let job = FloorJob {
            entity,
            scene: scene.clone(),
            bounds,
            settings: settings.clone(),
            seed: rng.0.r#gen(),
        };
        if floor_async.job_tx.send(job).is_ok() {
            debug!(id, "queued floor discovery");
            commands.entity(entity).insert(FloorDiscoveryPending);
        }
    }
}

pub fn apply_floor_results(
    mut commands: Commands,
    floor_async: Res<FloorAsyncResources>,
    mut spawns: ResMut<SpawnManager>,
    skyboxes: Query<(Has<SkyboxCollision>, Option<&WorldIdentity>), With<FloorDiscoveryPending>>,
) {
    let mut receiver = floor_async
        .result_rx
        .lock()
        .expect("floor result receiver lock poisoned");

    while let Ok(result) = receiver.try_recv() {
        let Ok((has_collision, identity)) = skyboxes.get(result.entity) else {
            debug!("skybox {:?} went away before its floor was found", result.entity);
            continue;
        };
        let id = identity.map(|w| w.0.as_str()).unwrap_or("unnamed");
        commands.entity(result.entity).remove::<FloorDiscoveryPending>();

        let (hit_map, pose) = match result.outcome {
            Ok(found) => found,
            Err(err) => {
                warn!(id, "floor discovery failed: {}", err);
                place_spawn(&mut spawns, None, id);
                continue;
            }
        };
        if !has_collision {
            debug!(id, "physics went off during floor discovery, result dropped");
            continue;
        }
        place_spawn(&mut spawns, pose, id);
        commands.entity(result.entity).insert(SkyboxHitMap(hit_map));
    }
}

pub fn apply_pending_spawns(
    mut spawns: ResMut<SpawnManager>,
    mut players: Query<&mut Transform, With<Player>>,
) {
    while let Some(ticket) = spawns.take_pending() {
        for mut transform in &mut players {
            transform.translation = ticket.position;
            transform.rotation = ticket.orientation;
        }
        info!(id = ticket.id, position = ?ticket.position, "player placed");
        spawns.complete(ticket);
    }
}

pub fn draw_hit_map_system(
    mut gizmos: Gizmos,
    settings: Res<SkyboxSettings>,
    hit_maps: Query<&SkyboxHitMap>,
) {
    if !settings.show_hit_map {
        return;
    }
    let valid = Color::srgba(0.2, 1.0, 0.2, 1.0);
    let invalid = Color::srgba(1.0, 0.5, 0.1, 1.0);
    for hit_map in &hit_maps {
        for cell in hit_map.0.cells() {
            match *cell {
                HitMapCell::Miss => {}
                HitMapCell::Hit(point) => draw_cross(&mut gizmos, point, 0.02, invalid),
                HitMapCell::Valid { point, .. } => draw_cross(&mut gizmos, point, 0.03, valid),
            }
        }
    }
}

fn draw_cross(gizmos: &mut Gizmos, center: Vec3, half: f32, color: Color) {
    gizmos.line(center - Vec3::X * half, center + Vec3::X * half, color);
    gizmos.line(center - Vec3::Y * half, center + Vec3::Y * half, color);
    gizmos.line(center - Vec3::Z * half, center + Vec3::Z * half, color);
}
