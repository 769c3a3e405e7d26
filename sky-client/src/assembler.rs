use bevy::prelude::{Quat, Transform, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sky_render::{DisplacedMesh, load_skybox};
use sky_sim::{
    CollisionGuard, FloorBounds, FloorRaycaster, HitMap, PhysicsScene, SpawnManager, SpawnPose,
    SpawnTicket, select_spawn,
};
use sky_utils::{ResolvedSkybox, SkyboxError, SkyboxResult, SkyboxSettings};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

/// Everything one skybox load produces. Dropping it releases the collision
/// body.
#[derive(Debug)]
pub struct AssembledSkybox {
    pub id: String,
    pub mesh: DisplacedMesh,
    pub collision: Option<CollisionGuard>,
    pub hit_map: Option<HitMap>,
    pub spawn: Option<SpawnPose>,
    pub ticket: SpawnTicket,
}

/// Runs depth decode, mesh build, collision registration and floor discovery
/// off the async executor, then hands the pose to `spawns`. If the returned
/// future is dropped midway, any registered body is released.
pub async fn assemble(
    source: ResolvedSkybox,
    settings: SkyboxSettings,
    scene: PhysicsScene,
    spawns: &mut SpawnManager,
    seed: u64,
) -> SkyboxResult<AssembledSkybox> {
    let build_settings = settings.clone();
    let built = spawn_blocking(move || load_skybox(&source, &build_settings, false))
        .await
        .map_err(|err| SkyboxError::Task(err.to_string()))??;
    info!(
        id = %built.id,
        vertices = built.mesh.vertex_count(),
        "skybox mesh built in {:.1} ms",
        built.build_ms
    );

    let mut collision = None;
    let mut hit_map = None;
    let mut spawn = None;

    if settings.physics {
        let guard = scene.register(&built.mesh.positions, &built.mesh.indices, &Transform::default());
        match mesh_bounds(&built.mesh) {
            Some(bounds) => {
                let floor_scene = scene.clone();
                let floor_settings = settings.clone();
                let (map, pose) = spawn_blocking(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    discover_floor(&floor_scene, &bounds, &floor_settings, &mut rng)
                })
                .await
                .map_err(|err| SkyboxError::Task(err.to_string()))?;
                hit_map = Some(map);
                spawn = pose;
            }
            None => warn!(id = %built.id, "skybox mesh is empty, nothing to stand on"),
        }
        collision = Some(guard);
    }

    let ticket = place_spawn(spawns, spawn, &built.id);
    Ok(AssembledSkybox {
        id: built.id,
        mesh: built.mesh,
        collision,
        hit_map,
        spawn,
        ticket,
    })
}

/// Sets the spawn point (the origin when no floor was found) and requests a
/// spawn there.
pub fn place_spawn(spawns: &mut SpawnManager, pose: Option<SpawnPose>, id: &str) -> SpawnTicket {
    match pose {
        Some(pose) => spawns.set_spawn_point(pose.position, pose.orientation),
        None => {
            warn!(id, "no valid floor found, spawning at the origin");
            spawns.set_spawn_point(Vec3::ZERO, Quat::IDENTITY);
        }
    }
    spawns.spawn()
}

pub fn mesh_bounds(mesh: &DisplacedMesh) -> Option<FloorBounds> {
    mesh.bounds()
        .map(|(min, max)| FloorBounds::from_min_max(min, max))
}

/// Casts the floor grid against the scene as it is right now and picks a
/// spawn pose.
pub fn discover_floor<R: Rng + ?Sized>(
    scene: &PhysicsScene,
    bounds: &FloorBounds,
    settings: &SkyboxSettings,
    rng: &mut R,
) -> (HitMap, Option<SpawnPose>) {
    let raycaster = FloorRaycaster::from_settings(settings);
    let hit_map = {
        let world = scene.lock();
        raycaster.build_hit_map(bounds, &*world, rng)
    };
    let spawn = select_spawn(&hit_map, settings.spawn_policy, rng);
    info!(
        hits = hit_map.hit_count(),
        valid = hit_map.valid_count(),
        "floor discovery over {}x{} grid",
        hit_map.resolution(),
        hit_map.resolution()
    );
    (hit_map, spawn)
}
