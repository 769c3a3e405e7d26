use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use bevy::prelude::{Quat, Resource, Transform, Vec3};
use tracing::debug;

use crate::bvh::{Triangle, TriangleBvh};

const DEFAULT_MAX_DISTANCE: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeometryHandle(u64);

/// Results of one batched query; `point` holds 3 floats per ray.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaycastBatch {
    pub hit: Vec<bool>,
    pub point: Vec<f32>,
}

impl RaycastBatch {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            hit: Vec::with_capacity(count),
            point: Vec::with_capacity(count * 3),
        }
    }

    pub fn push(&mut self, hit: Option<Vec3>) {
        self.hit.push(hit.is_some());
        self.point
            .extend_from_slice(&hit.unwrap_or(Vec3::ZERO).to_array());
    }

    pub fn len(&self) -> usize {
        self.hit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hit.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Vec3> {
        if !*self.hit.get(index)? {
            return None;
        }
        let p = self.point.get(index * 3..index * 3 + 3)?;
        Some(Vec3::new(p[0], p[1], p[2]))
    }
}

/// Anything that can answer a batch of rays against one consistent geometry
/// state.
pub trait Raycaster {
    fn raycast_array(&self, origins: &[Vec3], orientations: &[Quat]) -> RaycastBatch;
}

/// Rays travel along the orientation's local -Z.
pub fn ray_direction(orientation: Quat) -> Vec3 {
    (orientation * Vec3::NEG_Z).normalize_or_zero()
}

/// Orientation whose ray points straight down.
pub fn down_orientation() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// Static triangle bodies queried by raycasts.
#[derive(Debug)]
pub struct CollisionWorld {
    next_id: u64,
    bodies: BTreeMap<GeometryHandle, TriangleBvh>,
    max_distance: f32,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::with_max_distance(DEFAULT_MAX_DISTANCE)
    }
}

impl CollisionWorld {
    pub fn with_max_distance(max_distance: f32) -> Self {
        Self {
            next_id: 0,
            bodies: BTreeMap::new(),
            max_distance,
        }
    }

    /// Registers an indexed triangle list, baked into world space.
    pub fn add_geometry(
        &mut self,
        positions: &[[f32; 3]],
        indices: &[u32],
        transform: &Transform,
    ) -> GeometryHandle {
        let world: Vec<Vec3> = positions
            .iter()
            .map(|p| transform.transform_point(Vec3::from_array(*p)))
            .collect();
        let triangles = indices
            .chunks_exact(3)
            .map(|tri| {
                Triangle::new(
                    world[tri[0] as usize],
                    world[tri[1] as usize],
                    world[tri[2] as usize],
                )
            })
            .collect();

        let handle = GeometryHandle(self.next_id);
        self.next_id += 1;
        let bvh = TriangleBvh::build(triangles);
        debug!(?handle, triangles = bvh.triangle_count(), "collision geometry added");
        self.bodies.insert(handle, bvh);
        handle
    }

    pub fn remove_geometry(&mut self, handle: GeometryHandle) -> bool {
        let removed = self.bodies.remove(&handle).is_some();
        if removed {
            debug!(?handle, "collision geometry removed");
        }
        removed
    }

    pub fn contains(&self, handle: GeometryHandle) -> bool {
        self.bodies.contains_key(&handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Nearest hit point over every body.
    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        if direction == Vec3::ZERO {
            return None;
        }
        self.bodies
            .values()
            .filter_map(|bvh| bvh.raycast(origin, direction, self.max_distance))
            .reduce(f32::min)
            .map(|t| origin + direction * t)
    }
}

impl Raycaster for CollisionWorld {
    fn raycast_array(&self, origins: &[Vec3], orientations: &[Quat]) -> RaycastBatch {
        assert_eq!(
            origins.len(),
            orientations.len(),
            "raycast batch needs one orientation per origin"
        );
        let mut batch = RaycastBatch::with_capacity(origins.len());
        for (origin, orientation) in origins.iter().zip(orientations) {
            batch.push(self.raycast(*origin, ray_direction(*orientation)));
        }
        batch
    }
}

/// Collision world shared between the app and background loaders.
#[derive(Resource, Debug, Clone, Default)]
pub struct PhysicsScene(Arc<Mutex<CollisionWorld>>);

impl PhysicsScene {
    pub fn new(world: CollisionWorld) -> Self {
        Self(Arc::new(Mutex::new(world)))
    }

    /// Holding the guard keeps the geometry fixed for a whole batch.
    pub fn lock(&self) -> MutexGuard<'_, CollisionWorld> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` while someone else holds the world, e.g. during a batch.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, CollisionWorld>> {
        match self.0.try_lock() {
            Ok(world) => Some(world),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn register(
        &self,
        positions: &[[f32; 3]],
        indices: &[u32],
        transform: &Transform,
    ) -> CollisionGuard {
        let handle = self.lock().add_geometry(positions, indices, transform);
        CollisionGuard {
            scene: self.clone(),
            handle,
        }
    }
}

/// Owns one registered body and removes it when dropped.
#[derive(Debug)]
pub struct CollisionGuard {
    scene: PhysicsScene,
    handle: GeometryHandle,
}

impl CollisionGuard {
    pub fn handle(&self) -> GeometryHandle {
        self.handle
    }

    pub fn scene(&self) -> &PhysicsScene {
        &self.scene
    }
}

impl Drop for CollisionGuard {
    fn drop(&mut self) {
        self.scene.lock().remove_geometry(self.handle);
    }
}
