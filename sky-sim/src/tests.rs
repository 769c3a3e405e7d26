use bevy::prelude::{Transform, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sky_utils::SpawnPolicy;

use super::collision::{CollisionWorld, PhysicsScene};
use super::floor::{FloorBounds, FloorRaycaster, HitMapCell, select_spawn};

fn quad(min: Vec3, max: Vec3, y: f32) -> (Vec<[f32; 3]>, Vec<u32>) {
    (
        vec![
            [min.x, y, min.z],
            [max.x, y, min.z],
            [max.x, y, max.z],
            [min.x, y, max.z],
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

#[test]
fn flat_floor_is_valid_everywhere() {
    let mut world = CollisionWorld::default();
    let (positions, indices) = quad(Vec3::splat(-20.0), Vec3::splat(20.0), -5.0);
    world.add_geometry(&positions, &indices, &Transform::default());

    let bounds = FloorBounds::from_min_max(Vec3::splat(-5.0), Vec3::splat(5.0));
    let mut rng = StdRng::seed_from_u64(1);
    let map = FloorRaycaster::new(32, 5).build_hit_map(&bounds, &world, &mut rng);

    assert_eq!(map.hit_count(), 32 * 32);
    assert_eq!(map.valid_count(), 32 * 32);
    let pose = select_spawn(&map, SpawnPolicy::RandomValid, &mut rng).unwrap();
    assert!((pose.position.y + 5.0).abs() < 1e-4);
}

#[test]
fn ledge_cells_are_not_valid() {
    // Floor covers only the half of the grid with x < 0.
    let mut world = CollisionWorld::default();
    let (positions, indices) = quad(Vec3::new(-20.0, 0.0, -20.0), Vec3::new(0.0, 0.0, 20.0), -2.0);
    world.add_geometry(&positions, &indices, &Transform::default());

    let bounds = FloorBounds::from_min_max(Vec3::splat(-8.0), Vec3::splat(8.0));
    let map = FloorRaycaster::new(16, 2).build_hit_map(&bounds, &world, &mut StdRng::seed_from_u64(3));

    // Columns 0..=8 lie on or left of x = 0.
    assert!(map.cell(3, 8).and_then(HitMapCell::point).is_some());
    assert!(map.cell(3, 8).unwrap().is_valid());
    assert!(!map.cell(7, 8).unwrap().is_valid());
    assert_eq!(map.cell(12, 8), Some(&HitMapCell::Miss));
}

#[test]
fn raycast_runs_against_one_scene_snapshot() {
    let scene = PhysicsScene::default();
    let (positions, indices) = quad(Vec3::splat(-10.0), Vec3::splat(10.0), -1.0);
    let guard = scene.register(&positions, &indices, &Transform::default());

    let bounds = FloorBounds::from_min_max(Vec3::splat(-2.0), Vec3::splat(2.0));
    let raycaster = FloorRaycaster::new(8, 1);
    let map = {
        let world = scene.lock();
        raycaster.build_hit_map(&bounds, &*world, &mut StdRng::seed_from_u64(5))
    };
    assert_eq!(map.valid_count(), 64);

    drop(guard);
    let world = scene.lock();
    let empty = raycaster.build_hit_map(&bounds, &*world, &mut StdRng::seed_from_u64(5));
    assert_eq!(empty.hit_count(), 0);
    assert!(select_spawn(&empty, SpawnPolicy::RandomValid, &mut StdRng::seed_from_u64(5)).is_none());
}

#[test]
fn grid_center_policy_picks_the_middle_ray() {
    let mut world = CollisionWorld::default();
    let (positions, indices) = quad(Vec3::splat(-10.0), Vec3::splat(10.0), -3.0);
    world.add_geometry(&positions, &indices, &Transform::default());

    let bounds = FloorBounds::from_min_max(Vec3::splat(-4.0), Vec3::splat(4.0));
    let mut rng = StdRng::seed_from_u64(8);
    let map = FloorRaycaster::new(8, 1).build_hit_map(&bounds, &world, &mut rng);
    let pose = select_spawn(&map, SpawnPolicy::GridCenter, &mut rng).unwrap();

    // Flat index 32 is row 4, column 0.
    assert!((pose.position - Vec3::new(-4.0, -3.0, 0.0)).length() < 1e-4);
}
