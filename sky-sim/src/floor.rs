use std::f32::consts::TAU;

use bevy::prelude::{Quat, Vec3};
use rand::Rng;
use rand::seq::SliceRandom;
use sky_utils::{SkyboxSettings, SpawnPolicy};
use tracing::debug;

use crate::collision::{RaycastBatch, Raycaster, down_orientation};

/// Horizontal footprint of the mesh the grid is laid over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorBounds {
    pub min: Vec3,
    pub size: Vec3,
}

impl FloorBounds {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            min,
            size: max - min,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self::from_min_max(min, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitMapCell {
    Miss,
    /// Hit, but some neighbour within the radius missed.
    Hit(Vec3),
    Valid { point: Vec3, orientation: Quat },
}

impl HitMapCell {
    pub fn point(&self) -> Option<Vec3> {
        match *self {
            HitMapCell::Miss => None,
            HitMapCell::Hit(point) | HitMapCell::Valid { point, .. } => Some(point),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, HitMapCell::Valid { .. })
    }
}

/// Row-major `resolution × resolution` grid of downward raycast results.
#[derive(Debug, Clone)]
pub struct HitMap {
    resolution: usize,
    cells: Vec<HitMapCell>,
    valid: Vec<usize>,
}

impl HitMap {
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cells(&self) -> &[HitMapCell] {
        &self.cells
    }

    /// `x` is the column, `y` the row.
    pub fn cell(&self, x: usize, y: usize) -> Option<&HitMapCell> {
        if x >= self.resolution || y >= self.resolution {
            return None;
        }
        self.cells.get(y * self.resolution + x)
    }

    pub fn valid_indices(&self) -> &[usize] {
        &self.valid
    }

    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }

    pub fn hit_count(&self) -> usize {
        self.cells.iter().filter(|c| c.point().is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPose {
    pub position: Vec3,
    /// Rotation about +Y only.
    pub orientation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorRaycaster {
    pub resolution: usize,
    pub radius: usize,
}

impl Default for FloorRaycaster {
    fn default() -> Self {
        Self {
            resolution: 128,
            radius: 5,
        }
    }
}

impl FloorRaycaster {
    pub fn new(resolution: usize, radius: usize) -> Self {
        Self {
            resolution: resolution.max(1),
            radius,
        }
    }

    pub fn from_settings(settings: &SkyboxSettings) -> Self {
        Self::new(settings.raycast_resolution, settings.floor_radius)
    }

    /// Ray origins at `y = 0` over the bounds, all pointing down.
    pub fn ray_grid(&self, bounds: &FloorBounds) -> (Vec<Vec3>, Vec<Quat>) {
        let r = self.resolution;
        let mut origins = Vec::with_capacity(r * r);
        for h in 0..r {
            for w in 0..r {
                let mut p = bounds.min
                    + Vec3::new(
                        w as f32 / r as f32 * bounds.size.x,
                        0.0,
                        h as f32 / r as f32 * bounds.size.z,
                    );
                p.y = 0.0;
                origins.push(p);
            }
        }
        let orientations = vec![down_orientation(); origins.len()];
        (origins, orientations)
    }

    /// Casts the whole grid as one batch and classifies the result.
    pub fn build_hit_map<C, R>(&self, bounds: &FloorBounds, raycaster: &C, rng: &mut R) -> HitMap
    where
        C: Raycaster + ?Sized,
        R: Rng + ?Sized,
    {
        let (origins, orientations) = self.ray_grid(bounds);
        let batch = raycaster.raycast_array(&origins, &orientations);
        self.classify(&batch, rng)
    }

    pub fn classify<R: Rng + ?Sized>(&self, batch: &RaycastBatch, rng: &mut R) -> HitMap {
        let r = self.resolution;
        assert_eq!(batch.len(), r * r, "raycast batch does not match the grid");

        let mut cells = Vec::with_capacity(r * r);
        let mut valid = Vec::new();
        for i in 0..r * r {
            let Some(point) = batch.point(i) else {
                cells.push(HitMapCell::Miss);
                continue;
            };
            let (x, y) = (i % r, i / r);
            if neighbourhood_hit(&batch.hit, r, x, y, self.radius) {
                let orientation = Quat::from_rotation_y(TAU * rng.r#gen::<f32>());
                valid.push(i);
                cells.push(HitMapCell::Valid { point, orientation });
            } else {
                cells.push(HitMapCell::Hit(point));
            }
        }

        debug!(
            resolution = r,
            hits = batch.hit.iter().filter(|h| **h).count(),
            valid = valid.len(),
            "hit map classified"
        );

        HitMap {
            resolution: r,
            cells,
            valid,
        }
    }
}

/// True when every in-grid cell within Chebyshev `radius` of `(x, y)` hit.
pub fn neighbourhood_hit(hits: &[bool], resolution: usize, x: usize, y: usize, radius: usize) -> bool {
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = (x + radius).min(resolution - 1);
    let y1 = (y + radius).min(resolution - 1);
    (y0..=y1).all(|ny| (x0..=x1).all(|nx| hits[ny * resolution + nx]))
}

pub fn select_spawn<R: Rng + ?Sized>(
    hit_map: &HitMap,
    policy: SpawnPolicy,
    rng: &mut R,
) -> Option<SpawnPose> {
    match policy {
        SpawnPolicy::RandomValid => {
            let index = *hit_map.valid.choose(rng)?;
            match hit_map.cells[index] {
                HitMapCell::Valid { point, orientation } => Some(SpawnPose {
                    position: point,
                    orientation,
                }),
                _ => None,
            }
        }
        SpawnPolicy::GridCenter => {
            let center = hit_map.cells.len() / 2;
            let cell = hit_map.cells.get(center)?;
            let orientation = match *cell {
                HitMapCell::Valid { orientation, .. } => orientation,
                _ => Quat::IDENTITY,
            };
            cell.point().map(|position| SpawnPose {
                position,
                orientation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const R: usize = 128;

    fn batch_from(hits: &[bool]) -> RaycastBatch {
        let mut batch = RaycastBatch::with_capacity(hits.len());
        for (i, hit) in hits.iter().enumerate() {
            let x = (i % R) as f32;
            let z = (i / R) as f32;
            batch.push(hit.then_some(Vec3::new(x, -1.0, z)));
        }
        batch
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn isolated_hit_is_not_valid() {
        let mut hits = vec![false; R * R];
        hits[64 * R + 64] = true;
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&hits), &mut rng());
        assert_eq!(map.hit_count(), 1);
        assert_eq!(map.valid_count(), 0);
        assert_eq!(map.cell(64, 64), Some(&HitMapCell::Hit(Vec3::new(64.0, -1.0, 64.0))));
    }

    #[test]
    fn all_hit_grid_is_valid_everywhere() {
        let hits = vec![true; R * R];
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&hits), &mut rng());
        for y in 5..=122 {
            for x in 5..=122 {
                assert!(map.cell(x, y).unwrap().is_valid(), "({x}, {y})");
            }
        }
        // Windows are clipped at the edges, so the border is valid too.
        assert_eq!(map.valid_count(), R * R);
    }

    #[test]
    fn hole_invalidates_its_neighbourhood_only() {
        let mut hits = vec![true; R * R];
        hits[40 * R + 40] = false;
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&hits), &mut rng());
        assert_eq!(map.cell(40, 40), Some(&HitMapCell::Miss));
        assert!(!map.cell(45, 35).unwrap().is_valid());
        assert!(!map.cell(35, 45).unwrap().is_valid());
        assert!(map.cell(46, 40).unwrap().is_valid());
        assert!(map.cell(40, 34).unwrap().is_valid());
        assert_eq!(map.valid_count(), R * R - 11 * 11);
    }

    #[test]
    fn valid_orientations_are_yaw_only() {
        let hits = vec![true; 16 * 16];
        let mut batch = RaycastBatch::with_capacity(hits.len());
        for _ in &hits {
            batch.push(Some(Vec3::ZERO));
        }
        let map = FloorRaycaster::new(16, 2).classify(&batch, &mut rng());
        for cell in map.cells() {
            let HitMapCell::Valid { orientation, .. } = cell else {
                panic!("expected a valid cell");
            };
            let up = *orientation * Vec3::Y;
            assert!((up - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn same_seed_same_hit_map() {
        let hits = vec![true; R * R];
        let batch = batch_from(&hits);
        let raycaster = FloorRaycaster::new(R, 5);
        let a = raycaster.classify(&batch, &mut StdRng::seed_from_u64(9));
        let b = raycaster.classify(&batch, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn empty_valid_set_yields_no_spawn() {
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&vec![false; R * R]), &mut rng());
        assert_eq!(select_spawn(&map, SpawnPolicy::RandomValid, &mut rng()), None);
        assert_eq!(select_spawn(&map, SpawnPolicy::GridCenter, &mut rng()), None);
    }

    #[test]
    fn random_spawn_comes_from_a_valid_cell() {
        let mut hits = vec![false; R * R];
        for y in 20..60 {
            for x in 70..110 {
                hits[y * R + x] = true;
            }
        }
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&hits), &mut rng());
        assert!(map.valid_count() > 0);
        let mut rng = rng();
        for _ in 0..32 {
            let pose = select_spawn(&map, SpawnPolicy::RandomValid, &mut rng).unwrap();
            let (x, y) = (pose.position.x as usize, pose.position.z as usize);
            assert!((75..105).contains(&x) && (25..55).contains(&y));
            assert!(map.cell(x, y).unwrap().is_valid());
        }
    }

    #[test]
    fn grid_center_uses_the_middle_hit_even_if_invalid() {
        let mut hits = vec![false; R * R];
        hits[R * R / 2] = true;
        let map = FloorRaycaster::new(R, 5).classify(&batch_from(&hits), &mut rng());
        let pose = select_spawn(&map, SpawnPolicy::GridCenter, &mut rng()).unwrap();
        assert_eq!(pose.position, Vec3::new(0.0, -1.0, 64.0));
        assert_eq!(pose.orientation, Quat::IDENTITY);
    }

    #[test]
    fn ray_grid_spans_the_bounds_at_zero_height() {
        let bounds = FloorBounds::from_min_max(Vec3::new(-4.0, -2.0, -8.0), Vec3::new(4.0, 3.0, 8.0));
        let (origins, orientations) = FloorRaycaster::new(4, 1).ray_grid(&bounds);
        assert_eq!(origins.len(), 16);
        assert_eq!(orientations.len(), 16);
        assert_eq!(origins[0], Vec3::new(-4.0, 0.0, -8.0));
        assert_eq!(origins[1], Vec3::new(-2.0, 0.0, -8.0));
        assert_eq!(origins[4], Vec3::new(-4.0, 0.0, -4.0));
        assert_eq!(origins[15], Vec3::new(2.0, 0.0, 4.0));
    }
}
