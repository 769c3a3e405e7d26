use bevy::prelude::Vec3;

const LEAF_SIZE: usize = 4;
const HIT_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    fn bounds(&self) -> Aabb {
        Aabb {
            min: self.a.min(self.b).min(self.c),
            max: self.a.max(self.b).max(self.c),
        }
    }

    /// Möller–Trumbore, both faces. Returns the distance along `dir`.
    pub fn intersect(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let p = dir.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < f32::EPSILON * edge1.length() * edge2.length() {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.a;
        let u = s.dot(p) * inv_det;
        if !(-HIT_EPS..=1.0 + HIT_EPS).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = dir.dot(q) * inv_det;
        if v < -HIT_EPS || u + v > 1.0 + HIT_EPS {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t >= 0.0 && t <= max_distance).then_some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Slab test; distance to the entry point, 0 when starting inside.
    fn ray_distance(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;

        for axis in 0..3 {
            let (origin_axis, dir_axis, min_axis, max_axis) =
                (origin[axis], dir[axis], self.min[axis], self.max[axis]);

            if dir_axis.abs() <= f32::EPSILON {
                if origin_axis < min_axis || origin_axis > max_axis {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir_axis;
            let mut t1 = (min_axis - origin_axis) * inv;
            let mut t2 = (max_axis - origin_axis) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Aabb, start: usize, end: usize },
    Branch { bounds: Aabb, left: usize, right: usize },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }
}

/// Static bounding volume hierarchy over a triangle soup.
#[derive(Debug, Clone)]
pub struct TriangleBvh {
    triangles: Vec<Triangle>,
    nodes: Vec<Node>,
}

impl TriangleBvh {
    pub fn build(mut triangles: Vec<Triangle>) -> Self {
        let mut nodes = Vec::new();
        if !triangles.is_empty() {
            let len = triangles.len();
            build_node(&mut triangles, 0, len, &mut nodes);
        }
        Self { triangles, nodes }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|node| *node.bounds())
    }

    /// Nearest hit distance along a normalized `dir`.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<f32> = None;
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let limit = best.unwrap_or(max_distance);
            let Some(entry) = node.bounds().ray_distance(origin, dir, limit) else {
                continue;
            };
            if entry > limit {
                continue;
            }
            match node {
                Node::Leaf { start, end, .. } => {
                    for triangle in &self.triangles[*start..*end] {
                        if let Some(t) = triangle.intersect(origin, dir, best.unwrap_or(max_distance))
                        {
                            best = Some(best.map_or(t, |b| b.min(t)));
                        }
                    }
                }
                Node::Branch { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        best
    }
}

fn build_node(triangles: &mut [Triangle], start: usize, end: usize, nodes: &mut Vec<Node>) -> usize {
    let bounds = triangles[start..end]
        .iter()
        .map(Triangle::bounds)
        .reduce(Aabb::union)
        .unwrap_or(Aabb {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        });

    let index = nodes.len();
    if end - start <= LEAF_SIZE {
        nodes.push(Node::Leaf { bounds, start, end });
        return index;
    }

    // Placeholder until both children exist.
    nodes.push(Node::Leaf { bounds, start, end });

    let extent = bounds.max - bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    triangles[start..end].sort_unstable_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));

    let mid = start + (end - start) / 2;
    let left = build_node(triangles, start, mid, nodes);
    let right = build_node(triangles, mid, end, nodes);
    nodes[index] = Node::Branch {
        bounds,
        left,
        right,
    };
    index
}
