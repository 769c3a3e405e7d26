use std::collections::VecDeque;

use bevy::prelude::{Quat, Resource, Vec3};
use tracing::{debug, info};

use crate::floor::SpawnPose;

/// A placement request handed out by [`SpawnManager::spawn`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnTicket {
    pub id: u64,
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Default, Resource)]
pub struct SpawnManager {
    spawn_point: Option<SpawnPose>,
    next_ticket: u64,
    pending: VecDeque<SpawnTicket>,
    completed: u64,
}

impl SpawnManager {
    pub fn set_spawn_point(&mut self, position: Vec3, orientation: Quat) {
        info!(?position, "spawn point set");
        self.spawn_point = Some(SpawnPose {
            position,
            orientation,
        });
    }

    pub fn clear_spawn_point(&mut self) {
        self.spawn_point = None;
    }

    pub fn spawn_point(&self) -> Option<SpawnPose> {
        self.spawn_point
    }

    /// Queues a placement at the current spawn point, or the origin.
    pub fn spawn(&mut self) -> SpawnTicket {
        let pose = self.spawn_point.unwrap_or(SpawnPose {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        });
        let ticket = SpawnTicket {
            id: self.next_ticket,
            position: pose.position,
            orientation: pose.orientation,
        };
        self.next_ticket += 1;
        self.pending.push_back(ticket);
        debug!(id = ticket.id, "spawn requested");
        ticket
    }

    /// Oldest placement not yet applied.
    pub fn take_pending(&mut self) -> Option<SpawnTicket> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn complete(&mut self, ticket: SpawnTicket) {
        self.completed = self.completed.max(ticket.id + 1);
    }

    pub fn is_complete(&self, ticket: &SpawnTicket) -> bool {
        ticket.id < self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_without_point_uses_origin() {
        let mut manager = SpawnManager::default();
        let ticket = manager.spawn();
        assert_eq!(ticket.position, Vec3::ZERO);
        assert_eq!(ticket.orientation, Quat::IDENTITY);
    }

    #[test]
    fn tickets_follow_the_latest_spawn_point() {
        let mut manager = SpawnManager::default();
        let yaw = Quat::from_rotation_y(1.0);
        manager.set_spawn_point(Vec3::new(1.0, -5.0, 2.0), yaw);
        let first = manager.spawn();
        manager.set_spawn_point(Vec3::new(3.0, -4.0, 0.0), Quat::IDENTITY);
        let second = manager.spawn();

        assert_eq!(first.position, Vec3::new(1.0, -5.0, 2.0));
        assert_eq!(first.orientation, yaw);
        assert_eq!(second.position, Vec3::new(3.0, -4.0, 0.0));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn pending_tickets_drain_in_order() {
        let mut manager = SpawnManager::default();
        let a = manager.spawn();
        let b = manager.spawn();
        assert!(manager.has_pending());
        assert_eq!(manager.take_pending(), Some(a));
        manager.complete(a);
        assert!(manager.is_complete(&a));
        assert!(!manager.is_complete(&b));
        assert_eq!(manager.take_pending(), Some(b));
        assert_eq!(manager.take_pending(), None);
    }
}
