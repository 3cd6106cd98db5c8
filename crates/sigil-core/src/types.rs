//! Core spatial types used throughout the Sigil engine
//!
//! Combat happens on the ground plane, so positions and facings are `Vec2`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position and facing of an entity on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub position: Vec2,
    /// Facing direction. Not required to be normalized; see [`Transform2D::forward`].
    pub facing: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            facing: Vec2::X,
        }
    }
}

impl Transform2D {
    /// Create a new transform at the given position, facing +X
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with position and facing
    pub fn new(position: Vec2, facing: Vec2) -> Self {
        Self { position, facing }
    }

    /// Normalized facing direction. Falls back to +X when the facing is degenerate.
    pub fn forward(&self) -> Vec2 {
        let dir = self.facing.normalize_or_zero();
        if dir == Vec2::ZERO {
            Vec2::X
        } else {
            dir
        }
    }

    /// Translate by the given offset
    pub fn translate(&mut self, offset: Vec2) {
        self.position += offset;
    }

    /// Turn to face a target position. No-op when the target is on top of us.
    pub fn face_towards(&mut self, target: Vec2) {
        let dir = (target - self.position).normalize_or_zero();
        if dir != Vec2::ZERO {
            self.facing = dir;
        }
    }

}

/// Unsigned angle in degrees between two directions.
///
/// Returns 0.0 when either direction is degenerate.
pub fn angle_between_deg(a: Vec2, b: Vec2) -> f32 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    if a == Vec2::ZERO || b == Vec2::ZERO {
        return 0.0;
    }
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Project `point` onto the ray starting at `origin` along `direction`.
///
/// Returns `(along, perpendicular)`: the signed distance along the ray and the
/// unsigned distance from the ray's line. `direction` must be non-zero.
pub fn point_segment_distance(origin: Vec2, direction: Vec2, point: Vec2) -> (f32, f32) {
    let dir = direction.normalize_or_zero();
    let offset = point - origin;
    let along = offset.dot(dir);
    let perpendicular = dir.perp_dot(offset).abs();
    (along, perpendicular)
}
