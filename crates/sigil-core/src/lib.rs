//! Sigil Core - Core types and utilities for the Sigil combat engine
//!
//! This crate provides the foundational types used throughout the engine:
//! - Mathematical primitives (re-exported from glam)
//! - Ground-plane transform and distance/angle helpers
//! - Generational entity handles
//! - Fixed-timestep game clock

pub mod entity;
pub mod time;
pub mod types;

pub use entity::{EntityAllocator, EntityId};
pub use glam::Vec2;
pub use time::{GameTime, TimeConfig, TimeError};
pub use types::{angle_between_deg, point_segment_distance, Transform2D};
