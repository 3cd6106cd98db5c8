//! Combatants: health, team, placement and the statuses riding on them

use glam::Vec2;
use sigil_core::Transform2D;

use crate::status::StatusEffectManager;
use crate::tag::TagId;

/// Health pool plus the visual markers statuses hang on an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub health: f32,
    pub max_health: f32,
    /// Status ids currently shown on the entity, in application order
    pub visual_effects: Vec<TagId>,
}

impl Vitals {
    pub fn new(max_health: f32) -> Self {
        let max_health = max_health.max(0.0);
        Self {
            health: max_health,
            max_health,
            visual_effects: Vec::new(),
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0.0
    }

    /// Health as a fraction of max (0.0 - 1.0)
    pub fn fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            (self.health / self.max_health).clamp(0.0, 1.0)
        }
    }

    /// Remove health. Returns the amount actually lost.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let amount = amount.max(0.0);
        let before = self.health;
        self.health = (self.health - amount).max(0.0);
        before - self.health
    }

    /// Restore health up to max. Returns the amount actually gained.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.is_depleted() {
            return 0.0;
        }
        let amount = amount.max(0.0);
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    pub fn add_visual(&mut self, status: &TagId) {
        if !self.visual_effects.contains(status) {
            self.visual_effects.push(status.clone());
        }
    }

    pub fn remove_visual(&mut self, status: &TagId) {
        self.visual_effects.retain(|v| v != status);
    }
}

/// Anything that can be hit by an effect
#[derive(Debug, Clone)]
pub struct Combatant {
    pub name: String,
    pub team: u32,
    pub transform: Transform2D,
    pub vitals: Vitals,
    pub statuses: StatusEffectManager,
}

impl Combatant {
    pub fn new(name: impl Into<String>, team: u32, position: Vec2, max_health: f32) -> Self {
        Self {
            name: name.into(),
            team,
            transform: Transform2D::from_position(position),
            vitals: Vitals::new(max_health),
            statuses: StatusEffectManager::new(),
        }
    }

    /// Set the initial facing
    pub fn facing(mut self, direction: Vec2) -> Self {
        self.transform.facing = direction.normalize_or_zero();
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.vitals.is_depleted()
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Split borrow for status calls that need both halves
    pub fn statuses_and_vitals(&mut self) -> (&mut StatusEffectManager, &mut Vitals) {
        (&mut self.statuses, &mut self.vitals)
    }
}
