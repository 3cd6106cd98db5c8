//! Status effects and the per-entity status manager
//!
//! Handles stacking, mutual exclusion, periodic ticks (damage and healing over
//! time), crowd control queries, and shields.

use sigil_core::EntityId;
use tracing::debug;

use crate::combatant::Vitals;
use crate::error::StatusError;
use crate::params::Params;
use crate::registry::TagRegistry;
use crate::tag::{StackingRule, StatusKind, TagId};

/// Duration used when a status tag declares none
pub const DEFAULT_DURATION: f32 = 3.0;
/// Tick interval used when a periodic status declares none
pub const DEFAULT_TICK_INTERVAL: f32 = 1.0;
/// Shortest tick interval a periodic status may use
pub const MIN_TICK_INTERVAL: f32 = 0.05;
/// Slack for float accumulation in tick timers
const TICK_EPSILON: f32 = 1e-4;

/// An active status effect on one entity
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffectInstance {
    pub status_id: TagId,
    pub kind: StatusKind,
    pub stacking: StackingRule,
    pub stacks: u32,
    pub max_stacks: u32,
    /// Full duration in seconds
    pub duration: f32,
    pub time_remaining: f32,
    /// Time between ticks (periodic statuses only)
    pub tick_interval: f32,
    /// Time accumulated towards the next tick
    pub tick_timer: f32,
    /// Who applied it. Attribution only; may refer to a despawned entity.
    pub source: Option<EntityId>,
    /// Parameters resolved at application time
    pub params: Params,
    pub conflict_priority: i32,
    /// Remaining absorb (Shield only)
    pub shield_remaining: f32,
}

impl StatusEffectInstance {
    fn new(
        status_id: TagId,
        kind: StatusKind,
        stacking: StackingRule,
        conflict_priority: i32,
        params: Params,
        source: Option<EntityId>,
    ) -> Self {
        let duration = params.get_or("duration", DEFAULT_DURATION).max(0.0);
        let tick_interval = params.get_or("tick_interval", DEFAULT_TICK_INTERVAL);
        let tick_interval = if tick_interval > 0.0 {
            tick_interval.max(MIN_TICK_INTERVAL)
        } else {
            DEFAULT_TICK_INTERVAL
        };
        let max_stacks = params.get_or("max_stacks", 1.0).max(1.0) as u32;

        Self {
            status_id,
            kind,
            stacking,
            stacks: 1,
            max_stacks,
            duration,
            time_remaining: duration,
            tick_interval,
            tick_timer: 0.0,
            source,
            params,
            conflict_priority,
            shield_remaining: 0.0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.time_remaining <= 0.0
    }

    pub fn is_debuff(&self) -> bool {
        self.kind.is_debuff()
    }

    /// Health change of one tick: `per_second * tick_interval * stacks`
    pub fn tick_amount(&self) -> f32 {
        let per_second = match self.kind {
            StatusKind::DamageOverTime => self.params.get_or("damage_per_second", 0.0),
            StatusKind::HealOverTime => self.params.get_or("heal_per_second", 0.0),
            _ => 0.0,
        };
        per_second * self.tick_interval * self.stacks as f32
    }

    /// Movement speed modifier (1.0 = normal)
    pub fn speed_modifier(&self) -> f32 {
        match self.kind {
            StatusKind::Freeze | StatusKind::Root | StatusKind::Stun => 0.0,
            StatusKind::Slow => (1.0 - self.params.get_or("slow_amount", 0.3)).max(0.0),
            StatusKind::Haste => 1.0 + self.params.get_or("haste_amount", 0.3),
            _ => 1.0,
        }
    }

    /// Outgoing damage modifier
    pub fn damage_dealt_modifier(&self) -> f32 {
        match self.kind {
            StatusKind::Weaken | StatusKind::Empower => {
                (1.0 + self.params.get_or("damage_dealt_bonus", 0.0)).max(0.0)
            }
            _ => 1.0,
        }
    }

    /// Incoming damage modifier
    pub fn damage_taken_modifier(&self) -> f32 {
        match self.kind {
            StatusKind::Vulnerable => (1.0 + self.params.get_or("damage_taken_bonus", 0.25)).max(0.0),
            _ => 1.0,
        }
    }

    fn on_apply(&mut self, vitals: &mut Vitals) {
        if self.kind == StatusKind::Shield {
            self.shield_remaining = self.params.get_or("shield_amount", 0.0).max(0.0);
        }
        vitals.add_visual(&self.status_id);
    }

    fn on_tick(&mut self, vitals: &mut Vitals) -> Option<StatusEvent> {
        let amount = self.tick_amount();
        match self.kind {
            StatusKind::DamageOverTime => {
                let was_alive = !vitals.is_depleted();
                let dealt = vitals.take_damage(amount);
                Some(StatusEvent::DamageTick {
                    status: self.status_id.clone(),
                    amount: dealt,
                    source: self.source,
                    lethal: was_alive && vitals.is_depleted(),
                })
            }
            StatusKind::HealOverTime => {
                let healed = vitals.heal(amount);
                Some(StatusEvent::HealTick {
                    status: self.status_id.clone(),
                    amount: healed,
                    source: self.source,
                })
            }
            _ => None,
        }
    }

    fn on_remove(&mut self, vitals: &mut Vitals) {
        vitals.remove_visual(&self.status_id);
    }
}

/// What happened to an application request
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// No instance existed; a new one was created
    Created,
    /// Additive reapplication
    Stacked { stacks: u32 },
    /// RefreshOnly reapplication
    Refreshed,
    /// Replace reapplication
    Replaced,
    /// A higher-priority conflicting status is active
    Blocked { by: TagId },
}

/// Result of [`StatusEffectManager::apply`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub status: TagId,
    pub outcome: ApplyOutcome,
    /// Conflicting statuses removed to make room
    pub evicted: Vec<TagId>,
}

impl ApplyReport {
    /// Whether the status is active after the call
    pub fn applied(&self) -> bool {
        !matches!(self.outcome, ApplyOutcome::Blocked { .. })
    }
}

/// Things that happen during [`StatusEffectManager::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    DamageTick {
        status: TagId,
        amount: f32,
        source: Option<EntityId>,
        lethal: bool,
    },
    HealTick {
        status: TagId,
        amount: f32,
        source: Option<EntityId>,
    },
    Expired {
        status: TagId,
    },
}

/// Manages all active status effects on an entity.
///
/// At most one instance exists per status id.
#[derive(Debug, Clone, Default)]
pub struct StatusEffectManager {
    effects: Vec<StatusEffectInstance>,
}

impl StatusEffectManager {
    /// Create a new empty status manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status by id.
    ///
    /// Unknown ids and non-status tags are rejected without side effects.
    pub fn apply(
        &mut self,
        registry: &TagRegistry,
        status: &str,
        overrides: &Params,
        source: Option<EntityId>,
        vitals: &mut Vitals,
    ) -> Result<ApplyReport, StatusError> {
        let Some(def) = registry.get(status) else {
            return Err(StatusError::UnknownStatus(TagId::from(status)));
        };
        let Some(kind) = def.status_kind() else {
            return Err(StatusError::NotAStatus(def.id.clone()));
        };
        let params = Params::resolve_for_tag(&def.default_params, status, overrides);

        let mut replaced = false;
        if let Some(index) = self.effects.iter().position(|e| e.status_id.as_str() == status) {
            match def.stacking {
                StackingRule::Additive => {
                    let existing = &mut self.effects[index];
                    existing.stacks = (existing.stacks + 1).min(existing.max_stacks);
                    existing.time_remaining = existing.duration;
                    debug!("{} stacked to {}", status, existing.stacks);
                    return Ok(ApplyReport {
                        status: def.id.clone(),
                        outcome: ApplyOutcome::Stacked {
                            stacks: existing.stacks,
                        },
                        evicted: Vec::new(),
                    });
                }
                StackingRule::RefreshOnly => {
                    let existing = &mut self.effects[index];
                    existing.time_remaining = existing.duration;
                    debug!("{} refreshed", status);
                    return Ok(ApplyReport {
                        status: def.id.clone(),
                        outcome: ApplyOutcome::Refreshed,
                        evicted: Vec::new(),
                    });
                }
                StackingRule::Replace => {
                    self.remove(status, vitals);
                    replaced = true;
                }
            }
        }

        // Mutual exclusion
        let conflicting: Vec<&StatusEffectInstance> = self
            .effects
            .iter()
            .filter(|e| registry.conflicts(status, e.status_id.as_str()))
            .collect();
        if let Some(blocker) = conflicting
            .iter()
            .filter(|e| e.conflict_priority > def.conflict_priority)
            .max_by_key(|e| e.conflict_priority)
        {
            debug!("{} blocked by {}", status, blocker.status_id);
            return Ok(ApplyReport {
                status: def.id.clone(),
                outcome: ApplyOutcome::Blocked {
                    by: blocker.status_id.clone(),
                },
                evicted: Vec::new(),
            });
        }
        let evicted: Vec<TagId> = conflicting.iter().map(|e| e.status_id.clone()).collect();
        for id in &evicted {
            debug!("{} evicts {}", status, id);
            self.remove(id.as_str(), vitals);
        }

        let mut instance = StatusEffectInstance::new(
            def.id.clone(),
            kind,
            def.stacking,
            def.conflict_priority,
            params,
            source,
        );
        instance.on_apply(vitals);
        self.effects.push(instance);
        debug!("{} applied", status);

        Ok(ApplyReport {
            status: def.id.clone(),
            outcome: if replaced {
                ApplyOutcome::Replaced
            } else {
                ApplyOutcome::Created
            },
            evicted,
        })
    }

    /// Advance every effect by `dt` seconds, then drop expired ones.
    ///
    /// Only the part of `dt` an effect was actually alive for counts towards
    /// its ticks, and a partial interval left when it runs out fires one last
    /// tick, so an effect always ticks `ceil(duration / tick_interval)` times.
    pub fn update(&mut self, dt: f32, vitals: &mut Vitals) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        if dt <= 0.0 {
            return events;
        }

        for effect in &mut self.effects {
            let active = dt.min(effect.time_remaining.max(0.0));
            effect.time_remaining -= dt;

            if !effect.kind.is_periodic() {
                continue;
            }
            effect.tick_timer += active;
            let due = ((effect.tick_timer + TICK_EPSILON) / effect.tick_interval).floor() as u32;
            effect.tick_timer -= due as f32 * effect.tick_interval;
            for _ in 0..due {
                events.extend(effect.on_tick(vitals));
            }
            if effect.is_expired() && effect.tick_timer > TICK_EPSILON {
                effect.tick_timer = 0.0;
                events.extend(effect.on_tick(vitals));
            }
        }

        let mut i = 0;
        while i < self.effects.len() {
            if self.effects[i].is_expired() {
                let mut effect = self.effects.remove(i);
                effect.on_remove(vitals);
                debug!("{} expired", effect.status_id);
                events.push(StatusEvent::Expired {
                    status: effect.status_id,
                });
            } else {
                i += 1;
            }
        }

        events
    }

    /// Remove one status. Returns `true` if it was active.
    pub fn remove(&mut self, status: &str, vitals: &mut Vitals) -> bool {
        let Some(index) = self.effects.iter().position(|e| e.status_id.as_str() == status) else {
            return false;
        };
        let mut effect = self.effects.remove(index);
        effect.on_remove(vitals);
        true
    }

    /// Remove every debuff. Returns the removed ids.
    pub fn clear_debuffs(&mut self, vitals: &mut Vitals) -> Vec<TagId> {
        self.clear_where(vitals, |e| e.is_debuff())
    }

    /// Remove every status. Returns the removed ids.
    pub fn clear_all(&mut self, vitals: &mut Vitals) -> Vec<TagId> {
        self.clear_where(vitals, |_| true)
    }

    fn clear_where(
        &mut self,
        vitals: &mut Vitals,
        predicate: impl Fn(&StatusEffectInstance) -> bool,
    ) -> Vec<TagId> {
        let mut cleared = Vec::new();
        let mut i = 0;
        while i < self.effects.len() {
            if predicate(&self.effects[i]) {
                let mut effect = self.effects.remove(i);
                effect.on_remove(vitals);
                cleared.push(effect.status_id);
            } else {
                i += 1;
            }
        }
        cleared
    }

    /// Absorb damage through shields. Returns remaining damage after shields.
    ///
    /// A broken shield is left at zero duration and drops on the next update.
    pub fn absorb_damage(&mut self, damage: f32) -> f32 {
        let mut remaining = damage;
        for effect in &mut self.effects {
            if effect.kind != StatusKind::Shield || effect.shield_remaining <= 0.0 {
                continue;
            }
            if remaining <= effect.shield_remaining {
                effect.shield_remaining -= remaining;
                return 0.0;
            }
            remaining -= effect.shield_remaining;
            effect.shield_remaining = 0.0;
            effect.time_remaining = 0.0;
        }
        remaining
    }

    /// Check if a specific status is active
    pub fn has_status(&self, status: &str) -> bool {
        self.effects.iter().any(|e| e.status_id.as_str() == status)
    }

    pub fn get(&self, status: &str) -> Option<&StatusEffectInstance> {
        self.effects.iter().find(|e| e.status_id.as_str() == status)
    }

    /// Active effects in application order
    pub fn active_effects(&self) -> &[StatusEffectInstance] {
        &self.effects
    }

    /// Number of active effects
    pub fn count(&self) -> usize {
        self.effects.len()
    }

    /// Whether any active effect prevents movement
    pub fn is_immobilized(&self) -> bool {
        self.effects.iter().any(|e| e.kind.prevents_movement())
    }

    /// Whether any active effect prevents skill usage
    pub fn is_silenced(&self) -> bool {
        self.effects.iter().any(|e| e.kind.prevents_skills())
    }

    /// Whether the entity may attack
    pub fn can_act(&self) -> bool {
        !self.effects.iter().any(|e| e.kind.prevents_attacks())
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.effects.iter().map(|e| e.speed_modifier()).product()
    }

    pub fn damage_dealt_multiplier(&self) -> f32 {
        self.effects.iter().map(|e| e.damage_dealt_modifier()).product()
    }

    pub fn damage_taken_multiplier(&self) -> f32 {
        self.effects.iter().map(|e| e.damage_taken_modifier()).product()
    }
}
