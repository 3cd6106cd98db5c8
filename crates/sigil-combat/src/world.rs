//! Combat world: every combatant in one generational table
//!
//! Iteration follows spawn order so that target ties and status ticks are
//! deterministic.

use sigil_core::{EntityAllocator, EntityId};
use tracing::debug;

use crate::combatant::Combatant;
use crate::status::StatusEvent;
use crate::tag::TagId;

struct Slot {
    id: EntityId,
    spawn_order: u64,
    combatant: Combatant,
}

/// A combatant dying to a periodic status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDeath {
    pub entity: EntityId,
    pub status: TagId,
    /// Whoever applied the lethal status. May already be despawned.
    pub killer: Option<EntityId>,
}

/// Everything that happened during one [`CombatWorld::update`]
#[derive(Debug, Clone, Default)]
pub struct WorldTick {
    pub events: Vec<(EntityId, StatusEvent)>,
    pub deaths: Vec<StatusDeath>,
}

/// The entity table: owns every combatant, keyed by generational handle.
///
/// Iteration is always in spawn order, which is also the final tie-break for
/// target selection.
#[derive(Default)]
pub struct CombatWorld {
    entities: EntityAllocator,
    slots: Vec<Option<Slot>>,
    next_spawn: u64,
}

impl CombatWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Entity management ----

    /// Spawn a combatant and return its handle
    pub fn spawn(&mut self, combatant: Combatant) -> EntityId {
        let id = self.entities.allocate();
        let index = id.index() as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        debug!("Spawned {} as {}", combatant.name, id);
        self.slots[index] = Some(Slot {
            id,
            spawn_order: self.next_spawn,
            combatant,
        });
        self.next_spawn += 1;
        id
    }

    /// Remove a combatant. Handles to it stop resolving.
    pub fn despawn(&mut self, id: EntityId) -> Option<Combatant> {
        if !self.entities.deallocate(id) {
            return None;
        }
        self.slots
            .get_mut(id.index() as usize)
            .and_then(Option::take)
            .map(|slot| slot.combatant)
    }

    fn slot(&self, id: EntityId) -> Option<&Slot> {
        if !self.entities.is_allocated(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    /// Whether the handle still refers to a spawned combatant (alive or not)
    pub fn contains(&self, id: EntityId) -> bool {
        self.slot(id).is_some()
    }

    /// Whether the handle refers to a combatant with health left
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Combatant::is_alive)
    }

    pub fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.slot(id).map(|slot| &slot.combatant)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        if !self.entities.is_allocated(id) {
            return None;
        }
        self.slots
            .get_mut(id.index() as usize)?
            .as_mut()
            .map(|slot| &mut slot.combatant)
    }

    /// Monotonic spawn counter of an entity
    pub fn spawn_order(&self, id: EntityId) -> Option<u64> {
        self.slot(id).map(|slot| slot.spawn_order)
    }

    /// Every spawned handle in spawn order
    pub fn ids(&self) -> Vec<EntityId> {
        let mut slots: Vec<&Slot> = self.slots.iter().flatten().collect();
        slots.sort_by_key(|slot| slot.spawn_order);
        slots.into_iter().map(|slot| slot.id).collect()
    }

    /// Live combatants in spawn order
    pub fn living(&self) -> impl Iterator<Item = (EntityId, &Combatant)> {
        let mut slots: Vec<&Slot> = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.combatant.is_alive())
            .collect();
        slots.sort_by_key(|slot| slot.spawn_order);
        slots.into_iter().map(|slot| (slot.id, &slot.combatant))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ---- Simulation ----

    /// Tick every live combatant's statuses by `dt` seconds.
    ///
    /// A lethal damage-over-time tick is reported as a death credited to the
    /// status source.
    pub fn update(&mut self, dt: f32) -> WorldTick {
        let mut tick = WorldTick::default();
        for id in self.ids() {
            let Some(combatant) = self.get_mut(id) else {
                continue;
            };
            if !combatant.is_alive() {
                continue;
            }
            let (statuses, vitals) = combatant.statuses_and_vitals();
            for event in statuses.update(dt, vitals) {
                if let StatusEvent::DamageTick {
                    status,
                    source,
                    lethal: true,
                    ..
                } = &event
                {
                    debug!("{} killed by {} from {:?}", id, status, source);
                    tick.deaths.push(StatusDeath {
                        entity: id,
                        status: status.clone(),
                        killer: *source,
                    });
                }
                tick.events.push((id, event));
            }
        }
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::registry::TagRegistry;
    use glam::Vec2;

    fn dummy(name: &str, health: f32) -> Combatant {
        Combatant::new(name, 1, Vec2::ZERO, health)
    }

    #[test]
    fn test_spawn_and_get() {
        let mut world = CombatWorld::new();
        let a = world.spawn(dummy("a", 10.0));
        let b = world.spawn(dummy("b", 20.0));
        assert_eq!(world.len(), 2);
        assert_eq!(world.get(b).unwrap().vitals.max_health, 20.0);
        assert_eq!(world.ids(), vec![a, b]);
    }

    #[test]
    fn test_stale_handle_after_despawn() {
        let mut world = CombatWorld::new();
        let a = world.spawn(dummy("a", 10.0));
        assert!(world.despawn(a).is_some());
        let b = world.spawn(dummy("b", 10.0));
        assert_eq!(a.index(), b.index());
        assert!(world.get(a).is_none());
        assert!(world.despawn(a).is_none());
        assert!(world.contains(b));
    }

    #[test]
    fn test_spawn_order_survives_slot_reuse() {
        let mut world = CombatWorld::new();
        let a = world.spawn(dummy("a", 10.0));
        let b = world.spawn(dummy("b", 10.0));
        world.despawn(a);
        let c = world.spawn(dummy("c", 10.0));
        assert_eq!(world.ids(), vec![b, c]);
    }

    #[test]
    fn test_update_reports_dot_kill() {
        let registry = TagRegistry::builtin();
        let mut world = CombatWorld::new();
        let caster = world.spawn(dummy("caster", 100.0));
        let victim = world.spawn(dummy("victim", 10.0));

        let combatant = world.get_mut(victim).unwrap();
        let (statuses, vitals) = combatant.statuses_and_vitals();
        statuses
            .apply(&registry, "burn", &Params::new(), Some(caster), vitals)
            .unwrap();

        assert!(world.update(1.0).deaths.is_empty());
        let tick = world.update(1.0);
        assert_eq!(
            tick.deaths,
            vec![StatusDeath {
                entity: victim,
                status: TagId::from("burn"),
                killer: Some(caster),
            }]
        );
        assert!(!world.is_alive(victim));

        // Dead combatants stop ticking
        assert!(world.update(1.0).events.is_empty());
    }

    #[test]
    fn test_living_skips_dead() {
        let mut world = CombatWorld::new();
        let a = world.spawn(dummy("a", 10.0));
        let b = world.spawn(dummy("b", 10.0));
        world.get_mut(a).unwrap().vitals.take_damage(10.0);
        let living: Vec<EntityId> = world.living().map(|(id, _)| id).collect();
        assert_eq!(living, vec![b]);
    }
}
