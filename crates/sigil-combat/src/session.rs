//! Combat session: one registry, one world, one executor, one trigger layer
//!
//! The combat loop talks to this instead of wiring the pieces together
//! itself. [`CombatSession::perform`] resolves a request and runs the trigger
//! cascade it causes; [`CombatSession::update`] advances statuses and
//! proximity triggers by one frame.

use std::sync::Arc;

use sigil_core::EntityId;
use tracing::{debug, info};

use crate::combatant::Combatant;
use crate::config::CombatConfig;
use crate::error::{Diagnostic, StatusError};
use crate::executor::{EffectExecutor, EffectRequest, ResolutionReport};
use crate::params::Params;
use crate::registry::TagRegistry;
use crate::status::ApplyReport;
use crate::tag::TriggerKind;
use crate::trigger::{EquippedSource, OwnerRef, TriggerEvent, TriggerLayer, TriggerPass};
use crate::world::{CombatWorld, WorldTick};

/// Result of [`CombatSession::perform`]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub report: ResolutionReport,
    /// Reactions the request set off
    pub triggered: TriggerPass,
}

/// Result of [`CombatSession::update`]
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    pub tick: WorldTick,
    pub triggered: TriggerPass,
}

pub struct CombatSession {
    registry: Arc<TagRegistry>,
    world: CombatWorld,
    executor: EffectExecutor,
    triggers: TriggerLayer,
}

impl CombatSession {
    pub fn new(registry: Arc<TagRegistry>, config: CombatConfig) -> Self {
        let triggers = TriggerLayer::new(config.max_trigger_depth, config.proximity_range);
        info!(
            "Combat session started with {} tags (seed {:#x})",
            registry.len(),
            config.rng_seed
        );
        Self {
            executor: EffectExecutor::new(Arc::clone(&registry), config),
            registry,
            world: CombatWorld::new(),
            triggers,
        }
    }

    /// Session over the built-in tag set with default tuning
    pub fn with_builtin() -> Self {
        Self::new(Arc::new(TagRegistry::builtin()), CombatConfig::default())
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CombatConfig {
        self.executor.config()
    }

    pub fn world(&self) -> &CombatWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut CombatWorld {
        &mut self.world
    }

    pub fn triggers(&self) -> &TriggerLayer {
        &self.triggers
    }

    pub fn spawn(&mut self, combatant: Combatant) -> EntityId {
        self.world.spawn(combatant)
    }

    /// Remove a combatant and everything bound to it
    pub fn despawn(&mut self, id: EntityId) -> Option<Combatant> {
        self.triggers.remove_actor(id);
        self.world.despawn(id)
    }

    pub fn equip(&mut self, actor: EntityId, source: &EquippedSource) -> Vec<Diagnostic> {
        self.triggers.equip(&self.registry, actor, source)
    }

    pub fn unequip(&mut self, actor: EntityId, owner: OwnerRef) -> usize {
        self.triggers.unequip(actor, owner)
    }

    /// Resolve a request, then let kills and crits fire their reactions
    pub fn perform(&mut self, request: &EffectRequest) -> ActionOutcome {
        let report = self.executor.resolve(&mut self.world, request);
        let triggered = self
            .triggers
            .dispatch(&mut self.executor, &mut self.world, &report);
        ActionOutcome { report, triggered }
    }

    /// Fire reactions for an event raised outside the engine
    pub fn raise(&mut self, event: TriggerEvent) -> TriggerPass {
        self.triggers
            .on_event(&mut self.executor, &mut self.world, event)
    }

    /// Apply a status directly, outside any request
    pub fn apply_status(
        &mut self,
        target: EntityId,
        status: &str,
        overrides: &Params,
        source: Option<EntityId>,
    ) -> Result<ApplyReport, StatusError> {
        let combatant = self
            .world
            .get_mut(target)
            .ok_or(StatusError::NoSuchEntity(target))?;
        let (statuses, vitals) = combatant.statuses_and_vitals();
        statuses.apply(&self.registry, status, overrides, source, vitals)
    }

    /// Advance one frame: status ticks, kill credit for lethal ticks, then
    /// proximity reactions.
    pub fn update(&mut self, dt: f32) -> FrameOutcome {
        let tick = self.world.update(dt);
        let mut triggered = TriggerPass::default();

        for death in &tick.deaths {
            let Some(killer) = death.killer else {
                continue;
            };
            debug!("{} credited with {} via {}", killer, death.entity, death.status);
            triggered.extend(self.triggers.on_event(
                &mut self.executor,
                &mut self.world,
                TriggerEvent::new(TriggerKind::OnKill, killer, Some(death.entity)),
            ));
        }
        triggered.extend(
            self.triggers
                .tick(&mut self.executor, &mut self.world, dt),
        );

        FrameOutcome { tick, triggered }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TargetSpec;
    use crate::trigger::{ItemId, TriggerAim, TriggerSpec};
    use glam::Vec2;

    #[test]
    fn test_dot_kill_credits_source() {
        let mut session = CombatSession::with_builtin();
        let hero = session.spawn(Combatant::new("hero", 0, Vec2::ZERO, 100.0));
        let foe = session.spawn(Combatant::new("foe", 1, Vec2::X, 8.0));
        session.equip(
            hero,
            &EquippedSource {
                owner: OwnerRef::Item(ItemId(1)),
                tags: ["on_kill"].into_iter().collect(),
                triggers: vec![TriggerSpec::new(
                    TriggerKind::OnKill,
                    ["heal_on_kill"],
                    TriggerAim::Actor,
                )],
            },
        );
        session.world_mut().get_mut(hero).unwrap().vitals.take_damage(20.0);
        session
            .apply_status(foe, "burn", &Params::new(), Some(hero))
            .unwrap();

        let frame = session.update(1.0);
        assert_eq!(frame.tick.deaths.len(), 1);
        assert_eq!(frame.triggered.fired.len(), 1);
        assert_eq!(session.world().get(hero).unwrap().vitals.health, 95.0);
    }

    #[test]
    fn test_despawned_source_keeps_status_running() {
        let mut session = CombatSession::with_builtin();
        let caster = session.spawn(Combatant::new("caster", 0, Vec2::ZERO, 100.0));
        let foe = session.spawn(Combatant::new("foe", 1, Vec2::X, 100.0));
        session.perform(
            &EffectRequest::new(caster, TargetSpec::Entity(foe)).with_tags(["poison"]),
        );
        session.despawn(caster);

        let frame = session.update(1.0);
        assert!(frame.tick.deaths.is_empty());
        assert_eq!(session.world().get(foe).unwrap().vitals.health, 96.0);
    }

    #[test]
    fn test_apply_status_unknown_entity() {
        let mut session = CombatSession::with_builtin();
        let ghost = EntityId::from_raw(9, 0);
        assert_eq!(
            session.apply_status(ghost, "burn", &Params::new(), None),
            Err(StatusError::NoSuchEntity(ghost))
        );
    }
}
