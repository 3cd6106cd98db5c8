//! Trigger bindings
//!
//! Equipped items and skills that carry a trigger tag (`on_kill`, `on_crit`,
//! `on_proximity`) get a [`TriggerBinding`] per declared reaction. When the
//! event fires for the wearer, the binding issues a fresh [`EffectRequest`]
//! through the executor.
//!
//! A cascade (a trigger's request killing something, which fires another
//! trigger, ...) runs inside one pass. Within a pass a binding never fires for
//! an event caused by its own earlier firing of the same trigger kind, and the
//! cascade stops at `max_trigger_depth`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use sigil_core::EntityId;
use tracing::{debug, info, warn};

use crate::error::Diagnostic;
use crate::executor::{EffectExecutor, EffectRequest, ResolutionReport};
use crate::geometry::TargetSpec;
use crate::params::Params;
use crate::registry::TagRegistry;
use crate::tag::{TagBehavior, TagId, TagSet, TriggerKind};
use crate::world::CombatWorld;

/// Unique identifier for an item instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

/// Unique identifier for a learned skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillId(pub u64);

/// Whatever a binding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwnerRef {
    Item(ItemId),
    Skill(SkillId),
}

/// Who a triggered effect is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAim {
    /// The wearer (heals, self-buffs)
    Actor,
    /// The event's other party: the victim, the crit target, the nearby enemy
    Context,
}

/// One reaction declared by an item or skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub trigger: TriggerKind,
    pub effect_tags: TagSet,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub base_damage: f32,
    pub aim: TriggerAim,
}

impl TriggerSpec {
    pub fn new<T: Into<TagId>>(
        trigger: TriggerKind,
        effect_tags: impl IntoIterator<Item = T>,
        aim: TriggerAim,
    ) -> Self {
        Self {
            trigger,
            effect_tags: effect_tags.into_iter().collect(),
            params: Params::new(),
            base_damage: 0.0,
            aim,
        }
    }

    pub fn with_param(mut self, key: &str, value: f32) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn with_base_damage(mut self, base_damage: f32) -> Self {
        self.base_damage = base_damage;
        self
    }
}

/// An equipped item or active skill as the trigger layer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedSource {
    pub owner: OwnerRef,
    /// The owner's own tags; must include the trigger tag of every reaction
    pub tags: TagSet,
    pub triggers: Vec<TriggerSpec>,
}

/// A live reaction. Exists while its owner is equipped.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerBinding {
    pub owner: OwnerRef,
    pub trigger: TriggerKind,
    /// The owner's tag that enabled this binding
    pub trigger_tag: TagId,
    pub bound_effect_tags: TagSet,
    pub bound_params: Params,
    pub base_damage: f32,
    pub aim: TriggerAim,
    /// Seconds between firings
    pub cooldown: f32,
    pub proximity_range: f32,
    pub cooldown_remaining: f32,
}

impl TriggerBinding {
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }
}

/// A combat event the layer reacts to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    /// Whose bindings are consulted
    pub actor: EntityId,
    pub context: Option<EntityId>,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind, actor: EntityId, context: Option<EntityId>) -> Self {
        Self {
            kind,
            actor,
            context,
        }
    }
}

/// Everything one cascade did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerPass {
    pub reports: Vec<ResolutionReport>,
    /// Bindings that fired, in firing order
    pub fired: Vec<(OwnerRef, TriggerKind)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TriggerPass {
    pub fn extend(&mut self, other: TriggerPass) {
        self.reports.extend(other.reports);
        self.fired.extend(other.fired);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty() && self.diagnostics.is_empty()
    }
}

/// Triggers that already fired on the way to an event
type Ancestry = Vec<(OwnerRef, TriggerKind)>;

/// Kill and crit events produced by a resolution
pub fn events_from_report(report: &ResolutionReport) -> Vec<TriggerEvent> {
    let mut events = Vec::new();
    for hit in &report.hits {
        if hit.crit {
            events.push(TriggerEvent::new(TriggerKind::OnCrit, report.source, Some(hit.target)));
        }
        if hit.killed {
            events.push(TriggerEvent::new(TriggerKind::OnKill, report.source, Some(hit.target)));
        }
    }
    events
}

/// All bindings, per wearer
#[derive(Debug, Clone)]
pub struct TriggerLayer {
    bindings: BTreeMap<EntityId, Vec<TriggerBinding>>,
    max_depth: u32,
    default_proximity_range: f32,
}

impl TriggerLayer {
    pub fn new(max_depth: u32, default_proximity_range: f32) -> Self {
        Self {
            bindings: BTreeMap::new(),
            max_depth,
            default_proximity_range,
        }
    }

    /// Bind every reaction of `source` to `actor`.
    ///
    /// A reaction whose trigger tag is missing from the owner's tags is not
    /// bound and is reported instead.
    pub fn equip(
        &mut self,
        registry: &TagRegistry,
        actor: EntityId,
        source: &EquippedSource,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for spec in &source.triggers {
            let trigger_def = source.tags.iter().find_map(|tag| {
                let def = registry.get(tag.as_str())?;
                (def.behavior == TagBehavior::Trigger(spec.trigger)).then_some(def)
            });
            let Some(trigger_def) = trigger_def else {
                warn!("{:?} has no tag for its {:?} reaction", source.owner, spec.trigger);
                diagnostics.push(Diagnostic::UnboundTrigger {
                    owner: source.owner,
                    trigger: spec.trigger,
                });
                continue;
            };

            let params = Params::resolve_for_tag(
                &trigger_def.default_params,
                trigger_def.id.as_str(),
                &spec.params,
            );
            let binding = TriggerBinding {
                owner: source.owner,
                trigger: spec.trigger,
                trigger_tag: trigger_def.id.clone(),
                bound_effect_tags: spec.effect_tags.clone(),
                bound_params: spec.params.clone(),
                base_damage: spec.base_damage,
                aim: spec.aim,
                cooldown: match spec.trigger {
                    TriggerKind::OnProximity => params.get_or("cooldown", 0.0).max(0.0),
                    TriggerKind::OnKill | TriggerKind::OnCrit => 0.0,
                },
                proximity_range: params.get_or("proximity_range", self.default_proximity_range),
                cooldown_remaining: 0.0,
            };
            debug!("{} bound {:?} from {:?}", actor, spec.trigger, source.owner);
            self.bindings.entry(actor).or_default().push(binding);
        }
        diagnostics
    }

    /// Drop every binding `owner` gave `actor`. Returns how many were removed.
    pub fn unequip(&mut self, actor: EntityId, owner: OwnerRef) -> usize {
        let Some(list) = self.bindings.get_mut(&actor) else {
            return 0;
        };
        let before = list.len();
        list.retain(|b| b.owner != owner);
        let removed = before - list.len();
        if list.is_empty() {
            self.bindings.remove(&actor);
        }
        removed
    }

    /// Forget everything bound to `actor`
    pub fn remove_actor(&mut self, actor: EntityId) {
        self.bindings.remove(&actor);
    }

    pub fn bindings(&self, actor: EntityId) -> &[TriggerBinding] {
        self.bindings.get(&actor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fire the bindings matching one event, with its cascade
    pub fn on_event(
        &mut self,
        executor: &mut EffectExecutor,
        world: &mut CombatWorld,
        event: TriggerEvent,
    ) -> TriggerPass {
        self.run_pass(executor, world, vec![event])
    }

    /// Fire kill and crit reactions for a finished resolution
    pub fn dispatch(
        &mut self,
        executor: &mut EffectExecutor,
        world: &mut CombatWorld,
        report: &ResolutionReport,
    ) -> TriggerPass {
        self.run_pass(executor, world, events_from_report(report))
    }

    /// Count down cooldowns and fire proximity reactions.
    ///
    /// A ready proximity binding fires once per call while a live enemy is in
    /// range; the nearest enemy is the context.
    pub fn tick(
        &mut self,
        executor: &mut EffectExecutor,
        world: &mut CombatWorld,
        dt: f32,
    ) -> TriggerPass {
        let mut events = Vec::new();
        for (&actor, list) in &mut self.bindings {
            for binding in list.iter_mut() {
                binding.cooldown_remaining = (binding.cooldown_remaining - dt).max(0.0);
            }
            let range = list
                .iter()
                .filter(|b| b.trigger == TriggerKind::OnProximity && b.is_ready())
                .map(|b| b.proximity_range)
                .fold(None, |acc: Option<f32>, r| Some(acc.map_or(r, |a| a.max(r))));
            if let Some(range) = range {
                if let Some(enemy) = nearest_enemy(world, actor, range) {
                    events.push(TriggerEvent::new(TriggerKind::OnProximity, actor, Some(enemy)));
                }
            }
        }
        self.run_pass(executor, world, events)
    }

    fn run_pass(
        &mut self,
        executor: &mut EffectExecutor,
        world: &mut CombatWorld,
        events: Vec<TriggerEvent>,
    ) -> TriggerPass {
        let mut pass = TriggerPass::default();
        let mut queue: VecDeque<(TriggerEvent, Ancestry, u32)> =
            events.into_iter().map(|e| (e, Vec::new(), 0)).collect();
        let mut depth_reported = false;

        while let Some((event, ancestry, depth)) = queue.pop_front() {
            if depth > self.max_depth {
                if !depth_reported {
                    warn!("Trigger chain cut at depth {}", self.max_depth);
                    pass.diagnostics
                        .push(Diagnostic::TriggerDepthExceeded(self.max_depth));
                    depth_reported = true;
                }
                continue;
            }
            if !world.is_alive(event.actor) {
                continue;
            }

            for (owner, request) in self.fire_matching(world, &event, &ancestry, &mut pass) {
                let report = executor.resolve(world, &request);

                let mut child = ancestry.clone();
                child.push((owner, event.kind));
                for next in events_from_report(&report) {
                    queue.push_back((next, child.clone(), depth + 1));
                }
                pass.reports.push(report);
            }
        }
        pass
    }

    /// Requests for every ready binding of `event.actor` matching the event.
    /// Marks them fired and starts their cooldowns.
    fn fire_matching(
        &mut self,
        world: &CombatWorld,
        event: &TriggerEvent,
        ancestry: &Ancestry,
        pass: &mut TriggerPass,
    ) -> Vec<(OwnerRef, EffectRequest)> {
        let Some(list) = self.bindings.get_mut(&event.actor) else {
            return Vec::new();
        };
        let actor_position = world.get(event.actor).map(|c| c.position());

        let mut requests = Vec::new();
        for binding in list.iter_mut().filter(|b| b.trigger == event.kind) {
            if ancestry.contains(&(binding.owner, event.kind)) {
                debug!("{:?} {:?} suppressed in its own chain", binding.owner, event.kind);
                pass.diagnostics.push(Diagnostic::RecursiveTrigger {
                    owner: binding.owner,
                    trigger: event.kind,
                });
                continue;
            }
            if !binding.is_ready() {
                continue;
            }
            if event.kind == TriggerKind::OnProximity {
                let in_range = event
                    .context
                    .and_then(|c| world.get(c))
                    .zip(actor_position)
                    .is_some_and(|(c, p)| c.position().distance(p) <= binding.proximity_range);
                if !in_range {
                    continue;
                }
            }

            let target = match (binding.aim, event.context) {
                (TriggerAim::Actor, _) => TargetSpec::Entity(event.actor),
                (TriggerAim::Context, Some(context)) => TargetSpec::Entity(context),
                (TriggerAim::Context, None) => TargetSpec::Facing,
            };
            let request = EffectRequest::new(event.actor, target)
                .with_tags(binding.bound_effect_tags.iter().cloned())
                .with_params(&binding.bound_params)
                .with_base_damage(binding.base_damage);

            binding.cooldown_remaining = binding.cooldown;
            info!("{:?} fired {:?} for {}", binding.owner, event.kind, event.actor);
            pass.fired.push((binding.owner, event.kind));
            requests.push((binding.owner, request));
        }
        requests
    }
}

/// Nearest live combatant on another team within `range`
fn nearest_enemy(world: &CombatWorld, actor: EntityId, range: f32) -> Option<EntityId> {
    let me = world.get(actor).filter(|c| c.is_alive())?;
    world
        .living()
        .filter(|(id, c)| *id != actor && c.team != me.team)
        .map(|(id, c)| (c.position().distance(me.position()), id))
        .filter(|(distance, _)| *distance <= range)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}
