//! Effect execution
//!
//! [`EffectExecutor::resolve`] is the single entry point that turns an
//! [`EffectRequest`] into consequences: geometry, damage, mechanics, then
//! statuses, one target at a time in hit order. It never fails; anything odd
//! becomes a [`Diagnostic`] on the report.

use std::sync::Arc;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sigil_core::EntityId;
use tracing::{debug, warn};

use crate::config::CombatConfig;
use crate::damage::DamageCalculator;
use crate::error::Diagnostic;
use crate::geometry::{select_geometry, GeometryResolver, TargetSpec};
use crate::params::Params;
use crate::registry::TagRegistry;
use crate::status::{ApplyOutcome, ApplyReport};
use crate::tag::{GeometryKind, MechanicKind, TagBehavior, TagDefinition, TagId, TagSet};
use crate::world::CombatWorld;

/// One attack, skill cast, device fire or trigger fire
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRequest {
    pub source: EntityId,
    pub target: TargetSpec,
    pub tags: TagSet,
    /// Plain `key` or tag-scoped `tag.key` overrides of tag defaults
    pub overrides: Params,
    pub base_damage: f32,
}

impl EffectRequest {
    pub fn new(source: EntityId, target: TargetSpec) -> Self {
        Self {
            source,
            target,
            tags: TagSet::new(),
            overrides: Params::new(),
            base_damage: 0.0,
        }
    }

    /// Add tags; duplicates collapse
    pub fn with_tags<T: Into<TagId>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        for tag in tags {
            self.tags.insert(tag);
        }
        self
    }

    pub fn with_param(mut self, key: &str, value: f32) -> Self {
        self.overrides.set(key, value);
        self
    }

    pub fn with_params(mut self, params: &Params) -> Self {
        self.overrides.overlay(params);
        self
    }

    pub fn with_base_damage(mut self, base_damage: f32) -> Self {
        self.base_damage = base_damage;
        self
    }
}

/// What happened to one target
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub target: EntityId,
    pub hit_order: usize,
    pub falloff: f32,
    /// Damage after crit and status modifiers, before shields
    pub damage: f32,
    /// Health actually lost
    pub applied: f32,
    /// Damage eaten by shields
    pub absorbed: f32,
    pub healed: f32,
    pub crit: bool,
    /// This hit took the target from alive to dead
    pub killed: bool,
    pub cleansed: Vec<TagId>,
    pub statuses: Vec<ApplyReport>,
}

/// Everything one request did, in hit order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionReport {
    pub source: EntityId,
    pub geometry: GeometryKind,
    pub hits: Vec<HitRecord>,
    /// Lifesteal returned to the source
    pub source_healed: f32,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionReport {
    fn empty(source: EntityId, geometry: GeometryKind) -> Self {
        Self {
            source,
            geometry,
            hits: Vec::new(),
            source_healed: 0.0,
            diagnostics: Vec::new(),
        }
    }

    /// Targets killed by this request
    pub fn kills(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.hits.iter().filter(|h| h.killed).map(|h| h.target)
    }

    /// Targets critically hit by this request
    pub fn crits(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.hits.iter().filter(|h| h.crit).map(|h| h.target)
    }

    pub fn total_damage(&self) -> f32 {
        self.hits.iter().map(|h| h.applied).sum()
    }

    pub fn targets(&self) -> Vec<EntityId> {
        self.hits.iter().map(|h| h.target).collect()
    }

    /// `(target, status)` for every status that ended up active
    pub fn statuses_applied(&self) -> Vec<(EntityId, TagId)> {
        self.hits
            .iter()
            .flat_map(|h| {
                h.statuses
                    .iter()
                    .filter(|s| s.applied())
                    .map(move |s| (h.target, s.status.clone()))
            })
            .collect()
    }

    /// `(target, status)` for every status evicted by a conflicting newcomer
    pub fn statuses_evicted(&self) -> Vec<(EntityId, TagId)> {
        self.hits
            .iter()
            .flat_map(|h| {
                h.statuses
                    .iter()
                    .flat_map(|s| s.evicted.iter())
                    .map(move |id| (h.target, id.clone()))
            })
            .collect()
    }
}

/// Request tags sorted by what they do
struct ClassifiedTags<'r> {
    known: Vec<&'r TagDefinition>,
    statuses: Vec<&'r TagDefinition>,
    mechanics: Vec<(&'r TagDefinition, MechanicKind)>,
}

/// Resolves effect requests against a world
pub struct EffectExecutor {
    registry: Arc<TagRegistry>,
    config: CombatConfig,
    rng: SmallRng,
}

impl EffectExecutor {
    pub fn new(registry: Arc<TagRegistry>, config: CombatConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.rng_seed);
        Self {
            registry,
            config,
            rng,
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    fn classify<'r>(
        registry: &'r TagRegistry,
        tags: &TagSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ClassifiedTags<'r> {
        let mut classified = ClassifiedTags {
            known: Vec::new(),
            statuses: Vec::new(),
            mechanics: Vec::new(),
        };
        for tag in tags.iter() {
            let Some(def) = registry.get(tag.as_str()) else {
                warn!("Unknown tag '{}' ignored", tag);
                diagnostics.push(Diagnostic::UnknownTag(tag.clone()));
                continue;
            };
            classified.known.push(def);
            match def.behavior {
                TagBehavior::Status(_) => classified.statuses.push(def),
                TagBehavior::Mechanic(kind) => classified.mechanics.push((def, kind)),
                _ => {}
            }
        }
        classified
    }

    /// Resolve one request to completion.
    ///
    /// Targets are processed in hit order. For each target damage lands first,
    /// then heals, cleanses and statuses, then knockback. A target killed by
    /// the hit receives no statuses.
    pub fn resolve(&mut self, world: &mut CombatWorld, request: &EffectRequest) -> ResolutionReport {
        let registry = Arc::clone(&self.registry);
        let mut diagnostics = Vec::new();
        let tags = Self::classify(&registry, &request.tags, &mut diagnostics);

        let selection = select_geometry(&registry, &request.tags);
        let mut report = ResolutionReport::empty(request.source, selection.kind);
        report.diagnostics = diagnostics;
        report.diagnostics.extend(selection.diagnostic);

        let Some(caster) = world.get(request.source) else {
            warn!("Effect source {} no longer exists", request.source);
            report.diagnostics.push(Diagnostic::MissingSource(request.source));
            return report;
        };
        let origin = caster.position();
        let outgoing = caster.statuses.damage_dealt_multiplier();

        // Geometry
        let mut geometry_params = match selection.tag.as_ref().and_then(|t| registry.get(t.as_str())) {
            Some(def) => {
                Params::resolve_for_tag(&def.default_params, def.id.as_str(), &request.overrides)
            }
            None => Params::resolve_for_tag(&Params::new(), "single", &request.overrides),
        };
        if self.config.friendly_fire && !geometry_params.contains("friendly_fire") {
            geometry_params.set("friendly_fire", 1.0);
        }
        let resolution = GeometryResolver::new(world).resolve(
            selection.kind,
            request.source,
            request.target,
            &geometry_params,
        );
        report.diagnostics.extend(resolution.diagnostics);

        let request_params = Params::merged(
            tags.known.iter().map(|d| (d.id.as_str(), &d.default_params)),
            &request.overrides,
        );
        let crit_chance = request_params.get_or("crit_chance", 0.0).clamp(0.0, 1.0);
        let crit_multiplier = request_params
            .get_or("crit_multiplier", self.config.default_crit_multiplier)
            .max(0.0);

        let calculator = DamageCalculator::new(&registry, self.config.damage_precision);
        let mut lifesteal = 0.0;

        for target in &resolution.targets {
            let Some(victim) = world.get_mut(target.entity) else {
                continue;
            };
            let breakdown =
                calculator.compute(request.base_damage, &request.tags, &request.overrides, target.falloff);

            let crit = breakdown.final_damage > 0.0
                && crit_chance > 0.0
                && self.rng.gen::<f32>() < crit_chance;
            let mut damage = breakdown.final_damage;
            if crit {
                damage *= crit_multiplier;
            }
            damage = calculator.round(
                (damage * outgoing * victim.statuses.damage_taken_multiplier()).max(0.0),
            );

            // Damage
            let was_alive = victim.is_alive();
            let remaining = victim.statuses.absorb_damage(damage);
            let absorbed = damage - remaining;
            let applied = victim.vitals.take_damage(remaining);
            let killed = was_alive && !victim.is_alive();

            let mut hit = HitRecord {
                target: target.entity,
                hit_order: target.hit_order,
                falloff: target.falloff,
                damage,
                applied,
                absorbed,
                healed: 0.0,
                crit,
                killed,
                cleansed: Vec::new(),
                statuses: Vec::new(),
            };

            // Mechanics
            let mut knockback = 0.0;
            for (def, kind) in &tags.mechanics {
                let params =
                    Params::resolve_for_tag(&def.default_params, def.id.as_str(), &request.overrides);
                match kind {
                    MechanicKind::Heal => {
                        let amount = calculator.round(params.get_or("heal_amount", 0.0) * target.falloff);
                        hit.healed += victim.vitals.heal(amount);
                    }
                    MechanicKind::Lifesteal => {
                        lifesteal += applied * params.get_or("lifesteal_fraction", 0.0).max(0.0);
                    }
                    MechanicKind::Knockback => {
                        knockback += params.get_or("knockback_distance", 0.0) * target.falloff;
                    }
                    MechanicKind::Cleanse => {
                        let (statuses, vitals) = victim.statuses_and_vitals();
                        hit.cleansed.extend(statuses.clear_debuffs(vitals));
                    }
                }
            }

            // Statuses
            if victim.is_alive() {
                for def in &tags.statuses {
                    let (statuses, vitals) = victim.statuses_and_vitals();
                    match statuses.apply(
                        &registry,
                        def.id.as_str(),
                        &request.overrides,
                        Some(request.source),
                        vitals,
                    ) {
                        Ok(status_report) => hit.statuses.push(status_report),
                        Err(reason) => {
                            warn!("Status '{}' rejected on {}: {}", def.id, target.entity, reason);
                            report.diagnostics.push(Diagnostic::StatusRejected {
                                target: target.entity,
                                status: def.id.clone(),
                                reason,
                            });
                        }
                    }
                }
            }

            if knockback > 0.0 && victim.is_alive() && target.entity != request.source {
                let direction = (victim.position() - origin).normalize_or_zero();
                let direction = if direction == Vec2::ZERO {
                    victim.transform.forward()
                } else {
                    direction
                };
                victim.transform.translate(direction * knockback);
            }

            debug!(
                "{} -> {}: {} dmg ({} absorbed){}{}",
                request.source,
                target.entity,
                hit.applied,
                hit.absorbed,
                if hit.crit { " crit" } else { "" },
                if hit.killed { " kill" } else { "" },
            );
            for status in &hit.statuses {
                if let ApplyOutcome::Blocked { by } = &status.outcome {
                    debug!("{} on {} blocked by {}", status.status, target.entity, by);
                }
            }
            report.hits.push(hit);
        }

        if lifesteal > 0.0 {
            if let Some(caster) = world.get_mut(request.source) {
                report.source_healed = caster.vitals.heal(calculator.round(lifesteal));
            }
        }

        debug!(
            "{} resolved {:?}: {} hits, {} damage, {} kills",
            request.source,
            report.geometry,
            report.hits.len(),
            report.total_damage(),
            report.kills().count()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Combatant;

    fn setup() -> (EffectExecutor, CombatWorld, EntityId, EntityId) {
        let executor = EffectExecutor::new(Arc::new(TagRegistry::builtin()), CombatConfig::default());
        let mut world = CombatWorld::new();
        let hero = world.spawn(Combatant::new("hero", 0, Vec2::ZERO, 100.0));
        let foe = world.spawn(Combatant::new("foe", 1, Vec2::new(2.0, 0.0), 100.0));
        (executor, world, hero, foe)
    }

    #[test]
    fn test_single_target_damage() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical", "slashing", "single"])
            .with_base_damage(30.0);
        let report = executor.resolve(&mut world, &request);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].applied, 30.0);
        assert_eq!(world.get(foe).unwrap().vitals.health, 70.0);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_config_friendly_fire_hits_allies() {
        let config = CombatConfig {
            friendly_fire: true,
            ..Default::default()
        };
        let mut executor = EffectExecutor::new(Arc::new(TagRegistry::builtin()), config);
        let mut world = CombatWorld::new();
        let hero = world.spawn(Combatant::new("hero", 0, Vec2::ZERO, 100.0));
        let ally = world.spawn(Combatant::new("ally", 0, Vec2::new(3.0, 0.0), 100.0));
        let foe = world.spawn(Combatant::new("foe", 1, Vec2::new(4.0, 0.0), 100.0));
        let request = EffectRequest::new(hero, TargetSpec::Point(Vec2::new(3.5, 0.0)))
            .with_tags(["fire", "circle"])
            .with_param("circle_radius", 1.0)
            .with_base_damage(10.0);
        let report = executor.resolve(&mut world, &request);
        let mut targets = report.targets();
        targets.sort();
        let mut expected = vec![ally, foe];
        expected.sort();
        assert_eq!(targets, expected);
        assert!(world.get(ally).unwrap().vitals.health < 100.0);
    }

    #[test]
    fn test_unknown_tag_is_diagnostic() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical", "mystery"])
            .with_base_damage(10.0);
        let report = executor.resolve(&mut world, &request);
        assert_eq!(report.total_damage(), 10.0);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnknownTag(TagId::from("mystery"))]
        );
    }

    #[test]
    fn test_missing_source_resolves_nothing() {
        let (mut executor, mut world, hero, foe) = setup();
        world.despawn(hero);
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe)).with_base_damage(10.0);
        let report = executor.resolve(&mut world, &request);
        assert!(report.hits.is_empty());
        assert_eq!(report.diagnostics, vec![Diagnostic::MissingSource(hero)]);
    }

    #[test]
    fn test_status_applied_after_damage() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["fire", "burn"])
            .with_base_damage(10.0);
        let report = executor.resolve(&mut world, &request);
        // fire + burn synergy
        assert!((report.hits[0].applied - 11.0).abs() < 1e-4);
        assert_eq!(report.statuses_applied(), vec![(foe, TagId::from("burn"))]);
        let burn = world.get(foe).unwrap().statuses.get("burn").unwrap().clone();
        assert_eq!(burn.source, Some(hero));
    }

    #[test]
    fn test_killed_target_gets_no_status() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical", "burn"])
            .with_base_damage(500.0);
        let report = executor.resolve(&mut world, &request);
        assert!(report.hits[0].killed);
        assert_eq!(report.kills().collect::<Vec<_>>(), vec![foe]);
        assert!(report.hits[0].statuses.is_empty());
        assert_eq!(world.get(foe).unwrap().statuses.count(), 0);
    }

    #[test]
    fn test_guaranteed_crit() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical"])
            .with_param("crit_chance", 1.0)
            .with_param("crit_multiplier", 2.0)
            .with_base_damage(10.0);
        let report = executor.resolve(&mut world, &request);
        assert!(report.hits[0].crit);
        assert_eq!(report.hits[0].applied, 20.0);
        assert_eq!(report.crits().count(), 1);
    }

    #[test]
    fn test_shield_absorbs_first() {
        let (mut executor, mut world, hero, foe) = setup();
        let shield = EffectRequest::new(foe, TargetSpec::Entity(foe)).with_tags(["shield"]);
        executor.resolve(&mut world, &shield);

        let hit = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical"])
            .with_base_damage(50.0);
        let report = executor.resolve(&mut world, &hit);
        assert_eq!(report.hits[0].absorbed, 30.0);
        assert_eq!(report.hits[0].applied, 20.0);
    }

    #[test]
    fn test_vulnerable_and_empower_scale_damage() {
        let (mut executor, mut world, hero, foe) = setup();
        executor.resolve(
            &mut world,
            &EffectRequest::new(hero, TargetSpec::Entity(foe)).with_tags(["vulnerable"]),
        );
        executor.resolve(
            &mut world,
            &EffectRequest::new(hero, TargetSpec::Entity(hero)).with_tags(["empower"]),
        );
        let report = executor.resolve(
            &mut world,
            &EffectRequest::new(hero, TargetSpec::Entity(foe))
                .with_tags(["physical"])
                .with_base_damage(10.0),
        );
        // 10 * 1.3 * 1.25
        assert!((report.hits[0].applied - 16.25).abs() < 1e-3);
    }

    #[test]
    fn test_lifesteal_heals_source() {
        let (mut executor, mut world, hero, foe) = setup();
        world.get_mut(hero).unwrap().vitals.take_damage(50.0);
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical", "lifesteal"])
            .with_base_damage(40.0);
        let report = executor.resolve(&mut world, &request);
        assert!((report.source_healed - 8.0).abs() < 1e-4);
        assert!((world.get(hero).unwrap().vitals.health - 58.0).abs() < 1e-4);
    }

    #[test]
    fn test_knockback_pushes_away() {
        let (mut executor, mut world, hero, foe) = setup();
        let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
            .with_tags(["physical", "knockback"])
            .with_base_damage(1.0);
        executor.resolve(&mut world, &request);
        let position = world.get(foe).unwrap().position();
        assert!((position.x - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_cleanse_removes_debuffs() {
        let (mut executor, mut world, hero, foe) = setup();
        executor.resolve(
            &mut world,
            &EffectRequest::new(foe, TargetSpec::Entity(hero)).with_tags(["poison", "slow"]),
        );
        let report = executor.resolve(
            &mut world,
            &EffectRequest::new(hero, TargetSpec::Entity(hero)).with_tags(["cleanse", "haste"]),
        );
        assert_eq!(report.hits[0].cleansed.len(), 2);
        let hero_statuses = &world.get(hero).unwrap().statuses;
        assert!(hero_statuses.has_status("haste"));
        assert_eq!(hero_statuses.count(), 1);
    }

    #[test]
    fn test_crits_are_seeded() {
        let roll = || {
            let (mut executor, mut world, hero, foe) = setup();
            (0..10)
                .map(|_| {
                    let request = EffectRequest::new(hero, TargetSpec::Entity(foe))
                        .with_tags(["physical"])
                        .with_param("crit_chance", 0.5)
                        .with_base_damage(1.0);
                    executor.resolve(&mut world, &request).hits[0].crit
                })
                .collect::<Vec<bool>>()
        };
        assert_eq!(roll(), roll());
    }
}
