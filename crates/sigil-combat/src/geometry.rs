//! Target resolution
//!
//! Turns a geometry kind, a source, and an aim into an ordered, duplicate-free
//! list of hits with per-hit falloff. All ordering is by distance, then by
//! spawn order, so the same world always resolves the same way.

use std::cmp::Ordering;

use glam::Vec2;
use sigil_core::{angle_between_deg, point_segment_distance, EntityId};
use tracing::warn;

use crate::error::Diagnostic;
use crate::params::Params;
use crate::registry::TagRegistry;
use crate::tag::{GeometryKind, TagBehavior, TagId, TagSet};
use crate::world::CombatWorld;

/// Falloff steps are kept inside this range so multi-hit falloff is strictly
/// decreasing and never reaches zero.
const MIN_FALLOFF_STEP: f32 = 0.01;
const MAX_FALLOFF_STEP: f32 = 0.99;

/// Where an effect is aimed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSpec {
    /// A specific entity
    Entity(EntityId),
    /// A point on the ground
    Point(Vec2),
    /// Straight ahead of the source
    Facing,
}

/// One entity hit by a resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTarget {
    pub entity: EntityId,
    /// Damage multiplier in (0, 1]
    pub falloff: f32,
    /// 0-based position in the hit sequence
    pub hit_order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryResolution {
    pub kind: GeometryKind,
    pub targets: Vec<ResolvedTarget>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GeometryResolution {
    fn empty(kind: GeometryKind) -> Self {
        Self {
            kind,
            targets: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// The geometry a tag set asks for
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySelection {
    pub kind: GeometryKind,
    /// Tag that supplied the geometry; `None` means the implicit single target
    pub tag: Option<TagId>,
    pub diagnostic: Option<Diagnostic>,
}

/// Pick the highest-priority geometry among the tags.
///
/// Several geometry tags is not an error: the winner is used and the rest are
/// reported. No geometry tag means single target.
pub fn select_geometry(registry: &TagRegistry, tags: &TagSet) -> GeometrySelection {
    let found: Vec<(&TagId, GeometryKind)> = tags
        .iter()
        .filter_map(|tag| match registry.behavior(tag.as_str()) {
            Some(TagBehavior::Geometry(kind)) => Some((tag, kind)),
            _ => None,
        })
        .collect();

    // First tag wins among equal priorities
    let Some(&(tag, kind)) = found
        .iter()
        .rev()
        .max_by_key(|(_, kind)| kind.priority())
    else {
        return GeometrySelection {
            kind: GeometryKind::Single,
            tag: None,
            diagnostic: None,
        };
    };

    let diagnostic = (found.len() > 1).then(|| {
        let ignored: Vec<GeometryKind> = found
            .iter()
            .filter(|(t, _)| *t != tag)
            .map(|(_, k)| *k)
            .collect();
        warn!("Ambiguous geometry: using {:?}, ignoring {:?}", kind, ignored);
        Diagnostic::AmbiguousGeometry {
            chosen: kind,
            ignored,
        }
    });

    GeometrySelection {
        kind,
        tag: Some(tag.clone()),
        diagnostic,
    }
}

/// Multiplier for hit `k` with the given per-hit reduction.
///
/// Strictly positive and strictly decreasing in `k`; past the point where the
/// product underflows f32 it follows a small floor shrinking with `k`.
pub fn falloff_for_hit(step: f32, k: usize) -> f32 {
    let step = f64::from(step.clamp(MIN_FALLOFF_STEP, MAX_FALLOFF_STEP));
    let floor = f64::from(f32::MIN_POSITIVE) / (k as f64 + 1.0);
    (1.0 - step).powi(k as i32).max(floor) as f32
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: EntityId,
    position: Vec2,
    spawn_order: u64,
}

fn by_distance(a: (f32, u64), b: (f32, u64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Resolves geometries against a world snapshot
pub struct GeometryResolver<'w> {
    world: &'w CombatWorld,
}

impl<'w> GeometryResolver<'w> {
    pub fn new(world: &'w CombatWorld) -> Self {
        Self { world }
    }

    /// Resolve `kind` for `source` aimed at `target`.
    ///
    /// `params` are the geometry tag's resolved parameters. Dead or missing
    /// targets are dropped with a diagnostic; no candidates is an empty result.
    pub fn resolve(
        &self,
        kind: GeometryKind,
        source: EntityId,
        target: TargetSpec,
        params: &Params,
    ) -> GeometryResolution {
        let Some(caster) = self.world.get(source) else {
            let mut resolution = GeometryResolution::empty(kind);
            resolution.diagnostics.push(Diagnostic::MissingSource(source));
            return resolution;
        };
        let origin = caster.position();
        let aim = self.aim_direction(origin, caster.transform.forward(), target);
        let candidates = self.candidates(source, caster.team, params);

        let mut resolution = GeometryResolution::empty(kind);
        let hits = match kind {
            GeometryKind::Single => self.single(target, &mut resolution.diagnostics),
            GeometryKind::Circle => {
                let center = match target {
                    TargetSpec::Point(point) => point,
                    TargetSpec::Entity(id) => self.world.get(id).map_or(origin, |c| c.position()),
                    TargetSpec::Facing => origin,
                };
                let radius = params.get_or("circle_radius", 3.0);
                Self::nearest_first(&candidates, center, |c| {
                    c.position.distance(center) <= radius
                })
            }
            GeometryKind::Cone => {
                let range = params.get_or("cone_range", 5.0);
                let half_angle = params.get_or("cone_angle", 90.0) / 2.0;
                Self::nearest_first(&candidates, origin, |c| {
                    let offset = c.position - origin;
                    offset.length() <= range && angle_between_deg(aim, offset) <= half_angle
                })
            }
            GeometryKind::Chain => {
                self.chain(origin, target, &candidates, params, &mut resolution.diagnostics)
            }
            GeometryKind::Beam => Self::line(
                &candidates,
                origin,
                aim,
                params.get_or("beam_range", 10.0),
                params.get_or("beam_width", 1.0),
                params.get("pierce_count"),
            ),
            GeometryKind::Pierce => Self::line(
                &candidates,
                origin,
                aim,
                params.get_or("pierce_range", 12.0),
                params.get_or("pierce_width", 0.6),
                params.get("pierce_count"),
            ),
        };

        let step = match kind {
            GeometryKind::Chain => params.get_or("chain_falloff", 0.3),
            GeometryKind::Beam | GeometryKind::Pierce => params.get_or("pierce_falloff", 0.2),
            _ => 0.0,
        };
        resolution.targets = hits
            .into_iter()
            .enumerate()
            .map(|(hit_order, entity)| ResolvedTarget {
                entity,
                falloff: if kind.has_falloff() {
                    falloff_for_hit(step, hit_order)
                } else {
                    1.0
                },
                hit_order,
            })
            .collect();
        resolution
    }

    fn aim_direction(&self, origin: Vec2, facing: Vec2, target: TargetSpec) -> Vec2 {
        let towards = match target {
            TargetSpec::Entity(id) => self.world.get(id).map(|c| c.position() - origin),
            TargetSpec::Point(point) => Some(point - origin),
            TargetSpec::Facing => None,
        };
        towards
            .map(Vec2::normalize_or_zero)
            .filter(|dir| *dir != Vec2::ZERO)
            .unwrap_or(facing)
    }

    /// Live entities an area geometry may hit, in spawn order
    fn candidates(&self, source: EntityId, team: u32, params: &Params) -> Vec<Candidate> {
        let friendly_fire = params.get_or("friendly_fire", 0.0) > 0.0;
        self.world
            .living()
            .filter(|(id, c)| *id != source && (friendly_fire || c.team != team))
            .filter_map(|(id, c)| {
                Some(Candidate {
                    id,
                    position: c.position(),
                    spawn_order: self.world.spawn_order(id)?,
                })
            })
            .collect()
    }

    /// Explicit live target, or the given diagnostic
    fn explicit_target(&self, id: EntityId, diagnostics: &mut Vec<Diagnostic>) -> Option<EntityId> {
        if self.world.is_alive(id) {
            Some(id)
        } else {
            warn!("Target {} is dead or missing", id);
            diagnostics.push(Diagnostic::InvalidTarget(id));
            None
        }
    }

    fn single(&self, target: TargetSpec, diagnostics: &mut Vec<Diagnostic>) -> Vec<EntityId> {
        match target {
            TargetSpec::Entity(id) => self.explicit_target(id, diagnostics).into_iter().collect(),
            TargetSpec::Point(_) | TargetSpec::Facing => Vec::new(),
        }
    }

    fn nearest_first(
        candidates: &[Candidate],
        from: Vec2,
        keep: impl Fn(&Candidate) -> bool,
    ) -> Vec<EntityId> {
        let mut hits: Vec<(f32, u64, EntityId)> = candidates
            .iter()
            .filter(|c| keep(c))
            .map(|c| (c.position.distance(from), c.spawn_order, c.id))
            .collect();
        hits.sort_by(|a, b| by_distance((a.0, a.1), (b.0, b.1)));
        hits.into_iter().map(|(_, _, id)| id).collect()
    }

    fn chain(
        &self,
        origin: Vec2,
        target: TargetSpec,
        candidates: &[Candidate],
        params: &Params,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<EntityId> {
        let range = params.get_or("chain_range", 5.0);
        let extra_hits = params.get_or("chain_count", 2.0).max(0.0) as usize;

        let primary = match target {
            TargetSpec::Entity(id) => self.explicit_target(id, diagnostics),
            TargetSpec::Point(point) => Self::nearest_within(candidates, point, range, &[]),
            TargetSpec::Facing => Self::nearest_within(candidates, origin, range, &[]),
        };
        let Some(primary) = primary else {
            return Vec::new();
        };

        let mut hits = vec![primary];
        let mut last = self.world.get(primary).map_or(origin, |c| c.position());
        for _ in 0..extra_hits {
            let Some(next) = Self::nearest_within(candidates, last, range, &hits) else {
                break;
            };
            last = self.world.get(next).map_or(last, |c| c.position());
            hits.push(next);
        }
        hits
    }

    fn nearest_within(
        candidates: &[Candidate],
        from: Vec2,
        range: f32,
        exclude: &[EntityId],
    ) -> Option<EntityId> {
        candidates
            .iter()
            .filter(|c| !exclude.contains(&c.id))
            .map(|c| (c.position.distance(from), c.spawn_order, c.id))
            .filter(|(distance, _, _)| *distance <= range)
            .min_by(|a, b| by_distance((a.0, a.1), (b.0, b.1)))
            .map(|(_, _, id)| id)
    }

    fn line(
        candidates: &[Candidate],
        origin: Vec2,
        direction: Vec2,
        range: f32,
        width: f32,
        limit: Option<f32>,
    ) -> Vec<EntityId> {
        let half_width = width / 2.0;
        let mut hits = Self::nearest_first(candidates, origin, |c| {
            let (along, perpendicular) = point_segment_distance(origin, direction, c.position);
            (0.0..=range).contains(&along) && perpendicular <= half_width
        });
        if let Some(limit) = limit {
            hits.truncate(limit.max(0.0) as usize);
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Combatant;

    const HERO: u32 = 0;
    const FOES: u32 = 1;

    fn world_with(positions: &[(f32, f32)]) -> (CombatWorld, EntityId, Vec<EntityId>) {
        let mut world = CombatWorld::new();
        let hero = world.spawn(Combatant::new("hero", HERO, Vec2::ZERO, 100.0));
        let foes = positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                world.spawn(Combatant::new(format!("foe{i}"), FOES, Vec2::new(x, y), 100.0))
            })
            .collect();
        (world, hero, foes)
    }

    fn hit_ids(resolution: &GeometryResolution) -> Vec<EntityId> {
        resolution.targets.iter().map(|t| t.entity).collect()
    }

    #[test]
    fn test_select_geometry_priority() {
        let registry = TagRegistry::builtin();
        let tags: TagSet = ["fire", "circle", "beam"].into_iter().collect();
        let selection = select_geometry(&registry, &tags);
        assert_eq!(selection.kind, GeometryKind::Beam);
        assert_eq!(
            selection.diagnostic,
            Some(Diagnostic::AmbiguousGeometry {
                chosen: GeometryKind::Beam,
                ignored: vec![GeometryKind::Circle],
            })
        );
    }

    #[test]
    fn test_select_geometry_defaults_single() {
        let registry = TagRegistry::builtin();
        let tags: TagSet = ["fire"].into_iter().collect();
        let selection = select_geometry(&registry, &tags);
        assert_eq!(selection.kind, GeometryKind::Single);
        assert!(selection.tag.is_none());
        assert!(selection.diagnostic.is_none());
    }

    #[test]
    fn test_single_dead_target_excluded() {
        let (mut world, hero, foes) = world_with(&[(2.0, 0.0)]);
        world.get_mut(foes[0]).unwrap().vitals.take_damage(100.0);
        let resolver = GeometryResolver::new(&world);
        let resolution =
            resolver.resolve(GeometryKind::Single, hero, TargetSpec::Entity(foes[0]), &Params::new());
        assert!(resolution.targets.is_empty());
        assert_eq!(resolution.diagnostics, vec![Diagnostic::InvalidTarget(foes[0])]);
    }

    #[test]
    fn test_circle_around_point() {
        let (world, hero, foes) = world_with(&[(5.0, 0.0), (6.5, 0.0), (9.0, 0.0), (5.0, 1.0)]);
        let resolver = GeometryResolver::new(&world);
        let params = Params::new().with("circle_radius", 2.0);
        let resolution = resolver.resolve(
            GeometryKind::Circle,
            hero,
            TargetSpec::Point(Vec2::new(5.0, 0.0)),
            &params,
        );
        assert_eq!(hit_ids(&resolution), vec![foes[0], foes[3], foes[1]]);
        assert!(resolution.targets.iter().all(|t| t.falloff == 1.0));
    }

    #[test]
    fn test_circle_skips_allies_without_friendly_fire() {
        let (mut world, hero, foes) = world_with(&[(1.0, 0.0)]);
        let ally = world.spawn(Combatant::new("ally", HERO, Vec2::new(0.5, 0.0), 50.0));
        let resolver = GeometryResolver::new(&world);

        let resolution =
            resolver.resolve(GeometryKind::Circle, hero, TargetSpec::Facing, &Params::new());
        assert_eq!(hit_ids(&resolution), vec![foes[0]]);

        let params = Params::new().with("friendly_fire", 1.0);
        let resolution = resolver.resolve(GeometryKind::Circle, hero, TargetSpec::Facing, &params);
        assert_eq!(hit_ids(&resolution), vec![ally, foes[0]]);
    }

    #[test]
    fn test_cone_respects_angle() {
        // Facing +X, 90 degree cone
        let (world, hero, foes) = world_with(&[(3.0, 0.0), (3.0, 2.0), (0.0, 3.0), (-2.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);
        let resolution =
            resolver.resolve(GeometryKind::Cone, hero, TargetSpec::Facing, &Params::new());
        assert_eq!(hit_ids(&resolution), vec![foes[0], foes[1]]);
    }

    #[test]
    fn test_chain_nearest_first_with_falloff() {
        let (world, hero, foes) = world_with(&[(2.0, 0.0), (8.0, 0.0), (5.0, 0.0), (30.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);
        let resolution = resolver.resolve(
            GeometryKind::Chain,
            hero,
            TargetSpec::Entity(foes[0]),
            &Params::new(),
        );
        assert_eq!(hit_ids(&resolution), vec![foes[0], foes[2], foes[1]]);
        let falloffs: Vec<f32> = resolution.targets.iter().map(|t| t.falloff).collect();
        assert_eq!(falloffs[0], 1.0);
        assert!((falloffs[1] - 0.7).abs() < 1e-6);
        assert!((falloffs[2] - 0.49).abs() < 1e-6);
    }

    #[test]
    fn test_chain_tie_breaks_by_spawn_order() {
        let (world, hero, foes) = world_with(&[(2.0, 0.0), (4.0, 0.0), (0.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);
        let params = Params::new().with("chain_count", 1.0);
        let resolution =
            resolver.resolve(GeometryKind::Chain, hero, TargetSpec::Entity(foes[0]), &params);
        // foes[1] and foes[2] are both 2 away from foes[0]
        assert_eq!(hit_ids(&resolution), vec![foes[0], foes[1]]);
    }

    #[test]
    fn test_chain_stops_out_of_range() {
        let (world, hero, foes) = world_with(&[(2.0, 0.0), (20.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);
        let resolution = resolver.resolve(
            GeometryKind::Chain,
            hero,
            TargetSpec::Entity(foes[0]),
            &Params::new(),
        );
        assert_eq!(hit_ids(&resolution), vec![foes[0]]);
    }

    #[test]
    fn test_beam_orders_and_truncates() {
        let (world, hero, foes) =
            world_with(&[(6.0, 0.2), (2.0, -0.3), (4.0, 0.0), (3.0, 2.0), (12.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);

        let resolution =
            resolver.resolve(GeometryKind::Beam, hero, TargetSpec::Facing, &Params::new());
        assert_eq!(hit_ids(&resolution), vec![foes[1], foes[2], foes[0]]);
        let falloffs: Vec<f32> = resolution.targets.iter().map(|t| t.falloff).collect();
        assert!(falloffs.windows(2).all(|w| w[1] < w[0]));
        assert!(falloffs.iter().all(|f| *f > 0.0 && *f <= 1.0));

        let params = Params::new().with("pierce_count", 2.0);
        let resolution = resolver.resolve(GeometryKind::Beam, hero, TargetSpec::Facing, &params);
        assert_eq!(hit_ids(&resolution), vec![foes[1], foes[2]]);
    }

    #[test]
    fn test_long_beam_falloff_stays_positive() {
        let positions: Vec<(f32, f32)> = (0..30).map(|i| (1.0 + i as f32, 0.0)).collect();
        let (world, hero, _) = world_with(&positions);
        let resolver = GeometryResolver::new(&world);
        let params = Params::new()
            .with("beam_range", 40.0)
            .with("pierce_count", 40.0)
            .with("pierce_falloff", 0.99);
        let resolution = resolver.resolve(GeometryKind::Beam, hero, TargetSpec::Facing, &params);
        assert_eq!(resolution.targets.len(), 30);
        let falloffs: Vec<f32> = resolution.targets.iter().map(|t| t.falloff).collect();
        assert!(falloffs.iter().all(|f| *f > 0.0 && *f <= 1.0), "{falloffs:?}");
        assert!(falloffs.windows(2).all(|w| w[1] < w[0]), "{falloffs:?}");
    }

    #[test]
    fn test_pierce_aims_at_point() {
        let (world, hero, foes) = world_with(&[(0.0, 3.0), (0.0, 6.0), (3.0, 0.0)]);
        let resolver = GeometryResolver::new(&world);
        let resolution = resolver.resolve(
            GeometryKind::Pierce,
            hero,
            TargetSpec::Point(Vec2::new(0.0, 10.0)),
            &Params::new(),
        );
        assert_eq!(hit_ids(&resolution), vec![foes[0], foes[1]]);
    }

    #[test]
    fn test_no_candidates_is_empty() {
        let (world, hero, _) = world_with(&[]);
        let resolver = GeometryResolver::new(&world);
        for kind in [
            GeometryKind::Circle,
            GeometryKind::Cone,
            GeometryKind::Chain,
            GeometryKind::Beam,
            GeometryKind::Pierce,
        ] {
            let resolution = resolver.resolve(kind, hero, TargetSpec::Facing, &Params::new());
            assert!(resolution.targets.is_empty());
            assert!(resolution.diagnostics.is_empty());
        }
    }

    #[test]
    fn test_falloff_step_clamped() {
        assert!(falloff_for_hit(1.0, 1) > 0.0);
        assert!(falloff_for_hit(0.0, 1) < 1.0);
        assert_eq!(falloff_for_hit(0.3, 0), 1.0);
        assert!(falloff_for_hit(0.99, 100) > 0.0);
        assert!(falloff_for_hit(0.99, 101) < falloff_for_hit(0.99, 100));
    }
}
