//! Damage calculation
//!
//! `final = base * Π damage_multiplier * Π synergy * falloff`, clamped at zero
//! and rounded to the configured precision.

use crate::params::Params;
use crate::registry::TagRegistry;
use crate::tag::{TagBehavior, TagSet};

/// Round half away from zero to `precision` decimal places.
///
/// Every damage and heal number the engine reports goes through this.
pub fn round_to_precision(value: f32, precision: u32) -> f32 {
    let factor = 10f64.powi(precision as i32);
    ((value as f64 * factor).round() / factor) as f32
}

/// Result of a damage calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageBreakdown {
    pub base: f32,
    /// Product of every damage type's multiplier
    pub type_multiplier: f32,
    /// Product of every co-occurring pair's synergy bonus
    pub synergy_multiplier: f32,
    pub falloff: f32,
    /// Rounded, never negative
    pub final_damage: f32,
}

/// Turns a base number and a tag set into final damage
#[derive(Debug, Clone, Copy)]
pub struct DamageCalculator<'r> {
    registry: &'r TagRegistry,
    precision: u32,
}

impl<'r> DamageCalculator<'r> {
    pub fn new(registry: &'r TagRegistry, precision: u32) -> Self {
        Self {
            registry,
            precision,
        }
    }

    /// Product of `damage_multiplier` over the damage type tags present
    pub fn type_multiplier(&self, tags: &TagSet, overrides: &Params) -> f32 {
        tags.iter()
            .filter_map(|tag| self.registry.get(tag.as_str()))
            .filter(|def| def.behavior == TagBehavior::DamageType)
            .map(|def| {
                Params::resolve_for_tag(&def.default_params, def.id.as_str(), overrides)
                    .get_or("damage_multiplier", 1.0)
                    .max(0.0)
            })
            .product()
    }

    /// Product of synergy bonuses, each unordered pair counted once
    pub fn synergy_multiplier(&self, tags: &TagSet) -> f32 {
        let tags = tags.as_slice();
        let mut multiplier = 1.0;
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                if let Some(bonus) = self.registry.synergy(a.as_str(), b.as_str()) {
                    multiplier *= bonus;
                }
            }
        }
        multiplier
    }

    pub fn compute(
        &self,
        base: f32,
        tags: &TagSet,
        overrides: &Params,
        falloff: f32,
    ) -> DamageBreakdown {
        let type_multiplier = self.type_multiplier(tags, overrides);
        let synergy_multiplier = self.synergy_multiplier(tags);
        let raw = base * type_multiplier * synergy_multiplier * falloff;
        DamageBreakdown {
            base,
            type_multiplier,
            synergy_multiplier,
            falloff,
            final_damage: self.round(raw.max(0.0)),
        }
    }

    /// Apply the engine's rounding rule
    pub fn round(&self, value: f32) -> f32 {
        round_to_precision(value, self.precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(ids: &[&str]) -> TagSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_plain_physical_is_exact() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let result = calc.compute(30.0, &tags(&["physical", "slashing", "single"]), &Params::new(), 1.0);
        assert_eq!(result.final_damage, 30.0);
        assert_eq!(result.synergy_multiplier, 1.0);
    }

    #[test]
    fn test_chain_falloff_values() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let set = tags(&["lightning", "chain"]);
        let expected = [70.0, 49.0, 34.3];
        for (k, want) in expected.iter().enumerate() {
            let falloff = 0.7f32.powi(k as i32);
            let got = calc.compute(70.0, &set, &Params::new(), falloff).final_damage;
            assert!((got - want).abs() < 1e-3, "hit {k}: {got} != {want}");
        }
    }

    #[test]
    fn test_synergy_counted_once_per_pair() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let result = calc.compute(100.0, &tags(&["burn", "fire"]), &Params::new(), 1.0);
        assert!((result.synergy_multiplier - 1.1).abs() < 1e-6);
        assert!((result.final_damage - 110.0).abs() < 1e-3);
    }

    #[test]
    fn test_multipliers_compose() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let overrides = Params::new().with("fire.damage_multiplier", 2.0);
        let result = calc.compute(10.0, &tags(&["fire", "chaos"]), &overrides, 1.0);
        assert!((result.type_multiplier - 2.4).abs() < 1e-5);
        assert!((result.final_damage - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_never_negative() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let result = calc.compute(-5.0, &tags(&["physical"]), &Params::new(), 1.0);
        assert_eq!(result.final_damage, 0.0);
    }

    #[test]
    fn test_unknown_tags_ignored() {
        let registry = TagRegistry::builtin();
        let calc = DamageCalculator::new(&registry, 2);
        let result = calc.compute(12.0, &tags(&["mystery", "physical"]), &Params::new(), 1.0);
        assert_eq!(result.final_damage, 12.0);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to_precision(2.5, 0), 3.0);
        assert_eq!(round_to_precision(-2.5, 0), -3.0);
        assert!((round_to_precision(34.299_999, 2) - 34.3).abs() < 1e-5);
        assert!((round_to_precision(1.005, 1) - 1.0).abs() < 1e-5);
    }
}
