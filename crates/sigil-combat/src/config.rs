use serde::{Deserialize, Serialize};

/// Engine-level tuning that is not tied to any one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Seed for crit rolls. Same seed, same fight.
    pub rng_seed: u64,
    /// Decimal places every damage/heal number is rounded to
    pub damage_precision: u32,
    /// Longest trigger chain a single event may spawn
    pub max_trigger_depth: u32,
    /// Crit multiplier when no tag provides `crit_multiplier`
    pub default_crit_multiplier: f32,
    /// Proximity trigger range when no tag provides `proximity_range`
    pub proximity_range: f32,
    /// Whether area geometries hit the source's own team by default
    pub friendly_fire: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5EED,
            damage_precision: 2,
            max_trigger_depth: 8,
            default_crit_multiplier: 1.5,
            proximity_range: 3.0,
            friendly_fire: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CombatConfig::default();
        assert_eq!(config.damage_precision, 2);
        assert_eq!(config.max_trigger_depth, 8);
        assert!(!config.friendly_fire);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CombatConfig = serde_json::from_str(r#"{"rng_seed": 7}"#).unwrap();
        assert_eq!(config.rng_seed, 7);
        assert_eq!(config.default_crit_multiplier, 1.5);
    }
}
