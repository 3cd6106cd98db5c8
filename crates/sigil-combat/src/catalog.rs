//! Tag catalog: the built-in tag set and the JSON catalog format
//!
//! External catalogs are JSON documents of the form
//! `{ "tags": [ { "id": "burn", "category": "status", ... } ] }`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::params::Params;
use crate::tag::{
    GeometryKind, MechanicKind, StackingRule, StatusKind, TagBehavior, TagCategory,
    TagDefinition, TagId, TriggerKind,
};

/// A catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub tags: Vec<CatalogEntry>,
}

/// One tag row as authored in a catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: TagId,
    pub category: TagCategory,
    /// Behavior keyword; the id is used when absent
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_params: Params,
    #[serde(default)]
    pub synergy_bonuses: BTreeMap<TagId, f32>,
    #[serde(default)]
    pub conflicts: BTreeSet<TagId>,
    #[serde(default)]
    pub stacking: Option<StackingRule>,
    #[serde(default)]
    pub conflict_priority: i32,
}

impl CatalogEntry {
    /// Resolve the entry's behavior and validate its numbers
    pub fn into_definition(self) -> Result<TagDefinition, CatalogError> {
        let keyword = self.behavior.as_deref().unwrap_or(self.id.as_str());
        let behavior = TagBehavior::resolve(self.category, keyword).ok_or_else(|| {
            CatalogError::UnknownBehavior {
                id: self.id.clone(),
                category: self.category,
                keyword: keyword.to_string(),
            }
        })?;

        for (key, value) in self.default_params.iter() {
            if !value.is_finite() {
                return Err(CatalogError::InvalidParam {
                    tag: self.id.clone(),
                    key: key.to_string(),
                    value,
                });
            }
        }
        for (other, bonus) in &self.synergy_bonuses {
            if !bonus.is_finite() || *bonus < 0.0 {
                return Err(CatalogError::InvalidParam {
                    tag: self.id.clone(),
                    key: format!("synergy.{other}"),
                    value: *bonus,
                });
            }
        }

        let mut def = TagDefinition::new(self.id, behavior)
            .with_conflict_priority(self.conflict_priority)
            .with_description(&self.description);
        def.default_params = self.default_params;
        def.synergy_bonuses = self.synergy_bonuses;
        def.conflicts = self.conflicts;
        if let Some(stacking) = self.stacking {
            def.stacking = stacking;
        }
        Ok(def)
    }
}

fn damage_type(id: &str, multiplier: f32) -> TagDefinition {
    TagDefinition::new(id, TagBehavior::DamageType).with_param("damage_multiplier", multiplier)
}

fn geometry(id: &str, kind: GeometryKind) -> TagDefinition {
    TagDefinition::new(id, TagBehavior::Geometry(kind))
}

fn status(id: &str, kind: StatusKind, duration: f32) -> TagDefinition {
    TagDefinition::new(id, TagBehavior::Status(kind))
        .with_param("duration", duration)
        .with_param("max_stacks", 1.0)
}

fn mechanic(id: &str, kind: MechanicKind) -> TagDefinition {
    TagDefinition::new(id, TagBehavior::Mechanic(kind))
}

fn trigger(id: &str, kind: TriggerKind) -> TagDefinition {
    TagDefinition::new(id, TagBehavior::Trigger(kind))
}

/// The tags every registry starts from unless a catalog replaces them
pub fn builtin_definitions() -> Vec<TagDefinition> {
    vec![
        // Damage types
        damage_type("physical", 1.0),
        damage_type("slashing", 1.0),
        damage_type("piercing", 1.0),
        damage_type("crushing", 1.0),
        damage_type("fire", 1.0).with_synergy("burn", 1.1),
        damage_type("frost", 1.0).with_synergy("freeze", 1.1),
        damage_type("lightning", 1.0),
        damage_type("toxic", 1.0).with_synergy("poison", 1.15),
        damage_type("arcane", 1.0),
        damage_type("holy", 1.0),
        damage_type("shadow", 1.0),
        damage_type("chaos", 1.2),
        // Geometry
        geometry("single", GeometryKind::Single),
        geometry("circle", GeometryKind::Circle).with_param("circle_radius", 3.0),
        geometry("cone", GeometryKind::Cone)
            .with_param("cone_range", 5.0)
            .with_param("cone_angle", 90.0),
        geometry("chain", GeometryKind::Chain)
            .with_param("chain_range", 5.0)
            .with_param("chain_count", 2.0)
            .with_param("chain_falloff", 0.3),
        geometry("beam", GeometryKind::Beam)
            .with_param("beam_range", 10.0)
            .with_param("beam_width", 1.0)
            .with_param("pierce_falloff", 0.2),
        geometry("pierce", GeometryKind::Pierce)
            .with_param("pierce_range", 12.0)
            .with_param("pierce_width", 0.6)
            .with_param("pierce_count", 3.0)
            .with_param("pierce_falloff", 0.2),
        // Statuses
        status("burn", StatusKind::DamageOverTime, 5.0)
            .with_param("damage_per_second", 8.0)
            .with_param("tick_interval", 1.0)
            .with_param("max_stacks", 5.0),
        status("poison", StatusKind::DamageOverTime, 8.0)
            .with_param("damage_per_second", 4.0)
            .with_param("tick_interval", 1.0)
            .with_param("max_stacks", 10.0),
        status("bleed", StatusKind::DamageOverTime, 4.0)
            .with_param("damage_per_second", 5.0)
            .with_param("tick_interval", 0.5)
            .with_param("max_stacks", 5.0),
        status("regeneration", StatusKind::HealOverTime, 6.0)
            .with_param("heal_per_second", 5.0)
            .with_param("tick_interval", 1.0)
            .with_param("max_stacks", 3.0),
        status("freeze", StatusKind::Freeze, 2.0)
            .with_conflict("burn")
            .with_conflict_priority(1),
        status("chill", StatusKind::Slow, 4.0)
            .with_param("slow_amount", 0.3)
            .with_conflict("burn"),
        status("stun", StatusKind::Stun, 1.5),
        status("root", StatusKind::Root, 3.0),
        status("silence", StatusKind::Silence, 3.0),
        status("slow", StatusKind::Slow, 3.0)
            .with_param("slow_amount", 0.4)
            .with_conflict("haste"),
        status("haste", StatusKind::Haste, 5.0).with_param("haste_amount", 0.3),
        status("weaken", StatusKind::Weaken, 5.0)
            .with_param("damage_dealt_bonus", -0.25)
            .with_conflict("empower"),
        status("empower", StatusKind::Empower, 5.0).with_param("damage_dealt_bonus", 0.3),
        status("vulnerable", StatusKind::Vulnerable, 5.0).with_param("damage_taken_bonus", 0.25),
        status("shield", StatusKind::Shield, 10.0).with_param("shield_amount", 30.0),
        status("mark", StatusKind::Marker, 10.0),
        // Mechanics
        mechanic("heal", MechanicKind::Heal).with_param("heal_amount", 20.0),
        mechanic("heal_on_kill", MechanicKind::Heal).with_param("heal_amount", 15.0),
        mechanic("lifesteal", MechanicKind::Lifesteal).with_param("lifesteal_fraction", 0.2),
        mechanic("knockback", MechanicKind::Knockback).with_param("knockback_distance", 2.0),
        mechanic("cleanse", MechanicKind::Cleanse),
        // Triggers
        trigger("on_kill", TriggerKind::OnKill),
        trigger("on_crit", TriggerKind::OnCrit),
        trigger("on_proximity", TriggerKind::OnProximity)
            .with_param("proximity_range", 3.0)
            .with_param("cooldown", 1.0),
        // Equipment requirements
        TagDefinition::new("requires_melee", TagBehavior::EquipmentRequirement),
        TagDefinition::new("requires_ranged", TagBehavior::EquipmentRequirement),
        TagDefinition::new("requires_focus", TagBehavior::EquipmentRequirement),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_unique() {
        let defs = builtin_definitions();
        let ids: BTreeSet<&str> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), defs.len());
    }

    #[test]
    fn test_builtin_conflicts_reference_statuses() {
        let defs = builtin_definitions();
        for def in &defs {
            for other in &def.conflicts {
                let target = defs.iter().find(|d| &d.id == other);
                assert!(
                    target.is_some_and(|t| t.status_kind().is_some()),
                    "{} conflicts with non-status {}",
                    def.id,
                    other
                );
            }
        }
    }

    #[test]
    fn test_entry_uses_behavior_keyword() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{
                "id": "ignite",
                "category": "status",
                "behavior": "damage_over_time",
                "default_params": { "damage_per_second": 12.0 }
            }"#,
        )
        .unwrap();
        let def = entry.into_definition().unwrap();
        assert_eq!(def.status_kind(), Some(StatusKind::DamageOverTime));
        assert_eq!(def.stacking, StackingRule::Additive);
        assert_eq!(def.default_params.get("damage_per_second"), Some(12.0));
    }

    #[test]
    fn test_entry_unknown_behavior_rejected() {
        let entry: CatalogEntry =
            serde_json::from_str(r#"{ "id": "spiral", "category": "geometry" }"#).unwrap();
        assert!(matches!(
            entry.into_definition(),
            Err(CatalogError::UnknownBehavior { .. })
        ));
    }

    #[test]
    fn test_entry_negative_synergy_rejected() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{ "id": "fire", "category": "damage_type", "synergy_bonuses": { "burn": -1.0 } }"#,
        )
        .unwrap();
        assert!(matches!(
            entry.into_definition(),
            Err(CatalogError::InvalidParam { .. })
        ));
    }
}
