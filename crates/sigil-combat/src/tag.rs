//! Tags and their behaviors
//!
//! A tag id is an opaque string, but every registered tag resolves once, at
//! registration time, to a closed [`TagBehavior`]. Everything downstream
//! matches on that enum rather than on strings.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::Params;

/// Unique tag identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TagId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TagId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Broad category a tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    DamageType,
    Geometry,
    Status,
    Mechanic,
    EquipmentRequirement,
    Trigger,
}

/// Targeting shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Single,
    Circle,
    Cone,
    Chain,
    Beam,
    Pierce,
}

impl GeometryKind {
    /// Selection priority when several geometry tags are present (higher wins)
    pub fn priority(self) -> u8 {
        match self {
            Self::Beam => 5,
            Self::Chain => 4,
            Self::Cone => 3,
            Self::Circle => 2,
            Self::Pierce => 1,
            Self::Single => 0,
        }
    }

    /// Whether hits after the first lose damage
    pub fn has_falloff(self) -> bool {
        matches!(self, Self::Chain | Self::Beam | Self::Pierce)
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "single" | "single_target" => Self::Single,
            "circle" | "aoe" | "area" => Self::Circle,
            "cone" => Self::Cone,
            "chain" => Self::Chain,
            "beam" => Self::Beam,
            "pierce" | "projectile" => Self::Pierce,
            _ => return None,
        })
    }
}

/// Status behaviors. Several catalog tags may share one behavior
/// (burn, poison and bleed are all damage over time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    DamageOverTime,
    HealOverTime,
    Stun,
    Freeze,
    Root,
    Silence,
    Slow,
    Haste,
    Weaken,
    Empower,
    Vulnerable,
    Shield,
    Marker,
}

impl StatusKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "damage_over_time" | "burn" | "poison" | "bleed" => Self::DamageOverTime,
            "heal_over_time" | "regeneration" | "regen" => Self::HealOverTime,
            "stun" => Self::Stun,
            "freeze" => Self::Freeze,
            "root" => Self::Root,
            "silence" => Self::Silence,
            "slow" | "chill" => Self::Slow,
            "haste" => Self::Haste,
            "weaken" => Self::Weaken,
            "empower" => Self::Empower,
            "vulnerable" => Self::Vulnerable,
            "shield" => Self::Shield,
            "marker" | "mark" => Self::Marker,
            _ => return None,
        })
    }

    /// Harmful statuses, removed by cleanses
    pub fn is_debuff(self) -> bool {
        matches!(
            self,
            Self::DamageOverTime
                | Self::Stun
                | Self::Freeze
                | Self::Root
                | Self::Silence
                | Self::Slow
                | Self::Weaken
                | Self::Vulnerable
        )
    }

    /// Whether this status runs periodic ticks
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::DamageOverTime | Self::HealOverTime)
    }

    pub fn prevents_movement(self) -> bool {
        matches!(self, Self::Stun | Self::Freeze | Self::Root)
    }

    pub fn prevents_skills(self) -> bool {
        matches!(self, Self::Stun | Self::Freeze | Self::Silence)
    }

    pub fn prevents_attacks(self) -> bool {
        matches!(self, Self::Stun | Self::Freeze)
    }

    /// Stacking rule used when the catalog does not name one
    pub fn default_stacking(self) -> StackingRule {
        match self {
            Self::DamageOverTime | Self::HealOverTime => StackingRule::Additive,
            Self::Shield => StackingRule::Replace,
            _ => StackingRule::RefreshOnly,
        }
    }
}

/// Instant side effects carried by a request besides damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanicKind {
    Heal,
    Lifesteal,
    Knockback,
    Cleanse,
}

impl MechanicKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "heal" | "heal_on_kill" => Self::Heal,
            "lifesteal" | "life_steal" => Self::Lifesteal,
            "knockback" => Self::Knockback,
            "cleanse" | "purify" => Self::Cleanse,
            _ => return None,
        })
    }
}

/// Combat events an equipped item or skill can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    OnKill,
    OnCrit,
    OnProximity,
}

impl TriggerKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "on_kill" => Self::OnKill,
            "on_crit" => Self::OnCrit,
            "on_proximity" | "proximity" => Self::OnProximity,
            _ => return None,
        })
    }
}

/// What a registered tag does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagBehavior {
    DamageType,
    Geometry(GeometryKind),
    Status(StatusKind),
    Mechanic(MechanicKind),
    Trigger(TriggerKind),
    EquipmentRequirement,
}

impl TagBehavior {
    /// Resolve a category + behavior keyword into a behavior.
    ///
    /// This is the only place tag strings are interpreted.
    pub fn resolve(category: TagCategory, keyword: &str) -> Option<Self> {
        match category {
            TagCategory::DamageType => Some(Self::DamageType),
            TagCategory::EquipmentRequirement => Some(Self::EquipmentRequirement),
            TagCategory::Geometry => GeometryKind::from_keyword(keyword).map(Self::Geometry),
            TagCategory::Status => StatusKind::from_keyword(keyword).map(Self::Status),
            TagCategory::Mechanic => MechanicKind::from_keyword(keyword).map(Self::Mechanic),
            TagCategory::Trigger => TriggerKind::from_keyword(keyword).map(Self::Trigger),
        }
    }

    pub fn category(self) -> TagCategory {
        match self {
            Self::DamageType => TagCategory::DamageType,
            Self::Geometry(_) => TagCategory::Geometry,
            Self::Status(_) => TagCategory::Status,
            Self::Mechanic(_) => TagCategory::Mechanic,
            Self::Trigger(_) => TagCategory::Trigger,
            Self::EquipmentRequirement => TagCategory::EquipmentRequirement,
        }
    }
}

/// What happens when a status is reapplied while active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingRule {
    /// Remove the running instance and start a fresh one
    Replace,
    /// Add a stack (up to max) and reset the duration
    Additive,
    /// Reset the duration, keep the stack count
    RefreshOnly,
}

/// An immutable registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct TagDefinition {
    pub id: TagId,
    pub category: TagCategory,
    pub behavior: TagBehavior,
    pub default_params: Params,
    /// Co-occurring tag id → multiplicative damage bonus
    pub synergy_bonuses: BTreeMap<TagId, f32>,
    /// Statuses that may not be active alongside this one
    pub conflicts: BTreeSet<TagId>,
    pub stacking: StackingRule,
    /// Higher priority wins a conflict; ties go to the newcomer
    pub conflict_priority: i32,
    pub description: String,
}

impl TagDefinition {
    /// Build a definition with defaults derived from the behavior
    pub fn new(id: impl Into<TagId>, behavior: TagBehavior) -> Self {
        let stacking = match behavior {
            TagBehavior::Status(kind) => kind.default_stacking(),
            _ => StackingRule::RefreshOnly,
        };
        Self {
            id: id.into(),
            category: behavior.category(),
            behavior,
            default_params: Params::new(),
            synergy_bonuses: BTreeMap::new(),
            conflicts: BTreeSet::new(),
            stacking,
            conflict_priority: 0,
            description: String::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: f32) -> Self {
        self.default_params.set(key, value);
        self
    }

    pub fn with_synergy(mut self, other: &str, bonus: f32) -> Self {
        self.synergy_bonuses.insert(TagId::from(other), bonus);
        self
    }

    pub fn with_conflict(mut self, other: &str) -> Self {
        self.conflicts.insert(TagId::from(other));
        self
    }

    pub fn with_stacking(mut self, stacking: StackingRule) -> Self {
        self.stacking = stacking;
        self
    }

    pub fn with_conflict_priority(mut self, priority: i32) -> Self {
        self.conflict_priority = priority;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// The status behavior, if this is a status tag
    pub fn status_kind(&self) -> Option<StatusKind> {
        match self.behavior {
            TagBehavior::Status(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn synergy_with(&self, other: &str) -> Option<f32> {
        self.synergy_bonuses.get(other).copied()
    }
}

/// An ordered set of unique tag ids. Duplicates collapse onto the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TagId>", into = "Vec<TagId>")]
pub struct TagSet(Vec<TagId>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag. Returns `false` if it was already present.
    pub fn insert(&mut self, tag: impl Into<TagId>) -> bool {
        let tag = tag.into();
        if self.contains(tag.as_str()) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.as_str() == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[TagId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<TagId>> FromIterator<T> for TagSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl From<Vec<TagId>> for TagSet {
    fn from(tags: Vec<TagId>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for Vec<TagId> {
    fn from(set: TagSet) -> Self {
        set.0
    }
}
