//! Sigil Combat - Tag-driven effect resolution
//!
//! Weapons, skills and devices carry tags (damage types, a targeting
//! geometry, statuses, mechanics, triggers). This crate turns a tag set plus
//! numeric overrides into outcomes: who is hit, how hard, which statuses land,
//! and what equipped items do in response.
//!
//! Entry points are [`EffectExecutor::resolve`] for a single request and
//! [`CombatSession`] for a full loop with triggers.

pub mod catalog;
pub mod combatant;
pub mod config;
pub mod damage;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod params;
pub mod registry;
pub mod session;
pub mod status;
pub mod tag;
pub mod trigger;
pub mod world;

pub use catalog::{builtin_definitions, CatalogEntry, CatalogFile};
pub use combatant::{Combatant, Vitals};
pub use config::CombatConfig;
pub use damage::{round_to_precision, DamageBreakdown, DamageCalculator};
pub use error::{CatalogError, Diagnostic, StatusError};
pub use executor::{EffectExecutor, EffectRequest, HitRecord, ResolutionReport};
pub use geometry::{
    falloff_for_hit, select_geometry, GeometryResolution, GeometryResolver, GeometrySelection,
    ResolvedTarget, TargetSpec,
};
pub use params::Params;
pub use registry::{global, install_global, TagRegistry};
pub use session::{ActionOutcome, CombatSession, FrameOutcome};
pub use status::{ApplyOutcome, ApplyReport, StatusEffectInstance, StatusEffectManager, StatusEvent};
pub use tag::{
    GeometryKind, MechanicKind, StackingRule, StatusKind, TagBehavior, TagCategory, TagDefinition,
    TagId, TagSet, TriggerKind,
};
pub use trigger::{
    EquippedSource, ItemId, OwnerRef, SkillId, TriggerAim, TriggerBinding, TriggerEvent,
    TriggerLayer, TriggerPass, TriggerSpec,
};
pub use world::{CombatWorld, StatusDeath, WorldTick};
