use std::path::PathBuf;

use sigil_core::EntityId;

use crate::tag::{GeometryKind, TagCategory, TagId, TriggerKind};
use crate::trigger::OwnerRef;

/// Errors that can occur while loading a tag catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read tag catalog '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse tag catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate tag id '{0}'")]
    DuplicateTag(TagId),

    #[error("tag '{id}' names unknown {category:?} behavior '{keyword}'")]
    UnknownBehavior {
        id: TagId,
        category: TagCategory,
        keyword: String,
    },

    #[error("tag '{tag}' has invalid value {value} for '{key}'")]
    InvalidParam { tag: TagId, key: String, value: f32 },

    #[error("a global tag registry is already installed")]
    AlreadyInstalled,
}

/// Caller-visible failure of a status application.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusError {
    #[error("unknown status '{0}'")]
    UnknownStatus(TagId),

    #[error("tag '{0}' is not a status")]
    NotAStatus(TagId),

    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
}

/// Non-fatal conditions recorded while resolving effects.
///
/// These never abort a resolution; they are logged and attached to reports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("unknown tag '{0}' ignored")]
    UnknownTag(TagId),

    #[error("several geometry tags present, using {chosen:?} over {ignored:?}")]
    AmbiguousGeometry {
        chosen: GeometryKind,
        ignored: Vec<GeometryKind>,
    },

    #[error("target {0} is dead or missing")]
    InvalidTarget(EntityId),

    #[error("source {0} no longer exists")]
    MissingSource(EntityId),

    #[error("status '{status}' rejected on {target}: {reason}")]
    StatusRejected {
        target: EntityId,
        status: TagId,
        reason: StatusError,
    },

    #[error("{trigger:?} trigger of {owner:?} suppressed: already fired in this chain")]
    RecursiveTrigger { owner: OwnerRef, trigger: TriggerKind },

    #[error("trigger chain stopped at depth {0}")]
    TriggerDepthExceeded(u32),

    #[error("{owner:?} declares a {trigger:?} binding but carries no matching trigger tag")]
    UnboundTrigger { owner: OwnerRef, trigger: TriggerKind },
}
