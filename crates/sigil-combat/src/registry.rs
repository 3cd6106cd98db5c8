//! Tag registry: read-only lookup of every known tag
//!
//! Built once at startup, then shared as `Arc<TagRegistry>`. A process-wide
//! instance can be installed with [`install_global`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::catalog::{builtin_definitions, CatalogFile};
use crate::error::CatalogError;
use crate::tag::{StatusKind, TagBehavior, TagDefinition, TagId};

static GLOBAL_REGISTRY: OnceLock<Arc<TagRegistry>> = OnceLock::new();

/// Catalog of known tags
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<TagId, TagDefinition>,
    /// Registration order, for deterministic iteration
    order: Vec<TagId>,
}

impl TagRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tag set
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in builtin_definitions() {
            if let Err(e) = registry.register(def) {
                warn!("Skipping built-in tag: {}", e);
            }
        }
        registry
    }

    /// Build a registry from definitions. Fails on duplicate ids.
    pub fn from_definitions(
        defs: impl IntoIterator<Item = TagDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def)?;
        }
        registry.check_conflicts();
        Ok(registry)
    }

    /// Parse a JSON catalog document
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let defs = file
            .tags
            .into_iter()
            .map(|entry| entry.into_definition())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_definitions(defs)
    }

    /// Load a JSON catalog from disk
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(path.to_path_buf(), e))?;
        let registry = Self::from_json_str(&content)?;
        info!("Loaded {} tags from {:?}", registry.len(), path);
        Ok(registry)
    }

    fn register(&mut self, def: TagDefinition) -> Result<(), CatalogError> {
        if self.tags.contains_key(&def.id) {
            return Err(CatalogError::DuplicateTag(def.id));
        }
        self.order.push(def.id.clone());
        self.tags.insert(def.id.clone(), def);
        Ok(())
    }

    /// Conflicts naming unknown or non-status tags are kept but can never match
    fn check_conflicts(&self) {
        for def in self.iter() {
            for other in &def.conflicts {
                match self.get(other.as_str()) {
                    None => warn!("Tag '{}' conflicts with unknown tag '{}'", def.id, other),
                    Some(o) if o.status_kind().is_none() => {
                        warn!("Tag '{}' conflicts with non-status tag '{}'", def.id, other)
                    }
                    Some(_) => {}
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&TagDefinition> {
        self.tags.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tags.contains_key(id)
    }

    pub fn behavior(&self, id: &str) -> Option<TagBehavior> {
        self.get(id).map(|d| d.behavior)
    }

    /// Definition and behavior of a status tag
    pub fn status(&self, id: &str) -> Option<(&TagDefinition, StatusKind)> {
        let def = self.get(id)?;
        def.status_kind().map(|kind| (def, kind))
    }

    /// Synergy bonus for a co-occurring pair. `a`'s declaration wins over `b`'s.
    pub fn synergy(&self, a: &str, b: &str) -> Option<f32> {
        self.get(a)
            .and_then(|d| d.synergy_with(b))
            .or_else(|| self.get(b).and_then(|d| d.synergy_with(a)))
    }

    /// Whether two statuses are mutually exclusive. Declared on either side.
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        self.get(a).is_some_and(|d| d.conflicts.contains(b))
            || self.get(b).is_some_and(|d| d.conflicts.contains(a))
    }

    /// All definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TagDefinition> {
        self.order.iter().filter_map(|id| self.tags.get(id))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Install the process-wide registry. Only the first call succeeds.
pub fn install_global(registry: TagRegistry) -> Result<Arc<TagRegistry>, CatalogError> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(Arc::clone(&registry))
        .map_err(|_| CatalogError::AlreadyInstalled)?;
    Ok(registry)
}

/// The process-wide registry, defaulting to the built-in tag set
pub fn global() -> Arc<TagRegistry> {
    Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(TagRegistry::builtin())))
}
