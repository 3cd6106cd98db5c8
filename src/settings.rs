//! Arena settings with persistence
//!
//! Settings are read from `--config <path>`, else `~/.config/sigil/settings.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sigil_combat::CombatConfig;
use sigil_core::TimeConfig;
use tracing::{info, warn};

/// All demo settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON tag catalog; the built-in tags are used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    pub combat: CombatConfig,
    pub time: TimeConfig,
    pub arena: ArenaSettings,
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sigil"))
    }

    /// Get the default settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from `path` (or the default location), falling back to
    /// defaults when missing or malformed
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::settings_path) else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to `path` (or the default location)
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<()> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::settings_path) else {
            anyhow::bail!("Could not determine config directory");
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Demo arena layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    /// Simulated seconds before the demo stops
    pub duration: f32,
    /// Real-time delta fed to the clock each frame
    pub frame_delta: f32,
    pub hero_health: f32,
    pub foes: u32,
    pub foe_health: f32,
    pub foe_damage: f32,
    /// Distance from the hero foes spawn at
    pub spawn_radius: f32,
    /// Foe walking speed in units per second
    pub foe_speed: f32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            duration: 30.0,
            frame_delta: 1.0 / 60.0,
            hero_health: 250.0,
            foes: 6,
            foe_health: 80.0,
            foe_damage: 6.0,
            spawn_radius: 7.0,
            foe_speed: 1.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [combat]
            rng_seed = 99

            [arena]
            foes = 2
            "#,
        )
        .unwrap();
        assert_eq!(settings.combat.rng_seed, 99);
        assert_eq!(settings.combat.damage_precision, 2);
        assert_eq!(settings.arena.foes, 2);
        assert_eq!(settings.arena.foe_health, 80.0);
        assert!(settings.catalog.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("sigil-settings-{}.toml", std::process::id()));
        let mut settings = Settings::default();
        settings.arena.duration = 5.0;
        settings.save(Some(&path)).unwrap();

        let loaded = Settings::load(Some(&path));
        assert_eq!(loaded.arena.duration, 5.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert_eq!(settings.arena.foes, ArenaSettings::default().foes);
    }
}
