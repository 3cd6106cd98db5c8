//! Sigil - tag-driven combat sandbox
//!
//! Runs a headless arena fight on a fixed timestep and logs what every skill,
//! status and trigger did.

mod arena;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sigil_combat::{install_global, CombatSession, TagRegistry};
use sigil_core::GameTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena::Arena;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about = "Headless tag-driven combat arena")]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON tag catalog replacing the built-in tags
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// RNG seed for crit rolls
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds to run
    #[arg(long)]
    duration: Option<f32>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    write_config: bool,
}

fn load_registry(settings: &Settings) -> Result<Arc<TagRegistry>> {
    let registry = match &settings.catalog {
        Some(path) => TagRegistry::from_json_file(path)
            .with_context(|| format!("Failed to load tag catalog {:?}", path))?,
        None => TagRegistry::builtin(),
    };
    install_global(registry).context("Failed to install tag registry")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    info!("Starting Sigil arena");

    let mut settings = Settings::load(args.config.as_deref());
    if let Some(catalog) = args.catalog {
        settings.catalog = Some(catalog);
    }
    if let Some(seed) = args.seed {
        settings.combat.rng_seed = seed;
    }
    if let Some(duration) = args.duration {
        settings.arena.duration = duration;
    }
    if args.write_config {
        settings
            .save(args.config.as_deref())
            .context("Failed to write settings")?;
    }

    let registry = load_registry(&settings)?;
    let mut session = CombatSession::new(registry, settings.combat.clone());
    let mut arena = Arena::populate(&mut session, &settings.arena);
    let mut time = GameTime::new(settings.time.clone()).context("Invalid time settings")?;
    let step = time.config.fixed_timestep;

    while time.total_time < settings.arena.duration as f64 && !arena.is_over(&session) {
        time.update(settings.arena.frame_delta);
        for _ in 0..time.fixed_steps() {
            arena.step(&mut session, step);
            if arena.is_over(&session) {
                break;
            }
        }
    }

    let hero_health = session
        .world()
        .get(arena.hero())
        .map_or(0.0, |hero| hero.vitals.health);
    if hero_health <= 0.0 {
        warn!("Hero fell after {:.1}s", time.total_time);
    } else if arena.foes_alive(&session) == 0 {
        info!("Arena cleared in {:.1}s", time.total_time);
    } else {
        info!("Time up with {} foes standing", arena.foes_alive(&session));
    }

    let stats = &arena.stats;
    info!(
        "Casts: {}, dealt: {:.1}, taken: {:.1}, kills: {}, triggers: {}, diagnostics: {}, hero hp: {:.1}",
        stats.casts,
        stats.damage_dealt,
        stats.damage_taken,
        stats.kills,
        stats.triggers_fired,
        stats.diagnostics,
        hero_health,
    );

    Ok(())
}
