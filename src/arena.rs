//! Demo arena: one hero with a skill rotation and trigger items against a
//! ring of melee foes.

use glam::Vec2;
use sigil_combat::{
    ActionOutcome, CombatSession, Combatant, EffectRequest, EquippedSource, ItemId, OwnerRef,
    SkillId, TargetSpec, TriggerAim, TriggerKind, TriggerPass, TriggerSpec,
};
use sigil_core::EntityId;
use tracing::{debug, info, warn};

use crate::settings::ArenaSettings;

const HERO_TEAM: u32 = 0;
const FOE_TEAM: u32 = 1;
const FOE_REACH: f32 = 1.5;
const FOE_ATTACK_COOLDOWN: f32 = 1.5;

/// How a skill picks its aim
#[derive(Debug, Clone, Copy)]
enum Aim {
    NearestFoe,
    NearestFoePosition,
    Caster,
}

struct Skill {
    name: &'static str,
    tags: &'static [&'static str],
    base_damage: f32,
    cooldown: f32,
    range: f32,
    aim: Aim,
    crit_chance: f32,
    ready_in: f32,
}

impl Skill {
    fn new(name: &'static str, tags: &'static [&'static str], base_damage: f32, cooldown: f32) -> Self {
        Self {
            name,
            tags,
            base_damage,
            cooldown,
            range: 6.0,
            aim: Aim::NearestFoe,
            crit_chance: 0.0,
            ready_in: 0.0,
        }
    }

    fn range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    fn aim(mut self, aim: Aim) -> Self {
        self.aim = aim;
        self
    }

    fn crit_chance(mut self, chance: f32) -> Self {
        self.crit_chance = chance;
        self
    }
}

struct Foe {
    id: EntityId,
    attack_ready_in: f32,
}

/// Running totals for the final summary
#[derive(Debug, Clone, Default)]
pub struct ArenaStats {
    pub casts: u32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub kills: u32,
    pub triggers_fired: u32,
    pub diagnostics: u32,
}

pub struct Arena {
    hero: EntityId,
    foes: Vec<Foe>,
    skills: Vec<Skill>,
    foe_damage: f32,
    foe_speed: f32,
    pub stats: ArenaStats,
}

impl Arena {
    /// Spawn the hero, equip its items and ring it with foes
    pub fn populate(session: &mut CombatSession, settings: &ArenaSettings) -> Self {
        let hero = session.spawn(Combatant::new("hero", HERO_TEAM, Vec2::ZERO, settings.hero_health));

        for source in hero_equipment() {
            for diagnostic in session.equip(hero, &source) {
                warn!("Equip: {}", diagnostic);
            }
        }

        let count = settings.foes.max(1);
        let foes = (0..settings.foes)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                let position = Vec2::from_angle(angle) * settings.spawn_radius;
                let id = session.spawn(
                    Combatant::new(format!("ghoul{i}"), FOE_TEAM, position, settings.foe_health)
                        .facing(-position),
                );
                Foe {
                    id,
                    attack_ready_in: FOE_ATTACK_COOLDOWN,
                }
            })
            .collect();

        let skills = vec![
            Skill::new("Strike", &["physical", "slashing", "single", "lifesteal"], 9.0, 0.8)
                .range(FOE_REACH + 0.5)
                .crit_chance(0.2),
            Skill::new("Chain Lightning", &["lightning", "chain"], 28.0, 3.0).crit_chance(0.25),
            Skill::new("Fireball", &["fire", "circle", "burn"], 16.0, 4.0)
                .aim(Aim::NearestFoePosition)
                .range(8.0),
            Skill::new("Frost Cone", &["frost", "cone", "chill"], 12.0, 5.0).range(4.0),
            Skill::new("Piercing Shot", &["piercing", "pierce", "bleed"], 18.0, 2.5).range(10.0),
            Skill::new("Renew", &["regeneration", "shield"], 0.0, 12.0).aim(Aim::Caster),
        ];

        info!("Arena ready: hero {} against {} foes", hero, settings.foes);
        Self {
            hero,
            foes,
            skills,
            foe_damage: settings.foe_damage,
            foe_speed: settings.foe_speed,
            stats: ArenaStats::default(),
        }
    }

    pub fn hero(&self) -> EntityId {
        self.hero
    }

    /// Finished when either side is wiped out
    pub fn is_over(&self, session: &CombatSession) -> bool {
        let world = session.world();
        !world.is_alive(self.hero) || self.foes.iter().all(|f| !world.is_alive(f.id))
    }

    pub fn foes_alive(&self, session: &CombatSession) -> usize {
        self.foes
            .iter()
            .filter(|f| session.world().is_alive(f.id))
            .count()
    }

    /// One fixed simulation step
    pub fn step(&mut self, session: &mut CombatSession, dt: f32) {
        let frame = session.update(dt);
        for death in &frame.tick.deaths {
            info!("{} succumbed to {}", death.entity, death.status);
            self.stats.kills += 1;
        }
        self.record_triggers(&frame.triggered);

        self.move_foes(session, dt);
        self.foes_attack(session, dt);
        self.hero_acts(session, dt);
    }

    fn nearest_foe(&self, session: &CombatSession) -> Option<(EntityId, f32)> {
        let world = session.world();
        let origin = world.get(self.hero)?.position();
        self.foes
            .iter()
            .filter_map(|f| {
                let foe = world.get(f.id).filter(|c| c.is_alive())?;
                Some((f.id, foe.position().distance(origin)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn move_foes(&self, session: &mut CombatSession, dt: f32) {
        let Some(hero_position) = session.world().get(self.hero).map(|c| c.position()) else {
            return;
        };
        for foe in &self.foes {
            let Some(combatant) = session.world_mut().get_mut(foe.id) else {
                continue;
            };
            if !combatant.is_alive() || combatant.statuses.is_immobilized() {
                continue;
            }
            let offset = hero_position - combatant.position();
            if offset.length() <= FOE_REACH {
                continue;
            }
            let speed = self.foe_speed * combatant.statuses.speed_multiplier();
            let step = offset.normalize_or_zero() * (speed * dt).min(offset.length() - FOE_REACH);
            combatant.transform.translate(step);
            combatant.transform.face_towards(hero_position);
        }
    }

    fn foes_attack(&mut self, session: &mut CombatSession, dt: f32) {
        let hero = self.hero;
        for i in 0..self.foes.len() {
            self.foes[i].attack_ready_in -= dt;
            let id = self.foes[i].id;
            let in_reach = {
                let world = session.world();
                match (world.get(id), world.get(hero)) {
                    (Some(foe), Some(target)) => {
                        foe.is_alive()
                            && foe.statuses.can_act()
                            && foe.position().distance(target.position()) <= FOE_REACH
                    }
                    _ => false,
                }
            };
            if !in_reach || self.foes[i].attack_ready_in > 0.0 {
                continue;
            }
            self.foes[i].attack_ready_in = FOE_ATTACK_COOLDOWN;
            let request = EffectRequest::new(id, TargetSpec::Entity(hero))
                .with_tags(["physical", "crushing", "single"])
                .with_base_damage(self.foe_damage);
            let outcome = session.perform(&request);
            self.stats.damage_taken += outcome.report.total_damage();
            self.record(&outcome);
        }
    }

    fn hero_acts(&mut self, session: &mut CombatSession, dt: f32) {
        for skill in &mut self.skills {
            skill.ready_in = (skill.ready_in - dt).max(0.0);
        }

        let Some(hero) = session.world().get(self.hero) else {
            return;
        };
        if !hero.is_alive() || !hero.statuses.can_act() || hero.statuses.is_silenced() {
            return;
        }
        let Some((nearest, distance)) = self.nearest_foe(session) else {
            return;
        };

        // First ready skill in rotation order
        let Some(index) = self
            .skills
            .iter()
            .position(|s| s.ready_in <= 0.0 && (matches!(s.aim, Aim::Caster) || distance <= s.range))
        else {
            return;
        };

        let skill = &mut self.skills[index];
        skill.ready_in = skill.cooldown;
        let foe_position = session.world().get(nearest).map(|c| c.position());
        let target = match (skill.aim, foe_position) {
            (Aim::Caster, _) => TargetSpec::Entity(self.hero),
            (Aim::NearestFoePosition, Some(position)) => TargetSpec::Point(position),
            _ => TargetSpec::Entity(nearest),
        };
        if let (Some(hero), Some(position)) = (session.world_mut().get_mut(self.hero), foe_position) {
            hero.transform.face_towards(position);
        }

        let request = EffectRequest::new(self.hero, target)
            .with_tags(skill.tags.iter().copied())
            .with_param("crit_chance", skill.crit_chance)
            .with_base_damage(skill.base_damage);
        let name = skill.name;
        let outcome = session.perform(&request);

        info!(
            "Hero casts {}: {} hits, {} damage{}",
            name,
            outcome.report.hits.len(),
            outcome.report.total_damage(),
            if outcome.report.crits().next().is_some() {
                " (crit)"
            } else {
                ""
            },
        );
        self.stats.casts += 1;
        self.stats.damage_dealt += outcome.report.total_damage();
        self.record(&outcome);
    }

    fn record(&mut self, outcome: &ActionOutcome) {
        for victim in outcome.report.kills() {
            info!("{} slain by {}", victim, outcome.report.source);
            self.stats.kills += 1;
        }
        for (target, status) in outcome.report.statuses_evicted() {
            debug!("{} lost {} to a conflicting status", target, status);
        }
        self.stats.diagnostics += outcome.report.diagnostics.len() as u32;
        self.record_triggers(&outcome.triggered);
    }

    fn record_triggers(&mut self, pass: &TriggerPass) {
        for (owner, kind) in &pass.fired {
            info!("Trigger {:?} fired from {:?}", kind, owner);
        }
        for report in &pass.reports {
            self.stats.damage_dealt += report.total_damage();
            self.stats.kills += report.kills().count() as u32;
        }
        self.stats.triggers_fired += pass.fired.len() as u32;
        self.stats.diagnostics += pass.diagnostics.len() as u32;
    }
}

fn hero_equipment() -> Vec<EquippedSource> {
    vec![
        EquippedSource {
            owner: OwnerRef::Item(ItemId(1)),
            tags: ["on_kill", "heal_on_kill"].into_iter().collect(),
            triggers: vec![TriggerSpec::new(
                TriggerKind::OnKill,
                ["heal_on_kill"],
                TriggerAim::Actor,
            )],
        },
        EquippedSource {
            owner: OwnerRef::Item(ItemId(2)),
            tags: ["on_crit", "lightning"].into_iter().collect(),
            triggers: vec![TriggerSpec::new(
                TriggerKind::OnCrit,
                ["lightning", "chain"],
                TriggerAim::Context,
            )
            .with_param("chain_count", 1.0)
            .with_base_damage(10.0)],
        },
        EquippedSource {
            owner: OwnerRef::Skill(SkillId(1)),
            tags: ["on_proximity", "lightning"].into_iter().collect(),
            triggers: vec![TriggerSpec::new(
                TriggerKind::OnProximity,
                ["lightning", "circle", "vulnerable"],
                TriggerAim::Actor,
            )
            .with_param("circle_radius", 2.0)
            .with_param("on_proximity.cooldown", 2.0)
            .with_base_damage(4.0)],
        },
    ]
}
