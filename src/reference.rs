//! Static reference tables: effect remaps, per-profession mode multipliers and
//! the meta policy profiles.
//!
//! Built once (either [`ReferenceData::default`] or loaded from JSON) and then
//! handed by reference to everything that needs it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::capability::{CapabilityVector, Dimension};
use crate::model::condition::{Archetype, BuildBounds, HardTargets, ProfileKind, Weights};
use crate::model::entity::{GameMode, Profession, TraitId};

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub boon: Dimension,
    /// Stacks for intensity boons (might); ignored for duration boons.
    #[serde(default = "one")]
    pub magnitude: f64,
    pub uptime: f64,
}

impl EffectDescriptor {
    pub fn new(boon: Dimension, magnitude: f64, uptime: f64) -> EffectDescriptor {
        EffectDescriptor { boon, magnitude, uptime }
    }

    /// Amount added to the boon's dimension.
    pub fn contribution(&self) -> f64 {
        match self.boon {
            Dimension::Might => self.magnitude * self.uptime,
            _ => self.uptime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectRemap {
    pub trait_id: TraitId,
    pub pve: EffectDescriptor,
    pub wvw: EffectDescriptor,
}

impl EffectRemap {
    pub fn for_mode(&self, mode: GameMode) -> &EffectDescriptor {
        match mode {
            GameMode::Pve => &self.pve,
            GameMode::Wvw => &self.wvw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeMultiplier {
    #[serde(default = "one")]
    pub damage: f64,
    #[serde(default = "one")]
    pub healing: f64,
    #[serde(default = "one")]
    pub survivability: f64,
}

impl Default for ModeMultiplier {
    fn default() -> Self {
        ModeMultiplier { damage: 1.0, healing: 1.0, survivability: 1.0 }
    }
}

impl ModeMultiplier {
    pub fn apply(&self, vector: &mut CapabilityVector) {
        vector.dps *= self.damage;
        vector.sustain *= self.healing;
        vector.protection *= self.survivability;
        vector.resistance *= self.survivability;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfessionMultiplier {
    pub profession: Profession,
    pub mode: GameMode,
    #[serde(flatten)]
    pub multiplier: ModeMultiplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeThresholds {
    pub sustain: f64,
    pub burst: f64,
}

impl Default for ArchetypeThresholds {
    fn default() -> Self {
        ArchetypeThresholds { sustain: 0.5, burst: 0.7 }
    }
}

impl ArchetypeThresholds {
    pub fn matches(&self, archetype: Archetype, vector: &CapabilityVector) -> bool {
        match archetype {
            Archetype::Sustain => vector.sustain >= self.sustain,
            Archetype::Burst => vector.dps >= self.burst,
        }
    }
}

/// One meta profile. Quota profiles fill `composition` against
/// `reference_size`; the self-sufficient profile leaves it empty and uses the
/// structural fields instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileTable {
    pub reference_size: usize,
    pub composition: BTreeMap<String, BuildBounds>,
    pub targets: HardTargets,
    pub weights: Weights,
    pub max_duplicate: Option<usize>,
    pub min_archetypes: BTreeMap<Archetype, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTables {
    pub mass_battle_min_size: usize,
    pub skirmish_min_size: usize,
    pub mass_battle: ProfileTable,
    pub skirmish: ProfileTable,
    pub self_sufficient: ProfileTable,
}

impl PolicyTables {
    pub fn profile_kind(&self, squad_size: usize) -> ProfileKind {
        if squad_size >= self.mass_battle_min_size {
            ProfileKind::MassBattle
        } else if squad_size >= self.skirmish_min_size {
            ProfileKind::Skirmish
        } else {
            ProfileKind::SelfSufficient
        }
    }

    pub fn profile(&self, kind: ProfileKind) -> &ProfileTable {
        match kind {
            ProfileKind::MassBattle => &self.mass_battle,
            ProfileKind::Skirmish => &self.skirmish,
            ProfileKind::SelfSufficient => &self.self_sufficient,
        }
    }
}

fn bounds(min: usize, max: usize, per_subgroup_min: usize) -> BuildBounds {
    BuildBounds { min, max, per_subgroup_min }
}

fn weights(entries: [(Dimension, f64); 9]) -> Weights {
    Weights(
        entries
            .into_iter()
            .fold(CapabilityVector::default(), |acc, (dimension, value)| acc.with(dimension, value)),
    )
}

impl Default for PolicyTables {
    fn default() -> Self {
        use Dimension::*;

        let mass_battle = ProfileTable {
            reference_size: 50,
            composition: BTreeMap::from([
                ("quickness-firebrand".to_string(), bounds(8, 12, 1)),
                ("heal-scrapper".to_string(), bounds(5, 10, 1)),
                ("boon-herald".to_string(), bounds(4, 10, 0)),
                ("heal-tempest".to_string(), bounds(2, 6, 0)),
                ("power-scourge".to_string(), bounds(6, 14, 0)),
                ("power-spellbreaker".to_string(), bounds(3, 8, 0)),
            ]),
            targets: HardTargets {
                quickness: 0.9,
                resistance: 0.8,
                protection: 0.7,
                min_stability_sources: 2,
            },
            weights: weights([
                (Quickness, 10.0),
                (Alacrity, 6.0),
                (Stability, 10.0),
                (Resistance, 8.0),
                (Protection, 7.0),
                (Might, 4.0),
                (Fury, 3.0),
                (Dps, 3.0),
                (Sustain, 6.0),
            ]),
            max_duplicate: None,
            min_archetypes: BTreeMap::new(),
        };

        let skirmish = ProfileTable {
            reference_size: 15,
            composition: BTreeMap::from([
                ("quickness-firebrand".to_string(), bounds(3, 4, 1)),
                ("heal-scrapper".to_string(), bounds(2, 3, 0)),
                ("boon-herald".to_string(), bounds(1, 3, 0)),
                ("heal-tempest".to_string(), bounds(1, 2, 0)),
                ("power-scourge".to_string(), bounds(2, 4, 0)),
                ("power-spellbreaker".to_string(), bounds(1, 3, 0)),
            ]),
            targets: HardTargets {
                quickness: 0.8,
                resistance: 0.5,
                protection: 0.5,
                min_stability_sources: 1,
            },
            weights: weights([
                (Quickness, 8.0),
                (Alacrity, 7.0),
                (Stability, 6.0),
                (Resistance, 5.0),
                (Protection, 5.0),
                (Might, 5.0),
                (Fury, 4.0),
                (Dps, 7.0),
                (Sustain, 5.0),
            ]),
            max_duplicate: None,
            min_archetypes: BTreeMap::new(),
        };

        let self_sufficient = ProfileTable {
            reference_size: 5,
            composition: BTreeMap::new(),
            targets: HardTargets::default(),
            weights: weights([
                (Quickness, 5.0),
                (Alacrity, 5.0),
                (Stability, 3.0),
                (Resistance, 3.0),
                (Protection, 4.0),
                (Might, 4.0),
                (Fury, 4.0),
                (Dps, 9.0),
                (Sustain, 7.0),
            ]),
            max_duplicate: Some(2),
            min_archetypes: BTreeMap::from([(Archetype::Sustain, 1), (Archetype::Burst, 1)]),
        };

        PolicyTables {
            mass_battle_min_size: 25,
            skirmish_min_size: 10,
            mass_battle,
            skirmish,
            self_sufficient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub effect_remaps: Vec<EffectRemap>,
    #[serde(default)]
    pub profession_multipliers: Vec<ProfessionMultiplier>,
    #[serde(default)]
    pub archetypes: ArchetypeThresholds,
    #[serde(default)]
    pub policy: PolicyTables,
}

impl ReferenceData {
    pub fn from_json_str(json: &str) -> Result<ReferenceData> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<ReferenceData> {
        let text = fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded reference data from {:?}", path.as_ref());
        Self::from_json_str(&text)
    }

    pub fn remap(&self, trait_id: TraitId) -> Option<&EffectRemap> {
        self.effect_remaps.iter().find(|remap| remap.trait_id == trait_id)
    }

    /// Defaults to 1.0 everywhere for pairs the table does not list.
    pub fn multiplier(&self, profession: Profession, mode: GameMode) -> ModeMultiplier {
        self.profession_multipliers
            .iter()
            .find(|entry| entry.profession == profession && entry.mode == mode)
            .map(|entry| entry.multiplier)
            .unwrap_or_default()
    }
}

fn remap(trait_id: TraitId, pve: EffectDescriptor, wvw: EffectDescriptor) -> EffectRemap {
    EffectRemap { trait_id, pve, wvw }
}

fn multiplier(profession: Profession, mode: GameMode, damage: f64, healing: f64, survivability: f64) -> ProfessionMultiplier {
    ProfessionMultiplier {
        profession,
        mode,
        multiplier: ModeMultiplier { damage, healing, survivability },
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        use Dimension::*;
        let effect = EffectDescriptor::new;

        let effect_remaps = vec![
            remap(2075, effect(Quickness, 1.0, 0.45), effect(Quickness, 1.0, 0.30)),
            remap(2101, effect(Protection, 1.0, 0.20), effect(Stability, 2.0, 0.35)),
            remap(1917, effect(Quickness, 1.0, 0.50), effect(Protection, 1.0, 0.30)),
            remap(1899, effect(Fury, 1.0, 0.60), effect(Protection, 1.0, 0.35)),
            remap(2022, effect(Might, 5.0, 0.70), effect(Resistance, 1.0, 0.25)),
            remap(1987, effect(Alacrity, 1.0, 0.50), effect(Protection, 1.0, 0.25)),
            remap(2043, effect(Might, 3.0, 0.40), effect(Resistance, 1.0, 0.20)),
            remap(2112, effect(Alacrity, 1.0, 0.30), effect(Might, 4.0, 0.50)),
            remap(2055, effect(Might, 6.0, 0.60), effect(Stability, 1.0, 0.20)),
        ];

        let profession_multipliers = vec![
            multiplier(Profession::Guardian, GameMode::Wvw, 0.9, 1.0, 1.1),
            multiplier(Profession::Necromancer, GameMode::Wvw, 1.1, 1.0, 1.2),
            multiplier(Profession::Engineer, GameMode::Wvw, 1.0, 0.85, 1.0),
            multiplier(Profession::Revenant, GameMode::Pve, 1.05, 1.0, 1.0),
            multiplier(Profession::Warrior, GameMode::Wvw, 1.0, 1.0, 1.15),
            multiplier(Profession::Elementalist, GameMode::Wvw, 1.0, 0.9, 1.0),
        ];

        ReferenceData {
            effect_remaps,
            profession_multipliers,
            archetypes: ArchetypeThresholds::default(),
            policy: PolicyTables::default(),
        }
    }
}
