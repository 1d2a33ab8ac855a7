pub mod entity {
    use serde::{Deserialize, Serialize};

    use super::capability::CapabilityVector;

    pub type PlayerId = String;
    pub type BuildId = String;
    /// Trait and skill ids share one id space in the effect remap table.
    pub type TraitId = u32;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum GameMode {
        Pve,
        Wvw,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Profession {
        Guardian,
        Warrior,
        Engineer,
        Ranger,
        Thief,
        Elementalist,
        Mesmer,
        Necromancer,
        Revenant,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Player {
        pub id: PlayerId,
        #[serde(default)]
        pub eligible_build_ids: Vec<BuildId>,
    }

    impl Player {
        pub fn new(id: impl Into<PlayerId>, eligible: &[&str]) -> Player {
            Player {
                id: id.into(),
                eligible_build_ids: eligible.iter().map(|b| b.to_string()).collect(),
            }
        }
    }

    /// A loadout a player can bring.
    ///
    /// `name` is the meta name quotas are written against ("quickness-firebrand"),
    /// several ids may share one name. `base` is the mode-agnostic contribution
    /// computed upstream from everything not covered by the effect remap table.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Build {
        pub id: BuildId,
        pub name: String,
        pub profession: Profession,
        #[serde(default)]
        pub traits: Vec<TraitId>,
        #[serde(default)]
        pub base: CapabilityVector,
    }
}


pub mod capability {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Dimension {
        Quickness,
        Alacrity,
        Stability,
        Resistance,
        Protection,
        Might,
        Fury,
        Dps,
        Sustain,
    }

    impl Dimension {
        pub const ALL: [Dimension; 9] = [
            Dimension::Quickness,
            Dimension::Alacrity,
            Dimension::Stability,
            Dimension::Resistance,
            Dimension::Protection,
            Dimension::Might,
            Dimension::Fury,
            Dimension::Dps,
            Dimension::Sustain,
        ];

        pub const BOONS: [Dimension; 7] = [
            Dimension::Quickness,
            Dimension::Alacrity,
            Dimension::Stability,
            Dimension::Resistance,
            Dimension::Protection,
            Dimension::Might,
            Dimension::Fury,
        ];

        pub fn index(self) -> usize {
            self as usize
        }

        pub fn is_boon(self) -> bool {
            !matches!(self, Dimension::Dps | Dimension::Sustain)
        }

        pub fn name(self) -> &'static str {
            match self {
                Dimension::Quickness => "quickness",
                Dimension::Alacrity => "alacrity",
                Dimension::Stability => "stability",
                Dimension::Resistance => "resistance",
                Dimension::Protection => "protection",
                Dimension::Might => "might",
                Dimension::Fury => "fury",
                Dimension::Dps => "dps",
                Dimension::Sustain => "sustain",
            }
        }
    }

    impl fmt::Display for Dimension {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    /// Per-build, per-mode scorecard.
    ///
    /// Boon entries are uptimes and conceptually live in `[0, 1]`; might, dps and
    /// sustain are open-ended intensities. Nothing here clamps.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CapabilityVector {
        pub quickness: f64,
        pub alacrity: f64,
        pub stability: f64,
        pub resistance: f64,
        pub protection: f64,
        pub might: f64,
        pub fury: f64,
        pub dps: f64,
        pub sustain: f64,
    }

    impl CapabilityVector {
        pub fn get(&self, dimension: Dimension) -> f64 {
            match dimension {
                Dimension::Quickness => self.quickness,
                Dimension::Alacrity => self.alacrity,
                Dimension::Stability => self.stability,
                Dimension::Resistance => self.resistance,
                Dimension::Protection => self.protection,
                Dimension::Might => self.might,
                Dimension::Fury => self.fury,
                Dimension::Dps => self.dps,
                Dimension::Sustain => self.sustain,
            }
        }

        pub fn get_mut(&mut self, dimension: Dimension) -> &mut f64 {
            match dimension {
                Dimension::Quickness => &mut self.quickness,
                Dimension::Alacrity => &mut self.alacrity,
                Dimension::Stability => &mut self.stability,
                Dimension::Resistance => &mut self.resistance,
                Dimension::Protection => &mut self.protection,
                Dimension::Might => &mut self.might,
                Dimension::Fury => &mut self.fury,
                Dimension::Dps => &mut self.dps,
                Dimension::Sustain => &mut self.sustain,
            }
        }

        pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
            *self.get_mut(dimension) = value;
            self
        }
    }
}


pub mod group {
    use serde::{Deserialize, Serialize};

    use super::entity::{BuildId, PlayerId};

    pub type SubgroupId = usize;

    pub const SUBGROUP_CAPACITY: usize = 5;

    pub fn subgroup_count(player_count: usize) -> usize {
        player_count.div_ceil(SUBGROUP_CAPACITY)
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Member {
        pub player_id: PlayerId,
        pub build_id: BuildId,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Subgroup {
        pub id: SubgroupId,
        pub members: Vec<Member>,
    }

    impl Subgroup {
        pub fn len(&self) -> usize {
            self.members.len()
        }

        pub fn is_empty(&self) -> bool {
            self.members.is_empty()
        }
    }
}


pub mod condition {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use super::capability::{CapabilityVector, Dimension};
    use super::entity::GameMode;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Archetype {
        Sustain,
        Burst,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ProfileKind {
        MassBattle,
        Skirmish,
        SelfSufficient,
    }

    impl fmt::Display for ProfileKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                ProfileKind::MassBattle => "mass_battle",
                ProfileKind::Skirmish => "skirmish",
                ProfileKind::SelfSufficient => "self_sufficient",
            })
        }
    }

    /// Population bounds for one named build.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BuildBounds {
        pub min: usize,
        pub max: usize,
        #[serde(default)]
        pub per_subgroup_min: usize,
    }

    /// Structural rule over how many players take which builds.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum BuildRule {
        /// Squad-wide count of players on `build` lies in `[min, max]`.
        Quota { build: String, min: usize, max: usize },
        /// Every subgroup holds at least `min` players on `build`.
        PerGroupMin { build: String, min: usize },
        /// No build name is taken by more than `max` players.
        MaxDuplicate { max: usize },
        /// At least `min` players are on builds of the given archetype.
        MinArchetypeCount { archetype: Archetype, min: usize },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct HardTargets {
        pub quickness: f64,
        pub resistance: f64,
        pub protection: f64,
        pub min_stability_sources: u32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Weights(pub CapabilityVector);

    impl Weights {
        pub fn get(&self, dimension: Dimension) -> f64 {
            self.0.get(dimension)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MetaPolicy {
        pub mode: GameMode,
        pub profile: ProfileKind,
        pub squad_size: usize,
        pub rules: Vec<BuildRule>,
        pub targets: HardTargets,
        pub weights: Weights,
    }

    impl MetaPolicy {
        /// Squad-wide bounds for `build`, if any quota names it.
        pub fn bounds(&self, build: &str) -> Option<BuildBounds> {
            let (min, max) = self.rules.iter().find_map(|rule| match rule {
                BuildRule::Quota { build: b, min, max } if b == build => Some((*min, *max)),
                _ => None,
            })?;
            let per_subgroup_min = self
                .rules
                .iter()
                .find_map(|rule| match rule {
                    BuildRule::PerGroupMin { build: b, min } if b == build => Some(*min),
                    _ => None,
                })
                .unwrap_or(0);
            Some(BuildBounds { min, max, per_subgroup_min })
        }
    }
}
