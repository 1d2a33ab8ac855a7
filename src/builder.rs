//! Turns players, builds, capability vectors and a meta policy into a
//! mixed-integer [`Program`].

use std::collections::HashMap;

use good_lp::Variable;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::capability::is_archetype;
use crate::error::{OptimizerError, Result};
use crate::model::capability::{CapabilityVector, Dimension};
use crate::model::condition::{BuildRule, HardTargets, MetaPolicy, Weights};
use crate::model::entity::{Build, Player, PlayerId};
use crate::model::group::{subgroup_count, SUBGROUP_CAPACITY};
use crate::reference::ReferenceData;
use crate::solve::Program;

/// Fixed-point factor for every fractional coefficient in the model.
///
/// Aggregate coefficients are `SCALE * score` and objective coefficients
/// `SCALE * weight`. The backend works in `f64`, which holds integers exactly
/// up to 2^53 (about 9.0e15), and the raw objective is reported as `i64`.
/// One subgroup aggregate is at most `SUBGROUP_CAPACITY * SCALE * score`, i.e.
/// 5.0e5 for scores up to 100, and the objective is at most
/// `9 * SUBGROUP_CAPACITY * SCALE² * weight * score` per subgroup: 4.5e11 for
/// weights and scores up to 100. That keeps the objective exact for up to
/// 20 000 subgroups (100 000 players), well inside both limits.
pub const SCALE: i64 = 1000;

/// Scaled stability aggregate (about 50% uptime) that stands in for a minimum
/// stability-source count.
pub const STABILITY_SOURCE_PROXY: f64 = 0.5;

pub fn scaled(value: f64) -> i64 {
    (value * SCALE as f64).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageAggregation {
    /// Every subgroup carries the squad-wide total divided by subgroup capacity.
    #[default]
    SquadAverage,
    /// Every subgroup carries the damage/sustain of its own members.
    PerSubgroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyEligibility {
    /// Substitute the first build of the request and report the player.
    #[default]
    FallbackToFirstBuild,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub damage_aggregation: DamageAggregation,
    #[serde(default)]
    pub empty_eligibility: EmptyEligibility,
}

pub struct ModelInput<'a> {
    pub players: &'a [Player],
    pub builds: &'a [Build],
    /// Parallel to `builds`.
    pub capabilities: &'a [CapabilityVector],
    pub policy: &'a MetaPolicy,
    pub targets: HardTargets,
    pub weights: Weights,
    pub reference: &'a ReferenceData,
    pub options: ModelOptions,
}

/// Variables owned by one player.
#[derive(Debug, Clone)]
pub struct PlayerVars {
    /// `(build index, assign var)` over the player's eligible builds.
    pub assign: Vec<(usize, Variable)>,
    /// `group[g]`
    pub group: Vec<Variable>,
    /// `both[k][g]`, `k` indexing into `assign`.
    pub both: Vec<Vec<Variable>>,
    pub defaulted: bool,
}

/// Where every decision lives in the program, for reading a solution back.
#[derive(Debug, Clone)]
pub struct Layout {
    pub players: Vec<PlayerVars>,
    /// `aggregates[g][dimension.index()]`
    pub aggregates: Vec<Vec<Variable>>,
    pub subgroup_count: usize,
    pub defaulted_players: Vec<PlayerId>,
}

impl Layout {
    pub fn aggregate(&self, subgroup: usize, dimension: Dimension) -> Variable {
        self.aggregates[subgroup][dimension.index()]
    }
}

pub struct CompositionModel {
    pub program: Program,
    pub layout: Layout,
}

fn ones(vars: impl IntoIterator<Item = Variable>) -> Vec<(Variable, f64)> {
    vars.into_iter().map(|var| (var, 1.0)).collect()
}

fn resolve_eligibility(
    player: &Player,
    index: &HashMap<&str, usize>,
    builds: &[Build],
    policy: EmptyEligibility,
) -> Result<(Vec<usize>, bool)> {
    let eligible: Vec<usize> = player.eligible_build_ids
        .iter()
        .filter_map(|id| {
            let found = index.get(id.as_str()).copied();
            if found.is_none() {
                log::warn!("Player {} lists unknown build {}", player.id, id);
            }
            found
        })
        .unique()
        .collect();
    if !eligible.is_empty() {
        return Ok((eligible, false));
    }
    match policy {
        EmptyEligibility::Reject => Err(OptimizerError::EmptyEligibility(player.id.clone())),
        EmptyEligibility::FallbackToFirstBuild => {
            let fallback = builds.first().ok_or_else(|| OptimizerError::NoFallbackBuild(player.id.clone()))?;
            log::warn!(
                "Player {} has no eligible builds; assigning fallback build {}",
                player.id, fallback.id
            );
            Ok((vec![0], true))
        }
    }
}

pub fn build_model(input: &ModelInput) -> Result<CompositionModel> {
    let groups = subgroup_count(input.players.len());
    let index: HashMap<&str, usize> = input.builds.iter().enumerate().map(|(i, b)| (b.id.as_str(), i)).collect();
    let mut program = Program::new();
    let mut players = Vec::with_capacity(input.players.len());
    let mut defaulted_players = Vec::new();

    for (p, player) in input.players.iter().enumerate() {
        let (eligible, defaulted) = resolve_eligibility(player, &index, input.builds, input.options.empty_eligibility)?;
        if defaulted {
            defaulted_players.push(player.id.clone());
        }
        let assign: Vec<(usize, Variable)> = eligible
            .iter()
            .map(|&b| (b, program.binary(format!("assign[{p},{}]", input.builds[b].id))))
            .collect();
        let group: Vec<Variable> = (0..groups).map(|g| program.binary(format!("group[{p},{g}]"))).collect();
        let mut both = Vec::with_capacity(assign.len());
        for &(b, assign_var) in &assign {
            let mut row = Vec::with_capacity(groups);
            for (g, &group_var) in group.iter().enumerate() {
                let var = program.binary(format!("both[{p},{},{g}]", input.builds[b].id));
                program.add_and(var, assign_var, group_var);
                row.push(var);
            }
            both.push(row);
        }

        program.exactly(&format!("one-build[{p}]"), &ones(assign.iter().map(|(_, v)| *v)), 1.0);
        program.exactly(&format!("one-group[{p}]"), &ones(group.iter().copied()), 1.0);
        // subgroups are interchangeable: label them in order of first member
        if p + 1 < groups {
            program.at_most(&format!("symmetry[{p}]"), &ones(group[p + 1..].iter().copied()), 0.0);
        }
        players.push(PlayerVars { assign, group, both, defaulted });
    }

    for g in 0..groups {
        let members = ones(players.iter().map(|p| p.group[g]));
        program.at_most(&format!("capacity[{g}]"), &members, SUBGROUP_CAPACITY as f64);
    }

    for rule in &input.policy.rules {
        add_rule(&mut program, input, &players, groups, rule);
    }

    let aggregates: Vec<Vec<Variable>> = (0..groups)
        .map(|g| {
            Dimension::ALL
                .iter()
                .map(|&dimension| add_aggregate(&mut program, input, &players, g, dimension))
                .collect()
        })
        .collect();

    for (g, subgroup) in aggregates.iter().enumerate() {
        add_thresholds(&mut program, &input.targets, g, subgroup);
    }

    let objective: Vec<(Variable, f64)> = aggregates
        .iter()
        .flat_map(|subgroup| {
            Dimension::ALL
                .iter()
                .map(|&dimension| (subgroup[dimension.index()], scaled(input.weights.get(dimension)) as f64))
        })
        .filter(|(_, coef)| *coef != 0.0)
        .collect();
    program.maximize(&objective);

    log::debug!(
        "Built composition model: {} players, {} builds, {} subgroups, {} vars, {} constraints",
        input.players.len(),
        input.builds.len(),
        groups,
        program.num_variables(),
        program.num_constraints()
    );

    Ok(CompositionModel {
        program,
        layout: Layout { players, aggregates, subgroup_count: groups, defaulted_players },
    })
}

/// Assign vars of every player, filtered by build index.
fn assign_vars(players: &[PlayerVars], keep: impl Fn(usize) -> bool) -> Vec<Variable> {
    players
        .iter()
        .flat_map(|p| p.assign.iter())
        .filter(|(b, _)| keep(*b))
        .map(|(_, v)| *v)
        .collect()
}

fn add_rule(program: &mut Program, input: &ModelInput, players: &[PlayerVars], groups: usize, rule: &BuildRule) {
    let builds = input.builds;
    match rule {
        BuildRule::Quota { build, min, max } => {
            let vars = assign_vars(players, |b| builds[b].name == *build);
            program.add_row(&format!("quota[{build}]"), &ones(vars), Some(*min as f64), Some(*max as f64));
        }
        BuildRule::PerGroupMin { build, min } => {
            for g in 0..groups {
                let mut terms = Vec::new();
                for p in players {
                    for ((b, _), row) in p.assign.iter().zip(&p.both) {
                        if builds[*b].name == *build {
                            terms.push((row[g], 1.0));
                        }
                    }
                }
                program.at_least(&format!("per-group[{build},{g}]"), &terms, *min as f64);
            }
        }
        BuildRule::MaxDuplicate { max } => {
            for name in builds.iter().map(|b| b.name.as_str()).unique() {
                let vars = assign_vars(players, |b| builds[b].name == name);
                if vars.len() > *max {
                    program.at_most(&format!("duplicate[{name}]"), &ones(vars), *max as f64);
                }
            }
        }
        BuildRule::MinArchetypeCount { archetype, min } => {
            let matches = |b: usize| is_archetype(&input.capabilities[b], *archetype, input.reference);
            let reachable = players
                .iter()
                .filter(|p| p.assign.iter().any(|(b, _)| matches(*b)))
                .count();
            let required = (*min).min(reachable);
            if required < *min {
                log::warn!(
                    "Only {} players can play a {:?} build; lowering the minimum from {} to {}",
                    reachable, archetype, min, required
                );
            }
            if required > 0 {
                let vars = assign_vars(players, matches);
                program.at_least(&format!("archetype[{archetype:?}]"), &ones(vars), required as f64);
            }
        }
    }
}

fn add_aggregate(program: &mut Program, input: &ModelInput, players: &[PlayerVars], g: usize, dimension: Dimension) -> Variable {
    let squad_wide = !dimension.is_boon() && input.options.damage_aggregation == DamageAggregation::SquadAverage;
    let mut terms = Vec::new();
    for p in players {
        for (k, &(b, assign)) in p.assign.iter().enumerate() {
            let score = input.capabilities[b].get(dimension);
            let (var, coef) = if squad_wide {
                (assign, scaled(score / SUBGROUP_CAPACITY as f64))
            } else {
                (p.both[k][g], scaled(score))
            };
            if coef != 0 {
                terms.push((var, coef as f64));
            }
        }
    }

    let lo: f64 = terms.iter().map(|(_, c)| c.min(0.0)).sum();
    let hi: f64 = terms.iter().map(|(_, c)| c.max(0.0)).sum();
    let aggregate = program.continuous(lo, hi, format!("{dimension}[{g}]"));
    terms.push((aggregate, -1.0));
    program.exactly(&format!("{dimension}-total[{g}]"), &terms, 0.0);
    aggregate
}

fn add_thresholds(program: &mut Program, targets: &HardTargets, g: usize, subgroup: &[Variable]) {
    let hard = [
        (Dimension::Quickness, targets.quickness),
        (Dimension::Resistance, targets.resistance),
        (Dimension::Protection, targets.protection),
    ];
    for (dimension, target) in hard {
        if target > 0.0 {
            let aggregate = subgroup[dimension.index()];
            program.at_least(&format!("{dimension}-target[{g}]"), &[(aggregate, 1.0)], scaled(target) as f64);
        }
    }
    if targets.min_stability_sources >= 1 {
        let aggregate = subgroup[Dimension::Stability.index()];
        program.at_least(&format!("stability-sources[{g}]"), &[(aggregate, 1.0)], scaled(STABILITY_SOURCE_PROXY) as f64);
    }
}
