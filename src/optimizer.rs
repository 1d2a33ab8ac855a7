//! Request-level driver: policy and capabilities first, then model, search
//! and extraction.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::builder::{build_model, CompositionModel, DamageAggregation, EmptyEligibility, ModelInput, ModelOptions};
use crate::capability::capabilities;
use crate::error::{OptimizerError, Result};
use crate::extract::{extract, BuildCounter, Coverage};
use crate::model::capability::{CapabilityVector, Dimension};
use crate::model::condition::{HardTargets, ProfileKind, Weights};
use crate::model::entity::{Build, GameMode, Player, PlayerId};
use crate::model::group::Subgroup;
use crate::policy::policy;
use crate::reference::ReferenceData;
use crate::solve::{solve, SolveStatus};

/// Shortest search the driver will run.
pub const MIN_TIME_LIMIT: Duration = Duration::from_millis(100);

pub fn time_limit(time_limit_ms: u64) -> Duration {
    Duration::from_millis(time_limit_ms).max(MIN_TIME_LIMIT)
}

fn default_time_limit_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub players: Vec<Player>,
    pub builds: Vec<Build>,
    pub mode: GameMode,
    pub squad_size: usize,
    /// Replaces the policy's hard thresholds when present.
    #[serde(default)]
    pub targets: Option<HardTargets>,
    /// Replaces the policy's objective weights when present.
    #[serde(default)]
    pub weights: Option<Weights>,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
}

impl OptimizationRequest {
    pub fn new(players: Vec<Player>, builds: Vec<Build>, mode: GameMode) -> OptimizationRequest {
        let squad_size = players.len();
        OptimizationRequest {
            players,
            builds,
            mode,
            squad_size,
            targets: None,
            weights: None,
            time_limit_ms: default_time_limit_ms(),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        if let Some(build) = self.builds.iter().find(|b| !seen.insert(b.id.as_str())) {
            return Err(OptimizerError::DuplicateBuild(build.id.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(player) = self.players.iter().find(|p| !seen.insert(p.id.as_str())) {
            return Err(OptimizerError::DuplicatePlayer(player.id.clone()));
        }
        if let Some(weights) = &self.weights {
            // NaN fails the comparison too
            let negative = Dimension::ALL.iter().find(|d| !(weights.get(**d) >= 0.0));
            if let Some(&dimension) = negative {
                return Err(OptimizerError::NegativeWeight { dimension, weight: weights.get(dimension) });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub solver_status_code: i32,
    pub solver_status: String,
    pub profile: Option<ProfileKind>,
    pub objective_value: Option<i64>,
    pub solve_ms: u64,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub subgroup_count: usize,
    /// Players that received the fallback build instead of one they listed.
    pub defaulted_players: Vec<PlayerId>,
    pub partial_default_assignment: bool,
    pub build_counts: BuildCounter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: SolveStatus,
    pub best_score: f64,
    pub elapsed_ms: u64,
    pub groups: Vec<Subgroup>,
    pub coverage_by_group: Vec<Coverage>,
    pub diagnostics: Diagnostics,
}

impl OptimizationResult {
    fn empty() -> OptimizationResult {
        OptimizationResult {
            status: SolveStatus::Optimal,
            best_score: 0.0,
            elapsed_ms: 0,
            groups: Vec::new(),
            coverage_by_group: Vec::new(),
            diagnostics: Diagnostics {
                solver_status_code: SolveStatus::Optimal.code(),
                solver_status: SolveStatus::Optimal.name().to_string(),
                ..Diagnostics::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub empty_eligibility: EmptyEligibility,
    pub damage_aggregation: DamageAggregation,
}

#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    reference: ReferenceData,
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(reference: ReferenceData, config: OptimizerConfig) -> Optimizer {
        Optimizer { reference, config }
    }

    /// Runs one request to completion.
    ///
    /// Only malformed requests are errors. An infeasible or timed-out search
    /// still returns a full roster (default placements, score 0); check
    /// `status` before trusting the score.
    pub fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationResult> {
        if request.players.is_empty() {
            return Ok(OptimizationResult::empty());
        }
        let started = Instant::now();
        request.validate()?;

        let meta = policy(request.mode, request.squad_size, &self.reference.policy);
        let targets = request.targets.unwrap_or(meta.targets);
        let weights = request.weights.unwrap_or(meta.weights);
        let vectors: Vec<CapabilityVector> = request.builds
            .iter()
            .map(|build| capabilities(build, request.mode, &self.reference))
            .collect();

        let CompositionModel { program, layout } = build_model(&ModelInput {
            players: &request.players,
            builds: &request.builds,
            capabilities: &vectors,
            policy: &meta,
            targets,
            weights,
            reference: &self.reference,
            options: ModelOptions {
                damage_aggregation: self.config.damage_aggregation,
                empty_eligibility: self.config.empty_eligibility,
            },
        })?;

        let num_variables = program.num_variables();
        let num_constraints = program.num_constraints();
        let response = solve(program, time_limit(request.time_limit_ms));
        log::info!(
            "Composition search for {} players finished {} in {:?} (objective {:?})",
            request.players.len(),
            response.status.name(),
            response.wall_time,
            response.objective_value()
        );

        let extraction = extract(&request.players, &request.builds, &vectors, &layout, &response);
        let build_counts = extraction
            .build_counts
            .iter()
            .cloned()
            .fold(BuildCounter::default(), |acc, counts| acc + counts);

        let diagnostics = Diagnostics {
            solver_status_code: response.status.code(),
            solver_status: response.status.name().to_string(),
            profile: Some(meta.profile),
            objective_value: response.objective_value(),
            solve_ms: response.wall_time.as_millis() as u64,
            num_variables,
            num_constraints,
            subgroup_count: layout.subgroup_count,
            partial_default_assignment: !layout.defaulted_players.is_empty(),
            defaulted_players: layout.defaulted_players,
            build_counts,
        };

        Ok(OptimizationResult {
            status: response.status,
            best_score: extraction.best_score,
            elapsed_ms: started.elapsed().as_millis() as u64,
            groups: extraction.groups,
            coverage_by_group: extraction.coverage_by_group,
            diagnostics,
        })
    }
}

/// Squad-wide build counts from a result, keyed by build id.
pub fn build_id_counts(result: &OptimizationResult) -> BTreeMap<String, usize> {
    result.groups
        .iter()
        .flat_map(|group| group.members.iter().map(|m| m.build_id.as_str()))
        .collect::<BuildCounter>()
        .0
}
