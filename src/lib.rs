//! Squad composition optimizer.
//!
//! Assigns each player one of their eligible builds and a subgroup of at most
//! five so that per-subgroup boon coverage meets the meta policy's hard
//! targets while a weighted capability objective is maximized.

pub mod builder;
pub mod capability;
pub mod error;
pub mod extract;
pub mod model;
pub mod optimizer;
pub mod policy;
pub mod reference;
pub mod solve;

pub use builder::{DamageAggregation, EmptyEligibility, SCALE};
pub use capability::capabilities;
pub use error::{OptimizerError, Result};
pub use model::capability::{CapabilityVector, Dimension};
pub use model::condition::{Archetype, BuildRule, HardTargets, MetaPolicy, ProfileKind, Weights};
pub use model::entity::{Build, BuildId, GameMode, Player, PlayerId, Profession};
pub use model::group::{subgroup_count, Member, Subgroup, SUBGROUP_CAPACITY};
pub use optimizer::{Diagnostics, OptimizationRequest, OptimizationResult, Optimizer, OptimizerConfig};
pub use policy::policy;
pub use reference::ReferenceData;
pub use solve::SolveStatus;
