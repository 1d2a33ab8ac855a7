use crate::model::capability::CapabilityVector;
use crate::model::condition::Archetype;
use crate::model::entity::{Build, GameMode};
use crate::reference::ReferenceData;

/// Capability vector of `build` under `mode`.
///
/// Starts from the build's mode-agnostic base, adds the mode-specific remapped
/// effect of every trait listed in the remap table (unknown ids add nothing),
/// then applies the profession's multiplier for `mode`.
pub fn capabilities(build: &Build, mode: GameMode, reference: &ReferenceData) -> CapabilityVector {
    let mut vector = build.traits
        .iter()
        .filter_map(|trait_id| reference.remap(*trait_id))
        .map(|remap| remap.for_mode(mode))
        .fold(build.base, |mut acc, effect| {
            *acc.get_mut(effect.boon) += effect.contribution();
            acc
        });
    reference.multiplier(build.profession, mode).apply(&mut vector);
    vector
}

pub fn is_archetype(vector: &CapabilityVector, archetype: Archetype, reference: &ReferenceData) -> bool {
    reference.archetypes.matches(archetype, vector)
}
