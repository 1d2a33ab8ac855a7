use crate::model::condition::{BuildBounds, BuildRule, MetaPolicy};
use crate::model::entity::GameMode;
use crate::reference::{PolicyTables, ProfileTable};

/// Meta policy for a squad of `squad_size` in `mode`.
///
/// The profile is picked by squad size alone. Quota profiles scale each
/// reference bound by `squad_size / reference_size`; targets and weights are
/// taken from the profile unscaled.
pub fn policy(mode: GameMode, squad_size: usize, tables: &PolicyTables) -> MetaPolicy {
    let profile = tables.profile_kind(squad_size);
    let table = tables.profile(profile);
    let rules = rules(table, squad_size);
    log::debug!(
        "Selected {} profile for squad of {} ({} rules)",
        profile, squad_size, rules.len()
    );
    MetaPolicy {
        mode,
        profile,
        squad_size,
        rules,
        targets: table.targets,
        weights: table.weights,
    }
}

fn rules(table: &ProfileTable, squad_size: usize) -> Vec<BuildRule> {
    let ratio = if table.reference_size == 0 {
        1.0
    } else {
        squad_size as f64 / table.reference_size as f64
    };

    let quotas = table.composition.iter().flat_map(|(build, reference)| {
        let scaled = scale_bounds(reference, ratio);
        let quota = BuildRule::Quota { build: build.clone(), min: scaled.min, max: scaled.max };
        let per_group = (scaled.per_subgroup_min > 0)
            .then(|| BuildRule::PerGroupMin { build: build.clone(), min: scaled.per_subgroup_min });
        std::iter::once(quota).chain(per_group)
    });

    let duplicates = table.max_duplicate.map(|max| BuildRule::MaxDuplicate { max });

    let archetypes = table.min_archetypes
        .iter()
        .filter(|(_, min)| **min > 0)
        .map(|(archetype, min)| BuildRule::MinArchetypeCount { archetype: *archetype, min: *min });

    quotas.chain(duplicates).chain(archetypes).collect()
}

/// Linear scaling of reference bounds. A build the reference represents at all
/// keeps at least one seat; `max` never drops below the scaled `min`.
pub fn scale_bounds(reference: &BuildBounds, ratio: f64) -> BuildBounds {
    let scale = |value: usize| (value as f64 * ratio).round() as usize;
    let mut min = scale(reference.min);
    if reference.min > 0 {
        min = min.max(1);
    }
    let mut max = scale(reference.max).max(min);
    if reference.max > 0 {
        max = max.max(1);
    }
    BuildBounds {
        min,
        max,
        per_subgroup_min: reference.per_subgroup_min,
    }
}
