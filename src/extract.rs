use std::collections::BTreeMap;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::builder::{scaled, Layout, SCALE};
use crate::model::capability::{CapabilityVector, Dimension};
use crate::model::entity::{Build, Player};
use crate::model::group::{Member, Subgroup, SUBGROUP_CAPACITY};
use crate::solve::{Assignment, SolveResponse};

/// Weighted per-subgroup score treated as a perfect subgroup when normalizing.
pub const PER_SUBGROUP_SCORE_CEILING: f64 = 100.0;

pub type Coverage = BTreeMap<Dimension, f64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildCounter(pub BTreeMap<String, usize>);

impl<'a> FromIterator<&'a str> for BuildCounter {
    fn from_iter<I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        let mut counter = BTreeMap::new();
        for name in names {
            *counter.entry(name.to_string()).or_insert(0) += 1;
        }
        BuildCounter(counter)
    }
}

impl Add for BuildCounter {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut counter = self.0;
        for (name, count) in rhs.0 {
            *counter.entry(name).or_insert(0) += count;
        }
        BuildCounter(counter)
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub groups: Vec<Subgroup>,
    pub coverage_by_group: Vec<Coverage>,
    pub best_score: f64,
    /// Per subgroup, keyed by build name.
    pub build_counts: Vec<BuildCounter>,
}

fn solved(response: &SolveResponse) -> Option<&Assignment> {
    response.assignment.as_ref().filter(|_| response.status.has_solution())
}

/// `(build index, subgroup)` per player.
fn placements(layout: &Layout, response: &SolveResponse) -> Vec<(usize, usize)> {
    match solved(response) {
        Some(assignment) => layout
            .players
            .iter()
            .map(|p| {
                let build = p.assign
                    .iter()
                    .find(|(_, var)| assignment.is_set(*var))
                    .or_else(|| p.assign.first())
                    .map_or(0, |(b, _)| *b);
                let group = p.group.iter().position(|var| assignment.is_set(*var)).unwrap_or(0);
                (build, group)
            })
            .collect(),
        None => layout
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.assign.first().map_or(0, |(b, _)| *b), i / SUBGROUP_CAPACITY))
            .collect(),
    }
}

pub fn extract(
    players: &[Player],
    builds: &[Build],
    capabilities: &[CapabilityVector],
    layout: &Layout,
    response: &SolveResponse,
) -> Extraction {
    let count = layout.subgroup_count;
    let placements = placements(layout, response);

    let mut groups: Vec<Subgroup> = (0..count).map(|id| Subgroup { id, members: Vec::new() }).collect();
    for (player, &(b, g)) in players.iter().zip(&placements) {
        groups[g].members.push(Member { player_id: player.id.clone(), build_id: builds[b].id.clone() });
    }

    let assignment = solved(response);
    let coverage_by_group: Vec<Coverage> = (0..count)
        .map(|g| {
            Dimension::BOONS
                .iter()
                .map(|&dimension| {
                    let achieved = match assignment {
                        Some(assignment) => assignment.value(layout.aggregate(g, dimension)),
                        None => placements
                            .iter()
                            .filter(|(_, group)| *group == g)
                            .map(|(b, _)| scaled(capabilities[*b].get(dimension)))
                            .sum::<i64>() as f64,
                    };
                    (dimension, (achieved / SCALE as f64).clamp(0.0, 1.0))
                })
                .collect::<Coverage>()
        })
        .collect();

    let best_score = assignment.map_or(0.0, |assignment| {
        let raw = assignment.objective() / SCALE as f64;
        let ceiling = SCALE as f64 * count as f64 * PER_SUBGROUP_SCORE_CEILING;
        if ceiling > 0.0 {
            (raw / ceiling).clamp(0.0, 1.0)
        } else {
            0.0
        }
    });

    let build_counts: Vec<BuildCounter> = (0..count)
        .map(|g| {
            placements
                .iter()
                .filter(|(_, group)| *group == g)
                .map(|(b, _)| builds[*b].name.as_str())
                .collect::<BuildCounter>()
        })
        .collect();

    Extraction { groups, coverage_by_group, best_score, build_counts }
}
