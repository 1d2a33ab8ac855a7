use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use squad_composer::model::condition::BuildBounds;
use squad_composer::optimizer::build_id_counts;
use squad_composer::reference::{PolicyTables, ProfileTable};
use squad_composer::{
    Build, CapabilityVector, Dimension, GameMode, HardTargets, OptimizationRequest, OptimizationResult,
    Optimizer, OptimizerConfig, Player, Profession, ProfileKind, ReferenceData, SolveStatus, Weights,
    SUBGROUP_CAPACITY,
};

fn build(id: &str, profession: Profession, base: CapabilityVector) -> Build {
    Build {
        id: id.to_string(),
        name: id.to_string(),
        profession,
        traits: Vec::new(),
        base,
    }
}

fn config() -> OptimizerConfig {
    OptimizerConfig::default()
}

fn counts_by_name(result: &OptimizationResult) -> BTreeMap<String, usize> {
    result.diagnostics.build_counts.0.clone()
}

/// Every profile without quotas, targets or weights.
fn free_reference() -> ReferenceData {
    free_reference_with(ProfileTable::default())
}

fn free_reference_with(profile: ProfileTable) -> ReferenceData {
    ReferenceData {
        policy: PolicyTables {
            mass_battle_min_size: 25,
            skirmish_min_size: 10,
            mass_battle: profile.clone(),
            skirmish: profile.clone(),
            self_sufficient: profile,
        },
        ..ReferenceData::default()
    }
}

fn uniform_weights() -> Weights {
    Weights(Dimension::ALL.iter().fold(CapabilityVector::default(), |acc, d| acc.with(*d, 1.0)))
}

fn assert_roster_invariants(request: &OptimizationRequest, result: &OptimizationResult) {
    let expected_groups = request.players.len().div_ceil(SUBGROUP_CAPACITY);
    assert_eq!(result.groups.len(), expected_groups);
    assert_eq!(result.coverage_by_group.len(), expected_groups);

    let mut seen = HashSet::new();
    for (index, group) in result.groups.iter().enumerate() {
        assert_eq!(group.id, index);
        assert!(group.members.len() <= SUBGROUP_CAPACITY);
        for member in &group.members {
            assert!(seen.insert(member.player_id.clone()), "{} placed twice", member.player_id);
            let player = request.players.iter().find(|p| p.id == member.player_id).unwrap();
            let eligible = player
                .eligible_build_ids
                .iter()
                .any(|id| *id == member.build_id && request.builds.iter().any(|b| b.id == *id));
            let defaulted = result.diagnostics.defaulted_players.contains(&player.id);
            assert!(eligible || (defaulted && member.build_id == request.builds[0].id));
        }
    }
    assert_eq!(seen.len(), request.players.len());

    assert!((0.0..=1.0).contains(&result.best_score));
    for coverage in &result.coverage_by_group {
        assert!(coverage.values().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn empty_roster_short_circuits() {
    let optimizer = Optimizer::default();
    let request = OptimizationRequest::new(Vec::new(), Vec::new(), GameMode::Wvw);
    let result = optimizer.optimize(&request).unwrap();
    assert!(result.groups.is_empty());
    assert!(result.coverage_by_group.is_empty());
    assert_eq!(result.best_score, 0.0);
    assert_eq!(result.elapsed_ms, 0);
    assert_eq!(result.diagnostics.subgroup_count, 0);
}

#[test]
fn single_player_single_build() {
    let optimizer = Optimizer::new(ReferenceData::default(), config());
    let builds = vec![build(
        "daredevil",
        Profession::Thief,
        CapabilityVector { dps: 0.9, sustain: 0.6, fury: 0.4, ..CapabilityVector::default() },
    )];
    let request = OptimizationRequest::new(vec![Player::new("solo", &["daredevil"])], builds, GameMode::Pve);
    let result = optimizer.optimize(&request).unwrap();

    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.diagnostics.profile, Some(ProfileKind::SelfSufficient));
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].members.len(), 1);
    assert_eq!(result.groups[0].members[0].player_id, "solo");
    assert_eq!(result.groups[0].members[0].build_id, "daredevil");
    assert!((result.coverage_by_group[0][&Dimension::Fury] - 0.4).abs() < 1e-9);
    assert!(result.best_score > 0.0);
    assert!(!result.diagnostics.partial_default_assignment);
}

#[test]
fn empty_eligibility_is_reported() {
    let optimizer = Optimizer::new(free_reference(), config());
    let builds = vec![
        build("first", Profession::Guardian, CapabilityVector::default()),
        build("second", Profession::Guardian, CapabilityVector::default()),
    ];
    let players = vec![Player::new("picky", &["second"]), Player::new("blank", &[])];
    let request = OptimizationRequest::new(players, builds, GameMode::Wvw);
    let result = optimizer.optimize(&request).unwrap();

    assert!(result.status.has_solution());
    assert!(result.diagnostics.partial_default_assignment);
    assert_eq!(result.diagnostics.defaulted_players, vec!["blank".to_string()]);
    let blank = result.groups[0].members.iter().find(|m| m.player_id == "blank").unwrap();
    assert_eq!(blank.build_id, "first");
    assert_roster_invariants(&request, &result);
}

#[test]
fn quota_saturated_by_whole_roster() {
    let profile = ProfileTable {
        reference_size: 3,
        composition: BTreeMap::from([("scourge".to_string(), BuildBounds { min: 1, max: 3, per_subgroup_min: 0 })]),
        ..ProfileTable::default()
    };
    let optimizer = Optimizer::new(free_reference_with(profile), config());
    let builds = vec![build("scourge", Profession::Necromancer, CapabilityVector { dps: 0.8, ..CapabilityVector::default() })];
    let players = (0..3).map(|i| Player::new(format!("p{i}"), &["scourge"])).collect();
    let request = OptimizationRequest::new(players, builds, GameMode::Wvw);
    let result = optimizer.optimize(&request).unwrap();

    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(build_id_counts(&result).get("scourge"), Some(&3));
    assert_eq!(result.diagnostics.build_counts.0.get("scourge"), Some(&3));
    assert_roster_invariants(&request, &result);
}

#[test]
fn unreachable_minimum_is_infeasible_but_still_placed() {
    let profile = ProfileTable {
        reference_size: 3,
        composition: BTreeMap::from([
            ("scourge".to_string(), BuildBounds { min: 1, max: 3, per_subgroup_min: 0 }),
            ("druid".to_string(), BuildBounds { min: 1, max: 2, per_subgroup_min: 0 }),
        ]),
        ..ProfileTable::default()
    };
    let optimizer = Optimizer::new(free_reference_with(profile), config());
    let builds = vec![
        build("scourge", Profession::Necromancer, CapabilityVector::default()),
        build("druid", Profession::Ranger, CapabilityVector::default()),
    ];
    let players = (0..3).map(|i| Player::new(format!("p{i}"), &["scourge"])).collect();
    let request = OptimizationRequest::new(players, builds, GameMode::Wvw);
    let result = optimizer.optimize(&request).unwrap();

    assert_eq!(result.status, SolveStatus::Infeasible);
    assert_eq!(result.diagnostics.solver_status_code, 3);
    assert_eq!(result.best_score, 0.0);
    assert_eq!(result.groups[0].members.len(), 3);
    assert!(result.groups[0].members.iter().all(|m| m.build_id == "scourge"));
    assert_roster_invariants(&request, &result);
}

#[test]
fn quickness_providers_are_split_across_subgroups() {
    let optimizer = Optimizer::new(free_reference(), config());
    let builds = vec![
        build("quickness", Profession::Guardian, CapabilityVector { quickness: 0.6, ..CapabilityVector::default() }),
        build("damage", Profession::Thief, CapabilityVector { dps: 1.0, ..CapabilityVector::default() }),
    ];
    let mut players = vec![
        Player::new("q1", &["quickness", "damage"]),
        Player::new("q2", &["quickness", "damage"]),
    ];
    players.extend((0..8).map(|i| Player::new(format!("d{i}"), &["damage"])));
    let mut request = OptimizationRequest::new(players, builds, GameMode::Wvw);
    request.targets = Some(HardTargets { quickness: 0.5, ..HardTargets::default() });
    request.weights = Some(uniform_weights());

    let result = optimizer.optimize(&request).unwrap();
    assert!(result.status.has_solution());
    assert_eq!(result.groups.len(), 2);
    for coverage in &result.coverage_by_group {
        assert!(coverage[&Dimension::Quickness] >= 0.5 - 1e-3);
    }
    assert_roster_invariants(&request, &result);
}

#[test]
fn skirmish_meta_meets_hard_targets() {
    let optimizer = Optimizer::new(ReferenceData::default(), config());
    let named = |id: &str, profession: Profession, base: CapabilityVector| Build {
        id: id.to_string(),
        name: id.to_string(),
        profession,
        traits: Vec::new(),
        base,
    };
    let builds = vec![
        named(
            "quickness-firebrand",
            Profession::Guardian,
            CapabilityVector { quickness: 0.85, stability: 0.6, resistance: 0.3, protection: 0.2, ..CapabilityVector::default() },
        ),
        named("heal-scrapper", Profession::Engineer, CapabilityVector { protection: 0.3, sustain: 0.8, ..CapabilityVector::default() }),
        named(
            "boon-herald",
            Profession::Revenant,
            CapabilityVector { protection: 0.4, fury: 0.8, might: 0.5, ..CapabilityVector::default() },
        ),
        named("heal-tempest", Profession::Elementalist, CapabilityVector { protection: 0.3, sustain: 0.7, ..CapabilityVector::default() }),
        named("power-scourge", Profession::Necromancer, CapabilityVector { resistance: 0.3, dps: 0.9, ..CapabilityVector::default() }),
        named("power-spellbreaker", Profession::Warrior, CapabilityVector { resistance: 0.3, dps: 0.8, ..CapabilityVector::default() }),
    ];
    let players = vec![
        Player::new("p0", &["quickness-firebrand", "boon-herald"]),
        Player::new("p1", &["quickness-firebrand", "power-scourge"]),
        Player::new("p2", &["heal-scrapper", "quickness-firebrand"]),
        Player::new("p3", &["boon-herald"]),
        Player::new("p4", &["heal-tempest"]),
        Player::new("p5", &["power-scourge"]),
        Player::new("p6", &["power-spellbreaker", "power-scourge"]),
        Player::new("p7", &["heal-scrapper"]),
        Player::new("p8", &["power-spellbreaker"]),
        Player::new("p9", &["power-scourge", "boon-herald"]),
    ];
    let request = OptimizationRequest::new(players, builds, GameMode::Wvw);

    let result = optimizer.optimize(&request).unwrap();
    assert_eq!(result.diagnostics.profile, Some(ProfileKind::Skirmish));
    assert!(result.status.has_solution(), "status {:?}", result.status);
    assert!(result.best_score > 0.0);
    for (group, coverage) in result.groups.iter().zip(&result.coverage_by_group) {
        assert!(group.members.iter().any(|m| m.build_id == "quickness-firebrand"));
        assert!(coverage[&Dimension::Quickness] >= 0.8 - 1e-3);
        assert!(coverage[&Dimension::Resistance] >= 0.5 - 1e-3);
        assert!(coverage[&Dimension::Protection] >= 0.5 - 1e-3);
        assert!(coverage[&Dimension::Stability] >= 0.5 - 1e-3);
    }
    let counts = build_id_counts(&result);
    assert_eq!(counts.get("heal-tempest"), Some(&1));
    assert!(counts.get("quickness-firebrand").copied().unwrap_or(0) >= 2);
    assert_roster_invariants(&request, &result);
}

#[test]
fn repeated_runs_agree_on_optimal_score() {
    let optimizer = Optimizer::new(free_reference(), config());
    let builds = vec![
        build("burst", Profession::Thief, CapabilityVector { dps: 1.0, ..CapabilityVector::default() }),
        build("support", Profession::Guardian, CapabilityVector { quickness: 0.5, protection: 0.5, ..CapabilityVector::default() }),
    ];
    let players = (0..3).map(|i| Player::new(format!("p{i}"), &["burst", "support"])).collect();
    let mut request = OptimizationRequest::new(players, builds, GameMode::Pve);
    request.weights = Some(uniform_weights());

    let first = optimizer.optimize(&request).unwrap();
    let second = optimizer.optimize(&request).unwrap();
    assert_eq!(first.status, SolveStatus::Optimal);
    assert_eq!(second.status, SolveStatus::Optimal);
    assert_eq!(first.best_score, second.best_score);
    assert_eq!(first.diagnostics.objective_value, second.diagnostics.objective_value);
    // support adds 1.0 of boons per player against 0.2 of squad-averaged damage
    assert!(first.groups[0].members.iter().all(|m| m.build_id == "support"));
}

#[test]
fn mass_battle_roster_meets_every_subgroup_target() {
    let optimizer = Optimizer::new(ReferenceData::default(), config());
    let named = |id: &str, profession: Profession, base: CapabilityVector| Build {
        id: id.to_string(),
        name: id.to_string(),
        profession,
        traits: Vec::new(),
        base,
    };
    let builds = vec![
        named(
            "quickness-firebrand",
            Profession::Guardian,
            CapabilityVector { quickness: 0.95, stability: 0.6, resistance: 0.5, protection: 0.4, ..CapabilityVector::default() },
        ),
        named(
            "heal-scrapper",
            Profession::Engineer,
            CapabilityVector { resistance: 0.3, protection: 0.4, sustain: 0.8, ..CapabilityVector::default() },
        ),
        named("boon-herald", Profession::Revenant, CapabilityVector { fury: 0.8, might: 0.5, ..CapabilityVector::default() }),
        named("heal-tempest", Profession::Elementalist, CapabilityVector { sustain: 0.7, ..CapabilityVector::default() }),
        named("power-scourge", Profession::Necromancer, CapabilityVector { dps: 0.9, ..CapabilityVector::default() }),
        named("power-spellbreaker", Profession::Warrior, CapabilityVector { dps: 0.8, ..CapabilityVector::default() }),
    ];
    // 25 players scale the 50-seat reference by one half
    let roster = [
        ("quickness-firebrand", 5),
        ("heal-scrapper", 5),
        ("boon-herald", 4),
        ("heal-tempest", 2),
        ("power-scourge", 6),
        ("power-spellbreaker", 3),
    ];
    let players: Vec<Player> = roster
        .iter()
        .flat_map(|(build, count)| (0..*count).map(move |i| Player::new(format!("{build}-{i}"), &[*build])))
        .collect();
    assert_eq!(players.len(), 25);
    let request = OptimizationRequest::new(players, builds, GameMode::Wvw);

    let result = optimizer.optimize(&request).unwrap();
    assert_eq!(result.diagnostics.profile, Some(ProfileKind::MassBattle));
    assert!(result.status.has_solution(), "status {:?}", result.status);
    assert_eq!(result.groups.len(), 5);
    for (group, coverage) in result.groups.iter().zip(&result.coverage_by_group) {
        let count = |id: &str| group.members.iter().filter(|m| m.build_id == id).count();
        assert_eq!(count("quickness-firebrand"), 1);
        assert_eq!(count("heal-scrapper"), 1);
        assert!(coverage[&Dimension::Quickness] >= 0.9 - 1e-3);
        assert!(coverage[&Dimension::Resistance] >= 0.8 - 1e-3);
        assert!(coverage[&Dimension::Protection] >= 0.7 - 1e-3);
        assert!(coverage[&Dimension::Stability] >= 0.5 - 1e-3);
    }
    let counts = counts_by_name(&result);
    for (build, count) in roster {
        assert_eq!(counts.get(build), Some(&count), "{build}");
    }
    assert_roster_invariants(&request, &result);
}

#[test]
fn duplicate_cap_limits_the_strongest_build() {
    let optimizer = Optimizer::new(ReferenceData::default(), config());
    let builds = vec![
        build(
            "star",
            Profession::Mesmer,
            CapabilityVector { quickness: 0.5, alacrity: 0.5, dps: 1.0, sustain: 1.0, ..CapabilityVector::default() },
        ),
        build("burst", Profession::Thief, CapabilityVector { dps: 0.8, ..CapabilityVector::default() }),
        build("heal", Profession::Mesmer, CapabilityVector { sustain: 0.9, ..CapabilityVector::default() }),
    ];
    let players = (0..5).map(|i| Player::new(format!("p{i}"), &["star", "burst", "heal"])).collect();
    let request = OptimizationRequest::new(players, builds, GameMode::Pve);

    let result = optimizer.optimize(&request).unwrap();
    assert_eq!(result.diagnostics.profile, Some(ProfileKind::SelfSufficient));
    assert_eq!(result.status, SolveStatus::Optimal);
    let counts = counts_by_name(&result);
    assert_eq!(counts.get("star"), Some(&2));
    assert!(counts.values().all(|count| *count <= 2));
    assert_eq!(counts.get("burst").copied().unwrap_or(0) + counts.get("heal").copied().unwrap_or(0), 3);
    assert_roster_invariants(&request, &result);
}

#[test]
fn sustain_minimum_displaces_a_stronger_damage_build() {
    let builds = vec![
        build("striker-a", Profession::Thief, CapabilityVector { dps: 1.0, ..CapabilityVector::default() }),
        build("striker-b", Profession::Thief, CapabilityVector { dps: 1.0, ..CapabilityVector::default() }),
        build("medic", Profession::Mesmer, CapabilityVector { sustain: 0.6, ..CapabilityVector::default() }),
    ];
    let players = vec![
        Player::new("p0", &["striker-a", "medic"]),
        Player::new("p1", &["striker-b", "medic"]),
    ];
    let request = OptimizationRequest::new(players, builds, GameMode::Pve);
    let medics = |result: &OptimizationResult| counts_by_name(result).get("medic").copied().unwrap_or(0);

    let mut without_minimum = ReferenceData::default();
    without_minimum.policy.self_sufficient.min_archetypes.clear();
    let unconstrained = Optimizer::new(without_minimum, config()).optimize(&request).unwrap();
    assert_eq!(unconstrained.status, SolveStatus::Optimal);
    assert_eq!(medics(&unconstrained), 0);

    let result = Optimizer::new(ReferenceData::default(), config()).optimize(&request).unwrap();
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(medics(&result), 1);
    assert!(result.best_score < unconstrained.best_score);
    assert_roster_invariants(&request, &result);
}

#[test]
fn result_serializes_for_callers() {
    let optimizer = Optimizer::new(free_reference(), config());
    let builds = vec![build("a", Profession::Mesmer, CapabilityVector { alacrity: 0.7, ..CapabilityVector::default() })];
    let request = OptimizationRequest::new(vec![Player::new("p", &["a"])], builds, GameMode::Pve);
    let result = optimizer.optimize(&request).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "OPTIMAL");
    assert_eq!(json["groups"][0]["members"][0]["build_id"], "a");
    assert!((json["coverage_by_group"][0]["alacrity"].as_f64().unwrap() - 0.7).abs() < 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn any_roster_keeps_conservation_and_capacity(
        eligibility in prop::collection::vec(prop::collection::vec(0usize..3, 0..3), 1..13),
        scores in prop::collection::vec((0.0f64..1.5, 0.0f64..1.5), 3),
    ) {
        let builds: Vec<Build> = scores
            .iter()
            .enumerate()
            .map(|(i, (quickness, dps))| build(
                &format!("b{i}"),
                Profession::Mesmer,
                CapabilityVector { quickness: *quickness, dps: *dps, ..CapabilityVector::default() },
            ))
            .collect();
        let players: Vec<Player> = eligibility
            .iter()
            .enumerate()
            .map(|(i, picks)| Player {
                id: format!("p{i}"),
                eligible_build_ids: picks.iter().map(|b| format!("b{b}")).collect(),
            })
            .collect();
        let mut request = OptimizationRequest::new(players, builds, GameMode::Wvw);
        request.weights = Some(uniform_weights());
        request.time_limit_ms = 5_000;

        let optimizer = Optimizer::new(free_reference(), config());
        let result = optimizer.optimize(&request).unwrap();
        prop_assert!(result.status != SolveStatus::Infeasible);
        assert_roster_invariants(&request, &result);
    }
}
