//! Mixed-integer program container and a time-boxed solve on `good_lp`'s
//! `microlp` backend.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::{
    constraint, microlp, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Unknown,
    /// A solution that is not proven optimal. `microlp` only returns proven
    /// optima, so this is reserved for backends that keep an incumbent.
    Feasible,
    Infeasible,
    Optimal,
}

impl SolveStatus {
    pub fn code(self) -> i32 {
        match self {
            SolveStatus::Unknown => 0,
            SolveStatus::Feasible => 2,
            SolveStatus::Infeasible => 3,
            SolveStatus::Optimal => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SolveStatus::Unknown => "UNKNOWN",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Optimal => "OPTIMAL",
        }
    }

    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Variables, rows and a maximization objective, ready to hand to the solver.
pub struct Program {
    variables: ProblemVariables,
    columns: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Expression,
    /// First row found unsatisfiable while building, if any.
    contradiction: Option<String>,
}

impl Default for Program {
    fn default() -> Self {
        Program {
            variables: ProblemVariables::new(),
            columns: Vec::new(),
            constraints: Vec::new(),
            objective: std::iter::empty::<Expression>().sum(),
            contradiction: None,
        }
    }
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    pub fn binary(&mut self, name: String) -> Variable {
        let var = self.variables.add(variable().binary().name(name));
        self.columns.push(var);
        var
    }

    pub fn continuous(&mut self, lo: f64, hi: f64, name: String) -> Variable {
        let var = self.variables.add(variable().min(lo).max(hi).name(name));
        self.columns.push(var);
        var
    }

    /// `lo <= Σ coef·var <= hi`. Rows without terms are decided here instead
    /// of being handed to the backend.
    pub fn add_row(&mut self, name: &str, terms: &[(Variable, f64)], lo: Option<f64>, hi: Option<f64>) {
        if terms.is_empty() {
            if lo.map_or(false, |lo| lo > 0.0) || hi.map_or(false, |hi| hi < 0.0) {
                log::debug!("Row {} has no terms and cannot hold", name);
                self.contradiction.get_or_insert_with(|| name.to_string());
            }
            return;
        }
        let expr: Expression = terms.iter().map(|&(var, coef)| coef * var).sum();
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo == hi => self.constraints.push(constraint!(expr == lo)),
            (lo, hi) => {
                if let Some(lo) = lo {
                    self.constraints.push(constraint!(expr.clone() >= lo));
                }
                if let Some(hi) = hi {
                    self.constraints.push(constraint!(expr <= hi));
                }
            }
        }
    }

    pub fn at_least(&mut self, name: &str, terms: &[(Variable, f64)], lo: f64) {
        self.add_row(name, terms, Some(lo), None);
    }

    pub fn at_most(&mut self, name: &str, terms: &[(Variable, f64)], hi: f64) {
        self.add_row(name, terms, None, Some(hi));
    }

    pub fn exactly(&mut self, name: &str, terms: &[(Variable, f64)], value: f64) {
        self.add_row(name, terms, Some(value), Some(value));
    }

    /// `target = a AND b` over binaries.
    pub fn add_and(&mut self, target: Variable, a: Variable, b: Variable) {
        self.constraints.push(constraint!(target <= a));
        self.constraints.push(constraint!(target <= b));
        self.constraints.push(constraint!(a + b - target <= 1));
    }

    pub fn maximize(&mut self, terms: &[(Variable, f64)]) {
        self.objective = terms.iter().map(|&(var, coef)| coef * var).sum();
    }

    pub fn num_variables(&self) -> usize {
        self.columns.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Values of every column of a solved [`Program`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: HashMap<Variable, f64>,
    objective: f64,
}

impl Assignment {
    pub fn value(&self, var: Variable) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    pub fn is_set(&self, var: Variable) -> bool {
        self.value(var) > 0.5
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }
}

#[derive(Debug, Clone)]
pub struct SolveResponse {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub wall_time: Duration,
}

impl SolveResponse {
    pub fn objective_value(&self) -> Option<i64> {
        self.assignment.as_ref().map(|a| a.objective().round() as i64)
    }
}

fn run(program: Program) -> Result<Assignment, ResolutionError> {
    let Program { variables, columns, constraints, objective, .. } = program;
    let mut problem = variables.maximise(objective.clone()).using(microlp);
    for row in constraints {
        problem = problem.with(row);
    }
    let solution = problem.solve()?;
    let values = columns.iter().map(|&var| (var, solution.value(var))).collect();
    Ok(Assignment { values, objective: solution.eval(objective) })
}

/// Solves `program` on a dedicated thread and waits at most `max_time`.
///
/// `microlp` cannot be interrupted; a search that outlives the limit is
/// detached and its answer dropped.
pub fn solve(program: Program, max_time: Duration) -> SolveResponse {
    let started = Instant::now();
    let unknown = |started: Instant| SolveResponse {
        status: SolveStatus::Unknown,
        assignment: None,
        wall_time: started.elapsed(),
    };

    if let Some(row) = &program.contradiction {
        log::debug!("Skipping search, row {} is unsatisfiable", row);
        return SolveResponse { status: SolveStatus::Infeasible, assignment: None, wall_time: started.elapsed() };
    }

    let (sender, receiver) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("squad-milp".to_string())
        .spawn(move || {
            // the receiver is gone once the limit passed
            let _ = sender.send(run(program));
        });
    if let Err(err) = spawned {
        log::error!("Failed to start solver thread: {}", err);
        return unknown(started);
    }

    match receiver.recv_timeout(max_time) {
        Ok(Ok(assignment)) => SolveResponse {
            status: SolveStatus::Optimal,
            assignment: Some(assignment),
            wall_time: started.elapsed(),
        },
        Ok(Err(ResolutionError::Infeasible)) => SolveResponse {
            status: SolveStatus::Infeasible,
            assignment: None,
            wall_time: started.elapsed(),
        },
        Ok(Err(err)) => {
            log::warn!("Solver gave up: {}", err);
            unknown(started)
        }
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Solver found no proven solution within {:?}", max_time);
            unknown(started)
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::error!("Solver thread exited without an answer");
            unknown(started)
        }
    }
}
