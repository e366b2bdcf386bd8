use tracing::{debug, warn};

use crate::branch::BranchAndBound;
use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::{Solution, SolutionStatus};

/// How columns marked integer are treated
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerStrategy {
    /// Depth-first branch-and-bound on the most fractional integer column
    #[default]
    BranchAndBound,
    /// Solve the continuous relaxation only; callers round integer columns up
    RoundUp,
}

/// Tuning knobs for the simplex and the integer search
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Maximum pivots per LP before giving up with `IterationLimit`
    pub max_iterations: usize,
    /// Tolerance for floating point comparisons
    pub tolerance: f64,
    /// Consecutive degenerate pivots after which Bland's rule replaces Dantzig's
    pub degenerate_switch: usize,
    pub integer_strategy: IntegerStrategy,
    /// Maximum branch-and-bound nodes before giving up with `NodeLimit`
    pub max_nodes: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-6,
            degenerate_switch: 50,
            integer_strategy: IntegerStrategy::BranchAndBound,
            max_nodes: 500,
        }
    }
}

/// Simplex solver for linear programming problems
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.config.tolerance = tol;
        self
    }

    pub fn with_integer_strategy(mut self, strategy: IntegerStrategy) -> Self {
        self.config.integer_strategy = strategy;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.config.max_nodes = max;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the problem, branching on integer columns when the strategy asks for it
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.validate() {
            warn!(error = %e, "rejecting malformed problem");
            return Solution::error(e.to_string());
        }

        if problem.has_integer_variables()
            && self.config.integer_strategy == IntegerStrategy::BranchAndBound
        {
            return BranchAndBound::new(self).run(problem);
        }

        self.solve_relaxation(problem)
    }

    /// Solve the continuous relaxation using the two-phase simplex method
    pub fn solve_relaxation(&self, problem: &LpProblem) -> Solution {
        let mut tableau = Tableau::build(problem);
        let mut iterations = 0;

        debug!(
            rows = tableau.n_rows(),
            columns = tableau.rhs_col() + 1,
            artificial = tableau.n_artificial,
            "built tableau"
        );

        // Phase 1: drive the artificial columns out of the basis
        if tableau.n_artificial > 0 {
            let art_start = tableau.artificial_start();
            let mut costs = vec![0.0; tableau.rhs_col()];
            for c in costs.iter_mut().skip(art_start) {
                *c = 1.0;
            }
            tableau.set_objective(&costs);

            let limit = tableau.rhs_col();
            match self.run(&mut tableau, limit, &mut iterations) {
                PhaseOutcome::Optimal => {}
                PhaseOutcome::IterationLimit => {
                    warn!(iterations, "iteration limit reached before a feasible basis was found");
                    return Solution::exhausted(iterations);
                }
                PhaseOutcome::Unbounded => {
                    return Solution::error("phase 1 objective reported unbounded");
                }
            }

            let infeasibility = tableau.objective_value();
            if infeasibility > self.config.tolerance {
                debug!(infeasibility, iterations, "phase 1 left artificial mass");
                return Solution::infeasible(iterations);
            }

            self.drive_out_artificials(&mut tableau);
        }

        // Phase 2: optimize the real objective with artificial columns barred
        let mut costs = vec![0.0; tableau.rhs_col()];
        for (j, &coef) in problem.objective.coefficients.iter().enumerate() {
            costs[j] = if problem.objective.minimize { coef } else { -coef };
        }
        tableau.set_objective(&costs);

        let limit = tableau.artificial_start();
        let status = match self.run(&mut tableau, limit, &mut iterations) {
            PhaseOutcome::Optimal => SolutionStatus::Optimal,
            PhaseOutcome::Unbounded => return Solution::unbounded(iterations),
            PhaseOutcome::IterationLimit => {
                warn!(iterations, "iteration limit reached before optimality");
                SolutionStatus::IterationLimit
            }
        };

        debug!(iterations, ?status, "simplex finished");
        self.extract_solution(&tableau, problem, status, iterations)
    }

    /// Pivot until no column below `col_limit` has a negative reduced cost
    fn run(&self, tableau: &mut Tableau, col_limit: usize, iterations: &mut usize) -> PhaseOutcome {
        let mut degenerate = 0;

        loop {
            if *iterations >= self.config.max_iterations {
                return PhaseOutcome::IterationLimit;
            }

            let bland = degenerate >= self.config.degenerate_switch;
            let Some(col) = self.find_entering(tableau, col_limit, bland) else {
                return PhaseOutcome::Optimal;
            };
            let Some((row, ratio)) = self.find_leaving(tableau, col) else {
                return PhaseOutcome::Unbounded;
            };

            if ratio <= self.config.tolerance {
                degenerate += 1;
            } else {
                degenerate = 0;
            }

            tableau.pivot(row, col);
            *iterations += 1;
        }
    }

    /// Most negative reduced cost (Dantzig), or the lowest improving index (Bland)
    fn find_entering(&self, tableau: &Tableau, col_limit: usize, bland: bool) -> Option<usize> {
        let obj = &tableau.data[tableau.n_rows()];
        let mut best = -self.config.tolerance;
        let mut best_col = None;

        for (j, &reduced) in obj.iter().enumerate().take(col_limit) {
            if reduced < best {
                if bland {
                    return Some(j);
                }
                best = reduced;
                best_col = Some(j);
            }
        }

        best_col
    }

    /// Minimum ratio test; ties go to the row whose basic column has the lowest index
    fn find_leaving(&self, tableau: &Tableau, col: usize) -> Option<(usize, f64)> {
        let rhs_col = tableau.rhs_col();
        let mut best: Option<(usize, f64)> = None;

        for i in 0..tableau.n_rows() {
            let entry = tableau.data[i][col];
            if entry <= self.config.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / entry;
            best = match best {
                None => Some((i, ratio)),
                Some((r, min)) => {
                    if ratio < min - self.config.tolerance
                        || ((ratio - min).abs() <= self.config.tolerance
                            && tableau.basic_vars[i] < tableau.basic_vars[r])
                    {
                        Some((i, ratio))
                    } else {
                        Some((r, min))
                    }
                }
            };
        }

        best
    }

    /// Replace artificial columns still basic at zero with any structural column in their row.
    /// Rows with no such column are redundant and keep their artificial at zero.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.artificial_start();
        for i in 0..tableau.n_rows() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let replacement =
                (0..art_start).find(|&j| tableau.data[i][j].abs() > self.config.tolerance);
            if let Some(j) = replacement {
                tableau.pivot(i, j);
            }
        }
    }

    fn extract_solution(
        &self,
        tableau: &Tableau,
        problem: &LpProblem,
        status: SolutionStatus,
        iterations: usize,
    ) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.rhs_col();

        let mut values = vec![0.0; n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < n_vars {
                values[basic] = tableau.data[i][rhs_col];
            }
        }

        for (value, bound) in values.iter_mut().zip(&problem.upper_bounds) {
            *value = value.max(0.0);
            if let Some(upper) = bound {
                *value = value.min(*upper);
            }
        }

        let objective_value = problem.evaluate(&values);

        Solution {
            status,
            values,
            objective_value,
            iterations,
            nodes: 0,
            message: None,
        }
    }
}

/// Dense simplex tableau: one row per constraint plus the objective row, and
/// columns for structural variables, slack/surplus, artificials and the RHS
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn build(problem: &LpProblem) -> Self {
        let n_vars = problem.num_variables();

        // Constraint rows followed by one row per finite upper bound,
        // normalized so every RHS is non-negative
        let mut rows: Vec<(Vec<(usize, f64)>, ConstraintOp, f64)> = problem
            .constraints
            .iter()
            .map(|c| (c.terms.clone(), c.op, c.rhs))
            .collect();
        for (j, bound) in problem.upper_bounds.iter().enumerate() {
            if let Some(upper) = bound {
                rows.push((vec![(j, 1.0)], ConstraintOp::Le, *upper));
            }
        }
        for (terms, op, rhs) in rows.iter_mut() {
            if *rhs < 0.0 {
                for (_, coef) in terms.iter_mut() {
                    *coef = -*coef;
                }
                *op = op.flipped();
                *rhs = -*rhs;
            }
        }

        let n_slack = rows.iter().filter(|(_, op, _)| *op != ConstraintOp::Eq).count();
        let n_artificial = rows.iter().filter(|(_, op, _)| *op != ConstraintOp::Le).count();
        let total_cols = n_vars + n_slack + n_artificial + 1;

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; rows.len() + 1],
            basic_vars: vec![0; rows.len()],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (terms, op, rhs)) in rows.iter().enumerate() {
            for &(j, coef) in terms {
                tableau.data[i][j] += coef;
            }
            tableau.data[i][total_cols - 1] = *rhs;

            match op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0;
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        tableau
    }

    fn n_rows(&self) -> usize {
        self.basic_vars.len()
    }

    fn rhs_col(&self) -> usize {
        self.data[0].len() - 1
    }

    fn artificial_start(&self) -> usize {
        self.n_vars + self.n_slack
    }

    /// Install `costs` (one per non-RHS column) as the objective row, priced out
    /// against the current basis so basic columns have zero reduced cost
    fn set_objective(&mut self, costs: &[f64]) {
        let m = self.n_rows();
        let rhs_col = self.rhs_col();

        let mut obj = vec![0.0; rhs_col + 1];
        obj[..rhs_col].copy_from_slice(costs);

        for i in 0..m {
            let cost = costs[self.basic_vars[i]];
            if cost != 0.0 {
                for (o, &a) in obj.iter_mut().zip(&self.data[i]) {
                    *o -= cost * a;
                }
            }
        }

        self.data[m] = obj;
    }

    /// Current objective value of the minimization held in the objective row
    fn objective_value(&self) -> f64 {
        -self.data[self.n_rows()][self.rhs_col()]
    }

    fn pivot(&mut self, row: usize, col: usize) {
        self.basic_vars[row] = col;

        let pivot_val = self.data[row][col];
        for v in self.data[row].iter_mut() {
            *v /= pivot_val;
        }

        let pivot_row = self.data[row].clone();
        for (i, r) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor != 0.0 {
                for (v, &p) in r.iter_mut().zip(&pivot_row) {
                    *v -= factor * p;
                }
            }
        }
    }
}

enum PhaseOutcome {
    Optimal,
    Unbounded,
    IterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::LpProblem;
    use approx::assert_abs_diff_eq;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=11
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![3.0, 2.0], false);
        problem.add_constraint("sum", vec![(0, 1.0), (1, 1.0)], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![(0, 1.0)], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![(1, 1.0)], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.values[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.objective_value, 11.0, epsilon = 1e-6);
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=9
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![2.0, 3.0], true);
        problem.add_constraint("sum", vec![(0, 1.0), (1, 1.0)], ConstraintOp::Ge, 4.0);
        problem.add_constraint("x_max", vec![(0, 1.0)], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![(1, 1.0)], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.values[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.objective_value, 9.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5
        // x <= 3
        let mut problem = LpProblem::new(names(&["x"]));
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("lower", vec![(0, 1.0)], ConstraintOp::Ge, 5.0);
        problem.add_constraint("upper", vec![(0, 1.0)], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_equality_is_met_exactly() {
        // Two lanes feeding one sink of demand 10; the cheaper lane is capped at 4
        let mut problem = LpProblem::new(names(&["cheap", "dear"]));
        problem.set_objective(vec![1.0, 5.0], true);
        problem.add_constraint("balance", vec![(0, 1.0), (1, 1.0)], ConstraintOp::Eq, 10.0);
        problem.set_upper_bound(0, Some(4.0));

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.values[1], 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.objective_value, 34.0, epsilon = 1e-6);
    }

    #[test]
    fn test_negative_rhs_equality() {
        // -x - y = -6 written the way a balance row with demand on the right is
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![2.0, 1.0], true);
        problem.add_constraint("balance", vec![(0, -1.0), (1, -1.0)], ConstraintOp::Eq, -6.0);
        problem.add_constraint("y_cap", vec![(1, 1.0)], ConstraintOp::Le, 2.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.values[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_redundant_zero_rows_are_harmless() {
        let mut problem = LpProblem::new(names(&["x"]));
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("empty", vec![], ConstraintOp::Eq, 0.0);
        problem.add_constraint("need", vec![(0, 1.0)], ConstraintOp::Eq, 3.0);
        problem.add_constraint("need_again", vec![(0, 2.0)], ConstraintOp::Eq, 6.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_row_with_demand_is_infeasible() {
        let mut problem = LpProblem::new(names(&["x"]));
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("unreachable", vec![], ConstraintOp::Eq, 5.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("gap", vec![(0, 1.0), (1, -1.0)], ConstraintOp::Le, 1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_upper_bounds_cap_unbounded_direction() {
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("gap", vec![(0, 1.0), (1, -1.0)], ConstraintOp::Le, 1.0);
        problem.set_upper_bound(0, Some(100.0));
        problem.set_upper_bound(1, Some(100.0));

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_iteration_limit_is_reported() {
        let mut problem = LpProblem::new(names(&["x", "y"]));
        problem.set_objective(vec![3.0, 2.0], false);
        problem.add_constraint("sum", vec![(0, 1.0), (1, 1.0)], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![(0, 1.0)], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![(1, 1.0)], ConstraintOp::Le, 3.0);

        let solution = Solver::new().with_max_iterations(1).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::IterationLimit);
        assert_eq!(solution.iterations, 1);
        // One pivot from the slack basis is still a feasible vertex
        assert!(solution.is_feasible());
        assert_abs_diff_eq!(solution.values[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.values[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_iteration_limit_in_phase_one_has_no_values() {
        let mut problem = LpProblem::new(names(&["x"]));
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("need", vec![(0, 1.0)], ConstraintOp::Eq, 3.0);

        let solution = Solver::new().with_max_iterations(0).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::IterationLimit);
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_degenerate_transportation_problem() {
        // Two sources (supply 20, 30) and three sinks (demand 10, 25, 15): every
        // balance is tight so the basis is degenerate
        //        s0->t0 s0->t1 s0->t2 s1->t0 s1->t1 s1->t2
        let cost = vec![8.0, 6.0, 10.0, 9.0, 12.0, 13.0];
        let mut problem = LpProblem::new(names(&["a", "b", "c", "d", "e", "f"]));
        problem.set_objective(cost, true);
        problem.add_constraint("s0", vec![(0, 1.0), (1, 1.0), (2, 1.0)], ConstraintOp::Eq, 20.0);
        problem.add_constraint("s1", vec![(3, 1.0), (4, 1.0), (5, 1.0)], ConstraintOp::Eq, 30.0);
        problem.add_constraint("t0", vec![(0, 1.0), (3, 1.0)], ConstraintOp::Eq, 10.0);
        problem.add_constraint("t1", vec![(1, 1.0), (4, 1.0)], ConstraintOp::Eq, 25.0);
        problem.add_constraint("t2", vec![(2, 1.0), (5, 1.0)], ConstraintOp::Eq, 15.0);

        let solution = Solver::new().with_tolerance(1e-9).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        for c in &problem.constraints {
            assert!(c.is_satisfied_by(&solution.values, 1e-6), "{} violated", c.name);
        }
        // s0 ships 20 to t1; s1 covers t0, the rest of t1 and t2
        assert_abs_diff_eq!(solution.objective_value, 20.0 * 6.0 + 10.0 * 9.0 + 5.0 * 12.0 + 15.0 * 13.0, epsilon = 1e-6);
    }

    #[test]
    fn test_malformed_problem_is_an_error() {
        let mut problem = LpProblem::new(names(&["x"]));
        problem.set_objective(vec![1.0, 2.0], true);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.message.is_some());
    }
}
