//! Depth-first branch-and-bound over integer columns.
//!
//! Each node is the root problem plus a list of single-variable bound rows.
//! Nodes are pruned when their relaxation is infeasible or cannot beat the
//! incumbent; otherwise the most fractional integer column is split into
//! `x <= floor(v)` and `x >= ceil(v)` children, the floor side explored first.

use tracing::{debug, warn};

use crate::problem::{ConstraintOp, LpProblem};
use crate::simplex::Solver;
use crate::solution::{Solution, SolutionStatus};

#[derive(Debug, Clone, Copy)]
struct BranchBound {
    var: usize,
    op: ConstraintOp,
    value: f64,
}

#[derive(Debug, Clone, Default)]
struct Node {
    bounds: Vec<BranchBound>,
}

impl Node {
    fn child(&self, bound: BranchBound) -> Node {
        let mut bounds = self.bounds.clone();
        bounds.push(bound);
        Node { bounds }
    }

    fn apply(&self, problem: &LpProblem) -> LpProblem {
        let mut restricted = problem.clone();
        for b in &self.bounds {
            let name = match b.op {
                ConstraintOp::Le => format!("branch_{}_le_{}", problem.variables[b.var], b.value),
                _ => format!("branch_{}_ge_{}", problem.variables[b.var], b.value),
            };
            restricted.add_constraint(name, vec![(b.var, 1.0)], b.op, b.value);
        }
        restricted
    }
}

pub(crate) struct BranchAndBound<'s> {
    solver: &'s Solver,
}

impl<'s> BranchAndBound<'s> {
    pub(crate) fn new(solver: &'s Solver) -> Self {
        Self { solver }
    }

    pub(crate) fn run(&self, problem: &LpProblem) -> Solution {
        let config = self.solver.config();
        let tol = config.tolerance;
        // Compare objectives as a minimization regardless of the problem's sense
        let sense = if problem.objective.minimize { 1.0 } else { -1.0 };

        let mut stack = vec![Node::default()];
        let mut incumbent: Option<Solution> = None;
        let mut root: Option<Solution> = None;
        let mut nodes = 0;
        let mut iterations = 0;
        let mut node_limit = false;
        let mut iteration_limit = false;

        while let Some(node) = stack.pop() {
            if nodes >= config.max_nodes {
                node_limit = true;
                break;
            }
            nodes += 1;

            let relaxed = self.solver.solve_relaxation(&node.apply(problem));
            iterations += relaxed.iterations;

            match relaxed.status {
                SolutionStatus::Optimal => {}
                SolutionStatus::Unbounded if nodes == 1 => {
                    return Solution {
                        nodes,
                        ..Solution::unbounded(iterations)
                    };
                }
                SolutionStatus::IterationLimit => {
                    // The node's bound cannot be trusted; keep the root point as a fallback
                    iteration_limit = true;
                    if nodes == 1 && relaxed.is_feasible() {
                        root = Some(relaxed);
                    }
                    continue;
                }
                _ => continue,
            }

            if nodes == 1 {
                root = Some(relaxed.clone());
            }

            if let Some(best) = &incumbent {
                if sense * relaxed.objective_value >= sense * best.objective_value - tol {
                    continue;
                }
            }

            match most_fractional(problem, &relaxed.values, tol) {
                None => {
                    let snapped = snap_integers(problem, relaxed);
                    debug!(nodes, objective = snapped.objective_value, "new incumbent");
                    incumbent = Some(snapped);
                }
                Some((var, value)) => {
                    stack.push(node.child(BranchBound {
                        var,
                        op: ConstraintOp::Ge,
                        value: value.ceil(),
                    }));
                    stack.push(node.child(BranchBound {
                        var,
                        op: ConstraintOp::Le,
                        value: value.floor(),
                    }));
                }
            }
        }

        let limited_status = if node_limit {
            SolutionStatus::NodeLimit
        } else {
            SolutionStatus::IterationLimit
        };

        match (incumbent, root) {
            (Some(best), _) => {
                let status = if node_limit || iteration_limit {
                    warn!(nodes, "integer search stopped early; returning best incumbent");
                    limited_status
                } else {
                    SolutionStatus::Optimal
                };
                Solution {
                    status,
                    iterations,
                    nodes,
                    ..best
                }
            }
            (None, Some(relaxed)) if node_limit || iteration_limit => {
                let rounded = round_up(problem, relaxed, tol);
                let violated = problem.violations(&rounded.values, tol);
                if violated.is_empty() {
                    warn!(nodes, "no integer point found; rounding the relaxation up");
                    Solution {
                        status: limited_status,
                        iterations,
                        nodes,
                        ..rounded
                    }
                } else {
                    warn!(nodes, ?violated, "no integer point found; rounded relaxation is infeasible");
                    Solution {
                        nodes,
                        ..Solution::without_point(limited_status, iterations)
                    }
                }
            }
            (None, None) if node_limit || iteration_limit => Solution {
                nodes,
                ..Solution::without_point(limited_status, iterations)
            },
            _ => Solution {
                nodes,
                ..Solution::infeasible(iterations)
            },
        }
    }
}

/// The integer column whose value is furthest from an integer
fn most_fractional(problem: &LpProblem, values: &[f64], tol: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (j, &value) in values.iter().enumerate() {
        if !problem.integer[j] {
            continue;
        }
        let distance = (value - value.round()).abs();
        if distance <= tol {
            continue;
        }
        if best.is_none_or(|(_, _, d)| distance > d) {
            best = Some((j, value, distance));
        }
    }
    best.map(|(j, value, _)| (j, value))
}

fn snap_integers(problem: &LpProblem, mut solution: Solution) -> Solution {
    for (value, &is_int) in solution.values.iter_mut().zip(&problem.integer) {
        if is_int {
            *value = value.round();
        }
    }
    solution.objective_value = problem.evaluate(&solution.values);
    solution
}

/// Round integer columns up, treating values within `tol` of an integer as integral
fn round_up(problem: &LpProblem, mut solution: Solution, tol: f64) -> Solution {
    for (value, &is_int) in solution.values.iter_mut().zip(&problem.integer) {
        if is_int {
            let nearest = value.round();
            *value = if (*value - nearest).abs() <= tol {
                nearest
            } else {
                value.ceil()
            }
            .max(0.0);
        }
    }
    solution.objective_value = problem.evaluate(&solution.values);
    solution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::IntegerStrategy;
    use approx::assert_abs_diff_eq;

    fn knapsack() -> LpProblem {
        // Maximize 5x + 4y
        //   6x + 4y <= 24
        //   x + 2y <= 6
        // Relaxation: x=3, y=1.5 (21); integer optimum: x=4, y=0 (20)
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![5.0, 4.0], false);
        problem.add_constraint("wood", vec![(0, 6.0), (1, 4.0)], ConstraintOp::Le, 24.0);
        problem.add_constraint("labor", vec![(0, 1.0), (1, 2.0)], ConstraintOp::Le, 6.0);
        problem.mark_integer(0);
        problem.mark_integer(1);
        problem
    }

    fn trips() -> LpProblem {
        // 250 units must move on a lane carrying 100 per trip at 500 per trip
        let mut problem = LpProblem::new(vec!["flow".to_string(), "trips".to_string()]);
        problem.set_objective(vec![1.0, 500.0], true);
        problem.add_constraint("demand", vec![(0, 1.0)], ConstraintOp::Eq, 250.0);
        problem.add_constraint("capacity", vec![(0, 1.0), (1, -100.0)], ConstraintOp::Le, 0.0);
        problem.mark_integer(1);
        problem
    }

    #[test]
    fn test_branch_and_bound_finds_integer_optimum() {
        let problem = knapsack();
        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[0], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.values[1], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.objective_value, 20.0, epsilon = 1e-6);
        assert!(solution.nodes > 1);
    }

    #[test]
    fn test_trip_count_rounds_through_branching() {
        let solution = Solver::new().solve(&trips());

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values[1], 3.0);
        assert_abs_diff_eq!(solution.objective_value, 1750.0, epsilon = 1e-6);
    }

    #[test]
    fn test_round_up_strategy_keeps_relaxation() {
        let solution = Solver::new()
            .with_integer_strategy(IntegerStrategy::RoundUp)
            .solve(&trips());

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.values[1], 2.5, epsilon = 1e-6);
        assert_eq!(solution.nodes, 0);
    }

    #[test]
    fn test_integer_cost_never_beats_relaxation() {
        let problem = trips();
        let relaxed = Solver::new().solve_relaxation(&problem);
        let integer = Solver::new().solve(&problem);

        assert!(integer.objective_value >= relaxed.objective_value - 1e-6);
    }

    #[test]
    fn test_node_limit_rounds_relaxation_when_it_fits() {
        let problem = trips();
        let solution = Solver::new().with_max_nodes(1).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::NodeLimit);
        assert_eq!(solution.values[1], 3.0);
        assert!(solution.is_feasible());
        assert!(problem.is_satisfied_by(&solution.values, 1e-6));
        assert_abs_diff_eq!(solution.objective_value, 1750.0, epsilon = 1e-6);
    }

    #[test]
    fn test_node_limit_drops_rounded_point_that_breaks_rows() {
        // Rounding (3, 1.5) up to (3, 2) breaks both rows
        let solution = Solver::new().with_max_nodes(1).solve(&knapsack());

        assert_eq!(solution.status, SolutionStatus::NodeLimit);
        assert!(solution.values.is_empty());
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_infeasible_integer_problem() {
        // 2x = 3 has no integer solution
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("odd", vec![(0, 2.0)], ConstraintOp::Eq, 3.0);
        problem.mark_integer(0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }
}
