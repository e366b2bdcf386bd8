mod branch;
mod problem;
mod simplex;
mod solution;

pub use problem::{Constraint, ConstraintOp, LpProblem, Objective, ProblemError};
pub use simplex::{IntegerStrategy, Solver, SolverConfig};
pub use solution::{Solution, SolutionStatus};
