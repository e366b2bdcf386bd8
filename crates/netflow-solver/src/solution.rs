/// The result of solving an LP problem
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Value of each variable, clipped to its bounds. Empty when no feasible point is known.
    pub values: Vec<f64>,
    /// Objective value in the problem's own sense
    pub objective_value: f64,
    /// Simplex pivots performed, summed over every LP solved
    pub iterations: usize,
    /// Branch-and-bound nodes explored (zero for a pure LP)
    pub nodes: usize,
    /// Diagnostic message for `SolutionStatus::Error`
    pub message: Option<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The pivot limit was reached; values are feasible but possibly not optimal
    IterationLimit,
    /// The branch-and-bound node limit was reached; values are the best integer point found,
    /// or the rounded-up relaxation when none was found and that rounding is feasible.
    /// Empty otherwise.
    NodeLimit,
    /// The problem was malformed
    Error,
}

impl SolutionStatus {
    /// Whether the solution carries usable variable values
    pub fn has_values(self) -> bool {
        matches!(
            self,
            SolutionStatus::Optimal | SolutionStatus::IterationLimit | SolutionStatus::NodeLimit
        )
    }
}

impl Solution {
    pub fn infeasible(iterations: usize) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::INFINITY,
            iterations,
            nodes: 0,
            message: None,
        }
    }

    pub fn unbounded(iterations: usize) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: f64::NEG_INFINITY,
            iterations,
            nodes: 0,
            message: None,
        }
    }

    /// An iteration cap hit before any feasible point was known
    pub fn exhausted(iterations: usize) -> Self {
        Self::without_point(SolutionStatus::IterationLimit, iterations)
    }

    /// A search limit hit before any point satisfying every constraint was known
    pub fn without_point(status: SolutionStatus, iterations: usize) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
            iterations,
            nodes: 0,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SolutionStatus::Error,
            values: Vec::new(),
            objective_value: f64::NAN,
            iterations: 0,
            nodes: 0,
            message: Some(message.into()),
        }
    }

    /// Whether `values` hold a point that satisfies every constraint
    pub fn is_feasible(&self) -> bool {
        self.status.has_values() && self.objective_value.is_finite()
    }
}
