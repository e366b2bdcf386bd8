use thiserror::Error;

/// Represents a linear (or mixed-integer) programming problem
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Variable names, used for diagnostics only
    pub variables: Vec<String>,
    /// Objective function coefficients
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
    /// Optional upper bound per variable (lower bound is always zero)
    pub upper_bounds: Vec<Option<f64>>,
    /// Variables that must take integer values
    pub integer: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Sparse `(variable index, coefficient)` terms
    pub terms: Vec<(usize, f64)>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Objective has {found} coefficients but the problem has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {constraint} references variable {index} but the problem has {count} variables")]
    VariableOutOfRange {
        constraint: String,
        index: usize,
        count: usize,
    },
    #[error("Non-finite value in {0}")]
    NonFinite(String),
}

impl ConstraintOp {
    /// The operator obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl Constraint {
    /// Evaluate the left-hand side at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(j, coef)| coef * values.get(j).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + tolerance,
            ConstraintOp::Ge => lhs >= self.rhs - tolerance,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: true,
            },
            constraints: Vec::new(),
            upper_bounds: vec![None; n],
            integer: vec![false; n],
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    /// Add a constraint from sparse terms. Terms on the same variable are summed
    /// and zero coefficients are dropped.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(usize, f64)>,
        op: ConstraintOp,
        rhs: f64,
    ) {
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
        for (j, coef) in terms {
            match merged.iter_mut().find(|(k, _)| *k == j) {
                Some(existing) => existing.1 += coef,
                None => merged.push((j, coef)),
            }
        }
        merged.retain(|&(_, coef)| coef != 0.0);

        self.constraints.push(Constraint {
            name: name.into(),
            terms: merged,
            op,
            rhs,
        });
    }

    pub fn set_upper_bound(&mut self, var: usize, bound: Option<f64>) {
        self.upper_bounds[var] = bound;
    }

    pub fn mark_integer(&mut self, var: usize) {
        self.integer[var] = true;
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integer_variables(&self) -> bool {
        self.integer.iter().any(|&i| i)
    }

    /// Names of the constraints and bounds that `values` violates
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut violated: Vec<String> = self
            .constraints
            .iter()
            .filter(|c| !c.is_satisfied_by(values, tolerance))
            .map(|c| c.name.clone())
            .collect();
        for (j, name) in self.variables.iter().enumerate() {
            let value = values.get(j).copied().unwrap_or(0.0);
            let above = self.upper_bounds[j].is_some_and(|u| value > u + tolerance);
            if value < -tolerance || above {
                violated.push(format!("bound of {}", name));
            }
        }
        violated
    }

    /// Whether `values` satisfies every constraint, bound and sign restriction
    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.num_variables() && self.violations(values, tolerance).is_empty()
    }

    /// Objective value at `values`, in the problem's own sense
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Check the structural consistency of the problem before it reaches the tableau
    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        if let Some(j) = self.objective.coefficients.iter().position(|c| !c.is_finite()) {
            return Err(ProblemError::NonFinite(format!(
                "objective coefficient of {}",
                self.variables[j]
            )));
        }
        for c in &self.constraints {
            if !c.rhs.is_finite() {
                return Err(ProblemError::NonFinite(format!("rhs of {}", c.name)));
            }
            for &(j, coef) in &c.terms {
                if j >= n {
                    return Err(ProblemError::VariableOutOfRange {
                        constraint: c.name.clone(),
                        index: j,
                        count: n,
                    });
                }
                if !coef.is_finite() {
                    return Err(ProblemError::NonFinite(format!("constraint {}", c.name)));
                }
            }
        }
        if let Some(j) = self
            .upper_bounds
            .iter()
            .position(|b| b.is_some_and(|u| !u.is_finite() || u < 0.0))
        {
            return Err(ProblemError::NonFinite(format!(
                "upper bound of {}",
                self.variables[j]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_constraint_merges_terms() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.add_constraint("c", vec![(0, 1.0), (1, 2.0), (0, -1.0)], ConstraintOp::Le, 4.0);

        assert_eq!(problem.constraints[0].terms, vec![(1, 2.0)]);
        assert!(problem.constraints[0].is_satisfied_by(&[10.0, 2.0], 1e-9));
        assert!(!problem.constraints[0].is_satisfied_by(&[0.0, 2.5], 1e-9));
    }

    #[test]
    fn test_violations_cover_rows_and_bounds() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.add_constraint("cap", vec![(0, 1.0), (1, 1.0)], ConstraintOp::Le, 4.0);
        problem.set_upper_bound(1, Some(2.0));

        assert!(problem.is_satisfied_by(&[2.0, 2.0], 1e-9));
        assert_eq!(problem.violations(&[3.0, 2.5], 1e-9), vec!["cap", "bound of y"]);
        assert!(!problem.is_satisfied_by(&[2.0], 1e-9));
    }

    #[test]
    fn test_validate_rejects_out_of_range_terms() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.add_constraint("bad", vec![(3, 1.0)], ConstraintOp::Eq, 1.0);

        assert_eq!(
            problem.validate(),
            Err(ProblemError::VariableOutOfRange {
                constraint: "bad".to_string(),
                index: 3,
                count: 1,
            })
        );
    }

    #[test]
    fn test_validate_rejects_nan_objective() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![f64::NAN], true);

        assert!(matches!(problem.validate(), Err(ProblemError::NonFinite(_))));
    }
}
