use std::time::Instant;

use netflow_solver::{Solver, SolutionStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::builder::build_model;
use crate::config::OptimizerConfig;
use crate::network::NetworkData;
use crate::objective::ObjectiveKind;
use crate::report::{self, CostLine, ProductFlow, ProductionRow, ReportError, VehicleFlow};

pub const INFEASIBLE_MESSAGE: &str = "No feasible solution found - check constraints and capacity";
pub const UNBOUNDED_MESSAGE: &str = "Problem is unbounded - check costs and capacity limits";
pub const EXHAUSTED_MESSAGE: &str = "Iteration limit reached before a feasible solution was found";
pub const NO_TRIP_PLAN_MESSAGE: &str = "Node limit reached before a feasible trip plan was found - raise solver.max_nodes";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub objective: ObjectiveKind,
    /// Solver label; only `simplex` is available
    pub solver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub data: NetworkData,
    #[serde(default)]
    pub settings: Settings,
}

/// Optimizer output.
///
/// When no solution exists `error` is set and every record list is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SolutionStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub product_flow: Vec<ProductFlow>,
    #[serde(default)]
    pub production: Vec<ProductionRow>,
    #[serde(default)]
    pub vehicle_flow: Vec<VehicleFlow>,
    #[serde(default)]
    pub cost_summary: Vec<CostLine>,
}

impl OptimizeResponse {
    pub fn failure(message: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            error: Some(message.into()),
            warnings,
            ..Self::default()
        }
    }

    pub fn is_solution(&self) -> bool {
        self.error.is_none()
    }

    pub fn total_cost(&self) -> Option<f64> {
        self.cost_summary
            .iter()
            .find(|line| line.category == report::TOTAL)
            .map(|line| line.amount)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("Internal optimizer error: {message}")]
    Internal { message: String },
}

impl From<ReportError> for OptimizeError {
    fn from(err: ReportError) -> Self {
        OptimizeError::Internal {
            message: err.to_string(),
        }
    }
}

/// Build, solve and report one request.
///
/// Validation failures and models without a solution come back as `Ok` with
/// `error` set; only inconsistencies inside the optimizer are `Err`.
pub fn optimize(request: &OptimizeRequest, config: &OptimizerConfig) -> Result<OptimizeResponse, OptimizeError> {
    let started = Instant::now();

    if let Some(label) = request.settings.solver.as_deref() {
        if label != "simplex" {
            warn!(solver = label, "unknown solver requested, using simplex");
        }
    }

    let model = match build_model(&request.data, request.settings.objective, config) {
        Ok(model) => model,
        Err(err) => {
            warn!(error = %err, "network data rejected");
            return Ok(OptimizeResponse::failure(err.to_string(), Vec::new()));
        }
    };
    let mut warnings = model.index.warnings.clone();

    let solver = Solver::with_config(config.solver.clone());
    let solution = solver.solve(&model.lp);

    info!(
        status = ?solution.status,
        variables = model.lp.num_variables(),
        constraints = model.lp.num_constraints(),
        iterations = solution.iterations,
        nodes = solution.nodes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "solved network model"
    );

    match solution.status {
        SolutionStatus::Infeasible => return Ok(OptimizeResponse::failure(INFEASIBLE_MESSAGE, warnings)),
        SolutionStatus::Unbounded => return Ok(OptimizeResponse::failure(UNBOUNDED_MESSAGE, warnings)),
        SolutionStatus::Error => {
            return Err(OptimizeError::Internal {
                message: solution
                    .message
                    .unwrap_or_else(|| "solver rejected the model".to_string()),
            });
        }
        SolutionStatus::IterationLimit if solution.values.is_empty() => {
            return Ok(OptimizeResponse::failure(EXHAUSTED_MESSAGE, warnings));
        }
        SolutionStatus::NodeLimit if solution.values.is_empty() => {
            return Ok(OptimizeResponse::failure(NO_TRIP_PLAN_MESSAGE, warnings));
        }
        SolutionStatus::IterationLimit => {
            let message = format!(
                "Iteration limit of {} reached; flows are feasible but may not be optimal",
                config.solver.max_iterations
            );
            warn!("{}", message);
            warnings.push(message);
        }
        SolutionStatus::NodeLimit => {
            let message = format!(
                "Branch-and-bound node limit of {} reached; trip counts may not be optimal",
                config.solver.max_nodes
            );
            warn!("{}", message);
            warnings.push(message);
        }
        SolutionStatus::Optimal => {}
    }

    if !solution.objective_value.is_finite() {
        return Err(OptimizeError::Internal {
            message: format!("non-finite objective value {}", solution.objective_value),
        });
    }

    let report = report::extract(&model, &solution.values, config)?;
    if report.rounded_trips > 0 {
        let message = format!(
            "{} fractional trip counts were rounded up; trip costs exceed the LP objective",
            report.rounded_trips
        );
        warn!("{}", message);
        warnings.push(message);
    }

    Ok(OptimizeResponse {
        error: None,
        status: Some(solution.status),
        warnings,
        product_flow: report.product_flow,
        production: report.production,
        vehicle_flow: report.vehicle_flow,
        cost_summary: report.cost_summary,
    })
}
