use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::NetworkModel;
use crate::config::OptimizerConfig;
use crate::objective::CostBook;
use crate::variables::VarKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Solution has {found} values but the model has {expected} variables")]
    ValueCount { expected: usize, found: usize },
    #[error("Non-finite value {value} for variable {variable}")]
    NonFinite { variable: String, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFlow {
    pub from: String,
    pub to: String,
    pub product: String,
    pub quantity: f64,
    pub unit: String,
    pub period: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRow {
    pub site: String,
    pub product: String,
    /// Components consumed per unit, as `"P1:2, P2:0.5"`
    pub bom: String,
    pub quantity: f64,
    pub unit: String,
    pub cost: f64,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleFlow {
    pub from: String,
    pub to: String,
    pub vehicle_type: String,
    pub trip_count: u64,
    pub period: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    pub category: String,
    pub amount: f64,
}

pub const TOTAL: &str = "Total";
pub const TRANSPORT_UNITS: &str = "Transport (units)";
pub const TRANSPORT_TRIPS: &str = "Transport (trips)";
pub const PRODUCTION: &str = "Production";

/// Flows, production and trips of a solved model, with monetary costs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowReport {
    pub product_flow: Vec<ProductFlow>,
    pub production: Vec<ProductionRow>,
    pub vehicle_flow: Vec<VehicleFlow>,
    pub cost_summary: Vec<CostLine>,
    /// Trip variables whose value was fractional and got rounded up
    pub rounded_trips: usize,
}

impl FlowReport {
    pub fn total_cost(&self) -> Option<f64> {
        self.cost_summary
            .iter()
            .find(|line| line.category == TOTAL)
            .map(|line| line.amount)
    }
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // avoid "-0" in the output
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Turn a solution vector into report records.
///
/// Records follow variable creation order. Values at or below the display
/// threshold are skipped and left out of the cost summary, so each category
/// total is the sum of its listed records.
pub fn extract(
    model: &NetworkModel<'_>,
    values: &[f64],
    config: &OptimizerConfig,
) -> Result<FlowReport, ReportError> {
    if values.len() != model.vars.len() {
        return Err(ReportError::ValueCount {
            expected: model.vars.len(),
            found: values.len(),
        });
    }

    let index = &model.index;
    let data = index.data;
    let costs = CostBook::new(index, config);
    let threshold = config.report.display_threshold;
    let tolerance = config.solver.tolerance;

    let mut report = FlowReport::default();
    let mut transport = 0.0;
    let mut trips = 0.0;
    let mut production = 0.0;

    for (id, key) in model.vars.iter() {
        let value = values[id.0];
        if !value.is_finite() {
            return Err(ReportError::NonFinite {
                variable: model.lp.variables[id.0].clone(),
                value,
            });
        }

        if value <= threshold {
            continue;
        }

        match *key {
            VarKey::Flow {
                path,
                product,
                period,
            } => {
                let cost = value * costs.unit_transport_cost(path);
                transport += cost;
                let lane = &index.paths[path];
                report.product_flow.push(ProductFlow {
                    from: index.nodes[lane.from].id.to_string(),
                    to: index.nodes[lane.to].id.to_string(),
                    product: data.products[product].id.clone(),
                    quantity: round2(value),
                    unit: data.products[product].unit.clone(),
                    period: data.periods[period].id.clone(),
                    cost: round2(cost),
                });
            }
            VarKey::Production {
                site,
                product,
                period,
            } => {
                let cost = value * costs.unit_production_cost(site, product, period);
                production += cost;
                let bom = index
                    .bom(site, product, period)
                    .iter()
                    .map(|&(component, quantity)| format!("{}:{}", data.products[component].id, quantity))
                    .collect::<Vec<_>>()
                    .join(", ");
                report.production.push(ProductionRow {
                    site: index.nodes[site].id.to_string(),
                    product: data.products[product].id.clone(),
                    bom,
                    quantity: round2(value),
                    unit: data.products[product].unit.clone(),
                    cost: round2(cost),
                    period: data.periods[period].id.clone(),
                });
            }
            VarKey::Trip {
                path,
                vehicle_type,
                period,
            } => {
                let count = (value - tolerance).ceil().max(0.0);
                if (count - value).abs() > tolerance {
                    report.rounded_trips += 1;
                }
                let cost = count * costs.trip_cost(path, vehicle_type);
                trips += cost;
                let lane = &index.paths[path];
                report.vehicle_flow.push(VehicleFlow {
                    from: index.nodes[lane.from].id.to_string(),
                    to: index.nodes[lane.to].id.to_string(),
                    vehicle_type: data.vehicle_types[vehicle_type].id.clone(),
                    trip_count: count as u64,
                    period: data.periods[period].id.clone(),
                    cost: round2(cost),
                });
            }
        }
    }

    report.cost_summary = vec![
        CostLine {
            category: TOTAL.to_string(),
            amount: round2(transport + trips + production),
        },
        CostLine {
            category: TRANSPORT_UNITS.to_string(),
            amount: round2(transport),
        },
        CostLine {
            category: TRANSPORT_TRIPS.to_string(),
            amount: round2(trips),
        },
        CostLine {
            category: PRODUCTION.to_string(),
            amount: round2(production),
        },
    ];

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::network::NetworkData;
    use crate::objective::ObjectiveKind;

    fn data() -> NetworkData {
        serde_json::from_str(
            r#"{
            "customers": [{ "id": "C1" }],
            "facilities": [{ "id": "F1", "kind": "factory" }],
            "suppliers": [{ "id": "S1" }],
            "products": [{ "id": "P1", "unit": "kg" }, { "id": "P2" }],
            "periods": [{ "id": "T1" }],
            "vehicleTypes": [{ "id": "truck", "capacity": 10, "fixed_cost": 100 }],
            "paths": [
                { "from": "S1", "to": "F1", "unit_cost": 2 },
                { "from": "F1", "to": "C1", "unit_cost": 1.5, "fixed_cost": 20, "shipping_policy": "FTL", "vehicle_type": "truck" }
            ],
            "production": [
                { "facility": "F1", "product": "P1", "period": "T1", "unit_cost": 3,
                  "bom": [{ "product": "P2", "quantity": 2 }, { "product": "P1", "quantity": 0.5 }] }
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_records_and_summary() {
        let data = data();
        let config = OptimizerConfig::default();
        let model = build_model(&data, ObjectiveKind::MinCost, &config).unwrap();

        // flows: S1->F1 P1, S1->F1 P2, F1->C1 P1, F1->C1 P2; production; trips
        let values = vec![7.5, 30.0, 15.0, 0.0, 15.0, 1.5];
        let report = extract(&model, &values, &config).unwrap();

        assert_eq!(report.product_flow.len(), 3);
        assert_eq!(report.product_flow[0].unit, "kg");
        assert_eq!(report.product_flow[2].cost, 22.5);

        assert_eq!(report.production.len(), 1);
        assert_eq!(report.production[0].bom, "P2:2, P1:0.5");
        assert_eq!(report.production[0].cost, 45.0);

        assert_eq!(report.vehicle_flow.len(), 1);
        assert_eq!(report.vehicle_flow[0].trip_count, 2);
        assert_eq!(report.vehicle_flow[0].cost, 240.0);
        assert_eq!(report.rounded_trips, 1);

        let categories: Vec<&str> = report.cost_summary.iter().map(|l| l.category.as_str()).collect();
        assert_eq!(categories, vec![TOTAL, TRANSPORT_UNITS, TRANSPORT_TRIPS, PRODUCTION]);
        assert_eq!(report.cost_summary[1].amount, 15.0 + 60.0 + 22.5);
        assert_eq!(report.total_cost(), Some(97.5 + 240.0 + 45.0));
    }

    #[test]
    fn test_threshold_hides_tiny_values() {
        let data = data();
        let config = OptimizerConfig::default();
        let model = build_model(&data, ObjectiveKind::MinCost, &config).unwrap();

        let values = vec![0.005, 4.0, 0.0, 0.0, 0.0, 0.0];
        let report = extract(&model, &values, &config).unwrap();
        assert_eq!(report.product_flow.len(), 1);
        assert_eq!(report.total_cost(), Some(8.0));

        let listed: f64 = report.product_flow.iter().map(|f| f.cost).sum();
        assert_eq!(report.cost_summary[1].amount, listed);
    }

    #[test]
    fn test_integral_trips_are_not_counted_as_rounded() {
        let data = data();
        let config = OptimizerConfig::default();
        let model = build_model(&data, ObjectiveKind::MinCost, &config).unwrap();

        let values = vec![0.0, 0.0, 20.0, 0.0, 0.0, 2.0 + 1e-9];
        let report = extract(&model, &values, &config).unwrap();
        assert_eq!(report.vehicle_flow[0].trip_count, 2);
        assert_eq!(report.rounded_trips, 0);
    }

    #[test]
    fn test_value_count_mismatch() {
        let data = data();
        let config = OptimizerConfig::default();
        let model = build_model(&data, ObjectiveKind::MinCost, &config).unwrap();

        let err = extract(&model, &[1.0], &config).unwrap_err();
        assert_eq!(err, ReportError::ValueCount { expected: 6, found: 1 });
    }
}
