use std::collections::HashMap;

use netflow_solver::{ConstraintOp, LpProblem};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::OptimizerConfig;
use crate::index::{NetworkIndex, NodeKind};
use crate::network::NetworkData;
use crate::objective::ObjectiveKind;
use crate::variables::{VarId, VarKey, VariableArena};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Unknown {kind} '{id}' referenced by {referenced_by}")]
    UnresolvedReference {
        kind: &'static str,
        id: String,
        referenced_by: String,
    },
    #[error("Duplicate {kind} '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("Invalid value in {context}: {reason}")]
    InvalidValue { context: String, reason: String },
}

/// Variable and constraint counts of a built model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub flow_variables: usize,
    pub production_variables: usize,
    pub trip_variables: usize,
    pub balance_rows: usize,
    pub supply_rows: usize,
    pub vehicle_rows: usize,
    pub production_rows: usize,
    pub flow_rule_rows: usize,
}

impl ModelStats {
    pub fn variables(&self) -> usize {
        self.flow_variables + self.production_variables + self.trip_variables
    }

    pub fn constraints(&self) -> usize {
        self.balance_rows + self.supply_rows + self.vehicle_rows + self.production_rows + self.flow_rule_rows
    }
}

/// LP model of one request, with the key arena mapping columns back to the network
#[derive(Debug)]
pub struct NetworkModel<'a> {
    pub index: NetworkIndex<'a>,
    pub vars: VariableArena,
    pub lp: LpProblem,
    pub objective: ObjectiveKind,
    pub stats: ModelStats,
}

/// Index `data`, then build its LP for `objective`
pub fn build_model<'a>(
    data: &'a NetworkData,
    objective: ObjectiveKind,
    config: &OptimizerConfig,
) -> Result<NetworkModel<'a>, BuildError> {
    let index = NetworkIndex::new(data)?;
    Ok(ModelBuilder::new(index, config).build(objective))
}

type TermMap = HashMap<(usize, usize, usize), Vec<(usize, f64)>>;

/// Translates an indexed network into an [`LpProblem`]
pub struct ModelBuilder<'a, 'c> {
    index: NetworkIndex<'a>,
    config: &'c OptimizerConfig,
    vars: VariableArena,
    stats: ModelStats,
}

impl<'a, 'c> ModelBuilder<'a, 'c> {
    pub fn new(index: NetworkIndex<'a>, config: &'c OptimizerConfig) -> Self {
        Self {
            index,
            config,
            vars: VariableArena::new(),
            stats: ModelStats::default(),
        }
    }

    pub fn build(mut self, objective: ObjectiveKind) -> NetworkModel<'a> {
        self.add_flow_variables();
        self.add_production_variables();
        self.add_trip_variables();

        let names = self.vars.iter().map(|(_, key)| self.variable_name(key)).collect();
        let mut lp = LpProblem::new(names);

        let strategy = objective.strategy();
        let coefficients = self
            .vars
            .iter()
            .map(|(_, key)| strategy.coefficient(key, &self.index, self.config))
            .collect();
        lp.set_objective(coefficients, true);

        for (id, key) in self.vars.iter() {
            lp.set_upper_bound(id.0, self.config.model.upper_bound());
            if key.is_integer() {
                lp.mark_integer(id.0);
            }
        }

        self.add_balance_constraints(&mut lp);
        self.add_vehicle_constraints(&mut lp);
        self.add_production_bounds(&mut lp);
        self.add_flow_rules(&mut lp);

        debug!(
            objective = strategy.name(),
            variables = self.stats.variables(),
            constraints = self.stats.constraints(),
            "built network model"
        );

        NetworkModel {
            index: self.index,
            vars: self.vars,
            lp,
            objective,
            stats: self.stats,
        }
    }

    fn num_products(&self) -> usize {
        self.index.data.products.len()
    }

    fn num_periods(&self) -> usize {
        self.index.data.periods.len()
    }

    fn add_flow_variables(&mut self) {
        let paths: Vec<usize> = self.index.included_paths().collect();
        for path in paths {
            for product in 0..self.num_products() {
                for period in 0..self.num_periods() {
                    self.vars.insert(VarKey::Flow {
                        path,
                        product,
                        period,
                    });
                    self.stats.flow_variables += 1;
                }
            }
        }
    }

    fn add_production_variables(&mut self) {
        for (site, product, period, _) in self.index.production_records() {
            self.vars.insert(VarKey::Production {
                site,
                product,
                period,
            });
            self.stats.production_variables += 1;
        }
    }

    fn add_trip_variables(&mut self) {
        let lanes: Vec<(usize, usize)> = self
            .index
            .included_paths()
            .filter_map(|path| self.index.paths[path].vehicle_type.map(|v| (path, v)))
            .collect();
        for (path, vehicle_type) in lanes {
            for period in 0..self.num_periods() {
                self.vars.insert(VarKey::Trip {
                    path,
                    vehicle_type,
                    period,
                });
                self.stats.trip_variables += 1;
            }
        }
    }

    fn variable_name(&self, key: &VarKey) -> String {
        let data = self.index.data;
        match *key {
            VarKey::Flow {
                path,
                product,
                period,
            } => format!(
                "flow[{}|{}|{}]",
                data.paths[path].label(),
                data.products[product].id,
                data.periods[period].id
            ),
            VarKey::Production {
                site,
                product,
                period,
            } => format!(
                "make[{}|{}|{}]",
                self.index.nodes[site].id, data.products[product].id, data.periods[period].id
            ),
            VarKey::Trip {
                path,
                vehicle_type,
                period,
            } => format!(
                "trips[{}|{}|{}]",
                data.paths[path].label(),
                data.vehicle_types[vehicle_type].id,
                data.periods[period].id
            ),
        }
    }

    fn row_name(&self, prefix: &str, node: usize, product: usize, period: usize) -> String {
        let data = self.index.data;
        format!(
            "{}[{}|{}|{}]",
            prefix, self.index.nodes[node].id, data.products[product].id, data.periods[period].id
        )
    }

    fn production_var(&self, site: usize, product: usize, period: usize) -> Option<VarId> {
        self.vars.get(&VarKey::Production {
            site,
            product,
            period,
        })
    }

    /// Inbound and outbound flow terms per (node, product, period), plus the
    /// component consumption of every production variable
    fn collect_terms(&self) -> (TermMap, TermMap, TermMap) {
        let mut inbound: TermMap = HashMap::new();
        let mut outbound: TermMap = HashMap::new();
        let mut consumption: TermMap = HashMap::new();

        for (id, key) in self.vars.iter() {
            match *key {
                VarKey::Flow {
                    path,
                    product,
                    period,
                } => {
                    let lane = &self.index.paths[path];
                    inbound
                        .entry((lane.to, product, period))
                        .or_default()
                        .push((id.0, 1.0));
                    outbound
                        .entry((lane.from, product, period))
                        .or_default()
                        .push((id.0, -1.0));
                }
                VarKey::Production {
                    site,
                    product,
                    period,
                } => {
                    for &(component, quantity) in self.index.bom(site, product, period) {
                        consumption
                            .entry((site, component, period))
                            .or_default()
                            .push((id.0, -quantity));
                    }
                }
                VarKey::Trip { .. } => {}
            }
        }

        (inbound, outbound, consumption)
    }

    /// Flow balance for every included node, product and period.
    ///
    /// Customers and DCs: `in - out - consumption = demand`.
    /// Where a facility produces the product, finished goods leave only through
    /// production (`make - out = 0`) and inbound units feed the bill of
    /// materials (`in - consumption = 0`).
    /// Suppliers are sources: `out <= capacity` when a capacity is given.
    fn add_balance_constraints(&mut self, lp: &mut LpProblem) {
        let (inbound, outbound, consumption) = self.collect_terms();
        let terms = |map: &TermMap, key: (usize, usize, usize)| map.get(&key).cloned().unwrap_or_default();

        for node in 0..self.index.nodes.len() {
            let info = &self.index.nodes[node];
            if !info.include {
                continue;
            }
            for product in 0..self.num_products() {
                for period in 0..self.num_periods() {
                    let key = (node, product, period);

                    if info.kind == NodeKind::Supplier {
                        if let Some(capacity) = info.capacity {
                            let out: Vec<(usize, f64)> =
                                terms(&outbound, key).into_iter().map(|(j, c)| (j, -c)).collect();
                            lp.add_constraint(
                                self.row_name("supply", node, product, period),
                                out,
                                ConstraintOp::Le,
                                capacity,
                            );
                            self.stats.supply_rows += 1;
                        }
                        continue;
                    }

                    let demand = self.index.demand(node, product, period);
                    match self.production_var(node, product, period) {
                        Some(make) => {
                            let mut output = vec![(make.0, 1.0)];
                            output.extend(terms(&outbound, key));
                            lp.add_constraint(
                                self.row_name("output", node, product, period),
                                output,
                                ConstraintOp::Eq,
                                demand,
                            );

                            let mut input = terms(&inbound, key);
                            input.extend(terms(&consumption, key));
                            lp.add_constraint(
                                self.row_name("input", node, product, period),
                                input,
                                ConstraintOp::Eq,
                                0.0,
                            );
                            self.stats.balance_rows += 2;
                        }
                        None => {
                            let mut row = terms(&inbound, key);
                            row.extend(terms(&outbound, key));
                            row.extend(terms(&consumption, key));
                            lp.add_constraint(
                                self.row_name("balance", node, product, period),
                                row,
                                ConstraintOp::Eq,
                                demand,
                            );
                            self.stats.balance_rows += 1;
                        }
                    }
                }
            }
        }
    }

    /// FTL capacity and minimum load, linking each lane's flow to its trip count
    fn add_vehicle_constraints(&mut self, lp: &mut LpProblem) {
        let trips: Vec<(VarId, usize, usize, usize)> = self
            .vars
            .iter()
            .filter_map(|(id, key)| match *key {
                VarKey::Trip {
                    path,
                    vehicle_type,
                    period,
                } => Some((id, path, vehicle_type, period)),
                _ => None,
            })
            .collect();

        for (trip, path, vehicle_type, period) in trips {
            let capacity = self.index.vehicle(vehicle_type).capacity;
            let ratio = self.index.path(path).min_load_ratio;
            let label = format!(
                "{}|{}",
                self.index.path(path).label(),
                self.index.data.periods[period].id
            );

            let flows: Vec<(usize, f64)> = (0..self.num_products())
                .filter_map(|product| {
                    self.vars.get(&VarKey::Flow {
                        path,
                        product,
                        period,
                    })
                })
                .map(|id| (id.0, 1.0))
                .collect();

            let mut row = flows.clone();
            row.push((trip.0, -capacity));
            lp.add_constraint(format!("ftl_capacity[{}]", label), row, ConstraintOp::Le, 0.0);
            self.stats.vehicle_rows += 1;

            if ratio > 0.0 {
                let mut row = flows;
                row.push((trip.0, -capacity * ratio));
                lp.add_constraint(format!("ftl_min_load[{}]", label), row, ConstraintOp::Ge, 0.0);
                self.stats.vehicle_rows += 1;
            }
        }
    }

    fn add_production_bounds(&mut self, lp: &mut LpProblem) {
        for (site, product, period, record) in self.index.production_records() {
            let Some(make) = self.production_var(site, product, period) else {
                continue;
            };
            if let Some(max) = record.max_throughput {
                lp.add_constraint(
                    self.row_name("max_throughput", site, product, period),
                    vec![(make.0, 1.0)],
                    ConstraintOp::Le,
                    max,
                );
                self.stats.production_rows += 1;
            }
            if let Some(min) = record.min_throughput {
                lp.add_constraint(
                    self.row_name("min_throughput", site, product, period),
                    vec![(make.0, 1.0)],
                    ConstraintOp::Ge,
                    min,
                );
                self.stats.production_rows += 1;
            }
        }
    }

    fn add_flow_rules(&mut self, lp: &mut LpProblem) {
        for rule in &self.index.flow_rules {
            let periods: Vec<usize> = match rule.period {
                Some(period) => vec![period],
                None => (0..self.num_periods()).collect(),
            };
            for &path in &rule.paths {
                for &period in &periods {
                    let Some(flow) = self.vars.get(&VarKey::Flow {
                        path,
                        product: rule.product,
                        period,
                    }) else {
                        continue;
                    };
                    let period_id = &self.index.data.periods[period].id;
                    if let Some(min) = rule.min_quantity {
                        lp.add_constraint(
                            format!("{} min|{}", rule.label, period_id),
                            vec![(flow.0, 1.0)],
                            ConstraintOp::Ge,
                            min,
                        );
                        self.stats.flow_rule_rows += 1;
                    }
                    if let Some(max) = rule.max_quantity {
                        lp.add_constraint(
                            format!("{} max|{}", rule.label, period_id),
                            vec![(flow.0, 1.0)],
                            ConstraintOp::Le,
                            max,
                        );
                        self.stats.flow_rule_rows += 1;
                    }
                }
            }
        }
    }
}
