use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::builder::BuildError;
use crate::network::{FacilityKind, NetworkData, Path, PricingMode, ProductionRecord, VehicleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Customer,
    Factory,
    Dc,
    Supplier,
}

impl NodeKind {
    pub fn is_facility(self) -> bool {
        matches!(self, NodeKind::Factory | NodeKind::Dc)
    }
}

#[derive(Debug, Clone)]
pub struct NodeInfo<'a> {
    pub id: &'a str,
    pub kind: NodeKind,
    pub include: bool,
    /// Supplier outbound capacity per product and period
    pub capacity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub from: usize,
    pub to: usize,
    pub included: bool,
    pub vehicle_type: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedFlowRule {
    pub paths: Vec<usize>,
    pub product: usize,
    pub period: Option<usize>,
    pub min_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    pub label: String,
}

/// Validated, id-resolved view of a [`NetworkData`].
///
/// Nodes from all three node arrays share one table: customers first, then
/// facilities, then suppliers, each in input order.
#[derive(Debug)]
pub struct NetworkIndex<'a> {
    pub data: &'a NetworkData,
    pub nodes: Vec<NodeInfo<'a>>,
    pub paths: Vec<ResolvedPath>,
    pub flow_rules: Vec<ResolvedFlowRule>,
    /// Data problems that were resolved with a documented fallback
    pub warnings: Vec<String>,
    node_ids: HashMap<&'a str, usize>,
    product_ids: HashMap<&'a str, usize>,
    period_ids: HashMap<&'a str, usize>,
    vehicle_ids: HashMap<&'a str, usize>,
    demand: HashMap<(usize, usize, usize), f64>,
    production: HashMap<(usize, usize, usize), usize>,
    bom: HashMap<(usize, usize, usize), Vec<(usize, f64)>>,
}

fn check_non_negative(value: f64, context: impl FnOnce() -> String, field: &str) -> Result<(), BuildError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BuildError::InvalidValue {
            context: context(),
            reason: format!("{} must be a non-negative number, got {}", field, value),
        })
    }
}

fn index_ids<'a, T>(
    items: &'a [T],
    kind: &'static str,
    id: impl Fn(&'a T) -> &'a str,
) -> Result<HashMap<&'a str, usize>, BuildError> {
    let mut ids = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if ids.insert(id(item), i).is_some() {
            return Err(BuildError::DuplicateId {
                kind,
                id: id(item).to_string(),
            });
        }
    }
    Ok(ids)
}

impl<'a> NetworkIndex<'a> {
    pub fn new(data: &'a NetworkData) -> Result<Self, BuildError> {
        let mut index = NetworkIndex {
            data,
            nodes: Vec::new(),
            paths: Vec::with_capacity(data.paths.len()),
            flow_rules: Vec::new(),
            warnings: Vec::new(),
            node_ids: HashMap::new(),
            product_ids: index_ids(&data.products, "product", |p| p.id.as_str())?,
            period_ids: index_ids(&data.periods, "period", |p| p.id.as_str())?,
            vehicle_ids: index_ids(&data.vehicle_types, "vehicle type", |v| v.id.as_str())?,
            demand: HashMap::new(),
            production: HashMap::new(),
            bom: HashMap::new(),
        };

        index.load_nodes()?;
        index.load_vehicle_types()?;
        index.load_paths()?;
        index.load_demand()?;
        index.load_production()?;
        index.load_flow_rules()?;

        debug!(
            nodes = index.nodes.len(),
            paths = index.paths.iter().filter(|p| p.included).count(),
            products = data.products.len(),
            periods = data.periods.len(),
            "indexed network"
        );
        Ok(index)
    }

    fn push_node(&mut self, node: NodeInfo<'a>) -> Result<(), BuildError> {
        if self.node_ids.insert(node.id, self.nodes.len()).is_some() {
            return Err(BuildError::DuplicateId {
                kind: "node",
                id: node.id.to_string(),
            });
        }
        self.nodes.push(node);
        Ok(())
    }

    fn load_nodes(&mut self) -> Result<(), BuildError> {
        let data = self.data;
        for c in &data.customers {
            self.push_node(NodeInfo {
                id: &c.id,
                kind: NodeKind::Customer,
                include: c.include,
                capacity: None,
            })?;
        }
        for f in &data.facilities {
            let kind = match f.kind {
                FacilityKind::Factory => NodeKind::Factory,
                FacilityKind::Dc => NodeKind::Dc,
            };
            self.push_node(NodeInfo {
                id: &f.id,
                kind,
                include: f.include,
                capacity: None,
            })?;
        }
        for s in &data.suppliers {
            if let Some(capacity) = s.capacity {
                check_non_negative(capacity, || format!("supplier {}", s.id), "capacity")?;
            }
            self.push_node(NodeInfo {
                id: &s.id,
                kind: NodeKind::Supplier,
                include: s.include,
                capacity: s.capacity,
            })?;
        }
        Ok(())
    }

    fn load_vehicle_types(&mut self) -> Result<(), BuildError> {
        let data = self.data;
        for v in &data.vehicle_types {
            if !(v.capacity.is_finite() && v.capacity > 0.0) {
                return Err(BuildError::InvalidValue {
                    context: format!("vehicle type {}", v.id),
                    reason: format!("capacity must be positive, got {}", v.capacity),
                });
            }
            if let Some(cost) = v.fixed_cost {
                check_non_negative(cost, || format!("vehicle type {}", v.id), "fixed_cost")?;
            }
        }
        Ok(())
    }

    fn load_paths(&mut self) -> Result<(), BuildError> {
        let data = self.data;
        let mut uncosted = HashSet::new();
        for path in &data.paths {
            let label = || format!("path {}", path.label());
            let from = self.resolve_node(&path.from, &label)?;
            let to = self.resolve_node(&path.to, &label)?;
            let included = path.include && self.nodes[from].include && self.nodes[to].include;

            let mut vehicle_type = None;
            if included {
                if self.nodes[to].kind == NodeKind::Supplier {
                    return Err(BuildError::InvalidValue {
                        context: label(),
                        reason: format!("lanes cannot deliver into supplier {}", path.to),
                    });
                }
                self.validate_path(path)?;
                if path.is_ftl() {
                    let Some(vehicle) = &path.vehicle_type else {
                        return Err(BuildError::InvalidValue {
                            context: label(),
                            reason: "FTL lanes need a vehicle_type".to_string(),
                        });
                    };
                    let v = self.vehicle_ids.get(vehicle.as_str()).copied().ok_or_else(|| {
                        BuildError::UnresolvedReference {
                            kind: "vehicle type",
                            id: vehicle.clone(),
                            referenced_by: label(),
                        }
                    })?;
                    if data.vehicle_types[v].fixed_cost.is_none() && uncosted.insert(v) {
                        self.warn(format!(
                            "vehicle type {} has no fixed_cost; using the default trip cost",
                            vehicle
                        ));
                    }
                    vehicle_type = Some(v);
                }
            }

            self.paths.push(ResolvedPath {
                from,
                to,
                included,
                vehicle_type,
            });
        }
        Ok(())
    }

    fn validate_path(&self, path: &Path) -> Result<(), BuildError> {
        let label = || format!("path {}", path.label());
        check_non_negative(path.unit_cost, label, "unit_cost")?;
        check_non_negative(path.fixed_cost, label, "fixed_cost")?;
        if !(0.0..=1.0).contains(&path.min_load_ratio) {
            return Err(BuildError::InvalidValue {
                context: label(),
                reason: format!("min_load_ratio must lie in [0, 1], got {}", path.min_load_ratio),
            });
        }
        match (path.pricing_mode, path.distance) {
            (PricingMode::Distance, None) => {
                return Err(BuildError::InvalidValue {
                    context: label(),
                    reason: "distance pricing needs a distance".to_string(),
                });
            }
            (_, Some(distance)) => check_non_negative(distance, label, "distance")?,
            _ => {}
        }
        if let Some(lead_time) = path.lead_time {
            check_non_negative(lead_time, label, "lead_time")?;
        }
        if let Some(level) = path.service_level {
            if !(0.0..=1.0).contains(&level) {
                return Err(BuildError::InvalidValue {
                    context: label(),
                    reason: format!("service_level must lie in [0, 1], got {}", level),
                });
            }
        }
        Ok(())
    }

    fn load_demand(&mut self) -> Result<(), BuildError> {
        let data = self.data;
        for d in &data.demand {
            let label = || format!("demand for {} / {} / {}", d.customer, d.product, d.period);
            let node = self.resolve_node(&d.customer, &label)?;
            if self.nodes[node].kind != NodeKind::Customer {
                return Err(BuildError::UnresolvedReference {
                    kind: "customer",
                    id: d.customer.clone(),
                    referenced_by: label(),
                });
            }
            let product = self.resolve_product(&d.product, &label)?;
            let period = self.resolve_period(&d.period, &label)?;
            check_non_negative(d.quantity, label, "quantity")?;

            if !self.nodes[node].include {
                if d.quantity > 0.0 {
                    self.warn(format!("{} ignored: customer is excluded", label()));
                }
                continue;
            }
            *self.demand.entry((node, product, period)).or_insert(0.0) += d.quantity;
        }
        Ok(())
    }

    fn load_production(&mut self) -> Result<(), BuildError> {
        let data = self.data;

        let mut has_inbound = HashSet::new();
        for p in self.paths.iter().filter(|p| p.included) {
            has_inbound.insert(p.to);
        }

        for (i, record) in data.production.iter().enumerate() {
            let label = || {
                format!(
                    "production of {} at {} in {}",
                    record.product, record.facility, record.period
                )
            };
            let site = self.resolve_node(&record.facility, &label)?;
            if !self.nodes[site].kind.is_facility() {
                return Err(BuildError::UnresolvedReference {
                    kind: "facility",
                    id: record.facility.clone(),
                    referenced_by: label(),
                });
            }
            let product = self.resolve_product(&record.product, &label)?;
            let period = self.resolve_period(&record.period, &label)?;
            self.validate_production(record)?;

            if !self.nodes[site].include {
                continue;
            }
            if self.production.insert((site, product, period), i).is_some() {
                return Err(BuildError::DuplicateId {
                    kind: "production record",
                    id: label(),
                });
            }
            if record.unit_cost.is_none() {
                self.warn(format!("{} has no unit_cost; using the default production cost", label()));
            }

            let components = match &record.bom {
                Some(lines) => {
                    let mut components = Vec::with_capacity(lines.len());
                    for line in lines {
                        let component = self.resolve_product(&line.product, &label)?;
                        check_non_negative(line.quantity, label, "bom quantity")?;
                        components.push((component, line.quantity));
                    }
                    components
                }
                None if has_inbound.contains(&site) => vec![(product, 1.0)],
                None => Vec::new(),
            };
            self.bom.insert((site, product, period), components);
        }
        Ok(())
    }

    fn validate_production(&self, record: &ProductionRecord) -> Result<(), BuildError> {
        let label = || format!("production of {} at {}", record.product, record.facility);
        if let Some(cost) = record.unit_cost {
            check_non_negative(cost, label, "unit_cost")?;
        }
        if let Some(min) = record.min_throughput {
            check_non_negative(min, label, "min_throughput")?;
        }
        if let Some(max) = record.max_throughput {
            check_non_negative(max, label, "max_throughput")?;
        }
        if let (Some(min), Some(max)) = (record.min_throughput, record.max_throughput) {
            if min > max {
                return Err(BuildError::InvalidValue {
                    context: label(),
                    reason: format!("min_throughput {} exceeds max_throughput {}", min, max),
                });
            }
        }
        Ok(())
    }

    fn load_flow_rules(&mut self) -> Result<(), BuildError> {
        let data = self.data;
        for rule in &data.flow_rules {
            let label = || format!("flow rule {}->{} for {}", rule.from, rule.to, rule.product);
            let from = self.resolve_node(&rule.from, &label)?;
            let to = self.resolve_node(&rule.to, &label)?;
            let product = self.resolve_product(&rule.product, &label)?;
            let period = match &rule.period {
                Some(p) => Some(self.resolve_period(p, &label)?),
                None => None,
            };
            if let Some(min) = rule.min_quantity {
                check_non_negative(min, label, "min_quantity")?;
            }
            if let Some(max) = rule.max_quantity {
                check_non_negative(max, label, "max_quantity")?;
            }
            if let (Some(min), Some(max)) = (rule.min_quantity, rule.max_quantity) {
                if min > max {
                    return Err(BuildError::InvalidValue {
                        context: label(),
                        reason: format!("min_quantity {} exceeds max_quantity {}", min, max),
                    });
                }
            }

            let paths: Vec<usize> = self
                .paths
                .iter()
                .enumerate()
                .filter(|(_, p)| p.included && p.from == from && p.to == to)
                .map(|(i, _)| i)
                .collect();
            if paths.is_empty() {
                self.warn(format!("{} matches no included lane", label()));
                continue;
            }

            self.flow_rules.push(ResolvedFlowRule {
                paths,
                product,
                period,
                min_quantity: rule.min_quantity,
                max_quantity: rule.max_quantity,
                label: label(),
            });
        }
        Ok(())
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn resolve_node(&self, id: &str, referenced_by: impl Fn() -> String) -> Result<usize, BuildError> {
        self.node_ids
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::UnresolvedReference {
                kind: "node",
                id: id.to_string(),
                referenced_by: referenced_by(),
            })
    }

    fn resolve_product(&self, id: &str, referenced_by: impl Fn() -> String) -> Result<usize, BuildError> {
        self.product_ids
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::UnresolvedReference {
                kind: "product",
                id: id.to_string(),
                referenced_by: referenced_by(),
            })
    }

    fn resolve_period(&self, id: &str, referenced_by: impl Fn() -> String) -> Result<usize, BuildError> {
        self.period_ids
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::UnresolvedReference {
                kind: "period",
                id: id.to_string(),
                referenced_by: referenced_by(),
            })
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.node_ids.get(id).copied()
    }

    pub fn path(&self, path: usize) -> &'a Path {
        &self.data.paths[path]
    }

    pub fn vehicle(&self, vehicle_type: usize) -> &'a VehicleType {
        &self.data.vehicle_types[vehicle_type]
    }

    /// Indices of paths that carry flow variables
    pub fn included_paths(&self) -> impl Iterator<Item = usize> + '_ {
        self.paths
            .iter()
            .enumerate()
            .filter(|(_, p)| p.included)
            .map(|(i, _)| i)
    }

    pub fn demand(&self, node: usize, product: usize, period: usize) -> f64 {
        self.demand.get(&(node, product, period)).copied().unwrap_or(0.0)
    }

    pub fn total_demand(&self) -> f64 {
        self.demand.values().sum()
    }

    /// Production records of included facilities, in input order, as `(site, product, period, record)`
    pub fn production_records(&self) -> Vec<(usize, usize, usize, &'a ProductionRecord)> {
        let mut records: Vec<_> = self
            .production
            .iter()
            .map(|(&(site, product, period), &i)| (i, site, product, period))
            .collect();
        records.sort_unstable();
        records
            .into_iter()
            .map(|(i, site, product, period)| (site, product, period, &self.data.production[i]))
            .collect()
    }

    pub fn production_record(&self, site: usize, product: usize, period: usize) -> Option<&'a ProductionRecord> {
        self.production
            .get(&(site, product, period))
            .map(|&i| &self.data.production[i])
    }

    /// Components consumed per unit of `product` made at `site` in `period`
    pub fn bom(&self, site: usize, product: usize, period: usize) -> &[(usize, f64)] {
        self.bom
            .get(&(site, product, period))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
