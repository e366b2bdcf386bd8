use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::index::NetworkIndex;
use crate::network::PricingMode;
use crate::variables::VarKey;

/// Which objective the request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    MinCost,
    MinTime,
    MaxService,
}

impl ObjectiveKind {
    pub fn strategy(self) -> Box<dyn ObjectiveStrategy> {
        match self {
            ObjectiveKind::MinCost => Box::new(MinCost),
            ObjectiveKind::MinTime => Box::new(MinTime),
            ObjectiveKind::MaxService => Box::new(MaxService),
        }
    }
}

/// Derives one objective coefficient per decision variable.
///
/// Every strategy is expressed as a minimization.
pub trait ObjectiveStrategy {
    fn name(&self) -> &'static str;

    fn coefficient(&self, key: &VarKey, index: &NetworkIndex<'_>, config: &OptimizerConfig) -> f64;
}

/// Monetary cost lookups shared by the objective and the report
pub struct CostBook<'i, 'a> {
    index: &'i NetworkIndex<'a>,
    config: &'i OptimizerConfig,
}

impl<'i, 'a> CostBook<'i, 'a> {
    pub fn new(index: &'i NetworkIndex<'a>, config: &'i OptimizerConfig) -> Self {
        Self { index, config }
    }

    /// Transport cost per unit moved on `path`
    pub fn unit_transport_cost(&self, path: usize) -> f64 {
        let lane = self.index.path(path);
        match lane.pricing_mode {
            PricingMode::Product => lane.unit_cost,
            PricingMode::Distance => lane.distance.unwrap_or(0.0) * self.config.costs.distance_rate,
        }
    }

    pub fn unit_production_cost(&self, site: usize, product: usize, period: usize) -> f64 {
        self.index
            .production_record(site, product, period)
            .and_then(|r| r.unit_cost)
            .unwrap_or(self.config.costs.default_production_cost)
    }

    /// Cost of one trip: the lane's fixed cost plus the vehicle's
    pub fn trip_cost(&self, path: usize, vehicle_type: usize) -> f64 {
        let vehicle = self
            .index
            .vehicle(vehicle_type)
            .fixed_cost
            .unwrap_or(self.config.costs.default_trip_cost);
        self.index.path(path).fixed_cost + vehicle
    }

    /// Cost per unit of the variable
    pub fn unit_cost(&self, key: &VarKey) -> f64 {
        match *key {
            VarKey::Flow { path, .. } => self.unit_transport_cost(path),
            VarKey::Production {
                site,
                product,
                period,
            } => self.unit_production_cost(site, product, period),
            VarKey::Trip {
                path, vehicle_type, ..
            } => self.trip_cost(path, vehicle_type),
        }
    }
}

pub struct MinCost;

impl ObjectiveStrategy for MinCost {
    fn name(&self) -> &'static str {
        "min_cost"
    }

    fn coefficient(&self, key: &VarKey, index: &NetworkIndex<'_>, config: &OptimizerConfig) -> f64 {
        CostBook::new(index, config).unit_cost(key)
    }
}

/// Unit-weighted transit time: lead time when given, else distance over average speed
pub struct MinTime;

impl ObjectiveStrategy for MinTime {
    fn name(&self) -> &'static str {
        "min_time"
    }

    fn coefficient(&self, key: &VarKey, index: &NetworkIndex<'_>, config: &OptimizerConfig) -> f64 {
        match *key {
            VarKey::Flow { path, .. } => {
                let lane = index.path(path);
                lane.lead_time
                    .or_else(|| lane.distance.map(|d| d / config.time.average_speed))
                    .unwrap_or(0.0)
            }
            VarKey::Production { .. } | VarKey::Trip { .. } => 0.0,
        }
    }
}

/// Unit-weighted unreliability `1 - service_level`; minimizing it maximizes service
pub struct MaxService;

impl ObjectiveStrategy for MaxService {
    fn name(&self) -> &'static str {
        "max_service"
    }

    fn coefficient(&self, key: &VarKey, index: &NetworkIndex<'_>, config: &OptimizerConfig) -> f64 {
        match *key {
            VarKey::Flow { path, .. } => {
                let level = index
                    .path(path)
                    .service_level
                    .unwrap_or(config.service.default_service_level);
                1.0 - level
            }
            VarKey::Production { .. } | VarKey::Trip { .. } => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkData;

    fn data() -> NetworkData {
        serde_json::from_str(
            r#"{
            "customers": [{ "id": "C1" }],
            "facilities": [{ "id": "F1", "kind": "factory" }],
            "products": [{ "id": "P1" }],
            "periods": [{ "id": "T1" }],
            "vehicleTypes": [{ "id": "truck", "capacity": 100 }, { "id": "van", "capacity": 20, "fixed_cost": 80 }],
            "paths": [
                { "from": "F1", "to": "C1", "unit_cost": 4.0, "lead_time": 2.0, "service_level": 0.9 },
                { "from": "F1", "to": "C1", "pricing_mode": "distance", "distance": 120, "shipping_policy": "FTL", "vehicle_type": "truck", "fixed_cost": 25 },
                { "from": "F1", "to": "C1", "shipping_policy": "FTL", "vehicle_type": "van" }
            ],
            "production": [{ "facility": "F1", "product": "P1", "period": "T1" }]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_cost_book_uses_configured_fallbacks() {
        let data = data();
        let index = NetworkIndex::new(&data).unwrap();
        let mut config = OptimizerConfig::default();
        config.costs.distance_rate = 0.5;
        let costs = CostBook::new(&index, &config);
        let f1 = index.node_index("F1").unwrap();

        assert_eq!(costs.unit_transport_cost(0), 4.0);
        assert_eq!(costs.unit_transport_cost(1), 60.0);
        assert_eq!(costs.unit_production_cost(f1, 0, 0), 50.0);
        assert_eq!(costs.trip_cost(1, 0), 525.0);
        assert_eq!(costs.trip_cost(2, 1), 80.0);
    }

    #[test]
    fn test_time_and_service_coefficients() {
        let data = data();
        let index = NetworkIndex::new(&data).unwrap();
        let config = OptimizerConfig::default();
        let lane0 = VarKey::Flow { path: 0, product: 0, period: 0 };
        let lane1 = VarKey::Flow { path: 1, product: 0, period: 0 };
        let trip = VarKey::Trip { path: 1, vehicle_type: 0, period: 0 };

        let time = ObjectiveKind::MinTime.strategy();
        assert_eq!(time.coefficient(&lane0, &index, &config), 2.0);
        assert_eq!(time.coefficient(&lane1, &index, &config), 2.0);
        assert_eq!(time.coefficient(&trip, &index, &config), 0.0);

        let service = ObjectiveKind::MaxService.strategy();
        approx::assert_abs_diff_eq!(service.coefficient(&lane0, &index, &config), 0.1, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(service.coefficient(&lane1, &index, &config), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_objective_kind_from_json() {
        let kind: ObjectiveKind = serde_json::from_str("\"max_service\"").unwrap();
        assert_eq!(kind, ObjectiveKind::MaxService);
        assert_eq!(kind.strategy().name(), "max_service");
    }
}
