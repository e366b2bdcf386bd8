use serde::{Deserialize, Serialize};

/// Everything the optimizer knows about a logistics network.
///
/// Each array holds flat records keyed by string ids; references between
/// records are resolved by [`crate::NetworkIndex`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkData {
    pub customers: Vec<Customer>,
    pub facilities: Vec<Facility>,
    pub suppliers: Vec<Supplier>,
    pub products: Vec<Product>,
    pub paths: Vec<Path>,
    pub demand: Vec<Demand>,
    pub production: Vec<ProductionRecord>,
    pub vehicle_types: Vec<VehicleType>,
    pub periods: Vec<Period>,
    pub flow_rules: Vec<FlowRule>,
    /// Stock positions owned by the inventory simulator; carried through untouched
    pub inventory: Vec<InventoryRecord>,
}

fn default_true() -> bool {
    true
}

fn default_unit() -> String {
    "unit".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub include: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityKind {
    #[serde(alias = "Factory", alias = "FACTORY")]
    Factory,
    #[serde(alias = "DC", alias = "Dc")]
    Dc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: FacilityKind,
    #[serde(default = "default_true")]
    pub include: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Maximum outbound quantity per product and period
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default = "default_true")]
    pub include: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShippingPolicy {
    #[serde(alias = "ftl")]
    Ftl,
    #[default]
    #[serde(alias = "ltl")]
    Ltl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Per-unit cost taken from the lane's `unit_cost`
    #[default]
    Product,
    /// Per-unit cost derived from the lane's distance
    Distance,
}

/// A directed transport lane between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    #[serde(default)]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default = "default_true")]
    pub include: bool,
    #[serde(default, alias = "product_cost")]
    pub unit_cost: f64,
    /// Lane cost per FTL trip, on top of the vehicle's own trip cost
    #[serde(default)]
    pub fixed_cost: f64,
    #[serde(default)]
    pub shipping_policy: ShippingPolicy,
    #[serde(default)]
    pub pricing_mode: PricingMode,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub min_load_ratio: f64,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    /// Transit time, used by the minimize-time objective
    #[serde(default)]
    pub lead_time: Option<f64>,
    /// On-time delivery probability in [0, 1], used by the maximize-service objective
    #[serde(default)]
    pub service_level: Option<f64>,
}

impl Path {
    /// Human-readable lane label for diagnostics
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}->{}", self.from, self.to),
        }
    }

    pub fn is_ftl(&self) -> bool {
        self.shipping_policy == ShippingPolicy::Ftl
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub customer: String,
    pub product: String,
    pub period: String,
    pub quantity: f64,
}

/// One component consumed per unit produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomComponent {
    pub product: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub facility: String,
    pub product: String,
    pub period: String,
    #[serde(default)]
    pub unit_cost: Option<f64>,
    #[serde(default)]
    pub min_throughput: Option<f64>,
    #[serde(default)]
    pub max_throughput: Option<f64>,
    /// Components consumed per unit. `None` consumes the product itself one-for-one
    /// when the facility has inbound lanes; `Some(vec![])` consumes nothing.
    #[serde(default)]
    pub bom: Option<Vec<BomComponent>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: String,
    pub capacity: f64,
    #[serde(default)]
    pub fixed_cost: Option<f64>,
}

/// Quantity limits on a lane's flow of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRule {
    pub from: String,
    pub to: String,
    pub product: String,
    /// Restrict the rule to one period; all periods when absent
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub min_quantity: Option<f64>,
    #[serde(default)]
    pub max_quantity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub facility: String,
    pub product: String,
    #[serde(default)]
    pub quantity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "customers": [{ "id": "C1" }],
            "facilities": [{ "id": "F1", "kind": "Factory" }, { "id": "D1", "kind": "dc", "include": false }],
            "products": [{ "id": "P1" }],
            "paths": [
                { "from": "F1", "to": "C1", "product_cost": 2.5 },
                { "from": "F1", "to": "D1", "shipping_policy": "FTL", "vehicle_type": "truck" }
            ],
            "vehicleTypes": [{ "id": "truck", "capacity": 40 }],
            "flowRules": []
        }"#;

        let data: NetworkData = serde_json::from_str(json).unwrap();

        assert!(data.customers[0].include);
        assert_eq!(data.facilities[0].kind, FacilityKind::Factory);
        assert!(!data.facilities[1].include);
        assert_eq!(data.products[0].unit, "unit");
        assert_eq!(data.paths[0].unit_cost, 2.5);
        assert_eq!(data.paths[0].shipping_policy, ShippingPolicy::Ltl);
        assert_eq!(data.paths[0].pricing_mode, PricingMode::Product);
        assert!(data.paths[1].is_ftl());
        assert_eq!(data.paths[1].label(), "F1->D1");
        assert_eq!(data.vehicle_types[0].fixed_cost, None);
        assert!(data.periods.is_empty());
    }
}
