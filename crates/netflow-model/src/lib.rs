pub mod builder;
pub mod config;
pub mod index;
pub mod network;
pub mod objective;
pub mod report;
pub mod service;
pub mod variables;

pub use builder::{build_model, BuildError, ModelBuilder, ModelStats, NetworkModel};
pub use config::{ConfigError, OptimizerConfig};
pub use index::{NetworkIndex, NodeKind};
pub use network::*;
pub use objective::{CostBook, ObjectiveKind, ObjectiveStrategy};
pub use report::{extract, CostLine, FlowReport, ProductFlow, ProductionRow, ReportError, VehicleFlow};
pub use service::{optimize, OptimizeError, OptimizeRequest, OptimizeResponse, Settings};
pub use variables::{VarId, VarKey, VariableArena};
