//! resgpu-plugin: GPU resource plugin operations
//!
//! This crate exposes the operations a cluster orchestrator calls on the
//! plugin. Each one loads node records from a [`resgpu_store::Store`],
//! runs the engines from `resgpu-scheduler` and persists at most one record:
//! - Node lifecycle: add, remove
//! - Capacity and usage updates, record reads and repair
//! - Deploy capacity estimation and most idle node selection
//! - Deploy, realloc and remap planning
//! - Metrics

pub mod calculate;
pub mod metrics;
pub mod node;
pub mod plugin;

pub use calculate::RemapPlan;
pub use metrics::{Metric, MetricDescription};
pub use node::{MostIdleNode, NodeResourceReport, ResourceChange, IDLE_PRIORITY};
pub use plugin::Plugin;
