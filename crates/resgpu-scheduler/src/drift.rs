//! Drift detection between declared node usage and running workloads

use resgpu_core::{NodeResource, NodeResourceInfo, WorkloadResource};
use serde::Serialize;

/// Comparison of a node's declared usage with what its workloads hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    /// Sum of all workload resources
    pub actual_usage: NodeResource,
    /// One human-readable line per discrepancy
    pub diffs: Vec<String>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.diffs.is_empty()
    }
}

/// Compare declared usage against the sum of the live workloads.
///
/// A total mismatch produces one diff; every product the workloads hold
/// that is missing from declared usage, or declared with another count,
/// produces one more.
pub fn reconcile(info: &NodeResourceInfo, workloads: &[WorkloadResource]) -> DriftReport {
    let mut actual_usage = NodeResource::default();
    for workload in workloads {
        actual_usage.add(&workload.prod_count_map);
    }

    let declared = &info.usage.prod_count_map;
    let mut diffs = Vec::new();

    if actual_usage.count() != info.usage.count() {
        diffs.push(format!(
            "node.GPUUsed != sum(workload.GPURequest): {} != {}",
            info.usage.count(),
            actual_usage.count()
        ));
    }
    for (prod, count) in actual_usage.prod_count_map.iter() {
        if !declared.contains(prod) {
            diffs.push(format!("{} not in usage", prod));
        } else if declared.get(prod) != count {
            diffs.push(format!(
                "{}: usage {} != sum(workload) {}",
                prod,
                declared.get(prod),
                count
            ));
        }
    }

    DriftReport {
        actual_usage,
        diffs,
    }
}

/// Overwrite the declared usage with what the workloads actually hold.
///
/// Returns whether anything had drifted; a clean report leaves `info` as is.
pub fn repair(info: &mut NodeResourceInfo, report: &DriftReport) -> bool {
    if !report.has_drift() {
        return false;
    }
    info.usage = report.actual_usage.clone();
    true
}

/// What a repair found and whether the repaired record was saved
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub capacity: NodeResource,
    pub usage: NodeResource,
    /// Discrepancies found, followed by the save error if there was one
    pub diffs: Vec<String>,
    /// Save failure, kept apart so callers can tell it from drift
    #[serde(skip)]
    pub persist_error: Option<String>,
}

impl RepairOutcome {
    pub fn new(info: NodeResourceInfo, diffs: Vec<String>) -> Self {
        Self {
            capacity: info.capacity,
            usage: info.usage,
            diffs,
            persist_error: None,
        }
    }

    /// Record a failed save without failing the repair
    pub fn with_persist_error(mut self, error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        self.diffs.push(message.clone());
        self.persist_error = Some(message);
        self
    }
}
