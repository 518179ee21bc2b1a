//! resgpu-scheduler: resource engines for resgpu
//!
//! Pure computations over node resource records, no I/O:
//! - Node resource updates from request, resource or workload sources
//! - Greedy deploy allocation and capacity estimation
//! - Workload reallocation
//! - Usage drift detection and repair
//! - Most idle node selection

pub mod allocator;
pub mod capacity;
pub mod drift;
pub mod idle;
pub mod realloc;
pub mod update;

pub use allocator::{allocate, DeployPlan};
pub use capacity::{estimate, estimate_nodes, NodeDeployCapacity, NodesDeployCapacity, MAX_CAPACITY};
pub use drift::{reconcile, repair, DriftReport, RepairOutcome};
pub use idle::{select_most_idle, IdleNode};
pub use realloc::{realloc, ReallocPlan};
pub use update::{calculate_node_resource, ResourceSource};
