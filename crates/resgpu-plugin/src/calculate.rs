//! Deploy, realloc and remap planning

use resgpu_core::{EngineParams, ResgpuResult, WorkloadResource, WorkloadResourceRequest};
use resgpu_scheduler::{allocate, realloc, DeployPlan, ReallocPlan};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::plugin::{ensure_nodename, Plugin};

/// Engine params to apply to already running workloads
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemapPlan {
    /// Always `None`: count-based devices never need remapping
    pub engine_params_map: Option<BTreeMap<String, EngineParams>>,
}

impl Plugin {
    /// Plan `deploy_count` workloads of shape `req` on one node.
    ///
    /// Nothing is persisted; the host applies usage separately.
    pub async fn calculate_deploy(
        &self,
        nodename: &str,
        deploy_count: usize,
        req: &WorkloadResourceRequest,
    ) -> ResgpuResult<DeployPlan> {
        ensure_nodename(nodename)?;
        if let Err(e) = req.validate() {
            error!(node = %nodename, error = %e, "Invalid workload resource request");
            return Err(e);
        }

        let info = self.load_node(nodename).await.map_err(|e| {
            error!(node = %nodename, error = %e, "Failed to get resource info of node");
            e
        })?;

        let plan = allocate(&info, deploy_count, req)?;
        debug!(node = %nodename, count = plan.len(), "Calculated deploy");
        Ok(plan)
    }

    /// Plan a resize of a workload currently holding `origin`
    pub async fn calculate_realloc(
        &self,
        nodename: &str,
        origin: &WorkloadResource,
        req: &WorkloadResourceRequest,
    ) -> ResgpuResult<ReallocPlan> {
        ensure_nodename(nodename)?;
        let info = self.load_node(nodename).await.map_err(|e| {
            error!(node = %nodename, error = %e, "Failed to get resource info of node");
            e
        })?;

        realloc(&info, origin, req)
    }

    /// Remap running workloads after a node change
    pub async fn calculate_remap(
        &self,
        nodename: &str,
        workloads_resource: &BTreeMap<String, WorkloadResource>,
    ) -> ResgpuResult<RemapPlan> {
        debug!(
            node = %nodename,
            workloads = workloads_resource.len(),
            "No remap needed"
        );
        Ok(RemapPlan::default())
    }
}
