//! Node resource update engine
//!
//! A capacity or usage change may be described by a node resource request,
//! a full node resource, or a list of workload resources. Exactly one of
//! them is applied, picked by priority request > resource > workloads.

use resgpu_core::{NodeResource, NodeResourceRequest, ProdCountMap, WorkloadResource};

/// The single source a node resource update is computed from
#[derive(Debug, Clone, Copy)]
pub enum ResourceSource<'a> {
    /// Host-side request; an unset ledger counts as empty
    Request(&'a NodeResourceRequest),
    /// A complete node resource
    Resource(&'a NodeResource),
    /// Resources of individual workloads, applied one after another
    Workloads(&'a [WorkloadResource]),
    /// Nothing to apply
    Nothing,
}

impl<'a> ResourceSource<'a> {
    /// Resolve the highest-priority source that was supplied
    pub fn pick(
        request: Option<&'a NodeResourceRequest>,
        resource: Option<&'a NodeResource>,
        workloads: &'a [WorkloadResource],
    ) -> Self {
        if let Some(request) = request {
            ResourceSource::Request(request)
        } else if let Some(resource) = resource {
            ResourceSource::Resource(resource)
        } else if !workloads.is_empty() {
            ResourceSource::Workloads(workloads)
        } else {
            ResourceSource::Nothing
        }
    }

    /// Ledgers to apply, in order
    fn ledgers(&self) -> Vec<ProdCountMap> {
        match self {
            ResourceSource::Request(request) => vec![request.prod_count_map()],
            ResourceSource::Resource(resource) => vec![resource.prod_count_map.clone()],
            ResourceSource::Workloads(workloads) => workloads
                .iter()
                .map(|w| w.prod_count_map.clone())
                .collect(),
            ResourceSource::Nothing => Vec::new(),
        }
    }
}

/// Compute the new node resource.
///
/// With `delta == false` the origin is discarded and the source is added
/// onto an empty ledger; `incr` is ignored because there is nothing to
/// subtract from. With `delta == true` the source is added to (or, when
/// `incr` is false, subtracted from) a copy of the origin.
pub fn calculate_node_resource(
    source: ResourceSource<'_>,
    origin: &NodeResource,
    delta: bool,
    incr: bool,
) -> NodeResource {
    let mut result = if delta {
        origin.clone()
    } else {
        NodeResource::default()
    };
    let incr = incr || !delta;

    for ledger in source.ledgers() {
        if incr {
            result.add(&ledger);
        } else {
            result.sub(&ledger);
        }
    }
    result
}
