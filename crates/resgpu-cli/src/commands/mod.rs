//! CLI commands implementation

use anyhow::{Context, Result};
use resgpu_core::{
    EngineInfo, NodeResource, NodeResourceRequest, ResgpuError, WorkloadResource,
    WorkloadResourceRequest,
};
use resgpu_plugin::{NodeResourceReport, Plugin};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::io::AsyncReadExt;

/// Read one JSON request from stdin
pub async fn read_request<T: DeserializeOwned>() -> Result<T> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read request from stdin")?;
    parse_request(&input)
}

/// Parse a request; empty input is an empty object
pub fn parse_request<T: DeserializeOwned>(input: &str) -> Result<T> {
    let input = if input.trim().is_empty() { "{}" } else { input };
    serde_json::from_str(input).context("invalid request")
}

/// Request naming a single node
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeRequest {
    pub nodename: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddNodeRequest {
    pub nodename: String,
    pub resource: Option<NodeResourceRequest>,
    pub info: Option<EngineInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodesDeployCapacityRequest {
    pub nodenames: Option<Vec<String>>,
    pub workload_resource: Option<WorkloadResourceRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetNodeResourceRequest {
    pub nodename: String,
    pub resource_request: Option<NodeResourceRequest>,
    pub resource: Option<NodeResource>,
    /// Only read for usage updates
    pub workloads_resource: Option<Vec<WorkloadResource>>,
    pub delta: bool,
    pub incr: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeWorkloadsRequest {
    pub nodename: String,
    pub workloads_resource: Option<Vec<WorkloadResource>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetNodeResourceInfoRequest {
    pub nodename: String,
    pub capacity: Option<NodeResource>,
    pub usage: Option<NodeResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalculateDeployRequest {
    pub nodename: String,
    pub deploy_count: usize,
    pub workload_resource_request: Option<WorkloadResourceRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalculateReallocRequest {
    pub nodename: String,
    pub workload_resource: Option<WorkloadResource>,
    pub workload_resource_request: Option<WorkloadResourceRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalculateRemapRequest {
    pub nodename: String,
    pub workloads_resource: Option<BTreeMap<String, WorkloadResource>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodesRequest {
    pub nodenames: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricsRequest {
    pub podname: String,
    pub nodename: String,
}

pub fn name(plugin: &Plugin) -> Value {
    Value::String(plugin.name().to_string())
}

pub async fn add_node(plugin: &Plugin, req: AddNodeRequest) -> Result<Value> {
    let info = plugin
        .add_node(&req.nodename, req.resource.as_ref(), req.info.as_ref())
        .await?;
    Ok(serde_json::to_value(info)?)
}

pub async fn remove_node(plugin: &Plugin, req: NodeRequest) -> Result<Value> {
    plugin.remove_node(&req.nodename).await?;
    Ok(Value::Null)
}

pub async fn get_nodes_deploy_capacity(
    plugin: &Plugin,
    req: NodesDeployCapacityRequest,
) -> Result<Value> {
    let capacity = plugin
        .get_nodes_deploy_capacity(
            &req.nodenames.unwrap_or_default(),
            &req.workload_resource.unwrap_or_default(),
        )
        .await?;
    Ok(serde_json::to_value(capacity)?)
}

pub async fn set_node_resource_capacity(
    plugin: &Plugin,
    req: SetNodeResourceRequest,
) -> Result<Value> {
    let change = plugin
        .set_node_resource_capacity(
            &req.nodename,
            req.resource_request.as_ref(),
            req.resource.as_ref(),
            req.delta,
            req.incr,
        )
        .await?;
    Ok(serde_json::to_value(change)?)
}

pub async fn set_node_resource_usage(plugin: &Plugin, req: SetNodeResourceRequest) -> Result<Value> {
    let change = plugin
        .set_node_resource_usage(
            &req.nodename,
            req.resource_request.as_ref(),
            req.resource.as_ref(),
            &req.workloads_resource.unwrap_or_default(),
            req.delta,
            req.incr,
        )
        .await?;
    Ok(serde_json::to_value(change)?)
}

/// An unknown node reads as an empty record
pub async fn get_node_resource_info(plugin: &Plugin, req: NodeWorkloadsRequest) -> Result<Value> {
    let workloads = req.workloads_resource.unwrap_or_default();
    let report = match plugin.get_node_resource_info(&req.nodename, &workloads).await {
        Ok(report) => report,
        Err(ResgpuError::NodeNotExists(_)) => NodeResourceReport::default(),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::to_value(report)?)
}

pub async fn set_node_resource_info(
    plugin: &Plugin,
    req: SetNodeResourceInfoRequest,
) -> Result<Value> {
    plugin
        .set_node_resource_info(
            &req.nodename,
            req.capacity.unwrap_or_default(),
            req.usage.unwrap_or_default(),
        )
        .await?;
    Ok(Value::Null)
}

pub async fn fix_node_resource(plugin: &Plugin, req: NodeWorkloadsRequest) -> Result<Value> {
    let outcome = plugin
        .fix_node_resource(&req.nodename, &req.workloads_resource.unwrap_or_default())
        .await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn calculate_deploy(plugin: &Plugin, req: CalculateDeployRequest) -> Result<Value> {
    let plan = plugin
        .calculate_deploy(
            &req.nodename,
            req.deploy_count,
            &req.workload_resource_request.unwrap_or_default(),
        )
        .await?;
    Ok(serde_json::to_value(plan)?)
}

pub async fn calculate_realloc(plugin: &Plugin, req: CalculateReallocRequest) -> Result<Value> {
    let plan = plugin
        .calculate_realloc(
            &req.nodename,
            &req.workload_resource.unwrap_or_default(),
            &req.workload_resource_request.unwrap_or_default(),
        )
        .await?;
    Ok(serde_json::to_value(plan)?)
}

pub async fn calculate_remap(plugin: &Plugin, req: CalculateRemapRequest) -> Result<Value> {
    let plan = plugin
        .calculate_remap(&req.nodename, &req.workloads_resource.unwrap_or_default())
        .await?;
    Ok(serde_json::to_value(plan)?)
}

pub async fn get_most_idle_node(plugin: &Plugin, req: NodesRequest) -> Result<Value> {
    let idle = plugin
        .get_most_idle_node(&req.nodenames.unwrap_or_default())
        .await?;
    Ok(serde_json::to_value(idle)?)
}

pub fn get_metrics_description(plugin: &Plugin) -> Result<Value> {
    Ok(serde_json::to_value(plugin.get_metrics_description())?)
}

pub async fn get_metrics(plugin: &Plugin, req: MetricsRequest) -> Result<Value> {
    let metrics = plugin.get_metrics(&req.podname, &req.nodename).await?;
    Ok(serde_json::to_value(metrics)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resgpu_core::PluginConfig;
    use resgpu_store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn create_test_plugin() -> Plugin {
        Plugin::new(&PluginConfig::default(), Arc::new(MemoryStore::new()))
    }

    async fn add_test_node(plugin: &Plugin, nodename: &str) {
        let req = parse_request(&format!(
            r#"{{"nodename": "{}", "resource": {{"prod_count_map": {{"nvidia-3070": 4, "nvidia-3090": 4}}}}}}"#,
            nodename
        ))
        .unwrap();
        add_node(plugin, req).await.unwrap();
    }

    #[test]
    fn test_parse_empty_request() {
        let req: SetNodeResourceRequest = parse_request("").unwrap();
        assert!(req.nodename.is_empty());
        assert!(req.resource_request.is_none());
        assert!(!req.delta);

        let req: NodesRequest = parse_request("  \n").unwrap();
        assert!(req.nodenames.is_none());

        assert!(parse_request::<NodeRequest>("{not json").is_err());
    }

    #[test]
    fn test_parse_null_fields() {
        let req: SetNodeResourceRequest = parse_request(
            r#"{"nodename": "n1", "resource_request": {"prod_count_map": null}, "resource": null}"#,
        )
        .unwrap();
        assert_eq!(req.nodename, "n1");
        assert!(req.resource.is_none());
        let request = req.resource_request.unwrap();
        assert!(request.prod_count_map.is_none());
    }

    #[tokio::test]
    async fn test_name() {
        let plugin = create_test_plugin();
        assert_eq!(name(&plugin), json!("gpu"));
    }

    #[tokio::test]
    async fn test_add_node_response() {
        let plugin = create_test_plugin();
        let req = parse_request(
            r#"{"nodename": "n1", "resource": {"prod_count_map": {"nvidia-3070": 2}}}"#,
        )
        .unwrap();
        let response = add_node(&plugin, req).await.unwrap();
        assert_eq!(
            response,
            json!({
                "capacity": {"prod_count_map": {"nvidia-3070": 2}},
                "usage": {"prod_count_map": {}}
            })
        );
    }

    #[tokio::test]
    async fn test_add_node_without_nodename() {
        let plugin = create_test_plugin();
        let err = add_node(&plugin, AddNodeRequest::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResgpuError>(),
            Some(ResgpuError::EmptyNodeName)
        ));
    }

    #[tokio::test]
    async fn test_get_node_resource_info_absent_node() {
        let plugin = create_test_plugin();
        let req = parse_request(r#"{"nodename": "missing"}"#).unwrap();
        let response = get_node_resource_info(&plugin, req).await.unwrap();
        assert_eq!(
            response,
            json!({
                "capacity": {"prod_count_map": {}},
                "usage": {"prod_count_map": {}},
                "diffs": []
            })
        );
    }

    #[tokio::test]
    async fn test_set_capacity_reads_both_sources() {
        let plugin = create_test_plugin();
        add_test_node(&plugin, "n1").await;

        let req = parse_request(
            r#"{"nodename": "n1", "resource": {"prod_count_map": {"nvidia-3070": 1}}, "delta": true, "incr": true}"#,
        )
        .unwrap();
        let response = set_node_resource_capacity(&plugin, req).await.unwrap();
        assert_eq!(response["before"]["prod_count_map"]["nvidia-3070"], 4);
        assert_eq!(response["after"]["prod_count_map"]["nvidia-3070"], 5);

        // resource_request wins over resource
        let req = parse_request(
            r#"{"nodename": "n1",
                "resource_request": {"prod_count_map": {"nvidia-3090": 2}},
                "resource": {"prod_count_map": {"nvidia-3070": 1}},
                "delta": false}"#,
        )
        .unwrap();
        let response = set_node_resource_capacity(&plugin, req).await.unwrap();
        assert_eq!(response["after"], json!({"prod_count_map": {"nvidia-3090": 2}}));
    }

    #[tokio::test]
    async fn test_deploy_and_usage_flow() {
        let plugin = create_test_plugin();
        add_test_node(&plugin, "n1").await;
        add_test_node(&plugin, "n2").await;

        let req = parse_request(
            r#"{"nodenames": ["n1", "n2"], "workload_resource": {"prod_count_map": {"nvidia-3070": 1, "nvidia-3090": 1}}}"#,
        )
        .unwrap();
        let response = get_nodes_deploy_capacity(&plugin, req).await.unwrap();
        assert_eq!(response["total"], 8);
        assert_eq!(response["nodes_deploy_capacity_map"]["n1"]["capacity"], 4);

        let req = parse_request(
            r#"{"nodename": "n1", "deploy_count": 2, "workload_resource_request": {"prod_count_map": {"nvidia-3070": 1}}}"#,
        )
        .unwrap();
        let response = calculate_deploy(&plugin, req).await.unwrap();
        assert_eq!(response["engines_params"].as_array().unwrap().len(), 2);
        let workloads = response["workloads_resource"].clone();

        let req = parse_request(
            &json!({"nodename": "n1", "workloads_resource": workloads, "delta": true, "incr": true})
                .to_string(),
        )
        .unwrap();
        let response = set_node_resource_usage(&plugin, req).await.unwrap();
        assert_eq!(response["after"], json!({"prod_count_map": {"nvidia-3070": 2}}));

        let req = parse_request(r#"{"nodenames": ["n1", "n2"]}"#).unwrap();
        let response = get_most_idle_node(&plugin, req).await.unwrap();
        assert_eq!(response, json!({"nodename": "n2", "priority": 100}));
    }

    #[tokio::test]
    async fn test_fix_node_resource_response() {
        let plugin = create_test_plugin();
        add_test_node(&plugin, "n1").await;

        let req = parse_request(
            r#"{"nodename": "n1", "workloads_resource": [{"prod_count_map": {"nvidia-3090": 1}}]}"#,
        )
        .unwrap();
        let response = fix_node_resource(&plugin, req).await.unwrap();
        assert_eq!(response["usage"], json!({"prod_count_map": {"nvidia-3090": 1}}));
        assert_eq!(response["diffs"].as_array().unwrap().len(), 2);
        assert!(response.get("persist_error").is_none());
    }

    #[tokio::test]
    async fn test_remove_and_set_info() {
        let plugin = create_test_plugin();
        let req = parse_request(
            r#"{"nodename": "n1", "capacity": {"prod_count_map": {"nvidia-3070": 2}}}"#,
        )
        .unwrap();
        assert_eq!(set_node_resource_info(&plugin, req).await.unwrap(), Value::Null);

        let req = parse_request(r#"{"nodename": "n1"}"#).unwrap();
        assert_eq!(remove_node(&plugin, req).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_calculate_remap_response() {
        let plugin = create_test_plugin();
        let req = parse_request(r#"{"nodename": "n1", "workloads_resource": {}}"#).unwrap();
        let response = calculate_remap(&plugin, req).await.unwrap();
        assert_eq!(response, json!({"engine_params_map": null}));
    }

    #[tokio::test]
    async fn test_metrics_responses() {
        let plugin = create_test_plugin();
        add_test_node(&plugin, "n1").await;

        let response = get_metrics_description(&plugin).unwrap();
        assert_eq!(response.as_array().unwrap().len(), 2);

        let req = parse_request(r#"{"podname": "pod", "nodename": "n1"}"#).unwrap();
        let response = get_metrics(&plugin, req).await.unwrap();
        assert_eq!(response.as_array().unwrap().len(), 4);
        assert_eq!(response[0]["name"], "gpu_capacity");
        assert_eq!(response[0]["value"], "4");
    }
}
