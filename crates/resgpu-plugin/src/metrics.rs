//! Node metrics for the host's collector

use resgpu_core::ResgpuResult;
use serde::Serialize;

use crate::plugin::{ensure_nodename, Plugin};

const GPU_CAPACITY: &str = "gpu_capacity";
const GPU_USED: &str = "gpu_used";

/// A metric the plugin can report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDescription {
    pub name: String,
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub labels: Vec<String>,
}

/// One reported sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    /// podname, nodename, product
    pub labels: Vec<String>,
    pub value: String,
    pub key: String,
}

fn gauge(name: &str, help: &str) -> MetricDescription {
    MetricDescription {
        name: name.to_string(),
        help: help.to_string(),
        metric_type: "gauge".to_string(),
        labels: ["podname", "nodename", "product"]
            .iter()
            .map(|l| l.to_string())
            .collect(),
    }
}

impl Plugin {
    pub fn get_metrics_description(&self) -> Vec<MetricDescription> {
        vec![
            gauge(GPU_CAPACITY, "node available gpu."),
            gauge(GPU_USED, "node used gpu."),
        ]
    }

    /// Capacity and usage samples for every product the node has
    pub async fn get_metrics(&self, podname: &str, nodename: &str) -> ResgpuResult<Vec<Metric>> {
        ensure_nodename(nodename)?;
        let info = self.load_node(nodename).await?;
        let safe_nodename = nodename.replace('.', "_");

        let mut metrics = Vec::new();
        for (prod, count) in info.capacity.prod_count_map.iter() {
            let labels = vec![podname.to_string(), nodename.to_string(), prod.to_string()];
            metrics.push(Metric {
                name: GPU_CAPACITY.to_string(),
                labels: labels.clone(),
                value: count.to_string(),
                key: format!("core.node.{}.gpu.{}", safe_nodename, prod),
            });
            metrics.push(Metric {
                name: GPU_USED.to_string(),
                labels,
                value: info.usage.prod_count_map.get(prod).to_string(),
                key: format!("core.node.{}.gpu.{}.used", safe_nodename, prod),
            });
        }
        Ok(metrics)
    }
}
