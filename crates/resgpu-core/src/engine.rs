//! Engine-facing types: allocation results and host engine info

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::{null_as_default, NodeResource, ProdCountMap};
use crate::ResgpuResult;

/// Devices assigned to one workload slot, handed to the host engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prod_count_map: ProdCountMap,
}

impl EngineParams {
    pub fn new(prod_count_map: ProdCountMap) -> Self {
        Self { prod_count_map }
    }

    pub fn count(&self) -> i64 {
        self.prod_count_map.total()
    }
}

/// Information the host reports about a node's engine.
///
/// Only `resources` is read: it maps a plugin name to that plugin's view
/// of the node, either as a JSON object or as a string holding JSON text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: BTreeMap<String, serde_json::Value>,
}

impl EngineInfo {
    /// Node resource reported for the given plugin, if any
    pub fn resource(&self, plugin: &str) -> ResgpuResult<Option<NodeResource>> {
        let resource = match self.resources.get(plugin) {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(serde_json::Value::String(raw)) => serde_json::from_str(raw)?,
            Some(value) => serde_json::from_value(value.clone())?,
        };
        Ok(Some(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_params_count() {
        let params = EngineParams::new(ProdCountMap::from([("nvidia-3070", 1), ("nvidia-3090", 2)]));
        assert_eq!(params.count(), 3);
        assert_eq!(EngineParams::default().count(), 0);
    }

    #[test]
    fn test_engine_info_inline_resource() {
        let info: EngineInfo = serde_json::from_str(
            r#"{"resources": {"gpu": {"prod_count_map": {"nvidia-3070": 2}}}}"#,
        )
        .unwrap();
        let resource = info.resource("gpu").unwrap().unwrap();
        assert_eq!(resource.count(), 2);
        assert!(info.resource("cpumem").unwrap().is_none());
    }

    #[test]
    fn test_engine_info_string_resource() {
        let info: EngineInfo = serde_json::from_str(
            r#"{"resources": {"gpu": "{\"prod_count_map\": {\"nvidia-3090\": 3}}"}}"#,
        )
        .unwrap();
        let resource = info.resource("gpu").unwrap().unwrap();
        assert_eq!(resource.prod_count_map.get("nvidia-3090"), 3);
    }

    #[test]
    fn test_engine_info_bad_resource() {
        let info: EngineInfo =
            serde_json::from_str(r#"{"resources": {"gpu": "not json"}}"#).unwrap();
        assert!(info.resource("gpu").is_err());

        let info: EngineInfo = serde_json::from_str(r#"{"resources": null}"#).unwrap();
        assert!(info.resource("gpu").unwrap().is_none());
    }
}
