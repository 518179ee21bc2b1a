//! Product ledger and node/workload resource types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::{ResgpuError, ResgpuResult};

/// Deserialize a JSON `null` as the type's default value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Mapping from product name (e.g. "nvidia-3070") to a device count.
///
/// Counts are signed: a ledger may hold non-positive entries while it is
/// being computed (a realloc request, a signed delta), but any ledger that
/// is persisted as capacity or usage must pass [`ProdCountMap::validate`].
/// Products iterate in lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProdCountMap(BTreeMap<String, i64>);

impl ProdCountMap {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Count for a product, zero when absent
    pub fn get(&self, prod: &str) -> i64 {
        self.0.get(prod).copied().unwrap_or(0)
    }

    pub fn contains(&self, prod: &str) -> bool {
        self.0.contains_key(prod)
    }

    pub fn insert(&mut self, prod: impl Into<String>, count: i64) {
        self.0.insert(prod.into(), count);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(prod, count)| (prod.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts, saturating at the `i64` bounds
    pub fn total(&self) -> i64 {
        self.0.values().fold(0i64, |sum, count| sum.saturating_add(*count))
    }

    /// Merge counts key-wise by summing
    pub fn add(&mut self, other: &ProdCountMap) {
        for (prod, count) in &other.0 {
            let entry = self.0.entry(prod.clone()).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
    }

    /// Decrement counts key-wise, removing every touched product whose
    /// count falls to zero or below
    pub fn sub(&mut self, other: &ProdCountMap) {
        for (prod, count) in &other.0 {
            let remaining = self.get(prod).saturating_sub(*count);
            if remaining > 0 {
                self.0.insert(prod.clone(), remaining);
            } else {
                self.0.remove(prod);
            }
        }
    }

    /// `self - other` without clamping; products whose difference is zero
    /// are left out
    pub fn signed_diff(&self, other: &ProdCountMap) -> ProdCountMap {
        let mut diff = self.clone();
        for (prod, count) in &other.0 {
            let entry = diff.0.entry(prod.clone()).or_insert(0);
            *entry = entry.saturating_sub(*count);
        }
        diff.0.retain(|_, count| *count != 0);
        diff
    }

    /// Drop every product whose count is zero or below
    pub fn retain_positive(&mut self) {
        self.0.retain(|_, count| *count > 0);
    }

    /// Check product names only; counts may be negative
    pub fn validate_prod(&self) -> ResgpuResult<()> {
        for prod in self.0.keys() {
            if prod.trim().is_empty() {
                return Err(ResgpuError::InvalidProduct(format!(
                    "product name {:?} is blank",
                    prod
                )));
            }
        }
        Ok(())
    }

    /// Check product names and require every count to be positive
    pub fn validate(&self) -> ResgpuResult<()> {
        self.validate_prod()?;
        for (prod, count) in &self.0 {
            if *count <= 0 {
                return Err(ResgpuError::InvalidProductCount(format!(
                    "{} has count {}",
                    prod, count
                )));
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for ProdCountMap {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, c)| (p.into(), c)).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[(S, i64); N]> for ProdCountMap {
    fn from(entries: [(S, i64); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Capacity or usage of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prod_count_map: ProdCountMap,
}

impl NodeResource {
    pub fn new(prod_count_map: ProdCountMap) -> Self {
        Self { prod_count_map }
    }

    /// Total device count
    pub fn count(&self) -> i64 {
        self.prod_count_map.total()
    }

    pub fn add(&mut self, other: &ProdCountMap) {
        self.prod_count_map.add(other);
    }

    pub fn sub(&mut self, other: &ProdCountMap) {
        self.prod_count_map.sub(other);
    }

    pub fn validate(&self) -> ResgpuResult<()> {
        self.prod_count_map.validate()
    }
}

/// Persisted record of one node: installed capacity and allocated usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResourceInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub capacity: NodeResource,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: NodeResource,
}

impl NodeResourceInfo {
    pub fn new(capacity: NodeResource, usage: NodeResource) -> Self {
        Self { capacity, usage }
    }

    /// Both ledgers must be valid before the record is persisted
    pub fn validate(&self) -> ResgpuResult<()> {
        self.capacity.validate()?;
        self.usage.validate()
    }

    /// Capacity minus usage.
    ///
    /// A product may come out negative when usage has drifted ahead of
    /// capacity; such entries mean "nothing free", never headroom.
    pub fn available(&self) -> ProdCountMap {
        self.capacity
            .prod_count_map
            .signed_diff(&self.usage.prod_count_map)
    }

    /// Usage total over capacity total, zero for a node without capacity
    pub fn usage_ratio(&self) -> f64 {
        ratio(self.usage.count(), self.capacity.count())
    }
}

/// `num / den` as a float, zero when the denominator is zero
pub fn ratio(num: i64, den: i64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Request shape passed by the host when editing a node.
///
/// `prod_count_map` is `None` when the host did not set the field at all,
/// which lets an overwrite keep the current capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResourceRequest {
    #[serde(default)]
    pub prod_count_map: Option<ProdCountMap>,
}

impl NodeResourceRequest {
    pub fn new(prod_count_map: ProdCountMap) -> Self {
        Self {
            prod_count_map: Some(prod_count_map),
        }
    }

    /// Fill an unset ledger from the node's current resource
    pub fn load_from_origin(&mut self, origin: &NodeResource) {
        if self.prod_count_map.is_none() {
            self.prod_count_map = Some(origin.prod_count_map.clone());
        }
    }

    /// The requested ledger, empty when unset
    pub fn prod_count_map(&self) -> ProdCountMap {
        self.prod_count_map.clone().unwrap_or_default()
    }
}

/// Resource held by one workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadResource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prod_count_map: ProdCountMap,
}

impl WorkloadResource {
    pub fn new(prod_count_map: ProdCountMap) -> Self {
        Self { prod_count_map }
    }

    pub fn count(&self) -> i64 {
        self.prod_count_map.total()
    }

    pub fn validate(&self) -> ResgpuResult<()> {
        self.prod_count_map.validate()
    }
}

/// Resource a workload asks for.
///
/// An empty ledger means the workload needs no device at all. In the
/// realloc path counts may be negative ("give back N units").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadResourceRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prod_count_map: ProdCountMap,
}

impl WorkloadResourceRequest {
    pub fn new(prod_count_map: ProdCountMap) -> Self {
        Self { prod_count_map }
    }

    pub fn count(&self) -> i64 {
        self.prod_count_map.total()
    }

    pub fn validate(&self) -> ResgpuResult<()> {
        self.prod_count_map.validate()
    }

    pub fn validate_prod(&self) -> ResgpuResult<()> {
        self.prod_count_map.validate_prod()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(entries: &[(&str, i64)]) -> ProdCountMap {
        entries.iter().map(|(p, c)| (*p, *c)).collect()
    }

    #[test]
    fn test_add_and_total() {
        let mut a = ledger(&[("nvidia-3070", 4)]);
        a.add(&ledger(&[("nvidia-3070", 1), ("nvidia-3090", 2)]));
        assert_eq!(a.get("nvidia-3070"), 5);
        assert_eq!(a.get("nvidia-3090"), 2);
        assert_eq!(a.total(), 7);
        assert_eq!(a.get("missing"), 0);
    }

    #[test]
    fn test_sub_prunes_exhausted_products() {
        let mut a = ledger(&[("nvidia-3070", 4), ("nvidia-3090", 1)]);
        a.sub(&ledger(&[("nvidia-3070", 1), ("nvidia-3090", 3), ("a100", 2)]));
        assert_eq!(a, ledger(&[("nvidia-3070", 3)]));
        assert!(!a.contains("nvidia-3090"));
        assert!(!a.contains("a100"));
    }

    #[test]
    fn test_sub_then_add_is_not_invertible_at_zero() {
        let a = ledger(&[("nvidia-3090", 1)]);
        let b = ledger(&[("nvidia-3090", 3)]);
        let mut c = a.clone();
        c.sub(&b);
        c.add(&b);
        assert_eq!(c.get("nvidia-3090"), 3);
        assert_ne!(c, a);
    }

    #[test]
    fn test_total_zero_iff_empty_after_sub() {
        let mut a = ledger(&[("nvidia-3070", 2)]);
        a.sub(&ledger(&[("nvidia-3070", 2)]));
        assert!(a.is_empty());
        assert_eq!(a.total(), 0);
    }

    #[test]
    fn test_signed_diff_keeps_negatives() {
        let new = ledger(&[("nvidia-3070", 1)]);
        let origin = ledger(&[("nvidia-3090", 1)]);
        let diff = new.signed_diff(&origin);
        assert_eq!(diff.get("nvidia-3070"), 1);
        assert_eq!(diff.get("nvidia-3090"), -1);
        assert_eq!(diff.total(), 0);

        let same = origin.signed_diff(&origin);
        assert!(same.is_empty());
    }

    #[test]
    fn test_arithmetic_saturates() {
        let mut huge = ledger(&[("nvidia-3070", i64::MAX), ("nvidia-3090", 1)]);
        assert_eq!(huge.total(), i64::MAX);

        huge.add(&ledger(&[("nvidia-3070", 1)]));
        assert_eq!(huge.get("nvidia-3070"), i64::MAX);

        let mut one = ledger(&[("nvidia-3070", 1)]);
        one.sub(&ledger(&[("nvidia-3070", i64::MIN)]));
        assert_eq!(one.get("nvidia-3070"), i64::MAX);

        let owed = ledger(&[("nvidia-3070", -2)]);
        let diff = owed.signed_diff(&ledger(&[("nvidia-3070", i64::MAX)]));
        assert_eq!(diff.get("nvidia-3070"), i64::MIN);
        assert_eq!(diff.total(), i64::MIN);
    }

    #[test]
    fn test_validate() {
        assert!(ProdCountMap::new().validate().is_ok());
        assert!(ledger(&[("nvidia-3070", 4)]).validate().is_ok());

        let blank = ledger(&[("nvidia-3070", 4), ("  ", 1)]);
        assert!(matches!(
            blank.validate(),
            Err(ResgpuError::InvalidProduct(_))
        ));

        let negative = ledger(&[("nvidia-3070", 4), ("nvidia-3090", -1)]);
        assert!(matches!(
            negative.validate(),
            Err(ResgpuError::InvalidProductCount(_))
        ));
        assert!(negative.validate_prod().is_ok());

        let zero = ledger(&[("nvidia-3070", 0)]);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_node_resource_parse() {
        let r: NodeResource = serde_json::from_str(r#"{"prod_count_map": null}"#).unwrap();
        assert!(r.prod_count_map.is_empty());

        let r: NodeResource = serde_json::from_str(r#"{"prod_count_map1": null}"#).unwrap();
        assert!(r.prod_count_map.is_empty());

        let r: NodeResource = serde_json::from_str(
            r#"{"prod_count_map": {"nvidia-3070": 4, ":nvidia-3090": 2}}"#,
        )
        .unwrap();
        assert_eq!(r.count(), 6);
    }

    #[test]
    fn test_node_resource_info_missing_usage() {
        let info: NodeResourceInfo =
            serde_json::from_str(r#"{"capacity": {"prod_count_map": {"nvidia-3070": 2}}}"#)
                .unwrap();
        assert_eq!(info.capacity.count(), 2);
        assert!(info.usage.prod_count_map.is_empty());
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_node_resource_info_record_format() {
        let info = NodeResourceInfo::new(
            NodeResource::new(ledger(&[("nvidia-3070", 4)])),
            NodeResource::new(ledger(&[("nvidia-3070", 1)])),
        );
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "capacity": {"prod_count_map": {"nvidia-3070": 4}},
                "usage": {"prod_count_map": {"nvidia-3070": 1}},
            })
        );
    }

    #[test]
    fn test_available_may_go_negative() {
        let info = NodeResourceInfo::new(
            NodeResource::new(ledger(&[("nvidia-3070", 2), ("nvidia-3090", 4)])),
            NodeResource::new(ledger(&[("nvidia-3070", 3), ("nvidia-3090", 1)])),
        );
        let available = info.available();
        assert_eq!(available.get("nvidia-3070"), -1);
        assert_eq!(available.get("nvidia-3090"), 3);
    }

    #[test]
    fn test_usage_ratio() {
        let empty = NodeResourceInfo::default();
        assert_eq!(empty.usage_ratio(), 0.0);

        let info = NodeResourceInfo::new(
            NodeResource::new(ledger(&[("nvidia-3070", 4)])),
            NodeResource::new(ledger(&[("nvidia-3070", 1)])),
        );
        assert_eq!(info.usage_ratio(), 0.25);
    }

    #[test]
    fn test_node_resource_request_load_from_origin() {
        let origin = NodeResource::new(ledger(&[("nvidia-3070", 4)]));

        let mut unset: NodeResourceRequest = serde_json::from_str("{}").unwrap();
        assert!(unset.prod_count_map.is_none());
        unset.load_from_origin(&origin);
        assert_eq!(unset.prod_count_map(), origin.prod_count_map);

        let mut set = NodeResourceRequest::new(ledger(&[("nvidia-3090", 1)]));
        set.load_from_origin(&origin);
        assert_eq!(set.prod_count_map(), ledger(&[("nvidia-3090", 1)]));
    }

    #[test]
    fn test_workload_resource_request() {
        let req: WorkloadResourceRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.count(), 0);

        let req = WorkloadResourceRequest::new(ledger(&[("nvidia-3070", 4), ("nvidia-3090", 2)]));
        assert_eq!(req.count(), 6);

        let req = WorkloadResourceRequest::new(ledger(&[("nvidia-3070", 4), ("nvidia-3090", -1)]));
        assert!(req.validate().is_err());
        assert!(req.validate_prod().is_ok());
    }
}
