//! Least-utilized node selection

use resgpu_core::NodeResourceInfo;

/// The node picked as most idle
#[derive(Debug, Clone, PartialEq)]
pub struct IdleNode {
    pub nodename: String,
    /// Usage total over capacity total
    pub ratio: f64,
}

/// Pick the node with the smallest usage ratio.
///
/// Nodes are visited in the given order and a node only replaces the
/// current pick when its ratio is strictly smaller, so ties go to the
/// earliest node. Returns `None` for an empty input.
pub fn select_most_idle<'a, I>(nodes: I) -> Option<IdleNode>
where
    I: IntoIterator<Item = (&'a str, &'a NodeResourceInfo)>,
{
    let mut best: Option<IdleNode> = None;
    for (nodename, info) in nodes {
        let ratio = info.usage_ratio();
        if best.as_ref().map_or(true, |b| ratio < b.ratio) {
            best = Some(IdleNode {
                nodename: nodename.to_string(),
                ratio,
            });
        }
    }
    best
}
