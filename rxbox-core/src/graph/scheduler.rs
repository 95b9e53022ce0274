//! Notification Scheduler
//!
//! When a box is written, every reaction subscribed to it must react. The
//! scheduler decides which reactions actually run, and in what order.
//!
//! # Algorithm
//!
//! 1. Take a snapshot of the box's subscribers (the set mutates while
//!    reactions re-run, so it is copied first).
//! 2. Order the snapshot by depth in the ownership tree, so ancestors come
//!    before descendants. The sort is stable: subscribers at equal depth keep
//!    subscription order.
//! 3. Replace each subscriber by its highest ancestor that is also in the
//!    snapshot. That ancestor's re-run tears down and recreates the
//!    descendant, so running the old descendant would work against edges
//!    that are about to disappear.
//! 4. Drop duplicates, so each target is handled once per pass.

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::ReactionNode;
use crate::reactive::ReactionId;

/// Ordered, collapsed list of reactions to handle for one box write.
#[derive(Debug, Default)]
pub(crate) struct NotificationPlan {
    targets: IndexSet<ReactionId>,
}

impl NotificationPlan {
    /// Build the plan for a snapshot of subscribers.
    pub(crate) fn build(nodes: &[ReactionNode], subscribers: &[ReactionId]) -> Self {
        let members: IndexSet<ReactionId> = subscribers.iter().copied().collect();

        let mut ordered: SmallVec<[(usize, ReactionId); 8]> = subscribers
            .iter()
            .map(|&id| (depth(nodes, id), id))
            .collect();
        ordered.sort_by_key(|&(depth, _)| depth);

        let mut targets = IndexSet::with_capacity(ordered.len());
        for (_, id) in ordered {
            let target = collapse_target(nodes, &members, id);
            if target != id {
                tracing::trace!(reaction = %id, ancestor = %target, "collapsed into ancestor");
            }
            targets.insert(target);
        }

        Self { targets }
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl IntoIterator for NotificationPlan {
    type Item = ReactionId;
    type IntoIter = indexmap::set::IntoIter<ReactionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

/// Number of ancestors above `id` in the ownership tree.
fn depth(nodes: &[ReactionNode], id: ReactionId) -> usize {
    let mut depth = 0;
    let mut cursor = nodes[id.index()].parent;
    while let Some(parent) = cursor {
        depth += 1;
        cursor = nodes[parent.index()].parent;
    }
    depth
}

/// The highest ancestor of `id` present in `members`, or `id` itself.
fn collapse_target(
    nodes: &[ReactionNode],
    members: &IndexSet<ReactionId>,
    id: ReactionId,
) -> ReactionId {
    let mut target = id;
    let mut cursor = nodes[id.index()].parent;
    while let Some(parent) = cursor {
        if members.contains(&parent) {
            target = parent;
        }
        cursor = nodes[parent.index()].parent;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests::node;

    fn ids(raw: &[usize]) -> Vec<ReactionId> {
        raw.iter().copied().map(ReactionId::from_index).collect()
    }

    fn plan(nodes: &[ReactionNode], subscribers: &[usize]) -> Vec<ReactionId> {
        NotificationPlan::build(nodes, &ids(subscribers))
            .into_iter()
            .collect()
    }

    #[test]
    fn unrelated_subscribers_keep_subscription_order() {
        let nodes = vec![node(0, None), node(1, None), node(2, None)];
        assert_eq!(plan(&nodes, &[2, 0, 1]), ids(&[2, 0, 1]));
    }

    #[test]
    fn ancestors_come_before_descendants() {
        // 0 -> 1 -> 2, plus an unrelated root 3
        let nodes = vec![node(0, None), node(1, Some(0)), node(2, Some(1)), node(3, None)];
        // Only the leaf and an unrelated root: nothing collapses, root first
        assert_eq!(plan(&nodes, &[2, 3]), ids(&[3, 2]));
    }

    #[test]
    fn child_collapses_into_subscribed_parent() {
        let nodes = vec![node(0, None), node(1, Some(0))];
        let planned = NotificationPlan::build(&nodes, &ids(&[1, 0]));
        assert_eq!(planned.len(), 1);
        assert_eq!(planned.into_iter().collect::<Vec<_>>(), ids(&[0]));
    }

    #[test]
    fn grandchild_collapses_into_highest_subscribed_ancestor() {
        // 0 -> 1 -> 2; 0 and 2 subscribed, 1 is not
        let nodes = vec![node(0, None), node(1, Some(0)), node(2, Some(1))];
        assert_eq!(plan(&nodes, &[2, 0]), ids(&[0]));

        // All three subscribed: everything collapses into the root
        assert_eq!(plan(&nodes, &[1, 2, 0]), ids(&[0]));
    }

    #[test]
    fn siblings_under_unsubscribed_parent_both_run() {
        let nodes = vec![node(0, None), node(1, Some(0)), node(2, Some(0))];
        assert_eq!(plan(&nodes, &[2, 1]), ids(&[2, 1]));
    }

    #[test]
    fn empty_snapshot_builds_empty_plan() {
        let nodes = vec![node(0, None)];
        assert!(NotificationPlan::build(&nodes, &[]).is_empty());
    }
}
