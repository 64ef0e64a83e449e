//! Collapses long single-reply chains into one grouped unit for display.

use super::types::{Comment, CommentId, TreeNode};

/// Shortest chain, root included, that is worth grouping.
pub const MIN_GROUP_LENGTH: usize = 2;

/// Result of [`group_thread`]: the absorbed chain and the subtrees hanging
/// off its last comment.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedThread {
    pub grouped_comments: Vec<Comment>,
    pub child_comments: Vec<TreeNode>,
}

/// Walk down from `root` while each comment has exactly one reply and that
/// reply is groupable, pulling every comment passed into the group.
///
/// The walk stops at the first comment with zero or several replies, or
/// whose only reply is not groupable (or not loaded). That comment is the
/// last one in the group and its replies become `child_comments`. Returns
/// `None` when the group would hold fewer than [`MIN_GROUP_LENGTH`] comments.
pub fn group_thread(
    is_groupable: impl Fn(&CommentId) -> bool,
    root: &Comment,
    children: &[TreeNode],
) -> Option<GroupedThread> {
    let mut grouped_comments = vec![root.clone()];
    let mut current = children;

    while let [only] = current {
        let Some(item) = &only.item else {
            break;
        };
        if !is_groupable(&only.id) {
            break;
        }
        grouped_comments.push(item.clone());
        current = &only.children;
    }

    if grouped_comments.len() < MIN_GROUP_LENGTH {
        return None;
    }

    Some(GroupedThread {
        grouped_comments,
        child_comments: current.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(id: &str) -> TreeNode {
        node(id, vec![])
    }

    fn node(id: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            id: CommentId::from(id),
            item: Some(Comment::new(id, None, None)),
            children,
        }
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    fn node_ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn everything(_: &CommentId) -> bool {
        true
    }

    #[test]
    fn two_direct_children_never_group() {
        let root = Comment::new("a", None, None);
        assert_eq!(group_thread(everything, &root, &[leaf("b"), leaf("c")]), None);
    }

    #[test]
    fn lone_root_never_groups() {
        let root = Comment::new("a", None, None);
        assert_eq!(group_thread(everything, &root, &[]), None);
    }

    #[test]
    fn collapses_chain_up_to_branch_point() {
        // a -> b -> c, c has replies d (which branches into e, f) and g
        let d = node("d", vec![leaf("e"), leaf("f")]);
        let c = node("c", vec![d.clone(), leaf("g")]);
        let b = node("b", vec![c]);
        let root = Comment::new("a", None, None);

        let grouped = group_thread(everything, &root, &[b]).unwrap();
        assert_eq!(ids(&grouped.grouped_comments), vec!["a", "b", "c"]);
        assert_eq!(node_ids(&grouped.child_comments), vec!["d", "g"]);
        assert_eq!(grouped.child_comments[0], d);
    }

    #[test]
    fn stops_before_non_groupable_comment() {
        // a -> b -> c -> d, c is not groupable
        let c = node("c", vec![leaf("d")]);
        let b = node("b", vec![c.clone()]);
        let root = Comment::new("a", None, None);

        let grouped = group_thread(|id| id.as_str() != "c", &root, &[b]).unwrap();
        assert_eq!(ids(&grouped.grouped_comments), vec!["a", "b"]);
        assert_eq!(grouped.child_comments, vec![c]);
    }

    #[test]
    fn non_groupable_only_reply_prevents_grouping() {
        let root = Comment::new("a", None, None);
        let b = node("b", vec![leaf("c")]);
        assert_eq!(group_thread(|id| id.as_str() != "b", &root, &[b]), None);
    }

    #[test]
    fn whole_chain_groups_to_its_leaf() {
        let chain = node("b", vec![node("c", vec![leaf("d")])]);
        let root = Comment::new("a", None, None);

        let grouped = group_thread(everything, &root, &[chain]).unwrap();
        assert_eq!(ids(&grouped.grouped_comments), vec!["a", "b", "c", "d"]);
        assert!(grouped.child_comments.is_empty());
    }

    #[test]
    fn placeholder_reply_is_not_absorbed() {
        let placeholder = TreeNode {
            id: CommentId::from("p"),
            item: None,
            children: vec![leaf("q")],
        };
        let b = node("b", vec![placeholder.clone()]);
        let root = Comment::new("a", None, None);

        let grouped = group_thread(everything, &root, &[b]).unwrap();
        assert_eq!(ids(&grouped.grouped_comments), vec!["a", "b"]);
        assert_eq!(grouped.child_comments, vec![placeholder]);
    }
}
