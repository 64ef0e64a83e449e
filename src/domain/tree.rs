//! Rebuilds a comment forest from a flat, possibly incomplete comment list.
//!
//! Ancestors that are referenced but not loaded become placeholder nodes, so
//! every comment lands somewhere under its thread root even when the data
//! source only returned fragments of the thread.

use super::types::{Comment, CommentId, TreeNode};
use std::collections::{HashMap, HashSet};

struct Slot<'a> {
    id: &'a CommentId,
    item: Option<&'a Comment>,
    children: Vec<usize>,
}

/// Build a forest from `comments`, in input order.
///
/// Roots are real comments without a parent plus any placeholder that nothing
/// attaches. Duplicate ids are not merged; lookups resolve to the last one.
pub fn build_tree(comments: &[Comment]) -> Vec<TreeNode> {
    let mut slots: Vec<Slot<'_>> = comments
        .iter()
        .map(|comment| Slot {
            id: &comment.id,
            item: Some(comment),
            children: Vec::new(),
        })
        .collect();
    let mut used: HashSet<&CommentId> = comments.iter().map(|c| &c.id).collect();

    // Parents first, then thread roots, so placeholder order is stable.
    for parent in comments.iter().filter_map(|c| c.parent_comment_id.as_ref()) {
        if used.insert(parent) {
            slots.push(placeholder(parent));
        }
    }
    for top in comments.iter().filter_map(|c| c.top_level_comment_id.as_ref()) {
        if used.insert(top) {
            slots.push(placeholder(top));
        }
    }

    let index: HashMap<&CommentId, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| (slot.id, i))
        .collect();

    let mut attached = vec![false; slots.len()];
    for (i, comment) in comments.iter().enumerate() {
        let Some(parent_id) = &comment.parent_comment_id else {
            continue;
        };
        let parent = index[parent_id];
        slots[parent].children.push(i);
        attached[i] = true;

        // An unloaded intermediate ancestor still belongs under its thread root.
        if slots[parent].item.is_none() && !attached[parent] {
            if let Some(top_id) = &comment.top_level_comment_id {
                if top_id != parent_id {
                    let top = index[top_id];
                    slots[top].children.push(parent);
                    attached[parent] = true;
                }
            }
        }
    }

    let roots: Vec<usize> = (0..slots.len()).filter(|&i| !attached[i]).collect();
    materialize(&slots, &roots)
}

fn placeholder(id: &CommentId) -> Slot<'_> {
    Slot {
        id,
        item: None,
        children: Vec::new(),
    }
}

/// Turn the arena into owned nodes, children before parents.
///
/// Every slot is attached at most once, so each is reached from at most one
/// root and visited once.
fn materialize(slots: &[Slot<'_>], roots: &[usize]) -> Vec<TreeNode> {
    let mut built: Vec<TreeNode> = Vec::new();
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&i| (i, false)).collect();
    while let Some((at, children_done)) = stack.pop() {
        let slot = &slots[at];
        if children_done {
            let children = built.split_off(built.len() - slot.children.len());
            built.push(TreeNode {
                id: slot.id.clone(),
                item: slot.item.cloned(),
                children,
            });
        } else {
            stack.push((at, true));
            stack.extend(slot.children.iter().rev().map(|&child| (child, false)));
        }
    }
    built
}

/// True if both forests have the same ids, placeholders and nesting, ignoring
/// comment contents. A display layer can keep its rendered subtree when the
/// shape is unchanged and only re-render entries whose content changed.
pub fn same_shape(a: &[TreeNode], b: &[TreeNode]) -> bool {
    let mut pairs: Vec<(&[TreeNode], &[TreeNode])> = vec![(a, b)];
    while let Some((left, right)) = pairs.pop() {
        if left.len() != right.len() {
            return false;
        }
        for (x, y) in left.iter().zip(right) {
            if x.id != y.id || x.is_placeholder() != y.is_placeholder() {
                return false;
            }
            pairs.push((&x.children, &y.children));
        }
    }
    true
}

/// Number of real comments strictly below `node`.
pub fn count_descendants(node: &TreeNode) -> usize {
    let mut count = 0;
    let mut stack: Vec<&TreeNode> = node.children.iter().collect();
    while let Some(next) = stack.pop() {
        if !next.is_placeholder() {
            count += 1;
        }
        stack.extend(next.children.iter());
    }
    count
}

/// Real comments of the forest in depth-first pre-order.
pub fn flatten(forest: &[TreeNode]) -> Vec<&Comment> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if let Some(item) = &node.item {
            out.push(item);
        }
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Find the node with `id` anywhere in the forest.
pub fn find_node<'a>(forest: &'a [TreeNode], id: &CommentId) -> Option<&'a TreeNode> {
    let mut stack: Vec<&TreeNode> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        if &node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter());
    }
    None
}
