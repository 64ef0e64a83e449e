//! Pool state and its pure transitions.
//!
//! A `PoolState` is never mutated once shared: every transition borrows the
//! current state and returns the next one.

use crate::domain::{build_tree, find_node, Comment, CommentId, Expansion, TreeNode, Visibility};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Everything the pool knows about one comment.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub comment: Comment,
    pub visibility: Visibility,
    pub expansion: Expansion,
    /// Opaque per-comment display state owned by the rendering layer.
    pub transient: BTreeMap<String, Value>,
}

impl PoolEntry {
    fn new(comment: Comment, visibility: Visibility) -> Self {
        Self {
            comment,
            visibility,
            expansion: Expansion::Default,
            transient: BTreeMap::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// Snapshot of every comment discovered so far and the order visible ones
/// are displayed in.
///
/// Ids in `sort_order` always have an entry and are always visible. Hidden
/// entries from the bulk load are not in `sort_order` until revealed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolState {
    sort_order: Vec<CommentId>,
    entries: HashMap<CommentId, PoolEntry>,
    /// First-seen order of entries; breaks score ties.
    discovery: Vec<CommentId>,
    /// Bumped by every transition that changes something.
    revision: u64,
}

impl PoolState {
    /// Start a pool with every initial comment visible, in the given order.
    pub fn from_initial(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut state = Self::default();
        for comment in comments {
            if state.entries.contains_key(&comment.id) {
                continue;
            }
            state.sort_order.push(comment.id.clone());
            state.insert(comment, Visibility::Visible);
        }
        state
    }

    fn insert(&mut self, comment: Comment, visibility: Visibility) {
        self.revision += 1;
        self.discovery.push(comment.id.clone());
        self.entries
            .insert(comment.id.clone(), PoolEntry::new(comment, visibility));
    }

    /// Left alone by transitions that change nothing, so a caller can tell a
    /// no-op from an update without comparing entries.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sort_order(&self) -> &[CommentId] {
        &self.sort_order
    }

    pub fn entry(&self, id: &CommentId) -> Option<&PoolEntry> {
        self.entries.get(id)
    }

    /// All entries in discovery order.
    pub fn entries(&self) -> impl Iterator<Item = &PoolEntry> {
        self.discovery.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_visible(&self, id: &CommentId) -> bool {
        self.entries.get(id).is_some_and(PoolEntry::is_visible)
    }

    pub fn visible_top_level_count(&self) -> usize {
        self.entries()
            .filter(|e| e.comment.is_top_level() && e.is_visible())
            .count()
    }

    pub fn has_hidden_top_level(&self) -> bool {
        self.entries()
            .any(|e| e.comment.is_top_level() && !e.is_visible())
    }

    /// Known parent of `id`, if both are in the pool.
    pub fn parent_of(&self, id: &CommentId) -> Option<&CommentId> {
        let parent = self.entries.get(id)?.comment.parent_comment_id.as_ref()?;
        self.entries.contains_key(parent).then_some(parent)
    }

    /// Known ancestors of `id`, nearest first, stopping at the first
    /// ancestor that is top-level or not in the pool.
    pub fn ancestors(&self, id: &CommentId) -> Vec<CommentId> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&CommentId> = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Up to `n` hidden top-level comments, best score first.
    pub fn hidden_top_level(&self, n: usize) -> Vec<CommentId> {
        self.hidden_by_score(n, |c| c.is_top_level())
    }

    /// Up to `n` hidden direct replies to `parent`, best score first.
    pub fn hidden_children(&self, parent: &CommentId, n: usize) -> Vec<CommentId> {
        self.hidden_by_score(n, |c| c.parent_comment_id.as_ref() == Some(parent))
    }

    fn hidden_by_score(&self, n: usize, matches: impl Fn(&Comment) -> bool) -> Vec<CommentId> {
        let mut candidates: Vec<&Comment> = self
            .entries()
            .filter(|e| !e.is_visible() && matches(&e.comment))
            .map(|e| &e.comment)
            .collect();
        sort_by_score(&mut candidates);
        candidates.into_iter().take(n).map(|c| c.id.clone()).collect()
    }

    /// Visible comments in display order.
    pub fn visible_comments(&self) -> Vec<Comment> {
        self.sort_order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.is_visible())
            .map(|e| e.comment.clone())
            .collect()
    }

    /// Every known comment: display order first, then the rest by score.
    pub fn loaded_comments(&self) -> Vec<Comment> {
        let ordered: HashSet<&CommentId> = self.sort_order.iter().collect();
        let mut rest: Vec<&Comment> = self
            .entries()
            .filter(|e| !ordered.contains(&e.comment.id))
            .map(|e| &e.comment)
            .collect();
        sort_by_score(&mut rest);

        self.sort_order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| &e.comment))
            .chain(rest)
            .cloned()
            .collect()
    }

    /// Forest of what the display layer should show.
    pub fn visible_tree(&self) -> Vec<TreeNode> {
        build_tree(&self.visible_comments())
    }

    /// Forest of everything loaded, hidden comments included.
    pub fn loaded_tree(&self) -> Vec<TreeNode> {
        build_tree(&self.loaded_comments())
    }

    /// Add comments from a bulk load as hidden. Known ids are left alone.
    pub fn with_loaded_comments(&self, loaded: impl IntoIterator<Item = Comment>) -> Self {
        let mut next = self.clone();
        for comment in loaded {
            if !next.entries.contains_key(&comment.id) {
                next.insert(comment, Visibility::Hidden);
            }
        }
        next
    }

    /// Add a freshly posted comment as visible at the end of display order.
    pub fn with_added_comment(&self, comment: Comment) -> Self {
        let id = comment.id.clone();
        if self.entries.contains_key(&id) {
            return self.with_comment(comment).reveal(&[id], Expansion::Default);
        }
        let mut next = self.clone();
        next.sort_order.push(id);
        next.insert(comment, Visibility::Visible);
        next
    }

    /// Replace the stored content of a known comment; flags are kept.
    pub fn with_comment(&self, comment: Comment) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(&comment.id) {
            if entry.comment != comment {
                entry.comment = comment;
                next.revision += 1;
            }
        }
        next
    }

    pub fn with_expansion(&self, id: &CommentId, expansion: Expansion) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(id) {
            if entry.expansion != expansion {
                entry.expansion = expansion;
                next.revision += 1;
            }
        }
        next
    }

    pub fn with_transient(&self, id: &CommentId, key: &str, value: Value) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(id) {
            if entry.transient.get(key) != Some(&value) {
                entry.transient.insert(key.to_string(), value);
                next.revision += 1;
            }
        }
        next
    }

    /// Make hidden `ids` visible with `expansion`, splicing each into
    /// display order.
    ///
    /// A revealed comment goes directly before the earliest of its visible
    /// descendants, so a newly shown ancestor lands above the reply that was
    /// already on screen. Otherwise it goes at the end. Unknown or already
    /// visible ids are skipped.
    pub fn reveal(&self, ids: &[CommentId], expansion: Expansion) -> Self {
        let mut next = self.clone();
        let children = self.children_index();

        for id in ids {
            let Some(entry) = next.entries.get_mut(id) else {
                continue;
            };
            if entry.is_visible() {
                continue;
            }
            entry.visibility = Visibility::Visible;
            entry.expansion = expansion;
            next.revision += 1;

            // Splice above the first visible descendant, if any
            let descendants = descendants_of(&children, id);
            next.sort_order.retain(|existing| existing != id);
            let anchor = next.sort_order.iter().position(|existing| {
                descendants.contains(existing)
                    && next.entries.get(existing).is_some_and(PoolEntry::is_visible)
            });
            match anchor {
                Some(at) => next.sort_order.insert(at, id.clone()),
                None => next.sort_order.push(id.clone()),
            }
        }
        next
    }

    /// Reveal the best `n` hidden top-level comments as truncated, each with
    /// up to `replies_each` of its best hidden replies as single-line.
    pub fn reveal_top_level(&self, n: usize, replies_each: usize) -> Self {
        let top = self.hidden_top_level(n);
        let mut next = self.reveal(&top, Expansion::Truncated);
        if replies_each == 0 {
            return next;
        }

        // Hidden replies only appear in the loaded tree
        let loaded = self.loaded_tree();
        for id in &top {
            let Some(node) = find_node(&loaded, id) else {
                continue;
            };
            let mut replies: Vec<&Comment> = node
                .children
                .iter()
                .filter_map(|child| child.item.as_ref())
                .filter(|reply| !next.is_visible(&reply.id))
                .collect();
            sort_by_score(&mut replies);
            let reply_ids: Vec<CommentId> = replies
                .into_iter()
                .take(replies_each)
                .map(|reply| reply.id.clone())
                .collect();
            next = next.reveal(&reply_ids, Expansion::SingleLine);
        }
        next
    }

    /// Reveal up to `n` hidden replies to `parent` as single-line.
    pub fn reveal_children_of(&self, parent: &CommentId, n: usize) -> Self {
        self.reveal(&self.hidden_children(parent, n), Expansion::SingleLine)
    }

    /// Reveal the parent of `id` as truncated, if it is known.
    pub fn reveal_parent_of(&self, id: &CommentId) -> Self {
        match self.parent_of(id) {
            Some(parent) => self.reveal(&[parent.clone()], Expansion::Truncated),
            None => self.clone(),
        }
    }

    /// Reveal every known ancestor of `id`. A lone ancestor is shown
    /// truncated; a longer chain is shown single-line.
    pub fn reveal_ancestor_chain(&self, id: &CommentId) -> Self {
        let chain = self.ancestors(id);
        let expansion = if chain.len() == 1 {
            Expansion::Truncated
        } else {
            Expansion::SingleLine
        };
        self.reveal(&chain, expansion)
    }

    /// Change how `id` is displayed. Leaving a single-line state also
    /// reveals up to `replies_on_expand` of its hidden replies.
    pub fn set_expansion(
        &self,
        id: &CommentId,
        expansion: Expansion,
        replies_on_expand: usize,
    ) -> Self {
        let Some(previous) = self.entries.get(id).map(|e| e.expansion) else {
            return self.clone();
        };
        let next = self.with_expansion(id, expansion);
        // Opening a collapsed comment shows some of its replies
        if previous.is_single_line() && !expansion.is_single_line() {
            let replies = next.hidden_children(id, replies_on_expand);
            return next.reveal(&replies, Expansion::SingleLine);
        }
        next
    }

    fn children_index(&self) -> HashMap<&CommentId, Vec<&CommentId>> {
        let mut index: HashMap<&CommentId, Vec<&CommentId>> = HashMap::new();
        for entry in self.entries() {
            if let Some(parent) = &entry.comment.parent_comment_id {
                index.entry(parent).or_default().push(&entry.comment.id);
            }
        }
        index
    }
}

fn descendants_of<'a>(
    children: &HashMap<&'a CommentId, Vec<&'a CommentId>>,
    id: &CommentId,
) -> HashSet<&'a CommentId> {
    let mut found = HashSet::new();
    let mut queue: VecDeque<&CommentId> =
        children.get(id).into_iter().flatten().copied().collect();
    while let Some(next) = queue.pop_front() {
        if found.insert(next) {
            queue.extend(children.get(next).into_iter().flatten().copied());
        }
    }
    found
}

/// Highest score first; equal scores keep their current order.
fn sort_by_score(comments: &mut [&Comment]) {
    comments.sort_by(|a, b| b.base_score.total_cmp(&a.base_score));
}
