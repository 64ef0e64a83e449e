//! The comment pool store.
//!
//! Owns the single current [`PoolState`], the load-once latch for the bulk
//! fetch, and the listeners that are told when the state changes. The store
//! is the only writer; everything else reads snapshots.

use super::limits::PoolLimits;
use super::state::PoolState;
use crate::domain::{Comment, CommentId, Expansion, TreeNode};
use crate::ports::CommentSource;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle returned by the subscribe methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PoolState)>;

/// A change request for the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolOperation {
    /// Reveal the best `count` hidden top-level comments.
    RevealTopLevel { count: usize },
    /// Reveal up to `count` hidden replies to `parent`.
    RevealChildrenOf { parent: CommentId, count: usize },
    RevealParentOf { id: CommentId },
    RevealAncestorChain { id: CommentId },
    SetExpansion { id: CommentId, expansion: Expansion },
    SetTransient { id: CommentId, key: String, value: Value },
    /// Re-fetch one comment from the source and replace its content.
    InvalidateComment { id: CommentId },
    AddComment { comment: Comment },
}

impl PoolOperation {
    pub fn name(&self) -> &'static str {
        match self {
            PoolOperation::RevealTopLevel { .. } => "reveal_top_level",
            PoolOperation::RevealChildrenOf { .. } => "reveal_children_of",
            PoolOperation::RevealParentOf { .. } => "reveal_parent_of",
            PoolOperation::RevealAncestorChain { .. } => "reveal_ancestor_chain",
            PoolOperation::SetExpansion { .. } => "set_expansion",
            PoolOperation::SetTransient { .. } => "set_transient",
            PoolOperation::InvalidateComment { .. } => "invalidate_comment",
            PoolOperation::AddComment { .. } => "add_comment",
        }
    }

    /// Operations that look at comments beyond the initial batch.
    fn needs_full_load(&self) -> bool {
        !matches!(
            self,
            PoolOperation::SetTransient { .. }
                | PoolOperation::InvalidateComment { .. }
                | PoolOperation::AddComment { .. }
        )
    }
}

/// When per-comment listeners hear about a committed change.
enum CommentSignal {
    None,
    Now(CommentId),
    /// After the scheduler has had one turn.
    Deferred(CommentId),
}

/// Stateful pool of discovered comments with reveal operations.
///
/// Operations run one at a time (`&mut self`). Most first make sure the
/// bulk load has happened, then swaps in a new state and notifies.
pub struct CommentPool<S> {
    source: S,
    limits: PoolLimits,
    state: Arc<PoolState>,
    loaded_all: bool,
    next_listener: u64,
    listeners: Vec<(ListenerId, Listener)>,
    comment_listeners: HashMap<CommentId, Vec<(ListenerId, Listener)>>,
}

impl<S: CommentSource> CommentPool<S> {
    /// Create a pool showing `initial` comments.
    pub fn new(source: S, initial: Vec<Comment>, limits: PoolLimits) -> Self {
        Self {
            source,
            limits,
            state: Arc::new(PoolState::from_initial(initial)),
            loaded_all: false,
            next_listener: 0,
            listeners: Vec::new(),
            comment_listeners: HashMap::new(),
        }
    }

    /// Create a pool from the source's own initial batch.
    pub async fn open(source: S, limits: PoolLimits) -> Result<Self> {
        let initial = source.initial_comments().await?;
        tracing::debug!(initial = initial.len(), "opened comment pool");
        Ok(Self::new(source, initial, limits))
    }

    /// Current snapshot. Cheap; compare with `Arc::ptr_eq` to detect change.
    pub fn state(&self) -> Arc<PoolState> {
        Arc::clone(&self.state)
    }

    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn has_loaded_all(&self) -> bool {
        self.loaded_all
    }

    pub fn visible_tree(&self) -> Vec<TreeNode> {
        self.state.visible_tree()
    }

    pub fn loaded_tree(&self) -> Vec<TreeNode> {
        self.state.loaded_tree()
    }

    /// Whether a top-level "load more" control should be offered, given the
    /// total number of top-level comments the context claims to have.
    pub fn should_offer_load_more(&self, total_top_level: Option<usize>) -> bool {
        let unseen_remote = !self.loaded_all
            && total_top_level.is_some_and(|total| total > self.state.visible_top_level_count());
        unseen_remote || self.state.has_hidden_top_level()
    }

    /// Listen for every committed state change.
    pub fn subscribe(&mut self, listener: impl FnMut(&PoolState) + 'static) -> ListenerId {
        let id = self.allocate_listener();
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Listen for changes that concern one comment's own display.
    pub fn subscribe_comment(
        &mut self,
        comment: CommentId,
        listener: impl FnMut(&PoolState) + 'static,
    ) -> ListenerId {
        let id = self.allocate_listener();
        self.comment_listeners
            .entry(comment)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listener_count();
        self.listeners.retain(|(existing, _)| *existing != id);
        for registered in self.comment_listeners.values_mut() {
            registered.retain(|(existing, _)| *existing != id);
        }
        self.comment_listeners.retain(|_, registered| !registered.is_empty());
        self.listener_count() != before
    }

    fn listener_count(&self) -> usize {
        self.listeners.len() + self.comment_listeners.values().map(Vec::len).sum::<usize>()
    }

    fn allocate_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    /// Run the one-time bulk load if it has not happened yet.
    ///
    /// The latch is only set once the fetch succeeds; a failed fetch leaves
    /// the state untouched and the error goes to the caller.
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded_all {
            return Ok(());
        }
        // Latch stays unset if the fetch fails
        let loaded = self.source.load_all(self.limits.bulk_load_limit).await?;
        let fetched = loaded.len();
        let next = self.state.with_loaded_comments(loaded);
        tracing::debug!(
            fetched,
            added = next.len() - self.state.len(),
            "bulk loaded comments"
        );
        self.loaded_all = true;
        self.state = Arc::new(next);
        Ok(())
    }

    /// Apply one operation.
    pub async fn dispatch(&mut self, operation: PoolOperation) -> Result<()> {
        if operation.needs_full_load() {
            self.ensure_loaded().await?;
        }
        let name = operation.name();
        let limits = self.limits;
        let current = Arc::clone(&self.state);

        let (next, signal) = match operation {
            PoolOperation::RevealTopLevel { count } => (
                current.reveal_top_level(count, limits.children_with_top_level),
                CommentSignal::None,
            ),
            PoolOperation::RevealChildrenOf { parent, count } => {
                (current.reveal_children_of(&parent, count), CommentSignal::None)
            }
            PoolOperation::RevealParentOf { id } => {
                (current.reveal_parent_of(&id), CommentSignal::None)
            }
            PoolOperation::RevealAncestorChain { id } => {
                (current.reveal_ancestor_chain(&id), CommentSignal::None)
            }
            PoolOperation::SetExpansion { id, expansion } => {
                let next = current.set_expansion(&id, expansion, limits.children_on_expand);
                (next, CommentSignal::Deferred(id))
            }
            PoolOperation::SetTransient { id, key, value } => {
                let next = current.with_transient(&id, &key, value);
                (next, CommentSignal::Deferred(id))
            }
            PoolOperation::InvalidateComment { id } => {
                // Refetch; a vanished comment keeps its last content
                match self.source.fetch_comment(&id).await? {
                    Some(comment) => (current.with_comment(comment), CommentSignal::Now(id)),
                    None => {
                        tracing::warn!(comment = %id, "invalidated comment no longer exists");
                        return Ok(());
                    }
                }
            }
            PoolOperation::AddComment { comment } => {
                (current.with_added_comment(comment), CommentSignal::None)
            }
        };

        // Whole-pool listeners only hear about real changes
        if next.revision() == current.revision() {
            tracing::debug!(operation = name, "pool unchanged");
        } else {
            let revealed = next.sort_order().len() - current.sort_order().len();
            tracing::debug!(operation = name, revealed, "pool updated");
            self.commit(next);
        }

        // A comment's own listeners are told even when its flags already matched
        match signal {
            CommentSignal::None => {}
            CommentSignal::Now(id) => self.notify_comment(&id),
            CommentSignal::Deferred(id) => {
                tokio::task::yield_now().await;
                self.notify_comment(&id);
            }
        }
        Ok(())
    }

    fn commit(&mut self, next: PoolState) {
        // Listeners read the committed snapshot
        self.state = Arc::new(next);
        let state = Arc::clone(&self.state);
        for (_, listener) in &mut self.listeners {
            listener(&state);
        }
    }

    fn notify_comment(&mut self, id: &CommentId) {
        let state = Arc::clone(&self.state);
        if state.entry(id).is_none() {
            return;
        }
        if let Some(registered) = self.comment_listeners.get_mut(id) {
            for (_, listener) in registered {
                listener(&state);
            }
        }
    }

    pub async fn reveal_top_level(&mut self, count: usize) -> Result<()> {
        self.dispatch(PoolOperation::RevealTopLevel { count }).await
    }

    /// Reveal the configured batch of top-level comments.
    pub async fn load_more_top_level(&mut self) -> Result<()> {
        self.reveal_top_level(self.limits.top_level_batch).await
    }

    pub async fn reveal_children_of(&mut self, parent: &CommentId, count: usize) -> Result<()> {
        self.dispatch(PoolOperation::RevealChildrenOf {
            parent: parent.clone(),
            count,
        })
        .await
    }

    /// Reveal the configured batch of replies to `parent`.
    pub async fn show_more_children_of(&mut self, parent: &CommentId) -> Result<()> {
        self.reveal_children_of(parent, self.limits.children_batch).await
    }

    pub async fn reveal_parent_of(&mut self, id: &CommentId) -> Result<()> {
        self.dispatch(PoolOperation::RevealParentOf { id: id.clone() })
            .await
    }

    pub async fn reveal_ancestor_chain(&mut self, id: &CommentId) -> Result<()> {
        self.dispatch(PoolOperation::RevealAncestorChain { id: id.clone() })
            .await
    }

    pub async fn set_expansion(&mut self, id: &CommentId, expansion: Expansion) -> Result<()> {
        self.dispatch(PoolOperation::SetExpansion {
            id: id.clone(),
            expansion,
        })
        .await
    }

    pub async fn set_transient(&mut self, id: &CommentId, key: &str, value: Value) -> Result<()> {
        self.dispatch(PoolOperation::SetTransient {
            id: id.clone(),
            key: key.to_string(),
            value,
        })
        .await
    }

    pub async fn invalidate_comment(&mut self, id: &CommentId) -> Result<()> {
        self.dispatch(PoolOperation::InvalidateComment { id: id.clone() })
            .await
    }

    pub async fn add_comment(&mut self, comment: Comment) -> Result<()> {
        self.dispatch(PoolOperation::AddComment { comment }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory source that counts bulk fetches.
    #[derive(Default)]
    struct FakeSource {
        initial: Vec<Comment>,
        all: Mutex<Vec<Comment>>,
        bulk_fetches: AtomicUsize,
        fail_bulk: bool,
    }

    impl FakeSource {
        fn new(initial: Vec<Comment>, all: Vec<Comment>) -> Self {
            Self {
                initial,
                all: Mutex::new(all),
                ..Self::default()
            }
        }

        fn fetches(&self) -> usize {
            self.bulk_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommentSource for FakeSource {
        async fn initial_comments(&self) -> Result<Vec<Comment>> {
            Ok(self.initial.clone())
        }

        async fn load_all(&self, limit: usize) -> Result<Vec<Comment>> {
            self.bulk_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_bulk {
                bail!("source unavailable");
            }
            let all = self.all.lock().unwrap();
            Ok(all.iter().take(limit).cloned().collect())
        }

        async fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>> {
            let all = self.all.lock().unwrap();
            Ok(all.iter().find(|c| &c.id == id).cloned())
        }
    }

    fn c(id: &str, parent: Option<&str>, top: Option<&str>, score: f64) -> Comment {
        Comment::new(id, parent, top).with_score(score)
    }

    fn id(raw: &str) -> CommentId {
        CommentId::from(raw)
    }

    fn order(pool: &CommentPool<FakeSource>) -> Vec<String> {
        pool.state()
            .sort_order()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn thread() -> Vec<Comment> {
        vec![
            c("t1", None, None, 5.0),
            c("r1", Some("t1"), Some("t1"), 3.0),
            c("r2", Some("r1"), Some("t1"), 2.0),
            c("r3", Some("r2"), Some("t1"), 1.0),
            c("t2", None, None, 9.0),
        ]
    }

    fn pool_showing(initial: &[&str]) -> CommentPool<FakeSource> {
        let all = thread();
        let shown = all
            .iter()
            .filter(|c| initial.contains(&c.id.as_str()))
            .cloned()
            .collect();
        CommentPool::new(FakeSource::new(Vec::new(), all), shown, PoolLimits::default())
    }

    #[tokio::test]
    async fn open_uses_source_initial_batch() {
        let source = FakeSource::new(vec![c("t1", None, None, 0.0)], thread());
        let pool = CommentPool::open(source, PoolLimits::default()).await.unwrap();
        assert_eq!(order(&pool), vec!["t1"]);
        assert!(!pool.has_loaded_all());
    }

    #[tokio::test]
    async fn bulk_load_happens_once() {
        let mut pool = pool_showing(&["r3"]);
        pool.reveal_parent_of(&id("r3")).await.unwrap();
        pool.reveal_parent_of(&id("r2")).await.unwrap();
        pool.load_more_top_level().await.unwrap();

        assert_eq!(pool.source().fetches(), 1);
        assert!(pool.has_loaded_all());
        assert_eq!(order(&pool), vec!["t1", "r1", "r2", "r3", "t2"]);
    }

    #[tokio::test]
    async fn failed_bulk_load_propagates_and_leaves_state() {
        let source = FakeSource {
            fail_bulk: true,
            ..FakeSource::new(Vec::new(), thread())
        };
        let initial = vec![c("r3", Some("r2"), Some("t1"), 1.0)];
        let mut pool = CommentPool::new(source, initial, PoolLimits::default());
        let before = pool.state();

        let err = pool.reveal_ancestor_chain(&id("r3")).await.unwrap_err();
        assert!(err.to_string().contains("source unavailable"));
        assert!(Arc::ptr_eq(&before, &pool.state()));
        assert!(!pool.has_loaded_all());
    }

    #[tokio::test]
    async fn ancestor_chain_surfaces_above_visible_reply() {
        let mut pool = pool_showing(&["t2", "r3"]);
        pool.reveal_ancestor_chain(&id("r3")).await.unwrap();

        assert_eq!(order(&pool), vec!["t2", "t1", "r1", "r2", "r3"]);
        let state = pool.state();
        assert_eq!(state.entry(&id("t1")).unwrap().expansion, Expansion::SingleLine);

        let tree = pool.visible_tree();
        let roots: Vec<&str> = tree.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn listeners_fire_only_on_change() {
        let mut pool = pool_showing(&["t1"]);
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        pool.subscribe(move |_| *seen.borrow_mut() += 1);

        pool.show_more_children_of(&id("t1")).await.unwrap();
        assert_eq!(*calls.borrow(), 1);

        // Nothing hidden is left under t1.
        pool.show_more_children_of(&id("t1")).await.unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn expansion_listener_sees_committed_state() {
        let mut pool = pool_showing(&["t1"]);
        pool.reveal_children_of(&id("t1"), 1).await.unwrap();

        let observed = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&observed);
        pool.subscribe_comment(id("r1"), move |state| {
            let entry = state.entry(&CommentId::from("r1")).unwrap();
            let reply_visible = state.is_visible(&CommentId::from("r2"));
            log.borrow_mut().push((entry.expansion, reply_visible));
        });

        pool.set_expansion(&id("r1"), Expansion::Expanded).await.unwrap();
        assert_eq!(*observed.borrow(), vec![(Expansion::Expanded, true)]);
    }

    #[tokio::test]
    async fn comment_listener_runs_after_a_scheduler_turn() {
        let mut pool = pool_showing(&["t1"]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let committed = Rc::clone(&log);
        pool.subscribe(move |_| committed.borrow_mut().push("committed"));
        let notified = Rc::clone(&log);
        pool.subscribe_comment(id("t1"), move |_| notified.borrow_mut().push("comment"));

        let local = tokio::task::LocalSet::new();
        local.spawn_local(async move {
            pool.set_expansion(&id("t1"), Expansion::Expanded).await.unwrap();
        });
        let other = Rc::clone(&log);
        local.spawn_local(async move {
            other.borrow_mut().push("other task");
        });
        local.await;

        assert_eq!(*log.borrow(), vec!["committed", "other task", "comment"]);
    }

    #[tokio::test]
    async fn repeated_expansion_still_signals_the_comment() {
        let mut pool = pool_showing(&["t1"]);
        pool.set_expansion(&id("t1"), Expansion::Expanded).await.unwrap();

        let pool_calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&pool_calls);
        pool.subscribe(move |_| *seen.borrow_mut() += 1);
        let comment_calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&comment_calls);
        pool.subscribe_comment(id("t1"), move |_| *seen.borrow_mut() += 1);

        let before = pool.state();
        pool.set_expansion(&id("t1"), Expansion::Expanded).await.unwrap();
        assert!(Arc::ptr_eq(&before, &pool.state()));
        assert_eq!(*pool_calls.borrow(), 0);
        assert_eq!(*comment_calls.borrow(), 1);
    }

    #[tokio::test]
    async fn transient_state_does_not_need_the_bulk_load() {
        let source = FakeSource {
            fail_bulk: true,
            ..FakeSource::new(Vec::new(), thread())
        };
        let initial = vec![c("t1", None, None, 0.0)];
        let mut pool = CommentPool::new(source, initial, PoolLimits::default());

        pool.set_transient(&id("t1"), "replying", Value::Bool(true)).await.unwrap();
        let state = pool.state();
        let entry = state.entry(&id("t1")).unwrap();
        assert_eq!(entry.transient.get("replying"), Some(&Value::Bool(true)));
        assert_eq!(pool.source().fetches(), 0);
        assert!(!pool.has_loaded_all());
    }

    #[tokio::test]
    async fn comment_listener_ignores_other_comments() {
        let mut pool = pool_showing(&["t1", "t2"]);
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        let listener = pool.subscribe_comment(id("t2"), move |_| *seen.borrow_mut() += 1);

        pool.set_expansion(&id("t1"), Expansion::Expanded).await.unwrap();
        assert_eq!(*calls.borrow(), 0);

        pool.set_transient(&id("t2"), "replying", Value::Bool(true)).await.unwrap();
        assert_eq!(*calls.borrow(), 1);

        assert!(pool.unsubscribe(listener));
        assert!(!pool.unsubscribe(listener));
        pool.set_expansion(&id("t2"), Expansion::Expanded).await.unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn invalidate_replaces_content_without_loading() {
        let mut pool = pool_showing(&["t1"]);
        pool.set_expansion(&id("t1"), Expansion::Truncated).await.unwrap();
        pool.source().all.lock().unwrap()[0].body = "edited".to_string();

        pool.invalidate_comment(&id("t1")).await.unwrap();
        let state = pool.state();
        let entry = state.entry(&id("t1")).unwrap();
        assert_eq!(entry.comment.body, "edited");
        assert_eq!(entry.expansion, Expansion::Truncated);
    }

    #[tokio::test]
    async fn invalidate_missing_comment_is_a_no_op() {
        let mut pool = pool_showing(&["t1"]);
        let before = pool.state();
        pool.invalidate_comment(&id("ghost")).await.unwrap();
        assert!(Arc::ptr_eq(&before, &pool.state()));
        assert_eq!(pool.source().fetches(), 0);
    }

    #[tokio::test]
    async fn added_comment_does_not_trigger_bulk_load() {
        let mut pool = pool_showing(&["t1"]);
        pool.add_comment(c("new", Some("t1"), Some("t1"), 0.0)).await.unwrap();
        assert_eq!(order(&pool), vec!["t1", "new"]);
        assert_eq!(pool.source().fetches(), 0);
    }

    #[tokio::test]
    async fn load_more_offer_tracks_remote_and_hidden_top_level() {
        let mut pool = pool_showing(&["t1"]);
        assert!(pool.should_offer_load_more(Some(2)));
        assert!(!pool.should_offer_load_more(Some(1)));
        assert!(!pool.should_offer_load_more(None));

        pool.ensure_loaded().await.unwrap();
        assert!(pool.should_offer_load_more(None));

        pool.load_more_top_level().await.unwrap();
        assert!(!pool.should_offer_load_more(Some(2)));
    }

    #[tokio::test]
    async fn dispatch_accepts_raw_operations() {
        let mut pool = pool_showing(&["r3"]);
        pool.dispatch(PoolOperation::RevealParentOf { id: id("r3") })
            .await
            .unwrap();
        assert_eq!(order(&pool), vec!["r2", "r3"]);
        assert_eq!(
            pool.state().entry(&id("r2")).unwrap().expansion,
            Expansion::Truncated
        );
    }
}
