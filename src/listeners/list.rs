//! # Hierarchical listener lists.
//!
//! One node per concrete event type that has been looked up. A node owns
//! its direct listeners and the ids of its ancestor nodes, and caches the
//! merged list (own listeners, then each ancestor's) as an immutable
//! snapshot.
//!
//! ## Architecture
//! ```text
//! ListenerTable ── arena: Vec<Arc<Node>> + index: Class → NodeId
//!
//! Node(Child) ── supers: [Base, Root]           (closure, fixed at creation)
//!   listeners: [c1]       cache: [c1, b1, r1]
//!
//! Node(Base)  ── supers: [Root]   extenders: [Child]
//! Node(Root)  ── supers: []       extenders: [Base, Child]
//! ```
//!
//! ## Rules
//! - A node is published in the index only after it is recorded in the
//!   extenders of every node in its `supers`, so invalidating an ancestor
//!   always reaches it.
//! - Any `add` / `remove_if` on a node drops the snapshot of that node and
//!   of every extender; the next read rebuilds it.
//! - Rebuilds lock one node's listeners at a time and never touch another
//!   node's cache; the arena lock is never held while taking a node lock.
//! - Nodes live as long as the table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::events::Class;

/// Hook applied to the merged buffer before a snapshot is frozen.
///
/// Must give the same result for the same input.
pub type CacheTransform<L> = Arc<dyn Fn(&mut Vec<Arc<L>>) + Send + Sync>;

/// Immutable, ordered listeners applicable to one event type.
pub type Snapshot<L> = Arc<[Arc<L>]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(usize);

struct Node<L> {
    class: Class,
    supers: Box<[NodeId]>,
    extenders: Mutex<Vec<NodeId>>,
    listeners: Mutex<Vec<Arc<L>>>,
    cache: RwLock<Option<Snapshot<L>>>,
    rebuild: Mutex<()>,
}

impl<L> Node<L> {
    fn invalidate(&self) {
        let _rebuild = self.rebuild.lock();
        *self.cache.write() = None;
    }

    fn cached(&self) -> Option<Snapshot<L>> {
        self.cache.read().clone()
    }
}

struct Arena<L> {
    nodes: Vec<Arc<Node<L>>>,
    index: HashMap<Class, NodeId>,
}

/// All listener nodes of one bus.
pub(crate) struct ListenerTable<L> {
    base: Class,
    arena: RwLock<Arena<L>>,
    transform: CacheTransform<L>,
}

impl<L: Send + Sync + 'static> ListenerTable<L> {
    pub(crate) fn new(base: Class, transform: CacheTransform<L>) -> Self {
        Self {
            base,
            arena: RwLock::new(Arena {
                nodes: Vec::new(),
                index: HashMap::new(),
            }),
            transform,
        }
    }

    /// Handle on the node of `class`, materializing it (and its ancestors)
    /// on first use. `class` must be assignable to the base type.
    pub(crate) fn list(&self, class: &Class) -> ListenerList<'_, L> {
        ListenerList {
            table: self,
            node: self.get_or_create(class),
        }
    }

    fn get_or_create(&self, class: &Class) -> Arc<Node<L>> {
        if let Some(node) = self.lookup(class) {
            return node;
        }

        let direct: Vec<Arc<Node<L>>> = class
            .supertypes()
            .iter()
            .filter(|s| self.base.is_assignable_from(s))
            .map(|s| self.get_or_create(s))
            .collect();
        let mut supers: Vec<NodeId> = Vec::new();
        {
            let arena = self.arena.read();
            let nodes = &arena.nodes;
            let closure = direct
                .iter()
                .map(|n| &n.class)
                .chain(direct.iter().flat_map(|n| n.supers.iter().map(move |id| &nodes[id.0].class)));
            for ancestor in closure {
                if let Some(id) = arena.index.get(ancestor) {
                    if !supers.contains(id) {
                        supers.push(*id);
                    }
                }
            }
        }

        let mut arena = self.arena.write();
        if let Some(id) = arena.index.get(class) {
            return Arc::clone(&arena.nodes[id.0]);
        }
        let id = NodeId(arena.nodes.len());
        let node = Arc::new(Node {
            class: class.clone(),
            supers: supers.into_boxed_slice(),
            extenders: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            cache: RwLock::new(None),
            rebuild: Mutex::new(()),
        });
        for ancestor in node.supers.iter() {
            arena.nodes[ancestor.0].extenders.lock().push(id);
        }
        arena.nodes.push(Arc::clone(&node));
        arena.index.insert(class.clone(), id);
        tracing::debug!(class = class.name(), supers = node.supers.len(), "listener node created");
        node
    }

    fn lookup(&self, class: &Class) -> Option<Arc<Node<L>>> {
        let arena = self.arena.read();
        arena.index.get(class).map(|id| Arc::clone(&arena.nodes[id.0]))
    }

    fn resolve(&self, ids: &[NodeId]) -> Vec<Arc<Node<L>>> {
        let arena = self.arena.read();
        ids.iter().map(|id| Arc::clone(&arena.nodes[id.0])).collect()
    }

    fn invalidate(&self, node: &Node<L>) {
        node.invalidate();
        let extenders = node.extenders.lock().clone();
        for extender in self.resolve(&extenders) {
            extender.invalidate();
        }
    }

    fn snapshot(&self, node: &Node<L>) -> Snapshot<L> {
        if let Some(snapshot) = node.cached() {
            return snapshot;
        }

        let _rebuild = node.rebuild.lock();
        if let Some(snapshot) = node.cached() {
            return snapshot;
        }

        let mut buffer: Vec<Arc<L>> = node.listeners.lock().clone();
        for ancestor in self.resolve(&node.supers) {
            buffer.extend(ancestor.listeners.lock().iter().cloned());
        }
        (self.transform)(&mut buffer);

        let snapshot: Snapshot<L> = buffer.into();
        *node.cache.write() = Some(Arc::clone(&snapshot));
        tracing::trace!(class = node.class.name(), listeners = snapshot.len(), "listener cache rebuilt");
        snapshot
    }

    /// Every materialized node, in creation order.
    pub(crate) fn lists(&self) -> Vec<ListenerList<'_, L>> {
        let nodes: Vec<Arc<Node<L>>> = self.arena.read().nodes.clone();
        nodes
            .into_iter()
            .map(|node| ListenerList { table: self, node })
            .collect()
    }

    /// Number of materialized nodes.
    pub(crate) fn len(&self) -> usize {
        self.arena.read().nodes.len()
    }
}

/// Handle on the listener list of one event type.
///
/// Obtained from [`EventBus::get_list`](crate::EventBus::get_list).
pub struct ListenerList<'a, L> {
    table: &'a ListenerTable<L>,
    node: Arc<Node<L>>,
}

impl<'a, L: Send + Sync + 'static> ListenerList<'a, L> {
    /// Event type of this list.
    pub fn class(&self) -> &Class {
        &self.node.class
    }

    /// Ancestor types whose listeners this list includes, in merge order.
    pub fn ancestors(&self) -> Vec<Class> {
        self.table
            .resolve(&self.node.supers)
            .iter()
            .map(|node| node.class.clone())
            .collect()
    }

    /// Listeners applicable to this type: own listeners in insertion order,
    /// then each ancestor's own listeners.
    ///
    /// The snapshot is shared and stays the same until the next change to
    /// this list or one of its ancestors.
    pub fn get_cache(&self) -> Snapshot<L> {
        self.table.snapshot(&self.node)
    }

    /// Appends a listener for this type.
    pub fn add(&self, listener: impl Into<Arc<L>>) {
        self.node.listeners.lock().push(listener.into());
        self.table.invalidate(&self.node);
    }

    /// Removes the own listeners matching `predicate`; returns whether any was removed.
    pub fn remove_if<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&Arc<L>) -> bool,
    {
        let removed = {
            let mut listeners = self.node.listeners.lock();
            let before = listeners.len();
            listeners.retain(|listener| !predicate(listener));
            listeners.len() != before
        };
        if removed {
            self.table.invalidate(&self.node);
        }
        removed
    }

    /// Number of own listeners (ancestors excluded).
    pub fn len(&self) -> usize {
        self.node.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self) -> bool {
        self.node.cached().is_some()
    }
}

impl<L> fmt::Debug for ListenerList<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("class", &self.node.class)
            .field("listeners", &self.node.listeners.lock().len())
            .field("supers", &self.node.supers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    use crate::events::{EventType, Supertypes};

    struct Root;
    impl EventType for Root {}

    struct Mid {
        root: Root,
    }
    impl EventType for Mid {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.extends(|m: &Mid| &m.root);
        }
    }

    struct Side;
    impl EventType for Side {}

    struct Leaf {
        mid: Mid,
        side: Side,
    }
    impl EventType for Leaf {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.extends(|l: &Leaf| &l.mid).extends(|l: &Leaf| &l.side);
        }
    }

    fn table() -> ListenerTable<&'static str> {
        ListenerTable::new(Class::of::<Root>(), Arc::new(|_: &mut Vec<Arc<&'static str>>| {}))
    }

    fn names(snapshot: &Snapshot<&'static str>) -> Vec<&'static str> {
        snapshot.iter().map(|l| **l).collect()
    }

    #[test]
    fn test_supers_filtered_by_base() {
        let table = table();
        let leaf = table.list(&Class::of::<Leaf>());
        assert_eq!(leaf.ancestors(), vec![Class::of::<Mid>(), Class::of::<Root>()]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_order_own_then_ancestors() {
        let table = table();
        let root = table.list(&Class::of::<Root>());
        let mid = table.list(&Class::of::<Mid>());
        let leaf = table.list(&Class::of::<Leaf>());

        root.add("r1");
        leaf.add("l1");
        mid.add("m1");
        root.add("r2");
        leaf.add("l2");

        let first = leaf.get_cache();
        assert_eq!(names(&first), vec!["l1", "l2", "m1", "r1", "r2"]);
        assert_eq!(names(&mid.get_cache()), vec!["m1", "r1", "r2"]);
        assert_eq!(names(&root.get_cache()), vec!["r1", "r2"]);

        let again = leaf.get_cache();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_ancestor_change_invalidates_descendants() {
        let table = table();
        let root = table.list(&Class::of::<Root>());
        let mid = table.list(&Class::of::<Mid>());
        let leaf = table.list(&Class::of::<Leaf>());
        mid.add("m1");

        let stale = leaf.get_cache();
        let _ = mid.get_cache();
        let _ = root.get_cache();
        assert!(leaf.is_cached() && mid.is_cached() && root.is_cached());

        root.add("r1");
        assert!(!leaf.is_cached());
        assert!(!mid.is_cached());
        assert!(!root.is_cached());

        let fresh = leaf.get_cache();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert_eq!(names(&fresh), vec!["m1", "r1"]);

        assert!(root.remove_if(|l| **l == "r1"));
        assert_eq!(names(&leaf.get_cache()), vec!["m1"]);
        assert!(!root.remove_if(|l| **l == "r1"));
    }

    #[test]
    fn test_descendant_change_keeps_ancestor_cache() {
        let table = table();
        let root = table.list(&Class::of::<Root>());
        let leaf = table.list(&Class::of::<Leaf>());
        root.add("r1");
        let cached = root.get_cache();

        leaf.add("l1");
        assert!(root.is_cached());
        assert!(Arc::ptr_eq(&cached, &root.get_cache()));
    }

    #[test]
    fn test_late_descendant_sees_existing_listeners() {
        let table = table();
        table.list(&Class::of::<Root>()).add("r1");
        let leaf = table.list(&Class::of::<Leaf>());
        assert_eq!(names(&leaf.get_cache()), vec!["r1"]);

        table.list(&Class::of::<Mid>()).add("m1");
        assert_eq!(names(&leaf.get_cache()), vec!["m1", "r1"]);
    }

    #[test]
    fn test_transform_applied_on_rebuild() {
        let table: ListenerTable<&'static str> = ListenerTable::new(
            Class::of::<Root>(),
            Arc::new(|buffer: &mut Vec<Arc<&'static str>>| buffer.reverse()),
        );
        let root = table.list(&Class::of::<Root>());
        let mid = table.list(&Class::of::<Mid>());
        root.add("r1");
        mid.add("m1");
        mid.add("m2");
        assert_eq!(names(&mid.get_cache()), vec!["r1", "m2", "m1"]);
    }

    #[test]
    fn test_concurrent_adds_and_reads() {
        const THREADS: usize = 6;
        const PER_THREAD: usize = 50;

        let table: Arc<ListenerTable<usize>> = Arc::new(ListenerTable::new(
            Class::of::<Root>(),
            Arc::new(|_: &mut Vec<Arc<usize>>| {}),
        ));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..PER_THREAD {
                        let class = if t % 2 == 0 { Class::of::<Root>() } else { Class::of::<Mid>() };
                        table.list(&class).add(t * PER_THREAD + i);
                        let _ = table.list(&Class::of::<Leaf>()).get_cache();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let leaf = table.list(&Class::of::<Leaf>());
        assert_eq!(leaf.get_cache().len(), THREADS * PER_THREAD);
        assert_eq!(table.len(), 3);
    }
}
