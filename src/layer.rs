use std::{
    collections::BTreeMap,
    fmt::Debug,
    ops::Bound::{Excluded, Unbounded},
};

use crate::{
    arena::NodeId,
    interval::Interval,
    metric::Metric,
    node::{MaximaSet, Node},
    region::Region,
    tree::OuterTree,
};

/// The layer-composition protocol.
///
/// A flow space of rank N is a stack of N layers: [`Layer`] adds a
/// dimension on top of any lower space, [`LeafLayer`] terminates the
/// stack and holds the payloads. Both implement this trait, which is
/// what lets one layer treat "everything below me" uniformly; the
/// public API lives on the [`FlowSpace`] extension trait.
///
/// The cursor methods are the engine's internals. A cursor is plain
/// detached state (a node index plus an inner key per layer); it is
/// only dereferenced under a borrow of the space, or guarded by the
/// generation stamp carried in an [`EntryRef`].
///
/// [`FlowSpace`]: crate::FlowSpace
/// [`EntryRef`]: crate::EntryRef
pub trait Stratum: Default {
    /// The region type for this stack: one interval per layer.
    type Region: Region;

    /// The leaf payload type.
    type Value;

    /// Per-stack cursor state: one (node, key) position per layer plus
    /// a duplicate index at the leaf.
    type Cursor: Clone + PartialEq + Debug;

    /// Store `value` under `region`. The region must be non-empty;
    /// the public [`insert`] checks.
    ///
    /// [`insert`]: crate::FlowSpace::insert
    #[doc(hidden)]
    fn insert_entry(&mut self, region: &Self::Region, value: Self::Value);

    /// The cursor for the lexicographically first stored entry whose
    /// region intersects `query`, if any.
    #[doc(hidden)]
    fn first_cursor(&self, query: &Self::Region) -> Option<Self::Cursor>;

    /// The cursor following `cursor` in the intersection traversal of
    /// `query`.
    #[doc(hidden)]
    fn next_cursor(&self, query: &Self::Region, cursor: &Self::Cursor) -> Option<Self::Cursor>;

    /// The cursor for the first entry stored under exactly `region`.
    #[doc(hidden)]
    fn exact_cursor(&self, region: &Self::Region) -> Option<Self::Cursor>;

    /// The cursor for the entry stored under exactly `region` whose
    /// payload equals `value`.
    #[doc(hidden)]
    fn exact_cursor_for(&self, region: &Self::Region, value: &Self::Value) -> Option<Self::Cursor>
    where
        Self::Value: PartialEq;

    /// The stored region and payload under `cursor`.
    #[doc(hidden)]
    fn entry_at(&self, cursor: &Self::Cursor) -> Option<(Self::Region, &Self::Value)>;

    /// Mutable access to the payload under `cursor`.
    #[doc(hidden)]
    fn payload_at_mut(&mut self, cursor: &Self::Cursor) -> Option<&mut Self::Value>;

    /// Remove the entry under `cursor`, pruning any outer node or
    /// sub-space it empties.
    #[doc(hidden)]
    fn erase_at(&mut self, cursor: &Self::Cursor) -> Option<Self::Value>;

    /// Returns true if no entries are stored.
    fn is_empty(&self) -> bool;

    /// The number of stored entries, duplicates included.
    fn len(&self) -> usize;

    /// Monotonic mutation counter; any insert or erase advances it,
    /// invalidating previously issued [`EntryRef`] handles.
    ///
    /// [`EntryRef`]: crate::EntryRef
    #[doc(hidden)]
    fn generation(&self) -> u64;

    /// Assert every structural invariant, recursively through all
    /// layers. Test support; prohibitively slow on large spaces.
    #[doc(hidden)]
    fn validate(&self);
}

/// The leaf inner set: right endpoints mapped to payload buckets, so
/// duplicate regions coexist.
#[derive(Debug, Clone)]
pub(crate) struct Multimap<M, V>(BTreeMap<M, Vec<V>>);

impl<M, V> Default for Multimap<M, V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<M, V> Multimap<M, V>
where
    M: Metric,
{
    fn singleton(key: M, value: V) -> Self {
        Self(BTreeMap::from([(key, vec![value])]))
    }

    fn insert(&mut self, key: M, value: V) {
        self.0.entry(key).or_default().push(value);
    }

    fn bucket(&self, key: &M) -> Option<&[V]> {
        self.0.get(key).map(Vec::as_slice)
    }

    fn value_at(&self, key: &M, i: usize) -> Option<&V> {
        self.0.get(key)?.get(i)
    }

    fn value_at_mut(&mut self, key: &M, i: usize) -> Option<&mut V> {
        self.0.get_mut(key)?.get_mut(i)
    }

    /// Remove the `i`th duplicate under `key`, dropping the bucket if
    /// it empties.
    fn remove_at(&mut self, key: &M, i: usize) -> Option<V> {
        let bucket = self.0.get_mut(key)?;
        if i >= bucket.len() {
            return None;
        }
        let v = bucket.remove(i);
        if bucket.is_empty() {
            self.0.remove(key);
        }
        Some(v)
    }

    fn first_at_or_after(&self, lo: &M) -> Option<&M> {
        self.0.range(lo..).next().map(|(k, _)| k)
    }

    fn next_key(&self, key: &M) -> Option<&M> {
        self.0.range((Excluded(key), Unbounded)).next().map(|(k, _)| k)
    }

    /// Total stored values across all buckets.
    fn value_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl<M, V> MaximaSet<M> for Multimap<M, V>
where
    M: Metric,
{
    fn top(&self) -> &M {
        self.0
            .last_key_value()
            .map(|(k, _)| k)
            .expect("outer node with empty maxima")
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cursor state for a [`LeafLayer`]: an outer node, a right endpoint,
/// and the index into that endpoint's duplicate bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCursor<M> {
    node: NodeId,
    key: M,
    dup: usize,
}

/// Cursor state for a [`Layer`]: an outer node, a right endpoint, and
/// the cursor of the sub-space stored under that endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCursor<M, C> {
    node: NodeId,
    key: M,
    lower: C,
}

/// The bottom dimension of a flow space: intervals over `M` mapped to
/// payloads `V`.
///
/// A `LeafLayer` on its own is a rank-1 flow space; stacking [`Layer`]s
/// on top adds dimensions. Duplicate intervals are kept side by side in
/// insertion order.
#[derive(Debug, Clone)]
pub struct LeafLayer<M, V> {
    tree: OuterTree<M, Multimap<M, V>>,
    len: usize,
    generation: u64,
}

impl<M, V> Default for LeafLayer<M, V> {
    fn default() -> Self {
        Self {
            tree: OuterTree::default(),
            len: 0,
            generation: 0,
        }
    }
}

impl<M, V> LeafLayer<M, V>
where
    M: Metric,
{
    /// Open a node at the first right endpoint not below `lo`.
    ///
    /// The caller has already checked the node's local hull against
    /// the query, so such an endpoint exists.
    fn open(&self, node: NodeId, lo: &M) -> Option<LeafCursor<M>> {
        let key = self.tree.node(node).maxima.first_at_or_after(lo)?.clone();
        Some(LeafCursor { node, key, dup: 0 })
    }
}

impl<M, V> Stratum for LeafLayer<M, V>
where
    M: Metric,
{
    type Region = (Interval<M>,);
    type Value = V;
    type Cursor = LeafCursor<M>;

    fn insert_entry(&mut self, region: &Self::Region, value: V) {
        let head = &region.0;
        debug_assert!(!head.is_empty());

        self.generation += 1;
        self.len += 1;

        match self.tree.search(head.lo()) {
            None => {
                self.tree.insert_root(Node::new(
                    head.lo().clone(),
                    Multimap::singleton(head.hi().clone(), value),
                ));
            }
            Some((id, None)) => {
                self.tree
                    .node_mut(id)
                    .maxima
                    .insert(head.hi().clone(), value);
                self.tree.ripple_fixup(id);
            }
            Some((id, Some(d))) => {
                self.tree.insert_child(
                    id,
                    d,
                    Node::new(
                        head.lo().clone(),
                        Multimap::singleton(head.hi().clone(), value),
                    ),
                );
            }
        }
    }

    fn first_cursor(&self, query: &Self::Region) -> Option<Self::Cursor> {
        if query.0.is_empty() {
            return None;
        }
        let n = self.tree.first_intersecting(&query.0)?;
        self.open(n, query.0.lo())
    }

    fn next_cursor(&self, query: &Self::Region, cursor: &Self::Cursor) -> Option<Self::Cursor> {
        let node = self.tree.get(cursor.node)?;

        // Every remaining duplicate, then every later endpoint in this
        // node, intersects: the node's intervals share a left endpoint
        // already known to fall inside the query.
        if let Some(bucket) = node.maxima.bucket(&cursor.key) {
            if cursor.dup + 1 < bucket.len() {
                return Some(LeafCursor {
                    node: cursor.node,
                    key: cursor.key.clone(),
                    dup: cursor.dup + 1,
                });
            }
        }
        if let Some(k) = node.maxima.next_key(&cursor.key) {
            return Some(LeafCursor {
                node: cursor.node,
                key: k.clone(),
                dup: 0,
            });
        }

        let n = self.tree.scan_next(cursor.node, &query.0)?;
        self.open(n, query.0.lo())
    }

    fn exact_cursor(&self, region: &Self::Region) -> Option<Self::Cursor> {
        let head = &region.0;
        if head.is_empty() {
            return None;
        }

        let (id, miss) = self.tree.search(head.lo())?;
        if miss.is_some() {
            return None;
        }
        self.tree.node(id).maxima.bucket(head.hi())?;
        Some(LeafCursor {
            node: id,
            key: head.hi().clone(),
            dup: 0,
        })
    }

    fn exact_cursor_for(&self, region: &Self::Region, value: &V) -> Option<Self::Cursor>
    where
        V: PartialEq,
    {
        let head = &region.0;
        if head.is_empty() {
            return None;
        }

        let (id, miss) = self.tree.search(head.lo())?;
        if miss.is_some() {
            return None;
        }
        let bucket = self.tree.node(id).maxima.bucket(head.hi())?;
        let dup = bucket.iter().position(|v| v == value)?;
        Some(LeafCursor {
            node: id,
            key: head.hi().clone(),
            dup,
        })
    }

    fn entry_at(&self, cursor: &Self::Cursor) -> Option<(Self::Region, &V)> {
        let node = self.tree.get(cursor.node)?;
        let v = node.maxima.value_at(&cursor.key, cursor.dup)?;
        let region = (Interval::new(node.metric.clone(), cursor.key.clone()),);
        Some((region, v))
    }

    fn payload_at_mut(&mut self, cursor: &Self::Cursor) -> Option<&mut V> {
        let node = self.tree.get_mut(cursor.node)?;
        node.maxima.value_at_mut(&cursor.key, cursor.dup)
    }

    fn erase_at(&mut self, cursor: &Self::Cursor) -> Option<V> {
        self.tree.get(cursor.node)?;
        let v = self
            .tree
            .node_mut(cursor.node)
            .maxima
            .remove_at(&cursor.key, cursor.dup)?;

        if self.tree.node(cursor.node).maxima.is_empty() {
            self.tree.remove(cursor.node);
        } else {
            self.tree.ripple_fixup(cursor.node);
        }

        self.len -= 1;
        self.generation += 1;
        Some(v)
    }

    fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn validate(&self) {
        self.tree.validate();

        let mut total = 0;
        let mut stack: Vec<NodeId> = self.tree.root().into_iter().collect();
        while let Some(id) = stack.pop() {
            let n = self.tree.node(id);
            stack.extend(n.left.into_iter().chain(n.right));
            total += n.maxima.value_count();
        }
        assert_eq!(total, self.len, "stored entry count drifted");
    }
}

/// One dimension stacked on a lower flow space.
///
/// Each inner entry maps a right endpoint to the sub-space holding the
/// remaining dimensions; duplicate regions are absorbed by the leaf.
#[derive(Debug, Clone)]
pub struct Layer<M, S> {
    tree: OuterTree<M, BTreeMap<M, S>>,
    len: usize,
    generation: u64,
}

impl<M, S> Default for Layer<M, S> {
    fn default() -> Self {
        Self {
            tree: OuterTree::default(),
            len: 0,
            generation: 0,
        }
    }
}

impl<M, S> Layer<M, S>
where
    M: Metric,
    S: Stratum,
{
    fn open_key(&self, node: NodeId, lo: &M) -> Option<M> {
        self.tree
            .node(node)
            .maxima
            .range(lo..)
            .next()
            .map(|(k, _)| k.clone())
    }

    fn next_key(&self, node: NodeId, key: &M) -> Option<M> {
        self.tree
            .node(node)
            .maxima
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    /// Find the first combined match at or after the inner position
    /// `(node, key)`.
    ///
    /// A position in this layer only stands if the sub-space under it
    /// also matches the query tail, so inner entries (and then outer
    /// nodes) are consumed until a sub-space produces a cursor. Later
    /// inner entries of a node span supersets of earlier ones, so the
    /// inner walk always runs to the end of the node.
    fn seek(
        &self,
        query: &<Self as Stratum>::Region,
        node: NodeId,
        key: M,
    ) -> Option<LayerCursor<M, S::Cursor>> {
        let (mut node, mut key) = (node, key);
        loop {
            if let Some(sub) = self.tree.node(node).maxima.get(&key) {
                if let Some(lower) = sub.first_cursor(&query.1) {
                    return Some(LayerCursor { node, key, lower });
                }
            }

            match self.next_key(node, &key) {
                Some(k) => key = k,
                None => {
                    node = self.tree.scan_next(node, &query.0)?;
                    key = self.open_key(node, query.0.lo())?;
                }
            }
        }
    }
}

impl<M, S> Stratum for Layer<M, S>
where
    M: Metric,
    S: Stratum,
{
    type Region = (Interval<M>, S::Region);
    type Value = S::Value;
    type Cursor = LayerCursor<M, S::Cursor>;

    fn insert_entry(&mut self, region: &Self::Region, value: Self::Value) {
        let head = &region.0;
        debug_assert!(!head.is_empty());

        self.generation += 1;
        self.len += 1;

        match self.tree.search(head.lo()) {
            None => {
                let mut sub = S::default();
                sub.insert_entry(&region.1, value);
                self.tree.insert_root(Node::new(
                    head.lo().clone(),
                    BTreeMap::from([(head.hi().clone(), sub)]),
                ));
            }
            Some((id, None)) => {
                self.tree
                    .node_mut(id)
                    .maxima
                    .entry(head.hi().clone())
                    .or_insert_with(S::default)
                    .insert_entry(&region.1, value);
                self.tree.ripple_fixup(id);
            }
            Some((id, Some(d))) => {
                let mut sub = S::default();
                sub.insert_entry(&region.1, value);
                self.tree.insert_child(
                    id,
                    d,
                    Node::new(
                        head.lo().clone(),
                        BTreeMap::from([(head.hi().clone(), sub)]),
                    ),
                );
            }
        }
    }

    fn first_cursor(&self, query: &Self::Region) -> Option<Self::Cursor> {
        if Region::is_empty(query) {
            return None;
        }
        let node = self.tree.first_intersecting(&query.0)?;
        let key = self.open_key(node, query.0.lo())?;
        self.seek(query, node, key)
    }

    fn next_cursor(&self, query: &Self::Region, cursor: &Self::Cursor) -> Option<Self::Cursor> {
        let node = self.tree.get(cursor.node)?;

        // Deepest layer first: the sub-space may hold further matches
        // under the same endpoints.
        if let Some(sub) = node.maxima.get(&cursor.key) {
            if let Some(lower) = sub.next_cursor(&query.1, &cursor.lower) {
                return Some(LayerCursor {
                    node: cursor.node,
                    key: cursor.key.clone(),
                    lower,
                });
            }
        }

        match self.next_key(cursor.node, &cursor.key) {
            Some(k) => self.seek(query, cursor.node, k),
            None => {
                let n = self.tree.scan_next(cursor.node, &query.0)?;
                let key = self.open_key(n, query.0.lo())?;
                self.seek(query, n, key)
            }
        }
    }

    fn exact_cursor(&self, region: &Self::Region) -> Option<Self::Cursor> {
        let head = &region.0;
        if head.is_empty() {
            return None;
        }

        let (id, miss) = self.tree.search(head.lo())?;
        if miss.is_some() {
            return None;
        }
        let sub = self.tree.node(id).maxima.get(head.hi())?;
        let lower = sub.exact_cursor(&region.1)?;
        Some(LayerCursor {
            node: id,
            key: head.hi().clone(),
            lower,
        })
    }

    fn exact_cursor_for(&self, region: &Self::Region, value: &Self::Value) -> Option<Self::Cursor>
    where
        Self::Value: PartialEq,
    {
        let head = &region.0;
        if head.is_empty() {
            return None;
        }

        let (id, miss) = self.tree.search(head.lo())?;
        if miss.is_some() {
            return None;
        }
        let sub = self.tree.node(id).maxima.get(head.hi())?;
        let lower = sub.exact_cursor_for(&region.1, value)?;
        Some(LayerCursor {
            node: id,
            key: head.hi().clone(),
            lower,
        })
    }

    fn entry_at(&self, cursor: &Self::Cursor) -> Option<(Self::Region, &Self::Value)> {
        let node = self.tree.get(cursor.node)?;
        let sub = node.maxima.get(&cursor.key)?;
        let (tail, v) = sub.entry_at(&cursor.lower)?;
        let region = (
            Interval::new(node.metric.clone(), cursor.key.clone()),
            tail,
        );
        Some((region, v))
    }

    fn payload_at_mut(&mut self, cursor: &Self::Cursor) -> Option<&mut Self::Value> {
        let node = self.tree.get_mut(cursor.node)?;
        let sub = node.maxima.get_mut(&cursor.key)?;
        sub.payload_at_mut(&cursor.lower)
    }

    fn erase_at(&mut self, cursor: &Self::Cursor) -> Option<Self::Value> {
        let (value, sub_empty) = {
            let node = self.tree.get_mut(cursor.node)?;
            let sub = node.maxima.get_mut(&cursor.key)?;
            let v = sub.erase_at(&cursor.lower)?;
            (v, sub.is_empty())
        };

        if sub_empty {
            let node = self.tree.node_mut(cursor.node);
            node.maxima.remove(&cursor.key);
            if node.maxima.is_empty() {
                self.tree.remove(cursor.node);
            } else {
                // Dropping an endpoint can shrink the hulls above.
                self.tree.ripple_fixup(cursor.node);
            }
        }

        self.len -= 1;
        self.generation += 1;
        Some(value)
    }

    fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn validate(&self) {
        self.tree.validate();

        let mut total = 0;
        let mut stack: Vec<NodeId> = self.tree.root().into_iter().collect();
        while let Some(id) = stack.pop() {
            let n = self.tree.node(id);
            stack.extend(n.left.into_iter().chain(n.right));
            for sub in n.maxima.values() {
                assert!(!sub.is_empty(), "empty sub-space left in an inner entry");
                sub.validate();
                total += sub.len();
            }
        }
        assert_eq!(total, self.len, "stored entry count drifted");
    }
}
