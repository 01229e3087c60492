use crate::{
    arena::{Arena, NodeId},
    interval::Interval,
    metric::Metric,
    node::{Color, Dir, MaximaSet, Node},
};

/// The outer tree of one layer: an augmented red-black tree over
/// distinct left endpoints.
///
/// Every structural mutation keeps three pieces of bookkeeping
/// current:
///
/// - the red-black coloring invariants,
/// - the per-node subtree hull used to prune searches, repaired
///   bottom-up by [`structure_fixup`] after any relinking,
/// - the `next` thread through the in-order successor of every node.
///
/// [`structure_fixup`]: OuterTree::structure_fixup
#[derive(Debug, Clone)]
pub(crate) struct OuterTree<M, A> {
    arena: Arena<Node<M, A>>,
    root: Option<NodeId>,
}

impl<M, A> Default for OuterTree<M, A> {
    fn default() -> Self {
        Self {
            arena: Arena::default(),
            root: None,
        }
    }
}

impl<M, A> OuterTree<M, A>
where
    M: Metric,
    A: MaximaSet<M>,
{
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<M, A> {
        &self.arena[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<M, A> {
        &mut self.arena[id]
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node<M, A>> {
        self.arena.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<M, A>> {
        self.arena.get_mut(id)
    }

    /// NIL children read as black.
    fn is_red(&self, n: Option<NodeId>) -> bool {
        matches!(n, Some(id) if self.node(id).color == Color::Red)
    }

    fn direction_of(&self, parent: NodeId, child: NodeId) -> Dir {
        let p = self.node(parent);
        if p.left == Some(child) {
            Dir::Left
        } else if p.right == Some(child) {
            Dir::Right
        } else {
            unreachable!("node is not a child of its recorded parent")
        }
    }

    /// Link `child` as the `d` child of `parent`, updating the child's
    /// parent index. The slot must be empty; callers clear it first.
    fn set_child(&mut self, parent: NodeId, d: Dir, child: Option<NodeId>) {
        if let Some(c) = child {
            debug_assert!(self.node(parent).child(d).is_none());
            self.node_mut(c).parent = Some(parent);
        }
        self.node_mut(parent).set_child(d, child);
    }

    /// Empty the `d` child slot of `parent`. The detached child's
    /// parent index is left stale for the caller to rewrite.
    fn clear_child(&mut self, parent: NodeId, d: Dir) -> Option<NodeId> {
        let c = self.node(parent).child(d);
        self.node_mut(parent).set_child(d, None);
        c
    }

    /// Recompute the subtree hull of `id` from its local hull and the
    /// (possibly reassigned) children's hulls.
    fn structure_fixup(&mut self, id: NodeId) {
        let n = self.node(id);
        let mut hull = n.local_hull();
        if let Some(l) = n.left {
            hull = hull.hull(&self.node(l).hull);
        }
        if let Some(r) = n.right {
            hull = hull.hull(&self.node(r).hull);
        }
        self.node_mut(id).hull = hull;
    }

    /// Run [`structure_fixup`] on `id` and every ancestor, bottom-up.
    /// Returns the root.
    ///
    /// [`structure_fixup`]: OuterTree::structure_fixup
    pub(crate) fn ripple_fixup(&mut self, id: NodeId) -> NodeId {
        let mut cur = id;
        loop {
            self.structure_fixup(cur);
            match self.node(cur).parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        debug_assert_eq!(self.root, Some(cur));
        cur
    }

    /// Rotate the subtree rooted at `x` so that `x` moves into its `d`
    /// child position. Returns the new root of the subtree, or `x`
    /// unchanged if there is no child opposite `d` to promote.
    ///
    /// The demoted node and the promoted node are hull-fixed bottom-up;
    /// ancestors are the caller's responsibility.
    fn rotate(&mut self, x: NodeId, d: Dir) -> NodeId {
        let parent = self.node(x).parent;
        let child_dir = parent.map(|p| self.direction_of(p, x));
        let other = d.flip();

        let Some(c) = self.node(x).child(other) else {
            return x;
        };

        self.clear_child(x, other);
        let grandchild = self.clear_child(c, d);
        self.set_child(x, other, grandchild);
        self.set_child(c, d, Some(x));

        self.structure_fixup(x);
        self.structure_fixup(c);

        match (parent, child_dir) {
            (Some(p), Some(pd)) => {
                self.clear_child(p, pd);
                self.set_child(p, pd, Some(c));
            }
            _ => {
                self.node_mut(c).parent = None;
                self.root = Some(c);
            }
        }

        c
    }

    /// Descend by metric, recording the last node visited and the
    /// direction the search would have taken next.
    ///
    /// Returns `None` on an empty tree, `(node, None)` on an exact
    /// metric match, and `(leaf, Some(d))` when the key is absent;
    /// the returned node never has a child in that direction.
    pub(crate) fn search(&self, key: &M) -> Option<(NodeId, Option<Dir>)> {
        let mut n = self.root?;
        loop {
            let node = self.node(n);
            let d = if *key > node.metric {
                Dir::Right
            } else if *key < node.metric {
                Dir::Left
            } else {
                return Some((n, None));
            };

            match node.child(d) {
                Some(c) => n = c,
                None => return Some((n, Some(d))),
            }
        }
    }

    /// Install `node` as the root of an empty tree.
    pub(crate) fn insert_root(&mut self, mut node: Node<M, A>) -> NodeId {
        debug_assert!(self.root.is_none());
        node.color = Color::Black;
        let id = self.arena.alloc(node);
        self.root = Some(id);
        id
    }

    /// Attach `node` as the `d` child of `parent` (the attach point
    /// reported by [`search`]), splice it into the successor thread,
    /// and rebalance.
    ///
    /// [`search`]: OuterTree::search
    pub(crate) fn insert_child(&mut self, parent: NodeId, d: Dir, node: Node<M, A>) -> NodeId {
        let id = self.arena.alloc(node);
        self.set_child(parent, d, Some(id));

        match d {
            Dir::Right => {
                // The parent is the predecessor; splice directly after
                // it.
                let pnext = self.node(parent).next;
                self.node_mut(id).next = pnext;
                self.node_mut(parent).next = Some(id);
            }
            Dir::Left => {
                // The parent is the successor. New nodes are always
                // leaves, so the predecessor (if any) is the ancestor
                // whose thread points at the parent; retarget it.
                self.node_mut(id).next = Some(parent);
                let mut a = self.node(parent).parent;
                while let Some(p) = a {
                    if self.node(p).next == Some(parent) {
                        self.node_mut(p).next = Some(id);
                        break;
                    }
                    a = self.node(p).parent;
                }
            }
        }

        self.rebalance_after_insert(id);
        id
    }

    /// Standard red-black insert fixup, then a hull ripple from the
    /// inserted node and a black root.
    fn rebalance_after_insert(&mut self, inserted: NodeId) {
        debug_assert_eq!(self.node(inserted).color, Color::Red);

        let mut x = inserted;
        loop {
            let Some(p) = self.node(x).parent else {
                break;
            };
            if self.node(p).color != Color::Red {
                break;
            }
            let Some(g) = self.node(p).parent else {
                break;
            };

            let child_dir = self.direction_of(g, p);
            let other = child_dir.flip();
            let uncle = self.node(g).child(other);

            if self.is_red(uncle) {
                self.node_mut(p).color = Color::Black;
                self.node_mut(uncle.expect("red uncle exists")).color = Color::Black;
                self.node_mut(g).color = Color::Red;
                x = g;
            } else {
                if self.node(p).child(other) == Some(x) {
                    x = p;
                    self.rotate(x, child_dir);
                }
                // The rotation may have reshuffled the relationships;
                // re-read them before recoloring.
                let p = self.node(x).parent.expect("fixup node has a parent");
                let g = self.node(p).parent.expect("fixup node has a grandparent");
                self.node_mut(p).color = Color::Black;
                self.node_mut(g).color = Color::Red;
                self.rotate(g, other);
            }
        }

        let root = self.ripple_fixup(inserted);
        self.node_mut(root).color = Color::Black;
    }

    /// The in-order predecessor: the rightmost node of the left
    /// subtree, or else the nearest ancestor holding `id` in its right
    /// subtree.
    fn prev_in_order(&self, id: NodeId) -> Option<NodeId> {
        let n = self.node(id);
        if let Some(mut c) = n.left {
            while let Some(r) = self.node(c).right {
                c = r;
            }
            debug_assert_eq!(self.node(c).next, Some(id));
            return Some(c);
        }

        let mut child = id;
        let mut p = n.parent;
        while let Some(pp) = p {
            if self.node(pp).right == Some(child) {
                debug_assert_eq!(self.node(pp).next, Some(id));
                return Some(pp);
            }
            child = pp;
            p = self.node(pp).parent;
        }
        None
    }

    /// Put `n` in `old`'s position: same color, same parent slot, same
    /// children (skipping any link that would make `n` refer to
    /// itself). Order-preserving, so no successor threads change here.
    fn replace_with(&mut self, old: NodeId, n: NodeId) {
        let color = self.node(old).color;
        self.node_mut(n).color = color;

        match self.node(old).parent {
            Some(p) => {
                let d = self.direction_of(p, old);
                self.clear_child(p, d);
                if p != n {
                    self.set_child(p, d, Some(n));
                }
            }
            None => {
                self.node_mut(n).parent = None;
                self.root = Some(n);
            }
        }

        self.node_mut(n).left = None;
        self.node_mut(n).right = None;
        let old_left = self.node(old).left;
        let old_right = self.node(old).right;
        if old_left != Some(n) {
            self.set_child(n, Dir::Left, old_left);
        }
        if old_right != Some(n) {
            self.set_child(n, Dir::Right, old_right);
        }
        self.node_mut(old).left = None;
        self.node_mut(old).right = None;
    }

    /// Remove `id` from the tree, releasing its arena slot.
    ///
    /// A node with two children swaps in its threaded successor (which
    /// has no left child); the spliced position is then rebalanced with
    /// a direction hint locating the NIL child when the physically
    /// removed node was a leaf.
    pub(crate) fn remove(&mut self, id: NodeId) {
        // Only one thread changes: the predecessor of the removed node
        // skips over it.
        if let Some(prev) = self.prev_in_order(id) {
            let next = self.node(id).next;
            self.node_mut(prev).next = next;
        }

        let (left, right, parent) = {
            let n = self.node(id);
            (n.left, n.right, n.parent)
        };

        // The root with at most one child needs no rebalancing: the
        // promoted child (if any) keeps its correct subtree hull.
        if parent.is_none() && !(left.is_some() && right.is_some()) {
            let child = left.or(right);
            if let Some(c) = child {
                self.node_mut(c).parent = None;
                self.node_mut(c).color = Color::Black;
            }
            self.root = child;
            self.arena.release(id);
            return;
        }

        // With two children the threaded successor stands in for this
        // node; it is the leftmost node of the right subtree and so has
        // no left child.
        let remove_node = if left.is_some() && right.is_some() {
            let s = self.node(id).next.expect("two-children node has a successor");
            debug_assert!(self.node(s).left.is_none());
            s
        } else {
            id
        };

        let mut remove_color = self.node(remove_node).color;
        let mut d: Option<Dir> = None;

        // A red-black node with exactly one child has a red leaf child,
        // so the spliced-in node never carries a subtree of its own.
        let splice = {
            let n = self.node(remove_node);
            n.left.or(n.right)
        };

        let mut splice_node = match splice {
            Some(s) => {
                debug_assert!(self.node(s).left.is_none() && self.node(s).right.is_none());
                remove_color = self.node(s).color;
                self.replace_with(remove_node, s);
                s
            }
            None => {
                let p = self
                    .node(remove_node)
                    .parent
                    .expect("non-root leaf has a parent");
                let dir = self.direction_of(p, remove_node);
                self.clear_child(p, dir);
                d = Some(dir);
                p
            }
        };

        if remove_node != id {
            // Keep the rebalance start point off the node about to be
            // released.
            if splice_node == id {
                splice_node = remove_node;
            }
            self.replace_with(id, remove_node);
        }

        self.arena.release(id);

        let root = self.rebalance_after_remove(splice_node, remove_color, d);
        self.node_mut(root).color = Color::Black;
    }

    /// Standard red-black delete fixup, driven from the splice point.
    ///
    /// `d`, when set, locates the NIL child position of `this` where
    /// the removed leaf used to hang. Structure only changes when the
    /// removed color was black. Ends with a hull ripple to the root.
    fn rebalance_after_remove(&mut self, this: NodeId, c: Color, mut d: Option<Dir>) -> NodeId {
        if c == Color::Black {
            let (mut n, mut parent): (Option<NodeId>, Option<NodeId>) = match d {
                Some(_) => (None, Some(this)),
                None => (Some(this), self.node(this).parent),
            };

            while let Some(p) = parent {
                if self.is_red(n) {
                    self.node_mut(n.expect("red node exists")).color = Color::Black;
                    break;
                }

                // Written for the deficient-on-the-near-side case; the
                // mirrored case just flips the directions.
                let near = match d {
                    Some(dd) => dd,
                    None => self.direction_of(p, n.expect("hintless fixup has a node")),
                };
                let far = near.flip();

                let mut w = self
                    .node(p)
                    .child(far)
                    .expect("black-deficient node has a sibling");
                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(p).color = Color::Red;
                    self.rotate(p, near);
                    w = self.node(p).child(far).expect("sibling after rotation");
                }

                let near_nephew_red = self.is_red(self.node(w).child(near));
                let far_nephew_red = self.is_red(self.node(w).child(far));

                if !near_nephew_red && !far_nephew_red {
                    self.node_mut(w).color = Color::Red;
                    n = Some(p);
                    parent = self.node(p).parent;
                    d = None;
                } else {
                    if !far_nephew_red {
                        let wn = self.node(w).child(near).expect("red near nephew");
                        self.node_mut(wn).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.rotate(w, far);
                        w = self.node(p).child(far).expect("sibling after inner rotation");
                    }
                    let pc = self.node(p).color;
                    self.node_mut(w).color = pc;
                    self.node_mut(p).color = Color::Black;
                    let wf = self.node(w).child(far).expect("red far nephew");
                    self.node_mut(wf).color = Color::Black;
                    self.rotate(p, near);
                    break;
                }
            }
        }

        self.ripple_fixup(this)
    }

    /// Find the first node, in metric order, whose local hull
    /// intersects `query`.
    ///
    /// Walks with a best-so-far candidate: once a node's own intervals
    /// intersect, any earlier match can only sit in its left subtree.
    /// Subtrees whose hull misses the query are pruned, backtracking
    /// upward to the nearest unexplored right subtree; climbing back
    /// into the candidate proves it final.
    pub(crate) fn first_intersecting(&self, query: &Interval<M>) -> Option<NodeId> {
        if query.is_empty() {
            return None;
        }

        let mut candidate = None;
        let mut n = self.root;
        while let Some(id) = n {
            let node = self.node(id);
            if node.local_hull().intersects(query) {
                candidate = Some(id);
                n = node.left;
            } else if node.hull.intersects(query) {
                // Not this node, but something below it matches. Try
                // left first; a miss there backtracks into the right
                // subtree.
                n = node.left.or(node.right);
            } else {
                n = self.backtrack(id, candidate)?;
            }
        }

        candidate
    }

    /// Climb from a pruned subtree to the next unexplored right
    /// subtree. Returns `None` (ending the search with `candidate`)
    /// when the climb reaches the candidate or falls off the root.
    fn backtrack(&self, from: NodeId, candidate: Option<NodeId>) -> Option<Option<NodeId>> {
        let mut cur = from;
        loop {
            let p = self.node(cur).parent?;
            if Some(p) == candidate {
                return None;
            }
            match self.node(p).right {
                Some(r) if r != cur => return Some(Some(r)),
                _ => cur = p,
            }
        }
    }

    /// Advance from `from` along the successor thread to the next node
    /// whose local hull intersects `query`.
    ///
    /// Terminates early once metrics pass the query's upper bound, and
    /// skips whole subtrees whose hull misses the query by jumping to
    /// their rightmost descendant before following its thread.
    pub(crate) fn scan_next(&self, from: NodeId, query: &Interval<M>) -> Option<NodeId> {
        let mut n = self.node(from).next;
        while let Some(id) = n {
            let node = self.node(id);
            if node.local_hull().intersects(query) {
                return Some(id);
            }
            if node.metric > *query.hi() {
                // Every later node starts even further right.
                return None;
            }

            let mut cur = id;
            if !node.hull.intersects(query) {
                // The in-order walk has already covered the left
                // subtree, so skipping this node's subtree means
                // skipping its right spine.
                while let Some(r) = self.node(cur).right {
                    cur = r;
                }
            }
            n = self.node(cur).next;
        }
        None
    }

    /// Assert every structural invariant of the tree: red-black
    /// balance, strict metric ordering, hull correctness, successor
    /// threading, parent back-links, non-empty maxima, and that no
    /// arena slot leaks.
    pub(crate) fn validate(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.arena.len(), 0, "nodes leaked after tree emptied");
            return;
        };

        assert_eq!(self.node(root).color, Color::Black, "root must be black");
        assert!(self.node(root).parent.is_none());

        self.validate_node(root);

        let mut inorder = Vec::new();
        self.collect_inorder(root, &mut inorder);

        for w in inorder.windows(2) {
            assert!(
                self.node(w[0]).metric < self.node(w[1]).metric,
                "metric order violated between {:?} and {:?}",
                self.node(w[0]).metric,
                self.node(w[1]).metric,
            );
        }

        let mut via_thread = Vec::new();
        let mut cur = Some({
            let mut n = root;
            while let Some(l) = self.node(n).left {
                n = l;
            }
            n
        });
        while let Some(id) = cur {
            via_thread.push(id);
            cur = self.node(id).next;
        }
        assert_eq!(
            inorder, via_thread,
            "successor threads disagree with in-order traversal"
        );

        assert_eq!(inorder.len(), self.arena.len(), "arena slots leaked");
    }

    /// Returns the black height of the subtree, counting NIL as 1.
    fn validate_node(&self, id: NodeId) -> usize {
        let n = self.node(id);

        assert!(!n.maxima.is_empty(), "outer node with empty maxima");

        for d in [Dir::Left, Dir::Right] {
            if let Some(c) = n.child(d) {
                assert_eq!(
                    self.node(c).parent,
                    Some(id),
                    "child parent back-link is stale"
                );
            }
        }

        if n.color == Color::Red {
            assert!(!self.is_red(n.left), "red-red violation");
            assert!(!self.is_red(n.right), "red-red violation");
        }

        let lh = n.left.map(|c| self.validate_node(c)).unwrap_or(1);
        let rh = n.right.map(|c| self.validate_node(c)).unwrap_or(1);
        assert_eq!(lh, rh, "black-height mismatch at {:?}", n.metric);

        let mut want = n.local_hull();
        if let Some(l) = n.left {
            want = want.hull(&self.node(l).hull);
        }
        if let Some(r) = n.right {
            want = want.hull(&self.node(r).hull);
        }
        assert_eq!(n.hull, want, "stale subtree hull at {:?}", n.metric);

        lh + (n.color == Color::Black) as usize
    }

    fn collect_inorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let n = self.node(id);
        if let Some(l) = n.left {
            self.collect_inorder(l, out);
        }
        out.push(id);
        if let Some(r) = n.right {
            self.collect_inorder(r, out);
        }
    }
}
