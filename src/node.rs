use std::collections::BTreeMap;

use crate::{arena::NodeId, interval::Interval, metric::Metric};

/// Red-black node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Which child of a parent a node is, or the side a descent took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dir {
    Left,
    Right,
}

impl Dir {
    pub(crate) fn flip(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// The inner set of right endpoints held by an outer node.
///
/// The tree code needs only the largest key to compute a node's local
/// hull; the layer owning the tree knows the concrete container.
pub(crate) trait MaximaSet<M> {
    /// The largest right endpoint in the set.
    ///
    /// # Panics
    ///
    /// Panics if the set is empty: an outer node with an emptied
    /// maxima set must be removed from the tree, never observed.
    fn top(&self) -> &M;

    fn is_empty(&self) -> bool;
}

impl<M, S> MaximaSet<M> for BTreeMap<M, S>
where
    M: Ord,
{
    fn top(&self) -> &M {
        self.last_key_value()
            .map(|(k, _)| k)
            .expect("outer node with empty maxima")
    }

    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

/// One outer-tree node: every interval stored here shares the left
/// endpoint `metric`, with the right endpoints (and their payloads or
/// sub-spaces) held in `maxima`.
///
/// `parent` and `next` are non-owning back/forward indices; the arena
/// owns every node.
#[derive(Debug, Clone)]
pub(crate) struct Node<M, A> {
    pub(crate) metric: M,
    pub(crate) maxima: A,

    /// The convex hull of every interval in this node and all of its
    /// descendants; the pruning augment.
    pub(crate) hull: Interval<M>,

    pub(crate) color: Color,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,

    /// In-order successor thread.
    pub(crate) next: Option<NodeId>,
}

impl<M, A> Node<M, A>
where
    M: Metric,
    A: MaximaSet<M>,
{
    /// A detached red node; the caller links it into the tree.
    pub(crate) fn new(metric: M, maxima: A) -> Self {
        let hull = Interval::new(metric.clone(), maxima.top().clone());
        Self {
            metric,
            maxima,
            hull,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
            next: None,
        }
    }

    pub(crate) fn child(&self, d: Dir) -> Option<NodeId> {
        match d {
            Dir::Left => self.left,
            Dir::Right => self.right,
        }
    }

    pub(crate) fn set_child(&mut self, d: Dir, child: Option<NodeId>) {
        match d {
            Dir::Left => self.left = child,
            Dir::Right => self.right = child,
        }
    }

    /// The hull of just this node's intervals: they all start at
    /// `metric`, so it is spanned by the largest right endpoint.
    pub(crate) fn local_hull(&self) -> Interval<M> {
        Interval::new(self.metric.clone(), self.maxima.top().clone())
    }
}
