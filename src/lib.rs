//! An N-dimensional flow space: an associative container whose keys
//! are axis-aligned hyper-rectangles (tuples of closed integer
//! intervals) and whose values are caller-supplied payloads.
//!
//! The motivating use is indexing IP-network traffic properties: the
//! 5-tuple (source address, source port, destination address,
//! destination port, protocol) carves a 5-dimensional space into
//! labelled regions, and a query region (a subnet-to-subnet flow)
//! returns every stored region intersecting it, with its payload.
//!
//! # Layers
//!
//! A space is a stack of one [`Layer`] per dimension, terminated by a
//! [`LeafLayer`] holding the payloads. Each layer keeps an augmented
//! red-black tree over the left endpoints of its dimension's
//! intervals; a node stores all right endpoints sharing that left
//! endpoint, and a subtree-hull augment lets queries prune whole
//! subtrees. A single query descends all N trees cooperatively.
//!
//! The [`Space1`] … [`Space5`] aliases name the common stacks, and the
//! [`region!`] macro builds the matching region tuples:
//!
//! ```
//! use flowspace::{region, FlowSpace, Interval, Space2};
//!
//! // Index (source address, destination port) flow rules.
//! let mut space = Space2::<u32, u16, &str>::default();
//!
//! // 10.0.0.0/24 toward HTTPS.
//! space.insert(
//!     region!(
//!         Interval::new(0x0A00_0000, 0x0A00_00FF),
//!         Interval::point(443),
//!     ),
//!     "edge-https",
//! )?;
//! // 10.0.0.0/16 toward the ephemeral ports.
//! space.insert(
//!     region!(
//!         Interval::new(0x0A00_0000, 0x0A00_FFFF),
//!         Interval::new(1024, 65535),
//!     ),
//!     "ephemeral",
//! )?;
//!
//! // Which rules cover 10.0.0.17 on port 443?
//! let q = region!(Interval::point(0x0A00_0011), Interval::point(443));
//! let labels = space.query(&q).map(|(_region, v)| *v).collect::<Vec<_>>();
//! assert_eq!(labels, ["edge-https"]);
//! # Ok::<(), flowspace::Error>(())
//! ```
//!
//! # Ordering
//!
//! Query iteration yields stored regions in lexicographic order:
//! outermost dimension first, comparing each dimension by left
//! endpoint and then right endpoint. The order is deterministic across
//! runs for identical insert sequences; duplicate regions yield in
//! insertion order.
//!
//! # Mutation and iterators
//!
//! Query iterators borrow the space, so inserts and erases cannot run
//! while one is live. Detached [`EntryRef`] handles from
//! [`FlowSpace::find`] are instead stamped with a mutation generation
//! and refuse to act once stale.
//!
//! The engine is a single-threaded in-memory structure: share it
//! across threads behind external synchronization if needed, but no
//! operation blocks or suspends.

#![warn(missing_docs)]

mod arena;
mod error;
mod interval;
mod iter;
mod layer;
mod metric;
mod node;
mod region;
mod space;
mod tree;

#[cfg(test)]
mod test_utils;

pub use crate::{
    error::{Error, ParseIntervalError},
    interval::{Interval, Relation},
    iter::{Iter, IterMut},
    layer::{Layer, LayerCursor, LeafCursor, LeafLayer, Stratum},
    metric::Metric,
    region::Region,
    space::{EntryRef, FlowSpace},
};

/// A rank-1 flow space over one metric.
pub type Space1<A, V> = LeafLayer<A, V>;

/// A rank-2 flow space.
pub type Space2<A, B, V> = Layer<A, Space1<B, V>>;

/// A rank-3 flow space.
pub type Space3<A, B, C, V> = Layer<A, Space2<B, C, V>>;

/// A rank-4 flow space.
pub type Space4<A, B, C, D, V> = Layer<A, Space3<B, C, D, V>>;

/// A rank-5 flow space: the IP flow 5-tuple shape.
pub type Space5<A, B, C, D, E, V> = Layer<A, Space4<B, C, D, E, V>>;

/// The region of a [`Space1`].
pub type Region1<A> = (Interval<A>,);

/// The region of a [`Space2`].
pub type Region2<A, B> = (Interval<A>, Region1<B>);

/// The region of a [`Space3`].
pub type Region3<A, B, C> = (Interval<A>, Region2<B, C>);

/// The region of a [`Space4`].
pub type Region4<A, B, C, D> = (Interval<A>, Region3<B, C, D>);

/// The region of a [`Space5`].
pub type Region5<A, B, C, D, E> = (Interval<A>, Region4<B, C, D, E>);
