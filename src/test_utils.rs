use std::fmt::{Display, Write};

use proptest::prelude::*;

use crate::{
    interval::Interval,
    metric::Metric,
    node::{Color, MaximaSet},
    tree::OuterTree,
};

/// Endpoint domain for generated intervals.
///
/// A small domain encourages shared left endpoints, duplicates, and
/// dense overlap between generated entries and queries.
const METRIC_MAX: u8 = 20;

/// Generate arbitrary non-empty intervals with endpoints in
/// `[0, METRIC_MAX)`.
pub(crate) fn arbitrary_interval() -> impl Strategy<Value = Interval<u8>> {
    (0..METRIC_MAX, 0..METRIC_MAX).prop_map(|(a, b)| Interval::new(a, b))
}

/// As [`arbitrary_interval`], with the occasional empty interval mixed
/// in.
pub(crate) fn arbitrary_interval_or_empty() -> impl Strategy<Value = Interval<u8>> {
    prop_oneof![
        4 => arbitrary_interval(),
        1 => Just(Interval::empty()),
    ]
}

/// Generate arbitrary non-empty rank-2 regions.
pub(crate) fn arbitrary_region2(
) -> impl Strategy<Value = (Interval<u8>, (Interval<u8>,))> {
    (arbitrary_interval(), arbitrary_interval()).prop_map(|(a, b)| (a, (b,)))
}

/// Linear-feedback shift register based PRNG.
///
/// Generates 65,535 unique values before cycling; deterministic bulk
/// data for large-tree tests.
#[derive(Debug, Clone)]
pub(crate) struct Lfsr(u16);

impl Lfsr {
    pub(crate) fn new(seed: u16) -> Self {
        Self(seed)
    }

    #[allow(clippy::should_implement_trait)]
    pub(crate) fn next(&mut self) -> u16 {
        let lsb = self.0 & 1;
        self.0 >>= 1;
        if lsb == 1 {
            self.0 ^= 0xD008;
        }
        self.0
    }
}

/// Render an outer tree as graphviz dot, one record per node showing
/// the metric, color, and subtree hull.
#[allow(unused)]
pub(crate) fn print_dot<M, A>(t: &OuterTree<M, A>) -> String
where
    M: Metric + Display,
    A: MaximaSet<M>,
{
    let mut buf = String::new();

    writeln!(buf, "digraph {{").unwrap();
    writeln!(buf, "node [shape=record];").unwrap();
    if let Some(root) = t.root() {
        recurse(t, root, &mut buf);
    }
    writeln!(buf, "}}").unwrap();

    buf
}

fn recurse<M, A, W>(t: &OuterTree<M, A>, id: crate::arena::NodeId, buf: &mut W)
where
    M: Metric + Display,
    A: MaximaSet<M>,
    W: std::fmt::Write,
{
    let n = t.node(id);
    let color = match n.color {
        Color::Red => "red",
        Color::Black => "black",
    };
    writeln!(
        buf,
        r#"{} [label="{} | {} | {}"];"#,
        n.metric, n.metric, color, n.hull
    )
    .unwrap();

    for v in [n.left, n.right] {
        match v {
            Some(c) => {
                writeln!(buf, "{} -> {};", n.metric, t.node(c).metric).unwrap();
                recurse(t, c, buf);
            }
            None => {
                writeln!(buf, "null_{} [shape=point,style=invis];", n.metric).unwrap();
                writeln!(buf, "{} -> null_{} [style=invis];", n.metric, n.metric).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::node::Node;

    #[test]
    fn test_lfsr_cycle_length() {
        let mut l = Lfsr::new(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..u16::MAX {
            assert!(seen.insert(l.next()));
        }
    }

    #[test]
    fn test_print_dot_renders_each_node() {
        let mut t = OuterTree::<u8, BTreeMap<u8, ()>>::default();
        t.insert_root(Node::new(5, BTreeMap::from([(9, ())])));
        let root = t.root().unwrap();
        let (id, d) = match t.search(&2) {
            Some((id, Some(d))) => (id, d),
            _ => unreachable!(),
        };
        assert_eq!(id, root);
        t.insert_child(id, d, Node::new(2, BTreeMap::from([(3, ())])));

        let dot = print_dot(&t);
        assert!(dot.contains("digraph {"));
        assert!(dot.contains(r#"5 [label="5 | black | 2-9"];"#));
        assert!(dot.contains("5 -> 2;"));
    }
}
