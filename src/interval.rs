use std::{cmp::Ordering, fmt, str::FromStr};

use crate::{error::ParseIntervalError, metric::Metric};

/// How one interval (or region) stands relative to another.
///
/// Produced by [`Interval::relation`] and [`Region::relation`]. The
/// [`AdjacentOverlap`] variant is a query category ("touching or
/// sharing points") and is never returned by `relation` itself, since
/// adjacency and overlap are mutually exclusive facts; test for it with
/// [`Relation::holds`].
///
/// [`Region::relation`]: crate::Region::relation
/// [`AdjacentOverlap`]: Relation::AdjacentOverlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Disjoint and not adjacent.
    None,
    /// The same interval.
    Equal,
    /// Every element of the left side is in the right side.
    Subset,
    /// Every element of the right side is in the left side.
    Superset,
    /// At least one shared element, neither side containing the other.
    Overlap,
    /// Disjoint, with no expressible value between the two.
    Adjacent,
    /// Adjacent or sharing at least one element.
    AdjacentOverlap,
}

impl Relation {
    /// Returns true if the related items share at least one point.
    pub fn overlaps(&self) -> bool {
        !matches!(self, Self::None | Self::Adjacent)
    }

    /// Test whether this relation holds between `a` and `b`.
    pub fn holds<M>(&self, a: &Interval<M>, b: &Interval<M>) -> bool
    where
        M: Metric,
    {
        match self {
            Self::AdjacentOverlap => a.unites(b),
            want => a.relation(b) == *want,
        }
    }

    /// Merge one dimension's relation with the relation already folded
    /// over the remaining (inner) dimensions of a region.
    ///
    /// An equal dimension defers to the rest. Regions are adjacent
    /// only when exactly one dimension is adjacent and every other is
    /// equal; a second non-equal dimension alongside an adjacency
    /// makes the regions unrelated. Mixed containment degrades to
    /// plain overlap.
    pub(crate) fn combine(self, dim: Relation) -> Relation {
        match (self, dim) {
            (Self::None, _) | (_, Self::None) => Self::None,
            (acc, Self::Equal) => acc,
            (Self::Equal, r) => r,
            (Self::Adjacent, _) | (_, Self::Adjacent) => Self::None,
            (acc, r) if acc == r => acc,
            _ => Self::Overlap,
        }
    }
}

/// A closed interval `[lo, hi]` over a [`Metric`].
///
/// An interval is either non-empty with `lo <= hi`, or the canonical
/// empty interval with `lo = M::max_value()` and `hi = M::min_value()`.
/// No operation ever produces a non-canonical `lo > hi` value, so
/// emptiness is a single comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval<M> {
    lo: M,
    hi: M,
}

impl<M> Interval<M>
where
    M: Metric,
{
    /// Construct the interval covering `a` to `b` inclusive.
    ///
    /// The arguments are sorted, so a non-empty interval results in all
    /// cases; use [`Interval::empty`] for the empty interval.
    pub fn new(a: M, b: M) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// The interval containing exactly `value`.
    pub fn point(value: M) -> Self {
        Self {
            lo: value.clone(),
            hi: value,
        }
    }

    /// The canonical empty interval.
    pub fn empty() -> Self {
        Self {
            lo: M::max_value(),
            hi: M::min_value(),
        }
    }

    /// The interval containing every value of the metric.
    pub fn all() -> Self {
        Self {
            lo: M::min_value(),
            hi: M::max_value(),
        }
    }

    /// The lower endpoint.
    ///
    /// Unspecified when the interval is empty.
    pub fn lo(&self) -> &M {
        &self.lo
    }

    /// The upper endpoint.
    ///
    /// Unspecified when the interval is empty.
    pub fn hi(&self) -> &M {
        &self.hi
    }

    /// Returns true if the interval contains no values.
    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Returns true if the interval contains exactly one value.
    pub fn is_singleton(&self) -> bool {
        self.lo == self.hi
    }

    /// Returns true if the interval covers the whole metric range.
    pub fn is_all(&self) -> bool {
        self.lo == M::min_value() && self.hi == M::max_value()
    }

    /// Returns true if the two intervals share at least one value.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.lo <= other.hi && other.lo <= self.hi
    }

    /// The interval of values contained by both intervals; may be
    /// empty.
    pub fn intersection(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }

        let lo = self.lo.clone().max(other.lo.clone());
        let hi = self.hi.clone().min(other.hi.clone());
        if lo > hi {
            Self::empty()
        } else {
            Self { lo, hi }
        }
    }

    /// Returns true if the intervals are disjoint with no expressible
    /// value between them.
    ///
    /// Only disjoint intervals can be adjacent. The successor step
    /// saturates, but a saturated endpoint cannot be strictly below the
    /// other interval, so the comparison stays sound at the extrema.
    pub fn adjacent(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        if self.hi < other.lo {
            self.hi.successor() == other.lo
        } else if other.hi < self.lo {
            other.hi.successor() == self.lo
        } else {
            false
        }
    }

    /// Returns true if the union of the two intervals is itself an
    /// interval (they intersect or are adjacent).
    pub fn unites(&self, other: &Self) -> bool {
        self.intersects(other) || self.adjacent(other)
    }

    /// The smallest interval containing both intervals.
    pub fn hull(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        Self {
            lo: self.lo.clone().min(other.lo.clone()),
            hi: self.hi.clone().max(other.hi.clone()),
        }
    }

    /// Returns true if every value of `other` is contained in `self`.
    ///
    /// The empty interval is contained by everything.
    pub fn contains(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }

        self.lo <= other.lo && other.hi <= self.hi
    }

    /// Classify how `self` stands relative to `other`.
    ///
    /// Two empty intervals are [`Relation::Equal`]; an empty interval
    /// relates to nothing else.
    pub fn relation(&self, other: &Self) -> Relation {
        if self.is_empty() || other.is_empty() {
            return if self == other {
                Relation::Equal
            } else {
                Relation::None
            };
        }

        if self.intersects(other) {
            if self == other {
                Relation::Equal
            } else if other.contains(self) {
                Relation::Subset
            } else if self.contains(other) {
                Relation::Superset
            } else {
                Relation::Overlap
            }
        } else if self.adjacent(other) {
            Relation::Adjacent
        } else {
            Relation::None
        }
    }
}

impl<M> PartialOrd for Interval<M>
where
    M: Metric,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Intervals order lexicographically: by the lower endpoint, with ties
/// broken by the upper endpoint. This is the order query results are
/// yielded in.
impl<M> Ord for Interval<M>
where
    M: Metric,
{
    fn cmp(&self, other: &Self) -> Ordering {
        match self.lo.cmp(&other.lo) {
            Ordering::Equal => self.hi.cmp(&other.hi),
            v => v,
        }
    }
}

/// Writes `lo-hi`, collapsing a singleton to its single value and the
/// empty interval to `*`.
impl<M> fmt::Display for Interval<M>
where
    M: Metric + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "*")
        } else if self.is_singleton() {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

/// Reads the forms `lo-hi`, `lo-` (open upper end), `-hi` (open lower
/// end), a bare singleton value, and `*` for the empty interval.
impl<M> FromStr for Interval<M>
where
    M: Metric + FromStr,
{
    type Err = ParseIntervalError<M::Err>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseIntervalError::Empty);
        }
        if s == "*" {
            return Ok(Self::empty());
        }

        let parse = |v: &str| v.trim().parse::<M>().map_err(ParseIntervalError::Endpoint);

        match s.split_once('-') {
            None => Ok(Self::point(parse(s)?)),
            Some(("", "")) => Err(ParseIntervalError::Empty),
            Some(("", hi)) => Ok(Self::new(M::min_value(), parse(hi)?)),
            Some((lo, "")) => Ok(Self::new(parse(lo)?, M::max_value())),
            Some((lo, hi)) => Ok(Self::new(parse(lo)?, parse(hi)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test_utils::{arbitrary_interval, arbitrary_interval_or_empty};

    #[test]
    fn test_empty_is_canonical() {
        let e = Interval::<u8>::empty();
        assert!(e.is_empty());
        assert_eq!(*e.lo(), u8::MAX);
        assert_eq!(*e.hi(), u8::MIN);

        // Construction sorts, so new() can never produce an empty
        // interval.
        let i = Interval::new(9_u8, 3);
        assert!(!i.is_empty());
        assert_eq!((*i.lo(), *i.hi()), (3, 9));
    }

    #[test]
    fn test_singleton_adjacency() {
        let a = Interval::point(5_u8);
        let b = Interval::point(6_u8);

        assert!(a.adjacent(&b));
        assert!(b.adjacent(&a));
        assert!(!a.intersects(&b));
        assert!(a.unites(&b));
        assert_eq!(a.relation(&b), Relation::Adjacent);
        assert!(Relation::AdjacentOverlap.holds(&a, &b));
    }

    #[test]
    fn test_adjacency_at_extrema() {
        // A saturated successor must not fabricate adjacency across
        // the top of the metric range.
        let top = Interval::point(u8::MAX);
        let bottom = Interval::point(u8::MIN);
        assert!(!top.adjacent(&bottom));
        assert!(Interval::new(0_u8, 254).adjacent(&top));
    }

    #[test]
    fn test_relation_with_empty() {
        let e = Interval::<u8>::empty();
        let i = Interval::new(1_u8, 4);

        assert_eq!(e.relation(&e), Relation::Equal);
        assert_eq!(e.relation(&i), Relation::None);
        assert_eq!(i.relation(&e), Relation::None);

        // Vacuous containment still holds.
        assert!(i.contains(&e));
        assert!(!e.contains(&i));
    }

    #[test]
    fn test_relation_classes() {
        let i = Interval::new(5_u8, 10);

        assert_eq!(i.relation(&Interval::new(5, 10)), Relation::Equal);
        assert_eq!(i.relation(&Interval::new(0, 15)), Relation::Subset);
        assert_eq!(i.relation(&Interval::new(6, 9)), Relation::Superset);
        assert_eq!(i.relation(&Interval::new(8, 15)), Relation::Overlap);
        assert_eq!(i.relation(&Interval::new(11, 15)), Relation::Adjacent);
        assert_eq!(i.relation(&Interval::new(13, 15)), Relation::None);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("3-9".parse::<Interval<u8>>().unwrap(), Interval::new(3, 9));
        assert_eq!("7".parse::<Interval<u8>>().unwrap(), Interval::point(7));
        assert_eq!(
            "3-".parse::<Interval<u8>>().unwrap(),
            Interval::new(3, u8::MAX)
        );
        assert_eq!(
            "-9".parse::<Interval<u8>>().unwrap(),
            Interval::new(u8::MIN, 9)
        );
        assert_eq!("*".parse::<Interval<u8>>().unwrap(), Interval::empty());
        assert_eq!(
            " 3 - 9 ".parse::<Interval<u8>>().unwrap(),
            Interval::new(3, 9)
        );

        assert!(matches!(
            "".parse::<Interval<u8>>(),
            Err(ParseIntervalError::Empty)
        ));
        assert!(matches!(
            "x-9".parse::<Interval<u8>>(),
            Err(ParseIntervalError::Endpoint(_))
        ));
    }

    proptest! {
        /// Intervals intersect exactly when their intersection is
        /// non-empty, and the intersection is contained by both.
        #[test]
        fn prop_intersection(
            a in arbitrary_interval_or_empty(),
            b in arbitrary_interval_or_empty(),
        ) {
            let i = a.intersection(&b);
            assert_eq!(a.intersects(&b), !i.is_empty());
            assert_eq!(a.intersects(&b), b.intersects(&a));
            assert!(a.contains(&i));
            assert!(b.contains(&i));
        }

        /// Adjacent intervals are disjoint, and adjacency is
        /// symmetric.
        #[test]
        fn prop_adjacency_disjoint(
            a in arbitrary_interval_or_empty(),
            b in arbitrary_interval_or_empty(),
        ) {
            if a.adjacent(&b) {
                assert!(!a.intersects(&b));
                assert!(b.adjacent(&a));
            }
        }

        /// The hull contains both inputs and is the smallest such
        /// interval for non-empty inputs.
        #[test]
        fn prop_hull(
            a in arbitrary_interval_or_empty(),
            b in arbitrary_interval_or_empty(),
        ) {
            let h = a.hull(&b);
            assert!(h.contains(&a));
            assert!(h.contains(&b));

            if !a.is_empty() && !b.is_empty() {
                assert_eq!(*h.lo(), *a.lo().min(b.lo()));
                assert_eq!(*h.hi(), *a.hi().max(b.hi()));
            }
        }

        /// relation() is consistent with the individual predicates.
        #[test]
        fn prop_relation_consistency(
            a in arbitrary_interval(),
            b in arbitrary_interval(),
        ) {
            match a.relation(&b) {
                Relation::Equal => assert_eq!(a, b),
                Relation::Subset => assert!(b.contains(&a) && a != b),
                Relation::Superset => assert!(a.contains(&b) && a != b),
                Relation::Overlap => {
                    assert!(a.intersects(&b));
                    assert!(!a.contains(&b) && !b.contains(&a));
                }
                Relation::Adjacent => assert!(a.adjacent(&b)),
                Relation::None => assert!(!a.unites(&b)),
                Relation::AdjacentOverlap => unreachable!(),
            }
        }

        /// Formatting then parsing an interval yields the same
        /// interval.
        #[test]
        fn prop_text_round_trip(a in arbitrary_interval_or_empty()) {
            let text = a.to_string();
            let parsed = text.parse::<Interval<u8>>().unwrap();
            assert_eq!(parsed, a);
        }

        /// The lexicographic order agrees with comparing the endpoint
        /// tuples.
        #[test]
        fn prop_lexicographic_order(
            a in arbitrary_interval(),
            b in arbitrary_interval(),
        ) {
            let want = (a.lo(), a.hi()).cmp(&(b.lo(), b.hi()));
            assert_eq!(a.cmp(&b), want);
        }
    }
}
