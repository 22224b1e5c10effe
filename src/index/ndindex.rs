//! `NDIndex`: an ordered Cartesian product of half-open intervals.

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::interval::Interval;

/// The Cartesian product of `D` half-open intervals, one per axis.
///
/// Axes are independent; no operation reorders them. All operations are
/// total and pure and allocate nothing beyond the fixed axis array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NDIndex<const D: usize> {
    axes: [Interval; D],
}

// `#[derive(Default/Serialize/Deserialize)]` cannot be used here because
// `[Interval; D]` only implements these traits for specific lengths, not
// generically over `const D: usize`.
impl<const D: usize> Default for NDIndex<D> {
    #[inline]
    fn default() -> Self {
        Self {
            axes: [Interval::default(); D],
        }
    }
}

impl<const D: usize> Serialize for NDIndex<D> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tup = serializer.serialize_tuple(D)?;
        for a in &self.axes {
            tup.serialize_element(a)?;
        }
        tup.end()
    }
}

impl<'de, const D: usize> Deserialize<'de> for NDIndex<D> {
    fn deserialize<DE>(deserializer: DE) -> Result<Self, DE::Error>
    where
        DE: Deserializer<'de>,
    {
        struct ArrVisitor<const D: usize>;

        impl<'de, const D: usize> Visitor<'de> for ArrVisitor<D> {
            type Value = NDIndex<D>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "an array of {D} intervals")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut axes = [Interval::default(); D];
                for (i, a) in axes.iter_mut().enumerate() {
                    *a = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(NDIndex { axes })
            }
        }

        deserializer.deserialize_tuple(D, ArrVisitor::<D>)
    }
}

impl<const D: usize> NDIndex<D> {
    /// Build from per-axis intervals.
    #[inline]
    pub const fn new(axes: [Interval; D]) -> Self {
        Self { axes }
    }

    /// Expand every axis by `n` on both sides.
    #[inline]
    pub fn grow(&self, n: i64) -> Self {
        let mut axes = self.axes;
        for a in &mut axes {
            *a = a.grow(n);
        }
        Self { axes }
    }

    /// Per-axis intersection; empty on any axis makes the result empty.
    #[inline]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut axes = self.axes;
        for (d, a) in axes.iter_mut().enumerate() {
            *a = a.intersect(&other.axes[d]);
        }
        Self { axes }
    }

    /// True when the intersection with `other` is non-empty on every axis.
    #[inline]
    pub fn touches(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// True when `p` lies inside on every axis.
    #[inline]
    pub fn contains(&self, p: [i64; D]) -> bool {
        self.axes.iter().zip(p).all(|(a, x)| a.contains(x))
    }

    /// True when any axis is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.axes.iter().any(Interval::is_empty)
    }

    /// Number of points in the product; zero when empty.
    #[inline]
    pub fn size(&self) -> usize {
        self.axes.iter().map(Interval::len).product()
    }

    /// Per-axis lengths.
    #[inline]
    pub fn extents(&self) -> [usize; D] {
        let mut e = [0usize; D];
        for (d, a) in self.axes.iter().enumerate() {
            e[d] = a.len();
        }
        e
    }

    /// Per-axis lower bounds.
    #[inline]
    pub fn firsts(&self) -> [i64; D] {
        let mut f = [0i64; D];
        for (d, a) in self.axes.iter().enumerate() {
            f[d] = a.first();
        }
        f
    }

    /// Translate every axis by the matching component of `d`.
    #[inline]
    pub fn shift(&self, d: [i64; D]) -> Self {
        let mut axes = self.axes;
        for (i, a) in axes.iter_mut().enumerate() {
            *a = a.shift(d[i]);
        }
        Self { axes }
    }

    /// Express `self` in coordinates local to `base`: subtract `base`'s
    /// per-axis lower bound. The inverse of [`to_global`](Self::to_global).
    #[inline]
    pub fn to_local(&self, base: &Self) -> Self {
        let mut d = base.firsts();
        for x in &mut d {
            *x = -*x;
        }
        self.shift(d)
    }

    /// Express a `base`-local index range back in global coordinates.
    #[inline]
    pub fn to_global(&self, base: &Self) -> Self {
        self.shift(base.firsts())
    }
}

impl<const D: usize> std::ops::Index<usize> for NDIndex<D> {
    type Output = Interval;
    #[inline]
    fn index(&self, axis: usize) -> &Interval {
        &self.axes[axis]
    }
}

impl<const D: usize> std::fmt::Display for NDIndex<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (d, a) in self.axes.iter().enumerate() {
            if d > 0 {
                write!(f, "x")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(n: i64) -> NDIndex<3> {
        NDIndex::new([Interval::new(0, n); 3])
    }

    #[test]
    fn grow_is_per_axis() {
        let g = cube(4).grow(1);
        for d in 0..3 {
            assert_eq!(g[d], Interval::new(-1, 5));
        }
        assert_eq!(g.size(), 6 * 6 * 6);
    }

    #[test]
    fn intersect_keeps_axis_order() {
        let a = NDIndex::new([
            Interval::new(0, 4),
            Interval::new(2, 6),
            Interval::new(-1, 1),
        ]);
        let b = cube(4);
        let i = a.intersect(&b);
        assert_eq!(i[0], Interval::new(0, 4));
        assert_eq!(i[1], Interval::new(2, 4));
        assert_eq!(i[2], Interval::new(0, 1));
    }

    #[test]
    fn empty_axis_empties_the_product() {
        let a = NDIndex::new([
            Interval::new(0, 4),
            Interval::new(4, 4),
            Interval::new(0, 4),
        ]);
        assert!(a.is_empty());
        assert_eq!(a.size(), 0);
        assert!(!a.touches(&cube(4)));
    }

    #[test]
    fn contains_all_axes() {
        let a = cube(4);
        assert!(a.contains([0, 3, 2]));
        assert!(!a.contains([0, 4, 2]));
    }

    #[test]
    fn local_global_roundtrip() {
        let base = NDIndex::new([
            Interval::new(4, 8),
            Interval::new(0, 8),
            Interval::new(2, 6),
        ]);
        let sub = NDIndex::new([
            Interval::new(5, 7),
            Interval::new(1, 3),
            Interval::new(2, 4),
        ]);
        let local = sub.to_local(&base);
        assert_eq!(local[0], Interval::new(1, 3));
        assert_eq!(local[2], Interval::new(0, 2));
        assert_eq!(local.to_global(&base), sub);
    }
}
