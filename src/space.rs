use std::fmt;

use crate::{
    error::Error,
    iter::{Iter, IterMut},
    layer::Stratum,
    region::Region,
};

/// A detached handle to one stored entry, returned by
/// [`FlowSpace::find`].
///
/// The handle carries the space's mutation generation at the time it
/// was issued; any later insert or erase invalidates it, and access
/// through a stale handle fails ([`Error::StaleEntry`]) instead of
/// touching the wrong entry.
pub struct EntryRef<S>
where
    S: Stratum,
{
    cursor: S::Cursor,
    generation: u64,
}

impl<S> Clone for EntryRef<S>
where
    S: Stratum,
{
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
            generation: self.generation,
        }
    }
}

impl<S> fmt::Debug for EntryRef<S>
where
    S: Stratum,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRef")
            .field("cursor", &self.cursor)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<S> PartialEq for EntryRef<S>
where
    S: Stratum,
{
    fn eq(&self, other: &Self) -> bool {
        self.cursor == other.cursor && self.generation == other.generation
    }
}

/// The public surface of a flow space, blanket-implemented for every
/// layer stack.
///
/// A flow space stores `(region, payload)` pairs and answers
/// intersection queries: [`query`] walks every stored entry whose
/// region shares at least one point with the query region, in
/// lexicographic order of the stored regions.
///
/// [`query`]: FlowSpace::query
pub trait FlowSpace: Stratum {
    /// Store `value` under `region`.
    ///
    /// Duplicate regions are allowed and kept side by side. Fails with
    /// [`Error::EmptyRegion`] if any component interval is empty.
    fn insert(&mut self, region: Self::Region, value: Self::Value) -> Result<(), Error> {
        if region.is_empty() {
            return Err(Error::EmptyRegion);
        }
        self.insert_entry(&region, value);
        Ok(())
    }

    /// The region covering the entire space.
    fn all() -> Self::Region {
        Self::Region::all()
    }

    /// Iterate every stored entry in lexicographic region order.
    fn iter(&self) -> Iter<'_, Self> {
        Iter::new(self, Self::all())
    }

    /// Iterate the stored entries whose regions intersect `region`.
    ///
    /// An empty query region yields an immediately exhausted iterator.
    fn query(&self, region: &Self::Region) -> Iter<'_, Self> {
        Iter::new(self, region.clone())
    }

    /// Like [`query`], but yields mutable payload references.
    ///
    /// [`query`]: FlowSpace::query
    fn query_mut(&mut self, region: &Self::Region) -> IterMut<'_, Self> {
        IterMut::new(self, region.clone())
    }

    /// Locate the entry stored under exactly `region` (the first
    /// inserted, if duplicated).
    fn find(&self, region: &Self::Region) -> Option<EntryRef<Self>> {
        let cursor = self.exact_cursor(region)?;
        Some(EntryRef {
            cursor,
            generation: self.generation(),
        })
    }

    /// Locate the entry stored under exactly `region` whose payload
    /// equals `value`, disambiguating duplicates.
    fn find_value(&self, region: &Self::Region, value: &Self::Value) -> Option<EntryRef<Self>>
    where
        Self::Value: PartialEq,
    {
        let cursor = self.exact_cursor_for(region, value)?;
        Some(EntryRef {
            cursor,
            generation: self.generation(),
        })
    }

    /// The stored region and payload behind `entry`, unless the handle
    /// is stale.
    fn get(&self, entry: &EntryRef<Self>) -> Option<(Self::Region, &Self::Value)> {
        if entry.generation != self.generation() {
            return None;
        }
        self.entry_at(&entry.cursor)
    }

    /// Mutable access to the payload behind `entry`, unless the handle
    /// is stale.
    fn get_mut(&mut self, entry: &EntryRef<Self>) -> Option<&mut Self::Value> {
        if entry.generation != self.generation() {
            return None;
        }
        self.payload_at_mut(&entry.cursor)
    }

    /// Remove the entry behind `entry`, returning its payload.
    ///
    /// Fails with [`Error::StaleEntry`] if the handle was invalidated
    /// by an insert or erase since it was issued.
    fn erase(&mut self, entry: EntryRef<Self>) -> Result<Self::Value, Error> {
        if entry.generation != self.generation() {
            return Err(Error::StaleEntry);
        }
        self.erase_at(&entry.cursor).ok_or(Error::StaleEntry)
    }
}

impl<T> FlowSpace for T where T: Stratum {}
