//! Double-buffered, bucketed edge storage
//!
//! Trimming needs two large arrays of packed edges: the round's source and
//! its destination. Each array is split into a fixed number of equally
//! sized buckets. Writers append to a bucket by reserving a slot with an
//! atomic counter, so any number of threads may fill the same buffer at
//! once without coordination.
//!
//! Buckets have a fixed capacity. The reservation counter keeps counting
//! past it, and writes to slots beyond capacity are simply dropped. Readers
//! clamp each bucket to `min(count, capacity)`, and the difference is
//! reported as overflow instead of being treated as an error.
//!
//! Storage is always written through shared references. Exclusive access is
//! only needed to reset counters, and the [`BucketStore`] hands out its
//! two halves as `(&source, &mut destination)` so the next round's input
//! can't be cleared while it is being read.

use crate::edge::{Edge, Side};
use crate::err::Error;
use crate::params::Geometry;
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Allocate a vector of `len` items without aborting on failure.
pub(crate) fn try_alloc<T, F: FnMut() -> T>(len: usize, init: F) -> Result<Vec<T>, Error> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len).map_err(|_| Error::Allocation {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    vec.resize_with(len, init);
    Ok(vec)
}

/// One bucketed array of packed edges
pub struct EdgeBuffer {
    /// Backing slots, `capacity` per bucket
    slots: Vec<AtomicU64>,
    /// Reservation counter per bucket, may exceed `capacity`
    counts: Vec<AtomicU32>,
    /// Slots per bucket
    capacity: usize,
}

impl EdgeBuffer {
    /// Allocate an empty buffer.
    pub fn new(num_buckets: usize, capacity: usize) -> Result<Self, Error> {
        let total = num_buckets.checked_mul(capacity).ok_or(Error::Allocation {
            bytes: usize::MAX,
        })?;
        Ok(Self {
            slots: try_alloc(total, || AtomicU64::new(0))?,
            counts: try_alloc(num_buckets, || AtomicU32::new(0))?,
            capacity,
        })
    }

    /// Number of buckets
    pub fn num_buckets(&self) -> usize {
        self.counts.len()
    }

    /// Slots per bucket
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empty every bucket.
    ///
    /// Slot contents are left in place; they are unreachable until
    /// overwritten.
    pub fn clear(&mut self) {
        for count in self.counts.iter_mut() {
            *count.get_mut() = 0;
        }
    }

    /// Append `edge` to `bucket`.
    ///
    /// Returns `false` if the bucket was already full and the edge was
    /// dropped. Panics if `bucket` is out of range.
    #[inline(always)]
    pub fn push(&self, bucket: usize, edge: Edge) -> bool {
        let slot = self.counts[bucket].fetch_add(1, Ordering::Relaxed) as usize;
        if slot < self.capacity {
            self.slots[bucket * self.capacity + slot].store(edge.packed(), Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Number of slots reserved in a bucket, including dropped writes
    pub fn reserved(&self, bucket: usize) -> usize {
        self.counts[bucket].load(Ordering::Relaxed) as usize
    }

    /// Valid item range for a bucket.
    ///
    /// Indices inside the range hold edges written since the last
    /// [`Self::clear()`].
    #[inline(always)]
    pub fn item_range(&self, bucket: usize) -> Range<usize> {
        0..self.reserved(bucket).min(self.capacity)
    }

    /// Iterate over the edges stored in one bucket.
    pub fn bucket(&self, bucket: usize) -> impl Iterator<Item = Edge> + '_ {
        let base = bucket * self.capacity;
        self.item_range(bucket)
            .map(move |i| Edge::from_packed(self.slots[base + i].load(Ordering::Relaxed)))
    }

    /// Parallel iterator over the edges stored in one bucket.
    pub fn par_bucket(&self, bucket: usize) -> impl IndexedParallelIterator<Item = Edge> + '_ {
        let base = bucket * self.capacity;
        self.item_range(bucket)
            .into_par_iter()
            .map(move |i| Edge::from_packed(self.slots[base + i].load(Ordering::Relaxed)))
    }

    /// Iterate over every stored edge, bucket by bucket.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.num_buckets()).flat_map(move |b| self.bucket(b))
    }

    /// Total number of stored edges
    pub fn len(&self) -> usize {
        (0..self.num_buckets())
            .map(|b| self.item_range(b).len())
            .sum()
    }

    /// Is every bucket empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of writes dropped for lack of space
    pub fn overflow(&self) -> usize {
        (0..self.num_buckets())
            .map(|b| self.reserved(b).saturating_sub(self.capacity))
            .sum()
    }

    /// Size of the backing memory in bytes
    pub fn bytes(&self) -> usize {
        self.slots.len() * std::mem::size_of::<AtomicU64>()
            + self.counts.len() * std::mem::size_of::<AtomicU32>()
    }
}

/// A pair of [`EdgeBuffer`]s used alternately as trimming source and
/// destination
pub struct BucketStore {
    /// Graph layout these buffers were sized for
    geometry: Geometry,
    /// The two buffers
    buffers: [EdgeBuffer; 2],
    /// Index of the buffer holding the current edge set
    front: usize,
    /// Endpoint used to choose each current edge's bucket
    keyed_by: Side,
}

impl BucketStore {
    /// Allocate both buffers for `geometry`.
    pub fn new(geometry: &Geometry) -> Result<Self, Error> {
        let (buckets, capacity) = (geometry.num_buckets(), geometry.bucket_capacity());
        Ok(Self {
            geometry: *geometry,
            buffers: [
                EdgeBuffer::new(buckets, capacity)?,
                EdgeBuffer::new(buckets, capacity)?,
            ],
            front: 0,
            keyed_by: Side::U,
        })
    }

    /// Graph layout these buffers were sized for
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Empty both buffers, ready for a new graph keyed by U nodes.
    pub fn reset(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }
        self.front = 0;
        self.keyed_by = Side::U;
    }

    /// Buffer holding the current edge set
    pub fn front(&self) -> &EdgeBuffer {
        &self.buffers[self.front]
    }

    /// Endpoint that selects each current edge's bucket
    pub fn keyed_by(&self) -> Side {
        self.keyed_by
    }

    /// Borrow the current edge set alongside the other buffer, emptied.
    pub fn source_and_destination(&mut self) -> (&EdgeBuffer, &mut EdgeBuffer) {
        let (first, second) = self.buffers.split_at_mut(1);
        let (source, destination) = if self.front == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };
        destination.clear();
        (source, destination)
    }

    /// Make the destination buffer current, with buckets keyed by `keyed_by`.
    pub fn swap(&mut self, keyed_by: Side) {
        self.front ^= 1;
        self.keyed_by = keyed_by;
    }

    /// Number of edges in the current set
    pub fn len(&self) -> usize {
        self.front().len()
    }

    /// Is the current edge set empty?
    pub fn is_empty(&self) -> bool {
        self.front().is_empty()
    }

    /// Size of the backing memory in bytes
    pub fn bytes(&self) -> usize {
        self.buffers.iter().map(EdgeBuffer::bytes).sum()
    }
}
