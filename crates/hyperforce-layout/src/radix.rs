//! Parallel LSB-first radix sort of `(key, value)` pairs.
//!
//! Four passes of 8 bits each. Every pass builds per-partition histograms in
//! parallel, turns them into output offsets with a single exclusive scan in
//! bucket-major order, and scatters each partition into the other buffer
//! pair. The pairs alternate as source and destination; after the fourth
//! pass the sorted data is back in the `Active` pair.

use rayon::prelude::*;

const RADIX_BITS: u32 = 8;
const RADIX: usize = 1 << RADIX_BITS;
const PASSES: u32 = u32::BITS / RADIX_BITS;

/// Which buffer pair currently holds the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Active,
    Scratch,
}

impl Slot {
    fn flipped(self) -> Self {
        match self {
            Self::Active => Self::Scratch,
            Self::Scratch => Self::Active,
        }
    }
}

#[derive(Debug, Default)]
struct KeyValueBuffer {
    keys: Vec<u32>,
    values: Vec<u32>,
}

impl KeyValueBuffer {
    fn with_len(len: usize) -> Self {
        Self {
            keys: vec![0; len],
            values: vec![0; len],
        }
    }
}

/// Destination of a scatter pass, shared between partitions.
///
/// Partitions write disjoint index sets, so plain stores are race-free.
struct ScatterTarget {
    keys: *mut u32,
    values: *mut u32,
    len: usize,
}

// SAFETY: the pointers are only used for the disjoint writes described above,
// while the owning buffer is mutably borrowed by `scatter`.
unsafe impl Send for ScatterTarget {}
unsafe impl Sync for ScatterTarget {}

impl ScatterTarget {
    fn new(buffer: &mut KeyValueBuffer, len: usize) -> Self {
        debug_assert!(buffer.keys.len() >= len && buffer.values.len() >= len);
        Self {
            keys: buffer.keys.as_mut_ptr(),
            values: buffer.values.as_mut_ptr(),
            len,
        }
    }

    /// # Safety
    /// `index < self.len`, and no other work-item writes `index` in this pass.
    unsafe fn write(&self, index: usize, key: u32, value: u32) {
        debug_assert!(index < self.len);
        self.keys.add(index).write(key);
        self.values.add(index).write(value);
    }
}

/// Radix sorter with preallocated ping-pong buffers and histogram storage.
#[derive(Debug)]
pub struct RadixSorter {
    partition_size: usize,
    active: KeyValueBuffer,
    scratch: KeyValueBuffer,
    /// `RADIX` counters per partition, partition-major.
    histogram: Vec<u32>,
    capacity: usize,
}

impl RadixSorter {
    /// Create an empty sorter. `partition_size` is clamped to at least 1.
    pub fn new(partition_size: usize) -> Self {
        Self {
            partition_size: partition_size.max(1),
            active: KeyValueBuffer::default(),
            scratch: KeyValueBuffer::default(),
            histogram: Vec::new(),
            capacity: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of work partitions for `n` elements.
    pub fn partition_count(&self, n: usize) -> usize {
        n.div_ceil(self.partition_size)
    }

    /// Grow every buffer to hold `n` pairs. Returns true if it reallocated.
    pub fn ensure_capacity(&mut self, n: usize) -> bool {
        if n <= self.capacity {
            return false;
        }
        self.active = KeyValueBuffer::with_len(n);
        self.scratch = KeyValueBuffer::with_len(n);
        self.histogram = vec![0; RADIX * self.partition_count(n)];
        self.capacity = n;
        true
    }

    /// Mutable input keys and values of the first `n` pairs.
    ///
    /// # Panics
    /// Panics if `n` exceeds the capacity.
    pub fn input_mut(&mut self, n: usize) -> (&mut [u32], &mut [u32]) {
        (&mut self.active.keys[..n], &mut self.active.values[..n])
    }

    pub fn keys(&self, n: usize) -> &[u32] {
        &self.active.keys[..n]
    }

    pub fn values(&self, n: usize) -> &[u32] {
        &self.active.values[..n]
    }

    /// Sort the first `n` pairs by key, stably. Must be called inside the
    /// worker pool that should run the passes.
    ///
    /// # Panics
    /// Panics if `n` exceeds the capacity.
    pub fn sort(&mut self, n: usize) {
        if n <= 1 {
            return;
        }
        assert!(
            n <= self.capacity,
            "sorting {n} pairs with capacity {}",
            self.capacity
        );

        let partition_size = self.partition_size;
        let partitions = self.partition_count(n);
        let Self {
            active,
            scratch,
            histogram,
            ..
        } = self;
        let histogram = &mut histogram[..partitions * RADIX];

        let mut current = Slot::Active;
        for pass in 0..PASSES {
            let shift = pass * RADIX_BITS;
            let (src, dst) = match current {
                Slot::Active => (&*active, &mut *scratch),
                Slot::Scratch => (&*scratch, &mut *active),
            };

            count_buckets(&src.keys[..n], histogram, partition_size, shift);
            exclusive_scan(histogram, partitions);
            scatter(src, dst, histogram, n, partition_size, shift);

            current = current.flipped();
        }
        debug_assert_eq!(current, Slot::Active);
    }
}

fn bucket(key: u32, shift: u32) -> usize {
    ((key >> shift) as usize) & (RADIX - 1)
}

/// (a) One histogram of `RADIX` counters per partition.
fn count_buckets(keys: &[u32], histogram: &mut [u32], partition_size: usize, shift: u32) {
    histogram
        .par_chunks_mut(RADIX)
        .zip(keys.par_chunks(partition_size))
        .for_each(|(counts, keys)| {
            counts.fill(0);
            for &key in keys {
                counts[bucket(key, shift)] += 1;
            }
        });
}

/// (b) Replace counts with output offsets, walking bucket-major so every
/// partition's slice of a bucket follows the previous partition's.
fn exclusive_scan(histogram: &mut [u32], partitions: usize) {
    let mut running = 0u32;
    for b in 0..RADIX {
        for p in 0..partitions {
            let slot = &mut histogram[p * RADIX + b];
            let count = *slot;
            *slot = running;
            running += count;
        }
    }
}

/// (c) Each partition copies its pairs to their destination slots.
fn scatter(
    src: &KeyValueBuffer,
    dst: &mut KeyValueBuffer,
    offsets: &[u32],
    n: usize,
    partition_size: usize,
    shift: u32,
) {
    let target = ScatterTarget::new(dst, n);
    let target = &target;

    offsets
        .par_chunks(RADIX)
        .zip(src.keys[..n].par_chunks(partition_size))
        .zip(src.values[..n].par_chunks(partition_size))
        .for_each(|((offsets, keys), values)| {
            let mut cursor = [0u32; RADIX];
            cursor.copy_from_slice(offsets);
            for (&key, &value) in keys.iter().zip(values) {
                let b = bucket(key, shift);
                let index = cursor[b] as usize;
                cursor[b] += 1;
                // SAFETY: the scan gives each (partition, bucket) a private
                // range of `n` slots sized by its count, walked once here.
                unsafe { target.write(index, key, value) };
            }
        });
}
