//! Bucketed node arena.
//!
//! The arena owns every internal node of a decision diagram factory and
//! guarantees that identical content is interned exactly once, so handle
//! equality is semantic equality. Storage is a growable list of fixed-size
//! buckets probed with quadratic offsets. Buckets are appended but never
//! resized or reordered, which keeps every slot address stable for the
//! lifetime of the arena; handles are used as cache keys everywhere else,
//! so nothing may ever move.

/// HashKind is an alias for the underlying type of a node content hash.
pub type HashKind = u64;

/// Default number of slots per bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 1024;

/// Number of slots probed per bucket before moving on.
const PROBE_LIMIT: usize = 8;

/// Stable handle to a node owned by an arena.
///
/// The two terminal handles are reserved and never stored in a bucket;
/// every other id addresses one slot of one bucket.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The empty family terminal.
    pub const ZERO: NodeId = NodeId(0);
    /// The terminal denoting the family that contains only the empty member.
    pub const ONE: NodeId = NodeId(1);

    const FIRST_INTERNAL: u32 = 2;

    /// Returns true for the two terminal handles.
    pub const fn is_terminal(self) -> bool {
        self.0 < Self::FIRST_INTERNAL
    }
}

/// One occupied slot: the node plus its precomputed content hash.
/// The hash is compared before content equality during probing.
struct Slot<N> {
    hash: HashKind,
    node: N,
}

/// Growable bucketed storage with canonical interning.
///
/// The arena is generic over node content; callers supply the content hash
/// and an equality predicate at interning time, so node kinds with
/// order-independent parts can define equality their own way.
pub(crate) struct NodeArena<N> {
    /// Number of slots in every bucket.
    bucket_capacity: usize,
    /// Buckets in allocation order. Slot addresses never change.
    buckets: Vec<Box<[Option<Slot<N>>]>>,
    /// Number of occupied slots across all buckets.
    len: usize,
}

impl<N> NodeArena<N> {
    /// Returns an empty arena whose buckets hold `bucket_capacity` slots each.
    pub(crate) fn new(bucket_capacity: usize) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity cannot be 0");
        Self {
            bucket_capacity,
            buckets: Vec::new(),
            len: 0,
        }
    }

    /// Number of interned nodes.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Resolves a handle produced by `intern` to its node.
    pub(crate) fn get(&self, id: NodeId) -> &N {
        debug_assert!(!id.is_terminal(), "terminals are not stored in the arena");
        let index = (id.0 - NodeId::FIRST_INTERNAL) as usize;
        let bucket = index / self.bucket_capacity;
        let slot = index % self.bucket_capacity;
        match self.buckets[bucket][slot] {
            Some(ref slot) => &slot.node,
            None => unreachable!("node id addresses an empty slot"),
        }
    }

    /// Returns the unique handle for the content described by `hash` and
    /// `matches`, interning the node produced by `build` if it is new.
    ///
    /// Probes up to `PROBE_LIMIT` slots per existing bucket with quadratic
    /// offsets from `hash % capacity`. If every probe window is occupied by
    /// other content, a fresh bucket is appended and the node installed at
    /// its home slot.
    pub(crate) fn intern<F, B>(&mut self, hash: HashKind, matches: F, build: B) -> NodeId
    where
        F: Fn(&N) -> bool,
        B: FnOnce() -> N,
    {
        let capacity = self.bucket_capacity;
        let home = (hash % capacity as HashKind) as usize;

        for (bucket_index, bucket) in self.buckets.iter_mut().enumerate() {
            for i in 0..PROBE_LIMIT {
                let slot_index = (home + (i + i * i) / 2) % capacity;
                match bucket[slot_index] {
                    Some(ref slot) => {
                        if slot.hash == hash && matches(&slot.node) {
                            return Self::id_of(capacity, bucket_index, slot_index);
                        }
                    }
                    None => {
                        bucket[slot_index] = Some(Slot {
                            hash,
                            node: build(),
                        });
                        self.len += 1;
                        return Self::id_of(capacity, bucket_index, slot_index);
                    }
                }
            }
        }

        // All probe windows collided. Append a bucket and install at home.
        let bucket_index = self.buckets.len();
        let mut bucket: Box<[Option<Slot<N>>]> =
            std::iter::repeat_with(|| None).take(capacity).collect();
        bucket[home] = Some(Slot {
            hash,
            node: build(),
        });
        self.buckets.push(bucket);
        self.len += 1;
        Self::id_of(capacity, bucket_index, home)
    }

    fn id_of(capacity: usize, bucket: usize, slot: usize) -> NodeId {
        let index = bucket * capacity + slot;
        let id = u32::try_from(index).expect("arena exceeded NodeId range") + NodeId::FIRST_INTERNAL;
        NodeId(id)
    }
}
