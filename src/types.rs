/// Contig index inside a [`SeqDict`](crate::dict::SeqDict), densely packed `[0, N)`.
pub type SeqId = u32;
/// Scaffold index inside a [`Layout`](crate::dict::Layout).
pub type ScafId = u32;

// Fast hash maps / sets using AHash instead of the default SipHash.
// Import these throughout the codebase with `use crate::types::{HashMap, HashSet}`.
// Also import `HashMapExt` / `HashSetExt` when you need `::new()` or `::with_capacity()`.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
#[allow(unused)]
pub(crate) type HashSet<K> = ahash::HashSet<K>;
pub(crate) use ahash::HashMapExt;
#[allow(unused)]
pub(crate) use ahash::HashSetExt;
