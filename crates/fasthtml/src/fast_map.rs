//! Fast lookup map tuned for workloads where most lookups miss.
//!
//! Lookups run through three filters before any hashing happens:
//! 1. the key's byte length against the map-wide `[min_key_len, max_key_len]` band,
//! 2. the two-character dispatch slot of the key,
//! 3. a verbatim compare against the single key stored for that slot.
//!
//! Only ambiguous slots (or stored-key mismatches) reach the exact fallback
//! map. Every key is always written to the fallback, so correctness never
//! depends on the fast path.

use crate::dispatch::{ClaimOutcome, DispatchId, DispatchSlot, SlotTable};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Most keys a `FastMap` will hold.
pub const MAX_KEYS: usize = u16::MAX as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FastMapError {
    Full { max: usize },
}

impl fmt::Display for FastMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastMapError::Full { max } => write!(f, "fast map is full ({max} keys)"),
        }
    }
}

impl std::error::Error for FastMapError {}

/// Snapshot of lookup counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FastMapStats {
    /// Lookups rejected by the key-length band.
    pub length_rejections: u64,
    /// Lookups rejected by an empty dispatch slot.
    pub slot_rejections: u64,
    /// Lookups answered by the dispatch slot's stored key.
    pub fast_hits: u64,
    /// Lookups that reached the exact fallback map.
    pub fallback_lookups: u64,
}

#[derive(Default)]
struct LookupCounters {
    length_rejections: AtomicU64,
    slot_rejections: AtomicU64,
    fast_hits: AtomicU64,
    fallback_lookups: AtomicU64,
}

impl LookupCounters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FastMapStats {
        FastMapStats {
            length_rejections: self.length_rejections.load(Ordering::Relaxed),
            slot_rejections: self.slot_rejections.load(Ordering::Relaxed),
            fast_hits: self.fast_hits.load(Ordering::Relaxed),
            fallback_lookups: self.fallback_lookups.load(Ordering::Relaxed),
        }
    }
}

struct Entry<V> {
    key: Box<str>,
    value: V,
}

/// String-keyed map layered over a two-character dispatch table.
///
/// Keys are compared verbatim (case-sensitive). Key lengths are measured in
/// bytes.
pub struct FastMap<V> {
    slots: SlotTable,
    entries: Vec<Entry<V>>,
    fallback: HashMap<Box<str>, usize>,
    min_key_len: usize,
    max_key_len: usize,
    counters: LookupCounters,
}

impl<V> FastMap<V> {
    pub fn new() -> Self {
        Self {
            slots: SlotTable::new(),
            entries: Vec::new(),
            fallback: HashMap::new(),
            min_key_len: usize::MAX,
            max_key_len: 0,
            counters: LookupCounters::default(),
        }
    }

    /// Add `key` with `value`, replacing the value if `key` is already present.
    ///
    /// Empty keys are ignored.
    pub fn add(&mut self, key: &str, value: V) -> Result<(), FastMapError> {
        if key.is_empty() {
            return Ok(());
        }
        if let Some(&index) = self.fallback.get(key)
            && let Some(entry) = self.entries.get_mut(index)
        {
            entry.value = value;
            return Ok(());
        }
        if self.entries.len() >= MAX_KEYS {
            return Err(FastMapError::Full { max: MAX_KEYS });
        }

        let index = self.entries.len();
        let id = DispatchId::from_index(index).ok_or(FastMapError::Full { max: MAX_KEYS })?;
        self.min_key_len = self.min_key_len.min(key.len());
        self.max_key_len = self.max_key_len.max(key.len());
        if let Some((b1, b2)) = coordinates(key)
            && self.slots.claim(b1, b2, id) == ClaimOutcome::Ambiguous
        {
            log::trace!(target: "fasthtml.fast_map", "slot for {key:?} is now ambiguous");
        }
        self.entries.push(Entry {
            key: key.into(),
            value,
        });
        self.fallback.insert(key.into(), index);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.find(key)
            .and_then(|index| self.entries.get(index))
            .map(|entry| &entry.value)
    }

    /// Stored key equal to `key`, for callers that want the map's own copy.
    pub fn get_key_value(&self, key: &str) -> Option<(&str, &V)> {
        self.find(key)
            .and_then(|index| self.entries.get(index))
            .map(|entry| (entry.key.as_ref(), &entry.value))
    }

    /// Value for a key that is very likely present, classified only by its
    /// first two bytes (`b2 == 0` for one-character keys).
    ///
    /// Skips the length band and the fallback: an ambiguous or empty slot
    /// yields `None`, which may be a false negative. Only valid where a miss
    /// just sends the caller down a slower path.
    #[inline]
    pub fn get_likely_present(&self, b1: u8, b2: u8) -> Option<&V> {
        match self.slots.get(b1, b2) {
            DispatchSlot::Found(id) => self.entries.get(id.index()).map(|entry| &entry.value),
            DispatchSlot::Absent | DispatchSlot::Ambiguous => None,
        }
    }

    /// `false` only when a key starting with `c1`, `c2` of byte length `len`
    /// is definitely absent. May return `true` for keys that are not present.
    pub fn possibly_contains(&self, c1: char, c2: char, len: usize) -> bool {
        if len < self.min_key_len || len > self.max_key_len {
            return false;
        }
        match (latin1(c1), latin1(c2)) {
            (Some(b1), Some(b2)) => self.slots.get(b1, b2) != DispatchSlot::Absent,
            _ => true,
        }
    }

    /// Dispatch slot `key` maps to, or `None` for keys with no coordinates
    /// (empty, or a leading character above U+00FF).
    pub fn slot_for(&self, key: &str) -> Option<DispatchSlot> {
        coordinates(key).map(|(b1, b2)| self.slots.get(b1, b2))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_ref())
    }

    /// Key/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_ref(), &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shortest key length in bytes, `None` while empty.
    pub fn min_key_len(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.min_key_len)
    }

    /// Longest key length in bytes, `None` while empty.
    pub fn max_key_len(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.max_key_len)
    }

    pub fn stats(&self) -> FastMapStats {
        self.counters.snapshot()
    }

    fn find(&self, key: &str) -> Option<usize> {
        let len = key.len();
        if len < self.min_key_len || len > self.max_key_len {
            LookupCounters::bump(&self.counters.length_rejections);
            return None;
        }
        if let Some((b1, b2)) = coordinates(key) {
            match self.slots.get(b1, b2) {
                DispatchSlot::Absent => {
                    LookupCounters::bump(&self.counters.slot_rejections);
                    return None;
                }
                DispatchSlot::Found(id) => {
                    if self
                        .entries
                        .get(id.index())
                        .is_some_and(|entry| *entry.key == *key)
                    {
                        LookupCounters::bump(&self.counters.fast_hits);
                        return Some(id.index());
                    }
                }
                DispatchSlot::Ambiguous => {}
            }
        }
        LookupCounters::bump(&self.counters.fallback_lookups);
        self.fallback.get(key).copied()
    }
}

impl<V> Default for FastMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for FastMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastMap")
            .field("len", &self.entries.len())
            .field("min_key_len", &self.min_key_len())
            .field("max_key_len", &self.max_key_len())
            .field("slots", &self.slots)
            .finish()
    }
}

fn latin1(ch: char) -> Option<u8> {
    u8::try_from(u32::from(ch)).ok()
}

/// Dispatch coordinates of `key`: its first two characters, or the first
/// character and `0` for one-character keys.
///
/// Empty keys and keys whose leading characters fall outside U+0000..=U+00FF
/// have no coordinates and live in the fallback map only.
fn coordinates(key: &str) -> Option<(u8, u8)> {
    let mut chars = key.chars();
    let b1 = latin1(chars.next()?)?;
    let b2 = match chars.next() {
        Some(ch) => latin1(ch)?,
        None => 0,
    };
    Some((b1, b2))
}
