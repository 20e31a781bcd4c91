//! Two-character dispatch table for tag/attribute name classification.
//!
//! A candidate name is classified by its first two bytes with a single array
//! index: no hashing, no string comparison, no allocation. Names from HTML's
//! small ASCII vocabulary are almost always told apart by their first two
//! bytes, so the common "not a known name" case resolves here.
//!
//! Invariants:
//! - Ids are assigned in registration order starting at 1. Id 0 is not
//!   representable (`DispatchId` wraps a `NonZeroU16`).
//! - A slot holds at most one `Found`. A second distinct name landing on the
//!   same byte pair flips it to `Ambiguous`, and it never flips back.

use std::fmt;
use std::num::NonZeroU16;

/// Longest name accepted by `DispatchTable::register`.
pub const MAX_NAME_LEN: usize = 32;

/// Most names a `DispatchTable` will hold.
pub const MAX_NAMES: usize = 255;

const SLOT_COUNT: usize = 256 * 256;

/// Bytes that may follow a one-character name for it to count as a match.
pub const SINGLE_CHAR_TERMINATORS: [u8; 5] = [b' ', b'\t', b'\r', b'\n', b'>'];

/// Identity of a registered name. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchId(NonZeroU16);

impl DispatchId {
    pub fn get(self) -> u16 {
        self.0.get()
    }

    /// Id for the entry stored at zero-based `index`.
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        let raw = u16::try_from(index.checked_add(1)?).ok()?;
        NonZeroU16::new(raw).map(Self)
    }

    /// Zero-based storage index of this id.
    pub(crate) fn index(self) -> usize {
        usize::from(self.0.get()) - 1
    }
}

/// Result of a dispatch lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchSlot {
    /// No registered name starts with this byte pair.
    #[default]
    Absent,
    /// Exactly one registered name starts with this byte pair.
    Found(DispatchId),
    /// Several names share this byte pair; resolve with an exact lookup.
    Ambiguous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClaimOutcome {
    Claimed,
    AlreadyOwned,
    Ambiguous,
}

/// Flat 256×256 slot array indexed by `b1 * 256 + b2`.
///
/// Shared storage for `DispatchTable` and `FastMap`.
pub(crate) struct SlotTable {
    slots: Box<[DispatchSlot]>,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![DispatchSlot::Absent; SLOT_COUNT].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(b1: u8, b2: u8) -> usize {
        (usize::from(b1) << 8) | usize::from(b2)
    }

    #[inline]
    pub(crate) fn get(&self, b1: u8, b2: u8) -> DispatchSlot {
        self.slots
            .get(Self::index(b1, b2))
            .copied()
            .unwrap_or(DispatchSlot::Absent)
    }

    pub(crate) fn claim(&mut self, b1: u8, b2: u8, id: DispatchId) -> ClaimOutcome {
        let Some(slot) = self.slots.get_mut(Self::index(b1, b2)) else {
            return ClaimOutcome::Ambiguous;
        };
        match *slot {
            DispatchSlot::Absent => {
                *slot = DispatchSlot::Found(id);
                ClaimOutcome::Claimed
            }
            DispatchSlot::Found(existing) if existing == id => ClaimOutcome::AlreadyOwned,
            DispatchSlot::Found(_) | DispatchSlot::Ambiguous => {
                *slot = DispatchSlot::Ambiguous;
                ClaimOutcome::Ambiguous
            }
        }
    }

    fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot, DispatchSlot::Absent))
            .count()
    }
}

impl fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotTable")
            .field("occupied", &self.occupied())
            .finish()
    }
}

/// Outcome of a successful registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration {
    pub id: DispatchId,
    /// `false` when at least one of the name's byte pairs is shared with
    /// another name. The name is still registered; lookups for it resolve
    /// through the exact fallback instead of the fast path.
    pub claimed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchError {
    Empty,
    TooLong { len: usize, max: usize },
    NonAscii,
    Duplicate,
    Full { max: usize },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Empty => f.write_str("cannot register an empty name"),
            DispatchError::TooLong { len, max } => {
                write!(f, "name is {len} bytes long, at most {max} are allowed")
            }
            DispatchError::NonAscii => f.write_str("registered names must be ASCII"),
            DispatchError::Duplicate => f.write_str("name is already registered"),
            DispatchError::Full { max } => write!(f, "dispatch table is full ({max} names)"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Two-character dispatch table over ASCII-case-folded names.
///
/// Every case variant of a name's first two bytes is registered, so `DIV`,
/// `Div` and `div` all dispatch to the same id. One-character names are
/// registered against each byte of `SINGLE_CHAR_TERMINATORS` instead of a
/// real second character.
#[derive(Debug)]
pub struct DispatchTable {
    slots: SlotTable,
    names: Vec<Box<str>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            slots: SlotTable::new(),
            names: Vec::new(),
        }
    }

    /// Register `name` and assign it the next id.
    ///
    /// A failed registration leaves the table untouched; callers may keep
    /// registering other names.
    pub fn register(&mut self, name: &str) -> Result<Registration, DispatchError> {
        if name.is_empty() {
            return Err(DispatchError::Empty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(DispatchError::TooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        if !name.is_ascii() {
            return Err(DispatchError::NonAscii);
        }
        if self.names.len() >= MAX_NAMES {
            return Err(DispatchError::Full { max: MAX_NAMES });
        }
        if self.position(name).is_some() {
            return Err(DispatchError::Duplicate);
        }
        let id = DispatchId::from_index(self.names.len())
            .ok_or(DispatchError::Full { max: MAX_NAMES })?;
        let folded = name.to_ascii_lowercase();
        let bytes = folded.as_bytes();

        let mut claimed = true;
        for first in case_variants(bytes[0]) {
            if let Some(&second) = bytes.get(1) {
                for second in case_variants(second) {
                    claimed &= self.slots.claim(first, second, id) != ClaimOutcome::Ambiguous;
                }
            } else {
                for terminator in SINGLE_CHAR_TERMINATORS {
                    claimed &= self.slots.claim(first, terminator, id) != ClaimOutcome::Ambiguous;
                }
            }
        }
        if !claimed {
            log::warn!(
                target: "fasthtml.dispatch",
                "dispatch slot for {folded:?} is shared; it will resolve through the exact fallback"
            );
        }
        self.names.push(folded.into_boxed_str());
        Ok(Registration { id, claimed })
    }

    /// Classify a candidate name by its first two bytes.
    #[inline]
    pub fn lookup(&self, b1: u8, b2: u8) -> DispatchSlot {
        self.slots.get(b1, b2)
    }

    /// Canonical (lower-cased) name registered under `id`.
    pub fn name(&self, id: DispatchId) -> Option<&str> {
        self.names.get(id.index()).map(|name| name.as_ref())
    }

    /// Id of `name`, compared ASCII-case-insensitively.
    pub fn id_of(&self, name: &str) -> Option<DispatchId> {
        self.position(name).and_then(DispatchId::from_index)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|existing| existing.eq_ignore_ascii_case(name))
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower- and upper-case form of `b`, once each.
pub(crate) fn case_variants(b: u8) -> impl Iterator<Item = u8> {
    let lower = b.to_ascii_lowercase();
    let upper = b.to_ascii_uppercase();
    std::iter::once(lower).chain((upper != lower).then_some(upper))
}
