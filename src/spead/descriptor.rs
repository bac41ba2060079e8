use std::fmt::Display;

use serde::Serialize;

/// Symbolic names for the item ids emitted by the F-engines.
///
/// Ids not in the table decode as [ItemName::Unknown]; they are kept as opaque data rather
/// than treated as an error.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemName {
    HeapCounter,
    HeapSize,
    HeapOffset,
    PayloadSize,
    Timestamp,
    FengId,
    Frequency,
    FengRaw,
    Unknown,
}

impl ItemName {
    const TABLE: [(u16, ItemName); 8] = [
        (0x0001, ItemName::HeapCounter),
        (0x0002, ItemName::HeapSize),
        (0x0003, ItemName::HeapOffset),
        (0x0004, ItemName::PayloadSize),
        (0x1600, ItemName::Timestamp),
        (0x4101, ItemName::FengId),
        (0x4103, ItemName::Frequency),
        (0x4300, ItemName::FengRaw),
    ];

    #[must_use]
    pub fn from_id(id: u16) -> Self {
        Self::TABLE
            .iter()
            .find(|(known, _)| *known == id)
            .map_or(ItemName::Unknown, |(_, name)| *name)
    }

    /// The item id for this name, `None` for [ItemName::Unknown].
    #[must_use]
    pub fn id(&self) -> Option<u16> {
        Self::TABLE
            .iter()
            .find(|(_, name)| name == self)
            .map(|(id, _)| *id)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeapCounter => "heap_counter",
            Self::HeapSize => "heap_size",
            Self::HeapOffset => "heap_offset",
            Self::PayloadSize => "payload_size",
            Self::Timestamp => "timestamp",
            Self::FengId => "feng_id",
            Self::Frequency => "frequency",
            Self::FengRaw => "feng_raw",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single 64-bit SPEAD item pointer.
///
/// Layout, most significant bit first:
/// ```text
/// | 1 bit immediate | 15 bit id | 48 bit value or heap address |
/// ```
/// The immediate flag is decoded and preserved, but the 48-bit field is interpreted the same
/// way in either case.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub immediate: bool,
    pub id: u16,
    pub value: u64,
}

impl Descriptor {
    /// Encoded size in bytes
    pub const LEN: usize = 8;
    pub const ID_MASK: u16 = 0x7fff;
    pub const VALUE_MASK: u64 = 0xffff_ffff_ffff;

    const ID_SHIFT: u32 = 48;
    const IMMEDIATE_SHIFT: u32 = 63;

    /// Create a descriptor, masking `id` to 15 bits and `value` to 48 bits.
    #[must_use]
    pub fn new(immediate: bool, id: u16, value: u64) -> Self {
        Descriptor {
            immediate,
            id: id & Self::ID_MASK,
            value: value & Self::VALUE_MASK,
        }
    }

    /// Build an immediate descriptor for a known item.
    ///
    /// # Panics
    /// If `name` is [ItemName::Unknown].
    #[must_use]
    pub fn item(name: ItemName, value: u64) -> Self {
        let id = name.id().expect("unknown items have no id");
        Self::new(true, id, value)
    }

    #[must_use]
    pub fn from_word(word: u64) -> Self {
        Descriptor {
            immediate: (word >> Self::IMMEDIATE_SHIFT) & 0x1 == 1,
            id: ((word >> Self::ID_SHIFT) as u16) & Self::ID_MASK,
            value: word & Self::VALUE_MASK,
        }
    }

    #[must_use]
    pub fn to_word(&self) -> u64 {
        (u64::from(self.immediate) << Self::IMMEDIATE_SHIFT)
            | (u64::from(self.id & Self::ID_MASK) << Self::ID_SHIFT)
            | (self.value & Self::VALUE_MASK)
    }

    /// Decode from big-endian bytes. Returns `None` if there are fewer than [Self::LEN] bytes.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let word: [u8; Self::LEN] = buf.get(..Self::LEN)?.try_into().ok()?;
        Some(Self::from_word(u64::from_be_bytes(word)))
    }

    #[must_use]
    pub fn encode(&self) -> [u8; Self::LEN] {
        self.to_word().to_be_bytes()
    }

    #[must_use]
    pub fn name(&self) -> ItemName {
        ItemName::from_id(self.id)
    }

    /// The (name, value) entry this descriptor contributes to a packet's item map.
    #[must_use]
    pub fn entry(&self) -> (ItemName, u64) {
        (self.name(), self.value)
    }
}
