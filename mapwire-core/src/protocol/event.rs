//! Event tags selecting the remote operation.

/// The operation selector written as the first byte of every request.
///
/// The encoding is positional: each tag is the ordinal of the operation in
/// this declared list, which is shared with the server. Reordering or
/// inserting entries changes the wire protocol and is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventId {
    /// Liveness probe; declared for wire compatibility, never sent here.
    Heartbeat = 0,
    /// Server-driven state refresh; declared for wire compatibility.
    StatefulUpdate = 1,
    /// Entry count as a 64-bit integer.
    LongSize = 2,
    /// Entry count as a 32-bit integer.
    Size = 3,
    /// Whether the map has no entries.
    IsEmpty = 4,
    /// Whether a key is present.
    ContainsKey = 5,
    /// Whether a value is present.
    ContainsValue = 6,
    /// Value lookup by key.
    Get = 7,
    /// Insert or overwrite, returning the prior value.
    Put = 8,
    /// Insert or overwrite, fire-and-forget.
    PutWithoutAck = 9,
    /// Removal by key, returning the prior value.
    Remove = 10,
    /// Removal by key, fire-and-forget.
    RemoveWithoutAck = 11,
    /// Remove every entry.
    Clear = 12,
    /// Streamed set of keys.
    KeySet = 13,
    /// Streamed collection of values.
    Values = 14,
    /// Streamed set of entries.
    EntrySet = 15,
    /// Replace an existing mapping, returning the prior value.
    Replace = 16,
    /// Conditional replace of an expected value.
    ReplaceWithOldAndNewValue = 17,
    /// Insert only when absent, returning the prior value.
    PutIfAbsent = 18,
    /// Conditional removal of an expected value.
    RemoveWithValue = 19,
    /// Server-rendered string form of the map.
    ToString = 20,
    /// Bulk insert, acknowledged.
    PutAll = 21,
    /// Bulk insert, fire-and-forget.
    PutAllWithoutAck = 22,
    /// Server-computed hash code of the map.
    HashCode = 23,
    /// Apply a read-only function to a value on the server.
    MapForKey = 24,
    /// Apply a mutating function to a value on the server.
    UpdateForKey = 25,
}

impl EventId {
    /// The tag byte written on the wire.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Decodes a tag byte back into an event, if it is in range.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        use EventId::*;
        Some(match ordinal {
            0 => Heartbeat,
            1 => StatefulUpdate,
            2 => LongSize,
            3 => Size,
            4 => IsEmpty,
            5 => ContainsKey,
            6 => ContainsValue,
            7 => Get,
            8 => Put,
            9 => PutWithoutAck,
            10 => Remove,
            11 => RemoveWithoutAck,
            12 => Clear,
            13 => KeySet,
            14 => Values,
            15 => EntrySet,
            16 => Replace,
            17 => ReplaceWithOldAndNewValue,
            18 => PutIfAbsent,
            19 => RemoveWithValue,
            20 => ToString,
            21 => PutAll,
            22 => PutAllWithoutAck,
            23 => HashCode,
            24 => MapForKey,
            25 => UpdateForKey,
            _ => return None,
        })
    }

    /// `true` for the fire-and-forget variants: no transaction id slot is
    /// written and no response frame is exchanged.
    pub fn is_fire_and_forget(self) -> bool {
        matches!(
            self,
            EventId::PutWithoutAck | EventId::RemoveWithoutAck | EventId::PutAllWithoutAck
        )
    }
}
