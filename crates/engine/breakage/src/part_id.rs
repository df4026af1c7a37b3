//! Hierarchical part ids
//!
//! The physics engine reports part ids as packed `u32`s:
//!
//! ```text
//! bit 31      attachment flag
//! bits 27-30  hierarchy level
//! attached:   bits 16-26 attachment id, bits 0-15 local part id
//! otherwise:  bits 0-26 local part id
//! ```
//!
//! Everything outside this module works with [`PartId`].

const ATTACHMENT_FLAG: u32 = 1 << 31;
const LEVEL_SHIFT: u32 = 27;
const LEVEL_MASK: u32 = 0xF;
const ATTACHMENT_SHIFT: u32 = 16;
const ATTACHMENT_MASK: u32 = 0x7FF;
const ATTACHED_LOCAL_MASK: u32 = 0xFFFF;
const LOCAL_MASK: u32 = (1 << LEVEL_SHIFT) - 1;

/// Decoded part id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PartId {
    pub level: u8,
    pub local_part_id: u32,
    /// Attachment (slot) the part belongs to, if any
    pub attachment_id: Option<u32>,
}

impl PartId {
    pub fn new(local_part_id: u32) -> Self {
        Self {
            level: 0,
            local_part_id,
            attachment_id: None,
        }
    }

    pub fn attached(attachment_id: u32, local_part_id: u32) -> Self {
        Self {
            level: 0,
            local_part_id,
            attachment_id: Some(attachment_id),
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Decode the physics engine's packed form
    pub fn from_raw(raw: u32) -> Self {
        let level = ((raw >> LEVEL_SHIFT) & LEVEL_MASK) as u8;
        if raw & ATTACHMENT_FLAG != 0 {
            Self {
                level,
                local_part_id: raw & ATTACHED_LOCAL_MASK,
                attachment_id: Some((raw >> ATTACHMENT_SHIFT) & ATTACHMENT_MASK),
            }
        } else {
            Self {
                level,
                local_part_id: raw & LOCAL_MASK,
                attachment_id: None,
            }
        }
    }

    /// Encode to the packed form; `None` when a field does not fit
    pub fn to_raw(self) -> Option<u32> {
        if u32::from(self.level) > LEVEL_MASK {
            return None;
        }
        let level = u32::from(self.level) << LEVEL_SHIFT;
        match self.attachment_id {
            Some(attachment) => {
                if attachment > ATTACHMENT_MASK || self.local_part_id > ATTACHED_LOCAL_MASK {
                    return None;
                }
                Some(ATTACHMENT_FLAG | level | (attachment << ATTACHMENT_SHIFT) | self.local_part_id)
            }
            None => {
                if self.local_part_id > LOCAL_MASK {
                    return None;
                }
                Some(level | self.local_part_id)
            }
        }
    }

    /// Sub-object index inside its asset
    pub fn part_index(&self) -> usize {
        self.local_part_id as usize
    }

    /// Entity slot holding the part (slot 0 when not attached)
    pub fn slot(&self) -> usize {
        self.attachment_id.unwrap_or(0) as usize
    }
}

impl From<u32> for PartId {
    fn from(raw: u32) -> Self {
        PartId::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_part_id() {
        let id = PartId::from_raw(42);
        assert_eq!(id, PartId::new(42));
        assert_eq!(id.slot(), 0);
    }

    #[test]
    fn test_attached_part_id_layout() {
        let raw = (1 << 31) | (2 << 27) | (5 << 16) | 9;
        let id = PartId::from_raw(raw);
        assert_eq!(id.level, 2);
        assert_eq!(id.attachment_id, Some(5));
        assert_eq!(id.local_part_id, 9);
        assert_eq!(id.slot(), 5);
        assert_eq!(id.to_raw(), Some(raw));
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(PartId::attached(0x800, 1).to_raw(), None);
        assert_eq!(PartId::attached(1, 0x1_0000).to_raw(), None);
        assert_eq!(PartId::new(1 << 27).to_raw(), None);
        assert_eq!(PartId::new(3).with_level(16).to_raw(), None);
        assert_eq!(PartId::new(3).with_level(15).to_raw(), Some((15 << 27) | 3));
    }
}
