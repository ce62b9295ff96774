//! Channel access rights

use bitflags::bitflags;

bitflags! {
    /// Rights a participant holds on a channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Rights: u32 {
        /// May receive from the channel.
        const READ = 1 << 0;
        /// May send into the channel.
        const WRITE = 1 << 1;
    }
}

impl Default for Rights {
    fn default() -> Self {
        Rights::READ | Rights::WRITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_bits_match_wire_values() {
        assert_eq!(Rights::READ.bits(), 0x1);
        assert_eq!(Rights::WRITE.bits(), 0x2);
        assert_eq!(Rights::default().bits(), 0x3);
    }

    #[test]
    fn test_unknown_bits_are_dropped() {
        assert_eq!(Rights::from_bits_truncate(0xff), Rights::READ | Rights::WRITE);
    }
}
