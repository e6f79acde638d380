//! Reader configuration (§3.4 of the expanded design): the handful of
//! engine-level settings decided once at construction time, as opposed to
//! the reader's own flash-persisted configuration (address, baud, RF
//! profile, ...) which is changed later through [`crate::command`] methods.

use serde::{Deserialize, Serialize};

/// Construction-time settings for a [`crate::Reader`].
///
/// `Default` picks the values the reader itself boots with: broadcast
/// address, no extra read-chunk capacity beyond what one frame needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// The peer address to target. `0xFF` is broadcast — every reply is
    /// accepted regardless of its address field (§3).
    pub address: u8,
    /// Size of the chunk buffer used when reading from the transport.
    pub read_chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            address: crate::catalog::BROADCAST_ADDRESS,
            read_chunk_size: 4096,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_broadcast_address() {
        let config = ReaderConfig::default();
        assert_eq!(config.address, 0xFF);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = ReaderConfig::new().with_address(0x01).with_read_chunk_size(256);
        assert_eq!(config.address, 0x01);
        assert_eq!(config.read_chunk_size, 256);
    }
}
