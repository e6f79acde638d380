//! Per-peer accumulator queues (component C7): scratch space for replies
//! that arrive as a stream of records with no end-of-stream marker.
//!
//! Completion of a multi-record reply is inferred by the dispatcher (C4)
//! comparing a queue's length to the `count` field carried in the record it
//! just pushed, not by anything in this module — these queues only hold
//! records and forget them, either on a successful drain or on
//! resynchronization (§4.7, §9).

use std::collections::HashMap;

use crate::model::{BufferedTagRecord, ReadRecord, TagMaskRecord, TagOpRecord};

/// The six queues §3 assigns to one peer address.
#[derive(Debug, Clone, Default)]
struct PeerQueues {
    masks: Vec<TagMaskRecord>,
    inventory_buffer: Vec<BufferedTagRecord>,
    read: Vec<ReadRecord>,
    write: Vec<TagOpRecord>,
    lock: Vec<TagOpRecord>,
    kill: Vec<TagOpRecord>,
}

/// Owns one [`PeerQueues`] per address seen on the wire. In practice the
/// engine talks to a single configured peer (or broadcast), but keying by
/// address keeps a stray reply from a misconfigured address from bleeding
/// into the active peer's queues.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorQueues {
    peers: HashMap<u8, PeerQueues>,
}

impl AccumulatorQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn peer_mut(&mut self, address: u8) -> &mut PeerQueues {
        self.peers.entry(address).or_default()
    }

    pub fn push_mask(&mut self, address: u8, record: TagMaskRecord) -> usize {
        let queue = &mut self.peer_mut(address).masks;
        queue.push(record);
        queue.len()
    }

    pub fn push_inventory(&mut self, address: u8, record: BufferedTagRecord) -> usize {
        let queue = &mut self.peer_mut(address).inventory_buffer;
        queue.push(record);
        queue.len()
    }

    pub fn push_read(&mut self, address: u8, record: ReadRecord) -> usize {
        let queue = &mut self.peer_mut(address).read;
        queue.push(record);
        queue.len()
    }

    pub fn push_write(&mut self, address: u8, record: TagOpRecord) -> usize {
        let queue = &mut self.peer_mut(address).write;
        queue.push(record);
        queue.len()
    }

    pub fn push_lock(&mut self, address: u8, record: TagOpRecord) -> usize {
        let queue = &mut self.peer_mut(address).lock;
        queue.push(record);
        queue.len()
    }

    pub fn push_kill(&mut self, address: u8, record: TagOpRecord) -> usize {
        let queue = &mut self.peer_mut(address).kill;
        queue.push(record);
        queue.len()
    }

    pub fn take_masks(&mut self, address: u8) -> Vec<TagMaskRecord> {
        std::mem::take(&mut self.peer_mut(address).masks)
    }

    pub fn take_inventory(&mut self, address: u8) -> Vec<BufferedTagRecord> {
        std::mem::take(&mut self.peer_mut(address).inventory_buffer)
    }

    pub fn take_read(&mut self, address: u8) -> Vec<ReadRecord> {
        std::mem::take(&mut self.peer_mut(address).read)
    }

    pub fn take_write(&mut self, address: u8) -> Vec<TagOpRecord> {
        std::mem::take(&mut self.peer_mut(address).write)
    }

    pub fn take_lock(&mut self, address: u8) -> Vec<TagOpRecord> {
        std::mem::take(&mut self.peer_mut(address).lock)
    }

    pub fn take_kill(&mut self, address: u8) -> Vec<TagOpRecord> {
        std::mem::take(&mut self.peer_mut(address).kill)
    }

    /// Discards every queue for `address`. Called by the dispatcher when a
    /// pending entry is popped without a matching reply during resync, since
    /// a lost record must not bleed into the next consumer of that queue.
    pub fn clear(&mut self, address: u8) {
        if let Some(queues) = self.peers.get_mut(&address) {
            *queues = PeerQueues::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AntennaId;
    use crate::model::{InventoriedTag, ProtocolControl};

    fn tag_record() -> BufferedTagRecord {
        BufferedTagRecord {
            tag: InventoriedTag {
                antenna: AntennaId::A1,
                frequency_index: 0,
                pc: ProtocolControl::parse(0x1800),
                epc: vec![0; 6],
                rssi_dbm: -60,
                phase_angle: None,
                count: Some(1),
            },
            crc_valid: true,
        }
    }

    #[test]
    fn accumulates_and_drains_independently_per_peer() {
        let mut queues = AccumulatorQueues::new();
        assert_eq!(queues.push_inventory(0x01, tag_record()), 1);
        assert_eq!(queues.push_inventory(0x01, tag_record()), 2);
        assert_eq!(queues.push_inventory(0x02, tag_record()), 1);

        let drained = queues.take_inventory(0x01);
        assert_eq!(drained.len(), 2);
        assert_eq!(queues.take_inventory(0x01).len(), 0);
        assert_eq!(queues.take_inventory(0x02).len(), 1);
    }

    #[test]
    fn clear_discards_every_queue_for_a_peer() {
        let mut queues = AccumulatorQueues::new();
        queues.push_inventory(0x01, tag_record());
        queues.push_mask(0x01, TagMaskRecord { mask_id: 0, data: vec![] });
        queues.clear(0x01);
        assert!(queues.take_inventory(0x01).is_empty());
        assert!(queues.take_masks(0x01).is_empty());
    }
}
