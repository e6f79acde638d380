//! Response dispatcher (component C4): the core state machine that takes
//! one validated [`RawPacket`] at a time and decides whether it completes
//! a pending command, feeds an accumulator queue, or is an unsolicited
//! event (§4.4).
//!
//! Packet-level integrity (header, length, LRC) is already guaranteed by
//! the time a packet reaches here — that's the frame reader's job (C3).
//! What's left is everything data-dependent: address filtering, command
//! validity, error-code classification, event/reply demultiplexing,
//! multi-packet accumulation, and resynchronization.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::accum::AccumulatorQueues;
use crate::catalog::{Accumulator, Command, ErrorCode, ErrorPolicy, RfLinkProfile};
use crate::frame::RawPacket;
use crate::model::{BufferedTagRecord, Event, ReadRecord, TagMaskRecord, TagOpRecord};
use crate::parse;

/// Default command deadline (§4.6). Inventory commands add
/// `repeat * 255ms` (`+ powersave * 64ms` for session inventory) on top of
/// this in the command engine (C6), which owns argument-dependent timing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// A resolved reply handed to the command that sent it.
#[derive(Debug, Clone)]
pub struct Reply {
    pub address: u8,
    pub command: Command,
    /// The payload, with the leading error-code byte stripped off when
    /// [`Reply::error_code`] is `Some`.
    pub data: Bytes,
    pub error_code: Option<ErrorCode>,
    pub success: bool,
}

struct PendingEntry {
    id: u64,
    command: Command,
    deadline: Arc<Mutex<Instant>>,
    resolver: oneshot::Sender<Reply>,
}

/// A registered pending command: the receiver half resolved by the
/// dispatcher, and a handle to the deadline the reader task refreshes
/// whenever an inventory event arrives for this command (§4.4 step 5,
/// §9 "event vs reply duality").
pub struct PendingHandle {
    pub id: u64,
    pub receiver: oneshot::Receiver<Reply>,
    pub deadline: Arc<Mutex<Instant>>,
}

/// Owns everything the response dispatcher needs: the pending-command
/// FIFO, the per-peer accumulator queues, the configured target address,
/// and the phase-mode side channel (§9). One instance lives behind a
/// single mutex shared by the writer path (command engine) and the
/// reader path (transport callback), per §5.
pub struct Dispatcher {
    address: u8,
    phase_mode: bool,
    next_id: u64,
    pending: VecDeque<PendingEntry>,
    accum: AccumulatorQueues,
}

impl Dispatcher {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            phase_mode: false,
            next_id: 0,
            pending: VecDeque::new(),
            accum: AccumulatorQueues::new(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    pub fn phase_mode(&self) -> bool {
        self.phase_mode
    }

    pub fn set_phase_mode(&mut self, phase_mode: bool) {
        self.phase_mode = phase_mode;
    }

    /// Registers a pending command with the given deadline and returns a
    /// handle the caller awaits on.
    pub fn push_pending(&mut self, command: Command, timeout: Duration) -> PendingHandle {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        let deadline = Arc::new(Mutex::new(Instant::now() + timeout));
        self.pending.push_back(PendingEntry {
            id,
            command,
            deadline: deadline.clone(),
            resolver: tx,
        });
        PendingHandle {
            id,
            receiver: rx,
            deadline,
        }
    }

    /// Removes a pending entry by id without resolving it — used when the
    /// caller's deadline has genuinely elapsed (§5 "Cancellation").
    pub fn cancel(&mut self, id: u64) {
        if let Some(pos) = self.pending.iter().position(|e| e.id == id) {
            self.pending.remove(pos);
        }
    }

    /// Drops every pending entry and clears all accumulator queues for the
    /// configured address — used after `SET_BAUD`, `SET_ADDR` and
    /// `SET_MODFN` succeed, which the reader documents as resetting state.
    pub fn reset_state(&mut self) {
        self.pending.clear();
        self.accum.clear(self.address);
    }

    pub fn take_masks(&mut self) -> Vec<TagMaskRecord> {
        self.accum.take_masks(self.address)
    }

    pub fn take_inventory_buffer(&mut self) -> Vec<BufferedTagRecord> {
        self.accum.take_inventory(self.address)
    }

    pub fn take_read(&mut self) -> Vec<ReadRecord> {
        self.accum.take_read(self.address)
    }

    pub fn take_write(&mut self) -> Vec<TagOpRecord> {
        self.accum.take_write(self.address)
    }

    pub fn take_lock(&mut self) -> Vec<TagOpRecord> {
        self.accum.take_lock(self.address)
    }

    pub fn take_kill(&mut self) -> Vec<TagOpRecord> {
        self.accum.take_kill(self.address)
    }

    /// Processes one validated packet. Returns an event to hand to the
    /// event sink, if this packet was unsolicited rather than a reply.
    pub fn handle_packet(&mut self, pkt: RawPacket) -> Option<Event> {
        // Step 2: address filter.
        if self.address != 0xFF && pkt.address != self.address {
            log::debug!(
                "dropping packet for address {:#04x}, configured for {:#04x}",
                pkt.address,
                self.address
            );
            return None;
        }

        // Step 3: command validity.
        let Ok(command) = Command::try_from(pkt.command) else {
            log::debug!("dropping packet with unknown command {:#04x}", pkt.command);
            return None;
        };

        // Step 5: event demultiplex. Checked before ordinary error
        // classification because several of these commands also have a
        // short, error-coded acknowledgement shape (a plain "inventory
        // started" ack) that step-4 classification alone can't tell apart
        // from an event packet without looking at length.
        if let Some(event) = self.try_parse_event(command, &pkt) {
            self.refresh_front_deadline(command);
            return Some(event);
        }

        let data = &pkt.payload[..];
        let policy = command.error_policy();
        let (error_code, consumed) = classify_error(command, policy, data);
        let remaining = &data[consumed..];

        // Step 6: multi-packet accumulation.
        if let Some(accumulator) = command.accumulates(pkt.length) {
            if !self.accumulate(accumulator, remaining) {
                // Not yet complete: swallow, no pending command resolved.
                return None;
            }
        }

        let success = is_success(command, error_code);
        self.resolve_or_resync(
            command,
            Reply {
                address: pkt.address,
                command,
                data: Bytes::copy_from_slice(remaining),
                error_code,
                success,
            },
        );
        None
    }

    fn try_parse_event(&self, command: Command, pkt: &RawPacket) -> Option<Event> {
        use Command::*;
        match command {
            FastSwitchAntennaInventory if pkt.length == 5 => {
                parse::inventory::parse_antenna_missing(&pkt.payload)
                    .ok()
                    .map(Event::AntennaMissing)
            }
            Iso6bInventory if pkt.payload.len() == 9 => {
                parse::inventory::parse_6b_sighting(&pkt.payload)
                    .ok()
                    .map(Event::Tag6B)
            }
            RealTimeInventory | FastSwitchAntennaInventory | SessionInventory
                if pkt.payload.len() > 7 =>
            {
                parse::inventory::parse_tag_sighting(&pkt.payload, self.phase_mode)
                    .ok()
                    .map(Event::Tag)
            }
            _ => None,
        }
    }

    fn refresh_front_deadline(&self, command: Command) {
        if let Some(front) = self.pending.front() {
            if front.command == command {
                *front.deadline.lock().unwrap() = Instant::now() + DEFAULT_TIMEOUT;
            }
        }
    }

    /// Parses one record into the matching accumulator queue and reports
    /// whether the multi-packet reply is now complete (queue length has
    /// caught up with the count field carried in the record).
    fn accumulate(&mut self, accumulator: Accumulator, data: &[u8]) -> bool {
        let address = self.address;
        match accumulator {
            Accumulator::InventoryBuffer => match parse::parse_buffered_record(data) {
                Ok((record, total_count)) => {
                    self.accum.push_inventory(address, record) as u16 >= total_count
                }
                Err(_) => {
                    log::debug!("dropping undersized buffered-inventory record");
                    false
                }
            },
            Accumulator::Read => match parse::parse_read_record(data) {
                Ok((record, total_count)) => {
                    self.accum.push_read(address, record) as u16 >= total_count
                }
                Err(_) => {
                    log::debug!("dropping undersized read record");
                    false
                }
            },
            Accumulator::Write => match parse::parse_tag_op_record(data) {
                Ok((record, total_count)) => {
                    self.accum.push_write(address, record) as u16 >= total_count
                }
                Err(_) => {
                    log::debug!("dropping undersized write record");
                    false
                }
            },
            Accumulator::Lock => match parse::parse_tag_op_record(data) {
                Ok((record, total_count)) => {
                    self.accum.push_lock(address, record) as u16 >= total_count
                }
                Err(_) => {
                    log::debug!("dropping undersized lock record");
                    false
                }
            },
            Accumulator::Kill => match parse::parse_tag_op_record(data) {
                Ok((record, total_count)) => {
                    self.accum.push_kill(address, record) as u16 >= total_count
                }
                Err(_) => {
                    log::debug!("dropping undersized kill record");
                    false
                }
            },
            Accumulator::Masks => {
                let mut cursor = 0usize;
                let mut complete = false;
                while cursor < data.len() {
                    match parse::parse_tag_mask_record(&data[cursor..]) {
                        Ok((record, consumed)) => {
                            self.accum.push_mask(address, record);
                            cursor += consumed;
                            complete = true;
                        }
                        Err(_) => break,
                    }
                }
                complete
            }
        }
    }

    /// Step 7: pop pending entries from the front until one matches, or the
    /// list is exhausted. Every popped non-matching entry has its
    /// accumulator queue cleared, since a lost record must not bleed into
    /// whatever consumes that queue next.
    fn resolve_or_resync(&mut self, command: Command, reply: Reply) {
        loop {
            let Some(front) = self.pending.pop_front() else {
                log::debug!("{command:?} reply with no pending command, dropping (out of sync)");
                return;
            };
            if front.command == command {
                let _ = front.resolver.send(reply);
                return;
            }
            log::debug!(
                "resync: popped pending {:?} while expecting a match for {:?}",
                front.command,
                command
            );
            self.accum.clear(self.address);
        }
    }
}

fn classify_error(command: Command, policy: ErrorPolicy, data: &[u8]) -> (Option<ErrorCode>, usize) {
    match policy {
        ErrorPolicy::No => (None, 0),
        ErrorPolicy::Yes => match data.first() {
            Some(&byte) => (Some(ErrorCode(byte)), 1),
            None => (None, 0),
        },
        ErrorPolicy::IfSingleByteData => {
            if data.len() == 1 {
                (Some(ErrorCode(data[0])), 1)
            } else {
                (None, 0)
            }
        }
        ErrorPolicy::Sometimes => classify_sometimes(command, data),
    }
}

/// The three documented data-dependent special cases (§4.2, §9): kept out
/// of the general dispatch loop rather than scattered through it.
fn classify_sometimes(command: Command, data: &[u8]) -> (Option<ErrorCode>, usize) {
    match command {
        Command::GetRfLinkProfile => {
            if data.len() == 1 && RfLinkProfile::from_byte(data[0]).is_none() {
                (Some(ErrorCode(data[0])), 1)
            } else {
                (None, 0)
            }
        }
        Command::GetReturnLoss => {
            if data.len() == 1 && data[0] == ErrorCode::FAIL_GET_RF_PORT_RETURN_LOSS.0 {
                (Some(ErrorCode(data[0])), 1)
            } else {
                (None, 0)
            }
        }
        Command::TagMask => {
            if data.len() == 1 && data[0] != 0 {
                (Some(ErrorCode(data[0])), 1)
            } else {
                (None, 0)
            }
        }
        _ => (None, 0),
    }
}

fn is_success(command: Command, error_code: Option<ErrorCode>) -> bool {
    match error_code {
        None => true,
        Some(code) if code.is_success() => true,
        Some(code) => {
            code == ErrorCode::BUFFER_EMPTY && command == Command::GetAndResetInventoryBuffer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HEADER;
    use crate::codec::lrc;

    fn packet(address: u8, command: u8, payload: &[u8]) -> RawPacket {
        let length = (payload.len() + 3) as u8;
        let mut frame = vec![HEADER, length, address, command];
        frame.extend_from_slice(payload);
        let check = lrc(&frame);
        RawPacket {
            length,
            address,
            command,
            payload: Bytes::copy_from_slice(&{
                frame.push(check);
                frame[4..frame.len() - 1].to_vec()
            }),
        }
    }

    #[test]
    fn resolves_a_matching_reply_in_fifo_order() {
        let mut dispatcher = Dispatcher::new(0xFF);
        let handle = dispatcher.push_pending(Command::Reset, DEFAULT_TIMEOUT);
        dispatcher.handle_packet(packet(0xFF, Command::Reset.opcode(), &[]));
        let reply = handle.receiver.try_recv().expect("resolved");
        assert!(reply.success);
        assert_eq!(reply.command, Command::Reset);
    }

    #[test]
    fn drops_packets_for_a_foreign_address() {
        let mut dispatcher = Dispatcher::new(0x01);
        let handle = dispatcher.push_pending(Command::Reset, DEFAULT_TIMEOUT);
        dispatcher.handle_packet(packet(0x02, Command::Reset.opcode(), &[]));
        assert!(handle.receiver.try_recv().is_err());
    }

    #[test]
    fn resync_pops_non_matching_entries_and_clears_accumulators() {
        let mut dispatcher = Dispatcher::new(0xFF);
        let stale = dispatcher.push_pending(Command::GetWorkingAntenna, DEFAULT_TIMEOUT);
        let fresh = dispatcher.push_pending(Command::Reset, DEFAULT_TIMEOUT);
        dispatcher.handle_packet(packet(0xFF, Command::Reset.opcode(), &[]));
        assert!(stale.receiver.try_recv().is_err());
        let reply = fresh.receiver.try_recv().expect("fresh resolved after resync");
        assert_eq!(reply.command, Command::Reset);
    }

    #[test]
    fn single_byte_ack_carries_error_code_for_if_single_byte_policy() {
        let mut dispatcher = Dispatcher::new(0xFF);
        let handle = dispatcher.push_pending(Command::Kill, DEFAULT_TIMEOUT);
        dispatcher.handle_packet(packet(0xFF, Command::Kill.opcode(), &[0x36])); // NO_TAG
        let reply = handle.receiver.try_recv().expect("resolved");
        assert!(!reply.success);
        assert_eq!(reply.error_code, Some(ErrorCode::NO_TAG));
    }

    #[test]
    fn antenna_missing_emits_event_without_consuming_pending() {
        let mut dispatcher = Dispatcher::new(0xFF);
        let handle = dispatcher.push_pending(Command::FastSwitchAntennaInventory, DEFAULT_TIMEOUT);
        let event = dispatcher.handle_packet(packet(
            0xFF,
            Command::FastSwitchAntennaInventory.opcode(),
            &[0x01, 0x22],
        ));
        assert!(matches!(event, Some(Event::AntennaMissing(_))));
        assert!(handle.receiver.try_recv().is_err());
    }
}
