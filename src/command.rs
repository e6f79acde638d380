//! Command engine (component C6): the typed public surface. Every method
//! here validates its arguments, builds and frames a payload, registers a
//! pending-command entry, writes the frame, and awaits the matching reply
//! (§4.6).
//!
//! `RESET` is the one command whose timeout is success rather than
//! failure — the reader never replies to it — so [`Reader::reset`] maps
//! that specific error back to `Ok(())` rather than propagating it.

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::catalog::{
    AntennaId, BaudCode, BeeperMode, Command, ErrorCode, FastIdMode, FrequencyRegion,
    InventoriedFlag, LockMemoryBank, LockType, MemoryBank, RfLinkProfile, Session, HEADER,
};
use crate::codec::{lrc, write_u16_be, write_u24_be};
use crate::dispatch::{Reply, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::model::{BufferedTagRecord, InventorySummary, ReadRecord, TagMaskRecord, TagOpRecord};
use crate::parse::config::FrequencyRegionReply;
use crate::transport::{BaudRateControl, Transport};
use crate::Reader;

/// How many antenna ports a `SET_OUTPUT_POWER` call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPower {
    All(u8),
    Four([u8; 4]),
    Eight([u8; 8]),
}

fn validate_range(field: &'static str, value: u8, range: std::ops::RangeInclusive<u8>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidArgument {
            field,
            detail: format!("{value} not in {range:?}"),
        })
    }
}

fn validate_len(field: &'static str, actual: usize, expected: std::ops::RangeInclusive<usize>) -> Result<()> {
    if expected.contains(&actual) {
        Ok(())
    } else {
        Err(Error::InvalidArgument {
            field,
            detail: format!("length {actual} not in {expected:?}"),
        })
    }
}

fn build_frame(address: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![HEADER, (payload.len() + 3) as u8, address, command];
    frame.extend_from_slice(payload);
    let check = lrc(&frame);
    frame.push(check);
    frame
}

fn inventory_timeout(repeat: u8, extra: Duration) -> Duration {
    DEFAULT_TIMEOUT + Duration::from_millis(repeat as u64 * 255) + extra
}

impl<T: Transport, B: BaudRateControl> Reader<T, B> {
    async fn send(&self, command: Command, payload: Vec<u8>, timeout: Duration) -> Result<Reply> {
        let address = self.shared.dispatcher.lock().await.address();
        let frame = build_frame(address, command.opcode(), &payload);
        let handle = self.shared.dispatcher.lock().await.push_pending(command, timeout);
        {
            let mut writer = self.shared.writer.lock().await;
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
        self.await_reply(command, handle).await
    }

    async fn await_reply(
        &self,
        command: Command,
        handle: crate::dispatch::PendingHandle,
    ) -> Result<Reply> {
        let crate::dispatch::PendingHandle {
            id,
            mut receiver,
            deadline,
        } = handle;
        loop {
            let target = tokio::time::Instant::from_std(*deadline.lock().unwrap());
            tokio::select! {
                res = &mut receiver => {
                    return res.map_err(|_| Error::EngineStopped);
                }
                _ = tokio::time::sleep_until(target) => {
                    let current = *deadline.lock().unwrap();
                    if tokio::time::Instant::from_std(current) > target {
                        continue;
                    }
                    self.shared.dispatcher.lock().await.cancel(id);
                    return Err(Error::Timeout { command });
                }
            }
        }
    }

    fn protocol_err(command: Command, reply: &Reply) -> Error {
        Error::Protocol {
            command,
            code: reply.error_code.unwrap_or(ErrorCode::FAIL),
        }
    }

    async fn send_ack(&self, command: Command, payload: Vec<u8>, timeout: Duration) -> Result<()> {
        let reply = self.send(command, payload, timeout).await?;
        if reply.success {
            Ok(())
        } else {
            Err(Self::protocol_err(command, &reply))
        }
    }

    /// For the inventory commands whose terminating reply carries a summary
    /// record (antenna id, read rate, total read) rather than a bare status
    /// byte — `error_policy() == No`, so the wire reply is always treated as
    /// data first and only checked for failure by the parse itself.
    async fn send_inventory_summary(
        &self,
        command: Command,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<InventorySummary> {
        let reply = self.send(command, payload, timeout).await?;
        crate::parse::parse_inventory_summary(&reply.data).map_err(|_| Error::InvalidArgument {
            field: "inventory_summary",
            detail: "short reply".into(),
        })
    }

    // ---- Transport ---------------------------------------------------

    pub async fn reset(&self) -> Result<()> {
        match self.send_ack(Command::Reset, Vec::new(), DEFAULT_TIMEOUT).await {
            Err(Error::Timeout { command: Command::Reset }) => Ok(()),
            other => other,
        }
    }

    pub async fn set_baud_rate(&self, baud: BaudCode) -> Result<()> {
        self.send_ack(Command::SetBaudRate, vec![baud as u8], DEFAULT_TIMEOUT)
            .await?;
        self.shared.baud.lock().await.set_baud_rate(baud.bits_per_second())?;
        self.shared.dispatcher.lock().await.reset_state();
        Ok(())
    }

    pub async fn set_address(&self, address: u8) -> Result<()> {
        self.send_ack(Command::SetAddress, vec![address], DEFAULT_TIMEOUT)
            .await?;
        let mut dispatcher = self.shared.dispatcher.lock().await;
        dispatcher.set_address(address);
        dispatcher.reset_state();
        Ok(())
    }

    pub async fn get_firmware_version(&self) -> Result<Vec<u8>> {
        let reply = self.send(Command::GetFirmwareVersion, Vec::new(), DEFAULT_TIMEOUT).await?;
        Ok(reply.data.to_vec())
    }

    // ---- Antenna & power ----------------------------------------------

    pub async fn set_working_antenna(&self, antenna: AntennaId) -> Result<()> {
        self.send_ack(Command::SetWorkingAntenna, vec![antenna as u8], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_working_antenna(&self) -> Result<AntennaId> {
        let reply = self.send(Command::GetWorkingAntenna, Vec::new(), DEFAULT_TIMEOUT).await?;
        let byte = *reply.data.first().ok_or(Error::InvalidArgument {
            field: "antenna",
            detail: "empty reply".into(),
        })?;
        Ok(AntennaId::from_index(byte))
    }

    pub async fn set_output_power(&self, power: OutputPower) -> Result<()> {
        let payload = match power {
            OutputPower::All(p) => vec![p],
            OutputPower::Four(ps) => ps.to_vec(),
            OutputPower::Eight(ps) => ps.to_vec(),
        };
        self.send_ack(Command::SetOutputPower, payload, DEFAULT_TIMEOUT).await
    }

    pub async fn get_output_power(&self) -> Result<[u8; 4]> {
        let reply = self.send(Command::GetOutputPower, Vec::new(), DEFAULT_TIMEOUT).await?;
        crate::parse::config::parse_output_power(&reply.data).map_err(|_| Error::InvalidArgument {
            field: "output_power",
            detail: "short reply".into(),
        })
    }

    pub async fn get_output_power_8p(&self) -> Result<[u8; 8]> {
        let reply = self.send(Command::GetOutputPower8P, Vec::new(), DEFAULT_TIMEOUT).await?;
        crate::parse::config::parse_output_power_8p(&reply.data).map_err(|_| Error::InvalidArgument {
            field: "output_power_8p",
            detail: "short reply".into(),
        })
    }

    pub async fn set_temporary_output_power(&self, power: u8) -> Result<()> {
        self.send_ack(Command::SetTemporaryOutputPower, vec![power], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn set_antenna_detector_sensitivity(&self, value: u8) -> Result<()> {
        self.send_ack(
            Command::SetAntennaDetectorSensitivity,
            vec![value],
            DEFAULT_TIMEOUT,
        )
        .await
    }

    pub async fn get_antenna_detector_sensitivity(&self) -> Result<u8> {
        let reply = self
            .send(Command::GetAntennaDetectorSensitivity, Vec::new(), DEFAULT_TIMEOUT)
            .await?;
        reply.data.first().copied().ok_or(Error::InvalidArgument {
            field: "antenna_detector_sensitivity",
            detail: "empty reply".into(),
        })
    }

    pub async fn get_return_loss(&self, freq_index: u8) -> Result<u8> {
        let reply = self
            .send(Command::GetReturnLoss, vec![freq_index], DEFAULT_TIMEOUT)
            .await?;
        if !reply.success {
            return Err(Self::protocol_err(Command::GetReturnLoss, &reply));
        }
        reply.data.first().copied().ok_or(Error::InvalidArgument {
            field: "return_loss",
            detail: "empty reply".into(),
        })
    }

    // ---- Region & RF ----------------------------------------------------

    pub async fn set_region_frequency_band(
        &self,
        region: FrequencyRegion,
        start_idx: Option<u8>,
        end_idx: Option<u8>,
    ) -> Result<()> {
        let (default_start, default_end) = region.default_index_range().unwrap_or((0, 0));
        let payload = vec![
            region as u8,
            start_idx.unwrap_or(default_start),
            end_idx.unwrap_or(default_end),
        ];
        self.send_ack(Command::SetFrequencyRegion, payload, DEFAULT_TIMEOUT).await
    }

    pub async fn set_custom_frequency_band(
        &self,
        start_freq_khz: u32,
        spacing_div10: u8,
        quantity: u8,
    ) -> Result<()> {
        let mut payload = vec![FrequencyRegion::Custom as u8, spacing_div10, quantity];
        write_u24_be(&mut payload, start_freq_khz);
        self.send_ack(Command::SetFrequencyRegion, payload, DEFAULT_TIMEOUT).await
    }

    pub async fn get_frequency_band(&self) -> Result<FrequencyRegionReply> {
        let reply = self.send(Command::GetFrequencyRegion, Vec::new(), DEFAULT_TIMEOUT).await?;
        crate::parse::config::parse_frequency_region_reply(&reply.data).map_err(|_| {
            Error::InvalidArgument {
                field: "frequency_band",
                detail: "short reply".into(),
            }
        })
    }

    pub async fn set_rf_link_profile(&self, profile: RfLinkProfile) -> Result<()> {
        self.send_ack(Command::SetRfLinkProfile, vec![profile as u8], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_rf_link_profile(&self) -> Result<RfLinkProfile> {
        let reply = self.send(Command::GetRfLinkProfile, Vec::new(), DEFAULT_TIMEOUT).await?;
        if !reply.success {
            return Err(Self::protocol_err(Command::GetRfLinkProfile, &reply));
        }
        let byte = *reply.data.first().ok_or(Error::InvalidArgument {
            field: "rf_link_profile",
            detail: "empty reply".into(),
        })?;
        RfLinkProfile::from_byte(byte).ok_or(Error::InvalidArgument {
            field: "rf_link_profile",
            detail: format!("unknown profile code {byte:#04x}"),
        })
    }

    pub async fn set_dense_reader_mode(&self, enabled: bool) -> Result<()> {
        self.send_ack(
            Command::SetDenseReaderMode,
            vec![enabled as u8],
            DEFAULT_TIMEOUT,
        )
        .await
    }

    pub async fn get_dense_reader_mode(&self) -> Result<bool> {
        let reply = self.send(Command::GetDenseReaderMode, Vec::new(), DEFAULT_TIMEOUT).await?;
        Ok(reply.data.first().copied().unwrap_or(0) != 0)
    }

    pub async fn set_beeper_mode(&self, mode: BeeperMode) -> Result<()> {
        self.send_ack(Command::SetBeeperMode, vec![mode.to_byte()], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_temperature(&self) -> Result<i16> {
        let reply = self.send(Command::GetTemperature, Vec::new(), DEFAULT_TIMEOUT).await?;
        crate::parse::config::parse_temperature(&reply.data).map_err(|_| Error::InvalidArgument {
            field: "temperature",
            detail: "short reply".into(),
        })
    }

    // ---- GPIO -----------------------------------------------------------

    pub async fn get_gpio_level(&self, pin: u8) -> Result<bool> {
        validate_range("gpio_pin", pin, 1..=2)?;
        let reply = self.send(Command::GetGpio, vec![pin], DEFAULT_TIMEOUT).await?;
        Ok(reply.data.first().copied().unwrap_or(0) != 0)
    }

    pub async fn set_gpio_level(&self, pin: u8, high: bool) -> Result<()> {
        validate_range("gpio_pin", pin, 3..=4)?;
        self.send_ack(Command::SetGpio, vec![pin, high as u8], DEFAULT_TIMEOUT)
            .await
    }

    // ---- Identifier -------------------------------------------------------

    pub async fn set_identifier(&self, identifier: [u8; 12]) -> Result<()> {
        self.send_ack(Command::SetIdentifier, identifier.to_vec(), DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_identifier(&self) -> Result<[u8; 12]> {
        let reply = self.send(Command::GetIdentifier, Vec::new(), DEFAULT_TIMEOUT).await?;
        validate_len("identifier", reply.data.len(), 12..=12)?;
        let mut id = [0u8; 12];
        id.copy_from_slice(&reply.data[..12]);
        Ok(id)
    }

    // ---- Inventory (C1G2) -------------------------------------------------

    pub async fn start_buffered_inventory(&self, repeat: u8) -> Result<InventorySummary> {
        self.send_inventory_summary(
            Command::BufferedInventory,
            vec![repeat],
            inventory_timeout(repeat, Duration::ZERO),
        )
        .await
    }

    pub async fn start_real_time_inventory(&self, repeat: u8) -> Result<InventorySummary> {
        self.send_inventory_summary(
            Command::RealTimeInventory,
            vec![repeat],
            inventory_timeout(repeat, Duration::ZERO),
        )
        .await
    }

    pub async fn start_session_inventory(
        &self,
        repeat: u8,
        session: Session,
        target: InventoriedFlag,
        select: Option<u8>,
        phase: bool,
        powersave: Option<u8>,
    ) -> Result<InventorySummary> {
        let mut payload = vec![repeat, session as u8, target as u8];
        payload.push(select.unwrap_or(0));
        payload.push(phase as u8);
        payload.push(powersave.unwrap_or(0));
        self.shared.dispatcher.lock().await.set_phase_mode(phase);
        let extra = Duration::from_millis(powersave.unwrap_or(0) as u64 * 64);
        self.send_inventory_summary(
            Command::SessionInventory,
            payload,
            inventory_timeout(repeat, extra),
        )
        .await
    }

    pub async fn start_fast_switch_antenna_inventory(
        &self,
        repeat: u8,
        rest_interval: u8,
        antennas: &[u8],
        session: Option<Session>,
        target: Option<InventoriedFlag>,
        phase: bool,
    ) -> Result<InventorySummary> {
        validate_len("antennas", antennas.len(), 4..=4)
            .or_else(|_| validate_len("antennas", antennas.len(), 8..=8))?;
        let mut payload = vec![repeat, rest_interval];
        payload.extend_from_slice(antennas);
        payload.push(session.map(|s| s as u8).unwrap_or(0));
        payload.push(target.map(|t| t as u8).unwrap_or(0));
        payload.push(phase as u8);
        self.shared.dispatcher.lock().await.set_phase_mode(phase);
        self.send_inventory_summary(
            Command::FastSwitchAntennaInventory,
            payload,
            inventory_timeout(repeat, Duration::ZERO),
        )
        .await
    }

    // ---- Tag ops (C1G2) ----------------------------------------------------

    pub async fn read_tags(
        &self,
        bank: MemoryBank,
        word_addr: u8,
        word_len: u8,
    ) -> Result<Vec<ReadRecord>> {
        let payload = vec![bank as u8, word_addr, word_len, 0, 0, 0, 0];
        self.send_ack(Command::Read, payload, DEFAULT_TIMEOUT).await?;
        Ok(self.shared.dispatcher.lock().await.take_read())
    }

    pub async fn write_tags(
        &self,
        bank: MemoryBank,
        word_addr: u8,
        data: &[u8],
        password: [u8; 4],
        block_write: bool,
    ) -> Result<Vec<TagOpRecord>> {
        let mut data = data.to_vec();
        if data.len() % 2 != 0 {
            data.push(0);
        }
        let mut payload = vec![bank as u8, word_addr];
        write_u16_be(&mut payload, (data.len() / 2) as u16);
        payload.extend_from_slice(&password);
        payload.extend_from_slice(&data);
        let command = if block_write { Command::WriteBlock } else { Command::Write };
        self.send_ack(command, payload, DEFAULT_TIMEOUT).await?;
        Ok(self.shared.dispatcher.lock().await.take_write())
    }

    pub async fn lock_tags(
        &self,
        bank: LockMemoryBank,
        op: LockType,
        password: [u8; 4],
    ) -> Result<Vec<TagOpRecord>> {
        let mut payload = vec![bank as u8, op as u8];
        payload.extend_from_slice(&password);
        self.send_ack(Command::Lock, payload, DEFAULT_TIMEOUT).await?;
        Ok(self.shared.dispatcher.lock().await.take_lock())
    }

    pub async fn kill_tags(&self, password: [u8; 4]) -> Result<Vec<TagOpRecord>> {
        self.send_ack(Command::Kill, password.to_vec(), DEFAULT_TIMEOUT).await?;
        Ok(self.shared.dispatcher.lock().await.take_kill())
    }

    pub async fn set_access_epc_match(&self, epc: &[u8]) -> Result<()> {
        validate_len("access_epc_match", epc.len(), 1..=62)?;
        let mut payload = vec![epc.len() as u8];
        payload.extend_from_slice(epc);
        self.send_ack(Command::SetAccessEpcMatch, payload, DEFAULT_TIMEOUT)
            .await
    }

    pub async fn clear_access_epc_match(&self) -> Result<()> {
        self.send_ack(Command::SetAccessEpcMatch, vec![0], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_access_epc_match(&self) -> Result<Option<Vec<u8>>> {
        let reply = self
            .send(Command::GetAccessEpcMatch, Vec::new(), DEFAULT_TIMEOUT)
            .await?;
        if reply.data.is_empty() || reply.data[0] == 0 {
            Ok(None)
        } else {
            Ok(Some(reply.data[1..].to_vec()))
        }
    }

    // ---- Mask & FastID ------------------------------------------------------

    pub async fn set_tag_mask(&self, mask_id: u8, data: &[u8]) -> Result<()> {
        let mut payload = vec![mask_id, data.len() as u8];
        payload.extend_from_slice(data);
        self.send_ack(Command::TagMask, payload, DEFAULT_TIMEOUT).await
    }

    /// `mask_id = None` clears every configured mask (the wire "ALL" form).
    pub async fn clear_tag_mask(&self, mask_id: Option<u8>) -> Result<()> {
        self.send_ack(
            Command::TagMask,
            vec![mask_id.unwrap_or(0xFF), 0],
            DEFAULT_TIMEOUT,
        )
        .await
    }

    pub async fn get_tag_masks(&self) -> Result<Vec<TagMaskRecord>> {
        self.send_ack(Command::TagMask, vec![0xFE], DEFAULT_TIMEOUT).await?;
        Ok(self.shared.dispatcher.lock().await.take_masks())
    }

    pub async fn set_fast_id(&self, mode: FastIdMode) -> Result<()> {
        self.send_ack(Command::SetFastId, vec![mode as u8], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn set_temporary_fast_id(&self, mode: FastIdMode) -> Result<()> {
        self.send_ack(Command::SetSavedFastId, vec![mode as u8], DEFAULT_TIMEOUT)
            .await
    }

    pub async fn get_fast_id(&self) -> Result<FastIdMode> {
        let reply = self.send(Command::GetFastId, Vec::new(), DEFAULT_TIMEOUT).await?;
        match reply.data.first() {
            Some(0x8D) => Ok(FastIdMode::Enabled),
            _ => Ok(FastIdMode::Disabled),
        }
    }

    // ---- Antenna sequence & module function ----------------------------------

    pub async fn get_antenna_switching_sequence(&self) -> Result<Vec<u8>> {
        let reply = self
            .send(Command::GetAntennaSwitchingSequence, Vec::new(), DEFAULT_TIMEOUT)
            .await?;
        Ok(reply.data.to_vec())
    }

    pub async fn get_module_function(&self) -> Result<u8> {
        let reply = self.send(Command::GetModuleFunction, Vec::new(), DEFAULT_TIMEOUT).await?;
        reply.data.first().copied().ok_or(Error::InvalidArgument {
            field: "module_function",
            detail: "empty reply".into(),
        })
    }

    pub async fn set_module_function(&self, mode: u8) -> Result<()> {
        self.send_ack(Command::SetModuleFunction, vec![mode], DEFAULT_TIMEOUT)
            .await?;
        self.shared.dispatcher.lock().await.reset_state();
        Ok(())
    }

    // ---- Inventory buffer -----------------------------------------------------

    pub async fn get_inventory_buffer(&self, reset: bool) -> Result<Vec<BufferedTagRecord>> {
        let command = if reset {
            Command::GetAndResetInventoryBuffer
        } else {
            Command::GetInventoryBuffer
        };
        let reply = self.send(command, Vec::new(), DEFAULT_TIMEOUT).await?;
        if !reply.success {
            return Err(Self::protocol_err(command, &reply));
        }
        Ok(self.shared.dispatcher.lock().await.take_inventory_buffer())
    }

    pub async fn get_inventory_buffer_tag_count(&self) -> Result<u16> {
        let reply = self
            .send(Command::GetInventoryBufferTagCount, Vec::new(), DEFAULT_TIMEOUT)
            .await?;
        validate_len("inventory_buffer_tag_count", reply.data.len(), 2..=2)?;
        Ok(crate::codec::read_u16_be(&reply.data[0..2]))
    }

    pub async fn reset_inventory_buffer(&self) -> Result<()> {
        self.send_ack(Command::ResetInventoryBuffer, Vec::new(), DEFAULT_TIMEOUT)
            .await
    }

    // ---- ISO 18000-6B -----------------------------------------------------------

    pub async fn start_6b_real_time_inventory(&self, repeat: u8) -> Result<InventorySummary> {
        self.send_inventory_summary(
            Command::Iso6bInventory,
            vec![repeat],
            inventory_timeout(repeat, Duration::ZERO),
        )
        .await
    }

    pub async fn read_6b_tag(&self, uid: [u8; 8], addr: u8, len: u8) -> Result<Vec<u8>> {
        let mut payload = uid.to_vec();
        payload.push(addr);
        payload.push(len);
        let reply = self.send(Command::Iso6bRead, payload, DEFAULT_TIMEOUT).await?;
        if !reply.success {
            return Err(Self::protocol_err(Command::Iso6bRead, &reply));
        }
        Ok(reply.data.to_vec())
    }

    pub async fn write_6b_tag(&self, uid: [u8; 8], addr: u8, data: &[u8]) -> Result<()> {
        let mut payload = uid.to_vec();
        payload.push(addr);
        payload.push(data.len() as u8);
        payload.extend_from_slice(data);
        self.send_ack(Command::Iso6bWrite, payload, DEFAULT_TIMEOUT).await
    }

    pub async fn lock_6b_tag_byte(&self, uid: [u8; 8], addr: u8) -> Result<()> {
        let mut payload = uid.to_vec();
        payload.push(addr);
        self.send_ack(Command::Iso6bLock, payload, DEFAULT_TIMEOUT).await
    }

    pub async fn query_lock_6b_tag_byte(&self, uid: [u8; 8], addr: u8) -> Result<bool> {
        let mut payload = uid.to_vec();
        payload.push(addr);
        let reply = self.send(Command::Iso6bQueryLock, payload, DEFAULT_TIMEOUT).await?;
        Ok(reply.success)
    }
}
