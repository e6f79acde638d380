//! Command codes, error codes and the other fixed enumerations of the R2000
//! wire protocol (component C2 of the design).
//!
//! Everything in this module is immutable and has no dependency on engine
//! state: the frequency table, the command-to-error-policy mapping and the
//! various field enumerations are all compile-time facts about the reader
//! family, not something negotiated at runtime.

/// How the dispatcher should interpret the first payload byte of a reply
/// to a given command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first payload byte is data, never an error code.
    No,
    /// The first payload byte is always an error code.
    Yes,
    /// The first payload byte is an error code iff the payload is exactly
    /// one byte long (frame length 4).
    IfSingleByteData,
    /// Command-specific rule, handled by the dispatcher (§4.2/§4.4).
    Sometimes,
}

/// All commands understood by the reader, keyed by their wire opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    GetGpio = 0x60,
    SetGpio = 0x61,
    SetAntennaDetectorSensitivity = 0x62,
    GetAntennaDetectorSensitivity = 0x63,
    SetTemporaryOutputPower = 0x66,
    SetIdentifier = 0x67,
    GetIdentifier = 0x68,
    SetRfLinkProfile = 0x69,
    GetRfLinkProfile = 0x6A,
    Reset = 0x70,
    SetBaudRate = 0x71,
    GetFirmwareVersion = 0x72,
    SetAddress = 0x73,
    SetWorkingAntenna = 0x74,
    GetWorkingAntenna = 0x75,
    SetOutputPower = 0x76,
    GetOutputPower = 0x77,
    SetFrequencyRegion = 0x78,
    GetFrequencyRegion = 0x79,
    SetBeeperMode = 0x7A,
    GetTemperature = 0x7B,
    SetDenseReaderMode = 0x7C,
    GetDenseReaderMode = 0x7D,
    GetReturnLoss = 0x7E,
    BufferedInventory = 0x80,
    Read = 0x81,
    Write = 0x82,
    Lock = 0x83,
    Kill = 0x84,
    SetAccessEpcMatch = 0x85,
    GetAccessEpcMatch = 0x86,
    RealTimeInventory = 0x89,
    FastSwitchAntennaInventory = 0x8A,
    SessionInventory = 0x8B,
    SetFastId = 0x8C,
    SetSavedFastId = 0x8D,
    GetFastId = 0x8E,
    GetAntennaSwitchingSequence = 0x8F,
    GetInventoryBuffer = 0x90,
    GetAndResetInventoryBuffer = 0x91,
    GetInventoryBufferTagCount = 0x92,
    ResetInventoryBuffer = 0x93,
    WriteBlock = 0x94,
    GetOutputPower8P = 0x97,
    TagMask = 0x98,
    SetModuleFunction = 0xA0,
    GetModuleFunction = 0xA1,
    Iso6bInventory = 0xB0,
    Iso6bRead = 0xB1,
    Iso6bWrite = 0xB2,
    Iso6bLock = 0xB3,
    Iso6bQueryLock = 0xB4,
}

impl Command {
    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        use Command::*;
        match self {
            GetGpio => "GET_GPIO",
            SetGpio => "SET_GPIO",
            SetAntennaDetectorSensitivity => "SET_ANT_DET",
            GetAntennaDetectorSensitivity => "GET_ANT_DET",
            SetTemporaryOutputPower => "SET_TEMP_POWER",
            SetIdentifier => "SET_IDENT",
            GetIdentifier => "GET_IDENT",
            SetRfLinkProfile => "SET_RFLINK",
            GetRfLinkProfile => "GET_RFLINK",
            Reset => "RESET",
            SetBaudRate => "SET_BAUD",
            GetFirmwareVersion => "GET_FW",
            SetAddress => "SET_ADDR",
            SetWorkingAntenna => "SET_WORK_ANT",
            GetWorkingAntenna => "GET_WORK_ANT",
            SetOutputPower => "SET_POWER",
            GetOutputPower => "GET_POWER",
            SetFrequencyRegion => "SET_FREQ",
            GetFrequencyRegion => "GET_FREQ",
            SetBeeperMode => "SET_BEEPER",
            GetTemperature => "GET_TEMP",
            SetDenseReaderMode => "SET_DRM",
            GetDenseReaderMode => "GET_DRM",
            GetReturnLoss => "GET_RETLOSS",
            BufferedInventory => "INVENTORY",
            Read => "READ",
            Write => "WRITE",
            Lock => "LOCK",
            Kill => "KILL",
            SetAccessEpcMatch => "SET_EPC_MATCH",
            GetAccessEpcMatch => "GET_EPC_MATCH",
            RealTimeInventory => "RT_INVENTORY",
            FastSwitchAntennaInventory => "FS_ANT_INVENTORY",
            SessionInventory => "SESSION_INVENTORY",
            SetFastId => "SET_FASTID",
            SetSavedFastId => "SET_SAVE_FASTID",
            GetFastId => "GET_FASTID",
            GetAntennaSwitchingSequence => "GET_ANT_SEQ",
            GetInventoryBuffer => "GET_INV_BUF",
            GetAndResetInventoryBuffer => "GET_RESET_INV_BUF",
            GetInventoryBufferTagCount => "GET_INV_CNT",
            ResetInventoryBuffer => "RESET_INV_BUF",
            WriteBlock => "WRITE_BLOCK",
            GetOutputPower8P => "GET_POWER_8P",
            TagMask => "TAG_MASK",
            SetModuleFunction => "SET_MODFN",
            GetModuleFunction => "GET_MODFN",
            Iso6bInventory => "6B_INV",
            Iso6bRead => "6B_READ",
            Iso6bWrite => "6B_WRITE",
            Iso6bLock => "6B_LOCK",
            Iso6bQueryLock => "6B_QLOCK",
        }
    }

    /// Whether replies to this command are accumulated into a per-peer
    /// queue (C7) rather than resolved from a single packet. `length` is
    /// the wire length byte of the packet under consideration, since a
    /// couple of these commands fall back to a single error-coded packet
    /// instead of a record list (e.g. an empty buffer).
    pub fn accumulates(self, length: u8) -> Option<Accumulator> {
        use Command::*;
        match self {
            GetInventoryBuffer | GetAndResetInventoryBuffer if length > 4 => {
                Some(Accumulator::InventoryBuffer)
            }
            TagMask if length > 7 => Some(Accumulator::Masks),
            Read if length > 4 => Some(Accumulator::Read),
            Write | WriteBlock if length > 4 => Some(Accumulator::Write),
            Lock if length > 4 => Some(Accumulator::Lock),
            Kill if length > 4 => Some(Accumulator::Kill),
            _ => None,
        }
    }

    pub fn error_policy(self) -> ErrorPolicy {
        use Command::*;
        use ErrorPolicy::*;
        match self {
            GetGpio | GetAntennaDetectorSensitivity | GetIdentifier | GetFirmwareVersion
            | GetWorkingAntenna | GetOutputPower | GetFrequencyRegion | GetTemperature
            | GetDenseReaderMode | BufferedInventory | GetFastId | GetAntennaSwitchingSequence
            | GetInventoryBufferTagCount | GetOutputPower8P | GetModuleFunction
            | GetAccessEpcMatch | RealTimeInventory | FastSwitchAntennaInventory
            | SessionInventory | Iso6bInventory => No,

            SetGpio | SetAntennaDetectorSensitivity | SetTemporaryOutputPower | SetIdentifier
            | SetRfLinkProfile | Reset | SetBaudRate | SetAddress | SetWorkingAntenna
            | SetOutputPower | SetFrequencyRegion | SetBeeperMode | SetDenseReaderMode
            | SetAccessEpcMatch | SetFastId | SetSavedFastId | ResetInventoryBuffer
            | SetModuleFunction => Yes,

            Read | Write | WriteBlock | Lock | Kill | GetInventoryBuffer
            | GetAndResetInventoryBuffer | Iso6bRead | Iso6bWrite | Iso6bLock
            | Iso6bQueryLock => IfSingleByteData,

            GetRfLinkProfile | GetReturnLoss | TagMask => Sometimes,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Command::*;
        Ok(match value {
            0x60 => GetGpio,
            0x61 => SetGpio,
            0x62 => SetAntennaDetectorSensitivity,
            0x63 => GetAntennaDetectorSensitivity,
            0x66 => SetTemporaryOutputPower,
            0x67 => SetIdentifier,
            0x68 => GetIdentifier,
            0x69 => SetRfLinkProfile,
            0x6A => GetRfLinkProfile,
            0x70 => Reset,
            0x71 => SetBaudRate,
            0x72 => GetFirmwareVersion,
            0x73 => SetAddress,
            0x74 => SetWorkingAntenna,
            0x75 => GetWorkingAntenna,
            0x76 => SetOutputPower,
            0x77 => GetOutputPower,
            0x78 => SetFrequencyRegion,
            0x79 => GetFrequencyRegion,
            0x7A => SetBeeperMode,
            0x7B => GetTemperature,
            0x7C => SetDenseReaderMode,
            0x7D => GetDenseReaderMode,
            0x7E => GetReturnLoss,
            0x80 => BufferedInventory,
            0x81 => Read,
            0x82 => Write,
            0x83 => Lock,
            0x84 => Kill,
            0x85 => SetAccessEpcMatch,
            0x86 => GetAccessEpcMatch,
            0x89 => RealTimeInventory,
            0x8A => FastSwitchAntennaInventory,
            0x8B => SessionInventory,
            0x8C => SetFastId,
            0x8D => SetSavedFastId,
            0x8E => GetFastId,
            0x8F => GetAntennaSwitchingSequence,
            0x90 => GetInventoryBuffer,
            0x91 => GetAndResetInventoryBuffer,
            0x92 => GetInventoryBufferTagCount,
            0x93 => ResetInventoryBuffer,
            0x94 => WriteBlock,
            0x97 => GetOutputPower8P,
            0x98 => TagMask,
            0xA0 => SetModuleFunction,
            0xA1 => GetModuleFunction,
            0xB0 => Iso6bInventory,
            0xB1 => Iso6bRead,
            0xB2 => Iso6bWrite,
            0xB3 => Iso6bLock,
            0xB4 => Iso6bQueryLock,
            _ => return Err(()),
        })
    }
}

/// Which per-peer accumulator queue (C7) a multi-packet reply feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    Masks,
    InventoryBuffer,
    Read,
    Write,
    Lock,
    Kill,
}

/// A reader-reported status byte. Kept as a newtype rather than a closed
/// enum because the `PARAMETER_INVALID` family occupies a whole range
/// (0x41..=0x4F) and unknown codes must still round-trip to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u8);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0x10);
    pub const FAIL: ErrorCode = ErrorCode(0x11);
    pub const MCU_RESET_ERROR: ErrorCode = ErrorCode(0x20);
    pub const CW_ON_ERROR: ErrorCode = ErrorCode(0x21);
    pub const ANTENNA_MISSING: ErrorCode = ErrorCode(0x22);
    pub const WRITE_FLASH: ErrorCode = ErrorCode(0x23);
    pub const READ_FLASH: ErrorCode = ErrorCode(0x24);
    pub const SET_POWER_ERR: ErrorCode = ErrorCode(0x25);
    pub const TAG_INVENTORY_ERR: ErrorCode = ErrorCode(0x31);
    pub const TAG_READ_ERR: ErrorCode = ErrorCode(0x32);
    pub const TAG_WRITE_ERR: ErrorCode = ErrorCode(0x33);
    pub const TAG_LOCK_ERR: ErrorCode = ErrorCode(0x34);
    pub const TAG_KILL_ERR: ErrorCode = ErrorCode(0x35);
    pub const NO_TAG: ErrorCode = ErrorCode(0x36);
    pub const INV_OK_ACCESS_FAIL: ErrorCode = ErrorCode(0x37);
    pub const BUFFER_EMPTY: ErrorCode = ErrorCode(0x38);
    pub const NXP_FAIL: ErrorCode = ErrorCode(0x3C);
    pub const ACCESS_OR_PASSWORD: ErrorCode = ErrorCode(0x40);
    pub const PLL_FAIL: ErrorCode = ErrorCode(0x52);
    pub const RF_CHIP_NO_RESPONSE: ErrorCode = ErrorCode(0x53);
    pub const OUTPUT_POWER_LOW: ErrorCode = ErrorCode(0x57);
    pub const FAIL_GET_RF_PORT_RETURN_LOSS: ErrorCode = ErrorCode(0xEE);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_parameter_invalid(self) -> bool {
        (0x41..=0x4F).contains(&self.0)
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0x10 => "SUCCESS",
            0x11 => "FAIL",
            0x20 => "MCU_RESET_ERROR",
            0x21 => "CW_ON_ERROR",
            0x22 => "ANTENNA_MISSING",
            0x23 => "WRITE_FLASH",
            0x24 => "READ_FLASH",
            0x25 => "SET_POWER_ERR",
            0x31 => "TAG_INVENTORY_ERR",
            0x32 => "TAG_READ_ERR",
            0x33 => "TAG_WRITE_ERR",
            0x34 => "TAG_LOCK_ERR",
            0x35 => "TAG_KILL_ERR",
            0x36 => "NO_TAG",
            0x37 => "INV_OK_ACCESS_FAIL",
            0x38 => "BUFFER_EMPTY",
            0x3C => "NXP_FAIL",
            0x40 => "ACCESS_OR_PASSWORD",
            n if (0x41..=0x4F).contains(&n) => "PARAMETER_INVALID",
            0x52 => "PLL_FAIL",
            0x53 => "RF_CHIP_NO_RESPONSE",
            0x57 => "OUTPUT_POWER_LOW",
            0xEE => "FAIL_GET_RF_PORT_RETURN_LOSS",
            _ => "UNKNOWN",
        }
    }
}

/// `0xFF` is the broadcast/public peer address (§3).
pub const BROADCAST_ADDRESS: u8 = 0xFF;

pub const HEADER: u8 = 0xA0;

/// RSSI field bias: raw 7-bit magnitude plus this offset gives dBm.
pub const RSSI_OFFSET: i16 = -129;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AntennaId {
    A1 = 0,
    A2 = 1,
    A3 = 2,
    A4 = 3,
    A5 = 4,
    A6 = 5,
    A7 = 6,
    A8 = 7,
    Disabled = 0xFF,
}

impl AntennaId {
    pub fn from_index(index: u8) -> Self {
        use AntennaId::*;
        match index {
            0 => A1,
            1 => A2,
            2 => A3,
            3 => A4,
            4 => A5,
            5 => A6,
            6 => A7,
            7 => A8,
            _ => Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    Reserved = 0,
    Epc = 1,
    Tid = 2,
    User = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockMemoryBank {
    Reserved = 0,
    User = 1,
    Tid = 2,
    Epc = 3,
    AccessPwd = 4,
    KillPwd = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockType {
    Open = 0,
    Lock = 1,
    PermanentOpen = 2,
    PermanentLock = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeeperMode {
    Quiet,
    Inventory,
    Tag,
}

impl BeeperMode {
    pub fn to_byte(self) -> u8 {
        match self {
            BeeperMode::Quiet => 0,
            BeeperMode::Inventory => 1,
            BeeperMode::Tag => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Session {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InventoriedFlag {
    A = 0,
    B = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RfLinkProfile {
    P0 = 0xD0,
    P1 = 0xD1,
    P2 = 0xD2,
    P3 = 0xD3,
}

impl RfLinkProfile {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xD0 => Some(RfLinkProfile::P0),
            0xD1 => Some(RfLinkProfile::P1),
            0xD2 => Some(RfLinkProfile::P2),
            0xD3 => Some(RfLinkProfile::P3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FastIdMode {
    Disabled = 0x00,
    Enabled = 0x8D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BaudCode {
    B38400 = 3,
    B115200 = 4,
}

impl BaudCode {
    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudCode::B38400 => 38_400,
            BaudCode::B115200 => 115_200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrequencyRegion {
    Fcc = 1,
    Etsi = 2,
    Chn = 3,
    Custom = 4,
}

impl FrequencyRegion {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FrequencyRegion::Fcc),
            2 => Some(FrequencyRegion::Etsi),
            3 => Some(FrequencyRegion::Chn),
            4 => Some(FrequencyRegion::Custom),
            _ => None,
        }
    }

    /// Default `(start_index, end_index)` frequency-table range for this
    /// region (§4.6).
    pub fn default_index_range(self) -> Option<(u8, u8)> {
        match self {
            FrequencyRegion::Fcc => Some((7, 59)),
            FrequencyRegion::Etsi => Some((0, 6)),
            FrequencyRegion::Chn => Some((43, 53)),
            FrequencyRegion::Custom => None,
        }
    }
}

/// Number of entries in the fixed frequency table (§3).
pub const FREQUENCY_TABLE_LEN: usize = 60;

/// `865.0 + 0.5*k MHz` for k=0..6, then `902.0 + 0.5*k MHz` for k=0..52.
pub fn frequency_mhz(index: u8) -> Option<f32> {
    match index {
        0..=6 => Some(865.0 + 0.5 * index as f32),
        7..=59 => Some(902.0 + 0.5 * (index - 7) as f32),
        _ => None,
    }
}

pub fn frequency_table() -> [f32; FREQUENCY_TABLE_LEN] {
    let mut table = [0.0f32; FREQUENCY_TABLE_LEN];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = frequency_mhz(i as u8).expect("index within table bounds");
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_table_has_60_entries_and_matches_formula() {
        let table = frequency_table();
        assert_eq!(table.len(), 60);
        assert!((table[0] - 865.0).abs() < f32::EPSILON);
        assert!((table[6] - 868.0).abs() < f32::EPSILON);
        assert!((table[7] - 902.0).abs() < f32::EPSILON);
        assert!((table[59] - 928.0).abs() < f32::EPSILON);
        assert_eq!(frequency_mhz(60), None);
    }

    #[test]
    fn command_round_trips_through_opcode() {
        for &(opcode, cmd) in &[
            (0x70u8, Command::Reset),
            (0x89, Command::RealTimeInventory),
            (0xB4, Command::Iso6bQueryLock),
        ] {
            assert_eq!(Command::try_from(opcode), Ok(cmd));
            assert_eq!(cmd.opcode(), opcode);
        }
        assert_eq!(Command::try_from(0xFFu8), Err(()));
    }

    #[test]
    fn error_code_classifies_parameter_invalid_range() {
        assert!(ErrorCode(0x45).is_parameter_invalid());
        assert!(!ErrorCode(0x50).is_parameter_invalid());
        assert_eq!(ErrorCode(0x45).name(), "PARAMETER_INVALID");
    }
}
