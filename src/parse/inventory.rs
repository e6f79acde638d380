//! Parsers for the event-shaped packets: real-time/fast-switch/session
//! C1G2 tag sightings, ISO 18000-6B sightings, and antenna-missing events
//! (§4.5, §4.4 step 5).

use super::PayloadTooShort;
use crate::catalog::{AntennaId, ErrorCode};
use crate::codec::read_u16_be;
use crate::model::{decode_antenna_freq_rssi, AntennaMissing, InventoriedTag, Inventoried6BTag, ProtocolControl};

/// Parses one C1G2 sighting packet shared by `REAL_TIME_INVENTORY`,
/// `FAST_SWITCH_ANT_INVENTORY` and `CUSTOMIZED_SESSION_TARGET_INVENTORY`.
///
/// `phase_mode` reflects the engine-wide flag set by the most recent
/// start-inventory call (§4.6, §9 "phase mode side channel") — it is not
/// carried in the packet itself.
pub fn parse_tag_sighting(
    data: &[u8],
    phase_mode: bool,
) -> Result<InventoriedTag, PayloadTooShort> {
    let phase_offset = if phase_mode { 2 } else { 0 };
    let min_len = 3 + 1 + phase_offset;
    if data.len() < min_len {
        return Err(PayloadTooShort);
    }

    let rssi_index = data.len() - (1 + phase_offset);
    let pack = data[0];
    let pc = ProtocolControl::parse(read_u16_be(&data[1..3]));
    let epc = data[3..rssi_index].to_vec();
    let (antenna, frequency_index, rssi_dbm) = decode_antenna_freq_rssi(pack, data[rssi_index]);

    let phase_angle = if phase_mode {
        Some(read_u16_be(&data[data.len() - 2..]))
    } else {
        None
    };

    if pc.epc_length_bytes() != epc.len() {
        log::warn!(
            "tag sighting PC/EPC length mismatch: pc claims {} bytes, epc carries {} (reporting anyway)",
            pc.epc_length_bytes(),
            epc.len()
        );
    }

    Ok(InventoriedTag {
        antenna,
        frequency_index,
        pc,
        epc,
        rssi_dbm,
        phase_angle,
        count: None,
    })
}

/// `FAST_SWITCH_ANT_INVENTORY` with payload length 2 (wire `length == 5`):
/// an antenna reported missing mid-round.
pub fn parse_antenna_missing(data: &[u8]) -> Result<AntennaMissing, PayloadTooShort> {
    if data.len() < 2 {
        return Err(PayloadTooShort);
    }
    Ok(AntennaMissing {
        antenna: AntennaId::from_index(data[0]),
        error_code: ErrorCode(data[1]),
    })
}

/// `ISO18000_6B_INVENTORY` with payload length 9: a single 6B tag sighting.
pub fn parse_6b_sighting(data: &[u8]) -> Result<Inventoried6BTag, PayloadTooShort> {
    if data.len() < 9 {
        return Err(PayloadTooShort);
    }
    let mut uid = [0u8; 8];
    uid.copy_from_slice(&data[1..9]);
    Ok(Inventoried6BTag {
        antenna: AntennaId::from_index(data[0]),
        uid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_sighting_without_phase() {
        // pack=0x04 (antenna 0, freq 1), pc=0x1800 (3 words = 6 bytes epc),
        // 6-byte epc, rssi byte 0x15.
        let mut data = vec![0x04, 0x18, 0x00];
        data.extend_from_slice(&[0xE2, 0x00, 0x11, 0x22, 0x33, 0x44]);
        data.push(0x15);
        let tag = parse_tag_sighting(&data, false).unwrap();
        assert_eq!(tag.antenna, AntennaId::A1);
        assert_eq!(tag.frequency_index, 1);
        assert_eq!(tag.rssi_dbm, -108);
        assert_eq!(tag.epc.len(), 6);
        assert_eq!(tag.phase_angle, None);
    }

    #[test]
    fn parses_tag_sighting_with_phase_mode_shifted() {
        let mut data = vec![0x04, 0x18, 0x00];
        data.extend_from_slice(&[0xE2, 0x00, 0x11, 0x22, 0x33, 0x44]);
        data.push(0x15);
        data.extend_from_slice(&[0x00, 0x2A]); // phase angle = 42
        let tag = parse_tag_sighting(&data, true).unwrap();
        assert_eq!(tag.phase_angle, Some(42));
        assert_eq!(tag.epc.len(), 6);
        assert_eq!(tag.rssi_dbm, -108);
    }

    #[test]
    fn rejects_payload_too_short_for_a_sighting() {
        assert_eq!(parse_tag_sighting(&[0x04, 0x18], false), Err(PayloadTooShort));
    }

    #[test]
    fn parses_antenna_missing_event() {
        let missing = parse_antenna_missing(&[0x01, 0x22]).unwrap();
        assert_eq!(missing.antenna, AntennaId::A2);
        assert_eq!(missing.error_code, ErrorCode::ANTENNA_MISSING);
    }

    #[test]
    fn parses_6b_sighting() {
        let mut data = vec![0x00];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let tag = parse_6b_sighting(&data).unwrap();
        assert_eq!(tag.antenna, AntennaId::A1);
        assert_eq!(tag.uid, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
