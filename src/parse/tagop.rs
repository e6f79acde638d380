//! Parsers for the `READ` reply record and the shared `WRITE` / `WRITE_BLOCK`
//! / `LOCK` / `KILL` reply record shape (§4.5).

use super::PayloadTooShort;
use crate::catalog::ErrorCode;
use crate::codec::{read_u16_be, tag_crc_valid};
use crate::model::{decode_antenna_freq_rssi, ProtocolControl, ReadRecord, TagOpRecord};

/// `READ`'s reply record: like the buffered-inventory record, but with an
/// extra variable-length `data` region (the words actually read from the
/// tag) inserted between the CRC and the two trailing fields. `data[-3]`
/// gives the byte length of that region; it occupies the bytes
/// immediately preceding the final `{antennaFreq, count}` pair.
pub fn parse_read_record(data: &[u8]) -> Result<(ReadRecord, u16), PayloadTooShort> {
    if data.len() < 11 {
        return Err(PayloadTooShort);
    }
    let total_count = read_u16_be(&data[0..2]);
    let pc = ProtocolControl::parse(read_u16_be(&data[3..5]));

    let data_len = data[data.len() - 3] as usize;
    let tail_start = data.len() - 3 - data_len;
    if tail_start < 5 + 2 {
        return Err(PayloadTooShort);
    }

    let crc_carried = read_u16_be(&data[tail_start - 2..tail_start]);
    let epc = data[5..tail_start - 2].to_vec();
    let read_data = data[tail_start..data.len() - 3].to_vec();
    let pack = data[data.len() - 2];
    let count = data[data.len() - 1];

    let mut pc_epc = Vec::with_capacity(2 + epc.len());
    pc_epc.extend_from_slice(&data[3..5]);
    pc_epc.extend_from_slice(&epc);
    let crc_valid = tag_crc_valid(&pc_epc, crc_carried);
    if !crc_valid {
        log::debug!("read record CRC mismatch, reporting tag anyway");
    }

    // Antenna/frequency packing on a read record has no adjacent RSSI byte
    // (the reader has already reported RSSI during the inventory that
    // located the tag); decode against the record's own error/retry slot,
    // which carries no high antenna bit, so only the low two bits apply.
    let (antenna, frequency_index, _) = decode_antenna_freq_rssi(pack, 0);

    Ok((
        ReadRecord {
            pc,
            epc,
            crc_valid,
            data: read_data,
            antenna,
            frequency_index,
            count,
        },
        total_count,
    ))
}

/// Shared `WRITE` / `WRITE_BLOCK` / `LOCK` / `KILL` reply record: PC+EPC+CRC
/// as in the buffered record, but the trailing triple is
/// `{errorCode, antennaFreq, retryCount}` rather than `{rssi, antennaFreq, count}`.
pub fn parse_tag_op_record(data: &[u8]) -> Result<(TagOpRecord, u16), PayloadTooShort> {
    if data.len() < 10 {
        return Err(PayloadTooShort);
    }
    let total_count = read_u16_be(&data[0..2]);
    let pc = ProtocolControl::parse(read_u16_be(&data[3..5]));
    let epc = data[5..data.len() - 5].to_vec();
    let crc_carried = read_u16_be(&data[data.len() - 5..data.len() - 3]);
    let error_code = ErrorCode(data[data.len() - 3]);
    let pack = data[data.len() - 2];
    let retry_count = data[data.len() - 1];

    let mut pc_epc = Vec::with_capacity(2 + epc.len());
    pc_epc.extend_from_slice(&data[3..5]);
    pc_epc.extend_from_slice(&epc);
    let crc_valid = tag_crc_valid(&pc_epc, crc_carried);
    if !crc_valid {
        log::debug!("tag-op record CRC mismatch, reporting record anyway");
    }

    let (antenna, frequency_index, _) = decode_antenna_freq_rssi(pack, 0);

    Ok((
        TagOpRecord {
            pc,
            epc,
            crc_valid,
            error_code,
            antenna,
            frequency_index,
            retry_count,
        },
        total_count,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc_epc_bytes() -> (u16, Vec<u8>) {
        (0x1800, vec![0xE2, 0x00, 0x11, 0x22, 0x33, 0x44])
    }

    #[test]
    fn parses_read_record_with_data_region() {
        let (pc_raw, epc) = pc_epc_bytes();
        let mut pc_epc = pc_raw.to_be_bytes().to_vec();
        pc_epc.extend_from_slice(&epc);
        let crc = crate::codec::crc16_ccitt(&pc_epc) ^ 0xFFFF;
        let read_data = vec![0xAA, 0xBB, 0xCC, 0xDD];

        let mut data = 1u16.to_be_bytes().to_vec();
        data.push(11);
        data.extend_from_slice(&pc_raw.to_be_bytes());
        data.extend_from_slice(&epc);
        data.extend_from_slice(&crc.to_be_bytes());
        data.push(read_data.len() as u8);
        data.extend_from_slice(&read_data);
        data.push(0x00); // antenna+freq pack
        data.push(0); // count

        let (record, total_count) = parse_read_record(&data).unwrap();
        assert_eq!(total_count, 1);
        assert!(record.crc_valid);
        assert_eq!(record.data, read_data);
        assert_eq!(record.epc, epc);
    }

    #[test]
    fn parses_write_record_with_error_code() {
        let (pc_raw, epc) = pc_epc_bytes();
        let mut pc_epc = pc_raw.to_be_bytes().to_vec();
        pc_epc.extend_from_slice(&epc);
        let crc = crate::codec::crc16_ccitt(&pc_epc) ^ 0xFFFF;

        let mut data = 1u16.to_be_bytes().to_vec();
        data.push(11);
        data.extend_from_slice(&pc_raw.to_be_bytes());
        data.extend_from_slice(&epc);
        data.extend_from_slice(&crc.to_be_bytes());
        data.push(0x10); // SUCCESS
        data.push(0x00);
        data.push(0);

        let (record, _) = parse_tag_op_record(&data).unwrap();
        assert!(record.crc_valid);
        assert_eq!(record.error_code, ErrorCode::SUCCESS);
    }
}
