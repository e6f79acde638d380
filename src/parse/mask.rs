//! Parser for `TAG_MASK`'s list form (`getTagMasks`).
//!
//! The wire table leaves the per-record shape of this list underspecified
//! beyond "an id byte followed by the mask bytes themselves" — there is no
//! length-prefix field distinguishing one record from the next the way the
//! inventory and tag-op records carry one. The minimal self-delimiting
//! shape used here (id, length, data) is an invented convention, recorded
//! as an open decision rather than lifted from the wire table.

use super::PayloadTooShort;
use crate::model::TagMaskRecord;

/// Parses one `{id, length, data}` record out of a `TAG_MASK` list reply.
/// Returns the record and the number of bytes it consumed, so a caller can
/// walk the whole list.
pub fn parse_tag_mask_record(data: &[u8]) -> Result<(TagMaskRecord, usize), PayloadTooShort> {
    if data.len() < 2 {
        return Err(PayloadTooShort);
    }
    let mask_id = data[0];
    let len = data[1] as usize;
    if data.len() < 2 + len {
        return Err(PayloadTooShort);
    }
    let record = TagMaskRecord {
        mask_id,
        data: data[2..2 + len].to_vec(),
    };
    Ok((record, 2 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_mask_record() {
        let data = [3u8, 4, 0xAA, 0xBB, 0xCC, 0xDD];
        let (record, consumed) = parse_tag_mask_record(&data).unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(record.mask_id, 3);
        assert_eq!(record.data, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn walks_a_list_of_records() {
        let data = [1u8, 2, 0x01, 0x02, 2u8, 1, 0xFF];
        let (first, consumed) = parse_tag_mask_record(&data).unwrap();
        assert_eq!(first.mask_id, 1);
        let (second, _) = parse_tag_mask_record(&data[consumed..]).unwrap();
        assert_eq!(second.mask_id, 2);
        assert_eq!(second.data, vec![0xFF]);
    }

    #[test]
    fn rejects_truncated_record() {
        assert_eq!(parse_tag_mask_record(&[1, 5, 0x00]), Err(PayloadTooShort));
    }
}
