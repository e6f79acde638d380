//! Parsers for the small fixed-shape reader-configuration replies:
//! `GET_FREQUENCY_REGION`, `GET_READER_TEMPERATURE`, `GET_OUTPUT_POWER`,
//! `GET_OUTPUT_POWER_8P` (§4.5).

use super::PayloadTooShort;
use crate::catalog::FrequencyRegion;
use crate::codec::read_u24_be;

/// Either the fixed region/index-range form, or (when `data[0]` is the
/// `CUSTOM` region code) the custom frequency-table form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyRegionReply {
    Fixed {
        region: FrequencyRegion,
        start_freq_index: u8,
        end_freq_index: u8,
    },
    Custom {
        freq_space_khz: u32,
        freq_quantity: u8,
        start_freq_khz: u32,
    },
}

pub fn parse_frequency_region_reply(data: &[u8]) -> Result<FrequencyRegionReply, PayloadTooShort> {
    if data.is_empty() {
        return Err(PayloadTooShort);
    }
    match FrequencyRegion::from_byte(data[0]) {
        Some(FrequencyRegion::Custom) => {
            if data.len() < 6 {
                return Err(PayloadTooShort);
            }
            Ok(FrequencyRegionReply::Custom {
                freq_space_khz: data[1] as u32 * 10,
                freq_quantity: data[2],
                start_freq_khz: read_u24_be(&data[3..6]),
            })
        }
        Some(region) => {
            if data.len() < 3 {
                return Err(PayloadTooShort);
            }
            Ok(FrequencyRegionReply::Fixed {
                region,
                start_freq_index: data[1],
                end_freq_index: data[2],
            })
        }
        None => {
            if data.len() < 3 {
                return Err(PayloadTooShort);
            }
            // Unknown region code: surface the raw index range rather than
            // failing outright, matching the reader's own tolerance for
            // undocumented region codes.
            Ok(FrequencyRegionReply::Fixed {
                region: FrequencyRegion::Custom,
                start_freq_index: data[1],
                end_freq_index: data[2],
            })
        }
    }
}

/// `GET_READER_TEMPERATURE`: `data[0]` is a sign flag (0 = negative, nonzero
/// = positive), `data[1]` the magnitude in whole degrees Celsius.
pub fn parse_temperature(data: &[u8]) -> Result<i16, PayloadTooShort> {
    if data.len() < 2 {
        return Err(PayloadTooShort);
    }
    let magnitude = data[1] as i16;
    Ok(if data[0] == 0 { -magnitude } else { magnitude })
}

/// `GET_OUTPUT_POWER`: a single byte broadcasts to all 4 antenna ports,
/// otherwise one byte per port.
pub fn parse_output_power(data: &[u8]) -> Result<[u8; 4], PayloadTooShort> {
    if data.is_empty() {
        return Err(PayloadTooShort);
    }
    if data.len() == 1 {
        return Ok([data[0]; 4]);
    }
    if data.len() < 4 {
        return Err(PayloadTooShort);
    }
    let mut power = [0u8; 4];
    power.copy_from_slice(&data[0..4]);
    Ok(power)
}

/// `GET_OUTPUT_POWER_8P`: the 8-antenna counterpart of [`parse_output_power`].
pub fn parse_output_power_8p(data: &[u8]) -> Result<[u8; 8], PayloadTooShort> {
    if data.is_empty() {
        return Err(PayloadTooShort);
    }
    if data.len() == 1 {
        return Ok([data[0]; 8]);
    }
    if data.len() < 8 {
        return Err(PayloadTooShort);
    }
    let mut power = [0u8; 8];
    power.copy_from_slice(&data[0..8]);
    Ok(power)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_region_reply() {
        let reply = parse_frequency_region_reply(&[0x01, 0x00, 0x13]).unwrap();
        assert_eq!(
            reply,
            FrequencyRegionReply::Fixed {
                region: FrequencyRegion::Fcc,
                start_freq_index: 0,
                end_freq_index: 0x13,
            }
        );
    }

    #[test]
    fn parses_custom_region_reply() {
        let custom_code = FrequencyRegion::Custom as u8;
        let data = [custom_code, 50, 10, 0x0C, 0x35, 0x00];
        let reply = parse_frequency_region_reply(&data).unwrap();
        match reply {
            FrequencyRegionReply::Custom {
                freq_space_khz,
                freq_quantity,
                start_freq_khz,
            } => {
                assert_eq!(freq_space_khz, 500);
                assert_eq!(freq_quantity, 10);
                assert_eq!(start_freq_khz, 0x000C3500);
            }
            other => panic!("expected custom reply, got {other:?}"),
        }
    }

    #[test]
    fn parses_negative_temperature() {
        assert_eq!(parse_temperature(&[0x00, 25]).unwrap(), -25);
        assert_eq!(parse_temperature(&[0x01, 25]).unwrap(), 25);
    }

    #[test]
    fn broadcasts_single_byte_output_power() {
        assert_eq!(parse_output_power(&[30]).unwrap(), [30, 30, 30, 30]);
        assert_eq!(
            parse_output_power(&[10, 20, 30, 40]).unwrap(),
            [10, 20, 30, 40]
        );
    }

    #[test]
    fn broadcasts_single_byte_output_power_8p() {
        assert_eq!(parse_output_power_8p(&[15]).unwrap(), [15; 8]);
    }
}
