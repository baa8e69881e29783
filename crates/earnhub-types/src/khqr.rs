//! Bakong KHQR merchant payload: tag-length-value fields plus CRC-16 trailer.
//!
//! Output is bit-exact: identical inputs always produce the identical string.

use crate::{Money, TypesError};

const TAG_FORMAT_INDICATOR: &str = "00";
const TAG_POINT_OF_INITIATION: &str = "01";
const TAG_MERCHANT_ACCOUNT: &str = "29";
const TAG_CATEGORY_CODE: &str = "52";
const TAG_CURRENCY: &str = "53";
const TAG_AMOUNT: &str = "54";
const TAG_COUNTRY: &str = "58";
const TAG_MERCHANT_NAME: &str = "59";
const TAG_CITY: &str = "60";

const SUB_TAG_GUID: &str = "00";
const SUB_TAG_MERCHANT_ID: &str = "01";

const FORMAT_INDICATOR: &str = "01";
const DYNAMIC_QR: &str = "12";
const BAKONG_GUID: &str = "kh.com.bakong";
const CATEGORY_CODE: &str = "5999";
const CURRENCY_USD: &str = "840";
const COUNTRY: &str = "KH";
const CITY: &str = "PHNOM PENH";

/// Checksum tag id plus its fixed length, appended before the CRC is computed.
const CRC_PREFIX: &str = "6304";
const CRC_HEX_LEN: usize = 4;

const MAX_VALUE_LEN: usize = 99;

/// Encode a dynamic merchant payload. The amount is rendered with two decimals.
pub fn encode(merchant_id: &str, amount: Money, merchant_name: &str) -> Result<String, TypesError> {
    let mut account = String::new();
    push_field(&mut account, SUB_TAG_GUID, BAKONG_GUID)?;
    push_field(&mut account, SUB_TAG_MERCHANT_ID, merchant_id)?;

    let mut payload = String::with_capacity(128);
    push_field(&mut payload, TAG_FORMAT_INDICATOR, FORMAT_INDICATOR)?;
    push_field(&mut payload, TAG_POINT_OF_INITIATION, DYNAMIC_QR)?;
    push_field(&mut payload, TAG_MERCHANT_ACCOUNT, &account)?;
    push_field(&mut payload, TAG_CATEGORY_CODE, CATEGORY_CODE)?;
    push_field(&mut payload, TAG_CURRENCY, CURRENCY_USD)?;
    push_field(&mut payload, TAG_AMOUNT, &amount.format_cents())?;
    push_field(&mut payload, TAG_COUNTRY, COUNTRY)?;
    push_field(&mut payload, TAG_MERCHANT_NAME, merchant_name)?;
    push_field(&mut payload, TAG_CITY, CITY)?;
    payload.push_str(CRC_PREFIX);

    let crc = crc16_ccitt_false(payload.as_bytes());
    payload.push_str(&format!("{crc:04X}"));
    Ok(payload)
}

/// Recompute the trailer over everything before it and compare.
pub fn verify(payload: &str) -> bool {
    if payload.len() < CRC_PREFIX.len() + CRC_HEX_LEN || !payload.is_ascii() {
        return false;
    }
    let (body, trailer) = payload.split_at(payload.len() - CRC_HEX_LEN);
    if !body.ends_with(CRC_PREFIX) {
        return false;
    }
    match u16::from_str_radix(trailer, 16) {
        Ok(expected) => {
            trailer.bytes().all(|b| !b.is_ascii_lowercase())
                && crc16_ccitt_false(body.as_bytes()) == expected
        }
        Err(_) => false,
    }
}

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, MSB first, no final XOR.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn push_field(out: &mut String, tag: &'static str, value: &str) -> Result<(), TypesError> {
    let len = value.len();
    if len > MAX_VALUE_LEN {
        return Err(TypesError::FieldTooLong { tag, len });
    }
    out.push_str(tag);
    out.push_str(&format!("{len:02}"));
    out.push_str(value);
    Ok(())
}
