// Confluent wire envelope: magic byte 0x00 followed by the big-endian
// schema id, then the raw Avro datum.

use thiserror::Error;

pub const MAGIC: u8 = 0x00;

/// Bytes before the Avro datum starts.
pub const HEADER_LEN: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("payload too short: {0} bytes")]
    TooShort(usize),

    #[error("bad magic byte: {0:#04x}")]
    BadMagic(u8),
}

pub fn wrap(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + datum.len());
    out.push(MAGIC);
    out.extend_from_slice(&schema_id.to_be_bytes());
    out.extend_from_slice(datum);
    out
}

pub fn unwrap(payload: &[u8]) -> Result<(u32, &[u8]), EnvelopeError> {
    if payload.len() < HEADER_LEN {
        return Err(EnvelopeError::TooShort(payload.len()));
    }
    if payload[0] != MAGIC {
        return Err(EnvelopeError::BadMagic(payload[0]));
    }
    let schema_id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Ok((schema_id, &payload[HEADER_LEN..]))
}

#[cfg(test)]
mod envelope_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn it_should_round_trip_the_header() {
        let wrapped = wrap(42, b"datum");
        assert_eq!(wrapped[0], 0x00);
        let (schema_id, datum) = unwrap(&wrapped).unwrap();
        assert_eq!(schema_id, 42);
        assert_eq!(datum, b"datum");
    }

    #[rstest]
    fn it_should_encode_the_schema_id_big_endian() {
        let wrapped = wrap(0x0102_0304, &[]);
        assert_eq!(&wrapped[1..5], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[rstest]
    fn it_should_reject_short_payloads() {
        assert_eq!(unwrap(&[0x00, 0x01]), Err(EnvelopeError::TooShort(2)));
    }

    #[rstest]
    fn it_should_reject_a_wrong_magic_byte() {
        let mut wrapped = wrap(1, b"x");
        wrapped[0] = 0x7f;
        assert_eq!(unwrap(&wrapped), Err(EnvelopeError::BadMagic(0x7f)));
    }
}
