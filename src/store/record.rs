//! Marker log record format
//!
//! Each record contains:
//! - Record Length (u32 LE), total length including this field
//! - Record Type (u8): PUT / DELETE
//! - Sequence Number (u64 LE)
//! - Payload: marker key, followed by the marker value for PUT
//! - Checksum (u32 LE)

use std::io::{self, Cursor};

use crate::marker::{decode_key, decode_value, encode_key, encode_value, MarkerKey, MarkerValue};

use super::checksum::compute_checksum;

/// Length prefix + type + sequence number
const HEADER_SIZE: usize = 4 + 1 + 8;

/// Encoded marker key
const KEY_SIZE: usize = 4 + 8;

const CHECKSUM_SIZE: usize = 4;

/// Smallest valid record: a DELETE
pub const MIN_RECORD_SIZE: usize = HEADER_SIZE + KEY_SIZE + CHECKSUM_SIZE;

/// Encoded Start value: tag, partition, offset, started_at
const START_VALUE_SIZE: usize = 1 + 4 + 8 + 8;

/// Encoded Complete value: tag only
const COMPLETE_VALUE_SIZE: usize = 1;

/// Returns true if `len` is the size of some record this format can
/// produce: a DELETE, a PUT of a Complete value, or a PUT of a Start value.
pub fn is_valid_record_length(len: usize) -> bool {
    len == MIN_RECORD_SIZE
        || len == MIN_RECORD_SIZE + COMPLETE_VALUE_SIZE
        || len == MIN_RECORD_SIZE + START_VALUE_SIZE
}

/// Marker log record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Marker stored or replaced
    Put = 0,
    /// Marker removed
    Delete = 1,
}

impl RecordType {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordType::Put),
            1 => Some(RecordType::Delete),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One entry of the marker log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// PUT or DELETE
    pub record_type: RecordType,
    /// Monotonic position in the log (starts at 1)
    pub sequence_number: u64,
    /// Affected marker
    pub key: MarkerKey,
    /// New value; `None` for DELETE
    pub value: Option<MarkerValue>,
}

impl StoreRecord {
    /// Create a PUT record
    pub fn put(sequence_number: u64, key: MarkerKey, value: MarkerValue) -> Self {
        Self {
            record_type: RecordType::Put,
            sequence_number,
            key,
            value: Some(value),
        }
    }

    /// Create a DELETE record
    pub fn delete(sequence_number: u64, key: MarkerKey) -> Self {
        Self {
            record_type: RecordType::Delete,
            sequence_number,
            key,
            value: None,
        }
    }

    fn serialize_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 + KEY_SIZE + START_VALUE_SIZE);

        buf.push(self.record_type.as_u8());
        buf.extend_from_slice(&self.sequence_number.to_le_bytes());
        // Writes into a Vec cannot fail
        let _ = encode_key(&self.key, &mut buf);
        if let Some(ref value) = self.value {
            let _ = encode_value(value, &mut buf);
        }

        buf
    }

    /// Serialize the complete record, including length prefix and checksum
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let record_length = (4 + body.len() + CHECKSUM_SIZE) as u32;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);

        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());

        record
    }

    /// Deserialize a record, verifying its checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if !is_valid_record_length(record_length) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - CHECKSUM_SIZE;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed_checksum = compute_checksum(&data[..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let record_type = RecordType::from_u8(data[4]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record type: {}", data[4]),
            )
        })?;

        let sequence_number = u64::from_le_bytes([
            data[5], data[6], data[7], data[8], data[9], data[10], data[11], data[12],
        ]);

        let payload = &data[HEADER_SIZE..checksum_offset];
        let mut cursor = Cursor::new(payload);
        let key = decode_key(&mut cursor)?;

        let value = match record_type {
            RecordType::Put => Some(decode_value(&mut cursor)?),
            RecordType::Delete => None,
        };

        if cursor.position() as usize != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Trailing bytes in payload: {} unused",
                    payload.len() - cursor.position() as usize
                ),
            ));
        }

        Ok((
            StoreRecord {
                record_type,
                sequence_number,
                key,
                value,
            },
            record_length,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MessageRef;

    fn start_record(seq: u64) -> StoreRecord {
        StoreRecord::put(
            seq,
            MarkerKey::new(1, 100),
            MarkerValue::start(MessageRef::new(1, 100), 5_000),
        )
    }

    #[test]
    fn test_only_encodable_lengths_are_valid() {
        let start = start_record(1).serialize().len();
        let complete = StoreRecord::put(1, MarkerKey::new(0, 1), MarkerValue::Complete)
            .serialize()
            .len();
        let delete = StoreRecord::delete(1, MarkerKey::new(0, 1)).serialize().len();

        for len in [start, complete, delete] {
            assert!(is_valid_record_length(len));
        }
        assert!(!is_valid_record_length(start + 1));
        assert!(!is_valid_record_length(start + 256));
        assert!(!is_valid_record_length(MIN_RECORD_SIZE - 1));
    }

    #[test]
    fn test_put_record_round_trip() {
        let record = start_record(3);
        let bytes = record.serialize();

        let (decoded, consumed) = StoreRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_delete_record_is_minimal() {
        let record = StoreRecord::delete(1, MarkerKey::new(0, 1));
        let bytes = record.serialize();
        assert_eq!(bytes.len(), MIN_RECORD_SIZE);

        let (decoded, _) = StoreRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded.value, None);
        assert_eq!(decoded.record_type, RecordType::Delete);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut bytes = start_record(1).serialize();
        bytes[HEADER_SIZE + 2] ^= 0xFF;

        let err = StoreRecord::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_truncated_record_detected() {
        let bytes = start_record(1).serialize();
        let err = StoreRecord::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_invalid_type_detected() {
        let record = StoreRecord::delete(1, MarkerKey::new(0, 1));
        let mut bytes = record.serialize();
        bytes[4] = 9;
        // Re-seal so only the type byte is wrong
        let checksum_offset = bytes.len() - CHECKSUM_SIZE;
        let checksum = compute_checksum(&bytes[..checksum_offset]);
        bytes[checksum_offset..].copy_from_slice(&checksum.to_le_bytes());

        let err = StoreRecord::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid record type"));
    }
}
