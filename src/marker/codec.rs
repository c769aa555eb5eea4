//! Binary encoding of marker keys and values
//!
//! Key format:
//! - partition (u32 LE)
//! - offset (u64 LE)
//!
//! Value format:
//! - tag (u8): START = 0, COMPLETE = 1
//! - for START only:
//!   - message partition (u32 LE)
//!   - message offset (u64 LE)
//!   - started_at (u64 LE)

use std::io::{self, Read, Write};

use super::{MarkerKey, MarkerValue, MessageRef, StartMarker};

const TAG_START: u8 = 0;
const TAG_COMPLETE: u8 = 1;

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write a marker key
pub fn encode_key<W: Write>(key: &MarkerKey, writer: &mut W) -> io::Result<()> {
    writer.write_all(&key.partition.to_le_bytes())?;
    writer.write_all(&key.offset.to_le_bytes())?;
    Ok(())
}

/// Read a marker key
pub fn decode_key<R: Read>(reader: &mut R) -> io::Result<MarkerKey> {
    let partition = read_u32(reader)?;
    let offset = read_u64(reader)?;
    Ok(MarkerKey::new(partition, offset))
}

/// Write a marker value
pub fn encode_value<W: Write>(value: &MarkerValue, writer: &mut W) -> io::Result<()> {
    match value {
        MarkerValue::Start(start) => {
            writer.write_all(&[TAG_START])?;
            writer.write_all(&start.message.partition.to_le_bytes())?;
            writer.write_all(&start.message.offset.to_le_bytes())?;
            writer.write_all(&start.started_at.to_le_bytes())?;
        }
        MarkerValue::Complete => {
            writer.write_all(&[TAG_COMPLETE])?;
        }
    }
    Ok(())
}

/// Read a marker value
pub fn decode_value<R: Read>(reader: &mut R) -> io::Result<MarkerValue> {
    let mut tag = [0u8; 1];
    reader.read_exact(&mut tag)?;

    match tag[0] {
        TAG_START => {
            let partition = read_u32(reader)?;
            let offset = read_u64(reader)?;
            let started_at = read_u64(reader)?;
            Ok(MarkerValue::Start(StartMarker::new(
                MessageRef::new(partition, offset),
                started_at,
            )))
        }
        TAG_COMPLETE => Ok(MarkerValue::Complete),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid marker tag: {}", other),
        )),
    }
}
