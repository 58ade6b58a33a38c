//! Versioned binary frames.
//!
//! Every persisted artifact (vectorized record slots, vectorizer snapshots)
//! is written as one frame:
//!
//! ```text
//! magic[4] | version: u32 LE | payload_len: u32 LE | payload | crc32(payload): u32 LE
//! ```
//!
//! The payload is the bincode (standard config) encoding of a serde value.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{LexiclassError, Result};

/// Largest payload accepted when reading a frame.
pub const MAX_FRAME_PAYLOAD: u32 = 1 << 30;

/// Encode a serde value with the crate-wide bincode configuration.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| LexiclassError::serialization(format!("Failed to encode payload: {e}")))
}

/// Decode a serde value encoded by [`encode_payload`].
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| LexiclassError::serialization(format!("Failed to decode payload: {e}")))?;
    Ok(value)
}

/// Write `value` as a frame.
pub fn write_frame<W: Write + ?Sized, T: Serialize>(
    writer: &mut W,
    magic: &[u8; 4],
    version: u32,
    value: &T,
) -> Result<()> {
    let payload = encode_payload(value)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_PAYLOAD)
        .ok_or_else(|| LexiclassError::serialization("frame payload too large"))?;

    writer.write_all(magic)?;
    writer.write_u32::<LittleEndian>(version)?;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(&payload)?;
    writer.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    Ok(())
}

/// Read a frame written by [`write_frame`], verifying magic, version and checksum.
pub fn read_frame<R: Read + ?Sized, T: DeserializeOwned>(
    reader: &mut R,
    magic: &[u8; 4],
    version: u32,
) -> Result<T> {
    let mut found = [0u8; 4];
    reader.read_exact(&mut found)?;
    if &found != magic {
        return Err(LexiclassError::data(format!(
            "bad frame magic {found:?}, expected {magic:?}"
        )));
    }

    let found_version = reader.read_u32::<LittleEndian>()?;
    if found_version != version {
        return Err(LexiclassError::data(format!(
            "unsupported frame version {found_version}, expected {version}"
        )));
    }

    let len = reader.read_u32::<LittleEndian>()?;
    if len > MAX_FRAME_PAYLOAD {
        return Err(LexiclassError::data(format!("frame payload length {len} too large")));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;

    let checksum = reader.read_u32::<LittleEndian>()?;
    if checksum != crc32fast::hash(&payload) {
        return Err(LexiclassError::data("frame checksum mismatch"));
    }

    decode_payload(&payload)
}
