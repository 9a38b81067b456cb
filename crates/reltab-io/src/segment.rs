//! Segment framing shared by saved tables and contexts.
//!
//! Layout:
//! [ magic: u32 ][ version: u16 ][ codec: u8 ][ kind: u8 ]
//! [ uncompressed_len: u64 ][ compressed_len: u64 ]
//! [ payload bytes … ][ blake3(header || payload): 32 bytes ]
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use crate::codec::{self, Codec};
use crate::error::{Error, Result};

pub const MAGIC: u32 = 0x5254_4142; // "RTAB"
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 8 + 8;
pub const CHECKSUM_LEN: usize = 32;

/// Upper bound on either payload length accepted by `read_segment`.
pub const MAX_PAYLOAD_LEN: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentKind {
    Table = 1,
    Context = 2,
}

impl SegmentKind {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(SegmentKind::Table),
            2 => Ok(SegmentKind::Context),
            _ => Err(Error::Storage(format!("unknown segment kind {v}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub magic: u32,
    pub version: u16,
    pub codec: Codec,
    pub kind: SegmentKind,
    pub uncompressed_len: u64,
    pub compressed_len: u64,
}

fn le<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

impl SegmentHeader {
    pub fn new(codec: Codec, kind: SegmentKind, uncompressed_len: u64, compressed_len: u64) -> Self {
        Self { magic: MAGIC, version: VERSION, codec, kind, uncompressed_len, compressed_len }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6] = self.codec as u8;
        out[7] = self.kind as u8;
        out[8..16].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        out[16..24].copy_from_slice(&self.compressed_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Storage("short header".into()));
        }
        let magic = u32::from_le_bytes(le(bytes, 0));
        let version = u16::from_le_bytes(le(bytes, 4));
        if magic != MAGIC || version != VERSION {
            return Err(Error::Storage(format!("bad magic/version {magic:#x}/{version}")));
        }
        Ok(Self {
            magic,
            version,
            codec: Codec::from_u8(bytes[6])?,
            kind: SegmentKind::from_u8(bytes[7])?,
            uncompressed_len: u64::from_le_bytes(le(bytes, 8)),
            compressed_len: u64::from_le_bytes(le(bytes, 16)),
        })
    }

    /// Reject lengths that would make a corrupt header allocate unbounded
    /// memory.
    pub fn validate_sizes(&self, max_uncompressed: u64, max_compressed: u64) -> Result<()> {
        if self.uncompressed_len > max_uncompressed {
            return Err(Error::Storage(format!(
                "uncompressed_len {} exceeds max {}",
                self.uncompressed_len, max_uncompressed
            )));
        }
        if self.compressed_len > max_compressed {
            return Err(Error::Storage(format!(
                "compressed_len {} exceeds max {}",
                self.compressed_len, max_compressed
            )));
        }
        if self.codec == Codec::None && self.compressed_len != self.uncompressed_len {
            return Err(Error::Storage("uncompressed segment with differing lengths".into()));
        }
        Ok(())
    }
}

/// Frame `payload` and write it. Returns the number of bytes written.
pub fn write_segment<W: Write>(
    out: &mut W,
    kind: SegmentKind,
    codec: Codec,
    payload: &[u8],
) -> Result<u64> {
    let packed = codec::compress(codec, payload)?;
    let header = SegmentHeader::new(codec, kind, payload.len() as u64, packed.len() as u64);
    let header_bytes = header.to_bytes();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&header_bytes);
    hasher.update(&packed);
    let checksum: [u8; 32] = hasher.finalize().into();

    out.write_all(&header_bytes)?;
    out.write_all(&packed)?;
    out.write_all(&checksum)?;
    out.flush()?;
    Ok((HEADER_LEN + packed.len() + CHECKSUM_LEN) as u64)
}

fn read_exact_or<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Storage(format!("segment ends inside {what}")),
        _ => Error::Storage(format!("read {what}: {e}")),
    })
}

/// Read one segment of the expected kind and return its decompressed payload.
pub fn read_segment<R: Read>(input: &mut R, expected: SegmentKind) -> Result<Vec<u8>> {
    let mut header_bytes = [0u8; HEADER_LEN];
    read_exact_or(input, &mut header_bytes, "header")?;
    let header = SegmentHeader::from_bytes(&header_bytes)?;
    if header.kind != expected {
        return Err(Error::Storage(format!(
            "expected a {expected:?} segment, found {:?}",
            header.kind
        )));
    }
    header.validate_sizes(MAX_PAYLOAD_LEN, MAX_PAYLOAD_LEN)?;

    let mut packed = vec![0u8; header.compressed_len as usize];
    read_exact_or(input, &mut packed, "payload")?;
    let mut stored = [0u8; CHECKSUM_LEN];
    read_exact_or(input, &mut stored, "checksum")?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&header_bytes);
    hasher.update(&packed);
    let computed: [u8; 32] = hasher.finalize().into();
    if computed != stored {
        return Err(Error::ChecksumMismatch);
    }

    let payload = codec::decompress(header.codec, &packed)?;
    if payload.len() as u64 != header.uncompressed_len {
        return Err(Error::Codec(format!(
            "decompressed {} bytes, header says {}",
            payload.len(),
            header.uncompressed_len
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_segment(&mut buf, SegmentKind::Table, Codec::None, payload).unwrap();
        buf
    }

    #[test]
    fn header_layout() {
        let h = SegmentHeader::new(Codec::Lz4, SegmentKind::Context, 10, 7);
        let bytes = h.to_bytes();
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(bytes[6], 2);
        assert_eq!(bytes[7], 2);
        assert_eq!(SegmentHeader::from_bytes(&bytes).unwrap(), h);
    }

    #[test]
    fn frame_roundtrip() {
        let buf = framed(b"hello");
        assert_eq!(buf.len(), HEADER_LEN + 5 + CHECKSUM_LEN);
        assert_eq!(read_segment(&mut buf.as_slice(), SegmentKind::Table).unwrap(), b"hello");
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut buf = framed(b"hello");
        buf[HEADER_LEN + 1] ^= 0xFF;
        assert!(matches!(
            read_segment(&mut buf.as_slice(), SegmentKind::Table),
            Err(Error::ChecksumMismatch)
        ));
    }

    #[test]
    fn rejects_bad_framing() {
        let buf = framed(b"hello");
        assert!(read_segment(&mut &buf[..buf.len() - 1], SegmentKind::Table).is_err());
        assert!(read_segment(&mut &buf[..3], SegmentKind::Table).is_err());
        assert!(read_segment(&mut buf.as_slice(), SegmentKind::Context).is_err());

        let mut bad_magic = buf.clone();
        bad_magic[0] ^= 1;
        assert!(matches!(
            read_segment(&mut bad_magic.as_slice(), SegmentKind::Table),
            Err(Error::Storage(_))
        ));

        let mut huge = buf;
        huge[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(read_segment(&mut huge.as_slice(), SegmentKind::Table).is_err());
    }
}
