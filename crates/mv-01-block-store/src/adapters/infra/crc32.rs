//! CRC32 (IEEE) block checksums backed by `crc32fast`.

use crate::ports::outbound::ChecksumProvider;
use std::io::{self, Read};

/// Read size when checksumming a block file in place.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32Checksum;

impl ChecksumProvider for Crc32Checksum {
    fn payload_checksum(&self, payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }

    fn stream_checksum(&self, source: &mut dyn Read) -> io::Result<u32> {
        let mut hasher = crc32fast::Hasher::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => return Ok(hasher.finalize()),
                Ok(n) => hasher.update(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_streamed_checksum_spans_chunks() {
        let payload: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        let crc = Crc32Checksum;

        let streamed = crc.stream_checksum(&mut Cursor::new(&payload)).unwrap();
        assert_eq!(streamed, crc.payload_checksum(&payload));
    }

    #[test]
    fn test_single_byte_change_is_detected() {
        let crc = Crc32Checksum;
        let before = crc.payload_checksum(b"block-0001");
        assert_ne!(before, crc.payload_checksum(b"block-0002"));
        assert_eq!(crc.stream_checksum(&mut Cursor::new(b"")).unwrap(), 0);
    }
}
