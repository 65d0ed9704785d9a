//! Wire level pieces of the echo transfer protocol.
//!
//! ```text
//!  host                                   target
//!   |------ length (4 bytes, BE) --------->|
//!   |<----- length echo -------------------|
//!   |------ chunk (<= chunk_size) -------->|
//!   |<----- chunk echo --------------------|
//!   |              ...                     |
//!   |<----- '#' ---------------------------|
//!   |------ 'D' -------------------------->|
//! ```

use std::convert::TryFrom;
use std::ops::Range;

use crate::error::TransferError;

/// Size of the length header.
pub const HEADER_LEN: usize = 4;

/// Maximum number of payload bytes per write unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Sent by the target once it received the whole payload.
pub const COMPLETION_MARKER: u8 = b'#';

/// Sent by the host after the completion marker, lets the target leave its
/// receive loop.
pub const ACKNOWLEDGMENT: u8 = b'D';

pub fn encode_length_header(len: u32) -> [u8; HEADER_LEN] {
    len.to_be_bytes()
}

pub fn decode_length_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// The header announcing a payload of `len` bytes.
pub fn header_for(len: usize) -> Result<[u8; HEADER_LEN], TransferError> {
    u32::try_from(len)
        .map(encode_length_header)
        .map_err(|_| TransferError::PayloadTooLarge(len))
}

/// Split `0..total_len` into consecutive ranges of at most `chunk_size` bytes.
/// Only the last range may be shorter. An empty payload has no chunks.
pub fn split_into_chunks(total_len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    assert!(chunk_size > 0, "chunk size must be at least 1");
    let count = total_len / chunk_size + (total_len % chunk_size != 0) as usize;
    let mut out = Vec::with_capacity(count);
    let mut start = 0;
    while start < total_len {
        let end = start + chunk_size.min(total_len - start);
        out.push(start..end);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        for &len in &[0u32, 1, 255, 256, 2500, 65_535, 1 << 24, u32::MAX - 1, u32::MAX] {
            assert_eq!(decode_length_header(encode_length_header(len)), len);
        }
    }

    #[test]
    fn header_is_big_endian() {
        assert_eq!(encode_length_header(2500), [0x00, 0x00, 0x09, 0xC4]);
        assert_eq!(encode_length_header(0), [0, 0, 0, 0]);
        assert_eq!(encode_length_header(0x0102_0304), [1, 2, 3, 4]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn header_rejects_oversized_payload() {
        let len = u32::MAX as usize + 1;
        assert!(matches!(
            header_for(len),
            Err(TransferError::PayloadTooLarge(l)) if l == len
        ));
        assert_eq!(header_for(u32::MAX as usize).unwrap(), [0xFF; 4]);
    }

    #[test]
    fn chunks_partition_the_payload() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(2_345).collect();
        for &size in &[1, 7, 100, 1000, 2_345, 4_096] {
            let chunks = split_into_chunks(payload.len(), size);
            let rebuilt: Vec<u8> = chunks
                .iter()
                .flat_map(|r| payload[r.clone()].iter().copied())
                .collect();
            assert_eq!(rebuilt, payload, "chunk size {}", size);

            let expected_last = match payload.len() % size {
                0 => size.min(payload.len()),
                rem => rem,
            };
            assert_eq!(chunks.last().map(|r| r.len()), Some(expected_last));
            assert!(chunks.iter().all(|r| !r.is_empty() && r.len() <= size));
        }
    }

    #[test]
    fn default_chunking_of_2500_bytes() {
        let lens: Vec<usize> = split_into_chunks(2500, DEFAULT_CHUNK_SIZE)
            .iter()
            .map(|r| r.len())
            .collect();
        assert_eq!(lens, vec![1000, 1000, 500]);
    }

    #[test]
    fn huge_chunk_size_gives_a_single_chunk() {
        assert_eq!(split_into_chunks(3, usize::MAX), vec![0..3]);
        assert_eq!(split_into_chunks(usize::MAX, usize::MAX), vec![0..usize::MAX]);
    }

    #[test]
    fn empty_payload_has_no_chunks() {
        assert!(split_into_chunks(0, DEFAULT_CHUNK_SIZE).is_empty());
    }
}
