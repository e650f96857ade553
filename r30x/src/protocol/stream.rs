//! Multi-frame transfers.
//!
//! Bulk data (images, character files, parameter dumps) travels as a run of
//! Data frames closed by one EndData frame:
//!
//! ```text
//! Data(chunk 1) -> Data(chunk 2) -> ... -> EndData(last chunk, may be empty)
//! ```
//!
//! [`receive_stream`] collects such a run into one buffer. Any failure ends
//! the transfer and no partial buffer is returned. [`send_stream`] is the
//! host-to-module counterpart.

use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, ProtocolError, Result};
use crate::port::Port;
use crate::protocol::packet::{MAX_PAYLOAD_LEN, PacketType, encode_frame};
use crate::protocol::receiver::{FrameReceiver, ReceiveMode};

/// Collect a Data/EndData run of at most `capacity` bytes.
///
/// `progress` is called with the running byte count after each chunk.
pub fn receive_stream<P, F>(
    receiver: &mut FrameReceiver<'_, P>,
    address: u32,
    capacity: usize,
    timeout_per_chunk: Duration,
    mut progress: F,
) -> Result<Vec<u8>>
where
    P: Port + ?Sized,
    F: FnMut(usize),
{
    let mut buffer = Vec::new();
    let mut chunks = 0usize;

    loop {
        let frame = receiver.receive(address, ReceiveMode::StreamChunk, timeout_per_chunk)?;
        if !matches!(frame.packet_type, PacketType::Data | PacketType::EndData) {
            return Err(ProtocolError::UnexpectedType(frame.packet_type.into()).into());
        }

        let needed = buffer.len() + frame.payload.len();
        if needed > capacity {
            return Err(ProtocolError::BufferOverflow { capacity, needed }.into());
        }
        buffer.extend_from_slice(&frame.payload);
        chunks += 1;
        trace!("Chunk {chunks}: {} bytes, {needed} total", frame.payload.len());
        progress(buffer.len());

        if frame.packet_type == PacketType::EndData {
            debug!("Stream complete: {} bytes in {chunks} chunks", buffer.len());
            return Ok(buffer);
        }
    }
}

/// Send `data` as Data frames of `chunk_size` bytes, the last one as EndData.
///
/// Empty data is sent as a single empty EndData frame.
pub fn send_stream<P: Port + ?Sized>(
    port: &mut P,
    address: u32,
    data: &[u8],
    chunk_size: usize,
    timeout: Duration,
) -> Result<()> {
    if chunk_size == 0 || chunk_size > MAX_PAYLOAD_LEN {
        return Err(Error::InvalidArgument(format!(
            "chunk size {chunk_size} must be between 1 and {MAX_PAYLOAD_LEN}"
        )));
    }

    if data.is_empty() {
        return port.write_all(&encode_frame(address, PacketType::EndData, &[]), timeout);
    }

    let total = data.len().div_ceil(chunk_size);
    for (index, chunk) in data
        .chunks(chunk_size)
        .enumerate()
    {
        let packet_type = if index + 1 == total {
            PacketType::EndData
        } else {
            PacketType::Data
        };
        trace!("Sending chunk {}/{total} ({} bytes)", index + 1, chunk.len());
        port.write_all(&encode_frame(address, packet_type, chunk), timeout)?;
    }
    debug!("Sent {} bytes in {total} chunks", data.len());
    Ok(())
}
