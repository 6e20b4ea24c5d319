//! Wire protocol constants and frame layout
//!
//! Every exchange after the handshake line is a frame: one type byte,
//! optionally followed by a type-specific payload.
//!
//! ```text
//! BET (client)   [0][payload_len: u32 BE][len: u8][record]...[len: u8][record]
//! END            [1]
//! WINNERS        [2]
//! BET (winner)   [0][len: u8][record]
//! ```

use crate::bet::BetRecord;
use crate::error::{ClientError, Result};

/// Field delimiter inside an encoded record
pub const WIRE_DELIMITER: char = ';';

/// Field delimiter of the input bets file
pub const CSV_DELIMITER: char = ',';

/// Line terminator of the input bets file
pub const LINE_TERMINATOR: &str = "\r\n";

/// Largest encoded record, bounded by its one-byte length prefix
pub const MAX_RECORD_LEN: usize = u8::MAX as usize;

/// Server acknowledgement for a stored batch
pub const CONFIRMATION: &[u8; 2] = b"OK";

/// Size of the big-endian batch length field
pub const BATCH_LEN_SIZE: usize = 4;

/// Frame type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Bet = 0,
    End = 1,
    Winners = 2,
}

impl FrameType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = ClientError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(FrameType::Bet),
            1 => Ok(FrameType::End),
            2 => Ok(FrameType::Winners),
            other => Err(ClientError::Protocol(format!(
                "unknown frame type {}",
                other
            ))),
        }
    }
}

/// Build the handshake line announcing the agency
pub fn handshake_line(agency_id: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(agency_id.len() + 1);
    line.extend_from_slice(agency_id.as_bytes());
    line.push(b'\n');
    line
}

/// Build a complete `BET` frame for a batch
///
/// Records are written in batch order, each behind its one-byte length.
/// Fails without writing anything if any record is too large.
pub fn encode_batch(bets: &[BetRecord]) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    for bet in bets {
        let encoded = bet.encode()?;
        payload.push(encoded.len() as u8);
        payload.extend_from_slice(&encoded);
    }

    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        ClientError::Protocol(format!(
            "batch payload of {} bytes exceeds the u32 length field",
            payload.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(1 + BATCH_LEN_SIZE + payload.len());
    frame.push(FrameType::Bet.as_byte());
    frame.extend_from_slice(&payload_len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Worst-case payload size for a batch of `batch_size` records
pub fn max_batch_payload(batch_size: usize) -> usize {
    batch_size.saturating_mul(MAX_RECORD_LEN + 1)
}
