//! Batch reader over the agency bets file
//!
//! The file is consumed in fixed-size chunks. A chunk boundary may land in
//! the middle of a line, so each full chunk is cut after its last `\r\n`
//! and the file cursor is rewound by the unconsumed tail. The next pull then
//! starts exactly at the beginning of a line. A bare `\n` is line content,
//! and a `\r` ending a chunk is an incomplete terminator.

use std::collections::VecDeque;
use std::io::{self, SeekFrom};
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::bet::BetRecord;
use crate::error::{ClientError, Result};
use crate::protocol::{CSV_DELIMITER, LINE_TERMINATOR, WIRE_DELIMITER};

/// Reference chunk size for file pulls
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Produces ordered batches of bets from a CSV file
pub struct BatchReader {
    file: Option<File>,
    agency_id: String,
    batch_size: usize,
    chunk_size: usize,
    /// Decoded records not yet handed out
    pending: VecDeque<BetRecord>,
    eof: bool,
}

impl BatchReader {
    /// Open the bets file for `agency_id`
    pub async fn open(
        path: impl AsRef<Path>,
        batch_size: usize,
        agency_id: &str,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "batch size must be at least 1",
            )));
        }
        // The id is the first wire field of every record
        if agency_id.contains(&[WIRE_DELIMITER, CSV_DELIMITER, '\n'][..]) {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("agency id {:?} contains a delimiter", agency_id),
            )));
        }

        let file = File::open(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), batch_size, "Opened bets file");

        Ok(Self {
            file: Some(file),
            agency_id: agency_id.to_string(),
            batch_size,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pending: VecDeque::new(),
            eof: false,
        })
    }

    /// Override the number of bytes pulled from the file at a time
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Return the next batch
    ///
    /// Every batch holds exactly `batch_size` bets except the last one. Once
    /// the file is exhausted an empty batch is returned, on this and every
    /// later call, and the file handle is released.
    pub async fn read(&mut self) -> Result<Vec<BetRecord>> {
        while self.pending.len() < self.batch_size && !self.eof {
            let bets = self.pull().await?;
            self.pending.extend(bets);
        }

        let take = self.pending.len().min(self.batch_size);
        let batch: Vec<BetRecord> = self.pending.drain(..take).collect();

        if batch.is_empty() {
            self.close();
        }

        Ok(batch)
    }

    /// Release the file handle; later reads return empty batches
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(agency_id = %self.agency_id, "Closed bets file");
        }
        self.eof = true;
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Pull and decode the next run of complete lines
    async fn pull(&mut self) -> Result<Vec<BetRecord>> {
        let Some(file) = self.file.as_mut() else {
            self.eof = true;
            return Ok(Vec::new());
        };

        let mut data = Vec::with_capacity(self.chunk_size);
        loop {
            let filled = fill_chunk(file, &mut data, self.chunk_size).await?;
            if filled < self.chunk_size {
                // Nothing follows, so the tail is a complete line
                self.eof = true;
                break;
            }

            if let Some(end) = last_line_end(&data) {
                let unconsumed = data.len() - end;
                if unconsumed > 0 {
                    file.seek(SeekFrom::Current(-(unconsumed as i64))).await?;
                }
                data.truncate(end);
                break;
            }

            // A single line is longer than the chunk
        }

        parse_lines(&self.agency_id, &data)
    }
}

/// Offset just past the last complete line terminator in `data`
fn last_line_end(data: &[u8]) -> Option<usize> {
    let terminator = LINE_TERMINATOR.as_bytes();
    data.windows(terminator.len())
        .rposition(|w| w == terminator)
        .map(|pos| pos + terminator.len())
}

/// Append up to `chunk_size` bytes to `data`, returning how many were read
async fn fill_chunk(
    file: &mut File,
    data: &mut Vec<u8>,
    chunk_size: usize,
) -> io::Result<usize> {
    let start = data.len();
    data.resize(start + chunk_size, 0);

    let mut filled = 0;
    while filled < chunk_size {
        let n = file.read(&mut data[start + filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    data.truncate(start + filled);
    Ok(filled)
}

fn parse_lines(agency_id: &str, data: &[u8]) -> Result<Vec<BetRecord>> {
    let text = std::str::from_utf8(data)
        .map_err(|e| ClientError::MalformedRecord(format!("bets file is not UTF-8: {}", e)))?;

    text.split(LINE_TERMINATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| BetRecord::decode_csv(agency_id, line))
        .collect()
}
