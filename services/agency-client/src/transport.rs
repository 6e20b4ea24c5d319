//! Byte-exact send and receive over a stream socket
//!
//! A stream makes no promise that one write or one read moves a whole
//! message. Everything above this module deals in complete buffers only.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Owns one connection to the server
pub struct Transport<S> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Write the whole buffer, looping over short writes
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            let n = self
                .stream
                .write(&data[written..])
                .await
                .map_err(ClientError::Connection)?;
            if n == 0 {
                return Err(ClientError::Connection(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("socket accepted {} of {} bytes", written, data.len()),
                )));
            }
            written += n;
        }

        self.stream.flush().await.map_err(ClientError::Connection)?;
        Ok(())
    }

    /// Read exactly `len` bytes, looping over short reads
    ///
    /// A peer close before `len` bytes arrive is reported as
    /// [`ClientError::UnexpectedEof`], never as a short buffer.
    pub async fn receive_exactly(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut received = 0;
        while received < len {
            let n = self
                .stream
                .read(&mut buf[received..])
                .await
                .map_err(ClientError::Connection)?;
            if n == 0 {
                return Err(ClientError::UnexpectedEof {
                    expected: len,
                    received,
                });
            }
            received += n;
        }
        Ok(buf)
    }

    pub async fn receive_byte(&mut self) -> Result<u8> {
        let byte = self.receive_exactly(1).await?;
        Ok(byte[0])
    }

    /// Close the write half; the peer sees EOF
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Socket shutdown: {}", e);
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}
