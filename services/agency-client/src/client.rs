//! Lottery server connection
//!
//! Request/response operations over one established connection. Nothing
//! is pipelined: every operation finishes reading its reply before
//! returning.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::bet::BetRecord;
use crate::error::{ClientError, Result};
use crate::protocol::{self, FrameType, CONFIRMATION};
use crate::transport::Transport;

/// Reply to a winners request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinnersReply {
    /// Server closed without answering: the draw is not done yet
    NotReady,
    Ready(Vec<BetRecord>),
}

/// Open a TCP connection to the server
pub async fn connect(server_address: &str, agency_id: &str) -> Result<ServerConnection<TcpStream>> {
    let stream = TcpStream::connect(server_address).await?;
    debug!(server_address, "Connected to server");
    Ok(ServerConnection::new(Transport::new(stream), agency_id))
}

/// One connection to the lottery server on behalf of an agency
pub struct ServerConnection<S> {
    transport: Transport<S>,
    agency_id: String,
}

impl<S> ServerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: Transport<S>, agency_id: &str) -> Self {
        Self {
            transport,
            agency_id: agency_id.to_string(),
        }
    }

    /// Announce the agency; must precede any frame on this connection
    pub async fn handshake(&mut self) -> Result<()> {
        self.transport
            .send(&protocol::handshake_line(&self.agency_id))
            .await
    }

    /// Send one `BET` frame and wait for its confirmation
    pub async fn send_batch(&mut self, bets: &[BetRecord]) -> Result<()> {
        let frame = protocol::encode_batch(bets)?;
        debug!(bets = bets.len(), frame_len = frame.len(), "Sending batch");
        self.transport.send(&frame).await?;
        self.receive_confirmation().await
    }

    async fn receive_confirmation(&mut self) -> Result<()> {
        let reply = self.transport.receive_exactly(CONFIRMATION.len()).await?;
        if reply.as_slice() != CONFIRMATION {
            return Err(ClientError::Protocol(format!(
                "expected confirmation {:?}, got {:?}",
                String::from_utf8_lossy(CONFIRMATION),
                String::from_utf8_lossy(&reply)
            )));
        }
        Ok(())
    }

    /// Tell the server this agency has no more bets
    pub async fn notify_end(&mut self) -> Result<()> {
        self.transport.send(&[FrameType::End.as_byte()]).await
    }

    /// Ask for this agency's winners
    ///
    /// A peer close before the first reply byte means the server is still
    /// waiting on other agencies. A close anywhere later is an error.
    pub async fn request_winners(&mut self) -> Result<WinnersReply> {
        self.transport.send(&[FrameType::Winners.as_byte()]).await?;

        let mut frame_type = match self.transport.receive_byte().await {
            Ok(byte) => byte,
            Err(e) if e.is_unexpected_eof() => return Ok(WinnersReply::NotReady),
            Err(e) => return Err(e),
        };

        let mut winners = Vec::new();
        loop {
            match FrameType::try_from(frame_type)? {
                FrameType::End => return Ok(WinnersReply::Ready(winners)),
                FrameType::Bet => {
                    let winner = self.receive_winner().await?;
                    debug!(winner = %winner, "Received winner");
                    winners.push(winner);
                }
                FrameType::Winners => {
                    return Err(ClientError::Protocol(
                        "unexpected WINNERS frame in winner list".to_string(),
                    ))
                }
            }
            frame_type = self.transport.receive_byte().await?;
        }
    }

    async fn receive_winner(&mut self) -> Result<BetRecord> {
        let len = self.transport.receive_byte().await? as usize;
        let record = self.transport.receive_exactly(len).await?;
        BetRecord::decode_wire(&record)
    }

    pub async fn close(mut self) {
        self.transport.shutdown().await;
    }
}
