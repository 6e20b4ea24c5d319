//! Agency Client Library
//!
//! Lottery agency client: streams bets from a local file to the central
//! server in confirmed batches, then polls for the agency's winners.

pub mod bet;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod reader;
pub mod runner;
pub mod shutdown;
pub mod state;
pub mod transport;


// Re-export main types for convenience
pub use bet::BetRecord;
pub use client::{ServerConnection, WinnersReply};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use protocol::FrameType;
pub use reader::BatchReader;
pub use runner::AgencyRunner;
pub use shutdown::ShutdownCoordinator;
pub use state::{Phase, PhaseEvent, RunOutcome, RunReport};
pub use transport::Transport;
