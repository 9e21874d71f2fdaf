//! Snapshot sources
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::Payload;

/// Source-level failures other than "temporarily unavailable"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Invalid source configuration: {0}")]
    Configuration(String),
}

/// What one fetch produced
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Body plus transport metadata
    Payload(Payload),

    /// Nothing new to deliver
    NoContent,

    /// Source asked the caller to back off
    Unavailable { retry_after: Option<Duration> },
}

/// Where snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<FetchOutcome, SourceError>;
}
