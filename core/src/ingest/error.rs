//! Ingest errors and their diagnostic classes
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::source::SourceError;
use super::upload::UploadError;
use crate::codec::CodecError;
use crate::scheduler::AttemptTicket;

/// Coarse failure taxonomy surfaced to diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    ContractViolation,
    TransientUnavailable,
    Cancelled,
    DecodeFailure,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ContractViolation => "contract violation",
            Self::TransientUnavailable => "transient unavailable",
            Self::Cancelled => "cancelled",
            Self::DecodeFailure => "decode failure",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Source '{source_name}' is temporarily unavailable")]
    Unavailable {
        source_name: String,
        retry_after: Option<Duration>,
    },

    #[error("Source '{source_name}' failed: {error}")]
    Source {
        source_name: String,
        #[source]
        error: SourceError,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Attempt {ticket} was superseded")]
    Superseded { ticket: AttemptTicket },

    #[error("Snapshot preparation did not finish: {0}")]
    Interrupted(String),
}

impl IngestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Codec(e) if e.is_contract_violation() => ErrorClass::ContractViolation,
            Self::Codec(_) => ErrorClass::DecodeFailure,
            Self::Unavailable { .. } | Self::Source { .. } => ErrorClass::TransientUnavailable,
            // The payload decoded but could not be made renderable
            Self::Upload(_) | Self::Interrupted(_) => ErrorClass::DecodeFailure,
            Self::Superseded { .. } => ErrorClass::Cancelled,
        }
    }
}
