// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::types::Settings;

#[derive(Error, Debug)]
pub enum QuartermasterError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// A snapshot was obtained but a required field is absent. Expected
    /// during bootstrap; the partial snapshot is carried so callers can
    /// proceed with defaults.
    #[error("incomplete settings: {missing} is missing")]
    IncompleteSettings {
        missing: String,
        partial: Box<Settings>,
    },

    #[error("malformed value for {key}: {message}")]
    DecodeError { key: &'static str, message: String },

    #[error("backing resource unavailable: {0}")]
    StoreUnavailable(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),

    #[error("certificate error: {0}")]
    CertificateError(String),

    #[error("failed to generate cryptographic material: {0}")]
    CryptoError(String),

    #[error("timed out waiting for settings caches to sync")]
    SyncTimeout,
}

impl QuartermasterError {
    /// Whether this error only means required fields are absent, which
    /// bootstrap callers tolerate.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, QuartermasterError::IncompleteSettings { .. })
    }
}

pub type Result<T> = std::result::Result<T, QuartermasterError>;
