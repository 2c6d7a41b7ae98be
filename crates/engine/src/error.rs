// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! `NotParticipating` is the common, expected "hook fired but this process
//! isn't hcom-attached" case — it must never surface as an error to the
//! user (hooks exit 0 on it).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Expected: process/session has no instance row; delivery is a no-op
    #[error("not participating")]
    NotParticipating,

    #[error("{0}")]
    InvalidInput(String),

    #[error("no instance named '{0}'")]
    IdentityMissing(String),

    #[error("ambiguous instance name '{0}'")]
    IdentityAmbiguous(String),

    #[error("storage error: {0}")]
    Store(#[from] hcom_storage::StoreError),

    #[error("filter error: {0}")]
    Filter(#[from] hcom_storage::FilterError),

    #[error("name error: {0}")]
    Name(#[from] hcom_core::NameError),

    #[error("address error: {0}")]
    Address(#[from] hcom_core::AddressError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }
}
