// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Owner context supplied by the authentication layer.

/// The signed-in owner. Every mutation requires one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Owner id stamped on every entity this session creates
    pub user_id: String,
    /// Bearer token for the backend (None = anonymous key only)
    pub access_token: Option<String>,
    /// Delegated token for the repository metadata service
    pub provider_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
            provider_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_provider_token(mut self, token: impl Into<String>) -> Self {
        self.provider_token = Some(token.into());
        self
    }
}
