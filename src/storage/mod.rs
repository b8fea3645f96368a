// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage backends: the hosted remote store and the local snapshot slot.

pub mod traits;
pub mod rest;
pub mod memory;
pub mod unconfigured;
pub mod local;

use std::sync::Arc;

use tracing::info;

use crate::config::SyncConfig;
use crate::session::Session;
use rest::RestRemote;
use traits::RemoteStore;
use unconfigured::UnconfiguredRemote;

/// The remote store for `config`: REST when configured, otherwise one that
/// reports `NotConfigured` without touching the network.
pub fn remote_from_config(config: &SyncConfig, session: Option<&Session>) -> Arc<dyn RemoteStore> {
    match RestRemote::from_config(config, session) {
        Some(remote) => Arc::new(remote),
        None => {
            info!("No remote store configured, running local-only");
            Arc::new(UnconfiguredRemote)
        }
    }
}
