//! Credential store wiring.
//!
//! - `env`: Environment variable store (read-only, highest priority)
//!
//! [`build_credential_chain`] assembles the concrete stores, in priority
//! order, into the [`CredentialChain`] the model-client factory reads from.

pub mod env;

use std::sync::Arc;

use revlens_core::credential::{CredentialChain, DynCredentialStore};

use crate::keychain::KeyringCredentialStore;
use self::env::EnvCredentialStore;

/// Build the default credential resolution chain.
///
/// Ordered by precedence (first match wins):
/// 1. Environment variables (if `include_env` is true)
/// 2. OS keychain (if `keychain` is Some; may be unavailable on headless hosts)
///
/// Writes go to the first store that accepts them, which is the keychain
/// because the environment store is read-only.
pub fn build_credential_chain(
    keychain: Option<KeyringCredentialStore>,
    include_env: bool,
) -> CredentialChain {
    let mut stores: Vec<DynCredentialStore> = Vec::new();

    if include_env {
        stores.push(Arc::new(EnvCredentialStore::new()));
    }

    if let Some(kc) = keychain {
        stores.push(Arc::new(kc));
    }

    CredentialChain::new(stores)
}
