//! Startup identity resolution with a bounded wait.
//!
//! The resolver races the auth provider's first change notification
//! against a timer so the caller is never blocked on an external
//! subscription. It runs exactly once per process; later notifications
//! are the session controller's auth watcher's business.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use shared::domain::Account;

use crate::{AccountDirectory, AuthChange, AuthProvider};

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Determines the identity to start the session with.
///
/// - No provider configured: the value restored from storage wins.
/// - First notification inside the window: a signed-in principal is
///   looked up on the remote ledger; any provider or fetch error is
///   treated as signed out, never as a fatal failure.
/// - Window elapses with no notification: falls back to the cached
///   identity rather than forcing a sign-out.
pub async fn resolve_startup_identity(
    provider: &dyn AuthProvider,
    directory: &dyn AccountDirectory,
    restored: Option<Account>,
    timeout: Duration,
) -> Option<Account> {
    if !provider.is_configured() {
        return restored;
    }

    let mut changes = provider.subscribe();
    match tokio::time::timeout(timeout, changes.recv()).await {
        Ok(Ok(AuthChange::SignedIn { email })) => {
            match directory.get_or_create(&email).await {
                Ok(account) => Some(account.with_daily_reset(Utc::now())),
                Err(err) => {
                    warn!(email = %email, %err, "identity record fetch failed; treating as signed out");
                    None
                }
            }
        }
        Ok(Ok(AuthChange::SignedOut)) => None,
        Ok(Err(err)) => {
            warn!(%err, "auth change stream closed before first notification; treating as signed out");
            None
        }
        Err(_) => {
            info!(
                timeout_ms = timeout.as_millis() as u64,
                "no auth notification within window; keeping cached identity"
            );
            restored
        }
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
