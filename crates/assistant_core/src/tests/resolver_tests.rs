use std::time::Instant;

use anyhow::anyhow;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;

use shared::domain::{Account, FREE_DAILY_CREDITS};

use super::*;
use crate::{AccountDirectory, AuthChange, AuthProvider, MissingAuthProvider};

struct TestAuthProvider {
    changes: broadcast::Sender<AuthChange>,
}

impl TestAuthProvider {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(8);
        Self { changes }
    }
}

#[async_trait::async_trait]
impl AuthProvider for TestAuthProvider {
    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct TestDirectory {
    credits: u32,
    fail: bool,
}

#[async_trait::async_trait]
impl AccountDirectory for TestDirectory {
    async fn get_or_create(&self, email: &str) -> anyhow::Result<Account> {
        if self.fail {
            return Err(anyhow!("ledger offline"));
        }
        Ok(Account {
            name: "Test User".to_string(),
            email: email.to_string(),
            is_premium: false,
            credits: self.credits,
            last_credit_reset: Utc::now(),
        })
    }

    async fn decrement_credit(&self, _email: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn upgrade(&self, _email: &str) -> anyhow::Result<Account> {
        Err(anyhow!("not under test"))
    }
}

fn cached_account() -> Account {
    Account {
        name: "Cached".to_string(),
        email: "cached@example.com".to_string(),
        is_premium: false,
        credits: 4,
        // Fixed so repeated fixture calls compare equal.
        last_credit_reset: chrono::DateTime::UNIX_EPOCH,
    }
}

#[tokio::test]
async fn unconfigured_provider_resolves_from_storage() {
    let provider = MissingAuthProvider::default();
    let directory = TestDirectory {
        credits: 9,
        fail: false,
    };

    let resolved = resolve_startup_identity(
        &provider,
        &directory,
        Some(cached_account()),
        DEFAULT_RESOLVE_TIMEOUT,
    )
    .await;

    assert_eq!(resolved, Some(cached_account()));
}

#[tokio::test]
async fn timeout_keeps_cached_identity_within_bound() {
    let provider = TestAuthProvider::new();
    let directory = TestDirectory {
        credits: 9,
        fail: false,
    };

    let started = Instant::now();
    let resolved = resolve_startup_identity(
        &provider,
        &directory,
        Some(cached_account()),
        Duration::from_millis(100),
    )
    .await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(resolved, Some(cached_account()));
}

#[tokio::test]
async fn timeout_without_cache_resolves_signed_out() {
    let provider = TestAuthProvider::new();
    let directory = TestDirectory {
        credits: 9,
        fail: false,
    };

    let resolved =
        resolve_startup_identity(&provider, &directory, None, Duration::from_millis(50)).await;
    assert_eq!(resolved, None);
}

#[tokio::test]
async fn signed_in_notification_fetches_ledger_record() {
    let provider = TestAuthProvider::new();
    let directory = TestDirectory {
        credits: 7,
        fail: false,
    };

    let changes = provider.changes.clone();
    let resolve = resolve_startup_identity(
        &provider,
        &directory,
        Some(cached_account()),
        Duration::from_secs(2),
    );
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = changes.send(AuthChange::SignedIn {
            email: "fresh@example.com".to_string(),
        });
    });

    let resolved = resolve.await.expect("account");
    assert_eq!(resolved.email, "fresh@example.com");
    assert_eq!(resolved.credits, 7);
}

#[tokio::test]
async fn signed_in_resolution_applies_daily_reset() {
    struct StaleDirectory;

    #[async_trait::async_trait]
    impl AccountDirectory for StaleDirectory {
        async fn get_or_create(&self, email: &str) -> anyhow::Result<Account> {
            Ok(Account {
                name: "Stale".to_string(),
                email: email.to_string(),
                is_premium: false,
                credits: 0,
                last_credit_reset: Utc::now() - ChronoDuration::days(3),
            })
        }

        async fn decrement_credit(&self, _email: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn upgrade(&self, _email: &str) -> anyhow::Result<Account> {
            Err(anyhow!("not under test"))
        }
    }

    let provider = TestAuthProvider::new();
    let changes = provider.changes.clone();
    let resolve =
        resolve_startup_identity(&provider, &StaleDirectory, None, Duration::from_secs(2));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = changes.send(AuthChange::SignedIn {
            email: "stale@example.com".to_string(),
        });
    });

    let resolved = resolve.await.expect("account");
    assert_eq!(resolved.credits, FREE_DAILY_CREDITS);
}

#[tokio::test]
async fn signed_out_notification_resolves_none_despite_cache() {
    let provider = TestAuthProvider::new();
    let directory = TestDirectory {
        credits: 9,
        fail: false,
    };

    let changes = provider.changes.clone();
    let resolve = resolve_startup_identity(
        &provider,
        &directory,
        Some(cached_account()),
        Duration::from_secs(2),
    );
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = changes.send(AuthChange::SignedOut);
    });

    assert_eq!(resolve.await, None);
}

#[tokio::test]
async fn ledger_failure_resolves_signed_out_not_fatal() {
    let provider = TestAuthProvider::new();
    let directory = TestDirectory {
        credits: 9,
        fail: true,
    };

    let changes = provider.changes.clone();
    let resolve = resolve_startup_identity(
        &provider,
        &directory,
        Some(cached_account()),
        Duration::from_secs(2),
    );
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = changes.send(AuthChange::SignedIn {
            email: "fresh@example.com".to_string(),
        });
    });

    assert_eq!(resolve.await, None);
}
