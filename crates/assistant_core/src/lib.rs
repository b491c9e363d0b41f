//! Session state and credit-gated generation pipeline.
//!
//! [`AssistantClient`] composes the identity resolver, the entitlement
//! ledger, the generation orchestrator and the reply consumption walk
//! into one observable session lifecycle. The remote generation
//! service, the remote account ledger and the identity provider are
//! injected collaborators; `Missing*` null objects stand in when a
//! deployment has no real implementation wired up.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::domain::{
    Account, ConflictAdvice, ConflictProfile, GenerateOptions, GeneratedReplies, GhostingAdvice,
    MessageInput, ReplyOption,
};
use shared::error::{AdviceError, GenerateError, PremiumRequired};
use shared::protocol::{GenerateRequest, GhostingRequest};
use storage::SessionStore;

pub mod remote;
pub mod replies;
pub mod resolver;

pub use replies::{Advance, ReplyWalk};
pub use resolver::DEFAULT_RESOLVE_TIMEOUT;

/// Upper bound on one generation call; a hung collaborator must not
/// hang the session forever.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// One identity-provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn { email: String },
    SignedOut,
}

/// External identity provider: emits zero or more change
/// notifications and supports explicit sign-out.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The null provider reports `false`; startup resolution then
    /// falls back to whatever the session store restored.
    fn is_configured(&self) -> bool {
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_out(&self) -> Result<()>;
}

pub struct MissingAuthProvider {
    changes: broadcast::Sender<AuthChange>,
}

impl Default for MissingAuthProvider {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(1);
        Self { changes }
    }
}

#[async_trait]
impl AuthProvider for MissingAuthProvider {
    fn is_configured(&self) -> bool {
        false
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }
}

/// Remote ledger holding the authoritative account records.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_or_create(&self, email: &str) -> Result<Account>;

    /// Best-effort replication of a local decrement; callers never
    /// await this on the generation path.
    async fn decrement_credit(&self, email: &str) -> Result<()>;

    async fn upgrade(&self, email: &str) -> Result<Account>;
}

pub struct MissingAccountDirectory;

#[async_trait]
impl AccountDirectory for MissingAccountDirectory {
    async fn get_or_create(&self, email: &str) -> Result<Account> {
        Err(anyhow!("account ledger unavailable for {email}"))
    }

    async fn decrement_credit(&self, email: &str) -> Result<()> {
        Err(anyhow!("account ledger unavailable for {email}"))
    }

    async fn upgrade(&self, email: &str) -> Result<Account> {
        Err(anyhow!("account ledger unavailable for {email}"))
    }
}

/// Remote generation service producing one reply batch per call.
///
/// Implementations must fail loudly rather than return empty or
/// partial content.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_replies(&self, request: GenerateRequest) -> Result<GeneratedReplies>;
}

pub struct MissingReplyGenerator;

#[async_trait]
impl ReplyGenerator for MissingReplyGenerator {
    async fn generate_replies(&self, _request: GenerateRequest) -> Result<GeneratedReplies> {
        Err(anyhow!("reply generation service unavailable"))
    }
}

/// Premium-gated advice features; the core only knows they sit behind
/// the premium gate and accept a language/context payload.
#[async_trait]
pub trait PremiumAdvisor: Send + Sync {
    async fn ghosting_recovery(&self, request: GhostingRequest) -> Result<GhostingAdvice>;

    async fn conflict_resolution(&self, profile: ConflictProfile) -> Result<ConflictAdvice>;
}

pub struct MissingPremiumAdvisor;

#[async_trait]
impl PremiumAdvisor for MissingPremiumAdvisor {
    async fn ghosting_recovery(&self, _request: GhostingRequest) -> Result<GhostingAdvice> {
        Err(anyhow!("premium advice service unavailable"))
    }

    async fn conflict_resolution(&self, _profile: ConflictProfile) -> Result<ConflictAdvice> {
        Err(anyhow!("premium advice service unavailable"))
    }
}

/// Observable session transitions, broadcast to whoever renders them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AccountChanged(Option<Account>),
    BatchReady { total: usize },
    BatchExhausted,
    UpsellRequired,
    Error(String),
}

struct SessionState {
    account: Option<Account>,
    walk: ReplyWalk,
}

/// The session controller: the only writer of the durable session
/// store, and the enforcement point for every generation attempt.
pub struct AssistantClient {
    generator: Arc<dyn ReplyGenerator>,
    advisor: Arc<dyn PremiumAdvisor>,
    directory: Arc<dyn AccountDirectory>,
    provider: Arc<dyn AuthProvider>,
    store: SessionStore,
    generation_timeout: Duration,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl AssistantClient {
    pub fn new(store: SessionStore) -> Arc<Self> {
        Self::with_collaborators(
            store,
            Arc::new(MissingReplyGenerator),
            Arc::new(MissingPremiumAdvisor),
            Arc::new(MissingAccountDirectory),
            Arc::new(MissingAuthProvider::default()),
        )
    }

    pub fn with_collaborators(
        store: SessionStore,
        generator: Arc<dyn ReplyGenerator>,
        advisor: Arc<dyn PremiumAdvisor>,
        directory: Arc<dyn AccountDirectory>,
        provider: Arc<dyn AuthProvider>,
    ) -> Arc<Self> {
        Self::with_generation_timeout(
            store,
            generator,
            advisor,
            directory,
            provider,
            DEFAULT_GENERATION_TIMEOUT,
        )
    }

    pub fn with_generation_timeout(
        store: SessionStore,
        generator: Arc<dyn ReplyGenerator>,
        advisor: Arc<dyn PremiumAdvisor>,
        directory: Arc<dyn AccountDirectory>,
        provider: Arc<dyn AuthProvider>,
        generation_timeout: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            generator,
            advisor,
            directory,
            provider,
            store,
            generation_timeout,
            inner: Mutex::new(SessionState {
                account: None,
                walk: ReplyWalk::Idle,
            }),
            events,
        })
    }

    /// Restores persisted session state, resolves the startup identity
    /// within `resolve_timeout`, and starts watching for later auth
    /// changes. Called once per process.
    pub async fn start(self: &Arc<Self>, resolve_timeout: Duration) -> Result<()> {
        let restored_account = self.store.load_identity().await?;
        let restored_batch = self.store.load_last_result().await?;

        let account = resolver::resolve_startup_identity(
            self.provider.as_ref(),
            self.directory.as_ref(),
            restored_account,
            resolve_timeout,
        )
        .await
        .map(|account| account.with_daily_reset(Utc::now()));

        {
            let mut guard = self.inner.lock().await;
            guard.account = account.clone();
            guard.walk = restored_batch.map(ReplyWalk::restore).unwrap_or_default();
        }

        match &account {
            Some(account) => self.persist_account(account).await,
            // A signed-out resolution drops the mirrored identity but
            // keeps the last result for the next sign-in.
            None => {
                if let Err(err) = self.store.delete(storage::IDENTITY_KEY).await {
                    warn!(%err, "failed to clear mirrored identity");
                }
            }
        }

        if self.provider.is_configured() {
            self.spawn_auth_watcher();
        }

        let _ = self.events.send(SessionEvent::AccountChanged(account));
        Ok(())
    }

    pub async fn account(&self) -> Option<Account> {
        self.inner.lock().await.account.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Explicit sign-in through the remote ledger.
    pub async fn sign_in(&self, email: &str) -> Result<Account> {
        let account = self
            .directory
            .get_or_create(email)
            .await?
            .with_daily_reset(Utc::now());

        {
            let mut guard = self.inner.lock().await;
            guard.account = Some(account.clone());
        }
        self.persist_account(&account).await;
        let _ = self
            .events
            .send(SessionEvent::AccountChanged(Some(account.clone())));

        info!(email = %account.email, premium = account.is_premium, "signed in");
        Ok(account)
    }

    /// Clears the active identity and the persisted session. Provider
    /// sign-out is best-effort; local state is cleared either way.
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(err) = self.provider.sign_out().await {
            warn!(%err, "identity provider sign-out failed");
        }

        {
            let mut guard = self.inner.lock().await;
            guard.account = None;
            guard.walk = ReplyWalk::Idle;
        }
        self.store.clear_session().await?;
        let _ = self.events.send(SessionEvent::AccountChanged(None));
        Ok(())
    }

    /// One credit-gated generation cycle.
    ///
    /// Gate order is load-bearing: validation, then entitlement, then
    /// the remote call; the credit is spent only after content is in
    /// hand, and never when the collaborator fails.
    pub async fn generate(
        &self,
        input: &MessageInput,
        options: GenerateOptions,
    ) -> Result<GeneratedReplies, GenerateError> {
        validate_input(input)?;

        let email = {
            let guard = self.inner.lock().await;
            let Some(account) = guard.account.as_ref() else {
                return Err(GenerateError::SignedOut);
            };
            if !account.has_credits() {
                let _ = self.events.send(SessionEvent::UpsellRequired);
                return Err(GenerateError::EntitlementExhausted);
            }
            account.email.clone()
        };

        let batch_id = Uuid::new_v4();
        debug!(%batch_id, "invoking reply generation");

        let request = GenerateRequest::from_input(input, options);
        let batch = match tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate_replies(request),
        )
        .await
        {
            Ok(Ok(batch)) => batch,
            Ok(Err(err)) => return Err(GenerateError::Generation(err)),
            Err(_) => {
                return Err(GenerateError::Generation(anyhow!(
                    "generation timed out after {:?}",
                    self.generation_timeout
                )))
            }
        };

        // Content is in hand; only now touch result and entitlement.
        let (account, stored) = {
            let mut guard = self.inner.lock().await;
            guard.walk = ReplyWalk::start(batch.clone());
            if let Some(account) = guard.account.as_mut() {
                account.credits = account.credits.saturating_sub(1);
            }
            (guard.account.clone(), guard.walk.to_stored())
        };

        if let Some(stored) = &stored {
            if let Err(err) = self.store.save_last_result(stored).await {
                warn!(%batch_id, %err, "failed to persist generation result");
            }
        }
        if let Some(account) = &account {
            self.persist_account(account).await;
        }

        self.spawn_credit_sync(email, batch_id);

        info!(%batch_id, replies = batch.replies.len(), "reply batch ready");
        let _ = self.events.send(SessionEvent::BatchReady {
            total: batch.replies.len(),
        });
        let _ = self.events.send(SessionEvent::AccountChanged(account));

        Ok(batch)
    }

    /// Moves the walk to the next reply. Returns `None` once the batch
    /// is exhausted (the walk silently re-arms) or when idle.
    pub async fn advance_reply(&self) -> Option<ReplyOption> {
        let (outcome, stored) = {
            let mut guard = self.inner.lock().await;
            let outcome = guard.walk.advance();
            (outcome, guard.walk.to_stored())
        };

        match stored {
            Some(stored) => {
                if let Err(err) = self.store.save_last_result(&stored).await {
                    warn!(%err, "failed to persist reply cursor");
                }
            }
            None => {
                if let Err(err) = self.store.delete(storage::LAST_RESULT_KEY).await {
                    warn!(%err, "failed to clear consumed reply batch");
                }
            }
        }

        match outcome {
            Advance::Next(reply) => Some(reply),
            Advance::Exhausted => {
                let _ = self.events.send(SessionEvent::BatchExhausted);
                None
            }
            Advance::Idle => None,
        }
    }

    pub async fn current_reply(&self) -> Option<ReplyOption> {
        self.inner.lock().await.walk.current().cloned()
    }

    /// Zero-based cursor and batch length of the active walk.
    pub async fn reply_position(&self) -> Option<(usize, usize)> {
        self.inner.lock().await.walk.position()
    }

    /// Paid tier change. Unlike credit consumption this is not
    /// optimistic: the ledger's returned record replaces local state,
    /// and failure propagates to the caller.
    pub async fn upgrade(&self) -> Result<Account> {
        let email = self
            .account()
            .await
            .map(|account| account.email)
            .ok_or_else(|| anyhow!("not signed in"))?;

        let account = self.directory.upgrade(&email).await?;
        {
            let mut guard = self.inner.lock().await;
            guard.account = Some(account.clone());
        }
        self.persist_account(&account).await;
        let _ = self
            .events
            .send(SessionEvent::AccountChanged(Some(account.clone())));

        info!(email = %account.email, "upgraded to premium");
        Ok(account)
    }

    pub async fn ghosting_recovery(
        &self,
        request: GhostingRequest,
    ) -> Result<GhostingAdvice, AdviceError> {
        self.require_premium().await?;
        self.advisor
            .ghosting_recovery(request)
            .await
            .map_err(AdviceError::Generation)
    }

    pub async fn conflict_resolution(
        &self,
        profile: ConflictProfile,
    ) -> Result<ConflictAdvice, AdviceError> {
        self.require_premium().await?;
        self.advisor
            .conflict_resolution(profile)
            .await
            .map_err(AdviceError::Generation)
    }

    async fn require_premium(&self) -> Result<(), PremiumRequired> {
        let guard = self.inner.lock().await;
        match guard.account.as_ref() {
            Some(account) if account.is_premium => Ok(()),
            _ => {
                let _ = self.events.send(SessionEvent::UpsellRequired);
                Err(PremiumRequired)
            }
        }
    }

    /// Detached best-effort replication of a local decrement. Failure
    /// is logged and never rolled back: the user has already seen the
    /// content the credit paid for.
    fn spawn_credit_sync(&self, email: String, batch_id: Uuid) {
        let directory = Arc::clone(&self.directory);
        tokio::spawn(async move {
            if let Err(err) = directory.decrement_credit(&email).await {
                warn!(email = %email, %batch_id, %err, "credit decrement sync failed; keeping local balance");
            }
        });
    }

    /// Watches for auth changes after startup resolution; a second
    /// notification updates the live identity without re-running the
    /// startup gating.
    fn spawn_auth_watcher(self: &Arc<Self>) {
        let client = Arc::clone(self);
        let mut changes = self.provider.subscribe();
        tokio::spawn(async move {
            while let Ok(change) = changes.recv().await {
                match change {
                    AuthChange::SignedIn { email } => match client.sign_in(&email).await {
                        Ok(_) => {}
                        Err(err) => {
                            warn!(email = %email, %err, "auth change sign-in failed");
                            let _ = client.events.send(SessionEvent::Error(err.to_string()));
                        }
                    },
                    AuthChange::SignedOut => {
                        if let Err(err) = client.sign_out().await {
                            warn!(%err, "auth change sign-out failed");
                        }
                    }
                }
            }
        });
    }

    async fn persist_account(&self, account: &Account) {
        if let Err(err) = self.store.save_identity(account).await {
            warn!(email = %account.email, %err, "failed to persist identity");
        }
    }
}

fn validate_input(input: &MessageInput) -> Result<(), GenerateError> {
    match input {
        MessageInput::Text(text) if text.trim().is_empty() => Err(GenerateError::Validation(
            "Please paste a text message first.",
        )),
        MessageInput::Screenshot(image_b64) if image_b64.is_empty() => Err(
            GenerateError::Validation("Please upload a screenshot first."),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
