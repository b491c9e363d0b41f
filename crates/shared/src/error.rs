use thiserror::Error;

/// Failure modes of one generation attempt.
///
/// All variants are recoverable at the session boundary: validation
/// and exhaustion leave every piece of state untouched, and a
/// collaborator failure must never cost a credit.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("not signed in")]
    SignedOut,

    /// Remaining credits are zero; the caller should surface the
    /// premium upsell instead of an error banner.
    #[error("daily credits exhausted")]
    EntitlementExhausted,

    #[error("reply generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}

/// Signalled by a premium-gated entry point for a free-tier account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("premium subscription required")]
pub struct PremiumRequired;

/// Failure modes of the premium advice features.
#[derive(Debug, Error)]
pub enum AdviceError {
    #[error(transparent)]
    PremiumRequired(#[from] PremiumRequired),

    #[error("advice generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}
