//! HTTP implementations of the remote collaborators.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

use shared::domain::{Account, ConflictAdvice, ConflictProfile, GeneratedReplies, GhostingAdvice};
use shared::protocol::{AccountRequest, GenerateRequest, GhostingRequest};

use crate::{AccountDirectory, PremiumAdvisor, ReplyGenerator};

/// JSON client for the remote generation service. The same service
/// hosts the premium advice endpoints, so this type implements both
/// collaborator traits.
pub struct HttpReplyGenerator {
    http: Client,
    base_url: String,
}

impl HttpReplyGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for HttpReplyGenerator {
    async fn generate_replies(&self, request: GenerateRequest) -> Result<GeneratedReplies> {
        let batch: GeneratedReplies = self
            .http
            .post(format!("{}/replies/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The collaborator contract is all-or-nothing; an empty batch
        // is a failure, not a result.
        if batch.replies.is_empty() {
            return Err(anyhow!("generation service returned no replies"));
        }

        Ok(batch)
    }
}

#[async_trait]
impl PremiumAdvisor for HttpReplyGenerator {
    async fn ghosting_recovery(&self, request: GhostingRequest) -> Result<GhostingAdvice> {
        let advice = self
            .http
            .post(format!("{}/advice/ghosting", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(advice)
    }

    async fn conflict_resolution(&self, profile: ConflictProfile) -> Result<ConflictAdvice> {
        let advice = self
            .http
            .post(format!("{}/advice/conflict", self.base_url))
            .json(&profile)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(advice)
    }
}

/// JSON client for the remote account ledger.
pub struct HttpAccountDirectory {
    http: Client,
    base_url: String,
}

impl HttpAccountDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AccountDirectory for HttpAccountDirectory {
    async fn get_or_create(&self, email: &str) -> Result<Account> {
        let account = self
            .http
            .post(format!("{}/accounts/get_or_create", self.base_url))
            .json(&AccountRequest::new(email))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(account)
    }

    async fn decrement_credit(&self, email: &str) -> Result<()> {
        self.http
            .post(format!("{}/accounts/decrement", self.base_url))
            .json(&AccountRequest::new(email))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn upgrade(&self, email: &str) -> Result<Account> {
        let account = self
            .http
            .post(format!("{}/accounts/upgrade", self.base_url))
            .json(&AccountRequest::new(email))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(account)
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
