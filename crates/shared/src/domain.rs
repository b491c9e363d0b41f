use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FREE_DAILY_CREDITS: u32 = 10;
pub const PREMIUM_DAILY_CREDITS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Polite,
    Friendly,
    Confident,
    Playful,
    Flirty,
    Sarcastic,
    Casual,
    Dramatic,
}

impl Tone {
    pub fn description(&self) -> &'static str {
        match self {
            Tone::Polite => "Soft, respectful, safe",
            Tone::Friendly => "Warm, open, conversational",
            Tone::Confident => "Assertive, direct, attractive",
            Tone::Playful => "Light humor, wholesome teasing",
            Tone::Flirty => "Romantic, spicy, suggestive",
            Tone::Sarcastic => "Witty, dry, edgy humor",
            Tone::Casual => "Low effort, chill, brief",
            Tone::Dramatic => "Expressive, emotional, extra",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Hinglish,
    Hindi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Standard,
    Short,
    Cute,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Balanced,
    Bold,
}

/// The signed-in user's entitlement record.
///
/// Owned by the session controller while active; mirrored into the
/// durable session store for restart survival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub is_premium: bool,
    pub credits: u32,
    pub last_credit_reset: DateTime<Utc>,
}

impl Account {
    pub fn credit_cap(&self) -> u32 {
        if self.is_premium {
            PREMIUM_DAILY_CREDITS
        } else {
            FREE_DAILY_CREDITS
        }
    }

    pub fn has_credits(&self) -> bool {
        self.credits > 0
    }

    /// Refills credits to the tier cap when the reset stamp is from an
    /// earlier UTC day.
    pub fn with_daily_reset(mut self, now: DateTime<Utc>) -> Self {
        if self.last_credit_reset.date_naive() < now.date_naive() {
            self.credits = self.credit_cap();
            self.last_credit_reset = now;
        }
        self
    }
}

/// Exactly one input mode is populated, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "payload", rename_all = "snake_case")]
pub enum MessageInput {
    /// Pasted conversation snippet.
    Text(String),
    /// Base64-encoded screenshot bytes.
    Screenshot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub tone: Tone,
    pub language: Language,
    pub use_emojis: bool,
    pub text_style: TextStyle,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            tone: Tone::Confident,
            language: Language::Hinglish,
            use_emojis: true,
            text_style: TextStyle::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub id: String,
    pub text: String,
    pub risk: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    pub stage: String,
    pub intent: String,
    pub advice: String,
}

/// One successful generation cycle. Replaced wholesale by the next
/// cycle; `replies` ordering is the consumption order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedReplies {
    pub analysis: ConversationAnalysis,
    pub replies: Vec<ReplyOption>,
}

/// Persisted form of an in-progress consumption walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    pub batch: GeneratedReplies,
    pub cursor: usize,
}

// --- Premium advice payloads ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostingReply {
    pub id: String,
    pub text: String,
    pub strategy: String,
    /// Estimated recovery chance, 0-100.
    pub recovery_chance: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostingAdvice {
    pub analysis: String,
    pub replies: Vec<GhostingReply>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictProfile {
    pub user_gender: String,
    pub partner_gender: String,
    pub relationship_type: String,
    pub duration: String,
    pub reason: String,
    pub user_feeling: String,
    pub partner_feeling: String,
    pub description: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReply {
    pub id: String,
    pub text: String,
    /// e.g. "Soft Repair", "Balanced Honest", "Boundary + Care".
    pub approach: String,
    pub why_it_works: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictAdvice {
    pub insight: String,
    pub guidance: String,
    pub replies: Vec<ConflictReply>,
    pub tips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn free_account(credits: u32) -> Account {
        Account {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            is_premium: false,
            credits,
            last_credit_reset: Utc::now(),
        }
    }

    #[test]
    fn credit_cap_follows_tier() {
        let mut account = free_account(3);
        assert_eq!(account.credit_cap(), FREE_DAILY_CREDITS);
        account.is_premium = true;
        assert_eq!(account.credit_cap(), PREMIUM_DAILY_CREDITS);
    }

    #[test]
    fn daily_reset_refills_after_utc_day_rollover() {
        let now = Utc::now();
        let mut account = free_account(0);
        account.last_credit_reset = now - Duration::days(2);

        let refreshed = account.with_daily_reset(now);
        assert_eq!(refreshed.credits, FREE_DAILY_CREDITS);
        assert_eq!(refreshed.last_credit_reset, now);
    }

    #[test]
    fn daily_reset_keeps_balance_within_same_day() {
        let now = Utc::now();
        let mut account = free_account(4);
        account.last_credit_reset = now;

        let unchanged = account.clone().with_daily_reset(now);
        assert_eq!(unchanged, account);
    }

    #[test]
    fn every_tone_has_a_distinct_description() {
        let tones = [
            Tone::Polite,
            Tone::Friendly,
            Tone::Confident,
            Tone::Playful,
            Tone::Flirty,
            Tone::Sarcastic,
            Tone::Casual,
            Tone::Dramatic,
        ];

        let descriptions: Vec<&str> = tones.iter().map(|tone| tone.description()).collect();
        assert!(descriptions.iter().all(|d| !d.is_empty()));

        let mut deduped = descriptions.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), tones.len());
    }

    #[test]
    fn message_input_serializes_with_mode_tag() {
        let input = MessageInput::Text("hey, kya haal?".to_string());
        let json = serde_json::to_value(&input).expect("serialize");
        assert_eq!(json["mode"], "text");
        assert_eq!(json["payload"], "hey, kya haal?");
    }
}
