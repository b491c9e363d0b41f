use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use tracing::info;

use assistant_core::{
    remote::{HttpAccountDirectory, HttpReplyGenerator},
    AssistantClient, MissingAuthProvider,
};
use shared::domain::{GenerateOptions, Language, MessageInput, TextStyle, Tone};
use storage::SessionStore;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Sign in as this account before doing anything else. Without it
    /// the session restored from the local store is used.
    #[arg(long)]
    email: Option<String>,

    /// Conversation snippet to generate replies for.
    #[arg(long)]
    message: Option<String>,

    /// Screenshot of the conversation to generate replies for.
    #[arg(long, conflicts_with = "message")]
    screenshot: Option<PathBuf>,

    #[arg(long, default_value = "confident")]
    tone: String,

    #[arg(long, default_value = "hinglish")]
    language: String,

    #[arg(long, default_value = "standard")]
    text_style: String,

    #[arg(long)]
    no_emojis: bool,

    /// Walk through the whole batch instead of only the first reply.
    #[arg(long)]
    all: bool,

    /// List the available tones and exit.
    #[arg(long)]
    tones: bool,

    /// Print the raw reply batch as JSON.
    #[arg(long)]
    json: bool,

    #[arg(long)]
    sign_out: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    if args.tones {
        for (name, tone) in TONES {
            println!("{name:<10} {}", tone.description());
        }
        return Ok(());
    }

    let generator_url = config::validate_service_url(&settings.generator_url)?;
    let ledger_url = config::validate_service_url(&settings.ledger_url)?;
    info!(%generator_url, %ledger_url, database_url = %settings.database_url, "session configured");

    let store = SessionStore::new(&settings.database_url).await?;
    let generation_service = Arc::new(HttpReplyGenerator::new(generator_url));
    let client = AssistantClient::with_generation_timeout(
        store,
        generation_service.clone(),
        generation_service,
        Arc::new(HttpAccountDirectory::new(ledger_url)),
        Arc::new(MissingAuthProvider::default()),
        settings.generation_timeout(),
    );

    client.start(settings.resolve_timeout()).await?;

    if args.sign_out {
        client.sign_out().await?;
        info!("session cleared");
        println!("Signed out.");
        return Ok(());
    }

    if let Some(email) = &args.email {
        let account = client.sign_in(email).await?;
        println!(
            "Signed in as {} ({}, {} credits)",
            account.email,
            if account.is_premium { "premium" } else { "free" },
            account.credits
        );
    }

    let input = match (&args.message, &args.screenshot) {
        (Some(message), None) => Some(MessageInput::Text(message.clone())),
        (None, Some(path)) => {
            let bytes = fs::read(path)?;
            Some(MessageInput::Screenshot(STANDARD.encode(bytes)))
        }
        (None, None) => None,
        (Some(_), Some(_)) => unreachable!("clap rejects conflicting inputs"),
    };

    let Some(input) = input else {
        return print_session_status(&client).await;
    };

    let options = GenerateOptions {
        tone: parse_tone(&args.tone)?,
        language: parse_language(&args.language)?,
        use_emojis: !args.no_emojis,
        text_style: parse_text_style(&args.text_style)?,
    };

    let batch = client.generate(&input, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    println!("Stage:  {}", batch.analysis.stage);
    println!("Intent: {}", batch.analysis.intent);
    println!("Advice: {}", batch.analysis.advice);
    println!();

    if let Some(reply) = client.current_reply().await {
        println!("[{:?}] {}", reply.risk, reply.text);
    }
    if args.all {
        while let Some(reply) = client.advance_reply().await {
            println!("[{:?}] {}", reply.risk, reply.text);
        }
    }

    if let Some(account) = client.account().await {
        println!();
        println!("{} credits remaining", account.credits);
    }

    Ok(())
}

async fn print_session_status(client: &AssistantClient) -> Result<()> {
    match client.account().await {
        Some(account) => println!(
            "Signed in as {} ({}, {} credits)",
            account.email,
            if account.is_premium { "premium" } else { "free" },
            account.credits
        ),
        None => println!("Not signed in. Pass --email to sign in."),
    }

    match client.reply_position().await {
        Some((cursor, total)) => {
            println!("Reply {} of {} from the last batch:", cursor + 1, total);
            if let Some(reply) = client.current_reply().await {
                println!("[{:?}] {}", reply.risk, reply.text);
            }
        }
        None => println!("No reply batch in progress."),
    }

    Ok(())
}

const TONES: [(&str, Tone); 8] = [
    ("polite", Tone::Polite),
    ("friendly", Tone::Friendly),
    ("confident", Tone::Confident),
    ("playful", Tone::Playful),
    ("flirty", Tone::Flirty),
    ("sarcastic", Tone::Sarcastic),
    ("casual", Tone::Casual),
    ("dramatic", Tone::Dramatic),
];

fn parse_tone(raw: &str) -> Result<Tone> {
    let lowered = raw.to_ascii_lowercase();
    match TONES.iter().find(|(name, _)| *name == lowered) {
        Some((_, tone)) => Ok(*tone),
        None => bail!("unknown tone '{raw}'; see --tones for the list"),
    }
}

fn parse_language(raw: &str) -> Result<Language> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "english" => Language::English,
        "hinglish" => Language::Hinglish,
        "hindi" => Language::Hindi,
        other => bail!("unknown language '{other}'"),
    })
}

fn parse_text_style(raw: &str) -> Result<TextStyle> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "standard" => TextStyle::Standard,
        "short" => TextStyle::Short,
        "cute" => TextStyle::Cute,
        "long" => TextStyle::Long,
        other => bail!("unknown text style '{other}'"),
    })
}
