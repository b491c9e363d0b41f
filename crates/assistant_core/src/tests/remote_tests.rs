use axum::{http::StatusCode, routing::post, Json, Router};
use tokio::net::TcpListener;

use shared::domain::{
    ConversationAnalysis, GenerateOptions, GeneratedReplies, MessageInput, ReplyOption, RiskTier,
};
use shared::protocol::GenerateRequest;

use super::*;

async fn spawn_server(app: Router) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn sample_request() -> GenerateRequest {
    GenerateRequest::from_input(
        &MessageInput::Text("hey, long time!".to_string()),
        GenerateOptions::default(),
    )
}

fn batch_of(n: usize) -> GeneratedReplies {
    GeneratedReplies {
        analysis: ConversationAnalysis {
            stage: "Reconnecting".to_string(),
            intent: "Warm".to_string(),
            advice: "Match their energy".to_string(),
        },
        replies: (0..n)
            .map(|i| ReplyOption {
                id: format!("r{i}"),
                text: format!("reply {i}"),
                risk: RiskTier::Safe,
            })
            .collect(),
    }
}

fn sample_account(email: &str, is_premium: bool, credits: u32) -> Account {
    Account {
        name: "Remote User".to_string(),
        email: email.to_string(),
        is_premium,
        credits,
        last_credit_reset: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn generator_posts_request_and_decodes_batch() {
    let app = Router::new().route(
        "/replies/generate",
        post(|Json(request): Json<GenerateRequest>| async move {
            assert_eq!(request.text, "hey, long time!");
            assert_eq!(request.image_b64, None);
            Json(batch_of(3))
        }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let generator = HttpReplyGenerator::new(base_url);
    let batch = generator
        .generate_replies(sample_request())
        .await
        .expect("generate");

    assert_eq!(batch.replies.len(), 3);
    assert_eq!(batch.analysis.stage, "Reconnecting");
}

#[tokio::test]
async fn generator_treats_an_empty_batch_as_failure() {
    let app = Router::new().route(
        "/replies/generate",
        post(|| async { Json(batch_of(0)) }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let generator = HttpReplyGenerator::new(base_url);
    let err = generator
        .generate_replies(sample_request())
        .await
        .expect_err("empty batch");
    assert!(err.to_string().contains("no replies"));
}

#[tokio::test]
async fn generator_surfaces_http_error_statuses() {
    let app = Router::new().route(
        "/replies/generate",
        post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let generator = HttpReplyGenerator::new(base_url);
    assert!(generator.generate_replies(sample_request()).await.is_err());
}

#[tokio::test]
async fn directory_round_trips_get_or_create() {
    let app = Router::new().route(
        "/accounts/get_or_create",
        post(|Json(request): Json<AccountRequest>| async move {
            Json(sample_account(&request.email, false, 10))
        }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let directory = HttpAccountDirectory::new(base_url);
    let account = directory
        .get_or_create("new@example.com")
        .await
        .expect("get_or_create");

    assert_eq!(account.email, "new@example.com");
    assert_eq!(account.credits, 10);
    assert!(!account.is_premium);
}

#[tokio::test]
async fn directory_decrement_succeeds_on_ok_status() {
    let app = Router::new().route("/accounts/decrement", post(|| async { StatusCode::OK }));
    let base_url = spawn_server(app).await.expect("spawn server");

    let directory = HttpAccountDirectory::new(base_url);
    directory
        .decrement_credit("user@example.com")
        .await
        .expect("decrement");
}

#[tokio::test]
async fn directory_upgrade_returns_the_premium_record() {
    let app = Router::new().route(
        "/accounts/upgrade",
        post(|Json(request): Json<AccountRequest>| async move {
            Json(sample_account(&request.email, true, 50))
        }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let directory = HttpAccountDirectory::new(base_url);
    let account = directory.upgrade("user@example.com").await.expect("upgrade");

    assert!(account.is_premium);
    assert_eq!(account.credits, 50);
}

#[tokio::test]
async fn directory_surfaces_ledger_errors() {
    let app = Router::new().route(
        "/accounts/decrement",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base_url = spawn_server(app).await.expect("spawn server");

    let directory = HttpAccountDirectory::new(base_url);
    assert!(directory.decrement_credit("user@example.com").await.is_err());
}
