use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notice_monitor::config::DisplayOptions;
use notice_monitor::error::DeliveryError;
use notice_monitor::models::{CategoryGrouping, NoticeRecord};
use notice_monitor::notifier::{
    BotChannel, DeliveryChannel, DeliveryPath, Notifier, WebhookChannel,
};
use notice_monitor::Config;

fn records() -> Vec<NoticeRecord> {
    vec![
        NoticeRecord::new(
            "근로장학생 모집 공고",
            "https://example.ac.kr/n/1256",
            "2025.09.09",
            "178",
            "장학",
            false,
        ),
        NoticeRecord::new(
            "수강신청 안내",
            "https://example.ac.kr/n/1250",
            "2025.09.01",
            "1204",
            "학사",
            true,
        ),
    ]
}

fn bot(server: &MockServer) -> Box<dyn DeliveryChannel> {
    Box::new(BotChannel::new(Client::new(), &server.uri(), "xoxb-test", "C0123"))
}

fn webhook(server: &MockServer) -> Box<dyn DeliveryChannel> {
    Box::new(WebhookChannel::new(Client::new(), &format!("{}/hook", server.uri())))
}

fn notifier(
    primary: Option<Box<dyn DeliveryChannel>>,
    secondary: Option<Box<dyn DeliveryChannel>>,
) -> Notifier {
    let grouping = CategoryGrouping {
        priority: vec!["장학".to_string(), "학사".to_string()],
        empty_label: None,
    };
    Notifier::new(primary, secondary, DisplayOptions::default(), grouping)
}

#[tokio::test]
async fn bot_post_returns_message_ts() {
    let server = MockServer::start().await;
    let posted = json!({"ok": true, "ts": "1725860000.000100"});
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_partial_json(json!({
            "channel": "C0123",
            "text": "🔔 *일반대학원* has new notices!",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(posted))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = notifier(Some(bot(&server)), Some(webhook(&server)))
        .notify("일반대학원", records())
        .await
        .unwrap();

    assert_eq!(receipt.path, DeliveryPath::Primary);
    assert_eq!(receipt.id.as_deref(), Some("1725860000.000100"));
}

#[tokio::test]
async fn rate_limit_waits_then_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .expect(2)
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = notifier(Some(bot(&server)), None)
        .notify("일반대학원", records())
        .await;

    assert!(started.elapsed() >= Duration::from_secs(2));
    match result {
        Err(DeliveryError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(2))
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn ratelimited_api_error_counts_as_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({"ok": false, "error": "ratelimited"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1.2"})))
        .mount(&server)
        .await;

    let receipt = notifier(Some(bot(&server)), None)
        .notify("site", records())
        .await
        .unwrap();
    assert_eq!(receipt.id.as_deref(), Some("1.2"));
}

#[tokio::test]
async fn falls_back_to_webhook_when_bot_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({"text": "🔔 *site* has new notices!"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = notifier(Some(bot(&server)), Some(webhook(&server)))
        .notify("site", records())
        .await
        .unwrap();

    assert_eq!(receipt.path, DeliveryPath::Secondary);
    assert_eq!(receipt.id, None);
}

#[tokio::test]
async fn webhook_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = notifier(None, Some(webhook(&server)))
        .notify("site", records())
        .await
        .unwrap();
    assert_eq!(receipt.path, DeliveryPath::Secondary);
}

#[tokio::test]
async fn both_paths_failing_reports_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .mount(&server)
        .await;

    let result = notifier(Some(bot(&server)), Some(webhook(&server)))
        .notify("site", records())
        .await;

    match result {
        Err(DeliveryError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "no_service");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn nothing_configured_is_an_error() {
    let result = notifier(None, None).notify("site", records()).await;
    assert!(matches!(result, Err(DeliveryError::NotConfigured)));
}

#[tokio::test]
async fn placeholder_webhook_is_ignored() {
    let config = Config::bootstrap();
    let result = Notifier::from_config(&config)
        .unwrap()
        .notify("site", records())
        .await;
    assert!(matches!(result, Err(DeliveryError::NotConfigured)));
}

#[tokio::test]
async fn configured_client_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("user-agent", "notice-monitor/slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        slack_webhook_url: Some(format!("{}/hook", server.uri())),
        user_agent: "notice-monitor/slack".to_string(),
        request_timeout_secs: 5,
        ..Config::default()
    };
    let receipt = Notifier::from_config(&config)
        .unwrap()
        .notify("site", records())
        .await
        .unwrap();
    assert_eq!(receipt.path, DeliveryPath::Secondary);
}
