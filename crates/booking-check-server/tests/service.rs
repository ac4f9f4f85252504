//! Full process: bot commands, HTTP ingress and notification delivery.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use booking_check_server::{Error, NotifierService};

use common::{eventually, FakeBotApi};

const OWNER: i64 = 1;

#[tokio::test]
async fn test_subscribe_then_notify() {
    let (api, api_addr) = FakeBotApi::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), api_addr, OWNER);

    let service = NotifierService::start(&config).await.unwrap();
    let base = format!("http://{}", service.local_addr().unwrap());

    let (shutdown, _) = tokio::sync::broadcast::channel(1);
    let running = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run_until_shutdown(&shutdown).await })
    };

    assert!(eventually(|| !api.calls("setMyCommands").is_empty()).await);
    assert_eq!(api.calls("setMyDescription").len(), 1);

    api.push_message(77, "/subscribe");
    api.push_message(88, "/subscribe");
    assert!(
        eventually(|| {
            let texts = api.sent_texts();
            texts.contains(&(77, "User subscribed".to_string()))
                && texts.contains(&(88, "User subscribed".to_string()))
        })
        .await
    );

    let http = reqwest::Client::new();
    let mut subs: Vec<i64> = http
        .get(format!("{}/subs", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    subs.sort_unstable();
    assert_eq!(subs, vec![77, 88]);

    let image = b"screenshot";
    let event = serde_json::json!({
        "debug": false,
        "message": "Hours available!",
        "image": STANDARD.encode(image)
    });
    let response = http
        .post(format!("{}/scrapper/result", base))
        .body(event.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    assert!(
        eventually(|| {
            let texts = api.sent_texts();
            texts.contains(&(77, "Hours available!".to_string()))
                && texts.contains(&(88, "Hours available!".to_string()))
                && api.calls("sendPhoto").len() == 2
        })
        .await
    );
    assert!(!api
        .sent_texts()
        .iter()
        .any(|(chat, text)| *chat == OWNER && text == "Hours available!"));

    drop(http);
    shutdown.send(()).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_admin_commands_only_for_owner() {
    let (api, api_addr) = FakeBotApi::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), api_addr, OWNER);

    let service = NotifierService::start(&config).await.unwrap();
    let base = format!("http://{}", service.local_addr().unwrap());
    let (shutdown, _) = tokio::sync::broadcast::channel(1);
    let running = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run_until_shutdown(&shutdown).await })
    };

    api.push_message(99, "/enabledebug");
    api.push_message(99, "/me");
    assert!(eventually(|| api
        .sent_texts()
        .contains(&(99, "Your Telegram user ID is: `99`".to_string())))
    .await);
    assert!(!api.sent_texts().iter().any(|(_, text)| text == "Debug enabled"));

    api.push_message(OWNER, "/enabledebug");
    assert!(eventually(|| api
        .sent_texts()
        .contains(&(OWNER, "Debug enabled".to_string())))
    .await);

    let response = reqwest::Client::new()
        .post(format!("{}/scrapper/result", base))
        .body(r#"{"debug":true,"message":"page layout changed"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    assert!(eventually(|| api
        .sent_texts()
        .contains(&(OWNER, "page layout changed".to_string())))
    .await);

    api.push_message(OWNER, "/status");
    assert!(eventually(|| api.sent_texts().contains(&(
        OWNER,
        "System status:\n\nDebug status: true\nSubscriptions: []\n".to_string()
    )))
    .await);

    shutdown.send(()).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bot_profile_failure_stops_startup() {
    let (api, api_addr) = FakeBotApi::spawn().await;
    api.fail_method("setMyDescription");
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), api_addr, OWNER);

    let service = NotifierService::start(&config).await.unwrap();
    let (shutdown, _) = tokio::sync::broadcast::channel(1);

    let err = service.run_until_shutdown(&shutdown).await.unwrap_err();

    assert!(matches!(err, Error::Telegram(_)), "{}", err);
    assert!(api.calls("getUpdates").is_empty());
}

#[tokio::test]
async fn test_unreachable_nats_stops_startup() {
    let (_api, api_addr) = FakeBotApi::spawn().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let nats_addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), api_addr, OWNER)
        .with_nats_url(format!("nats://{}", nats_addr));

    let err = match NotifierService::start(&config).await {
        Ok(_) => panic!("startup should fail"),
        Err(e) => e,
    };
    assert!(
        matches!(err, Error::Core(booking_check_core::Error::Broker(_))),
        "{}",
        err
    );
}
