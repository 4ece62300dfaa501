use super::polling::parse_chat_id;
use super::types::TgUser;
use super::TelegramConnector;
use parley_core::{
    config::TelegramConfig,
    error::ParleyError,
    message::{ChannelKind, Message, MessageContent, MessageMeta, MessageStatus, Participant},
    traits::Connector,
};
use serde_json::json;

fn connector(token: &str) -> TelegramConnector {
    TelegramConnector::with_api_root(
        TelegramConfig {
            enabled: true,
            bot_token: token.into(),
            typing_delay_min_ms: 10,
            typing_delay_max_ms: 20,
        },
        "http://127.0.0.1:9/",
    )
}

async fn connector_as_bot() -> TelegramConnector {
    let c = connector("123:abc");
    *c.me.write().await = Some(TgUser {
        id: 999,
        is_bot: true,
        first_name: "Parley".into(),
        last_name: None,
        username: Some("parley_bot".into()),
    });
    c
}

fn private_text(from_id: i64, chat_id: i64, text: &str) -> serde_json::Value {
    json!({
        "update_id": 10,
        "message": {
            "message_id": 1,
            "from": {"id": from_id, "is_bot": false, "first_name": "Jane", "last_name": "Doe", "username": "jane"},
            "chat": {"id": chat_id, "type": "private"},
            "date": 1_700_000_000,
            "text": text
        }
    })
}

#[test]
fn test_urls_use_custom_root() {
    let c = connector("123:abc");
    assert_eq!(c.base_url, "http://127.0.0.1:9/bot123:abc");
    assert_eq!(c.file_base_url, "http://127.0.0.1:9/file/bot123:abc");
}

#[tokio::test]
async fn test_parse_incoming_private_text() {
    let c = connector_as_bot().await;
    let msg = c
        .parse_raw(private_text(42, 42, "hola"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(msg.chat_id, "42");
    assert_eq!(msg.content.text, "hola");
    assert_eq!(msg.channel, ChannelKind::Telegram);
    assert_eq!(msg.sender.id, "42");
    assert_eq!(msg.sender.name, "Jane Doe");
    assert_eq!(msg.sender.username, "jane");
    assert!(!msg.sender.is_me);
    assert!(msg.receiver.is_me);
    assert_eq!(msg.receiver.id, "999");
    assert_eq!(msg.timestamp.timestamp(), 1_700_000_000);
    assert!(!msg.is_bot_message);
}

#[tokio::test]
async fn test_parse_own_message_is_outgoing() {
    let c = connector_as_bot().await;
    let msg = c
        .parse_raw(private_text(999, 42, "sent by me"))
        .await
        .unwrap()
        .unwrap();
    assert!(msg.sender.is_me);
    assert!(!msg.receiver.is_me);
    assert_eq!(msg.receiver.id, "42");
}

#[tokio::test]
async fn test_parse_caption_when_no_text() {
    let c = connector_as_bot().await;
    let raw = json!({
        "update_id": 11,
        "message": {
            "message_id": 2,
            "from": {"id": 42, "first_name": "Jane"},
            "chat": {"id": 42, "type": "private"},
            "date": 1_700_000_000,
            "caption": "look at this"
        }
    });
    let msg = c.parse_raw(raw).await.unwrap().unwrap();
    assert_eq!(msg.content.text, "look at this");
    assert_eq!(msg.sender.username, "42");
}

#[tokio::test]
async fn test_parse_ignores_groups_and_non_messages() {
    let c = connector_as_bot().await;
    let group = json!({
        "update_id": 12,
        "message": {
            "message_id": 3,
            "from": {"id": 42, "first_name": "Jane"},
            "chat": {"id": -100, "type": "group"},
            "date": 1_700_000_000,
            "text": "hi all"
        }
    });
    assert!(c.parse_raw(group).await.unwrap().is_none());

    let edited = json!({"update_id": 13, "edited_message": {}});
    assert!(c.parse_raw(edited).await.unwrap().is_none());
}

#[tokio::test]
async fn test_parse_rejects_garbage() {
    let c = connector_as_bot().await;
    let err = c.parse_raw(json!({"nope": true})).await.unwrap_err();
    assert!(matches!(err, ParleyError::Serialization(_)));
}

#[tokio::test]
async fn test_connect_requires_token() {
    let c = connector("");
    let err = c.connect().await.unwrap_err();
    assert!(matches!(err, ParleyError::Config(_)));
    assert!(!c.is_connected().await);
}

#[tokio::test]
async fn test_send_rejects_non_numeric_chat() {
    let c = connector("123:abc");
    let party = |id: &str, is_me| Participant {
        id: id.into(),
        name: String::new(),
        username: id.into(),
        is_me,
    };
    let msg = Message {
        id: uuid::Uuid::new_v4(),
        chat_id: "not-a-number".into(),
        sender: party("999", true),
        receiver: party("42", false),
        timestamp: chrono::Utc::now(),
        content: MessageContent::text("hi"),
        meta: MessageMeta::default(),
        status: MessageStatus::Pending,
        channel: ChannelKind::Telegram,
        is_bot_message: true,
    };
    let err = c.send_message(&msg).await.unwrap_err();
    assert!(matches!(err, ParleyError::Channel(_)));
}

#[test]
fn test_parse_chat_id() {
    assert_eq!(parse_chat_id("-1001").unwrap(), -1001);
    assert!(parse_chat_id("abc").is_err());
}

#[test]
fn test_typing_delay_within_bounds() {
    let c = connector("123:abc");
    for _ in 0..50 {
        let d = c.typing_delay().as_millis();
        assert!((10..=20).contains(&d));
    }
}
