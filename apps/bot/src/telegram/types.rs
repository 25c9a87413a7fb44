//! Bot API wire types. Only the fields the bot reads are modelled.

use serde::Deserialize;

use crate::telegram::TransportError;

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self, method: &'static str) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api {
                method,
                code: self.error_code.unwrap_or_default(),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        self.result.ok_or(TransportError::EmptyResult { method })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    /// Every resolution Telegram generated for the photo.
    pub photo: Option<Vec<PhotoSize>>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

impl ChatKind {
    /// Supergroups count as groups too, so the group gate covers both.
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    /// Relative download path, valid for at least an hour after `getFile`.
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_yields_result() {
        let raw = r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"Cap","username":"cap_bot"}}"#;
        let envelope: ApiResponse<User> = serde_json::from_str(raw).unwrap();
        let user = envelope.into_result("getMe").unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username.as_deref(), Some("cap_bot"));
    }

    #[test]
    fn test_error_envelope_becomes_api_error() {
        let raw = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let envelope: ApiResponse<User> = serde_json::from_str(raw).unwrap();
        match envelope.into_result("getMe") {
            Err(TransportError::Api {
                method,
                code,
                description,
            }) => {
                assert_eq!(method, "getMe");
                assert_eq!(code, 401);
                assert_eq!(description, "Unauthorized");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_ok_without_result_is_error() {
        let raw = r#"{"ok":true}"#;
        let envelope: ApiResponse<File> = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            envelope.into_result("getFile"),
            Err(TransportError::EmptyResult { method: "getFile" })
        ));
    }

    #[test]
    fn test_photo_update_parses() {
        let raw = r#"{
            "update_id": 1001,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": -100200, "type": "supergroup", "title": "friends"},
                "caption": "caption this",
                "photo": [
                    {"file_id": "small", "file_unique_id": "a", "width": 90, "height": 67},
                    {"file_id": "large", "file_unique_id": "b", "width": 1280, "height": 960}
                ]
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let message = update.message.unwrap();
        assert!(message.chat.kind.is_group());
        assert_eq!(message.photo.unwrap().len(), 2);
        assert_eq!(message.caption.as_deref(), Some("caption this"));
    }

    #[test]
    fn test_unknown_chat_type_tolerated() {
        let chat: Chat = serde_json::from_str(r#"{"id": 1, "type": "forum_topic"}"#).unwrap();
        assert_eq!(chat.kind, ChatKind::Unknown);
        assert!(!chat.kind.is_group());
    }
}
