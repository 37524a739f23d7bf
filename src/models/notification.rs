//! Notification models

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// In-app notification, as listed by `/notifications` and pushed on `notify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub invite_id: Option<i64>,
    pub created_at: Option<String>,
}

impl Notification {
    /// Invite this notification refers to: the explicit field, or one
    /// mentioned in the message text.
    pub fn invite(&self) -> Option<i64> {
        self.invite_id
            .or_else(|| invite_id_from_message(&self.message))
    }
}

/// Extract `inviteId: N` (or `inviteId=N`, any case) from a message.
pub fn invite_id_from_message(message: &str) -> Option<i64> {
    static INVITE_RE: OnceLock<Regex> = OnceLock::new();
    let re = INVITE_RE.get_or_init(|| {
        Regex::new(r"(?i)inviteId\s*[:=]\s*(\d+)").expect("invite id pattern is valid")
    });
    re.captures(message)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_id_from_message() {
        assert_eq!(
            invite_id_from_message("You were invited to join 'Algo' by Ana (inviteId: 123)"),
            Some(123)
        );
        assert_eq!(invite_id_from_message("INVITEID=7"), Some(7));
        assert_eq!(invite_id_from_message("inviteId : 42 trailing"), Some(42));
        assert_eq!(invite_id_from_message("no invite here"), None);
        assert_eq!(invite_id_from_message(""), None);
    }

    #[test]
    fn test_notification_invite_prefers_field() {
        let note: Notification = serde_json::from_str(
            r#"{"id":1,"message":"inviteId: 9","type":"invite","read":false,"invite_id":4,"created_at":null}"#,
        )
        .unwrap();
        assert_eq!(note.kind.as_deref(), Some("invite"));
        assert_eq!(note.invite(), Some(4));

        let note = Notification {
            invite_id: None,
            ..note
        };
        assert_eq!(note.invite(), Some(9));
    }
}
