//! Server events pushed over the real-time channel

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Notification, StudyPlan};

/// Someone present in a room, as sent with `join`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresenceUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub fullname: Option<String>,
}

impl PresenceUser {
    pub fn label(&self) -> String {
        match (&self.fullname, self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("User #{}", id),
            (None, None) => "anonymous".to_string(),
        }
    }
}

/// `plan_updated` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanUpdate {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub plan: Option<StudyPlan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Presence(Vec<PresenceUser>),
    Notify(Notification),
    PlanUpdated(PlanUpdate),
    Unknown { name: String, data: Value },
}

impl ServerEvent {
    /// Payloads that fail to parse are kept as `Unknown`.
    pub fn parse(name: &str, data: Value) -> Self {
        let parsed = match name {
            "presence" => serde_json::from_value(data.clone()).map(ServerEvent::Presence),
            "notify" => serde_json::from_value(data.clone()).map(ServerEvent::Notify),
            "plan_updated" => serde_json::from_value(data.clone()).map(ServerEvent::PlanUpdated),
            _ => {
                return ServerEvent::Unknown {
                    name: name.to_string(),
                    data,
                }
            }
        };
        parsed.unwrap_or_else(|e| {
            tracing::debug!("Malformed {} payload: {}", name, e);
            ServerEvent::Unknown {
                name: name.to_string(),
                data,
            }
        })
    }
}

pub fn user_room(user_id: i64) -> String {
    format!("user:{}", user_id)
}

pub fn plan_room(plan_id: i64) -> String {
    format!("plan:{}", plan_id)
}
