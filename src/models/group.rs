//! Study group, invite and shared-plan models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
}

/// Entry of `/groups/{id}/members`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteAction {
    Accept,
    Decline,
}

impl InviteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteAction::Accept => "accept",
            InviteAction::Decline => "decline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInvite {
    pub id: i64,
    #[serde(default)]
    pub inviter_id: Option<i64>,
    #[serde(default)]
    pub invitee_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Plan shared with a whole group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPlan {
    pub id: i64,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<GroupPlanTask>,
    #[serde(default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub due: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPlanTask {
    pub id: i64,
    #[serde(default)]
    pub plan_id: Option<i64>,
    pub task: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    pub created_at: Option<String>,
}

/// Body for creating or updating a group plan task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupPlanTaskDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

/// Entry of `/group-plans/{id}/participants`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParticipant {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub joined_at: Option<String>,
}
