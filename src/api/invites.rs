//! Group invites: `/invites`

use anyhow::Result;

use super::client::ApiClient;
use super::error::ApiError;
use super::groups::print_ack;
use super::transport::ApiRequest;
use crate::models::{Ack, GroupInvite, InviteAction};

/// Invite a user, identified by full name or email, to a group.
pub async fn send_invite_data(
    client: &ApiClient,
    group_id: i64,
    identifier: &str,
) -> Result<GroupInvite, ApiError> {
    let body = serde_json::json!({ "group_id": group_id, "identifier": identifier });
    client.send_json(ApiRequest::post("/invites/send").json(body)).await
}

pub async fn pending_invites_data(client: &ApiClient) -> Result<Vec<GroupInvite>, ApiError> {
    client.send_json(ApiRequest::get("/invites/pending")).await
}

pub async fn respond_invite_data(
    client: &ApiClient,
    invite_id: i64,
    action: InviteAction,
) -> Result<Ack, ApiError> {
    let body = serde_json::json!({ "action": action.as_str() });
    client
        .send_json(ApiRequest::post(format!("/invites/{}/respond", invite_id)).json(body))
        .await
}

pub async fn send_invite(group_id: i64, identifier: &str) -> Result<()> {
    let client = ApiClient::from_config()?;
    let invite = send_invite_data(&client, group_id, identifier).await?;
    println!("Invite #{} sent to {}.", invite.id, identifier);
    Ok(())
}

pub async fn list_pending() -> Result<()> {
    let client = ApiClient::from_config()?;
    let invites = pending_invites_data(&client).await?;

    println!("\nPending invites:");
    println!("{:-<60}", "");

    if invites.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for invite in &invites {
        println!(
            "{:>5}  group #{}  from user #{}  {}",
            invite.id,
            invite.group_id.unwrap_or_default(),
            invite.inviter_id.unwrap_or_default(),
            invite.created_at.as_deref().unwrap_or("")
        );
    }
    println!("\nAnswer with 'study-planner invites accept <id>' or 'decline <id>'.");
    Ok(())
}

pub async fn respond(invite_id: i64, action: InviteAction) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = respond_invite_data(&client, invite_id, action).await?;
    let fallback = match action {
        InviteAction::Accept => "Invite accepted",
        InviteAction::Decline => "Invite declined",
    };
    print_ack(&ack, fallback);
    Ok(())
}
