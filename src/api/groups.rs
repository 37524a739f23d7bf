//! Study groups: `/groups`

use anyhow::Result;

use super::client::ApiClient;
use super::error::ApiError;
use super::transport::ApiRequest;
use crate::models::{Ack, GroupMember, StudyGroup};

pub async fn list_groups_data(client: &ApiClient) -> Result<Vec<StudyGroup>, ApiError> {
    client.send_json(ApiRequest::get("/groups")).await
}

pub async fn create_group_data(
    client: &ApiClient,
    name: &str,
    description: Option<&str>,
) -> Result<StudyGroup, ApiError> {
    let body = serde_json::json!({
        "name": name,
        "description": description.unwrap_or(""),
    });
    client.send_json(ApiRequest::post("/groups").json(body)).await
}

pub async fn join_group_data(client: &ApiClient, group_id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/groups/{}/join", group_id)))
        .await
}

pub async fn leave_group_data(client: &ApiClient, group_id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/groups/{}/leave", group_id)))
        .await
}

pub async fn members_data(client: &ApiClient, group_id: i64) -> Result<Vec<GroupMember>, ApiError> {
    client
        .send_json(ApiRequest::get(format!("/groups/{}/members", group_id)))
        .await
}

/// Owner-only removal of another member.
pub async fn remove_member_data(
    client: &ApiClient,
    group_id: i64,
    member_id: i64,
) -> Result<Ack, ApiError> {
    let body = serde_json::json!({ "group_id": group_id, "member_id": member_id });
    client
        .send_json(ApiRequest::post("/invites/remove-member").json(body))
        .await
}

pub(crate) fn print_ack(ack: &Ack, fallback: &str) {
    if ack.msg.is_empty() {
        println!("{}", fallback);
    } else {
        println!("{}", ack.msg);
    }
}

/// List the groups you belong to (prints to stdout).
pub async fn list_groups() -> Result<()> {
    let client = ApiClient::from_config()?;
    let groups = list_groups_data(&client).await?;

    println!("\nStudy groups:");
    println!("{:-<60}", "");

    if groups.is_empty() {
        println!("  (no groups)");
        return Ok(());
    }

    for group in &groups {
        println!("{:>5}  {}", group.id, group.name);
        if let Some(ref desc) = group.description {
            if !desc.is_empty() {
                println!("       {}", desc);
            }
        }
    }
    Ok(())
}

pub async fn create_group(name: &str, description: Option<&str>) -> Result<()> {
    let client = ApiClient::from_config()?;
    let group = create_group_data(&client, name, description).await?;
    println!("Created group #{}: {}", group.id, group.name);
    Ok(())
}

pub async fn join_group(group_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = join_group_data(&client, group_id).await?;
    print_ack(&ack, "Joined group");
    Ok(())
}

pub async fn leave_group(group_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = leave_group_data(&client, group_id).await?;
    print_ack(&ack, "Left group");
    Ok(())
}

pub async fn list_members(group_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let members = members_data(&client, group_id).await?;

    println!("\nMembers of group #{}:", group_id);
    println!("{:-<60}", "");
    for m in &members {
        println!(
            "{:>5}  {:<8} {:<24} {}",
            m.user_id,
            m.role.as_deref().unwrap_or("member"),
            m.fullname.as_deref().unwrap_or("?"),
            m.email.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn remove_member(group_id: i64, member_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = remove_member_data(&client, group_id, member_id).await?;
    print_ack(&ack, "Member removed");
    Ok(())
}
