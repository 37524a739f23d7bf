//! In-app notifications: `/notifications`

use anyhow::Result;

use super::client::ApiClient;
use super::error::ApiError;
use super::group_plans::Page;
use super::groups::print_ack;
use super::transport::ApiRequest;
use crate::models::{Ack, Notification};

pub async fn list_notifications_data(
    client: &ApiClient,
    page: Page,
) -> Result<Vec<Notification>, ApiError> {
    let request = ApiRequest::get("/notifications")
        .query("limit", page.limit)
        .query("offset", page.offset);
    client.send_json(request).await
}

pub async fn mark_read_data(client: &ApiClient, id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/notifications/{}/read", id)))
        .await
}

pub async fn delete_notification_data(client: &ApiClient, id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::delete(format!("/notifications/{}", id)))
        .await
}

pub(crate) fn print_notification(note: &Notification) {
    let mark = if note.read { " " } else { "*" };
    println!(
        "{} {:>5}  {:<8} {}",
        mark,
        note.id,
        note.kind.as_deref().unwrap_or("info"),
        note.message
    );
    if let Some(invite) = note.invite() {
        println!(
            "          -> 'study-planner invites accept {}' / 'decline {}'",
            invite, invite
        );
    }
}

pub async fn list_notifications(page: Page, unread_only: bool) -> Result<()> {
    let client = ApiClient::from_config()?;
    let notes = list_notifications_data(&client, page).await?;
    let unread = notes.iter().filter(|n| !n.read).count();

    println!("\nNotifications ({} unread):", unread);
    println!("{:-<60}", "");

    let shown: Vec<_> = notes.iter().filter(|n| !unread_only || !n.read).collect();
    if shown.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for note in shown {
        print_notification(note);
    }
    Ok(())
}

pub async fn mark_read(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = mark_read_data(&client, id).await?;
    print_ack(&ack, "Marked as read");
    Ok(())
}

pub async fn delete_notification(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = delete_notification_data(&client, id).await?;
    print_ack(&ack, "Deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::{
        client_with, session, CountingRedirect, RefreshBehavior, ScriptedTransport,
    };
    use crate::auth::MemoryTokenStore;
    use reqwest::StatusCode;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_list_after_expiry_refreshes_once() {
        let transport = Arc::new(ScriptedTransport::new(
            "T0",
            RefreshBehavior::Issue(session("T2", "R2")),
        ));
        transport.respond(
            "/notifications",
            StatusCode::OK,
            r#"[{"id":3,"message":"Ana invited you (inviteId: 12)","type":"invite","read":false,"created_at":null}]"#,
        );
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(
            &transport,
            MemoryTokenStore::with_session(&session("T1", "R1")),
            &redirect,
        );

        let notes = list_notifications_data(&client, Page::default()).await.unwrap();

        assert_eq!(notes[0].invite(), Some(12));
        assert_eq!(transport.refresh_calls(), 1);
        let sent = transport.requests_to("/notifications");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].bearer.as_deref(), Some("T2"));
        assert_eq!(sent[1].query, sent[0].query);
    }
}
