//! Real-time channel: presence, notifications and plan updates
//!
//! A Socket.IO client at the server origin, independent of the API client.
//! Rooms are re-joined after every reconnect.

pub mod events;
pub mod protocol;
pub mod websocket;

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time;

use crate::api::notifications::print_notification;
use crate::config::Config;
use events::ServerEvent;
use protocol::Frame;
use websocket::RealtimeSocket;

/// Backoff after a failed or short-lived connection: 1s, 2s, 4s, ... 64s.
const MAX_BACKOFF_SECS: u64 = 64;

/// A session that lasted this long resets the backoff.
const STABLE_AFTER: Duration = Duration::from_secs(60);

/// Reason the inner connection loop exited.
enum DisconnectReason {
    /// Clean shutdown (Ctrl+C). Do not reconnect.
    Shutdown,
    /// Error or server-initiated close. Should reconnect.
    Error(anyhow::Error),
}

/// What to join and who we are.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    pub origin: String,
    pub rooms: Vec<String>,
    pub user: Value,
}

impl ListenOptions {
    /// Join the user's own room (when known) plus the given plan rooms.
    pub fn from_config(config: &Config, plans: &[i64], extra_rooms: &[String]) -> Self {
        let mut rooms = Vec::new();
        if let Some(id) = config.user_id {
            rooms.push(events::user_room(id));
        }
        rooms.extend(plans.iter().map(|&id| events::plan_room(id)));
        rooms.extend(extra_rooms.iter().cloned());

        let user = serde_json::json!({
            "id": config.user_id,
            "fullname": config.user_name,
        });

        Self {
            origin: config.socket_origin(),
            rooms,
            user,
        }
    }
}

pub fn next_backoff(current: u64) -> u64 {
    (current * 2).min(MAX_BACKOFF_SECS)
}

/// Listen with automatic reconnection until Ctrl+C.
pub async fn listen(plans: Vec<i64>, rooms: Vec<String>) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let options = ListenOptions::from_config(&config, &plans, &rooms);
    if options.rooms.is_empty() {
        anyhow::bail!("Nothing to listen to. Log in first or pass --plan/--room.");
    }

    let mut backoff = 1u64;
    loop {
        let started = Instant::now();
        let reason = match run_session(&options).await {
            Ok(reason) => reason,
            Err(e) => DisconnectReason::Error(e),
        };

        let e = match reason {
            DisconnectReason::Shutdown => return Ok(()),
            DisconnectReason::Error(e) => e,
        };

        if started.elapsed() >= STABLE_AFTER {
            backoff = 1;
        }
        tracing::warn!("Disconnected: {:#}. Reconnecting in {}s...", e, backoff);

        tokio::select! {
            _ = time::sleep(Duration::from_secs(backoff)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                return Ok(());
            }
        }
        backoff = next_backoff(backoff);
    }
}

/// One connection: handshake, join rooms, event loop.
async fn run_session(options: &ListenOptions) -> Result<DisconnectReason> {
    let mut socket = RealtimeSocket::connect(&options.origin).await?;

    let mut liveness = socket.open.liveness_window();
    let mut deadline = Box::pin(time::sleep(liveness));
    let mut joined = false;

    println!("Connected. Listening for events... (Ctrl-C to stop)");

    let reason = loop {
        tokio::select! {
            frame = socket.recv_frame() => {
                let frame = match frame {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        break DisconnectReason::Error(anyhow::anyhow!("WebSocket closed by server"))
                    }
                    Err(e) => break DisconnectReason::Error(e),
                };
                deadline.as_mut().reset(time::Instant::now() + liveness);

                match frame {
                    Frame::Connected if !joined => {
                        if let Err(e) = join_rooms(&mut socket, options).await {
                            break DisconnectReason::Error(e);
                        }
                        joined = true;
                    }
                    Frame::Event { name, data } => handle_event(ServerEvent::parse(&name, data)),
                    Frame::ConnectError(data) => {
                        let e = anyhow::anyhow!("Connection refused by server: {}", data);
                        break DisconnectReason::Error(e);
                    }
                    Frame::Close | Frame::Disconnected => {
                        break DisconnectReason::Error(anyhow::anyhow!("Server closed the session"));
                    }
                    Frame::Open(info) => liveness = info.liveness_window(),
                    other => tracing::debug!("Frame: {:?}", other),
                }
            }
            _ = &mut deadline => {
                break DisconnectReason::Error(anyhow::anyhow!("No ping within {:?}", liveness));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                for room in &options.rooms {
                    let data = serde_json::json!({ "room": room });
                    if let Err(e) = socket.emit("leave", &data).await {
                        tracing::debug!("Leave {} failed: {:#}", room, e);
                    }
                }
                break DisconnectReason::Shutdown;
            }
        }
    };

    socket.close().await;
    Ok(reason)
}

async fn join_rooms(socket: &mut RealtimeSocket, options: &ListenOptions) -> Result<()> {
    for room in &options.rooms {
        let data = serde_json::json!({ "room": room, "user": options.user });
        socket.emit("join", &data).await?;
        tracing::info!("Joined room {}", room);
    }
    Ok(())
}

fn handle_event(event: ServerEvent) {
    match event {
        ServerEvent::Presence(users) => {
            let names: Vec<String> = users.iter().map(|u| u.label()).collect();
            println!("[PRESENCE] {} online: {}", names.len(), names.join(", "));
        }
        ServerEvent::Notify(note) => {
            print!("[NOTIFY] ");
            print_notification(&note);
        }
        ServerEvent::PlanUpdated(update) => {
            let kind = update.kind.as_deref().unwrap_or("updated");
            match update.plan {
                Some(plan) => println!(
                    "[PLAN] #{} {} ({})",
                    plan.id.unwrap_or_default(),
                    plan.title.as_deref().unwrap_or("Untitled"),
                    kind
                ),
                None => println!("[PLAN] {}", kind),
            }
        }
        ServerEvent::Unknown { name, data } => {
            tracing::debug!("Unhandled event {}: {}", name, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_caps_at_64() {
        let mut b = 1;
        let mut seen = vec![b];
        for _ in 0..8 {
            b = next_backoff(b);
            seen.push(b);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 64, 64, 64]);
    }

    #[test]
    fn test_listen_options_from_config() {
        let config = Config {
            api_base: Some("http://localhost:5000/api".into()),
            user_id: Some(7),
            user_name: Some("Ada".into()),
            ..Default::default()
        };
        let options = ListenOptions::from_config(&config, &[3], &["group:2".to_string()]);
        assert_eq!(options.rooms, vec!["user:7", "plan:3", "group:2"]);
        assert_eq!(options.user, serde_json::json!({ "id": 7, "fullname": "Ada" }));
    }
}
