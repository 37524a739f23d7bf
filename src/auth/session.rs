//! Login, registration, logout and session status

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

use super::tokens::{Session, TokenState};
use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::api::transport::ApiRequest;
use crate::config::Config;
use crate::models::{AuthResponse, MeResponse, User};

const PASSWORD_ENV: &str = "STUDY_PLANNER_PASSWORD";

/// Post credentials, store the issued session, then load the profile.
async fn authenticate(client: &ApiClient, request: ApiRequest) -> Result<Option<User>, ApiError> {
    let path = request.path.clone();
    let auth: AuthResponse = client.send_unauthenticated(request).await?.json(&path)?;

    client.store_session(&Session {
        access_token: auth.access_token,
        refresh_token: auth.refresh_token,
    });

    Ok(load_user(client).await.or(auth.user))
}

pub async fn sign_in(
    client: &ApiClient,
    email: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let body = serde_json::json!({ "email": email, "password": password });
    authenticate(client, ApiRequest::post("/auth/login").json(body)).await
}

pub async fn sign_up(
    client: &ApiClient,
    fullname: &str,
    email: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let body = serde_json::json!({ "fullname": fullname, "email": email, "password": password });
    authenticate(client, ApiRequest::post("/auth/register").json(body)).await
}

/// Current user, or `None` when not logged in or the lookup fails.
/// Makes no request without a stored access token.
pub async fn load_user(client: &ApiClient) -> Option<User> {
    client.access_token()?;

    match client.send_json::<MeResponse>(ApiRequest::get("/auth/me")).await {
        Ok(me) => me.user,
        Err(e) => {
            tracing::debug!("Could not load user: {}", e);
            None
        }
    }
}

/// Tell the backend (best effort), drop the local session and go to the
/// login boundary.
pub async fn sign_out(client: &ApiClient) {
    if client.access_token().is_some() {
        if let Err(e) = client.execute_once(ApiRequest::post("/auth/logout")).await {
            tracing::debug!("Logout request failed (ignored): {}", e);
        }
    }
    client.clear_session();
    client.redirect_to_login();
}

fn read_password() -> Result<String> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(pw);
    }

    print!("Password: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn remember_user(user: &Option<User>) -> Result<()> {
    if let Some(user) = user {
        let mut config = Config::load()?;
        config.set_user(user.id, &user.fullname);
        config.save()?;
    }
    Ok(())
}

/// Log in with email and password
pub async fn login(email: &str, force: bool) -> Result<()> {
    let client = ApiClient::from_config()?;

    if !force {
        if let TokenState::Valid { .. } = TokenState::of(client.access_token().as_deref()) {
            println!("Already logged in (access token valid). Use --force to re-authenticate.");
            return Ok(());
        }
    }

    let password = read_password()?;
    tracing::info!("Signing in as {}...", email);
    let user = sign_in(&client, email, &password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {}", e.user_message()))?;

    remember_user(&user)?;
    match user {
        Some(user) => println!("Logged in as {} <{}>.", user.fullname, user.email),
        None => println!("Login successful."),
    }
    Ok(())
}

/// Create an account and log in
pub async fn register(fullname: &str, email: &str) -> Result<()> {
    let client = ApiClient::from_config()?;
    let password = read_password()?;
    if password.len() < 6 {
        bail!("Password must be at least 6 characters");
    }

    let user = sign_up(&client, fullname, email, &password)
        .await
        .map_err(|e| anyhow::anyhow!("Registration failed: {}", e.user_message()))?;

    remember_user(&user)?;
    println!("Account created. Logged in as {}.", fullname);
    Ok(())
}

/// Clear stored credentials
pub async fn logout() -> Result<()> {
    let client = ApiClient::from_config()?;
    sign_out(&client).await;
    println!("Logged out.");
    Ok(())
}

/// Display current auth status
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    println!("API base:    {}", config.api_base());

    match TokenState::of(config.access_token.as_deref()) {
        TokenState::Valid { expires_at } => {
            println!("Access tok:  valid");
            println!("  expires_at: {}", expires_at);
        }
        TokenState::Expired { expired_at } => {
            println!("Access tok:  expired (will refresh on next request)");
            println!("  expired_at: {}", expired_at);
        }
        TokenState::Opaque => println!("Access tok:  present"),
        TokenState::Absent => println!("Access tok:  none"),
    }

    match config.refresh_token {
        Some(_) => println!("Refresh tok: present"),
        None => println!("Refresh tok: none"),
    }

    if let Some(ref name) = config.user_name {
        println!("User:        {} (#{})", name, config.user_id.unwrap_or_default());
    }

    if config.access_token.is_none() && config.refresh_token.is_none() {
        println!("\nRun 'study-planner login' to authenticate.");
    }

    Ok(())
}

/// Show current user info (verifies auth works)
pub async fn whoami() -> Result<()> {
    let client = ApiClient::from_config()?;
    if client.access_token().is_none() && client.refresh_token().is_none() {
        bail!("Not logged in. Run 'study-planner login' first.");
    }

    let me: MeResponse = client
        .send_json(ApiRequest::get("/auth/me"))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    let user = me.user.context("Server returned no user")?;

    println!();
    println!("Name:    {}", user.fullname);
    println!("Email:   {}", user.email);
    println!("ID:      {}", user.id);
    if let Some(ref created) = user.created_at {
        println!("Joined:  {}", created);
    }

    Ok(())
}
