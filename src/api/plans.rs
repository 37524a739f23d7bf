//! Personal study plans: `/plans`

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::client::ApiClient;
use super::error::ApiError;
use super::transport::ApiRequest;
use crate::ics;
use crate::models::{Ack, GenerateRequest, StudyPlan};

/// Title given to a plan saved without one.
pub const DEFAULT_PLAN_TITLE: &str = "Saved Plan";

pub async fn list_plans_data(client: &ApiClient) -> Result<Vec<StudyPlan>, ApiError> {
    client.send_json(ApiRequest::get("/plans")).await
}

pub async fn get_plan_data(client: &ApiClient, id: i64) -> Result<StudyPlan, ApiError> {
    client.send_json(ApiRequest::get(format!("/plans/{}", id))).await
}

/// Save `content` as a new plan.
pub async fn create_plan_data(
    client: &ApiClient,
    title: &str,
    content: &serde_json::Map<String, serde_json::Value>,
) -> Result<StudyPlan, ApiError> {
    let body = serde_json::json!({ "title": title, "content": content });
    client.send_json(ApiRequest::post("/plans").json(body)).await
}

/// Change title and/or content; `None` keeps the current value.
pub async fn update_plan_data(
    client: &ApiClient,
    id: i64,
    title: Option<&str>,
    content: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<StudyPlan, ApiError> {
    let mut body = serde_json::Map::new();
    if let Some(title) = title {
        body.insert("title".into(), title.into());
    }
    if let Some(content) = content {
        body.insert("content".into(), serde_json::Value::Object(content.clone()));
    }
    client
        .send_json(ApiRequest::put(format!("/plans/{}", id)).json(body.into()))
        .await
}

/// Save a previewed or hand-edited plan: update in place when it carries
/// an id, create it otherwise.
pub async fn save_plan_data(client: &ApiClient, plan: &StudyPlan) -> Result<StudyPlan, ApiError> {
    let title = plan
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_PLAN_TITLE);
    match plan.id {
        Some(id) => update_plan_data(client, id, Some(title), Some(&plan.content)).await,
        None => create_plan_data(client, title, &plan.content).await,
    }
}

pub async fn delete_plan_data(client: &ApiClient, id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::delete(format!("/plans/{}", id)))
        .await
}

/// Round-robin the given (or all open) tasks over `days`. With `save` unset
/// the backend returns an unsaved preview with no `id`.
pub async fn generate_plan_data(
    client: &ApiClient,
    request: &GenerateRequest,
) -> Result<StudyPlan, ApiError> {
    client
        .send_json(ApiRequest::post("/plans/generate").json_of(request)?)
        .await
}

pub async fn regenerate_plan_data(client: &ApiClient, id: i64) -> Result<StudyPlan, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/plans/{}/regenerate", id)))
        .await
}

fn print_plan(plan: &StudyPlan) {
    let title = plan.title.as_deref().unwrap_or("(preview)");
    match plan.id {
        Some(id) => println!("\nPlan #{}: {}", id, title),
        None => println!("\n{}", title),
    }
    println!("{:-<60}", "");

    for day in plan.days() {
        println!("{}:", day.label);
        if day.items.is_empty() {
            println!("  (rest day)");
        }
        for item in &day.items {
            println!(
                "  {:>4}m  {}",
                item.minutes(),
                item.task.as_deref().unwrap_or("Study")
            );
            if let Some(ref notes) = item.notes {
                if !notes.is_empty() {
                    println!("         {}", notes);
                }
            }
        }
    }
    println!("\nTotal: {} min", plan.total_minutes());
}

/// List saved plans (prints to stdout).
pub async fn list_plans() -> Result<()> {
    let client = ApiClient::from_config()?;
    let plans = list_plans_data(&client).await?;

    println!("\nStudy plans:");
    println!("{:-<60}", "");

    if plans.is_empty() {
        println!("  (no plans)");
        return Ok(());
    }

    for plan in &plans {
        println!(
            "{:>5}  {:<30} {} day(s)  {}",
            plan.id.unwrap_or_default(),
            plan.title.as_deref().unwrap_or("Untitled"),
            plan.content.len(),
            plan.generated_at.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn show_plan(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = get_plan_data(&client, id).await?;
    print_plan(&plan);
    Ok(())
}

pub async fn generate_plan(
    days: u32,
    task_ids: Option<Vec<i64>>,
    save: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let client = ApiClient::from_config()?;
    tracing::info!("Generating {}-day plan...", days);
    let request = GenerateRequest {
        days,
        task_ids,
        save,
    };
    let plan = generate_plan_data(&client, &request).await?;
    print_plan(&plan);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&plan)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "Plan written to {}; edit it and run 'study-planner plans save {}'",
            path.display(),
            path.display()
        );
    } else if plan.id.is_none() {
        println!("(not saved; pass --save to keep it)");
    }
    Ok(())
}

/// Save a plan read from a JSON file, as written by `plans generate --output`.
pub async fn save_plan(file: PathBuf, title: Option<String>) -> Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut plan: StudyPlan = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a study plan", file.display()))?;
    if title.is_some() {
        plan.title = title;
    }

    let client = ApiClient::from_config()?;
    let saved = save_plan_data(&client, &plan).await?;
    println!(
        "Saved plan #{}: {}",
        saved.id.unwrap_or_default(),
        saved.title.as_deref().unwrap_or(DEFAULT_PLAN_TITLE)
    );
    Ok(())
}

pub async fn regenerate_plan(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = regenerate_plan_data(&client, id).await?;
    print_plan(&plan);
    Ok(())
}

pub async fn rename_plan(id: i64, title: &str) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = update_plan_data(&client, id, Some(title), None).await?;
    println!(
        "Plan #{} renamed to '{}'.",
        id,
        plan.title.as_deref().unwrap_or(title)
    );
    Ok(())
}

/// Save a copy of an existing plan under a new title.
pub async fn duplicate_plan(id: i64, title: Option<String>) -> Result<()> {
    let client = ApiClient::from_config()?;
    let source = get_plan_data(&client, id).await?;
    let title = title.unwrap_or_else(|| {
        format!("{} (copy)", source.title.as_deref().unwrap_or(DEFAULT_PLAN_TITLE))
    });
    let plan = create_plan_data(&client, &title, &source.content).await?;
    println!(
        "Saved plan #{}: {}",
        plan.id.unwrap_or_default(),
        plan.title.as_deref().unwrap_or(&title)
    );
    Ok(())
}

pub async fn delete_plan(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = delete_plan_data(&client, id).await?;
    println!("{}", if ack.msg.is_empty() { "Deleted" } else { &ack.msg });
    Ok(())
}

/// Write a plan as an iCalendar file. Defaults to `<title>.ics` in the
/// current directory.
pub async fn export_plan(id: i64, output: Option<PathBuf>) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = get_plan_data(&client, id).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(ics::file_name(plan.title.as_deref())));
    let calendar = ics::plan_to_ics(&plan, chrono::Utc::now());
    std::fs::write(&path, calendar)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported plan #{} to {}", id, path.display());
    Ok(())
}
