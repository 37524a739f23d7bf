//! Plans shared within a study group: `/group-plans`

use anyhow::Result;

use super::client::ApiClient;
use super::error::ApiError;
use super::groups::print_ack;
use super::transport::ApiRequest;
use crate::models::{Ack, GroupPlan, GroupPlanTask, GroupPlanTaskDraft, PlanParticipant};

/// Page of `/group-plans/{group_id}`; the backend defaults to 50/0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

pub async fn create_group_plan_data(
    client: &ApiClient,
    group_id: i64,
    title: &str,
    description: Option<&str>,
    due: Option<&str>,
    tasks: &[GroupPlanTaskDraft],
) -> Result<GroupPlan, ApiError> {
    let body = serde_json::json!({
        "title": title,
        "description": description.unwrap_or(""),
        "due": due,
        "content": { "tasks": tasks },
    });
    client
        .send_json(ApiRequest::post(format!("/group-plans/{}", group_id)).json(body))
        .await
}

pub async fn list_group_plans_data(
    client: &ApiClient,
    group_id: i64,
    page: Page,
) -> Result<Vec<GroupPlan>, ApiError> {
    let request = ApiRequest::get(format!("/group-plans/{}", group_id))
        .query("limit", page.limit)
        .query("offset", page.offset);
    client.send_json(request).await
}

pub async fn view_group_plan_data(client: &ApiClient, plan_id: i64) -> Result<GroupPlan, ApiError> {
    client
        .send_json(ApiRequest::get(format!("/group-plans/view/{}", plan_id)))
        .await
}

pub async fn join_group_plan_data(client: &ApiClient, plan_id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/group-plans/{}/join", plan_id)))
        .await
}

pub async fn leave_group_plan_data(client: &ApiClient, plan_id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/group-plans/{}/leave", plan_id)))
        .await
}

pub async fn participants_data(
    client: &ApiClient,
    plan_id: i64,
) -> Result<Vec<PlanParticipant>, ApiError> {
    client
        .send_json(ApiRequest::get(format!("/group-plans/{}/participants", plan_id)))
        .await
}

pub async fn delete_group_plan_data(client: &ApiClient, plan_id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::delete(format!("/group-plans/{}", plan_id)))
        .await
}

/// Creator or group owner only. `Some("")` for `due` clears it.
pub async fn update_group_plan_data(
    client: &ApiClient,
    plan_id: i64,
    title: Option<&str>,
    description: Option<&str>,
    due: Option<&str>,
) -> Result<GroupPlan, ApiError> {
    let mut body = serde_json::Map::new();
    if let Some(title) = title {
        body.insert("title".into(), title.into());
    }
    if let Some(description) = description {
        body.insert("description".into(), description.into());
    }
    if let Some(due) = due {
        body.insert("due".into(), due.into());
    }
    client
        .send_json(ApiRequest::put(format!("/group-plans/{}", plan_id)).json(body.into()))
        .await
}

pub async fn tasks_data(client: &ApiClient, plan_id: i64) -> Result<Vec<GroupPlanTask>, ApiError> {
    client
        .send_json(ApiRequest::get(format!("/group-plans/{}/tasks", plan_id)))
        .await
}

pub async fn add_task_data(
    client: &ApiClient,
    plan_id: i64,
    draft: &GroupPlanTaskDraft,
) -> Result<GroupPlanTask, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/group-plans/{}/tasks", plan_id)).json_of(draft)?)
        .await
}

pub async fn update_task_data(
    client: &ApiClient,
    plan_id: i64,
    task_id: i64,
    draft: &GroupPlanTaskDraft,
) -> Result<GroupPlanTask, ApiError> {
    let path = format!("/group-plans/{}/tasks/{}", plan_id, task_id);
    client.send_json(ApiRequest::put(path).json_of(draft)?).await
}

pub async fn delete_task_data(
    client: &ApiClient,
    plan_id: i64,
    task_id: i64,
) -> Result<Ack, ApiError> {
    let path = format!("/group-plans/{}/tasks/{}", plan_id, task_id);
    client.send_json(ApiRequest::delete(path)).await
}

fn print_task_row(task: &GroupPlanTask) {
    println!(
        "{:>5}  P{}  {:>4}m  {:<12} {}",
        task.id,
        task.priority.unwrap_or(3),
        task.duration.unwrap_or(30),
        task.due.as_deref().unwrap_or("-"),
        task.task
    );
}

pub async fn list_group_plans(group_id: i64, page: Page) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plans = list_group_plans_data(&client, group_id, page).await?;

    println!("\nPlans of group #{}:", group_id);
    println!("{:-<60}", "");

    if plans.is_empty() {
        println!("  (no plans)");
        return Ok(());
    }

    for plan in &plans {
        println!(
            "{:>5}  {:<30} {} task(s)  due {}",
            plan.id,
            plan.title,
            plan.tasks.len(),
            plan.due.as_deref().unwrap_or("-")
        );
    }
    if plans.len() as u32 == page.limit {
        println!("\nMore may exist: use --offset {}", page.offset + page.limit);
    }
    Ok(())
}

pub async fn create_group_plan(
    group_id: i64,
    title: &str,
    description: Option<&str>,
    due: Option<&str>,
    tasks: Vec<String>,
) -> Result<()> {
    let client = ApiClient::from_config()?;
    let drafts: Vec<GroupPlanTaskDraft> = tasks
        .into_iter()
        .map(|task| GroupPlanTaskDraft {
            task: Some(task),
            ..Default::default()
        })
        .collect();
    let plan = create_group_plan_data(&client, group_id, title, description, due, &drafts).await?;
    println!("Created group plan #{}: {}", plan.id, plan.title);
    Ok(())
}

pub async fn show_group_plan(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = view_group_plan_data(&client, plan_id).await?;

    println!("\nGroup plan #{}: {}", plan.id, plan.title);
    if let Some(ref desc) = plan.description {
        if !desc.is_empty() {
            println!("  {}", desc);
        }
    }
    if let Some(ref due) = plan.due {
        println!("Due: {}", due);
    }
    println!("{:-<60}", "");
    if plan.tasks.is_empty() {
        println!("  (no tasks)");
    }
    for task in &plan.tasks {
        print_task_row(task);
    }
    Ok(())
}

pub async fn join_group_plan(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = join_group_plan_data(&client, plan_id).await?;
    print_ack(&ack, "Joined plan");
    Ok(())
}

pub async fn leave_group_plan(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = leave_group_plan_data(&client, plan_id).await?;
    print_ack(&ack, "Left plan");
    Ok(())
}

pub async fn list_participants(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let people = participants_data(&client, plan_id).await?;

    println!("\nParticipants of plan #{}:", plan_id);
    println!("{:-<60}", "");
    if people.is_empty() {
        println!("  (nobody yet)");
    }
    for p in &people {
        println!(
            "{:>5}  {:<24} {}",
            p.user_id,
            p.fullname.as_deref().unwrap_or("?"),
            p.email.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn update_group_plan(
    plan_id: i64,
    title: Option<&str>,
    description: Option<&str>,
    due: Option<&str>,
) -> Result<()> {
    let client = ApiClient::from_config()?;
    let plan = update_group_plan_data(&client, plan_id, title, description, due).await?;
    println!("Updated group plan #{}: {}", plan.id, plan.title);
    Ok(())
}

pub async fn delete_group_plan(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = delete_group_plan_data(&client, plan_id).await?;
    print_ack(&ack, "Plan deleted");
    Ok(())
}

pub async fn list_tasks(plan_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let tasks = tasks_data(&client, plan_id).await?;

    println!("\nTasks of group plan #{}:", plan_id);
    println!("{:-<60}", "");
    if tasks.is_empty() {
        println!("  (no tasks)");
    }
    for task in &tasks {
        print_task_row(task);
    }
    Ok(())
}

pub async fn add_task(plan_id: i64, draft: GroupPlanTaskDraft) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = add_task_data(&client, plan_id, &draft).await?;
    println!("Added task #{}: {}", task.id, task.task);
    Ok(())
}

pub async fn update_task(plan_id: i64, task_id: i64, draft: GroupPlanTaskDraft) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = update_task_data(&client, plan_id, task_id, &draft).await?;
    println!("Updated task #{}: {}", task.id, task.task);
    Ok(())
}

pub async fn delete_task(plan_id: i64, task_id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = delete_task_data(&client, plan_id, task_id).await?;
    print_ack(&ack, "Task deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::{
        client_with, session, CountingRedirect, RefreshBehavior, ScriptedTransport,
    };
    use crate::auth::MemoryTokenStore;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use std::sync::Arc;

    fn fixture() -> (Arc<ScriptedTransport>, ApiClient) {
        let transport = Arc::new(ScriptedTransport::new("T1", RefreshBehavior::Reject));
        let redirect = Arc::new(CountingRedirect::default());
        let client = client_with(
            &transport,
            MemoryTokenStore::with_session(&session("T1", "R1")),
            &redirect,
        );
        (transport, client)
    }

    #[tokio::test]
    async fn test_create_wraps_tasks_in_content() {
        let (transport, client) = fixture();
        transport.respond(
            "/group-plans/2",
            StatusCode::CREATED,
            r#"{"id":9,"group_id":2,"title":"Exam week","tasks":[{"id":1,"plan_id":9,"task":"Flashcards","duration":30,"created_at":null}],"created_at":null}"#,
        );

        let drafts = vec![GroupPlanTaskDraft {
            task: Some("Flashcards".into()),
            ..Default::default()
        }];
        let plan =
            create_group_plan_data(&client, 2, "Exam week", None, Some("2024-05-01"), &drafts)
                .await
                .unwrap();

        assert_eq!(plan.id, 9);
        assert_eq!(plan.tasks[0].task, "Flashcards");
        assert_eq!(
            transport.requests_to("/group-plans/2")[0].body,
            Some(serde_json::json!({
                "title": "Exam week",
                "description": "",
                "due": "2024-05-01",
                "content": { "tasks": [{ "task": "Flashcards" }] },
            }))
        );
    }

    #[tokio::test]
    async fn test_list_sends_pagination() {
        let (transport, client) = fixture();
        transport.respond("/group-plans/2", StatusCode::OK, "[]");

        let page = Page {
            limit: 10,
            offset: 20,
        };
        let plans = list_group_plans_data(&client, 2, page).await.unwrap();

        assert!(plans.is_empty());
        assert_eq!(
            transport.requests_to("/group-plans/2")[0].query,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("offset".to_string(), "20".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_update_task_path() {
        let (transport, client) = fixture();
        transport.respond(
            "/group-plans/9/tasks/3",
            StatusCode::OK,
            r#"{"id":3,"plan_id":9,"task":"Flashcards","duration":45,"created_at":null}"#,
        );

        let draft = GroupPlanTaskDraft {
            duration: Some(45),
            ..Default::default()
        };
        let task = update_task_data(&client, 9, 3, &draft).await.unwrap();

        assert_eq!(task.duration, Some(45));
        let sent = &transport.requests_to("/group-plans/9/tasks/3")[0];
        assert_eq!(sent.method, reqwest::Method::PUT);
        assert_eq!(sent.body, Some(serde_json::json!({ "duration": 45 })));
    }
}
