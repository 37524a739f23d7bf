//! Personal tasks: `/tasks`

use anyhow::Result;

use super::client::ApiClient;
use super::error::ApiError;
use super::transport::ApiRequest;
use crate::models::{Ack, Task, TaskDraft, TaskFilter};

pub async fn list_tasks_data(
    client: &ApiClient,
    filter: &TaskFilter,
) -> Result<Vec<Task>, ApiError> {
    let mut request = ApiRequest::get("/tasks");
    if let Some(completed) = filter.completed {
        request = request.query("completed", completed);
    }
    if let Some(priority) = filter.priority {
        request = request.query("priority", priority);
    }
    if filter.due_today {
        request = request.query("due_today", true);
    }
    client.send_json(request).await
}

pub async fn get_task_data(client: &ApiClient, id: i64) -> Result<Task, ApiError> {
    client.send_json(ApiRequest::get(format!("/tasks/{}", id))).await
}

pub async fn create_task_data(client: &ApiClient, draft: &TaskDraft) -> Result<Task, ApiError> {
    client
        .send_json(ApiRequest::post("/tasks").json_of(draft)?)
        .await
}

pub async fn update_task_data(
    client: &ApiClient,
    id: i64,
    draft: &TaskDraft,
) -> Result<Task, ApiError> {
    client
        .send_json(ApiRequest::put(format!("/tasks/{}", id)).json_of(draft)?)
        .await
}

pub async fn complete_task_data(client: &ApiClient, id: i64) -> Result<Task, ApiError> {
    client
        .send_json(ApiRequest::post(format!("/tasks/{}/complete", id)))
        .await
}

pub async fn delete_task_data(client: &ApiClient, id: i64) -> Result<Ack, ApiError> {
    client
        .send_json(ApiRequest::delete(format!("/tasks/{}", id)))
        .await
}

/// Completed vs pending counts and a per-priority histogram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub completed: usize,
    pub pending: usize,
    /// Index 0 is priority 1. Tasks without a priority in 1..=5 are not bucketed.
    pub by_priority: [usize; 5],
}

impl TaskStats {
    pub fn total(&self) -> usize {
        self.completed + self.pending
    }
}

pub fn summarize_tasks(tasks: &[Task]) -> TaskStats {
    let mut stats = TaskStats::default();
    for task in tasks {
        if task.completed {
            stats.completed += 1;
        } else {
            stats.pending += 1;
        }
        if let Some(p @ 1..=5) = task.priority {
            stats.by_priority[usize::from(p) - 1] += 1;
        }
    }
    stats
}

fn print_task_row(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    let due = task.due_date.as_deref().unwrap_or("-");
    println!(
        "[{}] {:>5}  P{}  {:>4}m  {:<12} {}",
        mark,
        task.id,
        task.priority.unwrap_or(3),
        task.estimate_minutes.unwrap_or(30),
        due,
        task.title
    );
}

/// List tasks (prints to stdout).
pub async fn list_tasks(filter: TaskFilter) -> Result<()> {
    let client = ApiClient::from_config()?;
    let tasks = list_tasks_data(&client, &filter).await?;

    println!("\nTasks:");
    println!("{:-<60}", "");

    if tasks.is_empty() {
        println!("  (no tasks)");
        return Ok(());
    }

    for task in &tasks {
        print_task_row(task);
    }
    println!("\n{} task(s)", tasks.len());
    Ok(())
}

/// Print completion and priority breakdown over every task.
pub async fn task_stats() -> Result<()> {
    let client = ApiClient::from_config()?;
    let tasks = list_tasks_data(&client, &TaskFilter::default()).await?;
    let stats = summarize_tasks(&tasks);

    println!("\nTask summary:");
    println!("{:-<60}", "");
    if stats.total() == 0 {
        println!("  (no tasks)");
        return Ok(());
    }

    let percent = stats.completed * 100 / stats.total();
    println!("Completed: {:>4}  ({}%)", stats.completed, percent);
    println!("Pending:   {:>4}", stats.pending);
    println!("\nBy priority:");
    let widest = stats.by_priority.iter().copied().max().unwrap_or(0).max(1);
    for (i, count) in stats.by_priority.iter().enumerate() {
        let bar = "#".repeat(count * 30 / widest);
        println!("  P{}  {:>4}  {}", i + 1, count, bar);
    }
    Ok(())
}

pub async fn show_task(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = get_task_data(&client, id).await?;

    println!();
    println!("Task #{}: {}", task.id, task.title);
    if let Some(ref desc) = task.description {
        if !desc.is_empty() {
            println!("  {}", desc);
        }
    }
    println!("Status:   {}", if task.completed { "done" } else { "open" });
    println!("Priority: {}", task.priority.unwrap_or(3));
    println!("Estimate: {} min", task.estimate_minutes.unwrap_or(30));
    if let Some(ref due) = task.due_date {
        println!("Due:      {}", due);
    }
    Ok(())
}

pub async fn add_task(draft: TaskDraft) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = create_task_data(&client, &draft).await?;
    println!("Created task #{}: {}", task.id, task.title);
    Ok(())
}

pub async fn update_task(id: i64, draft: TaskDraft) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = update_task_data(&client, id, &draft).await?;
    println!("Updated task #{}.", task.id);
    Ok(())
}

pub async fn complete_task(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let task = complete_task_data(&client, id).await?;
    println!("Task #{} marked done: {}", task.id, task.title);
    Ok(())
}

pub async fn delete_task(id: i64) -> Result<()> {
    let client = ApiClient::from_config()?;
    let ack = delete_task_data(&client, id).await?;
    println!("{}", if ack.msg.is_empty() { "Deleted" } else { &ack.msg });
    Ok(())
}
