//! Study Planner CLI
//!
//! A terminal client for the study planner backend: tasks, generated study
//! plans, study groups and shared group plans.

mod api;
mod auth;
mod config;
mod ics;
mod models;
mod realtime;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::group_plans::Page;
use models::{GroupPlanTaskDraft, InviteAction, TaskDraft, TaskFilter};

#[derive(Parser)]
#[command(name = "study-planner")]
#[command(about = "Command-line client for the study planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        email: String,

        /// Sign in again even if the stored access token is still valid
        #[arg(short, long)]
        force: bool,
    },

    /// Create an account and sign in
    Register {
        /// Full name shown to group members
        #[arg(long)]
        name: String,

        email: String,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show current authentication status
    Status,

    /// Show current user info (verify auth works)
    Whoami,

    /// Personal tasks
    #[command(subcommand)]
    Tasks(TaskCommand),

    /// Personal study plans
    #[command(subcommand)]
    Plans(PlanCommand),

    /// Study groups
    #[command(subcommand)]
    Groups(GroupCommand),

    /// Group invites
    #[command(subcommand)]
    Invites(InviteCommand),

    /// Plans shared within a group
    #[command(subcommand)]
    GroupPlans(GroupPlanCommand),

    /// In-app notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),

    /// Stream presence, notifications and plan updates
    Listen {
        /// Also join the room of this plan (repeatable)
        #[arg(long = "plan")]
        plans: Vec<i64>,

        /// Join an arbitrary room, e.g. `group:3` (repeatable)
        #[arg(long = "room")]
        rooms: Vec<String>,
    },
}

#[derive(Args)]
struct TaskFields {
    /// Longer description
    #[arg(short, long)]
    description: Option<String>,

    /// Estimated minutes
    #[arg(short, long)]
    estimate: Option<u32>,

    /// Due date, e.g. 2024-05-01T18:00:00
    #[arg(long)]
    due: Option<String>,

    /// Priority 1 (highest) to 5
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
    priority: Option<u8>,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks
    List {
        /// Only open tasks
        #[arg(long, conflicts_with = "done")]
        open: bool,

        /// Only completed tasks
        #[arg(long)]
        done: bool,

        #[arg(short, long)]
        priority: Option<u8>,

        /// Only tasks due today
        #[arg(long)]
        today: bool,
    },
    /// Create a task
    Add {
        title: String,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Show one task
    Show { id: i64 },
    /// Change fields of a task
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Mark a task as completed
    Done { id: i64 },
    /// Delete a task
    Delete { id: i64 },
    /// Completion and priority breakdown of all tasks
    Stats,
}

#[derive(Subcommand)]
enum PlanCommand {
    /// List saved plans
    List,
    /// Show a plan day by day
    Show { id: i64 },
    /// Spread tasks over a number of days
    Generate {
        #[arg(short, long, default_value = "3")]
        days: u32,

        /// Only these task ids (default: all open tasks)
        #[arg(short, long = "task")]
        tasks: Vec<i64>,

        /// Save the plan instead of previewing it
        #[arg(short, long)]
        save: bool,

        /// Also write the plan as JSON, for editing and `plans save`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a plan from a JSON file (updates it when the file has an id)
    Save {
        file: PathBuf,
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Redistribute a saved plan's items over its days
    Regenerate { id: i64 },
    /// Rename a plan
    Rename { id: i64, title: String },
    /// Save a copy of a plan
    Duplicate {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Delete a plan
    Delete { id: i64 },
    /// Export a plan as an iCalendar (.ics) file
    Export {
        id: i64,
        /// Output file (default: <title>.ics)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// List your groups
    List,
    /// Create a group
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Join a group
    Join { id: i64 },
    /// Leave a group
    Leave { id: i64 },
    /// List members of a group
    Members { id: i64 },
    /// Remove a member (owner only)
    RemoveMember { group: i64, user: i64 },
}

#[derive(Subcommand)]
enum InviteCommand {
    /// Invites waiting for your answer
    Pending,
    /// Invite someone by full name or email
    Send { group: i64, who: String },
    /// Accept an invite
    Accept { id: i64 },
    /// Decline an invite
    Decline { id: i64 },
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, default_value = "50")]
    limit: u32,
    #[arg(long, default_value = "0")]
    offset: u32,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page {
            limit: args.limit,
            offset: args.offset,
        }
    }
}

#[derive(Args)]
struct GroupTaskFields {
    /// Minutes
    #[arg(short, long)]
    duration: Option<u32>,
    #[arg(short, long)]
    notes: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    due: Option<String>,
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
    priority: Option<u8>,
}

#[derive(Subcommand)]
enum GroupPlanCommand {
    /// List plans of a group
    List {
        group: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a plan in a group
    Create {
        group: i64,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Initial task (repeatable)
        #[arg(short, long = "task")]
        tasks: Vec<String>,
    },
    /// Show a group plan with its tasks
    Show { id: i64 },
    /// Change title, description or due date (empty --due clears it)
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Participate in a plan
    Join { id: i64 },
    /// Stop participating
    Leave { id: i64 },
    /// Who participates in a plan
    Participants { id: i64 },
    /// Delete a plan (creator or group owner)
    Delete { id: i64 },
    /// List tasks of a plan
    Tasks { id: i64 },
    /// Add a task to a plan
    AddTask {
        id: i64,
        task: String,
        #[command(flatten)]
        fields: GroupTaskFields,
    },
    /// Change a task of a plan
    UpdateTask {
        id: i64,
        task_id: i64,
        #[arg(short, long)]
        task: Option<String>,
        #[command(flatten)]
        fields: GroupTaskFields,
    },
    /// Delete a task of a plan
    DeleteTask { id: i64, task_id: i64 },
}

#[derive(Subcommand)]
enum NotificationCommand {
    /// List notifications
    List {
        /// Only unread ones
        #[arg(short, long)]
        unread: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Mark a notification as read
    Read { id: i64 },
    /// Delete a notification
    Delete { id: i64 },
}

fn task_draft(title: Option<String>, fields: TaskFields) -> TaskDraft {
    TaskDraft {
        title,
        description: fields.description,
        estimate_minutes: fields.estimate,
        due_date: fields.due,
        priority: fields.priority,
        completed: None,
    }
}

fn group_task_draft(task: Option<String>, fields: GroupTaskFields) -> GroupPlanTaskDraft {
    GroupPlanTaskDraft {
        task,
        duration: fields.duration,
        notes: fields.notes,
        due: fields.due,
        priority: fields.priority,
    }
}

async fn run_tasks(cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::List {
            open,
            done,
            priority,
            today,
        } => {
            let completed = match (open, done) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            let filter = TaskFilter {
                completed,
                priority,
                due_today: today,
            };
            api::tasks::list_tasks(filter).await
        }
        TaskCommand::Add { title, fields } => {
            api::tasks::add_task(task_draft(Some(title), fields)).await
        }
        TaskCommand::Show { id } => api::tasks::show_task(id).await,
        TaskCommand::Update { id, title, fields } => {
            api::tasks::update_task(id, task_draft(title, fields)).await
        }
        TaskCommand::Done { id } => api::tasks::complete_task(id).await,
        TaskCommand::Delete { id } => api::tasks::delete_task(id).await,
        TaskCommand::Stats => api::tasks::task_stats().await,
    }
}

async fn run_plans(cmd: PlanCommand) -> Result<()> {
    match cmd {
        PlanCommand::List => api::plans::list_plans().await,
        PlanCommand::Show { id } => api::plans::show_plan(id).await,
        PlanCommand::Generate {
            days,
            tasks,
            save,
            output,
        } => {
            let task_ids = if tasks.is_empty() { None } else { Some(tasks) };
            api::plans::generate_plan(days, task_ids, save, output).await
        }
        PlanCommand::Save { file, title } => api::plans::save_plan(file, title).await,
        PlanCommand::Regenerate { id } => api::plans::regenerate_plan(id).await,
        PlanCommand::Rename { id, title } => api::plans::rename_plan(id, &title).await,
        PlanCommand::Duplicate { id, title } => api::plans::duplicate_plan(id, title).await,
        PlanCommand::Delete { id } => api::plans::delete_plan(id).await,
        PlanCommand::Export { id, output } => api::plans::export_plan(id, output).await,
    }
}

async fn run_groups(cmd: GroupCommand) -> Result<()> {
    match cmd {
        GroupCommand::List => api::groups::list_groups().await,
        GroupCommand::Create { name, description } => {
            api::groups::create_group(&name, description.as_deref()).await
        }
        GroupCommand::Join { id } => api::groups::join_group(id).await,
        GroupCommand::Leave { id } => api::groups::leave_group(id).await,
        GroupCommand::Members { id } => api::groups::list_members(id).await,
        GroupCommand::RemoveMember { group, user } => {
            api::groups::remove_member(group, user).await
        }
    }
}

async fn run_invites(cmd: InviteCommand) -> Result<()> {
    match cmd {
        InviteCommand::Pending => api::invites::list_pending().await,
        InviteCommand::Send { group, who } => api::invites::send_invite(group, &who).await,
        InviteCommand::Accept { id } => api::invites::respond(id, InviteAction::Accept).await,
        InviteCommand::Decline { id } => api::invites::respond(id, InviteAction::Decline).await,
    }
}

async fn run_group_plans(cmd: GroupPlanCommand) -> Result<()> {
    use api::group_plans as gp;
    match cmd {
        GroupPlanCommand::List { group, page } => gp::list_group_plans(group, page.into()).await,
        GroupPlanCommand::Create {
            group,
            title,
            description,
            due,
            tasks,
        } => {
            gp::create_group_plan(group, &title, description.as_deref(), due.as_deref(), tasks)
                .await
        }
        GroupPlanCommand::Show { id } => gp::show_group_plan(id).await,
        GroupPlanCommand::Update {
            id,
            title,
            description,
            due,
        } => {
            gp::update_group_plan(id, title.as_deref(), description.as_deref(), due.as_deref())
                .await
        }
        GroupPlanCommand::Join { id } => gp::join_group_plan(id).await,
        GroupPlanCommand::Leave { id } => gp::leave_group_plan(id).await,
        GroupPlanCommand::Participants { id } => gp::list_participants(id).await,
        GroupPlanCommand::Delete { id } => gp::delete_group_plan(id).await,
        GroupPlanCommand::Tasks { id } => gp::list_tasks(id).await,
        GroupPlanCommand::AddTask { id, task, fields } => {
            gp::add_task(id, group_task_draft(Some(task), fields)).await
        }
        GroupPlanCommand::UpdateTask {
            id,
            task_id,
            task,
            fields,
        } => gp::update_task(id, task_id, group_task_draft(task, fields)).await,
        GroupPlanCommand::DeleteTask { id, task_id } => gp::delete_task(id, task_id).await,
    }
}

async fn run_notifications(cmd: NotificationCommand) -> Result<()> {
    match cmd {
        NotificationCommand::List { unread, page } => {
            api::notifications::list_notifications(page.into(), unread).await
        }
        NotificationCommand::Read { id } => api::notifications::mark_read(id).await,
        NotificationCommand::Delete { id } => api::notifications::delete_notification(id).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli.command).await {
        // The login hint was already printed when the session was torn down.
        Err(e) if api::error::ends_session(&e) => {
            tracing::debug!("{:#}", e);
            std::process::exit(1);
        }
        result => result,
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, force } => {
            tracing::info!("Starting login...");
            auth::login(&email, force).await?;
        }
        Commands::Register { name, email } => {
            auth::register(&name, &email).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Whoami => {
            auth::whoami().await?;
        }
        Commands::Tasks(cmd) => run_tasks(cmd).await?,
        Commands::Plans(cmd) => run_plans(cmd).await?,
        Commands::Groups(cmd) => run_groups(cmd).await?,
        Commands::Invites(cmd) => run_invites(cmd).await?,
        Commands::GroupPlans(cmd) => run_group_plans(cmd).await?,
        Commands::Notifications(cmd) => run_notifications(cmd).await?,
        Commands::Listen { plans, rooms } => {
            realtime::listen(plans, rooms).await?;
        }
    }

    Ok(())
}
