mod commands;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::init::{DATABASE_FILE, WORKSPACE_DIR};
use teamgraph::activity::{ActivityFilter, Selection, DISPLAY_LIMIT};
use teamgraph::models::{parse_calendar_date, ActionType, ObjectType, DEFAULT_PRIORITY};
use teamgraph::store::{EntityStore, HttpStore, LocalStore};

#[derive(Parser)]
#[command(name = "teamgraph")]
#[command(about = "Task graph, activity feed and calendar for a team workspace")]
#[command(version)]
struct Cli {
    /// Workspace server base URL; the local workspace is used when unset
    #[arg(long, global = true, env = "TEAMGRAPH_SERVER")]
    server: Option<String>,

    /// Request timeout for the workspace server, in seconds
    #[arg(long, global = true, env = "TEAMGRAPH_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace in the current directory
    Init,

    /// Project management
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },

    /// Task management
    Task {
        #[command(subcommand)]
        action: TaskCommands,
    },

    /// Show the project/task relationship graph
    Graph {
        /// Print Cytoscape elements as a JSON frame
        #[arg(long)]
        json: bool,
        /// Ask the server for a pre-built graph
        #[arg(long)]
        server_built: bool,
    },

    /// Show one graph node (project-<id> or task-<id>) with its counts
    Node {
        /// Node id, e.g. task-5
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
        /// Ask the server for a pre-built graph
        #[arg(long)]
        server_built: bool,
    },

    /// Node and edge counts for the graph
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent activity
    Activity {
        /// Object type (project, task, attachment, chat, system, all)
        #[arg(long, default_value = "all")]
        object: Selection<ObjectType>,
        /// Action (created, updated, deleted, all)
        #[arg(long, default_value = "all")]
        action: Selection<ActionType>,
        /// Case-insensitive text search
        #[arg(short, long, default_value = "")]
        search: String,
        /// Maximum entries to show
        #[arg(short = 'n', long, default_value_t = DISPLAY_LIMIT)]
        limit: usize,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every activity log entry
    ActivityClear {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// List upstream integration events with repeats hidden
    Integrations {
        /// JSON file holding an array of events, or - for stdin
        #[arg(default_value = "-")]
        source: PathBuf,
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show tasks by due date
    Calendar {
        /// First day of the range (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
    },

    /// Move a task to a new due date
    Reschedule {
        /// Task ID
        task: i64,
        /// New due date (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Keep the graph and activity feed on screen until interrupted
    Watch {
        /// Activity poll interval in milliseconds
        #[arg(long, env = "TEAMGRAPH_POLL_MS", default_value_t = 2000)]
        poll_ms: u64,
        /// Graph poll interval in milliseconds (0 = only on changes)
        #[arg(long, env = "TEAMGRAPH_GRAPH_POLL_MS", default_value_t = 0)]
        graph_poll_ms: u64,
        /// Ask the server for a pre-built graph
        #[arg(long)]
        server_built: bool,
        /// Stream newline-delimited JSON frames
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a new project
    Create {
        /// Project name
        name: String,
        /// Project description
        #[arg(short, long)]
        description: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    /// List projects
    List,
    /// Delete a project and its tasks
    Delete {
        /// Project ID
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Project ID (taken from the parent for subtasks)
        #[arg(long)]
        project: Option<i64>,
        /// Parent task ID
        #[arg(long)]
        parent: Option<i64>,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Assignee
        #[arg(short, long)]
        assignee: Option<String>,
        /// Priority (1-5)
        #[arg(short, long, default_value_t = DEFAULT_PRIORITY)]
        priority: u8,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        due: Option<NaiveDate>,
        /// Task ID this one is blocked by
        #[arg(long)]
        depends_on: Option<i64>,
    },
    /// List tasks
    List {
        /// Only tasks of this project
        #[arg(long)]
        project: Option<i64>,
    },
    /// Show task details
    Show {
        /// Task ID
        id: i64,
    },
    /// Delete a task and its subtasks
    Delete {
        /// Task ID
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_calendar_date(s).ok_or_else(|| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "teamgraph=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn find_workspace_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(WORKSPACE_DIR);
        if candidate.exists() && candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a teamgraph workspace (or any parent). Run 'teamgraph init' first or pass --server.");
        }
    }
}

fn get_store(cli: &Cli) -> Result<Arc<dyn EntityStore>> {
    if let Some(url) = &cli.server {
        let store = HttpStore::new(url, Duration::from_secs(cli.timeout_secs))
            .context("Failed to set up workspace server client")?;
        return Ok(Arc::new(store));
    }
    let db_path = find_workspace_dir()?.join(DATABASE_FILE);
    let store = LocalStore::open(&db_path).context("Failed to open workspace database")?;
    Ok(Arc::new(store))
}

/// Flips to true on SIGINT or SIGTERM.
fn shutdown_signal() -> Result<watch::Receiver<bool>> {
    let term = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&term))
            .context("Failed to register signal handler")?;
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            ticker.tick().await;
            if term.load(Ordering::Relaxed) {
                let _ = tx.send(true);
                break;
            }
        }
    });
    Ok(rx)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Commands::Init = cli.command {
        let cwd = env::current_dir()?;
        return commands::init::run(&cwd);
    }
    if let Commands::Integrations { source, json } = &cli.command {
        return commands::integrations::run(source, *json);
    }

    let store = get_store(&cli)?;

    match cli.command {
        Commands::Init | Commands::Integrations { .. } => Ok(()),

        Commands::Project { action } => match action {
            ProjectCommands::Create {
                name,
                description,
                start,
                end,
            } => commands::project::create(store.as_ref(), &name, description.as_deref(), start, end)
                .await
                .map(|_| ()),
            ProjectCommands::List => commands::project::list(store.as_ref()).await,
            ProjectCommands::Delete { id, force } => {
                commands::project::delete(store.as_ref(), id, force).await
            }
        },

        Commands::Task { action } => match action {
            TaskCommands::Create {
                title,
                project,
                parent,
                description,
                assignee,
                priority,
                due,
                depends_on,
            } => {
                let args = commands::task::TaskArgs {
                    project,
                    parent,
                    title: &title,
                    description: description.as_deref(),
                    assignee: assignee.as_deref(),
                    priority,
                    due,
                    depends_on,
                };
                commands::task::create(store.as_ref(), args).await.map(|_| ())
            }
            TaskCommands::List { project } => commands::task::list(store.as_ref(), project).await,
            TaskCommands::Show { id } => commands::task::show(store.as_ref(), id).await,
            TaskCommands::Delete { id, force } => {
                commands::task::delete(store.as_ref(), id, force).await
            }
        },

        Commands::Graph { json, server_built } => {
            commands::graph::run(store, json, server_built).await
        }

        Commands::Node {
            id,
            json,
            server_built,
        } => commands::graph::node(store, &id, json, server_built).await,

        Commands::Stats { json } => commands::graph::stats(store, json).await,

        Commands::Activity {
            object,
            action,
            search,
            limit,
            json,
        } => {
            let filter = ActivityFilter {
                object_type: object,
                action_type: action,
                search,
            };
            commands::activity::run(store, filter, limit, json).await
        }

        Commands::ActivityClear { force } => commands::activity::clear(store, force).await,

        Commands::Calendar { from, to } => commands::calendar::run(store.as_ref(), from, to).await,

        Commands::Reschedule { task, date } => commands::reschedule::run(store, task, date).await,

        Commands::Watch {
            poll_ms,
            graph_poll_ms,
            server_built,
            json,
        } => {
            let shutdown = shutdown_signal()?;
            let options = commands::watch::WatchOptions::from_millis(poll_ms, graph_poll_ms, server_built)
                .with_json(json);
            commands::watch::run(store, options, shutdown).await
        }
    }
}
