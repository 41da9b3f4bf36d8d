use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::lifecycle::{WorkflowAction, WorkflowId};

pub mod backend;
pub mod commands;

#[derive(Parser)]
#[command(name = "course-lifecycle")]
#[command(about = "Manage course lifecycle workflows")]
#[command(long_about = "Course lifecycle workflows bind a trigger to an ordered list of steps. \
                       Draft workflows are edited, then activated; active automatic workflows are \
                       ranked and can be moved up or down. Start with 'course-lifecycle create'.")]
pub struct Cli {
    /// State file to use instead of the configured one
    #[arg(long, global = true, help = "Path to the JSON state file")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a draft workflow
    Create {
        /// Workflow title
        title: String,
    },
    /// List workflows, ranked ones first
    List {
        /// Only show active workflows
        #[arg(long, help = "Only list active workflows")]
        active: bool,
    },
    /// Show one workflow with its triggers, steps and what can be done with it
    Show {
        id: WorkflowId,
    },
    /// Rename a draft workflow
    Rename {
        id: WorkflowId,
        title: String,
    },
    /// Bind a trigger to a draft workflow
    AddTrigger {
        id: WorkflowId,
        /// Trigger subplugin, see 'course-lifecycle subplugins'
        subplugin: String,
        /// Instance name, defaults to the subplugin name
        #[arg(long)]
        name: Option<String>,
        /// Instance setting, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        settings: Vec<(String, String)>,
    },
    /// Append a step to a draft workflow
    AddStep {
        id: WorkflowId,
        /// Step subplugin, see 'course-lifecycle subplugins'
        subplugin: String,
        /// Instance name, defaults to the subplugin name
        #[arg(long)]
        name: Option<String>,
        /// Instance setting, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        settings: Vec<(String, String)>,
    },
    /// Run an administrative action on a workflow
    Action {
        action: WorkflowAction,
        id: WorkflowId,
        /// Confirm destructive actions (disable, disable-and-abort, abort, delete)
        #[arg(short = 'y', long, help = "Confirm destructive actions")]
        yes: bool,
    },
    /// Start a process for a course in a workflow
    StartProcess {
        id: WorkflowId,
        /// Course the process runs for
        #[arg(long)]
        course: i64,
    },
    /// List the tools offered by active manual workflows
    ManualTools,
    /// List the available trigger and step subplugins
    Subplugins,
}

impl Commands {
    /// Name used for spans and log lines
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Create { .. } => "create",
            Commands::List { .. } => "list",
            Commands::Show { .. } => "show",
            Commands::Rename { .. } => "rename",
            Commands::AddTrigger { .. } => "add-trigger",
            Commands::AddStep { .. } => "add-step",
            Commands::Action { .. } => "action",
            Commands::StartProcess { .. } => "start-process",
            Commands::ManualTools => "manual-tools",
            Commands::Subplugins => "subplugins",
        }
    }

    pub fn workflow_id(&self) -> Option<WorkflowId> {
        match self {
            Commands::Show { id }
            | Commands::Rename { id, .. }
            | Commands::AddTrigger { id, .. }
            | Commands::AddStep { id, .. }
            | Commands::Action { id, .. }
            | Commands::StartProcess { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether the command can change persisted state
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Commands::List { .. }
                | Commands::Show { .. }
                | Commands::ManualTools
                | Commands::Subplugins
        )
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
