use anyhow::{bail, Result};

use super::backend::Backend;
use super::Commands;
use crate::lifecycle::{
    ActionOutcome, Settings, TriggerService, Workflow, WorkflowAction, WorkflowId,
    WorkflowOverview,
};
use crate::subplugins::{StepKind, SubpluginCapabilities, TriggerKind};

pub async fn run(command: Commands, backend: &Backend) -> Result<()> {
    let manager = &backend.manager;
    match command {
        Commands::Create { title } => {
            let workflow = manager.create_workflow(&title).await?;
            println!("✅ Created workflow #{} '{}'", id_of(&workflow), workflow.title);
            println!("💡 Add a trigger with 'course-lifecycle add-trigger {} <subplugin>'", id_of(&workflow));
        }
        Commands::List { active } => {
            let workflows = if active {
                manager.list_active().await?
            } else {
                manager.list_workflows().await?
            };
            print_workflows(&workflows);
        }
        Commands::Show { id } => print_overview(&manager.describe(id).await?),
        Commands::Rename { id, title } => {
            let workflow = manager.rename(id, &title).await?;
            println!("✅ Workflow #{id} renamed to '{}'", workflow.title);
        }
        Commands::AddTrigger {
            id,
            subplugin,
            name,
            settings,
        } => {
            let name = name.unwrap_or_else(|| subplugin.clone());
            let settings: Settings = settings.into_iter().collect();
            let trigger = manager.add_trigger(id, &subplugin, &name, &settings).await?;
            println!("✅ Trigger #{} ({}) added to workflow #{id}", trigger.id, trigger.subpluginname);
        }
        Commands::AddStep {
            id,
            subplugin,
            name,
            settings,
        } => {
            let name = name.unwrap_or_else(|| subplugin.clone());
            let settings: Settings = settings.into_iter().collect();
            let step = manager.add_step(id, &subplugin, &name, &settings).await?;
            println!(
                "✅ Step #{} ({}) added to workflow #{id} at position {}",
                step.id, step.subpluginname, step.sortindex
            );
        }
        Commands::Action { action, id, yes } => {
            let outcome = manager.handle_action(action, id, yes).await?;
            report_action(action, id, outcome)?;
        }
        Commands::StartProcess { id, course } => {
            let Some(workflow) = manager.get_workflow(id).await? else {
                bail!("Workflow #{id} does not exist");
            };
            if !workflow.active {
                bail!("Workflow #{id} is not active, no process can be started");
            }
            let process = backend.services.start_process(id, course).await;
            println!("✅ Process #{} started for course {course} in workflow #{id}", process.id);
        }
        Commands::ManualTools => {
            let tools = manager.manual_trigger_tools().await?;
            if tools.is_empty() {
                println!("📭 No manual workflow offers a tool");
            }
            for tool in tools {
                println!(
                    "🔧 {} (trigger #{}, icon {}, requires {})",
                    tool.displayname, tool.trigger_id, tool.icon, tool.capability
                );
            }
        }
        Commands::Subplugins => print_subplugins(backend).await?,
    }
    Ok(())
}

fn report_action(action: WorkflowAction, id: WorkflowId, outcome: ActionOutcome) -> Result<()> {
    match outcome {
        ActionOutcome::Applied => println!("✅ {action} applied to workflow #{id}"),
        ActionOutcome::Skipped => println!("➖ {action}: nothing to do for workflow #{id}"),
        ActionOutcome::ConfirmationRequired => {
            bail!("'{action}' is destructive; rerun with --yes to confirm")
        }
        ActionOutcome::Rejected(_) => bail!("'{action}' refused for workflow #{id}"),
        ActionOutcome::Duplicated(copy) => {
            println!("✅ Workflow #{id} duplicated as draft #{copy}")
        }
        ActionOutcome::Aborted(report) => {
            println!(
                "🛑 Rolled back {} process(es) of workflow #{id}",
                report.rolled_back.len()
            );
            for (process, error) in &report.failed {
                println!("   ❌ process #{process}: {error}");
            }
            if !report.is_complete() {
                bail!("{} process(es) could not be rolled back", report.failed.len());
            }
        }
    }
    Ok(())
}

fn id_of(workflow: &Workflow) -> String {
    workflow
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn kind_of(workflow: &Workflow) -> &'static str {
    match workflow.manual {
        Some(true) => "manual",
        Some(false) => "automatic",
        None => "-",
    }
}

fn print_workflows(workflows: &[Workflow]) {
    if workflows.is_empty() {
        println!("📭 No workflows");
        return;
    }
    println!("{:>5}  {:>4}  {:<11}  {:<9}  TITLE", "ID", "RANK", "STATE", "KIND");
    for workflow in workflows {
        let rank = workflow
            .sortindex
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:>4}  {:<11}  {:<9}  {}",
            id_of(workflow),
            rank,
            workflow.state().to_string(),
            kind_of(workflow),
            workflow.title
        );
    }
}

fn print_overview(overview: &WorkflowOverview) {
    let workflow = &overview.workflow;
    println!("📋 Workflow #{} '{}'", id_of(workflow), workflow.title);
    println!("   State: {} ({})", workflow.state(), kind_of(workflow));
    if let Some(sortindex) = workflow.sortindex {
        println!("   Rank: {sortindex}");
    }
    if let Some(time) = workflow.timeactive {
        println!("   Active since: {}", time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(time) = workflow.timedeactive {
        println!("   Deactivated: {}", time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("   Running processes: {}", overview.process_count);
    println!();

    println!("⚡ Triggers:");
    if overview.triggers.is_empty() {
        println!("   (none, the workflow cannot be activated yet)");
    }
    for trigger in &overview.triggers {
        println!("   #{} {} ({})", trigger.id, trigger.instancename, trigger.subpluginname);
    }
    println!("🪜 Steps:");
    if overview.steps.is_empty() {
        println!("   (none)");
    }
    for step in &overview.steps {
        println!(
            "   {}. {} ({})",
            step.sortindex, step.instancename, step.subpluginname
        );
    }
    println!();

    let flag = |allowed: bool| if allowed { "yes" } else { "no" };
    println!(
        "   editable: {}  disableable: {}  abortable: {}  removable: {}",
        flag(overview.editable),
        flag(overview.disableable),
        flag(overview.abortable),
        flag(overview.removable)
    );
}

async fn print_subplugins(backend: &Backend) -> Result<()> {
    println!("⚡ Trigger subplugins:");
    for kind in TriggerKind::ALL {
        let manual = backend.services.is_manual_trigger(kind.name()).await?;
        let multiple = backend.services.has_multiple_instances(kind.name()).await?;
        println!(
            "   {:<15} {:<9} {:<9} settings: {}",
            kind.name(),
            if manual { "manual" } else { "automatic" },
            if multiple { "multi" } else { "single" },
            settings_list(kind.instance_settings())
        );
    }
    println!("🪜 Step subplugins:");
    for kind in StepKind::ALL {
        println!(
            "   {:<15} settings: {}",
            kind.name(),
            settings_list(kind.instance_settings())
        );
    }
    Ok(())
}

fn settings_list(keys: &[&str]) -> String {
    if keys.is_empty() {
        "-".to_string()
    } else {
        keys.join(", ")
    }
}

pub fn show_how_to_get_started() {
    println!("🎓 Course Lifecycle - workflow administration");
    println!();
    println!("To get started:");
    println!("  ✏️  course-lifecycle create <title>                 # Draft a workflow");
    println!("  ⚡ course-lifecycle add-trigger <id> <subplugin>     # Decide when it runs");
    println!("  🪜 course-lifecycle add-step <id> <subplugin>        # Decide what it does");
    println!("  🚀 course-lifecycle action activate <id>            # Put it to work");
    println!();
    println!("Overview:");
    println!("  📋 course-lifecycle list");
    println!("  🔍 course-lifecycle show <id>");
    println!("  🧩 course-lifecycle subplugins");
}
