use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Instrument;

use course_lifecycle::cli::backend::Backend;
use course_lifecycle::cli::commands::{run, show_how_to_get_started};
use course_lifecycle::cli::Cli;
use course_lifecycle::config::init_config;
use course_lifecycle::telemetry::{
    create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        show_how_to_get_started();
        return Ok(());
    };

    let config = init_config()?;
    init_telemetry(&config.observability)?;

    let state_path = cli
        .state
        .unwrap_or_else(|| PathBuf::from(&config.state.path));

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            command.name(),
            command.workflow_id().map(|id| id.0),
            Some(correlation_id.as_str()),
        );

        async {
            let backend = Backend::open(config, &state_path).await?;
            let mutates = command.mutates();
            let outcome = run(command, &backend).await;
            // Partial effects of a failed command are persisted too
            if mutates {
                backend.save().await?;
            }
            outcome
        }
        .instrument(span)
        .await
    });

    shutdown_telemetry();
    result
}
