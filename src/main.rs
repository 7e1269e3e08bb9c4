mod cli;
mod config;
mod error;
mod export;
mod model;
mod providers;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use export::ExportOutcome;
use providers::trello::TrelloClient;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match export_board().await {
        Ok(ExportOutcome::Exported(report)) => {
            tracing::info!(
                board = %report.board,
                open_rows = report.workbook.open_rows,
                archived_rows = report.workbook.archived_rows,
                documents = report.documents,
                skipped_attachments = report.skipped_attachments,
                "export finished"
            );
            println!("Done.");
            ExitCode::SUCCESS
        }
        Ok(ExportOutcome::NoCards { board }) => {
            tracing::info!(%board, "board has no card");
            println!("No Card on this Board.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "export aborted");
            eprintln!("Oops, an error occurred.\n{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn export_board() -> Result<ExportOutcome> {
    let config = config::load_config(&config::config_path())?;
    let client = TrelloClient::new(&config.trello, &config.proxy)?;
    export::run(&client, &config, cli::prompt_board).await
}
