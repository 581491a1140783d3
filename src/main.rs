//! dumbbell-form entry point

use clap::Parser;
use dumbbell_form::cli::{
    cmd_info, cmd_predict, cmd_run, cmd_train, Cli, Commands, PathArgs, RunOutputs,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dumbbell_form=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { paths, report, predictions, answers_dir, summary }) => {
            let outputs = RunOutputs {
                report: report.as_deref(),
                predictions: predictions.as_deref(),
                answers_dir: answers_dir.as_deref(),
                summary: summary.as_deref(),
            };
            cmd_run(&paths, outputs)?;
        }
        Some(Commands::Train { paths }) => {
            cmd_train(&paths)?;
        }
        Some(Commands::Predict { paths, output }) => {
            cmd_predict(&paths, output.as_deref())?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        None => {
            // Default: full run with the built-in paths
            cmd_run(&PathArgs::default(), RunOutputs::default())?;
        }
    }

    Ok(())
}
