use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wingseg::cli::{Cli, Commands};
use wingseg::{RunOutcome, SegError, config, models, scanner};

const EXIT_FATAL: u8 = 1;
const EXIT_VALIDATION: u8 = 2;
const EXIT_WITH_ERRORS: u8 = 3;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn exit_code_for(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<SegError>() {
        Some(SegError::Validation(_)) => ExitCode::from(EXIT_VALIDATION),
        _ => ExitCode::from(EXIT_FATAL),
    }
}

fn dispatch(cmd: Commands) -> Result<ExitCode> {
    match cmd {
        Commands::Segment(args) => {
            let cfg = args.into_config()?;
            let models = models::load_models(&cfg.params)?;
            match wingseg::segment(&cfg, &models)? {
                RunOutcome::Skipped { run_id, run_dir } => {
                    info!("Run {} already completed, see {}", run_id.short(), run_dir.display());
                    Ok(ExitCode::SUCCESS)
                }
                RunOutcome::Finished(summary) => {
                    info!(
                        "DONE: images={} segmented={} no_detections={} unreadable={} crops={} failed={} in {:.2}s",
                        summary.num_images,
                        summary.segmented,
                        summary.no_detections,
                        summary.unreadable,
                        summary.crops,
                        summary.failures.len(),
                        summary.elapsed.as_secs_f64()
                    );
                    if summary.completed() {
                        Ok(ExitCode::SUCCESS)
                    } else {
                        Ok(ExitCode::from(EXIT_WITH_ERRORS))
                    }
                }
            }
        }
        Commands::ScanRuns(args) => {
            let rows = scanner::scan_runs(
                &args.dataset,
                args.output_dir.as_deref(),
                args.custom_output_dir.as_deref(),
            )?;
            if rows.is_empty() {
                println!("No runs found for dataset {}", args.dataset.display());
            } else {
                print!("{}", scanner::render_table(&rows));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::RunConfig { config } => {
            let argv = config::load_run_file(&config)?.to_argv()?;
            info!("Running from {}: {}", config.display(), argv[1..].join(" "));
            let cli = match Cli::try_parse_from(&argv) {
                Ok(c) => c,
                Err(e) => return Err(SegError::Config(e.to_string()).into()),
            };
            dispatch(cli.cmd)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli.cmd) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    }
}
