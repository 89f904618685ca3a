use std::process::ExitCode;

use anyhow::Error;
use clap::Parser;
use log::{debug, error};

use partgrow::{Cli, PartgrowExitCode};

fn setup_logging(args: &Cli) -> Result<(), Error> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.log_level())
        .parse_default_env()
        .try_init()?;

    Ok(())
}

fn main() -> ExitCode {
    // Parse args. Usage errors exit like any other failure; help and version output succeed.
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                PartgrowExitCode::Failure.into()
            } else {
                PartgrowExitCode::Success.into()
            };
        }
    };

    // Initialize the logger
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return PartgrowExitCode::Failure.into();
    }

    debug!("partgrow version: {}", partgrow::PARTGROW_VERSION);

    let report = partgrow::run(&args);

    if let Some(path) = &args.report {
        if let Err(e) = report.write(path) {
            error!("{e:?}");
        }
    }

    if report.is_success() {
        PartgrowExitCode::Success.into()
    } else {
        PartgrowExitCode::Failure.into()
    }
}
