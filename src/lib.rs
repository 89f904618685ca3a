use log::{error, info};

pub mod cli;
pub mod engine;
pub mod report;

pub use cli::{Cli, PartgrowExitCode};
pub use engine::{ExtendOptions, Extender, LiveHost, Outcome};
pub use report::Report;

/// partgrow version
pub const PARTGROW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs partgrow against the machine it is running on and returns the report of the run.
pub fn run(args: &Cli) -> Report {
    let options = match args.options() {
        Ok(options) => options,
        Err(e) => {
            error!("{e:?}");
            let mut report = Report {
                device: Some(args.device.clone()),
                ..Default::default()
            };
            report.finish(Err(e));
            return report;
        }
    };

    let host = LiveHost;
    let mut extender = Extender::new(&host, &options);
    let result = extender.run(&args.device);
    match &result {
        Ok(Outcome::PartiallyExtended(e)) => {
            error!("The partition was grown but its filesystem was not: {e:?}")
        }
        Ok(outcome) => info!("Finished: {}", <&str>::from(outcome)),
        Err(e) => error!("Failed to grow '{}': {e:?}", args.device.display()),
    }

    let mut report = extender.into_report();
    report.finish(result);
    report
}
