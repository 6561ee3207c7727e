use std::process::ExitCode;

use clap::Parser;
use docket_client::{ClientFactory, LocalFactory, RemoteFactory};
use docket_harness::config::Args;
use docket_harness::{SuiteOptions, discover, run_suite};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Logs go to stderr so the report on stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let files = match discover(&args.paths) {
        Ok(files) if files.is_empty() => {
            eprintln!("docket: no scripts found");
            return ExitCode::from(2);
        }
        Ok(files) => files,
        Err(e) => {
            eprintln!("docket: {e}");
            return ExitCode::from(2);
        }
    };

    let options = args.suite_options();
    let green = match &args.addr {
        Some(addr) => {
            info!(%addr, scripts = files.len(), "running against docket-server");
            run(&args, &files, &RemoteFactory::new(addr.clone(), args.timeout()), &options)
        }
        None => {
            info!(scripts = files.len(), "running against in-process store");
            run(&args, &files, &LocalFactory::default(), &options)
        }
    };

    if green {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run<F: ClientFactory>(
    args: &Args,
    files: &[std::path::PathBuf],
    factory: &F,
    options: &SuiteOptions,
) -> bool {
    let report = run_suite(files, factory, options);
    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("docket: cannot render report: {e}");
                return false;
            }
        }
    } else {
        print!("{}", report.render_text());
    }
    report.is_green()
}
