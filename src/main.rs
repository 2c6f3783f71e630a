use std::process::ExitCode;

use clap::Parser;

use rasterpad::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Session log (overwrites previous session log)
    if let Some(path) = logger::init(args.verbose)
        && args.verbose
    {
        eprintln!("logging to {}", path.display());
    }

    cli::run(args)
}
