//! Entry point: parses the CLI, wires up logging, launches the engine,
//! and translates its outcome into a process exit status (spec §6).

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use perfregion::cli::Cli;
use perfregion::counters::linux::LinuxPerfEvents;
use perfregion::engine;
use perfregion::error::EngineError;
use perfregion::report::TableFormatter;

fn open_sink(path: Option<&std::path::Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stderr())),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let mode = cli.mode();

    let sink = match open_sink(cli.output.as_deref()) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("could not open output sink: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut formatter: TableFormatter<Box<dyn Write>> = TableFormatter::new(sink);

    match engine::run(mode, &cli.program_argv, LinuxPerfEvents::new(), &mut formatter) {
        Ok(reason) => ExitCode::from(reason.exit_status() as u8),
        Err(e) => {
            report_startup_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_startup_error(e: &EngineError) {
    log::error!("{e}");
}
