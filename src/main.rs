// CarSpray headless renderer.
//
// Everything lives in the library crate; the binary only wires the session
// log and hands the parsed arguments to the CLI runner.

use std::process::ExitCode;

use carspray::{cli, logger};
use clap::Parser;

fn main() -> ExitCode {
    logger::init();
    let args = cli::CliArgs::parse();
    cli::run(args)
}
