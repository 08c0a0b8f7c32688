use clap::Parser;
use factorlab::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
