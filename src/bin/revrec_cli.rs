use std::process;

use clap::Parser;
use revrec::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli::commands::run(cli) {
        cli::output::print_error(&err);
        process::exit(1);
    }
}
