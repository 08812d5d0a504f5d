use std::process;

use clap::Parser;
use station_manager::cli::{self, Args};

fn main() {
    let args = Args::parse();

    if let Err(error) = cli::run(args) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}
