//! Weft template compiler binary

use std::process;
use weft::Cli;

fn main() {
    env_logger::init();

    if let Err(e) = Cli::new().run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
