//! Bookmarket batch CLI
//!
//! Replays a CSV file of marketplace actions and prints the resulting
//! wallet states as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- actions.csv > wallets.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` to see rejected actions, `warn` for bad rows
//! - `BOOKMARKET_MIN_DEPOSIT`, `BOOKMARKET_MAX_DEPOSIT`,
//!   `BOOKMARKET_BOOTSTRAP_ADMIN`: see [`bookmarket::config`]

use bookmarket::{BatchProcessor, MarketConfig, MarketError, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(MarketError::MissingArgument);
    }

    let config = MarketConfig::from_env()?;

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut batch = BatchProcessor::new(config);
    batch.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    batch.write_output(handle)?;

    Ok(())
}
