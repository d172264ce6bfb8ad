use clap::Parser;

use reftree::cli::{run, Cli};
use reftree::observability::init_logging;

fn main() {
    init_logging();
    let cli = Cli::parse();
    let now = chrono::Utc::now().timestamp();
    if let Err(err) = run(cli, now) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
