/// cmdchain CLI
///
/// Runs functions from a JSON or TOML function pack and prints what they
/// did: console output, results, errors and the final scoreboard.
use cmdchain_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
