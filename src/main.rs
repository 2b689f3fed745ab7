use clap::Parser;
use hashledger::cli::commands::{run_cli, Cli};

fn main() -> anyhow::Result<()> {
    // Parse first so --help and --config never touch the default config file
    let cli = Cli::parse();

    // Load configuration and run (logging is initialized there based on the debug flag)
    run_cli(cli)
}
