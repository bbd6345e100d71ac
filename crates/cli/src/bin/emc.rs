use clap::Parser;
use emc_cli::Cli;
use emc_script::utils::setup_logger;

fn main() -> anyhow::Result<()> {
    setup_logger();
    Cli::parse().run()
}
