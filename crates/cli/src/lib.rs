pub mod commands;

use clap::{Parser, Subcommand};

use crate::commands::{disasm::DisasmCmd, run::RunCmd};

#[derive(Parser)]
#[command(name = "emc", version, about = "Inspect and run EMC script programs.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Disasm(DisasmCmd),
    Run(RunCmd),
}

impl Cli {
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Disasm(cmd) => cmd.run(),
            Command::Run(cmd) => cmd.run(),
        }
    }
}
