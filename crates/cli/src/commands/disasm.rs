use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use emc_script::{Listing, Program};

#[derive(Parser, Debug)]
#[command(name = "disasm", about = "Print a listing of a compiled script program.")]
pub struct DisasmCmd {
    /// Path to the EMC file.
    path: PathBuf,

    /// Also print the text table.
    #[arg(long)]
    text: bool,
}

impl DisasmCmd {
    pub fn run(&self) -> Result<()> {
        let program = Program::from_file(&self.path)
            .with_context(|| format!("while loading {}", self.path.display()))?;

        let mut out = std::io::stdout().lock();
        if self.text {
            // The offset table ends where the first string begins.
            let count = program.text_word(0).unwrap_or(0) / 2;
            for index in 0..count {
                if let Some(text) = program.text(index) {
                    writeln!(out, "text {index}: {:?}", String::from_utf8_lossy(text))?;
                }
            }
        }
        write!(out, "{}", Listing(&program))?;
        Ok(())
    }
}
