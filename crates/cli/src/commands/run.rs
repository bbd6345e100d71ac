use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use emc_script::{
    functions::general, EntityCategory, FunctionTable, Program, Scheduler, ScriptEngine,
    ScriptOpts, ScriptOwner, TickOutcome, FUNCTION_SLOTS,
};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Category {
    Structure,
    Unit,
    Team,
}

impl From<Category> for EntityCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Structure => EntityCategory::Structure,
            Category::Unit => EntityCategory::Unit,
            Category::Team => EntityCategory::Team,
        }
    }
}

/// The entity a script runs for when there is no game around it.
#[derive(Debug)]
struct Standalone {
    category: EntityCategory,
    subtype: u16,
}

impl ScriptOwner for Standalone {
    fn category(&self) -> EntityCategory {
        self.category
    }

    fn subtype(&self) -> u16 {
        self.subtype
    }
}

#[derive(Parser, Debug)]
#[command(name = "run", about = "Run one script engine against logging natives.")]
pub struct RunCmd {
    /// Path to the EMC file.
    path: PathBuf,

    /// The category whose natives the program expects.
    #[arg(long, value_enum, default_value = "unit")]
    category: Category,

    /// The subtype to load.
    #[arg(short = 's', long, default_value = "0")]
    subtype: u16,

    /// The number of scheduler ticks to run.
    #[arg(short = 't', long, default_value = "100")]
    ticks: u64,

    /// The most instructions the engine may execute per tick.
    /// Defaults to `EMC_INSTRUCTION_BUDGET`, then 50.
    #[arg(long)]
    budget: Option<usize>,

    /// The divisor the delay native applies to its argument.
    /// Defaults to `EMC_TICKS_PER_DELAY_UNIT`, then 5.
    #[arg(long)]
    ticks_per_delay_unit: Option<u16>,
}

/// Slot 0 delays; every other slot logs its first argument and returns 0.
fn logging_table(category: EntityCategory) -> FunctionTable<Standalone> {
    let mut table = FunctionTable::<Standalone>::new(category);
    table.bind(0, general::delay);
    for slot in 1..FUNCTION_SLOTS {
        table.bind(slot, move |ctx| {
            let argument = ctx.peek(1).ok();
            info!(slot, ?argument, return_value = ctx.state.return_value, "native");
            Ok(0)
        });
    }
    table
}

impl RunCmd {
    fn opts(&self) -> Result<ScriptOpts> {
        let defaults = ScriptOpts::from_env();
        let opts = ScriptOpts {
            instruction_budget: self.budget.unwrap_or(defaults.instruction_budget),
            ticks_per_delay_unit: self
                .ticks_per_delay_unit
                .unwrap_or(defaults.ticks_per_delay_unit),
        };
        ensure!(opts.instruction_budget > 0, "the instruction budget must be positive");
        ensure!(opts.ticks_per_delay_unit > 0, "ticks per delay unit must be positive");
        Ok(opts)
    }

    pub fn run(&self) -> Result<()> {
        let program = Program::from_file(&self.path)
            .with_context(|| format!("while loading {}", self.path.display()))?;
        let category = EntityCategory::from(self.category);
        let table = logging_table(category);

        let mut owner = Standalone { category, subtype: self.subtype };
        let mut engine = ScriptEngine::with_opts(Arc::new(program), self.opts()?);
        engine
            .load(self.subtype)
            .with_context(|| format!("while loading subtype {}", self.subtype))?;

        let mut out = std::io::stdout().lock();
        let mut ticks = 0;
        while ticks < self.ticks {
            ticks += 1;
            match Scheduler::tick_engine(&mut engine, &table, &mut owner) {
                TickOutcome::Idle => break,
                TickOutcome::Halted(err) => {
                    writeln!(out, "halted on tick {ticks}: {err}")?;
                    break;
                }
                TickOutcome::Waiting(_) | TickOutcome::Ran(_) => {}
            }
        }

        writeln!(out, "{ticks} ticks, engine {:?}", engine.status())?;
        write!(out, "{}", engine.report())?;
        Ok(())
    }
}
