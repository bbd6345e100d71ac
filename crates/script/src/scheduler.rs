use tracing::{debug_span, trace};

use crate::{FunctionTable, ScriptEngine, ScriptError, ScriptOwner};

/// What one engine did during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is loaded.
    Idle,
    /// The delay was counted down; the engine waits this many more ticks.
    Waiting(u16),
    /// The engine ran this many instructions.
    Ran(usize),
    /// The engine halted on an error this tick.
    Halted(ScriptError),
}

/// Totals over all engines for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Engines with nothing loaded.
    pub idle: usize,
    /// Engines that counted their delay down.
    pub waiting: usize,
    /// Engines that ran.
    pub ran: usize,
    /// Engines that halted.
    pub halted: usize,
    /// Instructions executed over all engines.
    pub instructions: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Idle => self.idle += 1,
            TickOutcome::Waiting(_) => self.waiting += 1,
            TickOutcome::Ran(count) => {
                self.ran += 1;
                self.instructions += count;
            }
            TickOutcome::Halted(_) => self.halted += 1,
        }
    }
}

/// Drives script engines cooperatively, one tick at a time.
///
/// On each tick an engine with a pending delay only has the delay decremented; any other loaded
/// engine runs until it sets a delay, halts, or exhausts its instruction budget. An engine that
/// sets a delay of `n` is therefore skipped for the next `n` ticks and runs again on tick `n + 1`.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tick: u64,
}

impl Scheduler {
    /// Create a new [`Scheduler`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Advance one engine by one tick.
    pub fn tick_engine<O: ScriptOwner>(
        engine: &mut ScriptEngine,
        table: &FunctionTable<O>,
        owner: &mut O,
    ) -> TickOutcome {
        if !engine.is_loaded() {
            return TickOutcome::Idle;
        }

        let state = engine.state_mut();
        if state.delay > 0 {
            state.delay -= 1;
            return TickOutcome::Waiting(state.delay);
        }

        match engine.run(table, owner) {
            Ok(count) => TickOutcome::Ran(count),
            Err(err) => TickOutcome::Halted(err),
        }
    }

    /// Advance every engine by one tick.
    pub fn tick<'a, O, I>(&mut self, table: &FunctionTable<O>, entities: I) -> TickSummary
    where
        O: ScriptOwner + 'a,
        I: IntoIterator<Item = (&'a mut ScriptEngine, &'a mut O)>,
    {
        self.tick += 1;
        let _span = debug_span!("tick", tick = self.tick, category = %table.category()).entered();

        let mut summary = TickSummary::default();
        for (engine, owner) in entities {
            let outcome = Self::tick_engine(engine, table, owner);
            summary.record(&outcome);
        }
        trace!(?summary, "tick done");
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        functions::general, programs::ProgramBuilder, EngineStatus, EntityCategory, Opcode,
    };

    fn delay_loop(delay: u16) -> ScriptEngine {
        // 0: push delay, 1: call delay, 2: drop the argument, 3: jump 0
        let program = ProgramBuilder::new()
            .entry()
            .op(Opcode::PUSH, delay)
            .op(Opcode::FUNCTION, 0)
            .op(Opcode::STACK_REWIND, 1)
            .jump(0)
            .build();
        let mut engine = ScriptEngine::new(Arc::new(program));
        engine.load(0).unwrap();
        engine
    }

    fn table() -> FunctionTable<()> {
        let mut table = FunctionTable::<()>::new(EntityCategory::Structure);
        table.bind(0, general::delay);
        table
    }

    #[test]
    fn delay_of_fifteen_skips_fifteen_ticks() {
        let table = table();
        let mut engine = delay_loop(75);

        assert_eq!(Scheduler::tick_engine(&mut engine, &table, &mut ()), TickOutcome::Ran(2));
        assert_eq!(engine.state().delay, 15);

        for tick in 1..=15 {
            assert_eq!(
                Scheduler::tick_engine(&mut engine, &table, &mut ()),
                TickOutcome::Waiting(15 - tick)
            );
            assert_eq!(engine.state().ip, Some(2));
        }

        // Tick 16: rewind, jump, push, call.
        assert_eq!(Scheduler::tick_engine(&mut engine, &table, &mut ()), TickOutcome::Ran(4));
        assert_eq!(engine.state().delay, 15);
    }

    #[test]
    fn tick_summarizes_engines() {
        let table = table();
        let mut busy = delay_loop(0);
        let mut waiting = delay_loop(10);
        let mut idle = ScriptEngine::new(Arc::clone(busy.program()));
        let undefined = ProgramBuilder::new().entry().raw(&[0x1F00]).build();
        let mut broken = ScriptEngine::new(Arc::new(undefined));
        broken.load(0).unwrap();

        let mut owners = [(), (), (), ()];
        let [a, b, c, d] = &mut owners;
        let mut scheduler = Scheduler::new();
        let summary = scheduler.tick(
            &table,
            [(&mut busy, a), (&mut waiting, b), (&mut idle, c), (&mut broken, d)],
        );

        assert_eq!(scheduler.ticks(), 1);
        assert_eq!(summary.idle, 1);
        assert_eq!(summary.ran, 2);
        assert_eq!(summary.halted, 1);
        assert_eq!(summary.waiting, 0);
        // A zero delay never suspends, so the busy loop uses its whole budget.
        assert_eq!(summary.instructions, 50 + 2);
        assert_eq!(broken.status(), EngineStatus::Halted);
        assert_eq!(waiting.status(), EngineStatus::Suspended);
    }
}
