use std::{io::Write, sync::Arc};

use emc_script::{
    functions::general, programs::ProgramBuilder, utils::setup_logger, EngineStatus,
    EntityCategory, FunctionTable, LoadError, Opcode, Program, ScriptEngine, ScriptError,
    ScriptOwner, Scheduler, TickOutcome,
};

/// What a native saw when it was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observation {
    return_value: u16,
    depth: usize,
}

#[derive(Debug, Default)]
struct Structure {
    index: u16,
    observations: Vec<Observation>,
}

impl ScriptOwner for Structure {
    fn category(&self) -> EntityCategory {
        EntityCategory::Structure
    }

    fn index(&self) -> u16 {
        self.index
    }
}

fn structure_table() -> FunctionTable<Structure> {
    let mut table = FunctionTable::<Structure>::new(EntityCategory::Structure);
    table
        .bind(0, general::delay)
        .bind(1, |ctx| {
            let observation =
                Observation { return_value: ctx.state.return_value, depth: ctx.state.depth() };
            ctx.owner.observations.push(observation);
            Ok(ctx.state.return_value)
        })
        .bind(2, |ctx| {
            ctx.stop();
            Ok(0)
        });
    table
}

/// Computes 5 + 3, shows it to a native, moves it into the return value and shows it again.
fn ordering_program() -> Vec<u8> {
    ProgramBuilder::new()
        .entry()
        .op(Opcode::PUSH, 5)
        .op(Opcode::PUSH, 3)
        .op(Opcode::BINARY, 8)
        .op(Opcode::FUNCTION, 1)
        .op(Opcode::POP_RETURN_OR_FRAME, 0)
        .op(Opcode::FUNCTION, 1)
        .op(Opcode::FUNCTION, 2)
        .bytes()
}

#[test]
fn return_value_is_set_in_program_order() {
    setup_logger();
    let program = Program::from(&ordering_program()).unwrap();
    let mut engine = ScriptEngine::new(Arc::new(program));
    let mut owner = Structure::default();
    engine.load(0).unwrap();

    let executed = engine.run(&structure_table(), &mut owner).unwrap();

    assert_eq!(executed, 7);
    assert_eq!(
        owner.observations,
        vec![
            Observation { return_value: 0, depth: 1 },
            Observation { return_value: 8, depth: 0 },
        ]
    );
    assert_eq!(engine.state().return_value, 0);
    assert_eq!(engine.status(), EngineStatus::Halted);
    assert_eq!(engine.report().total_function_count(), 3);
}

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&ordering_program()).unwrap();
    file.flush().unwrap();

    let program = Program::from_file(file.path()).unwrap();
    assert_eq!(program.entries, vec![0]);
    assert_eq!(program.instructions.len(), 7);

    let missing = file.path().with_extension("missing");
    assert!(matches!(Program::from_file(missing), Err(LoadError::Io(_))));
}

#[test]
fn truncated_file_is_rejected() {
    let mut bytes = ordering_program();
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(Program::from(&bytes), Err(LoadError::Truncated { .. })));
}

#[test]
fn halts_are_local_to_one_engine() {
    setup_logger();
    let program = Arc::new(
        ProgramBuilder::new()
            .entry()
            .op(Opcode::PUSH, 75)
            .op(Opcode::FUNCTION, 0)
            .op(Opcode::STACK_REWIND, 1)
            .jump(0)
            .entry()
            .op(Opcode::FUNCTION, 63)
            .build(),
    );
    let table = structure_table();

    let mut healthy = ScriptEngine::new(Arc::clone(&program));
    healthy.load(0).unwrap();
    let mut faulty = ScriptEngine::new(Arc::clone(&program));
    faulty.load(1).unwrap();

    let mut first = Structure { index: 0, ..Default::default() };
    let mut second = Structure { index: 1, ..Default::default() };

    let mut scheduler = Scheduler::new();
    let summary =
        scheduler.tick(&table, [(&mut healthy, &mut first), (&mut faulty, &mut second)]);
    assert_eq!(summary.ran, 1);
    assert_eq!(summary.halted, 1);
    assert_eq!(faulty.status(), EngineStatus::Halted);
    assert_eq!(healthy.status(), EngineStatus::Suspended);

    for _ in 0..15 {
        scheduler.tick(&table, [(&mut healthy, &mut first), (&mut faulty, &mut second)]);
    }
    assert_eq!(
        Scheduler::tick_engine(&mut healthy, &table, &mut first),
        TickOutcome::Ran(4)
    );
    assert_eq!(Scheduler::tick_engine(&mut faulty, &table, &mut second), TickOutcome::Idle);

    faulty.load(0).unwrap();
    assert_eq!(faulty.status(), EngineStatus::Running);
}

#[test]
fn unknown_function_reports_slot() {
    let program = ProgramBuilder::new().entry().op(Opcode::FUNCTION, 0x0140).build();
    let mut engine = ScriptEngine::new(Arc::new(program));
    engine.load(0).unwrap();
    let err = engine.run(&structure_table(), &mut Structure::default()).unwrap_err();
    assert_eq!(err, ScriptError::UnknownFunction(0x40));
}
