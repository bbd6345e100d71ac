use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::{
    BinaryOp, ExecutionReport, FunctionTable, Instruction, Opcode, Program, ScriptContext,
    ScriptError, ScriptOpts, ScriptOwner, ScriptState, UnaryOp,
};

/// The lifecycle state of a [`ScriptEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Nothing is loaded.
    Idle,
    /// Loaded and ready to dispatch.
    Running,
    /// Loaded, waiting for its delay to count down.
    Suspended,
    /// Stopped by an error or by a native function; idle until loaded again.
    Halted,
}

/// A script engine: the execution state of one entity over a shared [`Program`].
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    program: Arc<Program>,
    state: ScriptState,
    report: ExecutionReport,
    opts: ScriptOpts,
    halted: bool,
}

fn invalid(opcode: Opcode, parameter: u16) -> ScriptError {
    ScriptError::InvalidParameter { opcode, parameter }
}

/// The stack slot of local `parameter`.
fn local_slot(frame_pointer: u8, parameter: u16) -> i32 {
    i32::from(frame_pointer) - i32::from(parameter) - 2
}

/// The stack slot of argument `parameter`.
fn parameter_slot(frame_pointer: u8, parameter: u16) -> i32 {
    i32::from(frame_pointer) + i32::from(parameter) - 1
}

impl ScriptEngine {
    /// Create a new, idle [`ScriptEngine`] with the default options.
    #[must_use]
    pub fn new(program: Arc<Program>) -> Self {
        Self::with_opts(program, ScriptOpts::default())
    }

    /// Create a new, idle [`ScriptEngine`].
    #[must_use]
    pub fn with_opts(program: Arc<Program>, opts: ScriptOpts) -> Self {
        Self {
            program,
            state: ScriptState::new(),
            report: ExecutionReport::default(),
            opts,
            halted: false,
        }
    }

    /// The program the engine runs.
    #[must_use]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// The options the engine runs with.
    #[must_use]
    pub const fn opts(&self) -> ScriptOpts {
        self.opts
    }

    /// The execution state.
    #[must_use]
    pub const fn state(&self) -> &ScriptState {
        &self.state
    }

    /// The execution state, mutably. Used to restore a persisted state.
    pub fn state_mut(&mut self) -> &mut ScriptState {
        &mut self.state
    }

    /// The counts accumulated since the engine was created or the report was last taken.
    #[must_use]
    pub const fn report(&self) -> &ExecutionReport {
        &self.report
    }

    /// Take the accumulated report, leaving an empty one.
    pub fn take_report(&mut self) -> ExecutionReport {
        std::mem::take(&mut self.report)
    }

    /// Whether an instruction pointer is set.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// The lifecycle state of the engine.
    #[must_use]
    pub const fn status(&self) -> EngineStatus {
        match self.state.ip {
            None if self.halted => EngineStatus::Halted,
            None => EngineStatus::Idle,
            Some(_) if self.state.delay > 0 => EngineStatus::Suspended,
            Some(_) => EngineStatus::Running,
        }
    }

    /// Clear the stack, the frame and the instruction pointer.
    pub fn reset(&mut self) {
        self.state.reset();
        self.halted = false;
        debug!("script reset");
    }

    /// Reset and start the entry of `subtype`.
    ///
    /// When the program has no entry for `subtype` the engine is left reset, and so idle.
    pub fn load(&mut self, subtype: u16) -> Result<(), ScriptError> {
        self.reset();
        let Some(entry) = self.program.entry(subtype) else {
            warn!(subtype, "no entry offset, script left idle");
            return Err(ScriptError::UnknownEntry(subtype));
        };
        self.state.ip = Some(entry);
        debug!(subtype, entry, "script loaded");
        Ok(())
    }

    /// Run the entry of `subtype` nested inside the current script until it returns.
    ///
    /// Does nothing when no script is loaded or a subroutine is already active. A failure halts
    /// the engine.
    pub fn load_as_subroutine<O: ScriptOwner>(
        &mut self,
        owner: &O,
        subtype: u16,
    ) -> Result<(), ScriptError> {
        let ip = self.state.ip;
        if let Err(err) = self.state.enter_subroutine(&self.program, subtype) {
            self.fault(owner, ip, None, &err);
            return Err(err);
        }
        debug!(subtype, entry = ?self.state.ip, "subroutine loaded");
        Ok(())
    }

    /// Decode and execute one instruction.
    ///
    /// Returns `Ok(false)` without doing anything when nothing is loaded. On error the engine is
    /// already halted and the condition logged when this returns.
    pub fn step<O: ScriptOwner>(
        &mut self,
        table: &FunctionTable<O>,
        owner: &mut O,
    ) -> Result<bool, ScriptError> {
        let Some(ip) = self.state.ip else {
            return Ok(false);
        };

        let (instruction, next) = match self.program.fetch(ip) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.fault(owner, Some(ip), None, &err);
                return Err(err);
            }
        };
        trace!(offset = ip, ?instruction, "dispatch");

        self.state.ip = Some(next);
        if let Err(err) = self.execute(instruction, next, table, owner) {
            self.fault(owner, Some(ip), Some(instruction), &err);
            return Err(err);
        }
        Ok(true)
    }

    /// Execute until the script sets a delay, halts, or uses up the instruction budget.
    ///
    /// Returns the number of instructions executed.
    pub fn run<O: ScriptOwner>(
        &mut self,
        table: &FunctionTable<O>,
        owner: &mut O,
    ) -> Result<usize, ScriptError> {
        let mut executed = 0;
        while executed < self.opts.instruction_budget
            && self.state.is_loaded()
            && self.state.delay == 0
        {
            self.step(table, owner)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Execute the given instruction over the current state of the engine.
    ///
    /// `next` is the offset following the instruction, already stored as the instruction pointer.
    fn execute<O: ScriptOwner>(
        &mut self,
        instruction: Instruction,
        next: u16,
        table: &FunctionTable<O>,
        owner: &mut O,
    ) -> Result<(), ScriptError> {
        let opcode = instruction.op().ok_or(ScriptError::UnknownOpcode(instruction.opcode))?;
        let parameter = instruction.parameter;
        *self.report.opcode_counts.entry(opcode).or_insert(0) += 1;

        let state = &mut self.state;
        match opcode {
            Opcode::JUMP => state.ip = Some(parameter),
            Opcode::SET_RETURN => state.return_value = parameter,
            Opcode::PUSH_RETURN_OR_FRAME => match parameter {
                0 => state.push(state.return_value)?,
                1 => {
                    if state.stack_pointer < 2 {
                        return Err(state.overflow(i32::from(state.stack_pointer) - 2));
                    }
                    // Return past the JUMP that follows the frame setup.
                    state.push(next.wrapping_add(1))?;
                    state.push(u16::from(state.frame_pointer))?;
                    state.frame_pointer = state.stack_pointer + 2;
                }
                _ => return Err(invalid(opcode, parameter)),
            },
            Opcode::PUSH | Opcode::PUSH2 => state.push(parameter)?,
            Opcode::PUSH_VARIABLE => {
                let value = *state
                    .variables
                    .get(parameter as usize)
                    .ok_or_else(|| invalid(opcode, parameter))?;
                state.push(value)?;
            }
            Opcode::PUSH_LOCAL => {
                let value = state.slot(local_slot(state.frame_pointer, parameter))?;
                state.push(value)?;
            }
            Opcode::PUSH_PARAMETER => {
                let value = state.slot(parameter_slot(state.frame_pointer, parameter))?;
                state.push(value)?;
            }
            Opcode::POP_RETURN_OR_FRAME => match parameter {
                0 => state.return_value = state.pop()?,
                1 => {
                    state.peek(2)?;
                    state.frame_pointer = state.pop()? as u8;
                    state.ip = Some(state.pop()?);
                }
                _ => return Err(invalid(opcode, parameter)),
            },
            Opcode::POP_VARIABLE => {
                if state.variables.get(parameter as usize).is_none() {
                    return Err(invalid(opcode, parameter));
                }
                state.variables[parameter as usize] = state.pop()?;
            }
            Opcode::POP_LOCAL | Opcode::POP_PARAMETER => {
                let slot = if opcode == Opcode::POP_LOCAL {
                    local_slot(state.frame_pointer, parameter)
                } else {
                    parameter_slot(state.frame_pointer, parameter)
                };
                state.slot(slot)?;
                let value = state.pop()?;
                state.set_slot(slot, value)?;
            }
            Opcode::STACK_REWIND => state.rewind(parameter)?,
            Opcode::STACK_FORWARD => state.forward(parameter)?,
            Opcode::FUNCTION => {
                let index = parameter & 0xFF;
                *self.report.function_counts.entry(index).or_insert(0) += 1;

                let mut ctx = ScriptContext::new(state, owner, &self.program, self.opts);
                let result = table.invoke(index, &mut ctx);
                let stopped = ctx.is_stopped();
                state.return_value = result?;

                if stopped {
                    debug!(function = index, "script stopped by native function");
                    state.ip = None;
                    self.halted = true;
                    self.report.halts += 1;
                }
            }
            Opcode::JUMP_NE => {
                state.peek(1)?;
                if state.pop()? == 0 {
                    state.ip = Some(parameter & 0x7FFF);
                }
            }
            Opcode::UNARY => {
                let op = UnaryOp::from_parameter(parameter)?;
                let value = state.pop()?;
                state.push(op.apply(value))?;
            }
            Opcode::BINARY => {
                let op = BinaryOp::from_parameter(parameter)?;
                state.peek(2)?;
                let right = state.pop()?;
                let left = state.pop()?;
                state.push(op.apply(left, right)?)?;
            }
            Opcode::RETURN => {
                state.peek(2)?;
                state.return_value = state.pop()?;
                state.ip = Some(state.pop()?);
                state.is_subroutine = false;
            }
        }

        Ok(())
    }

    /// Halt the engine and report why.
    fn fault<O: ScriptOwner>(
        &mut self,
        owner: &O,
        offset: Option<u16>,
        instruction: Option<Instruction>,
        err: &ScriptError,
    ) {
        let opcode = instruction.map_or_else(
            || "-".to_string(),
            |i| i.op().map_or_else(|| format!("op{}", i.opcode), |op| op.mnemonic().to_string()),
        );
        error!(
            category = %owner.category(),
            index = owner.index(),
            subtype = owner.subtype(),
            offset = ?offset,
            opcode = %opcode,
            "script halted: {err}"
        );
        self.state.ip = None;
        self.halted = true;
        self.report.halts += 1;
    }
}
