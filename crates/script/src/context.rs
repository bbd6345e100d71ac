use crate::{Program, ScriptError, ScriptOpts, ScriptState};

/// The view of an engine that a native function runs against.
///
/// Replaces any notion of a global "current entity": the engine state and the entity that owns it
/// are handed to every call explicitly.
pub struct ScriptContext<'a, O> {
    /// The state of the calling engine.
    pub state: &'a mut ScriptState,
    /// The entity that owns the calling engine.
    pub owner: &'a mut O,
    program: &'a Program,
    opts: ScriptOpts,
    stopped: bool,
}

impl<'a, O> ScriptContext<'a, O> {
    /// Create a new [`ScriptContext`].
    pub fn new(
        state: &'a mut ScriptState,
        owner: &'a mut O,
        program: &'a Program,
        opts: ScriptOpts,
    ) -> Self {
        Self { state, owner, program, opts, stopped: false }
    }

    /// The program the engine is running.
    #[must_use]
    pub fn program(&self) -> &'a Program {
        self.program
    }

    /// The options the engine runs with.
    #[must_use]
    pub fn opts(&self) -> ScriptOpts {
        self.opts
    }

    /// Read an argument; `peek(1)` is the top of the stack.
    ///
    /// Arguments stay on the stack, the script discards them after the call.
    pub fn peek(&self, n: u8) -> Result<u16, ScriptError> {
        self.state.peek(n)
    }

    /// Read a variable.
    pub fn variable(&self, index: usize) -> Result<u16, ScriptError> {
        self.state.variables.get(index).copied().ok_or(ScriptError::UnknownVariable(index))
    }

    /// Write a variable.
    pub fn set_variable(&mut self, index: usize, value: u16) -> Result<(), ScriptError> {
        let slot =
            self.state.variables.get_mut(index).ok_or(ScriptError::UnknownVariable(index))?;
        *slot = value;
        Ok(())
    }

    /// Suspend the engine for `ticks` scheduler ticks once the current instruction completes.
    pub fn set_delay(&mut self, ticks: u16) {
        self.state.delay = ticks;
    }

    /// Run the entry of `subtype` nested inside the current script.
    ///
    /// Does nothing when a subroutine is already active.
    pub fn load_as_subroutine(&mut self, subtype: u16) -> Result<(), ScriptError> {
        self.state.enter_subroutine(self.program, subtype)
    }

    /// Halt the engine after the current instruction.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether [`ScriptContext::stop`] was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The string referenced by text word `index` of the program.
    #[must_use]
    pub fn text(&self, index: u16) -> Option<&'a [u8]> {
        self.program.text(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_bounds_checked() {
        let program = Program::default();
        let mut state = ScriptState::new();
        let mut owner = 0u16;
        let mut ctx = ScriptContext::new(&mut state, &mut owner, &program, ScriptOpts::default());

        ctx.set_variable(4, 7).unwrap();
        assert_eq!(ctx.variable(4), Ok(7));
        assert_eq!(ctx.variable(5), Err(ScriptError::UnknownVariable(5)));
        assert_eq!(ctx.set_variable(5, 1), Err(ScriptError::UnknownVariable(5)));
        assert_eq!(state.variables, [0, 0, 0, 0, 7]);
    }
}
