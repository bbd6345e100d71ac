//! Native functions reachable from scripts through the `FUNCTION` opcode.

use core::fmt::Debug;
use std::sync::Arc;

use tracing::warn;

use crate::{EntityCategory, ScriptContext, ScriptError};

/// The number of slots in a [`FunctionTable`].
pub const FUNCTION_SLOTS: usize = 64;

/// A native function callable from a script.
///
/// Arguments are read with [`ScriptContext::peek`] and stay on the stack; the returned value
/// becomes the engine's return value.
pub trait ScriptFunction<O>: Send + Sync {
    /// Executes the function.
    fn execute(&self, ctx: &mut ScriptContext<'_, O>) -> Result<u16, ScriptError>;
}

impl<O, F> ScriptFunction<O> for F
where
    F: Fn(&mut ScriptContext<'_, O>) -> Result<u16, ScriptError> + Send + Sync,
{
    fn execute(&self, ctx: &mut ScriptContext<'_, O>) -> Result<u16, ScriptError> {
        self(ctx)
    }
}

/// The native functions of one entity category, indexed by the low byte of the `FUNCTION`
/// parameter.
///
/// Tables are built once at startup and then only read, so a single table is shared by every
/// engine of its category.
pub struct FunctionTable<O> {
    category: EntityCategory,
    slots: [Option<Arc<dyn ScriptFunction<O>>>; FUNCTION_SLOTS],
}

impl<O> FunctionTable<O> {
    /// Create an empty [`FunctionTable`].
    #[must_use]
    pub fn new(category: EntityCategory) -> Self {
        Self { category, slots: std::array::from_fn(|_| None) }
    }

    /// The category the table serves.
    #[must_use]
    pub const fn category(&self) -> EntityCategory {
        self.category
    }

    /// Bind a function to a slot, replacing any function already there.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`FUNCTION_SLOTS`].
    pub fn bind<F>(&mut self, index: usize, function: F) -> &mut Self
    where
        F: Fn(&mut ScriptContext<'_, O>) -> Result<u16, ScriptError> + Send + Sync + 'static,
    {
        self.bind_arc(index, Arc::new(function))
    }

    /// Bind a shared function object to a slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`FUNCTION_SLOTS`].
    pub fn bind_arc(&mut self, index: usize, function: Arc<dyn ScriptFunction<O>>) -> &mut Self {
        assert!(index < FUNCTION_SLOTS, "function slot {index} out of range");
        if self.slots[index].is_some() {
            warn!(category = %self.category, index, "overriding native function");
        }
        self.slots[index] = Some(function);
        self
    }

    /// Get the function bound to a slot.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Arc<dyn ScriptFunction<O>>> {
        self.slots.get(index as usize)?.as_ref()
    }

    /// The indices of all bound slots, in ascending order.
    pub fn bound(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| slot.as_ref().map(|_| i))
    }

    /// Call the function bound to `index`.
    pub fn invoke(&self, index: u16, ctx: &mut ScriptContext<'_, O>) -> Result<u16, ScriptError> {
        let function = self.get(index).ok_or(ScriptError::UnknownFunction(index))?;
        function.execute(ctx)
    }
}

impl<O> Clone for FunctionTable<O> {
    fn clone(&self) -> Self {
        Self { category: self.category, slots: self.slots.clone() }
    }
}

impl<O> Debug for FunctionTable<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTable")
            .field("category", &self.category)
            .field("bound", &self.bound().collect::<Vec<_>>())
            .finish()
    }
}

/// Natives that do not depend on the owning entity, bindable in every table.
pub mod general {
    use crate::{ScriptContext, ScriptError};

    /// Suspend the script for `peek(1) / ticks_per_delay_unit` ticks. Returns the delay.
    pub fn delay<O>(ctx: &mut ScriptContext<'_, O>) -> Result<u16, ScriptError> {
        let ticks = ctx.peek(1)? / ctx.opts().ticks_per_delay_unit.max(1);
        ctx.set_delay(ticks);
        Ok(ticks)
    }

    /// Does nothing.
    pub fn no_operation<O>(_ctx: &mut ScriptContext<'_, O>) -> Result<u16, ScriptError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Program, ScriptOpts, ScriptState};

    struct Counter(u16);

    impl ScriptFunction<u16> for Counter {
        fn execute(&self, ctx: &mut ScriptContext<'_, u16>) -> Result<u16, ScriptError> {
            *ctx.owner += self.0;
            Ok(*ctx.owner)
        }
    }

    #[test]
    fn invoke_bound_and_unbound() {
        let mut table = FunctionTable::<u16>::new(EntityCategory::Unit);
        table.bind(3, |ctx| Ok(ctx.peek(1)? * 2)).bind_arc(5, Arc::new(Counter(10)));
        assert_eq!(table.bound().collect::<Vec<_>>(), vec![3, 5]);

        let program = Program::default();
        let mut state = ScriptState::new();
        state.push(21).unwrap();
        let mut owner = 1;
        let mut ctx = ScriptContext::new(&mut state, &mut owner, &program, ScriptOpts::default());

        assert_eq!(table.invoke(3, &mut ctx), Ok(42));
        assert_eq!(table.invoke(5, &mut ctx), Ok(11));
        assert_eq!(table.invoke(4, &mut ctx), Err(ScriptError::UnknownFunction(4)));
        assert_eq!(table.invoke(64, &mut ctx), Err(ScriptError::UnknownFunction(64)));
        assert_eq!(owner, 11);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn bind_past_the_end() {
        FunctionTable::<()>::new(EntityCategory::Team).bind(64, general::no_operation);
    }

    #[test]
    fn delay_divides_argument() {
        let program = Program::default();
        let mut state = ScriptState::new();
        state.push(75).unwrap();
        let mut owner = 0u16;
        let mut ctx = ScriptContext::new(&mut state, &mut owner, &program, ScriptOpts::default());
        assert_eq!(general::delay(&mut ctx), Ok(15));
        assert_eq!(state.delay, 15);
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn debug_lists_bound_slots() {
        let mut table = FunctionTable::<()>::new(EntityCategory::Structure);
        table.bind(0, general::delay).bind(7, general::no_operation);
        assert_eq!(format!("{table:?}"), "FunctionTable { category: Structure, bound: [0, 7] }");
    }
}
