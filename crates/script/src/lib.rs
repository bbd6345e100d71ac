//! An implementation of the EMC script engine.
//!
//! Every scripted entity (structure, unit or team) owns a [`ScriptEngine`]: a tiny stack machine
//! with fifteen value slots and five variables that interprets a shared, read-only [`Program`].
//! Engines never block. A script suspends itself by setting a delay, and the [`Scheduler`] skips it
//! until the delay has counted down, so resuming is just dispatching again from the stored
//! instruction pointer.
//!
//! Behavior beyond the instruction set lives in native functions bound into a per-category
//! [`FunctionTable`] and reached through the `FUNCTION` opcode.

#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![warn(missing_docs)]

mod category;
mod chunk;
mod context;
mod disassembler;
mod error;
mod executor;
pub mod functions;
mod instruction;
mod opcode;
mod opts;
mod program;
#[cfg(any(test, feature = "programs"))]
pub mod programs;
mod report;
mod scheduler;
mod state;
pub mod utils;

pub use category::*;
pub use context::*;
pub use disassembler::*;
pub use error::*;
pub use executor::*;
pub use functions::{FunctionTable, ScriptFunction, FUNCTION_SLOTS};
pub use instruction::*;
pub use opcode::*;
pub use opts::*;
pub use program::*;
pub use report::*;
pub use scheduler::*;
pub use state::*;
