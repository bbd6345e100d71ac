use thiserror::Error;

use crate::Opcode;

/// A condition that halts a single script engine.
///
/// None of these are fatal to the simulation: the engine that raised it clears its instruction
/// pointer and goes idle until it is loaded again, and every other engine keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A push, pop, peek or frame access left the fifteen-slot stack.
    #[error("stack overflow (stack pointer {stack_pointer}, slot {slot})")]
    StackOverflow {
        /// The stack pointer at the time of the access.
        stack_pointer: u8,
        /// The slot that would have been touched.
        slot: i32,
    },

    /// The decoded opcode has no handler.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// `FUNCTION` named a slot that is out of range or unbound.
    #[error("unknown function {0}")]
    UnknownFunction(u16),

    /// An opcode received a parameter outside of its domain.
    #[error("invalid parameter {parameter} for {opcode}")]
    InvalidParameter {
        /// The opcode being executed.
        opcode: Opcode,
        /// The offending parameter.
        parameter: u16,
    },

    /// The instruction pointer does not address a word of the program.
    #[error("instruction offset {0} is outside the program")]
    InvalidAddress(u16),

    /// `BINARY` divide or modulo with a zero right-hand operand.
    #[error("division by zero")]
    DivisionByZero,

    /// The program has no entry offset for the requested subtype.
    #[error("no entry offset for subtype {0}")]
    UnknownEntry(u16),

    /// A native named a variable past the last one.
    #[error("unknown variable {0}")]
    UnknownVariable(usize),
}

/// An error raised while loading a [`crate::Program`].
///
/// Loading is all-or-nothing: when this is returned no program was produced.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("failed to read program: {0}")]
    Io(#[from] std::io::Error),

    /// The input does not start with a `FORM` header.
    #[error("not a FORM container")]
    NotAForm,

    /// The container holds something other than a script.
    #[error("unexpected form type {found:?}")]
    WrongFormType {
        /// The form type that was found, lossily decoded.
        found: String,
    },

    /// A chunk header or body runs past the end of the input.
    #[error("chunk {chunk} is truncated")]
    Truncated {
        /// The chunk being read, lossily decoded.
        chunk: String,
    },

    /// One of the three required chunks is absent.
    #[error("missing required chunk {0}")]
    MissingChunk(&'static str),

    /// A chunk that holds 16-bit words has an odd byte length.
    #[error("chunk {chunk} has odd length {len}")]
    OddLength {
        /// The chunk name.
        chunk: &'static str,
        /// Its byte length.
        len: usize,
    },
}

/// An error raised while restoring a persisted [`crate::ScriptState`].
#[derive(Error, Debug)]
pub enum StateError {
    /// The underlying reader or writer failed, including short reads.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The persisted stack pointer is outside `0..=15`.
    #[error("stack pointer {0} exceeds the stack size")]
    StackPointer(u8),

    /// The persisted instruction offset does not fit the 16-bit address space.
    #[error("instruction offset {0} is out of range")]
    Offset(u32),
}
