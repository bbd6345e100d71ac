use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::{Program, ScriptError, StateError};

/// The number of value slots on the stack.
pub const STACK_SIZE: usize = 15;

/// The number of general variables.
pub const VARIABLE_COUNT: usize = 5;

/// The size in bytes of a persisted [`ScriptState`].
pub const STATE_SIZE: usize = 55;

/// The frame pointer of an engine with no active call frame.
pub const EMPTY_FRAME: u8 = 17;

/// Holds the mutable state of one script engine.
///
/// The stack grows toward index 0: `stack_pointer == 15` means empty and the top of the stack is
/// `stack[stack_pointer]`. All stack access goes through the checked methods below so that the
/// pointer never leaves `0..=15`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    /// The offset of the next instruction, or `None` when no program is loaded.
    pub ip: Option<u16>,

    /// Ticks left before the engine may run again.
    pub delay: u16,

    /// The result of the last native call, `SET_RETURN` or `RETURN`.
    pub return_value: u16,

    /// The base of the current call frame.
    pub frame_pointer: u8,

    /// The index of the top of the stack.
    pub stack_pointer: u8,

    /// Scratch registers shared with native functions.
    pub variables: [u16; VARIABLE_COUNT],

    /// The value stack.
    pub stack: [u16; STACK_SIZE],

    /// Whether an external subroutine is active.
    pub is_subroutine: bool,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            ip: None,
            delay: 0,
            return_value: 0,
            frame_pointer: EMPTY_FRAME,
            stack_pointer: STACK_SIZE as u8,
            variables: [0; VARIABLE_COUNT],
            stack: [0; STACK_SIZE],
            is_subroutine: false,
        }
    }
}

impl ScriptState {
    /// Create a new, unloaded [`ScriptState`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an instruction pointer is set.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.ip.is_some()
    }

    /// The number of values on the stack.
    #[must_use]
    pub const fn depth(&self) -> usize {
        STACK_SIZE - self.stack_pointer as usize
    }

    /// Clear the stack, the frame and the instruction pointer.
    ///
    /// Variables and the delay counter are left as they are.
    pub fn reset(&mut self) {
        self.return_value = 0;
        self.frame_pointer = EMPTY_FRAME;
        self.stack_pointer = STACK_SIZE as u8;
        self.ip = None;
        self.is_subroutine = false;
    }

    pub(crate) fn overflow(&self, slot: i32) -> ScriptError {
        ScriptError::StackOverflow { stack_pointer: self.stack_pointer, slot }
    }

    /// Push a value.
    pub fn push(&mut self, value: u16) -> Result<(), ScriptError> {
        if self.stack_pointer == 0 {
            return Err(self.overflow(-1));
        }
        self.stack_pointer -= 1;
        self.stack[self.stack_pointer as usize] = value;
        Ok(())
    }

    /// Pop a value.
    pub fn pop(&mut self) -> Result<u16, ScriptError> {
        if self.stack_pointer as usize >= STACK_SIZE {
            return Err(self.overflow(i32::from(self.stack_pointer)));
        }
        let value = self.stack[self.stack_pointer as usize];
        self.stack_pointer += 1;
        Ok(value)
    }

    /// Read the value `n` entries below the top without consuming it; `peek(1)` is the top.
    pub fn peek(&self, n: u8) -> Result<u16, ScriptError> {
        let slot = i32::from(self.stack_pointer) + i32::from(n) - 1;
        if n == 0 || slot >= STACK_SIZE as i32 {
            return Err(self.overflow(slot));
        }
        Ok(self.stack[slot as usize])
    }

    /// Read an absolute stack slot, as addressed relative to the frame pointer.
    pub fn slot(&self, slot: i32) -> Result<u16, ScriptError> {
        if !(0..STACK_SIZE as i32).contains(&slot) {
            return Err(self.overflow(slot));
        }
        Ok(self.stack[slot as usize])
    }

    /// Write an absolute stack slot.
    pub fn set_slot(&mut self, slot: i32, value: u16) -> Result<(), ScriptError> {
        if !(0..STACK_SIZE as i32).contains(&slot) {
            return Err(self.overflow(slot));
        }
        self.stack[slot as usize] = value;
        Ok(())
    }

    /// Move the stack pointer by a signed amount, keeping it within `0..=15`.
    fn shift(&mut self, amount: i32) -> Result<(), ScriptError> {
        let target = i32::from(self.stack_pointer) + amount;
        if !(0..=STACK_SIZE as i32).contains(&target) {
            return Err(self.overflow(target));
        }
        self.stack_pointer = target as u8;
        Ok(())
    }

    /// Discard `count` values.
    pub fn rewind(&mut self, count: u16) -> Result<(), ScriptError> {
        self.shift(i32::from(count as i16))
    }

    /// Reserve `count` slots.
    pub fn forward(&mut self, count: u16) -> Result<(), ScriptError> {
        self.shift(-i32::from(count as i16))
    }

    /// Save the instruction pointer and return value and continue at the entry of `subtype`.
    ///
    /// A no-op when nothing is loaded or a subroutine is already active. `RETURN` undoes it.
    pub fn enter_subroutine(&mut self, program: &Program, subtype: u16) -> Result<(), ScriptError> {
        let Some(ip) = self.ip else {
            return Ok(());
        };
        if self.is_subroutine {
            return Ok(());
        }
        let entry = program.entry(subtype).ok_or(ScriptError::UnknownEntry(subtype))?;
        if self.stack_pointer < 2 {
            return Err(self.overflow(i32::from(self.stack_pointer) - 2));
        }
        self.push(ip)?;
        self.push(self.return_value)?;
        self.is_subroutine = true;
        self.ip = Some(entry);
        Ok(())
    }

    /// Write the state in its persisted layout.
    ///
    /// The layout is little-endian and always [`STATE_SIZE`] bytes:
    ///
    /// | field | width |
    /// |---|---|
    /// | delay | 2 |
    /// | instruction offset, or 0 when unloaded | 4 |
    /// | reserved, zero | 4 |
    /// | return value | 2 |
    /// | frame pointer | 1 |
    /// | stack pointer | 1 |
    /// | variables | 5 × 2 |
    /// | stack | 15 × 2 |
    /// | subroutine flag | 1 |
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), StateError> {
        writer.write_u16::<LittleEndian>(self.delay)?;
        writer.write_u32::<LittleEndian>(self.ip.map_or(0, u32::from))?;
        writer.write_u32::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(self.return_value)?;
        writer.write_u8(self.frame_pointer)?;
        writer.write_u8(self.stack_pointer)?;
        for value in self.variables {
            writer.write_u16::<LittleEndian>(value)?;
        }
        for value in self.stack {
            writer.write_u16::<LittleEndian>(value)?;
        }
        writer.write_u8(u8::from(self.is_subroutine))?;
        Ok(())
    }

    /// Read a state written by [`ScriptState::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, StateError> {
        let delay = reader.read_u16::<LittleEndian>()?;
        let ip = match reader.read_u32::<LittleEndian>()? {
            0 => None,
            raw => Some(u16::try_from(raw).map_err(|_| StateError::Offset(raw))?),
        };
        let _reserved = reader.read_u32::<LittleEndian>()?;
        let return_value = reader.read_u16::<LittleEndian>()?;
        let frame_pointer = reader.read_u8()?;
        let stack_pointer = reader.read_u8()?;
        if stack_pointer as usize > STACK_SIZE {
            return Err(StateError::StackPointer(stack_pointer));
        }
        let mut variables = [0; VARIABLE_COUNT];
        reader.read_u16_into::<LittleEndian>(&mut variables)?;
        let mut stack = [0; STACK_SIZE];
        reader.read_u16_into::<LittleEndian>(&mut stack)?;
        let is_subroutine = reader.read_u8()? != 0;

        Ok(Self {
            ip,
            delay,
            return_value,
            frame_pointer,
            stack_pointer,
            variables,
            stack,
            is_subroutine,
        })
    }
}
