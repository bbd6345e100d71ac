//! Opcodes for the EMC script engine.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::ScriptError;

/// An opcode selects the operation performed by one instruction.
///
/// The opcode occupies bits 8 to 12 of an instruction word, so values up to 31 can be encoded;
/// only the first 19 are defined. Anything else is rejected at dispatch time with
/// [`ScriptError::UnknownOpcode`].
///
/// Stack effects below use `push`/`pop` on the fifteen-slot value stack, `fp` for the frame
/// pointer and `ip` for the instruction pointer.
#[allow(non_camel_case_types)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, EnumIter,
)]
pub enum Opcode {
    /// ip ← param
    JUMP = 0,
    /// return ← param
    SET_RETURN = 1,
    /// param 0: push(return); param 1: push(ip + 1), push(fp), fp ← sp + 2
    PUSH_RETURN_OR_FRAME = 2,
    /// push(param)
    PUSH = 3,
    /// push(param)
    PUSH2 = 4,
    /// push(variables\[param\])
    PUSH_VARIABLE = 5,
    /// push(stack\[fp - param - 2\])
    PUSH_LOCAL = 6,
    /// push(stack\[fp + param - 1\])
    PUSH_PARAMETER = 7,
    /// param 0: return ← pop(); param 1: fp ← pop(), ip ← pop()
    POP_RETURN_OR_FRAME = 8,
    /// variables\[param\] ← pop()
    POP_VARIABLE = 9,
    /// stack\[fp - param - 2\] ← pop()
    POP_LOCAL = 10,
    /// stack\[fp + param - 1\] ← pop()
    POP_PARAMETER = 11,
    /// sp ← sp + param
    STACK_REWIND = 12,
    /// sp ← sp - param
    STACK_FORWARD = 13,
    /// return ← functions\[param & 0xFF\](engine)
    FUNCTION = 14,
    /// if pop() == 0 { ip ← param & 0x7FFF }
    JUMP_NE = 15,
    /// push(unary\[param\](pop()))
    UNARY = 16,
    /// right ← pop(), left ← pop(), push(binary\[param\](left, right))
    BINARY = 17,
    /// return ← pop(), ip ← pop(), leave subroutine
    RETURN = 18,
}

impl Opcode {
    /// Parse an opcode from its 5-bit value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Opcode::JUMP,
            1 => Opcode::SET_RETURN,
            2 => Opcode::PUSH_RETURN_OR_FRAME,
            3 => Opcode::PUSH,
            4 => Opcode::PUSH2,
            5 => Opcode::PUSH_VARIABLE,
            6 => Opcode::PUSH_LOCAL,
            7 => Opcode::PUSH_PARAMETER,
            8 => Opcode::POP_RETURN_OR_FRAME,
            9 => Opcode::POP_VARIABLE,
            10 => Opcode::POP_LOCAL,
            11 => Opcode::POP_PARAMETER,
            12 => Opcode::STACK_REWIND,
            13 => Opcode::STACK_FORWARD,
            14 => Opcode::FUNCTION,
            15 => Opcode::JUMP_NE,
            16 => Opcode::UNARY,
            17 => Opcode::BINARY,
            18 => Opcode::RETURN,
            _ => return None,
        })
    }

    /// Get the mnemonic for the opcode.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::JUMP => "jump",
            Opcode::SET_RETURN => "setret",
            Opcode::PUSH_RETURN_OR_FRAME => "pushrf",
            Opcode::PUSH => "push",
            Opcode::PUSH2 => "push2",
            Opcode::PUSH_VARIABLE => "pushv",
            Opcode::PUSH_LOCAL => "pushl",
            Opcode::PUSH_PARAMETER => "pushp",
            Opcode::POP_RETURN_OR_FRAME => "poprf",
            Opcode::POP_VARIABLE => "popv",
            Opcode::POP_LOCAL => "popl",
            Opcode::POP_PARAMETER => "popp",
            Opcode::STACK_REWIND => "rewind",
            Opcode::STACK_FORWARD => "forward",
            Opcode::FUNCTION => "call",
            Opcode::JUMP_NE => "jumpz",
            Opcode::UNARY => "unary",
            Opcode::BINARY => "binary",
            Opcode::RETURN => "ret",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The operation selected by the parameter of [`Opcode::UNARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum UnaryOp {
    /// `!v`: 1 when the operand is zero, else 0.
    Not = 0,
    /// `-v` on the signed 16-bit interpretation.
    Neg = 1,
    /// `~v`.
    BitNot = 2,
}

impl UnaryOp {
    /// Select the operation for a `UNARY` parameter.
    pub fn from_parameter(parameter: u16) -> Result<Self, ScriptError> {
        match parameter {
            0 => Ok(UnaryOp::Not),
            1 => Ok(UnaryOp::Neg),
            2 => Ok(UnaryOp::BitNot),
            _ => Err(ScriptError::InvalidParameter { opcode: Opcode::UNARY, parameter }),
        }
    }

    /// Apply the operation.
    #[must_use]
    pub const fn apply(self, value: u16) -> u16 {
        match self {
            UnaryOp::Not => (value == 0) as u16,
            UnaryOp::Neg => (value as i16).wrapping_neg() as u16,
            UnaryOp::BitNot => !value,
        }
    }

    /// Get the mnemonic for the operation.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "neg",
            UnaryOp::BitNot => "bnot",
        }
    }
}

/// The operation selected by the parameter of [`Opcode::BINARY`].
///
/// Both operands are read as signed 16-bit values and the result is truncated back to 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum BinaryOp {
    /// `l && r`
    And = 0,
    /// `l || r`
    Or = 1,
    /// `l == r`
    Eq = 2,
    /// `l != r`
    Ne = 3,
    /// `l < r`
    Lt = 4,
    /// `l <= r`
    Le = 5,
    /// `l > r`
    Gt = 6,
    /// `l >= r`
    Ge = 7,
    /// `l + r`
    Add = 8,
    /// `l - r`
    Sub = 9,
    /// `l * r`
    Mul = 10,
    /// `l / r`, truncating toward zero.
    Div = 11,
    /// `l >> r`, arithmetic.
    Shr = 12,
    /// `l << r`
    Shl = 13,
    /// `l & r`
    BitAnd = 14,
    /// `l | r`
    BitOr = 15,
    /// `l % r`, with the sign of `l`.
    Mod = 16,
    /// `l ^ r`
    Xor = 17,
}

impl BinaryOp {
    /// Select the operation for a `BINARY` parameter.
    pub fn from_parameter(parameter: u16) -> Result<Self, ScriptError> {
        Ok(match parameter {
            0 => BinaryOp::And,
            1 => BinaryOp::Or,
            2 => BinaryOp::Eq,
            3 => BinaryOp::Ne,
            4 => BinaryOp::Lt,
            5 => BinaryOp::Le,
            6 => BinaryOp::Gt,
            7 => BinaryOp::Ge,
            8 => BinaryOp::Add,
            9 => BinaryOp::Sub,
            10 => BinaryOp::Mul,
            11 => BinaryOp::Div,
            12 => BinaryOp::Shr,
            13 => BinaryOp::Shl,
            14 => BinaryOp::BitAnd,
            15 => BinaryOp::BitOr,
            16 => BinaryOp::Mod,
            17 => BinaryOp::Xor,
            _ => {
                return Err(ScriptError::InvalidParameter { opcode: Opcode::BINARY, parameter })
            }
        })
    }

    /// Apply the operation to `left` and `right`.
    pub fn apply(self, left: u16, right: u16) -> Result<u16, ScriptError> {
        let (l, r) = (i32::from(left as i16), i32::from(right as i16));
        let result = match self {
            BinaryOp::And => i32::from(l != 0 && r != 0),
            BinaryOp::Or => i32::from(l != 0 || r != 0),
            BinaryOp::Eq => i32::from(l == r),
            BinaryOp::Ne => i32::from(l != r),
            BinaryOp::Lt => i32::from(l < r),
            BinaryOp::Le => i32::from(l <= r),
            BinaryOp::Gt => i32::from(l > r),
            BinaryOp::Ge => i32::from(l >= r),
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => {
                if r == 0 {
                    return Err(ScriptError::DivisionByZero);
                }
                l / r
            }
            BinaryOp::Shr => l.wrapping_shr(r as u32),
            BinaryOp::Shl => l.wrapping_shl(r as u32),
            BinaryOp::BitAnd => l & r,
            BinaryOp::BitOr => l | r,
            BinaryOp::Mod => {
                if r == 0 {
                    return Err(ScriptError::DivisionByZero);
                }
                l % r
            }
            BinaryOp::Xor => l ^ r,
        };
        Ok(result as u16)
    }

    /// Get the mnemonic for the operation.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::And => "land",
            BinaryOp::Or => "lor",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Shr => "shr",
            BinaryOp::Shl => "shl",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::Mod => "mod",
            BinaryOp::Xor => "xor",
        }
    }
}
