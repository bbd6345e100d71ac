use core::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{BinaryOp, Opcode, ScriptError, UnaryOp};

/// Bit 15: the word is a direct jump to bits 0-14.
const JUMP_FLAG: u16 = 0x8000;
/// Bit 14: the parameter is the sign-extended low byte.
const BYTE_FLAG: u16 = 0x4000;
/// Bit 13: the parameter is the following word.
const WORD_FLAG: u16 = 0x2000;

/// How an instruction was, or will be, laid out in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// One word with bit 15 set; the opcode is [`Opcode::JUMP`].
    Jump,
    /// One word with bit 14 set and an 8-bit signed parameter.
    Byte,
    /// Two words; bit 13 set and the parameter in the second word.
    Word,
    /// One word with no parameter.
    Bare,
}

/// A decoded instruction.
///
/// The opcode is kept as its raw 5-bit value so that words naming an undefined opcode still
/// decode; the dispatcher rejects them with [`ScriptError::UnknownOpcode`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// The raw opcode, bits 8-12 of the first word.
    pub opcode: u8,
    /// The parameter, already sign-extended for [`Encoding::Byte`].
    pub parameter: u16,
    /// The encoding the instruction uses.
    pub encoding: Encoding,
}

impl Instruction {
    /// Create an instruction, picking the shortest encoding that represents `parameter`.
    #[must_use]
    pub const fn new(opcode: Opcode, parameter: u16) -> Self {
        let encoding = if parameter == 0 {
            Encoding::Bare
        } else if (parameter as i16) >= i8::MIN as i16 && (parameter as i16) <= i8::MAX as i16 {
            Encoding::Byte
        } else {
            Encoding::Word
        };
        Self { opcode: opcode as u8, parameter, encoding }
    }

    /// Create a direct jump to `target`.
    #[must_use]
    pub const fn jump(target: u16) -> Self {
        Self { opcode: Opcode::JUMP as u8, parameter: target & 0x7FFF, encoding: Encoding::Jump }
    }

    /// Decode the instruction starting at the first word of `words`.
    ///
    /// `words` must hold the following word as well when the first uses [`Encoding::Word`];
    /// `None` is returned otherwise, or when `words` is empty.
    #[must_use]
    pub fn from_words(words: &[u16]) -> Option<Self> {
        let &word = words.first()?;

        if word & JUMP_FLAG != 0 {
            return Some(Self::jump(word));
        }

        let opcode = ((word >> 8) & 0x1F) as u8;
        let (parameter, encoding) = if word & BYTE_FLAG != 0 {
            (i16::from(word as u8 as i8) as u16, Encoding::Byte)
        } else if word & WORD_FLAG != 0 {
            (*words.get(1)?, Encoding::Word)
        } else {
            (0, Encoding::Bare)
        };
        Some(Self { opcode, parameter, encoding })
    }

    /// The number of words the instruction occupies.
    #[must_use]
    pub const fn size(&self) -> u16 {
        match self.encoding {
            Encoding::Word => 2,
            Encoding::Jump | Encoding::Byte | Encoding::Bare => 1,
        }
    }

    /// Append the encoded words to `out`.
    pub fn encode_into(&self, out: &mut Vec<u16>) {
        let head = u16::from(self.opcode & 0x1F) << 8;
        match self.encoding {
            Encoding::Jump => out.push(JUMP_FLAG | (self.parameter & 0x7FFF)),
            Encoding::Byte => out.push(BYTE_FLAG | head | (self.parameter & 0xFF)),
            Encoding::Word => out.extend([WORD_FLAG | head, self.parameter]),
            Encoding::Bare => out.push(head),
        }
    }

    /// The opcode, if it is one of the defined ones.
    #[must_use]
    pub const fn op(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }
}

/// Decode the instruction at `offset`, returning it with the offset of the instruction after it.
pub fn decode(words: &[u16], offset: u16) -> Result<(Instruction, u16), ScriptError> {
    let tail = words.get(offset as usize..).ok_or(ScriptError::InvalidAddress(offset))?;
    let instruction = Instruction::from_words(tail).ok_or(ScriptError::InvalidAddress(offset))?;
    Ok((instruction, offset.wrapping_add(instruction.size())))
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(opcode) = self.op() else {
            return write!(f, "{:<10} {}", format!("op{}", self.opcode), self.parameter);
        };

        let operand = match opcode {
            Opcode::UNARY => UnaryOp::from_parameter(self.parameter)
                .map_or_else(|_| format!("?{}", self.parameter), |op| op.mnemonic().to_string()),
            Opcode::BINARY => BinaryOp::from_parameter(self.parameter)
                .map_or_else(|_| format!("?{}", self.parameter), |op| op.mnemonic().to_string()),
            Opcode::JUMP | Opcode::JUMP_NE => format!("{:#06x}", self.parameter & 0x7FFF),
            Opcode::FUNCTION => format!("#{}", self.parameter & 0xFF),
            _ => format!("{}", self.parameter as i16),
        };

        write!(f, "{:<10} {}", opcode.mnemonic(), operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_direct_jump() {
        let (instruction, next) = decode(&[0x8123], 0).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::JUMP));
        assert_eq!(instruction.parameter, 0x0123);
        assert_eq!(instruction.encoding, Encoding::Jump);
        assert_eq!(next, 1);

        let (instruction, _) = decode(&[0xFFFF], 0).unwrap();
        assert_eq!(instruction.parameter, 0x7FFF);
    }

    #[test]
    fn decode_byte_parameter_is_sign_extended() {
        // PUSH with low byte 0xFF.
        let (instruction, next) = decode(&[0x43FF], 0).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::PUSH));
        assert_eq!(instruction.parameter as i16, -1);
        assert_eq!(next, 1);

        // JUMP_NE with low byte 0xFC, a backward relative step of four.
        let (instruction, _) = decode(&[0x4FFC], 0).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::JUMP_NE));
        assert_eq!(instruction.parameter as i16, -4);

        let (instruction, _) = decode(&[0x437F], 0).unwrap();
        assert_eq!(instruction.parameter, 127);

        let (instruction, _) = decode(&[0x40FF], 0).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::JUMP));
        assert_eq!(instruction.parameter, 0xFFFF);
    }

    #[test]
    fn decode_word_parameter_consumes_next_word() {
        let (instruction, next) = decode(&[0x0000, 0x2300, 0x1234, 0x0100], 1).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::PUSH));
        assert_eq!(instruction.parameter, 0x1234);
        assert_eq!(instruction.encoding, Encoding::Word);
        assert_eq!(next, 3);
    }

    #[test]
    fn decode_bare() {
        let (instruction, next) = decode(&[0x1200], 0).unwrap();
        assert_eq!(instruction.op(), Some(Opcode::RETURN));
        assert_eq!(instruction.parameter, 0);
        assert_eq!(instruction.encoding, Encoding::Bare);
        assert_eq!(next, 1);
    }

    #[test]
    fn decode_keeps_undefined_opcodes() {
        let (instruction, _) = decode(&[0x1F00], 0).unwrap();
        assert_eq!(instruction.opcode, 31);
        assert_eq!(instruction.op(), None);
    }

    #[test]
    fn decode_out_of_range() {
        assert_eq!(decode(&[0x0100], 1), Err(ScriptError::InvalidAddress(1)));
        assert_eq!(decode(&[0x0100], 9), Err(ScriptError::InvalidAddress(9)));
        // A word operand hanging off the end of the stream.
        assert_eq!(decode(&[0x2300], 0), Err(ScriptError::InvalidAddress(0)));
    }

    #[test]
    fn new_picks_shortest_encoding() {
        assert_eq!(Instruction::new(Opcode::RETURN, 0).encoding, Encoding::Bare);
        assert_eq!(Instruction::new(Opcode::PUSH, 5).encoding, Encoding::Byte);
        assert_eq!(Instruction::new(Opcode::PUSH, (-128i16) as u16).encoding, Encoding::Byte);
        assert_eq!(Instruction::new(Opcode::PUSH, 128).encoding, Encoding::Word);
        assert_eq!(Instruction::new(Opcode::PUSH, 0x1234).size(), 2);
    }

    #[test]
    fn encode_matches_bit_layout() {
        let mut out = Vec::new();
        Instruction::new(Opcode::PUSH, (-1i16) as u16).encode_into(&mut out);
        Instruction::new(Opcode::PUSH, 0x1234).encode_into(&mut out);
        Instruction::new(Opcode::RETURN, 0).encode_into(&mut out);
        Instruction::jump(0x0123).encode_into(&mut out);
        assert_eq!(out, vec![0x43FF, 0x2300, 0x1234, 0x1200, 0x8123]);
    }

    #[test]
    fn debug_listing() {
        let text = format!("{:?}", Instruction::new(Opcode::BINARY, 8));
        assert!(text.starts_with("binary"));
        assert!(text.ends_with("add"));
        assert_eq!(format!("{:?}", Instruction::jump(0x10)).trim_end(), "jump       0x0010");
    }
}
