//! An in-memory assembler for building programs, mostly in tests.

use crate::{Instruction, Opcode, Program};

/// Builds a [`Program`] one instruction at a time.
///
/// ```
/// use emc_script::{programs::ProgramBuilder, Opcode};
///
/// let program = ProgramBuilder::new()
///     .entry()
///     .op(Opcode::PUSH, 5)
///     .op(Opcode::PUSH, 3)
///     .op(Opcode::BINARY, 8)
///     .build();
/// assert_eq!(program.entry(0), Some(0));
/// assert_eq!(program.instructions, vec![0x4305, 0x4303, 0x5108]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    text: Vec<u8>,
    entries: Vec<u16>,
    words: Vec<u16>,
}

impl ProgramBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The offset the next instruction will be placed at.
    #[must_use]
    pub fn offset(&self) -> u16 {
        self.words.len() as u16
    }

    /// Use `strings` as the text pool: an offset table followed by the NUL-terminated strings.
    #[must_use]
    pub fn text(mut self, strings: &[&str]) -> Self {
        let mut table = Vec::with_capacity(strings.len() * 2);
        let mut pool = Vec::new();
        for s in strings {
            let offset = (strings.len() * 2 + pool.len()) as u16;
            table.extend_from_slice(&offset.to_be_bytes());
            pool.extend_from_slice(s.as_bytes());
            pool.push(0);
        }
        table.extend(pool);
        self.text = table;
        self
    }

    /// Make the current offset the entry of the next subtype.
    #[must_use]
    pub fn entry(mut self) -> Self {
        let offset = self.offset();
        self.entries.push(offset);
        self
    }

    /// Append an explicit entry offset for the next subtype.
    #[must_use]
    pub fn entry_at(mut self, offset: u16) -> Self {
        self.entries.push(offset);
        self
    }

    /// Append an instruction using its shortest encoding.
    #[must_use]
    pub fn op(self, opcode: Opcode, parameter: u16) -> Self {
        self.instruction(Instruction::new(opcode, parameter))
    }

    /// Append a direct jump.
    #[must_use]
    pub fn jump(self, target: u16) -> Self {
        self.instruction(Instruction::jump(target))
    }

    /// Append an instruction as it is encoded.
    #[must_use]
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        instruction.encode_into(&mut self.words);
        self
    }

    /// Append raw words.
    #[must_use]
    pub fn raw(mut self, words: &[u16]) -> Self {
        self.words.extend_from_slice(words);
        self
    }

    /// Finish the program.
    #[must_use]
    pub fn build(self) -> Program {
        Program::new(self.text, self.entries, self.words)
    }

    /// Finish the program as the bytes of an `EMC2` file.
    #[must_use]
    pub fn bytes(self) -> Vec<u8> {
        self.build().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_track_offsets() {
        let program = ProgramBuilder::new()
            .entry()
            .op(Opcode::PUSH, 0x1234)
            .entry()
            .op(Opcode::RETURN, 0)
            .entry_at(0)
            .build();
        assert_eq!(program.entries, vec![0, 2, 0]);
        assert_eq!(program.instructions, vec![0x2300, 0x1234, 0x1200]);
    }

    #[test]
    fn bytes_load_back() {
        let builder = ProgramBuilder::new().text(&["A"]).entry().jump(0);
        let expected = builder.clone().build();
        assert_eq!(Program::from(&builder.bytes()).unwrap(), expected);
    }
}
