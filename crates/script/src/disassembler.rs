use std::fmt::{Display, Formatter, Result as FmtResult};

use hashbrown::HashMap;

use crate::{Instruction, Program};

/// A human-readable listing of a [`Program`].
///
/// Instructions are decoded linearly from offset 0. Every offset named by the order table is
/// preceded by an `entry N:` label for each subtype that starts there.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a>(pub &'a Program);

fn entry_labels(program: &Program) -> HashMap<u16, Vec<u16>> {
    let mut labels: HashMap<u16, Vec<u16>> = HashMap::new();
    for (subtype, &offset) in program.entries.iter().enumerate() {
        labels.entry(offset).or_default().push(subtype as u16);
    }
    labels
}

impl Display for Listing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let words = &self.0.instructions;
        let labels = entry_labels(self.0);

        let mut offset = 0usize;
        while offset < words.len() {
            if let Some(subtypes) = labels.get(&(offset as u16)) {
                for subtype in subtypes {
                    writeln!(f, "entry {subtype}:")?;
                }
            }

            let Some(instruction) = Instruction::from_words(&words[offset..]) else {
                writeln!(f, "  {offset:04x}: {:04x}      .word", words[offset])?;
                break;
            };
            let size = instruction.size() as usize;
            let raw = words[offset..offset + size]
                .iter()
                .map(|w| format!("{w:04x}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "  {offset:04x}: {raw:<9} {instruction:?}")?;
            offset += size;
        }

        Ok(())
    }
}

/// Disassemble a program into one line per label or instruction.
#[must_use]
pub fn disassemble(program: &Program) -> Vec<String> {
    Listing(program).to_string().lines().map(|line| line.trim_end().to_string()).collect()
}
