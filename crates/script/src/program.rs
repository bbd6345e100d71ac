//! Programs that can be executed by the script engine.

use std::{fs::File, io::Read, path::Path};

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    chunk::{write_form, Chunk, Form, EMC2},
    decode, Instruction, LoadError, ScriptError,
};

const TEXT: [u8; 4] = *b"TEXT";
const ORDR: [u8; 4] = *b"ORDR";
const DATA: [u8; 4] = *b"DATA";

/// A program for one entity category.
///
/// Contains the text pool, the entry offset of every subtype and the instruction stream. A
/// program is immutable once loaded and is shared between all engines of its category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// The raw text pool. It starts with a table of big-endian word offsets into itself.
    pub text: Vec<u8>,
    /// The entry offset for each subtype, indexed by subtype.
    pub entries: Vec<u16>,
    /// The instruction words, in host order.
    pub instructions: Vec<u16>,
}

fn words(chunk: &'static str, bytes: &[u8]) -> Result<Vec<u16>, LoadError> {
    if bytes.len() % 2 != 0 {
        return Err(LoadError::OddLength { chunk, len: bytes.len() });
    }
    let mut out = vec![0; bytes.len() / 2];
    BigEndian::read_u16_into(bytes, &mut out);
    Ok(out)
}

impl Program {
    /// Create a new [Program].
    #[must_use]
    pub const fn new(text: Vec<u8>, entries: Vec<u16>, instructions: Vec<u16>) -> Self {
        Self { text, entries, instructions }
    }

    /// Load a program from the bytes of an `EMC2` form.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is malformed or any of the `TEXT`, `ORDR` and `DATA`
    /// chunks is missing.
    pub fn from(input: &[u8]) -> Result<Self, LoadError> {
        let form = Form::decode(input)?;
        if form.kind != EMC2 {
            return Err(LoadError::WrongFormType {
                found: String::from_utf8_lossy(&form.kind).into_owned(),
            });
        }

        let text = form.find(TEXT).ok_or(LoadError::MissingChunk("TEXT"))?;
        let order = form.find(ORDR).ok_or(LoadError::MissingChunk("ORDR"))?;
        let data = form.find(DATA).ok_or(LoadError::MissingChunk("DATA"))?;

        let program = Program {
            text: text.to_vec(),
            entries: words("ORDR", order)?,
            instructions: words("DATA", data)?,
        };
        debug!(
            text = program.text.len(),
            entries = program.entries.len(),
            instructions = program.instructions.len(),
            "loaded program"
        );
        Ok(program)
    }

    /// Load a program from a file path.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file cannot be opened or read, or if its
    /// contents are not a valid program.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Program::from(&bytes)
    }

    /// Serialize the program as an `EMC2` form, the inverse of [`Program::from`].
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let be = |words: &[u16]| words.iter().flat_map(|w| w.to_be_bytes()).collect::<Vec<u8>>();
        let order = be(&self.entries);
        let data = be(&self.instructions);
        write_form(
            EMC2,
            &[
                Chunk { id: TEXT, data: &self.text },
                Chunk { id: ORDR, data: &order },
                Chunk { id: DATA, data: &data },
            ],
        )
    }

    /// The entry offset for `subtype`.
    #[must_use]
    pub fn entry(&self, subtype: u16) -> Option<u16> {
        self.entries.get(subtype as usize).copied()
    }

    /// The `index`-th big-endian word of the text pool.
    #[must_use]
    pub fn text_word(&self, index: u16) -> Option<u16> {
        let start = index as usize * 2;
        self.text.get(start..start + 2).map(BigEndian::read_u16)
    }

    /// The string referenced by text word `index`, without its NUL terminator.
    #[must_use]
    pub fn text(&self, index: u16) -> Option<&[u8]> {
        let start = self.text_word(index)? as usize;
        let tail = self.text.get(start..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(&tail[..end])
    }

    /// Decode the instruction at `offset`, returning it with the offset that follows it.
    pub fn fetch(&self, offset: u16) -> Result<(Instruction, u16), ScriptError> {
        decode(&self.instructions, offset)
    }
}
