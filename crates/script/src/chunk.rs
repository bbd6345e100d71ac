use byteorder::{BigEndian, ByteOrder};

use crate::LoadError;

/// The container tag every program file starts with.
pub(crate) const FORM: [u8; 4] = *b"FORM";

/// The form type of a script program.
pub(crate) const EMC2: [u8; 4] = *b"EMC2";

/// A named chunk borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Chunk<'a> {
    /// The four-character chunk id.
    pub(crate) id: [u8; 4],
    /// The chunk body, without padding.
    pub(crate) data: &'a [u8],
}

/// A parsed `FORM` container.
///
/// The layout is the usual IFF one: `FORM`, a big-endian length covering everything after it, a
/// four-character form type, then chunks of `id`, big-endian length and body, each body padded
/// to an even length.
#[derive(Debug, Clone)]
pub(crate) struct Form<'a> {
    /// The form type, `EMC2` for programs.
    pub(crate) kind: [u8; 4],
    /// The chunks in file order.
    pub(crate) chunks: Vec<Chunk<'a>>,
}

fn tag(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl<'a> Form<'a> {
    /// Parse a `FORM` container.
    pub(crate) fn decode(input: &'a [u8]) -> Result<Self, LoadError> {
        if input.len() < 12 || input[0..4] != FORM {
            return Err(LoadError::NotAForm);
        }

        let size = BigEndian::read_u32(&input[4..8]) as usize;
        let body = input
            .get(8..8usize.saturating_add(size))
            .ok_or_else(|| LoadError::Truncated { chunk: tag(&FORM) })?;
        if body.len() < 4 {
            return Err(LoadError::Truncated { chunk: tag(&FORM) });
        }

        let mut kind = [0; 4];
        kind.copy_from_slice(&body[0..4]);

        let mut chunks = Vec::new();
        let mut rest = &body[4..];
        while !rest.is_empty() {
            if rest.len() < 8 {
                return Err(LoadError::Truncated { chunk: tag(rest) });
            }
            let mut id = [0; 4];
            id.copy_from_slice(&rest[0..4]);
            let len = BigEndian::read_u32(&rest[4..8]) as usize;
            let data = rest
                .get(8..8usize.saturating_add(len))
                .ok_or_else(|| LoadError::Truncated { chunk: tag(&id) })?;
            chunks.push(Chunk { id, data });

            // A trailing pad byte may be omitted after the last chunk.
            let padded = (8 + len + (len & 1)).min(rest.len());
            rest = &rest[padded..];
        }

        Ok(Self { kind, chunks })
    }

    /// Find the first chunk with the given id.
    pub(crate) fn find(&self, id: [u8; 4]) -> Option<&'a [u8]> {
        self.chunks.iter().find(|chunk| chunk.id == id).map(|chunk| chunk.data)
    }
}

/// Serialize chunks into a `FORM` container of the given type.
pub(crate) fn write_form(kind: [u8; 4], chunks: &[Chunk<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&kind);
    for chunk in chunks {
        body.extend_from_slice(&chunk.id);
        body.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
        body.extend_from_slice(chunk.data);
        if chunk.data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&FORM);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}
