//! RIFF/WAVE metadata rewriting
//!
//! A WAVE file is `RIFF <size> WAVE` followed by a flat sequence of chunks,
//! each `{id}{le32 size}{data}{pad to even}`. Only the `LIST`/`INFO` chunk is
//! understood here; every other chunk is carried through as opaque bytes.
//!
//! The document is never patched in place: [`rewrite_info`] drops any
//! existing `LIST`/`INFO` chunk, appends a freshly built one and recomputes the
//! top-level size.

pub mod rewriter;

pub use rewriter::write_info_tags;

use encoding_rs::Encoding;
use thiserror::Error;
use tracing::debug;

pub const RIFF_MAGIC: &[u8; 4] = b"RIFF";
pub const WAVE_MAGIC: &[u8; 4] = b"WAVE";
pub const LIST_ID: &[u8; 4] = b"LIST";
pub const INFO_ID: &[u8; 4] = b"INFO";

/// INFO sub-chunk ids for the fields we write
pub const INFO_TITLE: [u8; 4] = *b"INAM";
pub const INFO_ARTIST: [u8; 4] = *b"IART";
pub const INFO_ALBUM: [u8; 4] = *b"IPRD";
pub const INFO_TRACK: [u8; 4] = *b"ITRK";
pub const INFO_DISC: [u8; 4] = *b"IDIS";

const HEADER_SIZE: usize = 12; // RIFF + size + WAVE
const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum RiffError {
    #[error("Not a valid WAV file: {0}")]
    Format(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A top-level chunk kept verbatim, header and padding included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: [u8; 4],
    pub bytes: Vec<u8>,
    /// Declared size runs past the end of the file; always the last chunk
    pub truncated: bool,
}

/// One text field of a `LIST`/`INFO` chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoField {
    pub id: [u8; 4],
    pub text: String,
}

impl InfoField {
    pub fn new(id: [u8; 4], text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn check_header(data: &[u8]) -> Result<(), RiffError> {
    if data.len() < HEADER_SIZE {
        return Err(RiffError::Format(format!(
            "file is {} bytes, shorter than a RIFF header",
            data.len()
        )));
    }
    if &data[0..4] != RIFF_MAGIC {
        return Err(RiffError::Format("missing RIFF signature".to_string()));
    }
    if &data[8..12] != WAVE_MAGIC {
        return Err(RiffError::Format("missing WAVE signature".to_string()));
    }
    Ok(())
}

fn is_info_list(id: &[u8], data: &[u8]) -> bool {
    id == LIST_ID && data.len() >= 4 && &data[0..4] == INFO_ID
}

/// Walk every top-level chunk after the WAVE header, including `LIST`/`INFO`.
///
/// A chunk whose declared size runs past the end of the buffer swallows the
/// rest of the file as one opaque, truncated chunk. Trailing bytes too short
/// to hold a chunk header are dropped.
fn walk_chunks(data: &[u8]) -> Result<Vec<Chunk>, RiffError> {
    check_header(data)?;

    let mut chunks = Vec::new();
    let mut pos = HEADER_SIZE;

    while pos + CHUNK_HEADER_SIZE <= data.len() {

        let mut id = [0u8; 4];
        id.copy_from_slice(&data[pos..pos + 4]);
        let size = read_u32_le(data, pos + 4) as usize;
        let data_start = pos + CHUNK_HEADER_SIZE;
        let data_end = match data_start.checked_add(size) {
            Some(end) if end <= data.len() => end,
            _ => {
                chunks.push(Chunk {
                    id,
                    bytes: data[pos..].to_vec(),
                    truncated: true,
                });
                return Ok(chunks);
            }
        };

        let mut bytes = data[pos..data_end].to_vec();
        if size % 2 == 1 {
            // Keep the file's own pad byte, or supply one if the file ends early
            bytes.push(data.get(data_end).copied().unwrap_or(0));
        }
        pos = data_end + size % 2;
        chunks.push(Chunk {
            id,
            bytes,
            truncated: false,
        });
    }

    if pos < data.len() {
        debug!("Dropping {} trailing byte(s) after the last chunk", data.len() - pos);
    }
    Ok(chunks)
}

/// Parse a WAVE file into its top-level chunks, minus any `LIST`/`INFO` chunk
pub fn parse_chunks(data: &[u8]) -> Result<Vec<Chunk>, RiffError> {
    Ok(walk_chunks(data)?
        .into_iter()
        .filter(|chunk| {
            let body = chunk.bytes.get(CHUNK_HEADER_SIZE..).unwrap_or(&[]);
            !is_info_list(&chunk.id, body)
        })
        .collect())
}

fn encode_sub_chunk(field: &InfoField, encoding: &'static Encoding) -> Option<Vec<u8>> {
    if field.text.is_empty() {
        return None;
    }
    let (encoded, _, _) = encoding.encode(&field.text);
    let size = encoded.len() + 1; // NUL terminator

    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + size + 1);
    out.extend_from_slice(&field.id);
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out.extend_from_slice(&encoded);
    out.push(0);
    if size % 2 == 1 {
        out.push(0);
    }
    Some(out)
}

/// Build a complete `LIST`/`INFO` chunk, or `None` if no field has text
pub fn build_info_chunk(fields: &[InfoField], encoding: &'static Encoding) -> Option<Vec<u8>> {
    let mut body = INFO_ID.to_vec();
    for field in fields {
        if let Some(sub_chunk) = encode_sub_chunk(field, encoding) {
            body.extend_from_slice(&sub_chunk);
        }
    }
    if body.len() == INFO_ID.len() {
        return None;
    }

    let mut chunk = Vec::with_capacity(CHUNK_HEADER_SIZE + body.len() + 1);
    chunk.extend_from_slice(LIST_ID);
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&body);
    if body.len() % 2 == 1 {
        chunk.push(0);
    }
    Some(chunk)
}

/// Reassemble a WAVE file from kept chunks and an optional new INFO chunk.
///
/// The INFO chunk goes after every complete chunk but before a truncated
/// tail, so it always starts on a chunk boundary.
pub fn rebuild(chunks: &[Chunk], info_chunk: Option<&[u8]>) -> Vec<u8> {
    let (complete, truncated): (Vec<&Chunk>, Vec<&Chunk>) =
        chunks.iter().partition(|chunk| !chunk.truncated);

    let mut body = WAVE_MAGIC.to_vec();
    for chunk in complete {
        body.extend_from_slice(&chunk.bytes);
    }
    if let Some(info) = info_chunk {
        body.extend_from_slice(info);
    }
    for chunk in truncated {
        body.extend_from_slice(&chunk.bytes);
    }

    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + body.len());
    out.extend_from_slice(RIFF_MAGIC);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Replace the `LIST`/`INFO` metadata of an in-memory WAVE file
pub fn rewrite_info(
    data: &[u8],
    fields: &[InfoField],
    encoding: &'static Encoding,
) -> Result<Vec<u8>, RiffError> {
    let chunks = parse_chunks(data)?;
    let info_chunk = build_info_chunk(fields, encoding);
    Ok(rebuild(&chunks, info_chunk.as_deref()))
}

/// Read back the raw sub-chunks of the first `LIST`/`INFO` chunk.
///
/// Values are returned without their NUL terminator and padding.
pub fn read_info(data: &[u8]) -> Result<Vec<([u8; 4], Vec<u8>)>, RiffError> {
    let mut fields = Vec::new();

    let info = walk_chunks(data)?.into_iter().find(|chunk| {
        let body = chunk.bytes.get(CHUNK_HEADER_SIZE..).unwrap_or(&[]);
        is_info_list(&chunk.id, body)
    });
    let Some(info) = info else {
        return Ok(fields);
    };

    let declared = read_u32_le(&info.bytes, 4) as usize;
    let end = (CHUNK_HEADER_SIZE + declared).min(info.bytes.len());
    let mut pos = CHUNK_HEADER_SIZE + INFO_ID.len();
    while pos + CHUNK_HEADER_SIZE <= end {
        let mut id = [0u8; 4];
        id.copy_from_slice(&info.bytes[pos..pos + 4]);
        let size = read_u32_le(&info.bytes, pos + 4) as usize;
        let value_start = pos + CHUNK_HEADER_SIZE;
        let value_end = (value_start + size).min(end);
        let mut value = info.bytes[value_start..value_end].to_vec();
        while value.last() == Some(&0) {
            value.pop();
        }
        fields.push((id, value));
        pos = value_start + size + size % 2;
    }

    Ok(fields)
}

/// Declared top-level size of a RIFF buffer
pub fn declared_size(data: &[u8]) -> Option<u32> {
    (data.len() >= CHUNK_HEADER_SIZE && &data[0..4] == RIFF_MAGIC).then(|| read_u32_le(data, 4))
}
