//! The assembled object file format: an ASCII header line followed by raw
//! bytes — `text:<T>,data:<D>,main:<M>\n`. `T` is the byte offset (after
//! the header) where the text segment begins, normally 0. `D` is the
//! offset where the data segment begins, i.e. where the text segment
//! ends. `M` is the byte offset of the entry label within the text
//! segment. No serialization crate is warranted for a format this small;
//! it is hand-written and hand-parsed, same as the original distilled
//! implementation.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub text_offset: u32,
    pub data_offset: u32,
    pub main_offset: u32,
}

impl ObjectHeader {
    /// Length in bytes of the text segment: `data_offset - text_offset`.
    pub fn text_len(&self) -> u32 {
        self.data_offset - self.text_offset
    }
}

#[derive(Debug, Clone)]
pub struct ObjectFile {
    pub header: ObjectHeader,
    pub text: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ObjectError {
    pub message: String,
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ObjectError {}

impl ObjectFile {
    /// Builds an object file from a text/data segment pair and an entry
    /// offset, filling in `text_offset`/`data_offset` from the segment
    /// lengths (`text_offset` is always 0: this assembler never emits a
    /// preamble before the text segment).
    pub fn new(text: Vec<u8>, data: Vec<u8>, main_offset: u32) -> ObjectFile {
        let header = ObjectHeader { text_offset: 0, data_offset: text.len() as u32, main_offset };
        ObjectFile { header, text, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("text:{},data:{},main:{}\n", self.header.text_offset, self.header.data_offset, self.header.main_offset).into_bytes();
        out.extend_from_slice(&self.text);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(raw: &[u8]) -> Result<ObjectFile, ObjectError> {
        let newline = raw.iter().position(|&b| b == b'\n').ok_or_else(|| ObjectError { message: "missing header line".into() })?;
        let header_line = std::str::from_utf8(&raw[..newline]).map_err(|_| ObjectError { message: "header is not valid UTF-8".into() })?;
        let header = parse_header(header_line)?;
        let body = &raw[newline + 1..];
        let text_offset = header.text_offset as usize;
        let data_offset = header.data_offset as usize;
        if data_offset < text_offset || body.len() < data_offset {
            return Err(ObjectError { message: "object file truncated".into() });
        }
        Ok(ObjectFile { header, text: body[text_offset..data_offset].to_vec(), data: body[data_offset..].to_vec() })
    }
}

fn parse_header(line: &str) -> Result<ObjectHeader, ObjectError> {
    let bad = || ObjectError { message: format!("invalid header: {line:?}") };
    let mut parts = line.split(',');
    let text = parts.next().ok_or_else(bad)?;
    let data = parts.next().ok_or_else(bad)?;
    let main = parts.next().ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    let text_offset = text.strip_prefix("text:").and_then(|s| s.parse::<u32>().ok()).ok_or_else(bad)?;
    let data_offset = data.strip_prefix("data:").and_then(|s| s.parse::<u32>().ok()).ok_or_else(bad)?;
    let main_offset = main.strip_prefix("main:").and_then(|s| s.parse::<u32>().ok()).ok_or_else(bad)?;
    Ok(ObjectHeader { text_offset, data_offset, main_offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let obj = ObjectFile::new(vec![1, 2, 3, 4], vec![5, 6], 0);
        let bytes = obj.to_bytes();
        let parsed = ObjectFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.header, obj.header);
        assert_eq!(parsed.text, obj.text);
        assert_eq!(parsed.data, obj.data);
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(ObjectFile::from_bytes(b"nonsense\n").is_err());
    }

    #[test]
    fn rejects_truncated_body() {
        assert!(ObjectFile::from_bytes(b"text:0,data:8,main:0\n\x01\x02").is_err());
    }

    #[test]
    fn matches_the_literal_add_instruction_header() {
        let obj = ObjectFile::new(vec![0x20, 0x80, 0x88, 0x00], vec![], 0);
        assert_eq!(obj.to_bytes(), b"text:0,data:4,main:0\n\x20\x80\x88\x00");
    }
}
