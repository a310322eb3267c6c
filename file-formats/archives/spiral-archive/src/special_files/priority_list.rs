//! `Spiral-Priority-List` encoding
//!
//! The payload is a plain sequence of records running to the end of the
//! entry, each record being:
//!
//! ```text
//! name_len: u32 LE | name: [u8; name_len] (UTF-8) | priority: i32 LE
//! ```

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Decode a priority list payload into a name → priority map
///
/// Truncated records, invalid UTF-8 and duplicate names are rejected.
pub fn decode_priority_list(data: &[u8]) -> Result<HashMap<String, i32>> {
    let mut cursor = Cursor::new(data);
    let mut priorities = HashMap::new();

    while (cursor.position() as usize) < data.len() {
        let name_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::invalid_format("Truncated priority list record"))?
            as usize;

        let remaining = data.len() - cursor.position() as usize;
        if name_len > remaining {
            return Err(Error::invalid_format(format!(
                "Priority list name length {name_len} exceeds remaining {remaining} bytes"
            )));
        }

        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|_| Error::invalid_format("Priority list name is not valid UTF-8"))?;

        let priority = cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| Error::invalid_format(format!("Missing priority for {name}")))?;

        if priorities.insert(name.clone(), priority).is_some() {
            return Err(Error::invalid_format(format!(
                "Duplicate priority list entry: {name}"
            )));
        }
    }

    log::debug!("Decoded {} priority list records", priorities.len());
    Ok(priorities)
}

/// Encode a priority map, sorted by name so the payload is deterministic
pub fn encode_priority_list<'a, I>(priorities: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, i32)>,
{
    let mut records: Vec<(&str, i32)> = priorities.into_iter().collect();
    records.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut data = Vec::new();
    for (name, priority) in records {
        // Writes into a Vec cannot fail
        let _ = data.write_u32::<LittleEndian>(name.len() as u32);
        data.extend_from_slice(name.as_bytes());
        let _ = data.write_i32::<LittleEndian>(priority);
    }
    data
}
