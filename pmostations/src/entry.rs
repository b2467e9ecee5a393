//! Station entry: one (station name, channel name) identity record

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::cmp::Ordering;
use std::io::{Read, Write};

/// Length marker of a null string in a station stream
const NULL_STRING: u32 = 0xFFFF_FFFF;

/// Upper bound for one encoded name, protects against corrupted lengths
const MAX_STRING_BYTES: u32 = 1 << 20;

/// A station received on a channel (frequency block)
///
/// Entries are immutable: changing a station means removing the old entry
/// and appending a new one.
///
/// Through serde an entry is a mapping with `station_name` and
/// `channel_name` fields, the form used for station presets written by
/// hand. The settings store uses the compact pair of [`StationEntry::to_record`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationEntry {
    station_name: String,
    channel_name: String,
}

impl StationEntry {
    pub fn new(station_name: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            station_name: station_name.into(),
            channel_name: channel_name.into(),
        }
    }

    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Exact, case-sensitive identity test
    pub fn matches(&self, station_name: &str, channel_name: &str) -> bool {
        self.station_name == station_name && self.channel_name == channel_name
    }

    /// Display order: station name then channel name, both ignoring case
    ///
    /// This is deliberately looser than [`StationEntry::matches`]: two
    /// entries differing only by case compare equal here but remain
    /// distinct identities.
    pub fn cmp_display(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.station_name, &other.station_name)
            .then_with(|| cmp_ignore_case(&self.channel_name, &other.channel_name))
    }

    /// `[station_name, channel_name]`
    pub fn to_pair(&self) -> [String; 2] {
        [self.station_name.clone(), self.channel_name.clone()]
    }

    /// Persisted form: a list of two strings
    pub fn to_record(&self) -> Value {
        Value::Sequence(vec![
            Value::String(self.station_name.clone()),
            Value::String(self.channel_name.clone()),
        ])
    }

    /// Decodes a persisted record
    ///
    /// `index` is the 1-based record number, used in the error.
    pub fn from_record(index: usize, value: &Value) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedRecord { index, reason };

        let items = match value {
            Value::Sequence(items) => items,
            other => {
                return Err(malformed(format!(
                    "expected a list of 2 strings, found {}",
                    kind_of(other)
                )))
            }
        };

        if items.len() != 2 {
            return Err(malformed(format!(
                "expected 2 fields, found {}",
                items.len()
            )));
        }

        let station_name = scalar_text(&items[0])
            .ok_or_else(|| malformed(format!("station name is {}", kind_of(&items[0]))))?;
        let channel_name = scalar_text(&items[1])
            .ok_or_else(|| malformed(format!("channel name is {}", kind_of(&items[1]))))?;

        Ok(Self::new(station_name, channel_name))
    }

    /// Writes the station name then the channel name to a stream
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_string(out, &self.station_name)?;
        write_string(out, &self.channel_name)?;
        Ok(())
    }

    /// Reads an entry written by [`StationEntry::write_to`]
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let station_name = read_string(input)?;
        let channel_name = read_string(input)?;
        Ok(Self::new(station_name, channel_name))
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Strings are encoded as a big-endian byte length followed by UTF-16BE
/// code units (Qt data stream layout)
fn write_string<W: Write>(out: &mut W, s: &str) -> Result<()> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let len = u32::try_from(units.len() * 2)
        .ok()
        .filter(|len| *len <= MAX_STRING_BYTES)
        .ok_or_else(|| Error::codec(format!("name too long ({} UTF-16 units)", units.len())))?;

    out.write_all(&len.to_be_bytes())?;
    let mut bytes = Vec::with_capacity(units.len() * 2);
    for unit in units {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    out.write_all(&bytes)?;
    Ok(())
}

fn read_string<R: Read>(input: &mut R) -> Result<String> {
    let mut len_bytes = [0u8; 4];
    input.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);

    if len == NULL_STRING {
        return Ok(String::new());
    }
    if len % 2 != 0 {
        return Err(Error::codec(format!("odd string length {}", len)));
    }
    if len > MAX_STRING_BYTES {
        return Err(Error::codec(format!("string length {} exceeds limit", len)));
    }

    let mut bytes = vec![0u8; len as usize];
    input.read_exact(&mut bytes)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| Error::codec(format!("invalid UTF-16: {}", e)))
}
