//! Messages exchanged between workers.
//!
//! Every reduce or broadcast step moves one [Frame]: a record count header
//! followed by the serialized record array.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{FpError, Result};
use crate::item::{Item, ItemCount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Number of records in `body`.
    pub len: usize,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn encode_records<T: Serialize>(records: &[T]) -> Result<Self> {
        Ok(Frame {
            len: records.len(),
            body: serde_json::to_vec(records)?,
        })
    }

    pub fn decode_records<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let records: Vec<T> = serde_json::from_slice(&self.body)?;
        if records.len() != self.len {
            return Err(FpError::LengthMismatch {
                expected: self.len,
                actual: records.len(),
            });
        }
        Ok(records)
    }
}

/// Converts an arena or table index to its 32-bit wire form.
pub fn wire_index(idx: usize) -> Result<u32> {
    u32::try_from(idx)
        .map_err(|_| FpError::Structure(format!("index {} does not fit a wire record", idx)))
}

/// One support-map element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub key: Vec<u8>,
    pub key_length: u32,
    pub in_use: bool,
    pub value: u64,
}

impl ElementRecord {
    pub fn new(item: &Item, value: u64, max_key_len: usize) -> Result<Self> {
        if item.len() > max_key_len {
            return Err(FpError::KeyTooLong {
                len: item.len(),
                max: max_key_len,
            });
        }
        Ok(Self {
            key: item.as_bytes().to_vec(),
            key_length: item.len() as u32,
            in_use: true,
            value,
        })
    }

    /// Checks the record against its own length field and returns the element.
    pub fn into_item_count(self, max_key_len: usize) -> Result<Option<ItemCount>> {
        if !self.in_use {
            return Ok(None);
        }
        let len = self.key_length as usize;
        if len > max_key_len {
            return Err(FpError::KeyTooLong {
                len,
                max: max_key_len,
            });
        }
        if len != self.key.len() {
            return Err(FpError::Protocol(format!(
                "element key length {} does not match its {} key bytes",
                len,
                self.key.len()
            )));
        }
        Ok(Some(ItemCount {
            item: Item::from(self.key),
            count: self.value,
        }))
    }
}

/// The flattened form of a tree node. `parent` indexes the message itself,
/// where index 0 is the (never sent) root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub key: u32,
    pub value: i64,
    pub parent: u32,
}
