//! Reference decoder: evaluates a bitstruct layout on a concrete record, with the same
//! masks, shifts and validity rules the generated code uses.

use crate::ast::FieldType;
use crate::layout::{BitstructLayout, WORDS};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// One 64-bit record: four words and their validity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub words: [u16; WORDS],
    pub ok: [bool; WORDS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Uint(u64),
    Bool(bool),
    /// `byte<N>` elements; an element over an invalid word is `None`.
    Bytes(Vec<Option<u8>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub name: String,
    /// `None` when a word the field depends on is invalid.
    pub value: Option<FieldValue>,
}

impl Record {
    pub fn new(words: [u16; WORDS]) -> Self {
        Record { words, ok: [true; WORDS] }
    }

    /// Read four big-endian words from the first 8 bytes.
    pub fn from_be_bytes(bytes: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut words = [0u16; WORDS];
        for w in words.iter_mut() {
            *w = cursor.read_u16::<BigEndian>()?;
        }
        Ok(Record::new(words))
    }

    pub fn with_invalid(mut self, word: usize) -> Self {
        if let Some(flag) = self.ok.get_mut(word) {
            *flag = false;
        }
        self
    }

    /// The record as one 64-bit value, word 0 in the high bits.
    pub fn as_u64(&self) -> u64 {
        self.words.iter().fold(0u64, |acc, &w| (acc << 16) | u64::from(w))
    }

    /// Decode every output field of `layout`.
    pub fn decode(&self, layout: &BitstructLayout) -> Vec<DecodedField> {
        layout
            .outputs()
            .map(|placed| {
                let extents = placed.element_extents();
                let value = match placed.decl.field_type {
                    FieldType::Byte(_) => Some(FieldValue::Bytes(
                        extents
                            .iter()
                            .map(|e| e.extract(&self.words, &self.ok).map(|v| v as u8))
                            .collect(),
                    )),
                    FieldType::Bool => extents[0]
                        .extract(&self.words, &self.ok)
                        .map(|v| FieldValue::Bool(v == 1)),
                    _ => extents[0].extract(&self.words, &self.ok).map(FieldValue::Uint),
                };
                DecodedField { name: placed.decl.name.clone(), value }
            })
            .collect()
    }
}
