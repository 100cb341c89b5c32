//! Field layout inside a 64-bit record made of four 16-bit words.
//!
//! Bits are numbered from the most significant bit of the record (bit 0 is the MSB of word 0).
//! A field at `(pos, width)` is extracted from each word it touches with a mask and a shift;
//! OR-ing the realigned contributions yields the field value with its last bit at bit 0.

use crate::ast::{Bitstruct, Decl, FieldType};
use crate::error::{CompileError, Result};

pub const WORDS: usize = 4;
pub const WORD_BITS: u32 = 16;
pub const RECORD_BITS: u32 = WORD_BITS * WORDS as u32;

/// Widest field the target's 32-bit `<<` and `|` produce without sign or wrap-around.
pub const BITWISE_BITS: u32 = 31;
/// Widest field a target `number` holds exactly.
pub const EXACT_BITS: u32 = 53;

/// Per-word masks and shifts for one field. Negative shift means left shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldExtent {
    pub masks: [u16; WORDS],
    pub shifts: [i32; WORDS],
}

impl FieldExtent {
    /// Words contributing to the field, in order.
    pub fn words(&self) -> impl Iterator<Item = usize> + '_ {
        (0..WORDS).filter(move |&w| self.masks[w] != 0)
    }

    pub fn width(&self) -> u32 {
        self.masks.iter().map(|m| m.count_ones()).sum()
    }

    /// Apply the masks and shifts to a record. `None` if any contributing word is invalid.
    pub fn extract(&self, words: &[u16; WORDS], ok: &[bool; WORDS]) -> Option<u64> {
        let mut value = 0u64;
        for w in self.words() {
            if !ok[w] {
                return None;
            }
            let part = u64::from(words[w] & self.masks[w]);
            value |= match self.shifts[w] {
                s if s < 0 => part << -s,
                s => part >> s,
            };
        }
        Some(value)
    }
}

/// Compute masks and shifts for a field of `width` bits at bit offset `pos`.
///
/// Callers guarantee `width >= 1` and `pos + width <= 64`; [`BitstructLayout::new`] enforces it.
pub fn field_extent(pos: u32, width: u32) -> FieldExtent {
    debug_assert!(width >= 1 && pos + width <= RECORD_BITS);
    let first_word = (pos / WORD_BITS) as usize;
    let first_bit = pos % WORD_BITS;
    let last_word = ((pos + width - 1) / WORD_BITS) as usize;
    let last_bit = (pos + width - 1) % WORD_BITS;

    let mut masks = [0u16; WORDS];
    let mut shifts = [0i32; WORDS];

    // Right to left: the last word is taken partially, down to its least significant bit.
    masks[last_word] = (0x1_0000u32 - (1u32 << (15 - last_bit))) as u16;
    shifts[last_word] = (15 - last_bit) as i32;
    let mut shl = (last_bit + 1) as i32;
    for w in (first_word..last_word).rev() {
        masks[w] = 0xFFFF;
        shifts[w] = -shl;
        shl += WORD_BITS as i32;
    }
    // The first word is also partial: drop the bits before the field starts.
    masks[first_word] &= ((1u32 << (WORD_BITS - first_bit)) - 1) as u16;

    FieldExtent { masks, shifts }
}

/// A decl with its bit offset inside the record.
#[derive(Debug, Clone)]
pub struct PlacedField<'a> {
    pub decl: &'a Decl,
    pub pos: u32,
}

impl PlacedField<'_> {
    /// Extents of each element (one, or N for `byte<N>`).
    pub fn element_extents(&self) -> Vec<FieldExtent> {
        let ft = &self.decl.field_type;
        (0..ft.num())
            .map(|i| field_extent(self.pos + i * ft.elem_width(), ft.elem_width()))
            .collect()
    }
}

/// Cumulative placement of a bitstruct's decls, checked to fill exactly one record.
#[derive(Debug, Clone)]
pub struct BitstructLayout<'a> {
    pub name: &'a str,
    pub fields: Vec<PlacedField<'a>>,
}

impl<'a> BitstructLayout<'a> {
    pub fn new(bitstruct: &'a Bitstruct) -> Result<Self> {
        let layout_error = |reason: String| CompileError::Layout {
            bitstruct: bitstruct.name.clone(),
            reason,
        };
        let mut pos = 0u32;
        let mut fields = Vec::with_capacity(bitstruct.decls.len());
        for decl in &bitstruct.decls {
            let width = match &decl.field_type {
                FieldType::Unknown(raw) => {
                    return Err(layout_error(format!(
                        "field `{}` has unknown type `{}`",
                        decl.name, raw
                    )))
                }
                ft if ft.width() == 0 => {
                    return Err(layout_error(format!("field `{}` has zero width", decl.name)))
                }
                ft => ft.width(),
            };
            if pos.saturating_add(width) > RECORD_BITS {
                return Err(layout_error(format!(
                    "field `{}` ends at bit {}, past the {}-bit record",
                    decl.name,
                    pos.saturating_add(width),
                    RECORD_BITS
                )));
            }
            fields.push(PlacedField { decl, pos });
            pos += width;
        }
        if pos != RECORD_BITS {
            return Err(layout_error(format!(
                "inconsistent group length: {} bits instead of {}",
                pos, RECORD_BITS
            )));
        }
        Ok(BitstructLayout { name: &bitstruct.name, fields })
    }

    pub fn outputs(&self) -> impl Iterator<Item = &PlacedField<'a>> {
        self.fields.iter().filter(|f| f.decl.is_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_first_word() {
        let e = field_extent(0, 16);
        assert_eq!(e.masks, [0xFFFF, 0, 0, 0]);
        assert_eq!(e.shifts, [0, 0, 0, 0]);
    }

    #[test]
    fn partial_word_high_bits() {
        // group type: uint<5> at +16
        let e = field_extent(16, 5);
        assert_eq!(e.masks, [0, 0b1111100000000000, 0, 0]);
        assert_eq!(e.shifts[1], 11);
    }

    #[test]
    fn straddles_two_words() {
        // uint<6> at +29: three low bits of word 1, three high bits of word 2
        let e = field_extent(29, 6);
        assert_eq!(e.masks, [0, 0b111, 0b1110000000000000, 0]);
        assert_eq!(e.shifts, [0, -3, 13, 0]);
        assert_eq!(e.words().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn extract_poisoned_by_invalid_word() {
        let e = field_extent(29, 6);
        let words = [0, 0b101, 0b0110000000000000, 0];
        assert_eq!(e.extract(&words, &[true; 4]), Some(0b101011));
        assert_eq!(e.extract(&words, &[true, true, false, true]), None);
        // words the field does not touch do not matter
        assert_eq!(e.extract(&words, &[false, true, true, false]), Some(0b101011));
    }
}
