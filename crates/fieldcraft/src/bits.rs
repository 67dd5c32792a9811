//! Bit-level cursors over wire buffers.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte.
//! A [`WireReader`] and a [`WireWriter`] are owned by exactly one decode or encode
//! call; consecutive bit fields share the partially filled byte through them.

use crate::errors::{ReadError, WriteError};

/// Reads a single bit at `bit_pos` (0 = MSB of first byte). Returns 0 or 1.
pub fn read_bit_at(data: &[u8], bit_pos: usize) -> Result<u8, ReadError> {
    if bit_pos >= data.len() * 8 {
        return Err(ReadError::TruncatedInput {
            needed: bit_pos / 8 + 1,
            available: data.len(),
        });
    }

    let byte_index = bit_pos / 8;
    let bit_index = bit_pos % 8;

    Ok((data[byte_index] >> (7 - bit_index)) & 1)
}

/// Reads `n` bits starting at `bit_pos` as an unsigned value (max 64 bits). MSB-first.
pub fn read_bits_at(data: &[u8], bit_pos: usize, n: usize) -> Result<u64, ReadError> {
    if n > 64 {
        return Err(ReadError::TooManyBitsRead);
    }

    let end = bit_pos + n;
    if end > data.len() * 8 {
        return Err(ReadError::TruncatedInput {
            needed: end.div_ceil(8),
            available: data.len(),
        });
    }

    let mut value = 0u64;
    for pos in bit_pos..end {
        value = (value << 1) | read_bit_at(data, pos)? as u64;
    }

    Ok(value)
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Host/network order swap of a 16 or 32 bit value (`ntohs`/`ntohl`); other widths pass through.
pub fn network_swap(value: u64, bits: usize) -> u64 {
    match bits {
        16 => u16::from_be(value as u16) as u64,
        32 => u32::from_be(value as u32) as u64,
        _ => value,
    }
}

/// Mask covering the low `bits` bits.
pub fn low_mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Partially filled byte carried between consecutive bit-field writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitCursor {
    /// Bits waiting in `accumulator`, always in `1..8` while a cursor exists.
    pub pending_bits: u8,
    /// The pending bits, right-aligned.
    pub accumulator: u8,
}

/// Sequential reader over a wire buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Bits already consumed from the current byte.
    pub fn carry_bits(&self) -> usize {
        self.bit_pos % 8
    }

    pub fn is_aligned(&self) -> bool {
        self.carry_bits() == 0
    }

    /// Bytes consumed so far, counting a partially consumed byte.
    pub fn position(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }

    /// Bits consumed so far.
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// True once every bit has been consumed.
    pub fn is_empty(&self) -> bool {
        self.bit_pos >= self.data.len() * 8
    }

    fn check_aligned(&self) -> Result<(), ReadError> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(ReadError::MisalignedRead {
                bit_offset: self.carry_bits(),
            })
        }
    }

    /// Reads `n` bits (max 64), continuing inside the current byte if a previous
    /// bit field stopped there.
    pub fn read_bits(&mut self, n: usize) -> Result<u64, ReadError> {
        let value = read_bits_at(self.data, self.bit_pos, n)?;
        self.bit_pos += n;
        Ok(value)
    }

    /// Everything not consumed yet. Fails in the middle of a byte.
    pub fn remaining(&self) -> Result<&'a [u8], ReadError> {
        self.check_aligned()?;
        Ok(&self.data[self.bit_pos / 8..])
    }

    /// Consumes exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        let rest = self.remaining()?;
        if n > rest.len() {
            return Err(ReadError::TruncatedInput {
                needed: n,
                available: rest.len(),
            });
        }
        self.bit_pos += n * 8;
        Ok(&rest[..n])
    }

    /// Consumes everything left.
    pub fn take_rest(&mut self) -> Result<&'a [u8], ReadError> {
        let rest = self.remaining()?;
        self.bit_pos = self.data.len() * 8;
        Ok(rest)
    }

    /// Returns the next `n` bytes without consuming them, if there are that many.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.remaining().ok().and_then(|rest| rest.get(..n))
    }

    /// Skips `n` bytes; the caller has already checked they exist.
    pub fn skip(&mut self, n: usize) {
        self.bit_pos = (self.bit_pos + n * 8).min(self.data.len() * 8);
    }
}

/// Sequential writer producing a wire buffer.
#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    bytes: Vec<u8>,
    carry: Option<BitCursor>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The in-progress partial byte, if any.
    pub fn carry(&self) -> Option<BitCursor> {
        self.carry
    }

    /// Complete bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.carry.is_none()
    }

    fn check_aligned(&self) -> Result<(), WriteError> {
        match self.carry {
            None => Ok(()),
            Some(cursor) => Err(WriteError::MisalignedWrite {
                pending_bits: cursor.pending_bits as usize,
            }),
        }
    }

    /// Shifts the low `width` bits of `value` in after any pending bits and
    /// flushes every completed byte.
    pub fn write_bits(&mut self, value: u64, width: usize) {
        let (mut pending, mut acc) = match self.carry.take() {
            Some(cursor) => (cursor.pending_bits as usize, cursor.accumulator as u128),
            None => (0, 0),
        };

        acc = (acc << width) | (value & low_mask(width)) as u128;
        pending += width;

        while pending >= 8 {
            pending -= 8;
            self.bytes.push((acc >> pending) as u8);
            acc &= (1u128 << pending) - 1;
        }

        if pending > 0 {
            self.carry = Some(BitCursor {
                pending_bits: pending as u8,
                accumulator: acc as u8,
            });
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.check_aligned()?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Direct access for packing helpers that append in place.
    pub fn aligned_buf(&mut self) -> Result<&mut Vec<u8>, WriteError> {
        self.check_aligned()?;
        Ok(&mut self.bytes)
    }

    /// Finishes the buffer. Pending bits at this point mean the schema's bit
    /// fields did not add up to whole bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, WriteError> {
        self.check_aligned()?;
        Ok(self.bytes)
    }
}
