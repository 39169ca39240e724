//! Bit-packed register file.
//!
//! Values of one [`RegisterClass`] are packed into shared 64-bit words. The
//! magnitude of each value lives in one buffer and its sign flag in a second,
//! parallel buffer at the identical bit position, so decoding never deals
//! with two's complement.
//!
//! # Layout
//!
//! - Packed classes (`AH`, `AX`) hold `64 / class_bits` fields per word.
//! - The spill class (`TM`) holds one field per word.
//!
//! The word index and shift computed here are also what the executing
//! machine uses to decode operands, so they are effectively the wire format.

use super::raw_buffer::{DEFAULT_CAPACITY, RawPackedBuffer};
use crate::virtual_machine::errors::RegisterError;
use crate::virtual_machine::operand::{RegisterClass, SlotDescriptor};

/// Width of one storage word.
pub const WORD_BITS: u32 = u64::BITS;

/// Mask selecting the low `size` bits.
const fn field_mask(size: u32) -> u64 {
    if size >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}

/// `0` for non-negative values, `1` for negative ones.
const fn sign_flag(value: i32) -> u64 {
    (value < 0) as u64
}

#[derive(Debug)]
pub struct BitPackedRegisterFile {
    class: RegisterClass,
    class_bits: u32,
    magnitudes: RawPackedBuffer<u64>,
    signs: RawPackedBuffer<u64>,
    last_slot: SlotDescriptor,
    /// End of the furthest slot produced by `add`.
    allocated_end: u32,
}

impl BitPackedRegisterFile {
    pub fn new(class: RegisterClass) -> Self {
        Self::with_capacity(class, DEFAULT_CAPACITY)
    }

    /// Creates an empty file whose buffers start with room for `words` words.
    pub fn with_capacity(class: RegisterClass, words: usize) -> Self {
        Self {
            class,
            class_bits: class.bits(),
            magnitudes: RawPackedBuffer::new(words),
            signs: RawPackedBuffer::new(words),
            last_slot: SlotDescriptor::default(),
            allocated_end: 0,
        }
    }

    pub fn class(&self) -> RegisterClass {
        self.class
    }

    pub fn class_bits(&self) -> u32 {
        self.class_bits
    }

    /// Most recently added slot, `{0, 0}` before the first `add`.
    pub fn last_slot(&self) -> SlotDescriptor {
        self.last_slot
    }

    /// Number of words currently allocated in each buffer.
    pub fn word_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn magnitude_words(&self) -> &[u64] {
        self.magnitudes.as_slice()
    }

    pub fn sign_words(&self) -> &[u64] {
        self.signs.as_slice()
    }

    /// Bits of slot offset covered by one word.
    pub fn word_span(&self) -> u32 {
        if self.class.is_spill() {
            self.class_bits
        } else {
            (WORD_BITS / self.class_bits) * self.class_bits
        }
    }

    /// Stores `value` in a new slot, appending words as needed.
    pub fn add(&mut self, slot: SlotDescriptor, value: i32) -> Result<(), RegisterError> {
        self.validate(slot)?;
        let end = slot.checked_end().ok_or(RegisterError::SlotOutOfBounds {
            offset: slot.offset,
            size: slot.size,
        })?;
        let magnitude = Self::magnitude(slot, value)?;

        let span = u64::from(self.word_span());
        while u64::from(end) > self.magnitudes.len() as u64 * span {
            self.magnitudes.push(0);
            self.signs.push(0);
        }

        let index = self.word_index(slot);
        let shift = self.relative_shift(slot, index);
        let mask = field_mask(slot.size) << shift;

        let word = &mut self.magnitudes.as_mut_slice()[index];
        *word = (*word & !mask) | (magnitude << shift);
        let sign = &mut self.signs.as_mut_slice()[index];
        *sign = (*sign & !(1u64 << shift)) | (sign_flag(value) << shift);

        self.last_slot = slot;
        self.allocated_end = self.allocated_end.max(end);
        Ok(())
    }

    /// Replaces the value of an existing slot without touching its neighbors.
    ///
    /// The magnitude is updated by XOR-ing in only the differing bits; the
    /// single sign bit is overwritten.
    pub fn set(&mut self, slot: SlotDescriptor, value: i32) -> Result<(), RegisterError> {
        let (index, shift) = self.locate(slot)?;
        let magnitude = Self::magnitude(slot, value)?;

        let word = &mut self.magnitudes.as_mut_slice()[index];
        let current = (*word >> shift) & field_mask(slot.size);
        let diff = magnitude ^ current;
        *word ^= diff << shift;

        let sign = &mut self.signs.as_mut_slice()[index];
        *sign = (*sign & !(1u64 << shift)) | (sign_flag(value) << shift);
        Ok(())
    }

    /// Reads the signed value of an existing slot.
    pub fn get(&self, slot: SlotDescriptor) -> Result<i64, RegisterError> {
        let (index, shift) = self.locate(slot)?;
        let word = self.magnitudes.as_slice()[index];
        let magnitude = ((word >> shift) & field_mask(slot.size)) as i64;
        let sign = ((self.signs.as_slice()[index] >> shift) & 1) as i64;
        Ok(magnitude - 2 * magnitude * sign)
    }

    /// Index of the word holding `slot`.
    fn word_index(&self, slot: SlotDescriptor) -> usize {
        // first slot of the file
        if slot.offset == 0 {
            return 0;
        }
        if self.class.is_spill() {
            return (slot.offset / self.class_bits) as usize;
        }
        (slot.offset / self.word_span()) as usize
    }

    /// Bit shift of `slot` inside word `index`.
    fn relative_shift(&self, slot: SlotDescriptor, index: usize) -> u32 {
        if index == 0 {
            return slot.offset;
        }
        let span = self.word_span();
        // spill slots own their word; other slots may open a fresh one
        if self.class.is_spill() || slot.offset % span == 0 {
            return 0;
        }
        slot.offset - index as u32 * span
    }

    fn validate(&self, slot: SlotDescriptor) -> Result<(), RegisterError> {
        if slot.size != self.class_bits {
            return Err(RegisterError::SlotSizeMismatch {
                class_bits: self.class_bits,
                actual: slot.size,
            });
        }
        if slot.offset % self.class_bits != 0 {
            return Err(RegisterError::MisalignedSlot {
                offset: slot.offset,
                class_bits: self.class_bits,
            });
        }
        Ok(())
    }

    /// Resolves a previously added slot to `(word index, shift)`.
    fn locate(&self, slot: SlotDescriptor) -> Result<(usize, u32), RegisterError> {
        self.validate(slot)?;
        let index = self.word_index(slot);
        let allocated = slot
            .checked_end()
            .is_some_and(|end| end <= self.allocated_end);
        if !allocated || index >= self.magnitudes.len() {
            return Err(RegisterError::SlotNotAllocated {
                offset: slot.offset,
                size: slot.size,
            });
        }
        Ok((index, self.relative_shift(slot, index)))
    }

    fn magnitude(slot: SlotDescriptor, value: i32) -> Result<u64, RegisterError> {
        let magnitude = u64::from(value.unsigned_abs());
        if magnitude > field_mask(slot.size) {
            return Err(RegisterError::ValueOutOfRange {
                value: i64::from(value),
                bits: slot.size,
            });
        }
        Ok(magnitude)
    }
}
