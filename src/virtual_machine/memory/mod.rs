//! Packed storage backing the register allocator.
//!
//! - [`raw_buffer`]: growable native buffer with exact-fit growth
//! - [`register_file`]: bit-packed magnitude/sign register file for one class

pub mod raw_buffer;
pub mod register_file;

pub use raw_buffer::RawPackedBuffer;
pub use register_file::{BitPackedRegisterFile, WORD_BITS};

#[cfg(test)]
mod tests;
