//! Compiler back end for a small register machine.
//!
//! Values live bit-packed in three emulated register files and are addressed
//! by `(class, size, offset)` slot operands. The emitter lowers the syntax
//! tree to a flat stream of `u32` instruction words.
//!
//! # Register classes
//!
//! - **AH**: 8-bit, eight values per 64-bit word
//! - **AX**: 16-bit, four values per 64-bit word
//! - **TM**: 16-bit temporary/spill register, one value per word
//!
//! # Modules
//!
//! - [`allocator`]: Slot allocation and identifier bindings per register class
//! - [`ast`]: Syntax tree accepted by the emitter
//! - [`emitter`]: Syntax tree to bytecode lowering
//! - [`errors`]: Register, compile and decode error types
//! - [`isa`]: Instruction set definition and typed instruction IR
//! - [`memory`]: Raw packed buffers and bit-packed register files
//! - [`operand`]: Register classes, slots and operand encoding
//! - [`program`]: Compiled program, decoding and disassembly

pub mod allocator;
pub mod ast;
pub mod emitter;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod memory;
pub mod operand;
pub mod program;
