//! Register packing toolchain library.
//!
//! Provides bit-packed register storage, register allocation and a bytecode
//! emitter for a small register machine.

pub mod config;
pub mod utils;
pub mod virtual_machine;
