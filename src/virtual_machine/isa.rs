//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction table and invokes a callback macro for code
//! generation, so the opcode enum, the typed IR and the table hash check all
//! come from the same definitions.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings and `TryFrom<u32>`
//! - The typed [`Instr`] IR with `encode`, `decode` and `Display`
//!
//! # Bytecode Format
//!
//! The stream is a sequence of `u32` words. An instruction is its opcode word
//! followed by a fixed run of operand words, with no length prefix:
//! - Slot: 3 words (register class code, size, offset)
//! - Imm: 1 word (`i32` bits)
//! - Id: 1 word (FNV-1a hash of an identifier)
//! - Len: 1 word (word count)

use crate::virtual_machine::errors::DecodeError;
use crate::virtual_machine::operand::read_word;
use std::fmt;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stores
            // =========================
            /// NOP ; does nothing
            Nop = 0x00, "NOP" => [],
            /// STORE_IMM dst, value ; dst = value
            StoreImm = 0x01, "STORE_IMM" => [dst: Slot, value: Imm],
            /// STORE dst, src ; dst = src
            Store = 0x02, "STORE" => [dst: Slot, src: Slot],
            // =========================
            // Integer arithmetic
            // =========================
            /// ADD dst, lhs, rhs ; dst = lhs + rhs
            Add = 0x10, "ADD" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// SUB dst, lhs, rhs ; dst = lhs - rhs
            Sub = 0x11, "SUB" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// MUL dst, lhs, rhs ; dst = lhs * rhs
            Mul = 0x12, "MUL" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// DIV dst, lhs, rhs ; dst = lhs / rhs (trap on division by zero)
            Div = 0x13, "DIV" => [dst: Slot, lhs: Slot, rhs: Slot],
            // =========================
            // Comparison
            // =========================
            /// EQ dst, lhs, rhs ; dst = (lhs == rhs)
            Eq = 0x20, "EQ" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// NE dst, lhs, rhs ; dst = (lhs != rhs)
            Ne = 0x21, "NE" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// LT dst, lhs, rhs ; dst = (lhs < rhs)
            Lt = 0x22, "LT" => [dst: Slot, lhs: Slot, rhs: Slot],
            /// GT dst, lhs, rhs ; dst = (lhs > rhs)
            Gt = 0x23, "GT" => [dst: Slot, lhs: Slot, rhs: Slot],
            // =========================
            // Control Flow
            // =========================
            /// JUMP_ZERO cond, skip ; if cond == 0 then skip the next `skip` words
            JumpZero = 0x30, "JUMP_ZERO" => [cond: Slot, skip: Len],
            /// JUMP skip ; skip the next `skip` words
            Jump = 0x31, "JUMP" => [skip: Len],
            // =========================
            // Output
            // =========================
            /// PRINT src ; writes src to the machine output
            Print = 0x40, "PRINT" => [src: Slot],
            // =========================
            // Definitions
            // =========================
            /// DEF id, len ; declares definition id whose body spans the next `len` words
            Def = 0x50, "DEF" => [id: Id, len: Len],
            /// RET ; returns from the current definition
            Ret = 0x51, "RET" => [],
            /// CALL id ; calls definition id
            Call = 0x52, "CALL" => [id: Id],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // Opcode enum
        // =========================
        #[repr(u32)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u32> for Instruction {
            type Error = DecodeError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(DecodeError::InvalidOpcode {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in table order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name ),* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the number of operand words following the opcode.
            pub const fn operand_words(&self) -> usize {
                match self {
                    $( Instruction::$name => 0 $( + $crate::define_instructions!(@words $kind) )*, )*
                }
            }

            /// Returns the total encoded size in words, opcode included.
            pub const fn encoded_len(&self) -> usize {
                1 + self.operand_words()
            }
        }

        // =========================
        // Typed IR
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instr {
            $(
                $(#[$doc])*
                $name { $( $field: $crate::define_instructions!(@ty $kind) ),* },
            )*
        }

        impl Instr {
            pub const fn opcode(&self) -> Instruction {
                match self {
                    $( Instr::$name { .. } => Instruction::$name, )*
                }
            }

            pub const fn encoded_len(&self) -> usize {
                self.opcode().encoded_len()
            }

            /// Appends the wire words of this instruction to `out`.
            pub fn encode(&self, out: &mut Vec<u32>) {
                match self {
                    $(
                        Instr::$name { $( $field ),* } => {
                            out.push(Instruction::$name as u32);
                            $( $crate::define_instructions!(@emit out, $kind, $field); )*
                        }
                    )*
                }
            }

            /// Decodes one instruction starting at `words[*cursor]`, advancing the cursor.
            pub fn decode(words: &[u32], cursor: &mut usize) -> Result<Self, DecodeError> {
                let start = *cursor;
                let word = read_word(words, cursor)?;
                let opcode = Instruction::try_from(word).map_err(|_| DecodeError::InvalidOpcode {
                    opcode: word,
                    offset: start,
                })?;
                Ok(match opcode {
                    $(
                        Instruction::$name => Instr::$name {
                            $( $field: $crate::define_instructions!(@read words, cursor, $kind) ),*
                        },
                    )*
                })
            }
        }

        impl fmt::Display for Instr {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(
                        Instr::$name { $( $field ),* } => {
                            write_instr(f, $mnemonic, &[ $( $field as &dyn fmt::Display ),* ])
                        }
                    )*
                }
            }
        }
    };

    // ---------- types ----------
    (@ty Slot) => { $crate::virtual_machine::operand::RegisterOperand };
    (@ty Imm)  => { i32 };
    (@ty Id)   => { u32 };
    (@ty Len)  => { u32 };

    // ---------- sizes ----------
    (@words Slot) => { $crate::virtual_machine::operand::RegisterOperand::WORDS };
    (@words Imm)  => { 1 };
    (@words Id)   => { 1 };
    (@words Len)  => { 1 };

    // ---------- encoding ----------
    (@emit $out:ident, Slot, $v:ident) => {
        $v.encode($out);
    };

    (@emit $out:ident, Imm, $v:ident) => {
        $out.push(*$v as u32);
    };

    (@emit $out:ident, Id, $v:ident) => {
        $out.push(*$v);
    };

    (@emit $out:ident, Len, $v:ident) => {
        $out.push(*$v);
    };

    // ---------- decoding ----------
    (@read $words:ident, $cursor:ident, Slot) => {
        $crate::virtual_machine::operand::RegisterOperand::decode($words, $cursor)?
    };

    (@read $words:ident, $cursor:ident, Imm) => {
        read_word($words, $cursor)? as i32
    };

    (@read $words:ident, $cursor:ident, Id) => {
        read_word($words, $cursor)?
    };

    (@read $words:ident, $cursor:ident, Len) => {
        read_word($words, $cursor)?
    };
}

fn write_instr(
    f: &mut fmt::Formatter<'_>,
    mnemonic: &str,
    operands: &[&dyn fmt::Display],
) -> fmt::Result {
    f.write_str(mnemonic)?;
    for (i, operand) in operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        write!(f, "{operand}")?;
    }
    Ok(())
}

for_each_instruction!(define_instructions);
