//! Compiled program and its textual disassembly.

use crate::virtual_machine::emitter::DefinitionEntry;
use crate::virtual_machine::errors::DecodeError;
use crate::virtual_machine::isa::Instr;
use std::fmt::Write as _;

/// Instruction words plus the definition table produced alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<u32>,
    pub definitions: Vec<DefinitionEntry>,
}

impl Program {
    pub fn definition(&self, identifier_id: u32) -> Option<&DefinitionEntry> {
        self.definitions
            .iter()
            .find(|entry| entry.identifier_id == identifier_id)
    }

    /// Decodes the whole stream, pairing each instruction with its word offset.
    pub fn decode_with_offsets(&self) -> Result<Vec<(usize, Instr)>, DecodeError> {
        let words = self.instructions.as_slice();
        let mut cursor = 0;
        let mut decoded = Vec::new();
        while cursor < words.len() {
            let offset = cursor;
            decoded.push((offset, Instr::decode(words, &mut cursor)?));
        }
        Ok(decoded)
    }

    pub fn decode(&self) -> Result<Vec<Instr>, DecodeError> {
        Ok(self
            .decode_with_offsets()?
            .into_iter()
            .map(|(_, instr)| instr)
            .collect())
    }

    /// Renders one instruction per line, prefixed by its word offset.
    ///
    /// `DEF` and `CALL` lines are annotated with the definition name when the
    /// id is known.
    pub fn disassemble(&self) -> Result<String, DecodeError> {
        let mut out = String::new();
        for (offset, instr) in self.decode_with_offsets()? {
            let _ = write!(out, "{offset:4}: {instr}");
            if let Instr::Def { id, .. } | Instr::Call { id } = instr
                && let Some(entry) = self.definition(id)
            {
                let _ = write!(out, " ; {}", entry.name);
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::Instruction;
    use crate::virtual_machine::operand::{
        RegisterClass, RegisterOperand, SlotDescriptor, identifier_id,
    };

    fn ah(offset: u32) -> RegisterOperand {
        RegisterOperand::new(RegisterClass::Narrow, SlotDescriptor::new(offset, 8))
    }

    fn program(instrs: &[Instr]) -> Program {
        let mut instructions = Vec::new();
        for instr in instrs {
            instr.encode(&mut instructions);
        }
        Program {
            instructions,
            definitions: Vec::new(),
        }
    }

    #[test]
    fn decode_offsets_follow_encoded_lengths() {
        let program = program(&[
            Instr::StoreImm { dst: ah(0), value: 1 },
            Instr::Print { src: ah(0) },
            Instr::Nop {},
        ]);
        let offsets: Vec<usize> = program
            .decode_with_offsets()
            .unwrap()
            .into_iter()
            .map(|(offset, _)| offset)
            .collect();
        assert_eq!(offsets, vec![0, Instruction::StoreImm.encoded_len(), 9]);
    }

    #[test]
    fn decode_rejects_unknown_class() {
        let mut program = program(&[Instr::Print { src: ah(0) }]);
        program.instructions[1] = 7;
        assert_eq!(
            program.decode(),
            Err(DecodeError::InvalidRegisterClass { code: 7, offset: 1 })
        );
    }

    #[test]
    fn decode_rejects_truncated_stream() {
        let mut program = program(&[Instr::StoreImm { dst: ah(0), value: 1 }]);
        program.instructions.pop();
        assert_eq!(
            program.decode(),
            Err(DecodeError::UnexpectedEndOfStream { offset: 4 })
        );
    }

    #[test]
    fn disassemble_annotates_definitions() {
        let id = identifier_id("f");
        let mut program = program(&[
            Instr::Def { id, len: 1 },
            Instr::Ret {},
            Instr::Call { id },
        ]);
        program.definitions.push(DefinitionEntry {
            identifier_id: id,
            name: "f".into(),
            body_length: 0,
            argument_slots: Vec::new(),
        });

        let text = program.disassemble().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("   0: DEF {id}, 1 ; f"));
        assert_eq!(lines[1], "   3: RET");
        assert_eq!(lines[2], format!("   4: CALL {id} ; f"));
    }

    #[test]
    fn empty_program_disassembles_to_nothing() {
        assert_eq!(Program::default().disassemble().unwrap(), "");
    }
}
