use regpack_derive::Error;

/// Misuse of the packed register file.
///
/// These indicate a bug in whoever produced the slot (normally the allocator),
/// never a problem with user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Slot size differs from the register class width.
    #[error("slot size {actual} does not match the {class_bits}-bit register class")]
    SlotSizeMismatch { class_bits: u32, actual: u32 },
    /// Slot offset is not a multiple of the register class width.
    #[error("slot offset {offset} is not aligned to {class_bits} bits")]
    MisalignedSlot { offset: u32, class_bits: u32 },
    /// Slot was never produced by `add` on this file.
    #[error("slot at offset {offset} (size {size}) was never added to this register file")]
    SlotNotAllocated { offset: u32, size: u32 },
    /// Slot extends past the addressable bit range.
    #[error("slot at offset {offset} (size {size}) runs past the addressable range")]
    SlotOutOfBounds { offset: u32, size: u32 },
    /// Magnitude does not fit in the slot width.
    #[error("value {value} does not fit in a {bits}-bit slot")]
    ValueOutOfRange { value: i64, bits: u32 },
    /// No register class is wide enough for the requested width.
    #[error("no register class holds {bits} bits")]
    UnsupportedWidth { bits: u32 },
}

/// Structural failures while emitting instructions.
///
/// Every variant is terminal for the compilation unit.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Register file or allocator misuse surfaced during emission.
    #[error("register error: {0}")]
    Register(#[from] RegisterError),
    /// Identifier used before any binding exists.
    #[error("undefined identifier: {name}")]
    UndefinedIdentifier { name: String },
    /// Call to a definition not collected by the pre-pass.
    #[error("undefined definition: {name}")]
    UndefinedDefinition { name: String },
    /// Two top-level definitions share a name.
    #[error("duplicate definition: {name}")]
    DuplicateDefinition { name: String },
    /// Wrong number of arguments at a call site.
    #[error("call to {name} expects {expected} arguments but got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    /// Literal is wider than the widest register class.
    #[error("value {value} does not fit any register class")]
    ValueTooWide { value: i64 },
    /// A top-level node is not a definition while definitions are required.
    #[error("top-level node {index} is {kind}, expected a definition")]
    ExpectedDefinition { index: usize, kind: &'static str },
    /// A node kind has no emission routine in this position.
    #[error("{kind} is not allowed {context}")]
    UnexpectedNode {
        kind: &'static str,
        context: &'static str,
    },
    /// A top-level node failed to emit; wraps the first failure, which is
    /// also reported as the error source.
    #[error("instruction {index} ({kind}) was not completed: {reason}")]
    InstructionNotCompleted {
        index: usize,
        kind: &'static str,
        #[source]
        reason: Box<CompileError>,
    },
    /// A jump or definition body is longer than one operand word can count.
    #[error("{what} spans {words} words, more than an operand word holds")]
    LengthOverflow { what: &'static str, words: usize },
}

impl CompileError {
    /// Returns the innermost error, unwrapping `InstructionNotCompleted`.
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::InstructionNotCompleted { reason, .. } => reason.root_cause(),
            other => other,
        }
    }
}

/// Failures while decoding an instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unknown opcode word.
    #[error("invalid opcode {opcode:#x} at word {offset}")]
    InvalidOpcode { opcode: u32, offset: usize },
    /// Unknown register class code in a slot operand.
    #[error("invalid register class code {code} at word {offset}")]
    InvalidRegisterClass { code: u32, offset: usize },
    /// Stream ended in the middle of an instruction.
    #[error("unexpected end of instruction stream at word {offset}")]
    UnexpectedEndOfStream { offset: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_uses_named_fields() {
        let err = CompileError::ArityMismatch {
            name: "f".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.to_string(), "call to f expects 1 arguments but got 2");
    }

    #[test]
    fn display_keeps_format_spec() {
        let err = DecodeError::InvalidOpcode {
            opcode: 0xff,
            offset: 3,
        };
        assert_eq!(err.to_string(), "invalid opcode 0xff at word 3");
    }

    #[test]
    fn from_register_error_sets_source() {
        let err: CompileError = RegisterError::UnsupportedWidth { bits: 32 }.into();
        assert!(matches!(
            err,
            CompileError::Register(RegisterError::UnsupportedWidth { bits: 32 })
        ));
        assert_eq!(err.to_string(), "register error: no register class holds 32 bits");
        assert!(err.source().is_some());
    }

    #[test]
    fn structural_errors_have_no_source() {
        let err = CompileError::UndefinedIdentifier { name: "x".into() };
        assert!(err.source().is_none());
    }

    #[test]
    fn root_cause_unwraps_nested_failures() {
        let err = CompileError::InstructionNotCompleted {
            index: 0,
            kind: "call",
            reason: Box::new(CompileError::UndefinedDefinition { name: "g".into() }),
        };
        assert!(matches!(
            err.root_cause(),
            CompileError::UndefinedDefinition { name } if name == "g"
        ));
        assert_eq!(
            err.to_string(),
            "instruction 0 (call) was not completed: undefined definition: g"
        );
    }

    #[test]
    fn wrapped_failure_is_the_source() {
        let err = CompileError::InstructionNotCompleted {
            index: 2,
            kind: "assign",
            reason: Box::new(CompileError::Register(RegisterError::UnsupportedWidth {
                bits: 20,
            })),
        };
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "register error: no register class holds 20 bits");
        let inner = source.source().unwrap();
        assert_eq!(inner.to_string(), "no register class holds 20 bits");
        assert!(inner.source().is_none());
    }
}
