use crate::virtual_machine::errors::DecodeError;
use std::fmt;

const FNV32_OFFSET: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x01000193;

/// Hashes an identifier name to the 32-bit id used in operands (FNV-1a).
pub fn identifier_id(name: &str) -> u32 {
    name.bytes().fold(FNV32_OFFSET, |h, b| {
        (h ^ b as u32).wrapping_mul(FNV32_PRIME)
    })
}

/// Fixed bit-width category of packed storage.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterClass {
    /// 8-bit register `AH`.
    Narrow = 1,
    /// 16-bit register `AX`.
    Wide = 2,
    /// 16-bit temporary/spill register `TM`; one value per word.
    Temporary = 3,
}

impl RegisterClass {
    pub const ALL: [RegisterClass; 3] = [
        RegisterClass::Narrow,
        RegisterClass::Wide,
        RegisterClass::Temporary,
    ];

    /// Width of one logical register of this class.
    pub const fn bits(self) -> u32 {
        match self {
            RegisterClass::Narrow => 8,
            RegisterClass::Wide => 16,
            RegisterClass::Temporary => 16,
        }
    }

    /// Code written as the first word of a slot operand.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Assembly name of the register.
    pub const fn name(self) -> &'static str {
        match self {
            RegisterClass::Narrow => "AH",
            RegisterClass::Wide => "AX",
            RegisterClass::Temporary => "TM",
        }
    }

    /// Spill classes never share a word between slots.
    pub const fn is_spill(self) -> bool {
        matches!(self, RegisterClass::Temporary)
    }

    /// Largest magnitude a slot of this class can hold.
    pub const fn max_magnitude(self) -> u32 {
        (1u32 << self.bits()) - 1
    }
}

impl TryFrom<u32> for RegisterClass {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RegisterClass::Narrow),
            2 => Ok(RegisterClass::Wide),
            3 => Ok(RegisterClass::Temporary),
            _ => Err(DecodeError::InvalidRegisterClass {
                code: value,
                offset: 0,
            }),
        }
    }
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Location of one value inside a register file.
///
/// `offset` is the cumulative bit position of the slot, `size` the width of
/// the register class that holds it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SlotDescriptor {
    pub offset: u32,
    pub size: u32,
}

impl SlotDescriptor {
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// Bit position right after this slot.
    ///
    /// Only meaningful for slots handed out by a register file; see
    /// [`checked_end`](Self::checked_end) for untrusted descriptors.
    pub const fn end(&self) -> u32 {
        self.offset + self.size
    }

    /// Like [`end`](Self::end), but `None` when the slot runs past `u32::MAX`.
    pub const fn checked_end(&self) -> Option<u32> {
        self.offset.checked_add(self.size)
    }
}

/// Slot operand as it appears on the wire: `(class code, size, offset)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegisterOperand {
    pub class: RegisterClass,
    pub slot: SlotDescriptor,
}

impl RegisterOperand {
    /// Number of words a slot operand occupies.
    pub const WORDS: usize = 3;

    pub const fn new(class: RegisterClass, slot: SlotDescriptor) -> Self {
        Self { class, slot }
    }

    pub fn encode(&self, out: &mut Vec<u32>) {
        out.extend_from_slice(&[self.class.code(), self.slot.size, self.slot.offset]);
    }

    /// Decodes a slot operand starting at `words[*cursor]`, advancing the cursor.
    pub fn decode(words: &[u32], cursor: &mut usize) -> Result<Self, DecodeError> {
        let start = *cursor;
        let code = read_word(words, cursor)?;
        let class = RegisterClass::try_from(code).map_err(|_| DecodeError::InvalidRegisterClass {
            code,
            offset: start,
        })?;
        let size = read_word(words, cursor)?;
        let offset = read_word(words, cursor)?;
        Ok(Self::new(class, SlotDescriptor::new(offset, size)))
    }
}

impl fmt::Display for RegisterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}@{}]", self.class, self.slot.size, self.slot.offset)
    }
}

/// Compiled address of a named (or anonymous, id `0`) value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryOperand {
    pub identifier_id: u32,
    pub class: RegisterClass,
    pub slot: SlotDescriptor,
}

impl MemoryOperand {
    /// The wire form of this address.
    pub const fn operand(&self) -> RegisterOperand {
        RegisterOperand::new(self.class, self.slot)
    }
}

/// Reads one word at `*cursor`, advancing it.
pub(crate) fn read_word(words: &[u32], cursor: &mut usize) -> Result<u32, DecodeError> {
    let word = words
        .get(*cursor)
        .copied()
        .ok_or(DecodeError::UnexpectedEndOfStream { offset: *cursor })?;
    *cursor += 1;
    Ok(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_id_is_fnv1a() {
        assert_eq!(identifier_id(""), 0x811c9dc5);
        assert_eq!(identifier_id("a"), 0xe40c292c);
        assert_ne!(identifier_id("x"), identifier_id("y"));
    }

    #[test]
    fn class_widths() {
        assert_eq!(RegisterClass::Narrow.bits(), 8);
        assert_eq!(RegisterClass::Wide.bits(), 16);
        assert_eq!(RegisterClass::Temporary.bits(), 16);
        assert_eq!(RegisterClass::Narrow.max_magnitude(), 255);
        assert_eq!(RegisterClass::Wide.max_magnitude(), 65535);
        assert!(RegisterClass::Temporary.is_spill());
        assert!(!RegisterClass::Wide.is_spill());
    }

    #[test]
    fn class_try_from_valid() {
        for class in RegisterClass::ALL {
            assert_eq!(RegisterClass::try_from(class.code()).unwrap(), class);
        }
    }

    #[test]
    fn class_try_from_invalid() {
        for code in [0u32, 4, 255, u32::MAX] {
            assert!(matches!(
                RegisterClass::try_from(code),
                Err(DecodeError::InvalidRegisterClass { code: c, .. }) if c == code
            ));
        }
    }

    #[test]
    fn register_operand_wire_layout() {
        let op = RegisterOperand::new(RegisterClass::Wide, SlotDescriptor::new(32, 16));
        let mut out = Vec::new();
        op.encode(&mut out);
        assert_eq!(out, vec![2, 16, 32]);

        let mut cursor = 0;
        assert_eq!(RegisterOperand::decode(&out, &mut cursor).unwrap(), op);
        assert_eq!(cursor, RegisterOperand::WORDS);
    }

    #[test]
    fn register_operand_decode_truncated() {
        let mut cursor = 0;
        assert_eq!(
            RegisterOperand::decode(&[1, 8], &mut cursor),
            Err(DecodeError::UnexpectedEndOfStream { offset: 2 })
        );
    }

    #[test]
    fn register_operand_decode_bad_class_reports_offset() {
        let mut cursor = 4;
        let words = [0, 0, 0, 0, 9, 8, 0];
        assert_eq!(
            RegisterOperand::decode(&words, &mut cursor),
            Err(DecodeError::InvalidRegisterClass { code: 9, offset: 4 })
        );
    }

    #[test]
    fn register_operand_display() {
        let op = RegisterOperand::new(RegisterClass::Narrow, SlotDescriptor::new(8, 8));
        assert_eq!(op.to_string(), "AH[8@8]");
    }
}
