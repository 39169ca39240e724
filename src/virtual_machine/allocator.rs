//! Register allocation on top of the packed register files.
//!
//! Every [`RegisterClass`] owns one [`Register`]: a [`BitPackedRegisterFile`]
//! plus the identifier bindings living in it. Slots are handed out
//! sequentially, so offsets only ever grow.

use crate::virtual_machine::errors::RegisterError;
use crate::virtual_machine::memory::BitPackedRegisterFile;
use crate::virtual_machine::memory::raw_buffer::DEFAULT_CAPACITY;
use crate::virtual_machine::operand::{MemoryOperand, RegisterClass, SlotDescriptor};
use std::collections::HashMap;

/// Identifier id used for values that are never bound to a name.
pub const ANONYMOUS_ID: u32 = 0;

/// One register file and the identifiers bound into it.
#[derive(Debug)]
pub struct Register {
    file: BitPackedRegisterFile,
    bindings: HashMap<u32, SlotDescriptor>,
}

impl Register {
    pub fn new(class: RegisterClass) -> Self {
        Self::with_capacity(class, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(class: RegisterClass, words: usize) -> Self {
        Self {
            file: BitPackedRegisterFile::with_capacity(class, words),
            bindings: HashMap::new(),
        }
    }

    pub fn class(&self) -> RegisterClass {
        self.file.class()
    }

    pub fn file(&self) -> &BitPackedRegisterFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut BitPackedRegisterFile {
        &mut self.file
    }

    /// Slot the next allocation will receive.
    pub fn next_slot(&self) -> SlotDescriptor {
        let last = self.file.last_slot();
        SlotDescriptor::new(last.end(), self.file.class_bits())
    }

    /// Allocates a zeroed slot and binds `identifier_id` to it.
    ///
    /// An identifier that is already bound here is moved to the new slot.
    pub fn allocate(&mut self, identifier_id: u32) -> Result<MemoryOperand, RegisterError> {
        let operand = self.allocate_anonymous()?;
        self.bindings.insert(identifier_id, operand.slot);
        Ok(MemoryOperand {
            identifier_id,
            ..operand
        })
    }

    /// Allocates a zeroed slot without binding it.
    pub fn allocate_anonymous(&mut self) -> Result<MemoryOperand, RegisterError> {
        let slot = self.next_slot();
        self.file.add(slot, 0)?;
        Ok(MemoryOperand {
            identifier_id: ANONYMOUS_ID,
            class: self.class(),
            slot,
        })
    }

    pub fn lookup(&self, identifier_id: u32) -> Option<MemoryOperand> {
        self.bindings
            .get(&identifier_id)
            .map(|&slot| MemoryOperand {
                identifier_id,
                class: self.class(),
                slot,
            })
    }

    /// Drops the binding. The slot itself stays allocated.
    pub fn unbind(&mut self, identifier_id: u32) -> Option<SlotDescriptor> {
        self.bindings.remove(&identifier_id)
    }

    /// Number of bound identifiers.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

/// Owns the narrow, wide and temporary registers.
#[derive(Debug)]
pub struct RegisterAllocator {
    narrow: Register,
    wide: Register,
    temporary: Register,
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an allocator whose register files start with `words` words of capacity.
    pub fn with_capacity(words: usize) -> Self {
        Self {
            narrow: Register::with_capacity(RegisterClass::Narrow, words),
            wide: Register::with_capacity(RegisterClass::Wide, words),
            temporary: Register::with_capacity(RegisterClass::Temporary, words),
        }
    }

    pub fn register(&self, class: RegisterClass) -> &Register {
        match class {
            RegisterClass::Narrow => &self.narrow,
            RegisterClass::Wide => &self.wide,
            RegisterClass::Temporary => &self.temporary,
        }
    }

    pub fn register_mut(&mut self, class: RegisterClass) -> &mut Register {
        match class {
            RegisterClass::Narrow => &mut self.narrow,
            RegisterClass::Wide => &mut self.wide,
            RegisterClass::Temporary => &mut self.temporary,
        }
    }

    /// Narrowest non-temporary class holding `bits` bits.
    pub fn class_for_width(bits: u32) -> Option<RegisterClass> {
        [RegisterClass::Narrow, RegisterClass::Wide]
            .into_iter()
            .find(|class| bits <= class.bits())
    }

    /// Class a literal is stored in, `None` if it needs more than 16 bits.
    pub fn choose_class_for_value(value: i32) -> Option<RegisterClass> {
        let needed = u32::BITS - value.unsigned_abs().leading_zeros();
        Self::class_for_width(needed)
    }

    /// Allocates `identifier_id` in the narrowest class holding `bit_width` bits.
    pub fn allocate(
        &mut self,
        identifier_id: u32,
        bit_width: u32,
    ) -> Result<MemoryOperand, RegisterError> {
        let class = Self::class_for_width(bit_width)
            .ok_or(RegisterError::UnsupportedWidth { bits: bit_width })?;
        self.allocate_in(class, identifier_id)
    }

    pub fn allocate_in(
        &mut self,
        class: RegisterClass,
        identifier_id: u32,
    ) -> Result<MemoryOperand, RegisterError> {
        self.register_mut(class).allocate(identifier_id)
    }

    pub fn allocate_temporary(
        &mut self,
        identifier_id: u32,
    ) -> Result<MemoryOperand, RegisterError> {
        self.temporary.allocate(identifier_id)
    }

    pub fn allocate_anonymous(
        &mut self,
        class: RegisterClass,
    ) -> Result<MemoryOperand, RegisterError> {
        self.register_mut(class).allocate_anonymous()
    }

    /// Finds the binding of `identifier_id`, searching narrow, wide, then temporary.
    pub fn lookup(&self, identifier_id: u32) -> Option<MemoryOperand> {
        RegisterClass::ALL
            .into_iter()
            .find_map(|class| self.register(class).lookup(identifier_id))
    }

    /// Removes every binding of `identifier_id`.
    pub fn unbind(&mut self, identifier_id: u32) {
        for class in RegisterClass::ALL {
            self.register_mut(class).unbind(identifier_id);
        }
    }

    /// Reads the current value behind `operand`.
    pub fn read(&self, operand: &MemoryOperand) -> Result<i64, RegisterError> {
        self.register(operand.class).file().get(operand.slot)
    }

    /// Overwrites the value behind `operand`.
    pub fn write(&mut self, operand: &MemoryOperand, value: i32) -> Result<(), RegisterError> {
        self.register_mut(operand.class).file_mut().set(operand.slot, value)
    }
}
