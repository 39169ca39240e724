//! Bytecode emission from the syntax tree.
//!
//! [`InstructionEmitter::emit`] runs in two passes:
//!
//! 1. **Definitions**: every top-level definition is recorded as a
//!    [`DefinitionEntry`] and its parameters get unbound slots in the
//!    temporary register, so calls can be checked before the callee is
//!    emitted. Parameter names only resolve inside their own body.
//! 2. **Instructions**: each node is dispatched by kind. Words are staged in
//!    a local vector and only appended to the instruction buffer once the
//!    whole compilation succeeded.
//!
//! Values are addressed by [`MemoryOperand`]s handed out by the
//! [`RegisterAllocator`]. Literals used as operands are materialized into
//! anonymous slots whose register file entry holds the constant.

use crate::config::CompilerConfig;
use crate::virtual_machine::allocator::RegisterAllocator;
use crate::virtual_machine::ast::{CallNode, DefinitionNode, Expr, Node, OperatorKind, OperatorNode};
use crate::virtual_machine::errors::CompileError;
use crate::virtual_machine::isa::{Instr, Instruction};
use crate::virtual_machine::memory::RawPackedBuffer;
use crate::virtual_machine::operand::{MemoryOperand, RegisterClass, RegisterOperand, identifier_id};
use crate::virtual_machine::program::Program;
use crate::{debug, error};

/// Compile-time record of a top-level definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinitionEntry {
    pub identifier_id: u32,
    pub name: String,
    /// Number of statements in the body.
    pub body_length: usize,
    /// Parameter slots, in declaration order.
    pub argument_slots: Vec<MemoryOperand>,
}

impl DefinitionEntry {
    pub fn arity(&self) -> usize {
        self.argument_slots.len()
    }
}

pub struct InstructionEmitter {
    registers: RegisterAllocator,
    instructions: RawPackedBuffer<u32>,
    definitions: Vec<DefinitionEntry>,
    require_definitions: bool,
    /// Definition whose body is being emitted; its parameters shadow other bindings.
    scope: Option<usize>,
}

impl Default for InstructionEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionEmitter {
    pub fn new() -> Self {
        Self::with_config(&CompilerConfig::default())
    }

    pub fn with_config(config: &CompilerConfig) -> Self {
        Self {
            registers: RegisterAllocator::with_capacity(config.initial_capacity),
            instructions: RawPackedBuffer::new(config.initial_capacity),
            definitions: Vec::new(),
            require_definitions: config.require_definitions,
            scope: None,
        }
    }

    /// Words emitted by every successful `emit` so far.
    pub fn instructions(&self) -> &[u32] {
        self.instructions.as_slice()
    }

    pub fn definitions(&self) -> &[DefinitionEntry] {
        &self.definitions
    }

    pub fn definition(&self, identifier_id: u32) -> Option<&DefinitionEntry> {
        self.definitions
            .iter()
            .find(|entry| entry.identifier_id == identifier_id)
    }

    pub fn registers(&self) -> &RegisterAllocator {
        &self.registers
    }

    /// Releases the instruction buffer, keeping a copy of its words.
    pub fn into_program(self) -> Program {
        let instructions = self.instructions.as_slice().to_vec();
        self.instructions.dispose();
        Program {
            instructions,
            definitions: self.definitions,
        }
    }

    /// Compiles `nodes` and appends their bytecode to the instruction buffer.
    ///
    /// On failure nothing is appended and the definitions collected for
    /// `nodes` are discarded.
    pub fn emit(&mut self, nodes: &[Node]) -> Result<(), CompileError> {
        let known_definitions = self.definitions.len();
        match self.compile(nodes) {
            Ok(words) => {
                self.instructions.push_many(&words);
                debug!(
                    "Emitted {} words for {} nodes ({} definitions)",
                    words.len(),
                    nodes.len(),
                    self.definitions.len() - known_definitions
                );
                Ok(())
            }
            Err(err) => {
                self.definitions.truncate(known_definitions);
                self.scope = None;
                error!("Compilation failed: {err}");
                Err(err)
            }
        }
    }

    fn compile(&mut self, nodes: &[Node]) -> Result<Vec<u32>, CompileError> {
        self.collect_definitions(nodes)?;

        let mut out = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            let emitted = match node {
                Node::Definition(definition) => self.emit_definition(definition, &mut out),
                other => self.emit_statement(other, &mut out),
            };
            emitted.map_err(|reason| CompileError::InstructionNotCompleted {
                index,
                kind: node.kind().name(),
                reason: Box::new(reason),
            })?;
        }
        Ok(out)
    }

    // =========================
    // Definition pre-pass
    // =========================

    fn collect_definitions(&mut self, nodes: &[Node]) -> Result<(), CompileError> {
        for (index, node) in nodes.iter().enumerate() {
            let Node::Definition(definition) = node else {
                if self.require_definitions {
                    return Err(CompileError::ExpectedDefinition {
                        index,
                        kind: node.kind().name(),
                    });
                }
                continue;
            };

            let id = identifier_id(&definition.name);
            if self.definition(id).is_some() {
                return Err(CompileError::DuplicateDefinition {
                    name: definition.name.clone(),
                });
            }

            let argument_slots = definition
                .params
                .iter()
                .map(|param| -> Result<MemoryOperand, CompileError> {
                    let slot = self.registers.allocate_anonymous(RegisterClass::Temporary)?;
                    Ok(MemoryOperand {
                        identifier_id: identifier_id(param),
                        ..slot
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.definitions.push(DefinitionEntry {
                identifier_id: id,
                name: definition.name.clone(),
                body_length: definition.body.len(),
                argument_slots,
            });
        }
        Ok(())
    }

    // =========================
    // Statements
    // =========================

    fn emit_statement(&mut self, node: &Node, out: &mut Vec<u32>) -> Result<(), CompileError> {
        match node {
            Node::Assign { target, value } => self.emit_assign(target, value, out),
            Node::Print(value) => {
                let src = self.emit_expr(value, out)?;
                Instr::Print { src: src.operand() }.encode(out);
                Ok(())
            }
            Node::If {
                condition,
                body,
                otherwise,
            } => self.emit_conditional(condition, body, otherwise.as_deref(), out),
            Node::Operator(operator) => self.emit_operator(operator, out).map(|_| ()),
            Node::Call(call) => self.emit_call(call, out),
            Node::Definition(_) => Err(CompileError::UnexpectedNode {
                kind: node.kind().name(),
                context: "inside a block",
            }),
        }
    }

    fn emit_block(&mut self, nodes: &[Node], out: &mut Vec<u32>) -> Result<(), CompileError> {
        for node in nodes {
            self.emit_statement(node, out)?;
        }
        Ok(())
    }

    fn emit_assign(
        &mut self,
        target: &str,
        value: &Expr,
        out: &mut Vec<u32>,
    ) -> Result<(), CompileError> {
        match value {
            Expr::Literal(literal) => {
                let class = literal_class(*literal)?;
                let dst = self.bind_target(target, class)?;
                Instr::StoreImm {
                    dst: dst.operand(),
                    value: *literal,
                }
                .encode(out);
            }
            Expr::Identifier(name) => {
                let src = self.resolve(name)?;
                let class = if src.class.is_spill() {
                    RegisterClass::Wide
                } else {
                    src.class
                };
                let dst = self.bind_target(target, class)?;
                store(dst, src, out);
            }
            Expr::Operator(operator) => {
                let result = self.emit_operator(operator, out)?;
                let dst = self.bind_target(target, RegisterClass::Wide)?;
                store(dst, result, out);
            }
        }
        Ok(())
    }

    /// Returns the slot `target` is written to, rebinding it when the
    /// current binding is narrower than `class`.
    fn bind_target(
        &mut self,
        target: &str,
        class: RegisterClass,
    ) -> Result<MemoryOperand, CompileError> {
        let id = identifier_id(target);
        if let Some(existing) = self.lookup(id)
            && existing.class.bits() >= class.bits()
        {
            return Ok(existing);
        }
        self.registers.unbind(id);
        Ok(self.registers.allocate_in(class, id)?)
    }

    fn emit_conditional(
        &mut self,
        condition: &Expr,
        body: &[Node],
        otherwise: Option<&[Node]>,
        out: &mut Vec<u32>,
    ) -> Result<(), CompileError> {
        let cond = self.emit_expr(condition, out)?;

        let mut then_words = Vec::new();
        self.emit_block(body, &mut then_words)?;

        let else_words = match otherwise {
            Some(nodes) => {
                let mut words = Vec::new();
                self.emit_block(nodes, &mut words)?;
                Some(words)
            }
            None => None,
        };

        let mut skip = then_words.len();
        if else_words.is_some() {
            skip += Instruction::Jump.encoded_len();
        }
        Instr::JumpZero {
            cond: cond.operand(),
            skip: word_count("conditional branch", skip)?,
        }
        .encode(out);
        out.extend_from_slice(&then_words);

        if let Some(words) = else_words {
            Instr::Jump {
                skip: word_count("else branch", words.len())?,
            }
            .encode(out);
            out.extend_from_slice(&words);
        }
        Ok(())
    }

    fn emit_definition(
        &mut self,
        definition: &DefinitionNode,
        out: &mut Vec<u32>,
    ) -> Result<(), CompileError> {
        let id = identifier_id(&definition.name);
        let index = self
            .definitions
            .iter()
            .position(|entry| entry.identifier_id == id)
            .ok_or_else(|| CompileError::UndefinedDefinition {
                name: definition.name.clone(),
            })?;

        let mut body = Vec::new();
        let outer = self.scope.replace(index);
        let emitted = self.emit_block(&definition.body, &mut body);
        self.scope = outer;
        emitted?;
        Instr::Ret {}.encode(&mut body);

        Instr::Def {
            id,
            len: word_count("definition body", body.len())?,
        }
        .encode(out);
        out.extend_from_slice(&body);
        Ok(())
    }

    fn emit_call(&mut self, call: &CallNode, out: &mut Vec<u32>) -> Result<(), CompileError> {
        let id = identifier_id(&call.name);
        let entry = self
            .definition(id)
            .ok_or_else(|| CompileError::UndefinedDefinition {
                name: call.name.clone(),
            })?;
        if entry.arity() != call.args.len() {
            return Err(CompileError::ArityMismatch {
                name: call.name.clone(),
                expected: entry.arity(),
                actual: call.args.len(),
            });
        }
        let params = entry.argument_slots.clone();

        for (param, arg) in params.into_iter().zip(&call.args) {
            match arg {
                Expr::Literal(literal) => {
                    if literal.unsigned_abs() > param.class.max_magnitude() {
                        return Err(CompileError::ValueTooWide {
                            value: i64::from(*literal),
                        });
                    }
                    Instr::StoreImm {
                        dst: param.operand(),
                        value: *literal,
                    }
                    .encode(out);
                }
                Expr::Identifier(name) => {
                    let src = self.resolve(name)?;
                    store(param, src, out);
                }
                Expr::Operator(operator) => {
                    let result = self.emit_operator(operator, out)?;
                    store(param, result, out);
                }
            }
        }

        Instr::Call { id }.encode(out);
        Ok(())
    }

    // =========================
    // Expressions
    // =========================

    fn emit_expr(
        &mut self,
        expr: &Expr,
        out: &mut Vec<u32>,
    ) -> Result<MemoryOperand, CompileError> {
        match expr {
            Expr::Literal(literal) => self.materialize_literal(*literal, out),
            Expr::Identifier(name) => self.resolve(name),
            Expr::Operator(operator) => self.emit_operator(operator, out),
        }
    }

    /// Evaluates both children, then writes the result to a fresh temporary slot.
    fn emit_operator(
        &mut self,
        operator: &OperatorNode,
        out: &mut Vec<u32>,
    ) -> Result<MemoryOperand, CompileError> {
        let lhs = self.emit_expr(operator.left(), out)?;
        let rhs = self.emit_expr(operator.right(), out)?;
        let dst = self.registers.allocate_anonymous(RegisterClass::Temporary)?;
        binary(operator.kind, dst.operand(), lhs.operand(), rhs.operand()).encode(out);
        Ok(dst)
    }

    fn materialize_literal(
        &mut self,
        literal: i32,
        out: &mut Vec<u32>,
    ) -> Result<MemoryOperand, CompileError> {
        let class = literal_class(literal)?;
        let slot = self.registers.allocate_anonymous(class)?;
        self.registers.write(&slot, literal)?;
        Instr::StoreImm {
            dst: slot.operand(),
            value: literal,
        }
        .encode(out);
        Ok(slot)
    }

    fn resolve(&self, name: &str) -> Result<MemoryOperand, CompileError> {
        self.lookup(identifier_id(name))
            .ok_or_else(|| CompileError::UndefinedIdentifier { name: name.to_string() })
    }

    /// Parameters of the definition in scope win over every other binding.
    fn lookup(&self, id: u32) -> Option<MemoryOperand> {
        self.scope
            .and_then(|index| self.definitions.get(index))
            .and_then(|entry| {
                entry
                    .argument_slots
                    .iter()
                    .find(|slot| slot.identifier_id == id)
                    .copied()
            })
            .or_else(|| self.registers.lookup(id))
    }
}

fn literal_class(literal: i32) -> Result<RegisterClass, CompileError> {
    RegisterAllocator::choose_class_for_value(literal).ok_or(CompileError::ValueTooWide {
        value: i64::from(literal),
    })
}

fn store(dst: MemoryOperand, src: MemoryOperand, out: &mut Vec<u32>) {
    Instr::Store {
        dst: dst.operand(),
        src: src.operand(),
    }
    .encode(out);
}

fn binary(
    kind: OperatorKind,
    dst: RegisterOperand,
    lhs: RegisterOperand,
    rhs: RegisterOperand,
) -> Instr {
    match kind {
        OperatorKind::Add => Instr::Add { dst, lhs, rhs },
        OperatorKind::Sub => Instr::Sub { dst, lhs, rhs },
        OperatorKind::Mul => Instr::Mul { dst, lhs, rhs },
        OperatorKind::Div => Instr::Div { dst, lhs, rhs },
        OperatorKind::Equal => Instr::Eq { dst, lhs, rhs },
        OperatorKind::NotEqual => Instr::Ne { dst, lhs, rhs },
        OperatorKind::Less => Instr::Lt { dst, lhs, rhs },
        OperatorKind::Greater => Instr::Gt { dst, lhs, rhs },
    }
}

/// Jump and definition lengths are single operand words.
fn word_count(what: &'static str, len: usize) -> Result<u32, CompileError> {
    u32::try_from(len).map_err(|_| CompileError::LengthOverflow { what, words: len })
}
