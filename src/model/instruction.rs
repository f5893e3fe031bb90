//! Method bodies of the input model.

use crate::model::{
    opcodes::OpCode,
    signature::{FieldRef, MethodRef, TypeName, TypeSig},
    token::Token,
};

/// A parameter operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterRef {
    /// The implicit `this` of an instance method
    This,
    /// Declared parameter, 0-based, not counting `this`
    Index(u16),
}

/// An instruction operand.
///
/// Symbol operands are structural; the encoder resolves them against the output tables.
/// Branch and switch targets are input byte offsets of the target instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// 8-bit immediate
    Int8(i8),
    /// 32-bit immediate
    Int32(i32),
    /// 64-bit immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// Local variable index
    Local(u16),
    /// Parameter
    Parameter(ParameterRef),
    /// String literal
    String(String),
    /// Method symbol
    Method(MethodRef),
    /// Field symbol
    Field(FieldRef),
    /// Type symbol
    Type(TypeSig),
    /// Unresolved metadata token of the source assembly, passed through unchanged
    Token(Token),
    /// Input offset of a branch target
    Branch(u32),
    /// Input offsets of the switch targets
    Switch(Vec<u32>),
}

impl Operand {
    /// Short name of the operand kind, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::None => "no operand",
            Operand::Int8(_) => "int8",
            Operand::Int32(_) => "int32",
            Operand::Int64(_) => "int64",
            Operand::Float32(_) => "float32",
            Operand::Float64(_) => "float64",
            Operand::Local(_) => "local variable",
            Operand::Parameter(_) => "parameter",
            Operand::String(_) => "string",
            Operand::Method(_) => "method",
            Operand::Field(_) => "field",
            Operand::Type(_) => "type",
            Operand::Token(_) => "token",
            Operand::Branch(_) => "branch target",
            Operand::Switch(_) => "switch table",
        }
    }
}

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset in the source body
    pub offset: u32,
    /// The opcode
    pub opcode: OpCode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            offset,
            opcode,
            operand,
        }
    }
}

/// The kind of an exception handling clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    /// Typed catch
    Catch(TypeName),
    /// Filter; the payload is the input offset of the filter block
    Filter(u32),
    /// Finally
    Finally,
    /// Fault
    Fault,
}

/// An exception handling clause, in input offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Clause kind
    pub kind: HandlerKind,
    /// First instruction of the protected block
    pub try_start: u32,
    /// End (exclusive) of the protected block
    pub try_end: u32,
    /// First instruction of the handler
    pub handler_start: u32,
    /// End (exclusive) of the handler
    pub handler_end: u32,
}

/// A method body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    /// Local variable types
    pub locals: Vec<TypeSig>,
    /// Instructions in source order
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Builds a body from `(opcode, operand)` pairs, assigning input offsets by each
    /// instruction's encoded source length.
    ///
    /// Useful to construct bodies by hand; branch operands must then use the offsets this
    /// produces.
    #[must_use]
    pub fn from_instructions(locals: Vec<TypeSig>, code: Vec<(OpCode, Operand)>) -> Self {
        let mut offset = 0u32;
        let instructions = code
            .into_iter()
            .map(|(opcode, operand)| {
                let instruction = Instruction::new(offset, opcode, operand);
                offset += source_len(&instruction);
                instruction
            })
            .collect();

        MethodBody {
            locals,
            instructions,
            exception_handlers: Vec::new(),
        }
    }

    /// Input offset just past the last instruction.
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.instructions
            .last()
            .map_or(0, |last| last.offset + source_len(last))
    }
}

/// Length of an instruction in the source encoding (ECMA-335 operand sizes).
fn source_len(instruction: &Instruction) -> u32 {
    use crate::model::opcodes::OperandType;

    let operand = match instruction.opcode.info().map(|info| info.operand) {
        Ok(OperandType::InlineNone) | Err(_) => 0,
        Ok(
            OperandType::ShortInlineVar
            | OperandType::ShortInlineArg
            | OperandType::ShortInlineI
            | OperandType::ShortInlineBrTarget,
        ) => 1,
        Ok(OperandType::InlineVar | OperandType::InlineArg) => 2,
        Ok(OperandType::InlineI8 | OperandType::InlineR) => 8,
        Ok(OperandType::InlineSwitch) => match &instruction.operand {
            Operand::Switch(targets) => 4 + 4 * targets.len() as u32,
            _ => 4,
        },
        Ok(_) => 4,
    };

    instruction.opcode.encoded_len() as u32 + operand
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_instructions_assigns_source_offsets() {
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDC_I4_S, Operand::Int8(5)),
                (OpCode::LDLOC, Operand::Local(0)),
                (OpCode::SWITCH, Operand::Switch(vec![0, 2])),
                (OpCode::RET, Operand::None),
            ],
        );

        let offsets: Vec<u32> = body.instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, [0, 2, 6, 19]);
        assert_eq!(body.code_size(), 20);
    }

    #[test]
    fn test_operand_kind() {
        assert_eq!(Operand::Branch(3).kind(), "branch target");
        assert_eq!(Operand::Token(Token::new(1)).kind(), "token");
    }
}
