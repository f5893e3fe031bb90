//! Method body encoding.
//!
//! Bodies are re-encoded in two passes. The layout pass computes the output size of every
//! instruction from its opcode and operand kind, which fixes the output offset of every
//! instruction before any operand is written. The emit pass then writes opcodes and operands in
//! source order, resolving symbols against the output tables and branch targets against the
//! output offsets.
//!
//! # Operand Encodings
//!
//! | Operand type | Output |
//! |--------------|--------|
//! | `ShortInlineVar` / `ShortInlineArg` | `u8` slot |
//! | `InlineVar` / `InlineArg` | `u16` slot |
//! | `ShortInlineI` / `InlineI` / `InlineI8` | immediate, `i8` / `i32` / `i64` |
//! | `ShortInlineR` / `InlineR` | immediate, `f32` / `f64` |
//! | `InlineString` | `u16` string ID |
//! | `InlineMethod` / `InlineField` | `u16` handle, references tagged with `0x8000` |
//! | `InlineType` / `InlineTok` | `u16` tagged type operand |
//! | `ShortInlineBrTarget` / `InlineBrTarget` | `i8` / `i32` relative to the next instruction |
//! | `InlineSwitch` | `u16` count, `i32` displacements relative to the end of the table |
//!
//! Parameter slots count `this` as slot 0 in instance methods, so declared parameters shift by
//! one there. A raw [`Operand::Token`] on a field, type or token operand is written through as
//! the original 4-byte token.
//!
//! # Exception Handlers
//!
//! Bodies with exception handlers are followed by one 12-byte record per handler and a final
//! `u8` count. Each record holds the handler mode, the caught class (or the filter offset), and
//! the try and handler ranges, all as `u16` method-relative output offsets.

use std::collections::HashMap;

use crate::{
    codegen::stack::max_stack,
    file::io::{push, ByteOrder},
    model::{
        HandlerKind, Instruction, MethodBody, MethodDefinition, OpCode, Operand, OperandType,
        ParameterRef,
    },
    tables::{symbols::SymbolTables, NONE},
    utils::math::{to_u16, to_u8},
    Error, Result,
};

/// Handler mode of a typed catch clause.
pub const HANDLER_CATCH: u16 = 0;
/// Handler mode of a catch clause for `System.Object`.
pub const HANDLER_CATCH_ALL: u16 = 1;
/// Handler mode of a finally clause.
pub const HANDLER_FINALLY: u16 = 2;
/// Handler mode of a filter clause.
pub const HANDLER_FILTER: u16 = 3;

/// Size of one exception handler record.
pub const HANDLER_RECORD_SIZE: usize = 12;

/// A fully encoded method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Code followed by the exception handler section
    pub bytes: Vec<u8>,
    /// Length of the code alone
    pub code_len: u32,
    /// Maximum evaluation stack depth
    pub max_stack: u8,
    /// `(input offset, output offset)` of every instruction, in order
    pub offsets: Vec<(u32, u32)>,
}

/// Encodes the body of `method`.
///
/// # Errors
///
/// - [`Error::OperandMismatch`] if an operand does not fit its opcode
/// - [`Error::Unsupported`] for stand-alone signatures, member tokens and fault handlers
/// - [`Error::InconsistentModel`] for unresolvable symbols and branch targets
/// - [`Error::CapacityOverflow`] if a slot, displacement or offset exceeds its field
pub fn encode_body(
    symbols: &mut SymbolTables<'_>,
    method: &MethodDefinition,
    body: &MethodBody,
) -> Result<EncodedBody> {
    let layout = Layout::compute(body)?;
    let mut writer = CodeWriter {
        order: symbols.order,
        has_this: method.signature.has_this,
        code: Vec::with_capacity(layout.code_len as usize),
    };

    for (instruction, &position) in body.instructions.iter().zip(&layout.positions) {
        writer.emit(symbols, &layout, instruction, position)?;
    }

    let code_len = u32::try_from(writer.code.len())
        .map_err(|_| malformed_error!("Encoded body exceeds 4 GiB"))?;
    if code_len != layout.code_len {
        return Err(malformed_error!(
            "Encoded {} bytes, layout planned {}",
            code_len,
            layout.code_len
        ));
    }

    if !body.exception_handlers.is_empty() {
        writer.emit_handlers(symbols, &layout, body)?;
    }

    let offsets = body
        .instructions
        .iter()
        .map(|instruction| instruction.offset)
        .zip(layout.positions.iter().copied())
        .collect();

    Ok(EncodedBody {
        bytes: writer.code,
        code_len,
        max_stack: max_stack(body, &method.signature)?,
        offsets,
    })
}

struct Layout {
    positions: Vec<u32>,
    targets: HashMap<u32, u32>,
    code_len: u32,
}

impl Layout {
    fn compute(body: &MethodBody) -> Result<Self> {
        let mut positions = Vec::with_capacity(body.instructions.len());
        let mut targets = HashMap::with_capacity(body.instructions.len() + 1);
        let mut position: u32 = 0;

        for instruction in &body.instructions {
            let info = instruction.opcode.info()?;
            let size = instruction.opcode.encoded_len()
                + operand_size(instruction.opcode, info.operand, &instruction.operand)?;

            positions.push(position);
            targets.insert(instruction.offset, position);
            position = position
                .checked_add(size as u32)
                .ok_or_else(|| malformed_error!("Body size overflow"))?;
        }
        targets.entry(body.code_size()).or_insert(position);

        Ok(Layout {
            positions,
            targets,
            code_len: position,
        })
    }

    fn resolve(&self, input: u32) -> Result<u32> {
        self.targets.get(&input).copied().ok_or_else(|| {
            inconsistent_error!("offset 0x{:04X} is not an instruction boundary", input)
        })
    }
}

fn operand_size(opcode: OpCode, expected: OperandType, operand: &Operand) -> Result<usize> {
    use OperandType as T;

    let size = match (expected, operand) {
        (T::InlineNone, Operand::None) => 0,
        (T::ShortInlineVar, Operand::Local(_))
        | (T::ShortInlineArg, Operand::Parameter(_))
        | (T::ShortInlineI, Operand::Int8(_))
        | (T::ShortInlineBrTarget, Operand::Branch(_)) => 1,
        (T::InlineVar, Operand::Local(_))
        | (T::InlineArg, Operand::Parameter(_))
        | (T::InlineString, Operand::String(_))
        | (T::InlineMethod, Operand::Method(_))
        | (T::InlineField, Operand::Field(_))
        | (T::InlineType | T::InlineTok, Operand::Type(_)) => 2,
        (T::InlineI, Operand::Int32(_))
        | (T::ShortInlineR, Operand::Float32(_))
        | (T::InlineBrTarget, Operand::Branch(_))
        | (T::InlineField | T::InlineType | T::InlineTok, Operand::Token(_)) => 4,
        (T::InlineI8, Operand::Int64(_)) | (T::InlineR, Operand::Float64(_)) => 8,
        (T::InlineSwitch, Operand::Switch(targets)) => 2 + 4 * targets.len(),
        (T::InlineTok, Operand::Method(_) | Operand::Field(_)) => {
            return Err(unsupported_error!("{} with a member operand", opcode));
        }
        (T::InlineSig, _) => {
            return Err(unsupported_error!("{} with a stand-alone signature", opcode));
        }
        _ => {
            return Err(Error::OperandMismatch {
                opcode: opcode.name(),
                expected: expected.name(),
                found: operand.kind(),
            })
        }
    };
    Ok(size)
}

struct CodeWriter {
    order: ByteOrder,
    has_this: bool,
    code: Vec<u8>,
}

impl CodeWriter {
    fn emit(
        &mut self,
        symbols: &mut SymbolTables<'_>,
        layout: &Layout,
        instruction: &Instruction,
        position: u32,
    ) -> Result<()> {
        let opcode = instruction.opcode;
        let expected = opcode.info()?.operand;
        let size = opcode.encoded_len() + operand_size(opcode, expected, &instruction.operand)?;
        let next = i64::from(position) + size as i64;

        opcode.encode_into(&mut self.code);

        match (&instruction.operand, expected) {
            (Operand::None, _) => {}
            (Operand::Local(slot), OperandType::ShortInlineVar) => {
                self.code.push(to_u8(usize::from(*slot), "short local slot")?);
            }
            (Operand::Local(slot), _) => push(&mut self.code, *slot, self.order),
            (Operand::Parameter(parameter), OperandType::ShortInlineArg) => {
                let slot = self.argument_slot(*parameter)?;
                self.code.push(to_u8(usize::from(slot), "short argument slot")?);
            }
            (Operand::Parameter(parameter), _) => {
                let slot = self.argument_slot(*parameter)?;
                push(&mut self.code, slot, self.order);
            }
            (Operand::Int8(value), _) => push(&mut self.code, *value, self.order),
            (Operand::Int32(value), _) => push(&mut self.code, *value, self.order),
            (Operand::Int64(value), _) => push(&mut self.code, *value, self.order),
            (Operand::Float32(value), _) => push(&mut self.code, *value, self.order),
            (Operand::Float64(value), _) => push(&mut self.code, *value, self.order),
            (Operand::String(value), _) => {
                let id = symbols.string(value)?;
                push(&mut self.code, id, self.order);
            }
            (Operand::Method(method), _) => {
                let handle = symbols.method_handle(method)?.encode();
                push(&mut self.code, handle, self.order);
            }
            (Operand::Field(field), _) => {
                let handle = symbols.field_handle(field)?.encode();
                push(&mut self.code, handle, self.order);
            }
            (Operand::Type(ty), _) => {
                let token = symbols.type_token(ty)?;
                push(&mut self.code, token, self.order);
            }
            (Operand::Token(token), _) => {
                // TODO: resolve raw tokens through the symbol tables once the model carries a
                // token-to-symbol map; until then the runtime sees the source token.
                log::warn!(
                    "{} at 0x{:04X}: passing through unresolved token {}",
                    opcode,
                    instruction.offset,
                    token
                );
                push(&mut self.code, token.value(), self.order);
            }
            (Operand::Branch(target), OperandType::ShortInlineBrTarget) => {
                let displacement = i64::from(layout.resolve(*target)?) - next;
                let short = i8::try_from(displacement).map_err(|_| Error::CapacityOverflow {
                    what: "short branch displacement",
                    value: displacement.unsigned_abs(),
                    limit: i8::MAX as u64,
                })?;
                push(&mut self.code, short, self.order);
            }
            (Operand::Branch(target), _) => {
                let displacement = i64::from(layout.resolve(*target)?) - next;
                push(&mut self.code, to_i32(displacement)?, self.order);
            }
            (Operand::Switch(targets), _) => {
                push(
                    &mut self.code,
                    to_u16(targets.len(), "switch target count")?,
                    self.order,
                );
                for target in targets {
                    let displacement = i64::from(layout.resolve(*target)?) - next;
                    push(&mut self.code, to_i32(displacement)?, self.order);
                }
            }
        }
        Ok(())
    }

    fn argument_slot(&self, parameter: ParameterRef) -> Result<u16> {
        match parameter {
            ParameterRef::This if self.has_this => Ok(0),
            ParameterRef::This => Err(inconsistent_error!("`this` used in a static method")),
            ParameterRef::Index(index) => index
                .checked_add(u16::from(self.has_this))
                .ok_or(Error::CapacityOverflow {
                    what: "argument slot",
                    value: u64::from(index) + 1,
                    limit: u64::from(u16::MAX),
                }),
        }
    }

    fn emit_handlers(
        &mut self,
        symbols: &mut SymbolTables<'_>,
        layout: &Layout,
        body: &MethodBody,
    ) -> Result<()> {
        let offset = |input: u32| -> Result<u16> {
            let output = layout.resolve(input)?;
            to_u16(output as usize, "exception handler offset")
        };

        for handler in &body.exception_handlers {
            let (mode, class) = match &handler.kind {
                HandlerKind::Catch(name) if name.is_system_object() => (HANDLER_CATCH_ALL, NONE),
                HandlerKind::Catch(name) => (HANDLER_CATCH, symbols.type_handle(name)?.encode()),
                HandlerKind::Finally => (HANDLER_FINALLY, NONE),
                HandlerKind::Filter(filter) => (HANDLER_FILTER, offset(*filter)?),
                HandlerKind::Fault => return Err(unsupported_error!("fault handlers")),
            };

            push(&mut self.code, mode, self.order);
            push(&mut self.code, class, self.order);
            push(&mut self.code, offset(handler.try_start)?, self.order);
            push(&mut self.code, offset(handler.try_end)?, self.order);
            push(&mut self.code, offset(handler.handler_start)?, self.order);
            push(&mut self.code, offset(handler.handler_end)?, self.order);
        }

        self.code.push(to_u8(
            body.exception_handlers.len(),
            "exception handler count",
        )?);
        Ok(())
    }
}

fn to_i32(displacement: i64) -> Result<i32> {
    i32::try_from(displacement).map_err(|_| Error::CapacityOverflow {
        what: "branch displacement",
        value: displacement.unsigned_abs(),
        limit: i32::MAX as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            Assembly, AssemblyName, ExceptionHandler, FieldRef, MethodAttributes, MethodRef,
            MethodSig, Token, TypeDefinition, TypeName, TypeSig, Version,
        },
        tables::strings::StringTable,
    };

    fn assembly() -> Assembly {
        let mut assembly = Assembly::new("App");
        assembly
            .references
            .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));
        let mut ty = TypeDefinition::new(TypeName::new("App", "App", "Program"));
        ty.methods.push(MethodDefinition::new(
            "Helper",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        ));
        assembly.types.push(ty);
        assembly
    }

    fn encode(
        assembly: &Assembly,
        method: &MethodDefinition,
        code: Vec<(OpCode, Operand)>,
    ) -> Result<EncodedBody> {
        let mut symbols =
            SymbolTables::new(assembly, ByteOrder::Little, StringTable::default())?;
        let body = MethodBody::from_instructions(vec![], code);
        encode_body(&mut symbols, method, &body)
    }

    fn static_method() -> MethodDefinition {
        MethodDefinition::new(
            "Run",
            MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![TypeSig::I4]),
        )
    }

    fn instance_method() -> MethodDefinition {
        MethodDefinition::new(
            "Run",
            MethodAttributes::PUBLIC,
            MethodSig::instance(TypeSig::Void, vec![TypeSig::I4]),
        )
    }

    #[test]
    fn test_symbols_are_reencoded() {
        let assembly = assembly();
        let helper = MethodRef::new(
            TypeName::new("App", "App", "Program"),
            "Helper",
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        let write_line = MethodRef::new(
            TypeName::new("mscorlib", "System", "Console"),
            "WriteLine",
            MethodSig::static_(TypeSig::Void, vec![TypeSig::String]),
        );
        let encoded = encode(
            &assembly,
            &static_method(),
            vec![
                (OpCode::CALL, Operand::Method(helper)),
                (OpCode::LDSTR, Operand::String("hi".into())),
                (OpCode::CALL, Operand::Method(write_line)),
                (OpCode::RET, Operand::None),
            ],
        )
        .unwrap();

        assert_eq!(
            encoded.bytes,
            [0x28, 0x00, 0x00, 0x72, 0x01, 0x00, 0x28, 0x00, 0x80, 0x2a]
        );
        assert_eq!(encoded.code_len, 10);
        assert_eq!(encoded.offsets, [(0, 0), (5, 3), (10, 6), (15, 9)]);
    }

    #[test]
    fn test_branch_fixup_uses_output_offsets() {
        let assembly = assembly();
        let helper = MethodRef::new(
            TypeName::new("App", "App", "Program"),
            "Helper",
            MethodSig::static_(TypeSig::Void, vec![]),
        );
        // Source: br.s 7 (0), call (2), ret (7)
        let encoded = encode(
            &assembly,
            &static_method(),
            vec![
                (OpCode::BR_S, Operand::Branch(7)),
                (OpCode::CALL, Operand::Method(helper)),
                (OpCode::RET, Operand::None),
            ],
        )
        .unwrap();
        assert_eq!(encoded.bytes, [0x2b, 0x03, 0x28, 0x00, 0x00, 0x2a]);
    }

    #[test]
    fn test_backward_long_branch() {
        let assembly = assembly();
        let encoded = encode(
            &assembly,
            &static_method(),
            vec![
                (OpCode::NOP, Operand::None),
                (OpCode::BR, Operand::Branch(0)),
            ],
        )
        .unwrap();
        assert_eq!(encoded.bytes, [0x00, 0x38, 0xfa, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_unknown_branch_target() {
        let assembly = assembly();
        let result = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::BR_S, Operand::Branch(1)), (OpCode::RET, Operand::None)],
        );
        assert!(matches!(result, Err(Error::InconsistentModel(_))));
    }

    #[test]
    fn test_short_branch_overflow() {
        let assembly = assembly();
        let mut code = vec![(OpCode::BR_S, Operand::Branch(202))];
        code.extend((0..100).map(|_| (OpCode::LDC_I4_S, Operand::Int8(1))));
        code.push((OpCode::RET, Operand::None));
        let result = encode(&assembly, &static_method(), code);
        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));
    }

    #[test]
    fn test_switch_relative_to_table_end() {
        let assembly = assembly();
        // Source: switch (0, 13 bytes), nop (13), ret (14). The output table is 11 bytes.
        let encoded = encode(
            &assembly,
            &static_method(),
            vec![
                (OpCode::SWITCH, Operand::Switch(vec![13, 14])),
                (OpCode::NOP, Operand::None),
                (OpCode::RET, Operand::None),
            ],
        )
        .unwrap();
        assert_eq!(
            encoded.bytes,
            [0x45, 0x02, 0x00, 0, 0, 0, 0, 1, 0, 0, 0, 0x00, 0x2a]
        );
    }

    #[test]
    fn test_parameters_shift_for_instance_methods() {
        let assembly = assembly();
        let code = || {
            vec![
                (OpCode::LDARG_S, Operand::Parameter(ParameterRef::Index(0))),
                (OpCode::RET, Operand::None),
            ]
        };
        let encoded = encode(&assembly, &static_method(), code()).unwrap();
        assert_eq!(encoded.bytes, [0x0e, 0x00, 0x2a]);
        let encoded = encode(&assembly, &instance_method(), code()).unwrap();
        assert_eq!(encoded.bytes, [0x0e, 0x01, 0x2a]);

        let result = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::LDARG_S, Operand::Parameter(ParameterRef::This))],
        );
        assert!(matches!(result, Err(Error::InconsistentModel(_))));
    }

    #[test]
    fn test_short_local_overflow() {
        let assembly = assembly();
        let result = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::LDLOC_S, Operand::Local(300))],
        );
        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));
    }

    #[test]
    fn test_operand_mismatch() {
        let assembly = assembly();
        let result = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::LDSTR, Operand::Int32(5))],
        );
        match result {
            Err(Error::OperandMismatch {
                opcode, expected, ..
            }) => {
                assert_eq!(opcode, "ldstr");
                assert_eq!(expected, "string");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_operands() {
        let assembly = assembly();
        let calli = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::CALLI, Operand::Token(Token::new(0x1100_0001)))],
        );
        assert!(matches!(calli, Err(Error::Unsupported(_))));

        let field = FieldRef::new(TypeName::new("App", "App", "Program"), "x", TypeSig::I4);
        let ldtoken = encode(
            &assembly,
            &static_method(),
            vec![(OpCode::LDTOKEN, Operand::Field(field))],
        );
        assert!(matches!(ldtoken, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_token_passthrough_and_type_operands() {
        let assembly = assembly();
        let encoded = encode(
            &assembly,
            &static_method(),
            vec![
                (OpCode::LDTOKEN, Operand::Token(Token::new(0x0200_0002))),
                (OpCode::NEWARR, Operand::Type(TypeSig::I4)),
                (OpCode::RET, Operand::None),
            ],
        )
        .unwrap();
        assert_eq!(
            encoded.bytes,
            [0xd0, 0x02, 0x00, 0x00, 0x02, 0x8d, 0x00, 0x80, 0x2a]
        );
    }

    #[test]
    fn test_exception_handler_records() {
        let assembly = assembly();
        let mut symbols =
            SymbolTables::new(&assembly, ByteOrder::Little, StringTable::default()).unwrap();
        // Source: nop (0), leave.s 8 (1), pop (3), leave (4, 5 bytes), ret (9)
        let mut body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::NOP, Operand::None),
                (OpCode::LEAVE_S, Operand::Branch(9)),
                (OpCode::POP, Operand::None),
                (OpCode::LEAVE, Operand::Branch(9)),
                (OpCode::RET, Operand::None),
            ],
        );
        body.exception_handlers.push(ExceptionHandler {
            kind: HandlerKind::Catch(TypeName::new("mscorlib", "System", "Object")),
            try_start: 0,
            try_end: 3,
            handler_start: 3,
            handler_end: 9,
        });

        let encoded = encode_body(&mut symbols, &static_method(), &body).unwrap();
        assert_eq!(encoded.code_len, 10);
        assert_eq!(encoded.max_stack, 1);
        let section = &encoded.bytes[10..];
        assert_eq!(section.len(), HANDLER_RECORD_SIZE + 1);
        assert_eq!(
            section,
            [1, 0, 0xff, 0xff, 0, 0, 3, 0, 3, 0, 9, 0, 1]
        );

        body.exception_handlers[0].kind = HandlerKind::Fault;
        assert!(matches!(
            encode_body(&mut symbols, &static_method(), &body),
            Err(Error::Unsupported(_))
        ));
    }
}
