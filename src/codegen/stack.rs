//! Maximum evaluation stack depth.
//!
//! A single linear pass over the body in source order. The stack effect of most opcodes is
//! fixed by their pop and push categories; calls derive theirs from the callee signature. Depths
//! at branch targets are remembered so that code following an unconditional transfer resumes at
//! the depth some branch established for it. Exception handlers start at depth 1 for `catch`
//! and `filter` blocks (the exception object) and 0 otherwise.
//!
//! The result is an upper bound for well-formed bodies; underflow saturates at 0 instead of
//! being reported, since validating the input program is not the linker's job.

use std::collections::HashMap;

use crate::{
    model::{
        FlowType, HandlerKind, MethodBody, MethodSig, OpCode, Operand, StackPop, StackPush,
    },
    Result,
};

/// Computes the maximum stack depth of `body`, saturated to `u8`.
///
/// # Arguments
///
/// * `body` - The method body, in source offsets
/// * `signature` - Signature of the method owning `body`; decides the effect of `ret`
///
/// # Errors
///
/// Returns [`crate::Error::Unsupported`] for unknown opcodes.
pub fn max_stack(body: &MethodBody, signature: &MethodSig) -> Result<u8> {
    let mut recorded: HashMap<u32, u32> = HashMap::new();
    for handler in &body.exception_handlers {
        match handler.kind {
            HandlerKind::Catch(_) => record(&mut recorded, handler.handler_start, 1),
            HandlerKind::Filter(filter) => {
                record(&mut recorded, filter, 1);
                record(&mut recorded, handler.handler_start, 1);
            }
            HandlerKind::Finally | HandlerKind::Fault => {
                record(&mut recorded, handler.handler_start, 0);
            }
        }
    }

    let mut depth: u32 = 0;
    let mut max: u32 = 0;
    let mut reachable = true;

    for instruction in &body.instructions {
        let at_target = recorded.get(&instruction.offset).copied();
        depth = match (reachable, at_target) {
            (true, Some(target)) => depth.max(target),
            (true, None) => depth,
            (false, target) => target.unwrap_or(0),
        };

        let info = instruction.opcode.info()?;
        let (pops, pushes) = effect(
            instruction.opcode,
            info.pops,
            info.pushes,
            &instruction.operand,
            signature,
        );
        depth = depth.saturating_sub(pops) + pushes;
        max = max.max(depth);

        match &instruction.operand {
            Operand::Branch(target) => {
                let carried = if info.flow == FlowType::Leave { 0 } else { depth };
                record(&mut recorded, *target, carried);
            }
            Operand::Switch(targets) => {
                for target in targets {
                    record(&mut recorded, *target, depth);
                }
            }
            _ => {}
        }

        reachable = !info.flow.is_unconditional();
    }

    Ok(u8::try_from(max).unwrap_or(u8::MAX))
}

fn record(recorded: &mut HashMap<u32, u32>, offset: u32, depth: u32) {
    let entry = recorded.entry(offset).or_insert(depth);
    *entry = (*entry).max(depth);
}

fn effect(
    opcode: OpCode,
    pops: StackPop,
    pushes: StackPush,
    operand: &Operand,
    signature: &MethodSig,
) -> (u32, u32) {
    let callee = match operand {
        Operand::Method(method) => Some(&method.signature),
        _ => None,
    };

    let pops = pops.count().unwrap_or_else(|| {
        if opcode == OpCode::RET {
            u32::from(signature.returns_value())
        } else if opcode == OpCode::NEWOBJ {
            callee.map_or(0, |c| c.params.len() as u32)
        } else {
            callee.map_or(0, |c| c.argument_count() as u32)
        }
    });
    let pushes = pushes
        .count()
        .unwrap_or_else(|| callee.map_or(0, |c| u32::from(c.returns_value())));
    (pops, pushes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExceptionHandler, MethodRef, ParameterRef, TypeName, TypeSig};

    fn void_static() -> MethodSig {
        MethodSig::static_(TypeSig::Void, vec![])
    }

    #[test]
    fn test_straight_line() {
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDC_I4_1, Operand::None),
                (OpCode::LDC_I4_2, Operand::None),
                (OpCode::LDC_I4_3, Operand::None),
                (OpCode::ADD, Operand::None),
                (OpCode::ADD, Operand::None),
                (OpCode::POP, Operand::None),
                (OpCode::RET, Operand::None),
            ],
        );
        assert_eq!(max_stack(&body, &void_static()).unwrap(), 3);
    }

    #[test]
    fn test_push_push_push_pop_pop_push() {
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDC_I4_1, Operand::None),
                (OpCode::LDC_I4_2, Operand::None),
                (OpCode::LDC_I4_3, Operand::None),
                (OpCode::POP, Operand::None),
                (OpCode::POP, Operand::None),
                (OpCode::LDC_I4_4, Operand::None),
            ],
        );
        assert_eq!(max_stack(&body, &void_static()).unwrap(), 3);
    }

    #[test]
    fn test_calls_use_callee_signature() {
        let callee = MethodRef::new(
            TypeName::new("App", "App", "Math"),
            "Sum",
            MethodSig::static_(TypeSig::I4, vec![TypeSig::I4, TypeSig::I4]),
        );
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDC_I4_1, Operand::None),
                (OpCode::LDC_I4_2, Operand::None),
                (OpCode::CALL, Operand::Method(callee)),
                (OpCode::RET, Operand::None),
            ],
        );
        let sig = MethodSig::static_(TypeSig::I4, vec![]);
        assert_eq!(max_stack(&body, &sig).unwrap(), 2);
    }

    #[test]
    fn test_newobj_pushes_instance() {
        let ctor = MethodRef::new(
            TypeName::new("App", "App", "Point"),
            ".ctor",
            MethodSig::instance(TypeSig::Void, vec![TypeSig::I4]),
        );
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDARG_0, Operand::None),
                (OpCode::NEWOBJ, Operand::Method(ctor)),
                (OpCode::LDARG_S, Operand::Parameter(ParameterRef::Index(0))),
                (OpCode::POP, Operand::None),
                (OpCode::RET, Operand::None),
            ],
        );
        let sig = MethodSig::static_(TypeSig::Object, vec![TypeSig::I4]);
        assert_eq!(max_stack(&body, &sig).unwrap(), 2);
    }

    #[test]
    fn test_depth_resumes_at_branch_target() {
        // The block at 6 is only reachable through the branch, which leaves one value behind.
        let body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::LDC_I4_1, Operand::None),
                (OpCode::LDC_I4_1, Operand::None),
                (OpCode::BRTRUE_S, Operand::Branch(6)),
                (OpCode::LDC_I4_0, Operand::None),
                (OpCode::RET, Operand::None),
                (OpCode::LDC_I4_2, Operand::None),
                (OpCode::LDC_I4_3, Operand::None),
                (OpCode::ADD, Operand::None),
                (OpCode::ADD, Operand::None),
                (OpCode::RET, Operand::None),
            ],
        );
        let sig = MethodSig::static_(TypeSig::I4, vec![]);
        assert_eq!(body.instructions[5].offset, 6);
        assert_eq!(max_stack(&body, &sig).unwrap(), 3);
    }

    #[test]
    fn test_catch_handler_starts_with_exception() {
        // 0: nop  1: leave.s 7  3: pop  4: leave.s 7  6: nop  7: ret
        let mut body = MethodBody::from_instructions(
            vec![],
            vec![
                (OpCode::NOP, Operand::None),
                (OpCode::LEAVE_S, Operand::Branch(7)),
                (OpCode::POP, Operand::None),
                (OpCode::LEAVE_S, Operand::Branch(7)),
                (OpCode::NOP, Operand::None),
                (OpCode::RET, Operand::None),
            ],
        );
        body.exception_handlers.push(ExceptionHandler {
            kind: HandlerKind::Catch(TypeName::new("mscorlib", "System", "Exception")),
            try_start: 0,
            try_end: 3,
            handler_start: 3,
            handler_end: 6,
        });
        assert_eq!(max_stack(&body, &void_static()).unwrap(), 1);
    }

    #[test]
    fn test_underflow_saturates() {
        let body = MethodBody::from_instructions(
            vec![],
            vec![(OpCode::POP, Operand::None), (OpCode::RET, Operand::None)],
        );
        assert_eq!(max_stack(&body, &void_static()).unwrap(), 0);
    }
}
