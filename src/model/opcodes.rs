//! The CIL opcode set (ECMA-335 §III).
//!
//! Every opcode is a constant on [`OpCode`]; its static properties live in one [`OpCodeInfo`]
//! record per opcode, looked up with [`OpCode::info`]. Stack effects are categories
//! ([`StackPop`], [`StackPush`]) rather than exact value types, which is all the stack-depth
//! computation needs. Variable effects (`call`, `newobj`, `ret`, ...) are resolved by the encoder
//! from the operand's signature.

use std::{fmt, sync::OnceLock};

use crate::Result;

/// How the operand of an instruction is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    InlineNone,
    /// Local variable index, one byte
    ShortInlineVar,
    /// Local variable index, two bytes
    InlineVar,
    /// Argument index, one byte
    ShortInlineArg,
    /// Argument index, two bytes
    InlineArg,
    /// 8-bit integer
    ShortInlineI,
    /// 32-bit integer
    InlineI,
    /// 64-bit integer
    InlineI8,
    /// 32-bit float
    ShortInlineR,
    /// 64-bit float
    InlineR,
    /// String literal
    InlineString,
    /// Method reference
    InlineMethod,
    /// Field reference
    InlineField,
    /// Type reference
    InlineType,
    /// Type, field or method handle (`ldtoken`)
    InlineTok,
    /// Stand-alone call-site signature (`calli`)
    InlineSig,
    /// Branch target, 8-bit displacement
    ShortInlineBrTarget,
    /// Branch target, 32-bit displacement
    InlineBrTarget,
    /// Jump table
    InlineSwitch,
}

impl OperandType {
    /// Human readable name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OperandType::InlineNone => "no operand",
            OperandType::ShortInlineVar | OperandType::InlineVar => "local variable",
            OperandType::ShortInlineArg | OperandType::InlineArg => "parameter",
            OperandType::ShortInlineI => "int8",
            OperandType::InlineI => "int32",
            OperandType::InlineI8 => "int64",
            OperandType::ShortInlineR => "float32",
            OperandType::InlineR => "float64",
            OperandType::InlineString => "string",
            OperandType::InlineMethod => "method",
            OperandType::InlineField => "field",
            OperandType::InlineType => "type",
            OperandType::InlineTok => "token",
            OperandType::InlineSig => "signature",
            OperandType::ShortInlineBrTarget | OperandType::InlineBrTarget => "branch target",
            OperandType::InlineSwitch => "switch table",
        }
    }
}

/// Number of evaluation stack slots an instruction consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StackPop {
    Pop0,
    Pop1,
    Pop2,
    Pop3,
    /// Depends on the operand (calls) or the enclosing method (`ret`)
    VarPop,
}

/// Number of evaluation stack slots an instruction produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StackPush {
    Push0,
    Push1,
    Push2,
    /// Depends on the operand's return type
    VarPush,
}

impl StackPop {
    /// Fixed pop count, `None` for [`StackPop::VarPop`].
    #[must_use]
    pub const fn count(self) -> Option<u32> {
        match self {
            StackPop::Pop0 => Some(0),
            StackPop::Pop1 => Some(1),
            StackPop::Pop2 => Some(2),
            StackPop::Pop3 => Some(3),
            StackPop::VarPop => None,
        }
    }
}

impl StackPush {
    /// Fixed push count, `None` for [`StackPush::VarPush`].
    #[must_use]
    pub const fn count(self) -> Option<u32> {
        match self {
            StackPush::Push0 => Some(0),
            StackPush::Push1 => Some(1),
            StackPush::Push2 => Some(2),
            StackPush::VarPush => None,
        }
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally or filter block
    EndFinally,
    /// Leave protected region
    Leave,
    /// Prefix that modifies the next instruction
    Meta,
}

impl FlowType {
    /// `true` if execution never falls through to the next instruction.
    #[must_use]
    pub const fn is_unconditional(self) -> bool {
        matches!(
            self,
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
                | FlowType::Leave
        )
    }
}

/// Static properties of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpCodeInfo {
    /// The opcode
    pub opcode: OpCode,
    /// Mnemonic, e.g. `ldarg.s`
    pub name: &'static str,
    /// Operand encoding
    pub operand: OperandType,
    /// Stack slots consumed
    pub pops: StackPop,
    /// Stack slots produced
    pub pushes: StackPush,
    /// Control flow behavior
    pub flow: FlowType,
}

/// A CIL opcode; single-byte opcodes are `0x00xx`, two-byte opcodes `0xFExx`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpCode(u16);

/// Prefix byte of the two-byte opcode family.
pub const TWO_BYTE_PREFIX: u8 = 0xFE;

macro_rules! opcodes {
    ($($konst:ident = $value:literal, $name:literal, $operand:ident, $pop:ident, $push:ident, $flow:ident;)*) => {
        #[allow(missing_docs)]
        impl OpCode {
            $(pub const $konst: OpCode = OpCode($value);)*
        }

        static OPCODES: &[OpCodeInfo] = &[
            $(OpCodeInfo {
                opcode: OpCode($value),
                name: $name,
                operand: OperandType::$operand,
                pops: StackPop::$pop,
                pushes: StackPush::$push,
                flow: FlowType::$flow,
            },)*
        ];
    };
}

opcodes! {
    NOP = 0x00, "nop", InlineNone, Pop0, Push0, Sequential;
    BREAK = 0x01, "break", InlineNone, Pop0, Push0, Sequential;
    LDARG_0 = 0x02, "ldarg.0", InlineNone, Pop0, Push1, Sequential;
    LDARG_1 = 0x03, "ldarg.1", InlineNone, Pop0, Push1, Sequential;
    LDARG_2 = 0x04, "ldarg.2", InlineNone, Pop0, Push1, Sequential;
    LDARG_3 = 0x05, "ldarg.3", InlineNone, Pop0, Push1, Sequential;
    LDLOC_0 = 0x06, "ldloc.0", InlineNone, Pop0, Push1, Sequential;
    LDLOC_1 = 0x07, "ldloc.1", InlineNone, Pop0, Push1, Sequential;
    LDLOC_2 = 0x08, "ldloc.2", InlineNone, Pop0, Push1, Sequential;
    LDLOC_3 = 0x09, "ldloc.3", InlineNone, Pop0, Push1, Sequential;
    STLOC_0 = 0x0A, "stloc.0", InlineNone, Pop1, Push0, Sequential;
    STLOC_1 = 0x0B, "stloc.1", InlineNone, Pop1, Push0, Sequential;
    STLOC_2 = 0x0C, "stloc.2", InlineNone, Pop1, Push0, Sequential;
    STLOC_3 = 0x0D, "stloc.3", InlineNone, Pop1, Push0, Sequential;
    LDARG_S = 0x0E, "ldarg.s", ShortInlineArg, Pop0, Push1, Sequential;
    LDARGA_S = 0x0F, "ldarga.s", ShortInlineArg, Pop0, Push1, Sequential;
    STARG_S = 0x10, "starg.s", ShortInlineArg, Pop1, Push0, Sequential;
    LDLOC_S = 0x11, "ldloc.s", ShortInlineVar, Pop0, Push1, Sequential;
    LDLOCA_S = 0x12, "ldloca.s", ShortInlineVar, Pop0, Push1, Sequential;
    STLOC_S = 0x13, "stloc.s", ShortInlineVar, Pop1, Push0, Sequential;
    LDNULL = 0x14, "ldnull", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_M1 = 0x15, "ldc.i4.m1", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_0 = 0x16, "ldc.i4.0", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_1 = 0x17, "ldc.i4.1", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_2 = 0x18, "ldc.i4.2", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_3 = 0x19, "ldc.i4.3", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_4 = 0x1A, "ldc.i4.4", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_5 = 0x1B, "ldc.i4.5", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_6 = 0x1C, "ldc.i4.6", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_7 = 0x1D, "ldc.i4.7", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_8 = 0x1E, "ldc.i4.8", InlineNone, Pop0, Push1, Sequential;
    LDC_I4_S = 0x1F, "ldc.i4.s", ShortInlineI, Pop0, Push1, Sequential;
    LDC_I4 = 0x20, "ldc.i4", InlineI, Pop0, Push1, Sequential;
    LDC_I8 = 0x21, "ldc.i8", InlineI8, Pop0, Push1, Sequential;
    LDC_R4 = 0x22, "ldc.r4", ShortInlineR, Pop0, Push1, Sequential;
    LDC_R8 = 0x23, "ldc.r8", InlineR, Pop0, Push1, Sequential;
    DUP = 0x25, "dup", InlineNone, Pop1, Push2, Sequential;
    POP = 0x26, "pop", InlineNone, Pop1, Push0, Sequential;
    JMP = 0x27, "jmp", InlineMethod, Pop0, Push0, Return;
    CALL = 0x28, "call", InlineMethod, VarPop, VarPush, Call;
    CALLI = 0x29, "calli", InlineSig, VarPop, VarPush, Call;
    RET = 0x2A, "ret", InlineNone, VarPop, Push0, Return;
    BR_S = 0x2B, "br.s", ShortInlineBrTarget, Pop0, Push0, UnconditionalBranch;
    BRFALSE_S = 0x2C, "brfalse.s", ShortInlineBrTarget, Pop1, Push0, ConditionalBranch;
    BRTRUE_S = 0x2D, "brtrue.s", ShortInlineBrTarget, Pop1, Push0, ConditionalBranch;
    BEQ_S = 0x2E, "beq.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGE_S = 0x2F, "bge.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGT_S = 0x30, "bgt.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLE_S = 0x31, "ble.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLT_S = 0x32, "blt.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BNE_UN_S = 0x33, "bne.un.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGE_UN_S = 0x34, "bge.un.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGT_UN_S = 0x35, "bgt.un.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLE_UN_S = 0x36, "ble.un.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLT_UN_S = 0x37, "blt.un.s", ShortInlineBrTarget, Pop2, Push0, ConditionalBranch;
    BR = 0x38, "br", InlineBrTarget, Pop0, Push0, UnconditionalBranch;
    BRFALSE = 0x39, "brfalse", InlineBrTarget, Pop1, Push0, ConditionalBranch;
    BRTRUE = 0x3A, "brtrue", InlineBrTarget, Pop1, Push0, ConditionalBranch;
    BEQ = 0x3B, "beq", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGE = 0x3C, "bge", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGT = 0x3D, "bgt", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLE = 0x3E, "ble", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLT = 0x3F, "blt", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BNE_UN = 0x40, "bne.un", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGE_UN = 0x41, "bge.un", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BGT_UN = 0x42, "bgt.un", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLE_UN = 0x43, "ble.un", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    BLT_UN = 0x44, "blt.un", InlineBrTarget, Pop2, Push0, ConditionalBranch;
    SWITCH = 0x45, "switch", InlineSwitch, Pop1, Push0, Switch;
    LDIND_I1 = 0x46, "ldind.i1", InlineNone, Pop1, Push1, Sequential;
    LDIND_U1 = 0x47, "ldind.u1", InlineNone, Pop1, Push1, Sequential;
    LDIND_I2 = 0x48, "ldind.i2", InlineNone, Pop1, Push1, Sequential;
    LDIND_U2 = 0x49, "ldind.u2", InlineNone, Pop1, Push1, Sequential;
    LDIND_I4 = 0x4A, "ldind.i4", InlineNone, Pop1, Push1, Sequential;
    LDIND_U4 = 0x4B, "ldind.u4", InlineNone, Pop1, Push1, Sequential;
    LDIND_I8 = 0x4C, "ldind.i8", InlineNone, Pop1, Push1, Sequential;
    LDIND_I = 0x4D, "ldind.i", InlineNone, Pop1, Push1, Sequential;
    LDIND_R4 = 0x4E, "ldind.r4", InlineNone, Pop1, Push1, Sequential;
    LDIND_R8 = 0x4F, "ldind.r8", InlineNone, Pop1, Push1, Sequential;
    LDIND_REF = 0x50, "ldind.ref", InlineNone, Pop1, Push1, Sequential;
    STIND_REF = 0x51, "stind.ref", InlineNone, Pop2, Push0, Sequential;
    STIND_I1 = 0x52, "stind.i1", InlineNone, Pop2, Push0, Sequential;
    STIND_I2 = 0x53, "stind.i2", InlineNone, Pop2, Push0, Sequential;
    STIND_I4 = 0x54, "stind.i4", InlineNone, Pop2, Push0, Sequential;
    STIND_I8 = 0x55, "stind.i8", InlineNone, Pop2, Push0, Sequential;
    STIND_R4 = 0x56, "stind.r4", InlineNone, Pop2, Push0, Sequential;
    STIND_R8 = 0x57, "stind.r8", InlineNone, Pop2, Push0, Sequential;
    ADD = 0x58, "add", InlineNone, Pop2, Push1, Sequential;
    SUB = 0x59, "sub", InlineNone, Pop2, Push1, Sequential;
    MUL = 0x5A, "mul", InlineNone, Pop2, Push1, Sequential;
    DIV = 0x5B, "div", InlineNone, Pop2, Push1, Sequential;
    DIV_UN = 0x5C, "div.un", InlineNone, Pop2, Push1, Sequential;
    REM = 0x5D, "rem", InlineNone, Pop2, Push1, Sequential;
    REM_UN = 0x5E, "rem.un", InlineNone, Pop2, Push1, Sequential;
    AND = 0x5F, "and", InlineNone, Pop2, Push1, Sequential;
    OR = 0x60, "or", InlineNone, Pop2, Push1, Sequential;
    XOR = 0x61, "xor", InlineNone, Pop2, Push1, Sequential;
    SHL = 0x62, "shl", InlineNone, Pop2, Push1, Sequential;
    SHR = 0x63, "shr", InlineNone, Pop2, Push1, Sequential;
    SHR_UN = 0x64, "shr.un", InlineNone, Pop2, Push1, Sequential;
    NEG = 0x65, "neg", InlineNone, Pop1, Push1, Sequential;
    NOT = 0x66, "not", InlineNone, Pop1, Push1, Sequential;
    CONV_I1 = 0x67, "conv.i1", InlineNone, Pop1, Push1, Sequential;
    CONV_I2 = 0x68, "conv.i2", InlineNone, Pop1, Push1, Sequential;
    CONV_I4 = 0x69, "conv.i4", InlineNone, Pop1, Push1, Sequential;
    CONV_I8 = 0x6A, "conv.i8", InlineNone, Pop1, Push1, Sequential;
    CONV_R4 = 0x6B, "conv.r4", InlineNone, Pop1, Push1, Sequential;
    CONV_R8 = 0x6C, "conv.r8", InlineNone, Pop1, Push1, Sequential;
    CONV_U4 = 0x6D, "conv.u4", InlineNone, Pop1, Push1, Sequential;
    CONV_U8 = 0x6E, "conv.u8", InlineNone, Pop1, Push1, Sequential;
    CALLVIRT = 0x6F, "callvirt", InlineMethod, VarPop, VarPush, Call;
    CPOBJ = 0x70, "cpobj", InlineType, Pop2, Push0, Sequential;
    LDOBJ = 0x71, "ldobj", InlineType, Pop1, Push1, Sequential;
    LDSTR = 0x72, "ldstr", InlineString, Pop0, Push1, Sequential;
    NEWOBJ = 0x73, "newobj", InlineMethod, VarPop, Push1, Call;
    CASTCLASS = 0x74, "castclass", InlineType, Pop1, Push1, Sequential;
    ISINST = 0x75, "isinst", InlineType, Pop1, Push1, Sequential;
    CONV_R_UN = 0x76, "conv.r.un", InlineNone, Pop1, Push1, Sequential;
    UNBOX = 0x79, "unbox", InlineType, Pop1, Push1, Sequential;
    THROW = 0x7A, "throw", InlineNone, Pop1, Push0, Throw;
    LDFLD = 0x7B, "ldfld", InlineField, Pop1, Push1, Sequential;
    LDFLDA = 0x7C, "ldflda", InlineField, Pop1, Push1, Sequential;
    STFLD = 0x7D, "stfld", InlineField, Pop2, Push0, Sequential;
    LDSFLD = 0x7E, "ldsfld", InlineField, Pop0, Push1, Sequential;
    LDSFLDA = 0x7F, "ldsflda", InlineField, Pop0, Push1, Sequential;
    STSFLD = 0x80, "stsfld", InlineField, Pop1, Push0, Sequential;
    STOBJ = 0x81, "stobj", InlineType, Pop2, Push0, Sequential;
    CONV_OVF_I1_UN = 0x82, "conv.ovf.i1.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I2_UN = 0x83, "conv.ovf.i2.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I4_UN = 0x84, "conv.ovf.i4.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I8_UN = 0x85, "conv.ovf.i8.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U1_UN = 0x86, "conv.ovf.u1.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U2_UN = 0x87, "conv.ovf.u2.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U4_UN = 0x88, "conv.ovf.u4.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U8_UN = 0x89, "conv.ovf.u8.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I_UN = 0x8A, "conv.ovf.i.un", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U_UN = 0x8B, "conv.ovf.u.un", InlineNone, Pop1, Push1, Sequential;
    BOX = 0x8C, "box", InlineType, Pop1, Push1, Sequential;
    NEWARR = 0x8D, "newarr", InlineType, Pop1, Push1, Sequential;
    LDLEN = 0x8E, "ldlen", InlineNone, Pop1, Push1, Sequential;
    LDELEMA = 0x8F, "ldelema", InlineType, Pop2, Push1, Sequential;
    LDELEM_I1 = 0x90, "ldelem.i1", InlineNone, Pop2, Push1, Sequential;
    LDELEM_U1 = 0x91, "ldelem.u1", InlineNone, Pop2, Push1, Sequential;
    LDELEM_I2 = 0x92, "ldelem.i2", InlineNone, Pop2, Push1, Sequential;
    LDELEM_U2 = 0x93, "ldelem.u2", InlineNone, Pop2, Push1, Sequential;
    LDELEM_I4 = 0x94, "ldelem.i4", InlineNone, Pop2, Push1, Sequential;
    LDELEM_U4 = 0x95, "ldelem.u4", InlineNone, Pop2, Push1, Sequential;
    LDELEM_I8 = 0x96, "ldelem.i8", InlineNone, Pop2, Push1, Sequential;
    LDELEM_I = 0x97, "ldelem.i", InlineNone, Pop2, Push1, Sequential;
    LDELEM_R4 = 0x98, "ldelem.r4", InlineNone, Pop2, Push1, Sequential;
    LDELEM_R8 = 0x99, "ldelem.r8", InlineNone, Pop2, Push1, Sequential;
    LDELEM_REF = 0x9A, "ldelem.ref", InlineNone, Pop2, Push1, Sequential;
    STELEM_I = 0x9B, "stelem.i", InlineNone, Pop3, Push0, Sequential;
    STELEM_I1 = 0x9C, "stelem.i1", InlineNone, Pop3, Push0, Sequential;
    STELEM_I2 = 0x9D, "stelem.i2", InlineNone, Pop3, Push0, Sequential;
    STELEM_I4 = 0x9E, "stelem.i4", InlineNone, Pop3, Push0, Sequential;
    STELEM_I8 = 0x9F, "stelem.i8", InlineNone, Pop3, Push0, Sequential;
    STELEM_R4 = 0xA0, "stelem.r4", InlineNone, Pop3, Push0, Sequential;
    STELEM_R8 = 0xA1, "stelem.r8", InlineNone, Pop3, Push0, Sequential;
    STELEM_REF = 0xA2, "stelem.ref", InlineNone, Pop3, Push0, Sequential;
    LDELEM = 0xA3, "ldelem", InlineType, Pop2, Push1, Sequential;
    STELEM = 0xA4, "stelem", InlineType, Pop3, Push0, Sequential;
    UNBOX_ANY = 0xA5, "unbox.any", InlineType, Pop1, Push1, Sequential;
    CONV_OVF_I1 = 0xB3, "conv.ovf.i1", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U1 = 0xB4, "conv.ovf.u1", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I2 = 0xB5, "conv.ovf.i2", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U2 = 0xB6, "conv.ovf.u2", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I4 = 0xB7, "conv.ovf.i4", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U4 = 0xB8, "conv.ovf.u4", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I8 = 0xB9, "conv.ovf.i8", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U8 = 0xBA, "conv.ovf.u8", InlineNone, Pop1, Push1, Sequential;
    REFANYVAL = 0xC2, "refanyval", InlineType, Pop1, Push1, Sequential;
    CKFINITE = 0xC3, "ckfinite", InlineNone, Pop1, Push1, Sequential;
    MKREFANY = 0xC6, "mkrefany", InlineType, Pop1, Push1, Sequential;
    LDTOKEN = 0xD0, "ldtoken", InlineTok, Pop0, Push1, Sequential;
    CONV_U2 = 0xD1, "conv.u2", InlineNone, Pop1, Push1, Sequential;
    CONV_U1 = 0xD2, "conv.u1", InlineNone, Pop1, Push1, Sequential;
    CONV_I = 0xD3, "conv.i", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_I = 0xD4, "conv.ovf.i", InlineNone, Pop1, Push1, Sequential;
    CONV_OVF_U = 0xD5, "conv.ovf.u", InlineNone, Pop1, Push1, Sequential;
    ADD_OVF = 0xD6, "add.ovf", InlineNone, Pop2, Push1, Sequential;
    ADD_OVF_UN = 0xD7, "add.ovf.un", InlineNone, Pop2, Push1, Sequential;
    MUL_OVF = 0xD8, "mul.ovf", InlineNone, Pop2, Push1, Sequential;
    MUL_OVF_UN = 0xD9, "mul.ovf.un", InlineNone, Pop2, Push1, Sequential;
    SUB_OVF = 0xDA, "sub.ovf", InlineNone, Pop2, Push1, Sequential;
    SUB_OVF_UN = 0xDB, "sub.ovf.un", InlineNone, Pop2, Push1, Sequential;
    ENDFINALLY = 0xDC, "endfinally", InlineNone, Pop0, Push0, EndFinally;
    LEAVE = 0xDD, "leave", InlineBrTarget, Pop0, Push0, Leave;
    LEAVE_S = 0xDE, "leave.s", ShortInlineBrTarget, Pop0, Push0, Leave;
    STIND_I = 0xDF, "stind.i", InlineNone, Pop2, Push0, Sequential;
    CONV_U = 0xE0, "conv.u", InlineNone, Pop1, Push1, Sequential;
    ARGLIST = 0xFE00, "arglist", InlineNone, Pop0, Push1, Sequential;
    CEQ = 0xFE01, "ceq", InlineNone, Pop2, Push1, Sequential;
    CGT = 0xFE02, "cgt", InlineNone, Pop2, Push1, Sequential;
    CGT_UN = 0xFE03, "cgt.un", InlineNone, Pop2, Push1, Sequential;
    CLT = 0xFE04, "clt", InlineNone, Pop2, Push1, Sequential;
    CLT_UN = 0xFE05, "clt.un", InlineNone, Pop2, Push1, Sequential;
    LDFTN = 0xFE06, "ldftn", InlineMethod, Pop0, Push1, Sequential;
    LDVIRTFTN = 0xFE07, "ldvirtftn", InlineMethod, Pop1, Push1, Sequential;
    LDARG = 0xFE09, "ldarg", InlineArg, Pop0, Push1, Sequential;
    LDARGA = 0xFE0A, "ldarga", InlineArg, Pop0, Push1, Sequential;
    STARG = 0xFE0B, "starg", InlineArg, Pop1, Push0, Sequential;
    LDLOC = 0xFE0C, "ldloc", InlineVar, Pop0, Push1, Sequential;
    LDLOCA = 0xFE0D, "ldloca", InlineVar, Pop0, Push1, Sequential;
    STLOC = 0xFE0E, "stloc", InlineVar, Pop1, Push0, Sequential;
    LOCALLOC = 0xFE0F, "localloc", InlineNone, Pop1, Push1, Sequential;
    ENDFILTER = 0xFE11, "endfilter", InlineNone, Pop1, Push0, EndFinally;
    UNALIGNED = 0xFE12, "unaligned.", ShortInlineI, Pop0, Push0, Meta;
    VOLATILE = 0xFE13, "volatile.", InlineNone, Pop0, Push0, Meta;
    TAIL = 0xFE14, "tail.", InlineNone, Pop0, Push0, Meta;
    INITOBJ = 0xFE15, "initobj", InlineType, Pop1, Push0, Sequential;
    CONSTRAINED = 0xFE16, "constrained.", InlineType, Pop0, Push0, Meta;
    CPBLK = 0xFE17, "cpblk", InlineNone, Pop3, Push0, Sequential;
    INITBLK = 0xFE18, "initblk", InlineNone, Pop3, Push0, Sequential;
    NO = 0xFE19, "no.", ShortInlineI, Pop0, Push0, Meta;
    RETHROW = 0xFE1A, "rethrow", InlineNone, Pop0, Push0, Throw;
    SIZEOF = 0xFE1C, "sizeof", InlineType, Pop0, Push1, Sequential;
    REFANYTYPE = 0xFE1D, "refanytype", InlineNone, Pop1, Push1, Sequential;
    READONLY = 0xFE1E, "readonly.", InlineNone, Pop0, Push0, Meta;
}

struct OpCodeLookup {
    single: [Option<&'static OpCodeInfo>; 256],
    prefixed: [Option<&'static OpCodeInfo>; 256],
}

fn lookup() -> &'static OpCodeLookup {
    static LOOKUP: OnceLock<OpCodeLookup> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut table = OpCodeLookup {
            single: [None; 256],
            prefixed: [None; 256],
        };
        for info in OPCODES {
            let [high, low] = info.opcode.0.to_be_bytes();
            if high == TWO_BYTE_PREFIX {
                table.prefixed[usize::from(low)] = Some(info);
            } else {
                table.single[usize::from(low)] = Some(info);
            }
        }
        table
    })
}

impl OpCode {
    /// Returns the opcode with raw value `value` (`0x00xx` or `0xFExx`), if it exists.
    #[must_use]
    pub fn from_value(value: u16) -> Option<OpCode> {
        let [high, low] = value.to_be_bytes();
        let entry = match high {
            0 => lookup().single[usize::from(low)],
            TWO_BYTE_PREFIX => lookup().prefixed[usize::from(low)],
            _ => None,
        };
        entry.map(|info| info.opcode)
    }

    /// The raw opcode value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// `true` for opcodes of the `0xFE` family.
    #[must_use]
    pub const fn is_two_byte(self) -> bool {
        (self.0 >> 8) as u8 == TWO_BYTE_PREFIX
    }

    /// Encoded length of the opcode itself (1 or 2 bytes).
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        if self.is_two_byte() {
            2
        } else {
            1
        }
    }

    /// Static properties of this opcode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for values that are not part of the opcode set.
    pub fn info(self) -> Result<&'static OpCodeInfo> {
        let [high, low] = self.0.to_be_bytes();
        let entry = match high {
            0 => lookup().single[usize::from(low)],
            TWO_BYTE_PREFIX => lookup().prefixed[usize::from(low)],
            _ => None,
        };
        entry.ok_or_else(|| unsupported_error!("unknown opcode 0x{:04X}", self.0))
    }

    /// The mnemonic, or `"???"` for unknown values.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().map_or("???", |info| info.name)
    }

    /// Appends the encoded opcode bytes to `buffer`.
    pub fn encode_into(self, buffer: &mut Vec<u8>) {
        let [high, low] = self.0.to_be_bytes();
        if high == TWO_BYTE_PREFIX {
            buffer.push(high);
        }
        buffer.push(low);
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpCode({})", self.name())
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_single_byte() {
        let info = OpCode::CALL.info().unwrap();
        assert_eq!(info.name, "call");
        assert_eq!(info.operand, OperandType::InlineMethod);
        assert_eq!(info.pops, StackPop::VarPop);
        assert_eq!(info.flow, FlowType::Call);
        assert_eq!(OpCode::CALL.encoded_len(), 1);
    }

    #[test]
    fn test_lookup_two_byte() {
        let info = OpCode::CEQ.info().unwrap();
        assert_eq!(info.name, "ceq");
        assert!(OpCode::CEQ.is_two_byte());
        assert_eq!(OpCode::CEQ.encoded_len(), 2);

        let mut bytes = Vec::new();
        OpCode::LDLOC.encode_into(&mut bytes);
        OpCode::RET.encode_into(&mut bytes);
        assert_eq!(bytes, [0xFE, 0x0C, 0x2A]);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(OpCode::from_value(0x2A), Some(OpCode::RET));
        assert_eq!(OpCode::from_value(0xFE1A), Some(OpCode::RETHROW));
        assert_eq!(OpCode::from_value(0x24), None);
        assert_eq!(OpCode::from_value(0x1234), None);
    }

    #[test]
    fn test_unknown_opcode_is_unsupported() {
        let bogus = OpCode(0x00A6);
        assert!(matches!(bogus.info(), Err(crate::Error::Unsupported(_))));
        assert_eq!(bogus.name(), "???");
    }

    #[test]
    fn test_table_is_consistent() {
        for info in OPCODES {
            assert_eq!(info.opcode.info().unwrap().name, info.name);
            if matches!(
                info.flow,
                FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Leave
            ) {
                assert!(matches!(
                    info.operand,
                    OperandType::ShortInlineBrTarget | OperandType::InlineBrTarget
                ));
            }
        }
    }

    #[test]
    fn test_unconditional_flow() {
        assert!(FlowType::Throw.is_unconditional());
        assert!(FlowType::Leave.is_unconditional());
        assert!(!FlowType::ConditionalBranch.is_unconditional());
        assert!(!FlowType::Call.is_unconditional());
    }
}
