//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction list and hands it to a callback macro, so the
//! opcode enum and the assembler encoder are generated from one table.
//!
//! This module generates:
//! - The [`Opcode`] enum with byte values, mnemonics and base gas costs
//! - `TryFrom<u8>` for decoding opcodes
//!
//! # Bytecode Format
//!
//! Instructions use variable-length encoding:
//! - Opcode: 1 byte
//! - Register operand (`Reg`): 1 byte, index into the frame's 32 registers
//! - Argument count (`Count`): 1 byte
//! - Code offset (`Offset`): 2 bytes, little-endian, absolute
//! - Type tag (`Type`): 1 byte, a [`VMType`](super::object::VMType) value
//! - Literal (`Literal`): 1 type byte, a varint length, then the raw value
//!
//! Operands are written source first, destination last.

use crate::virtual_machine::errors::VMError;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Registers and stack
            // =========================
            /// NOP ; does nothing
            Nop = 0x00, "NOP" => [], 0,
            /// MOVE src, dst ; dst = src, src = None
            Move = 0x01, "MOVE" => [src: Reg, dst: Reg], 1,
            /// COPY src, dst ; dst = src
            Copy = 0x02, "COPY" => [src: Reg, dst: Reg], 1,
            /// PUSH src ; pushes a copy of src on the stack
            Push = 0x03, "PUSH" => [src: Reg], 1,
            /// POP dst ; dst = pop()
            Pop = 0x04, "POP" => [dst: Reg], 1,
            /// SWAP a, b ; exchanges two registers
            Swap = 0x05, "SWAP" => [a: Reg, b: Reg], 1,
            // =========================
            // Control flow
            // =========================
            /// CALL count, offset ; new frame with count registers, jump to offset
            Call = 0x06, "CALL" => [count: Count, offset: Offset], 5,
            /// EXTCALL src ; invokes the interop named by src
            ExtCall = 0x07, "EXTCALL" => [src: Reg], 10,
            /// JMP offset ; ip = offset
            Jmp = 0x08, "JMP" => [offset: Offset], 1,
            /// JMPIF src, offset ; if src then ip = offset
            JmpIf = 0x09, "JMPIF" => [src: Reg, offset: Offset], 1,
            /// JMPNOT src, offset ; if !src then ip = offset
            JmpNot = 0x0A, "JMPNOT" => [src: Reg, offset: Offset], 1,
            /// RET ; returns to the caller frame, halts at the outermost frame
            Ret = 0x0B, "RET" => [], 0,
            /// THROW src ; faults with src as the message
            Throw = 0x0C, "THROW" => [src: Reg], 1,
            // =========================
            // Data
            // =========================
            /// LOAD dst, literal ; dst = literal
            Load = 0x0D, "LOAD" => [dst: Reg, literal: Literal], 5,
            /// CAST src, dst, type ; dst = src converted to type
            Cast = 0x0E, "CAST" => [src: Reg, dst: Reg, ty: Type], 1,
            /// CAT a, b, dst ; dst = a ++ b
            Cat = 0x0F, "CAT" => [a: Reg, b: Reg, dst: Reg], 1,
            /// RANGE src, dst, index, len ; dst = src[index..index + len]
            Range = 0x10, "RANGE" => [src: Reg, dst: Reg, index: Offset, len: Offset], 1,
            /// LEFT src, dst, len ; dst = src[..len]
            Left = 0x11, "LEFT" => [src: Reg, dst: Reg, len: Offset], 1,
            /// RIGHT src, dst, len ; dst = src[src.len - len..]
            Right = 0x12, "RIGHT" => [src: Reg, dst: Reg, len: Offset], 1,
            /// SIZE src, dst ; dst = byte length of src
            Size = 0x13, "SIZE" => [src: Reg, dst: Reg], 1,
            /// COUNT src, dst ; dst = number of fields in a struct, 1 otherwise
            Count = 0x14, "COUNT" => [src: Reg, dst: Reg], 1,
            // =========================
            // Logic and comparison
            // =========================
            /// NOT src, dst ; dst = !src
            Not = 0x15, "NOT" => [src: Reg, dst: Reg], 1,
            /// AND a, b, dst ; logical and of bools, bitwise and of numbers
            And = 0x16, "AND" => [a: Reg, b: Reg, dst: Reg], 1,
            /// OR a, b, dst
            Or = 0x17, "OR" => [a: Reg, b: Reg, dst: Reg], 1,
            /// XOR a, b, dst
            Xor = 0x18, "XOR" => [a: Reg, b: Reg, dst: Reg], 1,
            /// EQUAL a, b, dst ; dst = (a == b)
            Equal = 0x19, "EQUAL" => [a: Reg, b: Reg, dst: Reg], 1,
            /// LT a, b, dst ; dst = (a < b)
            Lt = 0x1A, "LT" => [a: Reg, b: Reg, dst: Reg], 1,
            /// GT a, b, dst ; dst = (a > b)
            Gt = 0x1B, "GT" => [a: Reg, b: Reg, dst: Reg], 1,
            /// LTE a, b, dst ; dst = (a <= b)
            Lte = 0x1C, "LTE" => [a: Reg, b: Reg, dst: Reg], 1,
            /// GTE a, b, dst ; dst = (a >= b)
            Gte = 0x1D, "GTE" => [a: Reg, b: Reg, dst: Reg], 1,
            // =========================
            // Arithmetic
            // =========================
            /// INC dst ; dst += 1
            Inc = 0x1E, "INC" => [dst: Reg], 1,
            /// DEC dst ; dst -= 1
            Dec = 0x1F, "DEC" => [dst: Reg], 1,
            /// SIGN src, dst ; dst = -1, 0 or 1
            Sign = 0x20, "SIGN" => [src: Reg, dst: Reg], 1,
            /// NEGATE src, dst ; dst = -src
            Negate = 0x21, "NEGATE" => [src: Reg, dst: Reg], 1,
            /// ABS src, dst ; dst = |src|
            Abs = 0x22, "ABS" => [src: Reg, dst: Reg], 1,
            /// ADD a, b, dst ; dst = a + b
            Add = 0x23, "ADD" => [a: Reg, b: Reg, dst: Reg], 1,
            /// SUB a, b, dst ; dst = a - b
            Sub = 0x24, "SUB" => [a: Reg, b: Reg, dst: Reg], 1,
            /// MUL a, b, dst ; dst = a * b
            Mul = 0x25, "MUL" => [a: Reg, b: Reg, dst: Reg], 1,
            /// DIV a, b, dst ; dst = a / b, truncating, faults on zero
            Div = 0x26, "DIV" => [a: Reg, b: Reg, dst: Reg], 1,
            /// MOD a, b, dst ; dst = a % b, faults on zero
            Mod = 0x27, "MOD" => [a: Reg, b: Reg, dst: Reg], 1,
            /// SHL a, b, dst ; dst = a << b
            Shl = 0x28, "SHL" => [a: Reg, b: Reg, dst: Reg], 1,
            /// SHR a, b, dst ; dst = a >> b
            Shr = 0x29, "SHR" => [a: Reg, b: Reg, dst: Reg], 1,
            /// MIN a, b, dst
            Min = 0x2A, "MIN" => [a: Reg, b: Reg, dst: Reg], 1,
            /// MAX a, b, dst
            Max = 0x2B, "MAX" => [a: Reg, b: Reg, dst: Reg], 1,
            /// POW a, b, dst ; dst = a ^ b
            Pow = 0x2C, "POW" => [a: Reg, b: Reg, dst: Reg], 1,
            // =========================
            // Contexts and structs
            // =========================
            /// CTX src, dst ; dst = handle to the context named by src
            Ctx = 0x2D, "CTX" => [src: Reg, dst: Reg], 10,
            /// SWITCH src ; runs the context held by src to completion
            Switch = 0x2E, "SWITCH" => [src: Reg], 100,
            /// PUT src, dst, key ; dst[key] = src
            Put = 0x2F, "PUT" => [src: Reg, dst: Reg, key: Reg], 5,
            /// GET src, dst, key ; dst = src[key]
            Get = 0x30, "GET" => [src: Reg, dst: Reg, key: Reg], 5,
            /// CLEAR dst ; dst = None
            Clear = 0x31, "CLEAR" => [dst: Reg], 1,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ], $gas:expr
        ),* $(,)?
    ) => {
        // =========================
        // VM opcode enum
        // =========================
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Every opcode in byte order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Gas charged before the opcode has any effect.
            pub const fn base_gas(&self) -> u64 {
                match self {
                    $( Opcode::$name => $gas, )*
                }
            }

            /// Looks up an opcode by mnemonic, case-insensitively.
            pub fn from_mnemonic(text: &str) -> Option<Opcode> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
            }
        }
    };
}

for_each_instruction!(define_instructions);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(VMError::InvalidInstruction { opcode: 0xFF, .. })
        ));
    }

    #[test]
    fn opcode_bytes_are_dense_and_round_trip() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as u8 as usize, i);
            assert_eq!(Opcode::try_from(*op as u8).unwrap(), *op);
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(*op));
        }
        assert_eq!(Opcode::ALL.len(), 0x32);
    }

    #[test]
    fn cost_table() {
        assert_eq!(Opcode::Nop.base_gas(), 0);
        assert_eq!(Opcode::Ret.base_gas(), 0);
        assert_eq!(Opcode::Add.base_gas(), 1);
        assert_eq!(Opcode::Get.base_gas(), 5);
        assert_eq!(Opcode::Put.base_gas(), 5);
        assert_eq!(Opcode::Call.base_gas(), 5);
        assert_eq!(Opcode::Load.base_gas(), 5);
        assert_eq!(Opcode::ExtCall.base_gas(), 10);
        assert_eq!(Opcode::Ctx.base_gas(), 10);
        assert_eq!(Opcode::Switch.base_gas(), 100);
    }

    #[test]
    fn mnemonic_lookup_ignores_case() {
        assert_eq!(Opcode::from_mnemonic("extcall"), Some(Opcode::ExtCall));
        assert_eq!(Opcode::from_mnemonic("jmpif"), Some(Opcode::JmpIf));
        assert_eq!(Opcode::from_mnemonic("BOGUS"), None);
    }
}
