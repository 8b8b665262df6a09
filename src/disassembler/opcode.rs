//! EVM opcode constants and the fixed per-opcode information table.
//!
//! The EVM instruction set is closed and fixed by the execution specification, so everything the
//! rest of the engine needs to know about an opcode — mnemonic, trailing immediate width, stack
//! pops and pushes — lives in one 256-entry constant table rather than behind runtime dispatch.
//! Bytes that do not map to a defined instruction get an entry too (marked `known: false`), which
//! keeps decoding total: every byte of input yields exactly one instruction.

/// Static decode and stack-effect information for a single opcode.
///
/// One entry exists for each of the 256 possible opcode bytes. Undefined bytes carry an
/// `INVALID` entry with [`known`](OpInfo::known) set to `false`; the designated `INVALID`
/// instruction (`0xFE`) carries the same mnemonic but is a defined member of the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// Uppercase mnemonic as rendered in disassembly listings
    pub mnemonic: &'static str,
    /// Number of trailing immediate bytes (non-zero only for `PUSH1`..`PUSH32`)
    pub immediate: u8,
    /// Number of stack slots consumed
    pub pops: u8,
    /// Number of stack slots produced
    pub pushes: u8,
    /// Whether this byte maps to a defined instruction
    pub known: bool,
}

impl OpInfo {
    const fn undefined() -> Self {
        OpInfo {
            mnemonic: "INVALID",
            immediate: 0,
            pops: 0,
            pushes: 0,
            known: false,
        }
    }
}

macro_rules! opcodes {
    ($($value:literal => $name:ident ($imm:literal, $pops:literal, $pushes:literal);)*) => {
        $(
            #[doc = concat!("The `", stringify!($name), "` opcode.")]
            pub const $name: u8 = $value;
        )*

        /// The fixed opcode information table, indexed by opcode byte.
        pub const OPCODES: [OpInfo; 256] = {
            let mut table = [OpInfo::undefined(); 256];
            $(
                table[$value as usize] = OpInfo {
                    mnemonic: stringify!($name),
                    immediate: $imm,
                    pops: $pops,
                    pushes: $pushes,
                    known: true,
                };
            )*
            table
        };
    };
}

opcodes! {
    0x00 => STOP (0, 0, 0);
    0x01 => ADD (0, 2, 1);
    0x02 => MUL (0, 2, 1);
    0x03 => SUB (0, 2, 1);
    0x04 => DIV (0, 2, 1);
    0x05 => SDIV (0, 2, 1);
    0x06 => MOD (0, 2, 1);
    0x07 => SMOD (0, 2, 1);
    0x08 => ADDMOD (0, 3, 1);
    0x09 => MULMOD (0, 3, 1);
    0x0A => EXP (0, 2, 1);
    0x0B => SIGNEXTEND (0, 2, 1);
    0x10 => LT (0, 2, 1);
    0x11 => GT (0, 2, 1);
    0x12 => SLT (0, 2, 1);
    0x13 => SGT (0, 2, 1);
    0x14 => EQ (0, 2, 1);
    0x15 => ISZERO (0, 1, 1);
    0x16 => AND (0, 2, 1);
    0x17 => OR (0, 2, 1);
    0x18 => XOR (0, 2, 1);
    0x19 => NOT (0, 1, 1);
    0x1A => BYTE (0, 2, 1);
    0x1B => SHL (0, 2, 1);
    0x1C => SHR (0, 2, 1);
    0x1D => SAR (0, 2, 1);
    0x20 => KECCAK256 (0, 2, 1);
    0x30 => ADDRESS (0, 0, 1);
    0x31 => BALANCE (0, 1, 1);
    0x32 => ORIGIN (0, 0, 1);
    0x33 => CALLER (0, 0, 1);
    0x34 => CALLVALUE (0, 0, 1);
    0x35 => CALLDATALOAD (0, 1, 1);
    0x36 => CALLDATASIZE (0, 0, 1);
    0x37 => CALLDATACOPY (0, 3, 0);
    0x38 => CODESIZE (0, 0, 1);
    0x39 => CODECOPY (0, 3, 0);
    0x3A => GASPRICE (0, 0, 1);
    0x3B => EXTCODESIZE (0, 1, 1);
    0x3C => EXTCODECOPY (0, 4, 0);
    0x3D => RETURNDATASIZE (0, 0, 1);
    0x3E => RETURNDATACOPY (0, 3, 0);
    0x3F => EXTCODEHASH (0, 1, 1);
    0x40 => BLOCKHASH (0, 1, 1);
    0x41 => COINBASE (0, 0, 1);
    0x42 => TIMESTAMP (0, 0, 1);
    0x43 => NUMBER (0, 0, 1);
    0x44 => PREVRANDAO (0, 0, 1);
    0x45 => GASLIMIT (0, 0, 1);
    0x46 => CHAINID (0, 0, 1);
    0x47 => SELFBALANCE (0, 0, 1);
    0x48 => BASEFEE (0, 0, 1);
    0x49 => BLOBHASH (0, 1, 1);
    0x4A => BLOBBASEFEE (0, 0, 1);
    0x50 => POP (0, 1, 0);
    0x51 => MLOAD (0, 1, 1);
    0x52 => MSTORE (0, 2, 0);
    0x53 => MSTORE8 (0, 2, 0);
    0x54 => SLOAD (0, 1, 1);
    0x55 => SSTORE (0, 2, 0);
    0x56 => JUMP (0, 1, 0);
    0x57 => JUMPI (0, 2, 0);
    0x58 => PC (0, 0, 1);
    0x59 => MSIZE (0, 0, 1);
    0x5A => GAS (0, 0, 1);
    0x5B => JUMPDEST (0, 0, 0);
    0x5C => TLOAD (0, 1, 1);
    0x5D => TSTORE (0, 2, 0);
    0x5E => MCOPY (0, 3, 0);
    0x5F => PUSH0 (0, 0, 1);
    0x60 => PUSH1 (1, 0, 1);
    0x61 => PUSH2 (2, 0, 1);
    0x62 => PUSH3 (3, 0, 1);
    0x63 => PUSH4 (4, 0, 1);
    0x64 => PUSH5 (5, 0, 1);
    0x65 => PUSH6 (6, 0, 1);
    0x66 => PUSH7 (7, 0, 1);
    0x67 => PUSH8 (8, 0, 1);
    0x68 => PUSH9 (9, 0, 1);
    0x69 => PUSH10 (10, 0, 1);
    0x6A => PUSH11 (11, 0, 1);
    0x6B => PUSH12 (12, 0, 1);
    0x6C => PUSH13 (13, 0, 1);
    0x6D => PUSH14 (14, 0, 1);
    0x6E => PUSH15 (15, 0, 1);
    0x6F => PUSH16 (16, 0, 1);
    0x70 => PUSH17 (17, 0, 1);
    0x71 => PUSH18 (18, 0, 1);
    0x72 => PUSH19 (19, 0, 1);
    0x73 => PUSH20 (20, 0, 1);
    0x74 => PUSH21 (21, 0, 1);
    0x75 => PUSH22 (22, 0, 1);
    0x76 => PUSH23 (23, 0, 1);
    0x77 => PUSH24 (24, 0, 1);
    0x78 => PUSH25 (25, 0, 1);
    0x79 => PUSH26 (26, 0, 1);
    0x7A => PUSH27 (27, 0, 1);
    0x7B => PUSH28 (28, 0, 1);
    0x7C => PUSH29 (29, 0, 1);
    0x7D => PUSH30 (30, 0, 1);
    0x7E => PUSH31 (31, 0, 1);
    0x7F => PUSH32 (32, 0, 1);
    0x80 => DUP1 (0, 1, 2);
    0x81 => DUP2 (0, 2, 3);
    0x82 => DUP3 (0, 3, 4);
    0x83 => DUP4 (0, 4, 5);
    0x84 => DUP5 (0, 5, 6);
    0x85 => DUP6 (0, 6, 7);
    0x86 => DUP7 (0, 7, 8);
    0x87 => DUP8 (0, 8, 9);
    0x88 => DUP9 (0, 9, 10);
    0x89 => DUP10 (0, 10, 11);
    0x8A => DUP11 (0, 11, 12);
    0x8B => DUP12 (0, 12, 13);
    0x8C => DUP13 (0, 13, 14);
    0x8D => DUP14 (0, 14, 15);
    0x8E => DUP15 (0, 15, 16);
    0x8F => DUP16 (0, 16, 17);
    0x90 => SWAP1 (0, 2, 2);
    0x91 => SWAP2 (0, 3, 3);
    0x92 => SWAP3 (0, 4, 4);
    0x93 => SWAP4 (0, 5, 5);
    0x94 => SWAP5 (0, 6, 6);
    0x95 => SWAP6 (0, 7, 7);
    0x96 => SWAP7 (0, 8, 8);
    0x97 => SWAP8 (0, 9, 9);
    0x98 => SWAP9 (0, 10, 10);
    0x99 => SWAP10 (0, 11, 11);
    0x9A => SWAP11 (0, 12, 12);
    0x9B => SWAP12 (0, 13, 13);
    0x9C => SWAP13 (0, 14, 14);
    0x9D => SWAP14 (0, 15, 15);
    0x9E => SWAP15 (0, 16, 16);
    0x9F => SWAP16 (0, 17, 17);
    0xA0 => LOG0 (0, 2, 0);
    0xA1 => LOG1 (0, 3, 0);
    0xA2 => LOG2 (0, 4, 0);
    0xA3 => LOG3 (0, 5, 0);
    0xA4 => LOG4 (0, 6, 0);
    0xF0 => CREATE (0, 3, 1);
    0xF1 => CALL (0, 7, 1);
    0xF2 => CALLCODE (0, 7, 1);
    0xF3 => RETURN (0, 2, 0);
    0xF4 => DELEGATECALL (0, 6, 1);
    0xF5 => CREATE2 (0, 4, 1);
    0xFA => STATICCALL (0, 6, 1);
    0xFD => REVERT (0, 2, 0);
    0xFE => INVALID (0, 0, 0);
    0xFF => SELFDESTRUCT (0, 1, 0);
}

/// Returns the [`OpInfo`] entry for the given opcode byte.
#[must_use]
pub const fn info(op: u8) -> &'static OpInfo {
    &OPCODES[op as usize]
}

/// Returns the mnemonic for the given opcode byte.
///
/// Undefined bytes and the designated invalid instruction both render as `INVALID`.
#[must_use]
pub const fn name(op: u8) -> &'static str {
    OPCODES[op as usize].mnemonic
}

/// Returns `true` for the push family (`PUSH0`..`PUSH32`).
#[must_use]
pub const fn is_push(op: u8) -> bool {
    op >= PUSH0 && op <= PUSH32
}

/// Returns the number of immediate bytes a push opcode consumes (0 for `PUSH0` and non-push
/// opcodes).
#[must_use]
pub const fn push_bytes(op: u8) -> usize {
    OPCODES[op as usize].immediate as usize
}

/// Returns `true` when this opcode ends a basic block.
///
/// Jumps, conditional jumps, all halting instructions and every byte outside the defined
/// instruction set terminate the enclosing block. `JUMPDEST` is not a terminator; it opens a new
/// block instead.
#[must_use]
pub const fn is_terminator(op: u8) -> bool {
    matches!(
        op,
        JUMP | JUMPI | STOP | RETURN | REVERT | SELFDESTRUCT | INVALID
    ) || !OPCODES[op as usize].known
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total() {
        for byte in 0u16..=255 {
            let entry = info(byte as u8);
            assert!(!entry.mnemonic.is_empty());
        }
    }

    #[test]
    fn push_metadata() {
        assert!(is_push(PUSH0));
        assert!(is_push(PUSH32));
        assert!(!is_push(DUP1));

        assert_eq!(push_bytes(PUSH0), 0);
        assert_eq!(push_bytes(PUSH1), 1);
        assert_eq!(push_bytes(PUSH32), 32);
        assert_eq!(push_bytes(ADD), 0);
    }

    #[test]
    fn stack_effects() {
        assert_eq!(info(ADD).pops, 2);
        assert_eq!(info(ADD).pushes, 1);
        assert_eq!(info(CALL).pops, 7);
        assert_eq!(info(DUP16).pops, 16);
        assert_eq!(info(DUP16).pushes, 17);
        assert_eq!(info(SWAP1).pops, 2);
        assert_eq!(info(SWAP1).pushes, 2);
        assert_eq!(info(LOG4).pops, 6);
    }

    #[test]
    fn undefined_bytes_are_invalid_but_known_invalid_is_defined() {
        assert!(!info(0xB0).known);
        assert_eq!(name(0xB0), "INVALID");
        assert!(info(INVALID).known);
        assert_eq!(name(INVALID), "INVALID");
    }

    #[test]
    fn terminators() {
        assert!(is_terminator(JUMP));
        assert!(is_terminator(JUMPI));
        assert!(is_terminator(STOP));
        assert!(is_terminator(RETURN));
        assert!(is_terminator(REVERT));
        assert!(is_terminator(SELFDESTRUCT));
        assert!(is_terminator(INVALID));
        assert!(is_terminator(0xB0)); // undefined byte
        assert!(!is_terminator(JUMPDEST));
        assert!(!is_terminator(ADD));
    }
}
