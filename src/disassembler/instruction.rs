//! The decoded instruction value type.

use std::fmt;

use alloy_primitives::{hex, U256};

use crate::disassembler::opcode;

/// A single decoded EVM instruction.
///
/// Instances are produced by [`crate::disassembler::decode_stream`] and are immutable once
/// decoded. Every byte position in the input yields exactly one instruction — undefined opcode
/// bytes decode to an `INVALID`-mnemonic instruction rather than failing — so concatenating
/// [`size`](Instruction::size) over a decoded stream always reconstructs the input length.
///
/// # Examples
///
/// ```rust
/// use evmscope::disassembler::decode_stream;
///
/// let code = [0x60, 0x80, 0x50]; // PUSH1 0x80, POP
/// let instructions = decode_stream(&code);
///
/// assert_eq!(instructions.len(), 2);
/// assert_eq!(instructions[0].mnemonic, "PUSH1");
/// assert_eq!(instructions[0].size, 2);
/// assert_eq!(instructions[1].offset, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Instruction {
    /// Byte offset of the opcode within the bytecode
    pub offset: usize,
    /// The raw opcode byte
    pub opcode: u8,
    /// Uppercase mnemonic (`INVALID` for bytes outside the instruction set)
    pub mnemonic: &'static str,
    /// Immediate operand bytes, present only for `PUSH1`..`PUSH32`.
    ///
    /// Always the declared width of the push. When the push runs past the end of the bytecode
    /// the missing trailing bytes are zero — the EVM treats code beyond the end as zeros — and
    /// [`truncated`](Instruction::truncated) is set.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub immediate: Option<Vec<u8>>,
    /// Number of input bytes this instruction actually occupies.
    ///
    /// Equal to `1 + immediate length` except for a truncated trailing push, where only the
    /// bytes physically present are counted so that decoded sizes still sum to the input length.
    pub size: usize,
    /// Set when a push immediate was cut short by the end of the bytecode
    pub truncated: bool,
}

impl Instruction {
    /// Returns the value a push-family instruction places on the stack.
    ///
    /// `PUSH0` yields zero; `PUSH1`..`PUSH32` yield their (zero-padded) immediate interpreted
    /// as a big-endian integer. Non-push instructions yield `None`.
    #[must_use]
    pub fn pushed_value(&self) -> Option<U256> {
        if !opcode::is_push(self.opcode) {
            return None;
        }
        match &self.immediate {
            Some(bytes) => Some(U256::from_be_slice(bytes)),
            None => Some(U256::ZERO),
        }
    }

    /// Returns `true` when this instruction ends a basic block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        opcode::is_terminator(self.opcode)
    }

    /// Returns `true` for the designated `INVALID` instruction and any undefined opcode byte.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.opcode == opcode::INVALID || !opcode::info(self.opcode).known
    }
}

impl fmt::Display for Instruction {
    /// Renders the listing form of the instruction: `MNEMONIC` or `MNEMONIC <hex immediate>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.immediate {
            Some(bytes) if !bytes.is_empty() => {
                write!(f, "{} {}", self.mnemonic, hex::encode(bytes))
            }
            _ => f.write_str(self.mnemonic),
        }
    }
}
