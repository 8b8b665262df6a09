//! Total decoding of raw bytecode into an instruction sequence.
//!
//! Decoding never fails: undefined opcode bytes become `INVALID`-mnemonic instructions and a
//! push immediate that runs past the end of the input is zero-padded and flagged. This keeps
//! offsets exact for every downstream consumer, no matter how malformed the input is — adversarial
//! bytecode is the expected common case, not an error path.
//!
//! # Example
//!
//! ```rust
//! use evmscope::disassembler::decode_stream;
//!
//! let code = [0x60, 0x2A, 0x60, 0x00, 0x55, 0x00]; // PUSH1 42, PUSH1 0, SSTORE, STOP
//! let instructions = decode_stream(&code);
//!
//! assert_eq!(instructions.len(), 4);
//! let total: usize = instructions.iter().map(|i| i.size).sum();
//! assert_eq!(total, code.len());
//! ```

use crate::disassembler::{opcode, Instruction};

/// Decodes the single instruction starting at `offset`.
///
/// The caller must ensure `offset < code.len()`; within bounds, decoding is total. A push whose
/// declared immediate extends past the end of the input consumes the remaining bytes, zero-pads
/// the immediate to its declared width and sets [`Instruction::truncated`].
///
/// # Arguments
///
/// * `code` - The full runtime bytecode
/// * `offset` - Byte position of the opcode to decode
///
/// # Panics
///
/// Panics if `offset` is out of bounds. Use [`decode_stream`] to decode whole inputs safely.
#[must_use]
pub fn decode_instruction(code: &[u8], offset: usize) -> Instruction {
    let op = code[offset];
    let declared = opcode::push_bytes(op);

    let (immediate, size, truncated) = if opcode::is_push(op) && op != opcode::PUSH0 {
        let available = declared.min(code.len() - offset - 1);
        let mut bytes = vec![0u8; declared];
        bytes[..available].copy_from_slice(&code[offset + 1..offset + 1 + available]);
        (Some(bytes), 1 + available, available < declared)
    } else {
        (None, 1, false)
    };

    Instruction {
        offset,
        opcode: op,
        mnemonic: opcode::name(op),
        immediate,
        size,
        truncated,
    }
}

/// Decodes an entire bytecode buffer into its instruction sequence.
///
/// Every byte position is covered by exactly one instruction; the sum of instruction sizes
/// equals `code.len()`. An empty input yields an empty sequence.
///
/// # Arguments
///
/// * `code` - The runtime bytecode to decode
#[must_use]
pub fn decode_stream(code: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(code.len() / 2);
    let mut offset = 0;

    while offset < code.len() {
        let instruction = decode_instruction(code, offset);
        offset += instruction.size;
        instructions.push(instruction);
    }

    instructions
}
