//! EVM instruction decoding and disassembly.
//!
//! This module turns raw runtime bytecode into a structured instruction sequence. Decoding is
//! total: every byte position yields exactly one [`Instruction`], undefined opcodes included, and
//! instruction sizes always sum back to the input length. Control flow recovery and all inference
//! passes build on this sequence.
//!
//! # Key Types
//! - [`Instruction`] - A decoded EVM instruction (offset, opcode, immediate, size)
//! - [`opcode::OpInfo`] - Static per-opcode decode and stack-effect information
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction at a byte offset
//! - [`decode_stream`] - Decode an entire bytecode buffer
//!
//! # Example
//! ```rust
//! use evmscope::disassembler::decode_stream;
//!
//! let code = [0x60, 0x80, 0x60, 0x40, 0x52]; // PUSH1 80, PUSH1 40, MSTORE
//! for instruction in decode_stream(&code) {
//!     println!("{:04x}: {}", instruction.offset, instruction);
//! }
//! ```

mod decoder;
mod instruction;
pub mod opcode;

pub use decoder::{decode_instruction, decode_stream};
pub use instruction::Instruction;
