//! # evmscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and functions
//! from the evmscope library. Import this module to get quick access to the essential types
//! for EVM bytecode analysis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all evmscope operations
pub use crate::Error;

/// The result type used throughout evmscope
pub use crate::Result;

// ================================================================================================
// Main Entry Point
// ================================================================================================

/// The single analysis entry point
pub use crate::analyze;

/// Pass toggles and interpreter budget for one analysis call
pub use crate::{AnalysisOptions, Passes};

/// The aggregate analysis result and its parts
pub use crate::{ContractInfo, FunctionInfo, StorageSlot};

// ================================================================================================
// ABI-Level Types
// ================================================================================================

/// A 4-byte public function selector
pub use crate::Selector;

/// Best-effort ABI type guesses for arguments and storage variables
pub use crate::AbiType;

/// Function state mutability classification
pub use crate::StateMutability;

// ================================================================================================
// Disassembly and Structure
// ================================================================================================

/// A decoded EVM instruction
pub use crate::disassembler::Instruction;

/// Decoding entry points
pub use crate::disassembler::{decode_instruction, decode_stream};

/// The basic block partition and its terminator kinds
pub use crate::analysis::{BasicBlock, Terminator};

/// The control flow graph
pub use crate::analysis::{BlockEdges, ControlFlowGraph};

/// Structure construction entry points
pub use crate::analysis::{build_blocks, build_cfg};
