// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # evmscope
//!
//! [![Crates.io](https://img.shields.io/crates/v/evmscope.svg)](https://crates.io/crates/evmscope)
//! [![Documentation](https://docs.rs/evmscope/badge.svg)](https://docs.rs/evmscope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/evmscope/blob/main/LICENSE-APACHE)
//!
//! A static analysis framework for EVM bytecode. Built in pure Rust, `evmscope` disassembles
//! deployed contract bytecode, reconstructs its control flow, and recovers ABI-level facts —
//! public function selectors, argument types, state mutability, storage layout — without
//! executing a single instruction and without needing source code or metadata.
//!
//! ## Features
//!
//! - **🔍 Total disassembly** - Every byte decodes, including invalid opcodes and truncated
//!   push data; offsets stay exact on arbitrarily malformed input
//! - **🧭 Control flow recovery** - Basic blocks, jump resolution through abstract
//!   interpretation, and a queryable control flow graph with Graphviz export
//! - **🧮 Abstract interpretation** - A budgeted symbolic stack interpreter shared by all
//!   passes, guaranteed to terminate on adversarial (maliciously looping) bytecode
//! - **🗂️ ABI recovery** - Function selectors, argument type guesses, `pure`/`view`/
//!   `nonpayable`/`payable` classification, and packed storage slot layout
//! - **⚡ Parallel passes** - Per-function and per-site walks fan out across cores with
//!   deterministic results
//! - **🛡️ Robust by design** - Malformed bytecode is data, not an error; only input-shape
//!   problems and internal bugs ever fail
//!
//! ## Quick Start
//!
//! Add `evmscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! evmscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use evmscope::prelude::*;
//!
//! // PUSH1 0x2A, PUSH1 0x00, SSTORE, STOP
//! let code = [0x60, 0x2A, 0x60, 0x00, 0x55, 0x00];
//! let info = analyze(&code, &AnalysisOptions::new().with_storage_layout())?;
//! println!("{} storage slots", info.storage.unwrap().len());
//! # Ok::<(), evmscope::Error>(())
//! ```
//!
//! ### Selecting Analyses
//!
//! The engine computes exactly what the options request; everything else stays absent in the
//! result:
//!
//! ```rust
//! use evmscope::{analyze, AnalysisOptions};
//!
//! let code = [0x60, 0x00, 0x60, 0x00, 0x52, 0x00];
//! let info = analyze(
//!     &code,
//!     &AnalysisOptions::new()
//!         .with_selectors()
//!         .with_state_mutability()
//!         .with_control_flow_graph(),
//! )?;
//!
//! assert!(info.functions.is_some());
//! assert!(info.control_flow_graph.is_some());
//! assert!(info.storage.is_none()); // not requested
//! # Ok::<(), evmscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `evmscope` is organized into three layers, each consuming the one below:
//!
//! - [`disassembler`] - Byte sequence → instruction sequence (total decoding)
//! - [`analysis`] - Instructions → basic blocks → control flow graph, plus the abstract stack
//!   interpreter the inference layer is built on
//! - [`inference`] - Selector/argument/mutability/storage recovery over the finished graph
//!
//! [`analyze`] drives the layers per the requested [`AnalysisOptions`] and assembles the
//! [`ContractInfo`] result. The engine is a pure computation: no I/O, no global state, and
//! independent invocations may run concurrently.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Malformed bytecode is never an error —
//! undefined opcodes, unresolvable jumps and hash-derived storage slots degrade to absent or
//! partial data, because adversarial input is the expected common case:
//!
//! ```rust
//! use evmscope::{analyze, AnalysisOptions, Error};
//!
//! match analyze(&[], &AnalysisOptions::new().with_selectors()) {
//!     Err(Error::Empty) => println!("no bytecode provided"),
//!     Err(Error::OversizedInput { size }) => println!("{size} bytes is not runtime code"),
//!     Err(e) => println!("error: {e}"),
//!     Ok(info) => println!("{:?}", info.functions),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use evmscope::prelude::*;
///
/// let code = [0x60, 0x00, 0x00];
/// let info = analyze(&code, &AnalysisOptions::new().with_selectors())?;
/// # Ok::<(), evmscope::Error>(())
/// ```
pub mod prelude;

/// Instruction decoding and disassembly for the EVM instruction set.
///
/// Decoding is total: every byte position yields exactly one instruction, undefined opcodes
/// included, and instruction sizes always sum back to the input length.
///
/// # Key Types
///
/// - [`disassembler::Instruction`] - A decoded instruction with offset, immediate and size
/// - [`disassembler::opcode::OpInfo`] - The fixed per-opcode information table entry
///
/// # Main Functions
///
/// - [`disassembler::decode_stream`] - Decode an entire bytecode buffer
/// - [`disassembler::decode_instruction`] - Decode a single instruction
pub mod disassembler;

/// Structural recovery: basic blocks, control flow and the abstract stack interpreter.
///
/// # Key Types
///
/// - [`analysis::BasicBlock`] / [`analysis::Terminator`] - The block partition
/// - [`analysis::ControlFlowGraph`] - Block-level successor edges with unresolved markers
/// - [`analysis::interp::Interp`] - The budgeted, merging CFG walker shared by all passes
///
/// # Main Functions
///
/// - [`analysis::build_blocks`] - Partition an instruction stream
/// - [`analysis::build_cfg`] - Link blocks into a control flow graph
pub mod analysis;

/// ABI-level inference passes over the finished control flow graph.
///
/// # Key Types
///
/// - [`inference::AbiType`] - Best-effort argument/storage type guesses
/// - [`inference::StateMutability`] - `pure`/`view`/`nonpayable`/`payable`
/// - [`inference::StorageSlot`] - A recovered (possibly packed) storage variable
///
/// # Main Functions
///
/// - [`inference::recover_dispatch`] - Selector and fallback recovery
/// - [`inference::infer_arguments`] - Argument typing for one function
/// - [`inference::infer_state_mutability`] - Mutability classification for one function
/// - [`inference::recover_storage`] - Whole-contract storage layout
pub mod inference;

mod contract;

/// `evmscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `evmscope` Error type
///
/// The main error type for all operations in this crate. Only input-shape problems and
/// internal engine bugs are errors; bytecode-content anomalies degrade to partial data.
pub use error::Error;

pub use contract::{analyze, AnalysisOptions, ContractInfo, FunctionInfo, Passes, MAX_CODE_SIZE};

pub use inference::{AbiType, Selector, StateMutability, StorageSlot};
