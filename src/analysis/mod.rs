//! Structural recovery: basic blocks, control flow and abstract interpretation.
//!
//! This module rebuilds the structure an EVM contract's bytecode only implies. Basic blocks are
//! recovered syntactically, the control flow graph resolves jump targets through per-block
//! abstract interpretation, and the [`interp`] submodule provides the shared symbolic
//! interpreter every inference pass is built on.
//!
//! # Key Types
//! - [`BasicBlock`] / [`Terminator`] - Straight-line instruction runs and how they exit
//! - [`ControlFlowGraph`] / [`BlockEdges`] - Block-level successor edges with unresolved and
//!   invalid-jump markers
//! - [`interp::Provenance`] - Symbolic origin of a stack value
//! - [`interp::Interp`] - Budgeted, merging walker over the CFG
//!
//! # Main Functions
//! - [`build_blocks`] - Partition an instruction stream into basic blocks
//! - [`build_cfg`] - Link blocks into a control flow graph

mod block;
mod cfg;
pub mod interp;

pub use block::{build_blocks, BasicBlock, Terminator};
pub use cfg::{build_cfg, BlockEdges, ControlFlowGraph};
