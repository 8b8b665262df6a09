//! Control flow graph construction.
//!
//! Each block's outgoing edges are resolved independently: the block is re-interpreted from its
//! entry with the abstract stack interpreter, and a `JUMP`/`JUMPI` whose target operand comes out
//! as a known constant produces an edge — if the target is a legal jump destination. Targets that
//! stay symbolic are marked unresolved, and constant targets that do not land on a `JUMPDEST`
//! block start drop the edge and mark the block as carrying an invalid jump. Neither case is an
//! error; analysis continues around them.
//!
//! Per-block resolution is independent work, so blocks are resolved in parallel.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use rayon::prelude::*;

use crate::{
    analysis::{interp, BasicBlock, Terminator},
    disassembler::Instruction,
    Result,
};

/// Outgoing edges of a single basic block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BlockEdges {
    /// Successor block start offsets.
    ///
    /// At most two entries. For a conditional jump the fallthrough (condition false) successor
    /// comes first and the jump target (condition true) second, when both are present.
    pub successors: Vec<usize>,
    /// A computed jump target could not be resolved to a constant
    pub unresolved: bool,
    /// A jump target resolved to a constant that is not a legal jump destination; the edge was
    /// dropped
    pub invalid_jump: bool,
}

/// The control flow graph of a contract.
///
/// Maps every block start offset to its [`BlockEdges`]. The graph may be cyclic and is not
/// guaranteed to be connected — unreachable blocks are present with whatever edges their syntax
/// yields.
///
/// # Examples
///
/// ```rust
/// use evmscope::analysis::{build_blocks, build_cfg};
/// use evmscope::disassembler::decode_stream;
///
/// let code = [0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]; // PUSH1 4, JUMP, STOP, JUMPDEST, STOP
/// let instructions = decode_stream(&code);
/// let blocks = build_blocks(&instructions);
/// let cfg = build_cfg(&instructions, &blocks)?;
///
/// assert_eq!(cfg.successors(0), &[4]);
/// # Ok::<(), evmscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ControlFlowGraph {
    /// Start offset of the entry block (always 0 for non-empty bytecode)
    pub entry: usize,
    /// Outgoing edges keyed by block start offset
    pub edges: BTreeMap<usize, BlockEdges>,
}

impl ControlFlowGraph {
    /// Successor block start offsets of the block starting at `start`.
    ///
    /// Unknown offsets yield an empty slice.
    #[must_use]
    pub fn successors(&self, start: usize) -> &[usize] {
        self.edges
            .get(&start)
            .map_or(&[], |edges| edges.successors.as_slice())
    }

    /// Number of blocks in the graph.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.edges.len()
    }

    /// Generates a Graphviz DOT rendering of the graph.
    ///
    /// Blocks are boxes labeled with their offset range; the entry block is highlighted and
    /// blocks with unresolved or invalid jumps are annotated. Render with `dot -Tsvg`.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional graph title
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", name.replace('"', "\\\""));
            dot.push_str("    labelloc=t;\n");
        }
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for (start, edges) in &self.edges {
            let mut label = format!("0x{start:04x}");
            if edges.unresolved {
                label.push_str("\\n(unresolved jump)");
            }
            if edges.invalid_jump {
                label.push_str("\\n(invalid jump)");
            }
            let style = if *start == self.entry {
                ", style=filled, fillcolor=lightgreen"
            } else {
                ""
            };
            let _ = writeln!(dot, "    b{start} [label=\"{label}\"{style}];");
        }

        dot.push('\n');
        for (start, edges) in &self.edges {
            for target in &edges.successors {
                let _ = writeln!(dot, "    b{start} -> b{target};");
            }
        }

        dot.push_str("}\n");
        dot
    }
}

/// Resolves the exit of one block by re-interpreting it from an empty entry state.
fn resolve_block(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    jump_targets: &BTreeSet<usize>,
    idx: usize,
) -> BlockEdges {
    let block = &blocks[idx];
    let mut edges = BlockEdges::default();

    let fallthrough = blocks.get(idx + 1).map(|next| next.start);

    match block.terminator {
        Terminator::Halt | Terminator::Invalid => {}
        Terminator::FallThrough => {
            if let Some(next) = fallthrough {
                edges.successors.push(next);
            }
        }
        Terminator::Jump | Terminator::ConditionalJump => {
            if block.terminator == Terminator::ConditionalJump {
                if let Some(next) = fallthrough {
                    edges.successors.push(next);
                }
            }

            let mut stack: interp::AbstractStack<()> = interp::AbstractStack::new();
            let mut target = None;
            for instruction in block.instructions(instructions) {
                let outcome = interp::step(instruction, &mut stack);
                if instruction.is_terminator() {
                    target = outcome.inputs.first().map(|v| v.provenance.clone());
                }
            }

            match target.and_then(|p| p.as_const()).map(usize::try_from) {
                Some(Ok(offset)) if jump_targets.contains(&offset) => {
                    edges.successors.push(offset);
                }
                Some(_) => edges.invalid_jump = true,
                None => edges.unresolved = true,
            }
        }
    }

    edges
}

/// Builds the control flow graph for a partitioned contract.
///
/// Fallthrough edges follow block order; jump edges come from per-block abstract
/// interpretation as described in the module docs. Blocks whose computed target cannot be
/// resolved keep an unresolved marker instead of an edge.
///
/// # Arguments
///
/// * `instructions` - The decoded instruction stream
/// * `blocks` - The basic blocks partitioning `instructions`
///
/// # Errors
///
/// Returns [`crate::Error::InvariantViolation`] if a constructed edge points outside the block
/// set — an engine bug, not an input property.
pub fn build_cfg(instructions: &[Instruction], blocks: &[BasicBlock]) -> Result<ControlFlowGraph> {
    // Legal jump targets: block starts whose first instruction is a JUMPDEST.
    let jump_targets: BTreeSet<usize> = blocks
        .iter()
        .filter(|block| block.is_jump_target(instructions))
        .map(|block| block.start)
        .collect();

    let resolved: Vec<(usize, BlockEdges)> = blocks
        .par_iter()
        .enumerate()
        .map(|(idx, block)| {
            (
                block.start,
                resolve_block(instructions, blocks, &jump_targets, idx),
            )
        })
        .collect();

    let edges: BTreeMap<usize, BlockEdges> = resolved.into_iter().collect();

    for (start, block_edges) in &edges {
        for target in &block_edges.successors {
            if !edges.contains_key(target) {
                return Err(invariant_error!(
                    "edge {} -> {} points outside the block set",
                    start,
                    target
                ));
            }
        }
    }

    Ok(ControlFlowGraph { entry: 0, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_blocks;
    use crate::disassembler::decode_stream;

    fn cfg_of(code: &[u8]) -> ControlFlowGraph {
        let instructions = decode_stream(code);
        let blocks = build_blocks(&instructions);
        build_cfg(&instructions, &blocks).unwrap()
    }

    #[test]
    fn static_jump_resolves() {
        // PUSH1 4, JUMP | STOP | JUMPDEST, STOP
        let cfg = cfg_of(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);

        assert_eq!(cfg.successors(0), &[4]);
        let edges = &cfg.edges[&0];
        assert!(!edges.unresolved);
        assert!(!edges.invalid_jump);
        assert!(cfg.successors(3).is_empty()); // the STOP block
        assert!(cfg.successors(4).is_empty());
    }

    #[test]
    fn conditional_jump_has_fallthrough_then_target() {
        // PUSH1 1, PUSH1 8, JUMPI | PUSH1 0, STOP | JUMPDEST, STOP
        let cfg = cfg_of(&[0x60, 0x01, 0x60, 0x08, 0x57, 0x60, 0x00, 0x00, 0x5B, 0x00]);

        assert_eq!(cfg.successors(0), &[5, 8]);
    }

    #[test]
    fn jump_to_non_jumpdest_is_invalid() {
        // PUSH1 4, JUMP | STOP | STOP (offset 4 is not a JUMPDEST)
        let cfg = cfg_of(&[0x60, 0x04, 0x56, 0x00, 0x00]);

        let edges = &cfg.edges[&0];
        assert!(edges.successors.is_empty());
        assert!(edges.invalid_jump);
        assert!(!edges.unresolved);
    }

    #[test]
    fn computed_jump_is_unresolved() {
        // CALLDATALOAD-derived target: PUSH0, CALLDATALOAD, JUMP | JUMPDEST, STOP
        let cfg = cfg_of(&[0x5F, 0x35, 0x56, 0x5B, 0x00]);

        let edges = &cfg.edges[&0];
        assert!(edges.successors.is_empty());
        assert!(edges.unresolved);
        assert!(!edges.invalid_jump);
    }

    #[test]
    fn fallthrough_into_jumpdest_block() {
        // PUSH1 1, POP | JUMPDEST, STOP
        let cfg = cfg_of(&[0x60, 0x01, 0x50, 0x5B, 0x00]);

        assert_eq!(cfg.successors(0), &[3]);
    }

    #[test]
    fn every_edge_targets_a_block_in_the_graph() {
        let code: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let cfg = cfg_of(&code);

        for edges in cfg.edges.values() {
            for target in &edges.successors {
                assert!(cfg.edges.contains_key(target));
            }
        }
    }

    #[test]
    fn loops_are_representable() {
        // JUMPDEST, PUSH1 0, JUMP — a self-loop
        let cfg = cfg_of(&[0x5B, 0x60, 0x00, 0x56]);

        assert_eq!(cfg.successors(0), &[0]);
    }

    #[test]
    fn dot_rendering_mentions_blocks() {
        let cfg = cfg_of(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
        let dot = cfg.to_dot(Some("test"));

        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("b0 -> b4;"));
    }
}
