//! Basic block construction.
//!
//! Blocks are recovered from syntax alone: a new block opens at offset zero and at every
//! `JUMPDEST`, and the current block closes after any terminator instruction. Reachability plays
//! no part — unreachable code still forms blocks — so the resulting sequence is a total,
//! non-overlapping cover of the instruction stream.

use std::ops::Range;

use crate::disassembler::{opcode, Instruction};

/// How control leaves a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Terminator {
    /// Execution continues into the following block (the next instruction is a `JUMPDEST`, or
    /// the bytecode simply ends)
    FallThrough,
    /// The block ends with an unconditional `JUMP`
    Jump,
    /// The block ends with a conditional `JUMPI`
    ConditionalJump,
    /// The block ends with `STOP`, `RETURN`, `REVERT` or `SELFDESTRUCT`
    Halt,
    /// The block ends with the designated `INVALID` instruction or an undefined opcode byte
    Invalid,
}

/// A maximal straight-line run of instructions with a single entry and a single exit.
///
/// Blocks partition the decoded instruction stream: every instruction belongs to exactly one
/// block, blocks are ordered by offset, and every `JUMPDEST` position is a block start.
///
/// # Examples
///
/// ```rust
/// use evmscope::analysis::build_blocks;
/// use evmscope::disassembler::decode_stream;
///
/// let code = [0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]; // PUSH1 4, JUMP, STOP, JUMPDEST, STOP
/// let instructions = decode_stream(&code);
/// let blocks = build_blocks(&instructions);
///
/// assert_eq!(blocks.len(), 3);
/// assert_eq!(blocks[2].start, 4); // the JUMPDEST opens a block
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BasicBlock {
    /// Byte offset of the block's first instruction
    pub start: usize,
    /// Byte offset one past the block's last instruction (exclusive)
    pub end: usize,
    /// Indices into the decoded instruction sequence this block covers
    pub instructions: Range<usize>,
    /// How control leaves this block
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Returns the instructions of this block as a slice of the decoded stream it was built
    /// from.
    ///
    /// # Arguments
    ///
    /// * `stream` - The instruction sequence passed to [`build_blocks`]
    #[must_use]
    pub fn instructions<'a>(&self, stream: &'a [Instruction]) -> &'a [Instruction] {
        &stream[self.instructions.clone()]
    }

    /// Returns `true` when the block begins with a `JUMPDEST` and is therefore a legal jump
    /// target.
    ///
    /// # Arguments
    ///
    /// * `stream` - The instruction sequence passed to [`build_blocks`]
    #[must_use]
    pub fn is_jump_target(&self, stream: &[Instruction]) -> bool {
        stream
            .get(self.instructions.start)
            .is_some_and(|i| i.opcode == opcode::JUMPDEST)
    }
}

fn terminator_of(instruction: &Instruction) -> Terminator {
    match instruction.opcode {
        opcode::JUMP => Terminator::Jump,
        opcode::JUMPI => Terminator::ConditionalJump,
        opcode::STOP | opcode::RETURN | opcode::REVERT | opcode::SELFDESTRUCT => Terminator::Halt,
        _ => Terminator::Invalid,
    }
}

/// Partitions a decoded instruction sequence into basic blocks.
///
/// The partition is syntactic and total: a block opens at the first instruction and after every
/// terminator, a `JUMPDEST` always opens a block (closing the previous one as
/// [`Terminator::FallThrough`]), and the trailing block is closed by the end of the stream.
/// An empty instruction sequence yields no blocks.
///
/// # Arguments
///
/// * `instructions` - The decoded instruction sequence, ordered by offset
#[must_use]
pub fn build_blocks(instructions: &[Instruction]) -> Vec<BasicBlock> {
    let mut blocks = Vec::new();
    let mut first = 0;

    for (idx, instruction) in instructions.iter().enumerate() {
        if instruction.opcode == opcode::JUMPDEST && idx > first {
            blocks.push(make_block(instructions, first..idx, Terminator::FallThrough));
            first = idx;
        }

        if instruction.is_terminator() {
            blocks.push(make_block(
                instructions,
                first..idx + 1,
                terminator_of(instruction),
            ));
            first = idx + 1;
        }
    }

    if first < instructions.len() {
        blocks.push(make_block(
            instructions,
            first..instructions.len(),
            Terminator::FallThrough,
        ));
    }

    blocks
}

fn make_block(instructions: &[Instruction], range: Range<usize>, terminator: Terminator) -> BasicBlock {
    let first = &instructions[range.start];
    let last = &instructions[range.end - 1];
    BasicBlock {
        start: first.offset,
        end: last.offset + last.size,
        instructions: range,
        terminator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::decode_stream;

    fn blocks_of(code: &[u8]) -> (Vec<Instruction>, Vec<BasicBlock>) {
        let instructions = decode_stream(code);
        let blocks = build_blocks(&instructions);
        (instructions, blocks)
    }

    #[test]
    fn single_linear_block() {
        let (_, blocks) = blocks_of(&[0x60, 0x01, 0x60, 0x02, 0x01, 0x00]); // PUSH1 1, PUSH1 2, ADD, STOP

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].end, 6);
        assert_eq!(blocks[0].terminator, Terminator::Halt);
    }

    #[test]
    fn jumpdest_opens_block() {
        // PUSH1 0, JUMPDEST, STOP — the JUMPDEST splits the straight line
        let (stream, blocks) = blocks_of(&[0x60, 0x00, 0x5B, 0x00]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].terminator, Terminator::FallThrough);
        assert_eq!(blocks[0].end, 2);
        assert_eq!(blocks[1].start, 2);
        assert!(blocks[1].is_jump_target(&stream));
    }

    #[test]
    fn terminators_close_blocks() {
        // JUMP, JUMPI, REVERT, INVALID each close a block; trailing code forms its own
        let (_, blocks) = blocks_of(&[
            0x60, 0x08, 0x56, // PUSH1 8, JUMP
            0x60, 0x00, 0x60, 0x08, 0x57, // PUSH1 0, PUSH1 8, JUMPI
            0x5B, 0xFD, // JUMPDEST, REVERT
            0xFE, // INVALID
            0x01, // trailing ADD, unreachable but still a block
        ]);

        let terminators: Vec<_> = blocks.iter().map(|b| b.terminator).collect();
        assert_eq!(
            terminators,
            vec![
                Terminator::Jump,
                Terminator::ConditionalJump,
                Terminator::Halt,
                Terminator::Invalid,
                Terminator::FallThrough,
            ]
        );
    }

    #[test]
    fn partition_has_no_gaps_or_overlaps() {
        let code: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let (stream, blocks) = blocks_of(&code);

        let mut next_offset = 0;
        let mut next_index = 0;
        for block in &blocks {
            assert_eq!(block.start, next_offset);
            assert_eq!(block.instructions.start, next_index);
            assert!(block.end > block.start);
            next_offset = block.end;
            next_index = block.instructions.end;
        }
        assert_eq!(next_offset, code.len());
        assert_eq!(next_index, stream.len());
    }

    #[test]
    fn every_jumpdest_is_a_block_start() {
        let (stream, blocks) = blocks_of(&[0x5B, 0x01, 0x5B, 0x5B, 0x00]);

        let starts: Vec<_> = blocks.iter().map(|b| b.start).collect();
        for instruction in &stream {
            if instruction.opcode == opcode::JUMPDEST {
                assert!(starts.contains(&instruction.offset));
            }
        }
    }

    #[test]
    fn undefined_opcode_terminates_as_invalid() {
        let (_, blocks) = blocks_of(&[0x01, 0xB0, 0x01]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].terminator, Terminator::Invalid);
        assert_eq!(blocks[1].terminator, Terminator::FallThrough);
    }

    #[test]
    fn empty_stream_yields_no_blocks() {
        let (_, blocks) = blocks_of(&[]);
        assert!(blocks.is_empty());
    }
}
