//! Function argument recovery.
//!
//! Starting from a function body's entry block, this pass tracks which calldata offsets are
//! loaded and how the loaded words are used. Masking against a contiguous low mask suggests an
//! unsigned integer (or an address at 160 bits), a contiguous high mask suggests fixed bytes,
//! `SIGNEXTEND` pins a signed width, a double `ISZERO` suggests a boolean, and arithmetic use
//! vetoes the boolean guess. Offsets never observed to be loaded are not reported.
//!
//! The heuristics are inherently best-effort: distinguishing `address` from `uint160` or a raw
//! `bytes32` from an untouched word is only as good as the evidence the bytecode provides.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::U256;

use crate::{
    analysis::{
        interp::{low_mask_bytes, AbstractStack, Interp, InterpBudget, StepOutcome, Visitor},
        BasicBlock, ControlFlowGraph,
    },
    disassembler::{opcode, Instruction},
    Result,
};

/// Calldata offsets past this bound are treated as noise rather than argument loads.
const MAX_ARG_OFFSET: u64 = 0x1_0000;

/// A best-effort ABI type guess for a recovered argument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AbiType {
    /// A 20-byte account address
    Address,
    /// A boolean flag
    Bool,
    /// An unsigned integer of the given bit width
    Uint(u16),
    /// A signed integer of the given bit width
    Int(u16),
    /// A fixed-size byte array of the given length
    FixedBytes(u8),
    /// A dynamic byte string
    Bytes,
    /// The argument was observed but no type evidence survived
    Unknown,
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Address => f.write_str("address"),
            AbiType::Bool => f.write_str("bool"),
            AbiType::Uint(bits) => write!(f, "uint{bits}"),
            AbiType::Int(bits) => write!(f, "int{bits}"),
            AbiType::FixedBytes(len) => write!(f, "bytes{len}"),
            AbiType::Bytes => f.write_str("bytes"),
            AbiType::Unknown => f.write_str("unknown"),
        }
    }
}

/// Maps an `AND` mask to the type it implies, if any.
///
/// A contiguous low mask of whole bytes implies an unsigned integer of that width — or an
/// address at exactly 160 bits. A contiguous high mask implies left-aligned fixed bytes.
fn mask_type(mask: U256) -> Option<AbiType> {
    if let Some(bytes) = low_mask_bytes(mask) {
        return Some(if bytes == 20 {
            AbiType::Address
        } else {
            AbiType::Uint(u16::from(bytes) * 8)
        });
    }

    // High mask: reverse the byte order and retest as a low mask.
    let mut bytes = mask.to_be_bytes::<32>();
    bytes.reverse();
    low_mask_bytes(U256::from_be_bytes(bytes)).map(AbiType::FixedBytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgTag {
    /// A value loaded from the argument area, keyed by its offset past the selector
    Arg { offset: u64 },
    /// The result of `ISZERO` on an argument value
    IsZero { offset: u64 },
}

#[derive(Debug, Default)]
struct Evidence {
    typed: Option<(AbiType, u8)>,
    not_bool: bool,
    used: bool,
}

#[derive(Debug, Default)]
struct ArgVisitor {
    evidence: BTreeMap<u64, Evidence>,
}

impl ArgVisitor {
    fn record_load(&mut self, offset: u64) {
        self.evidence.entry(offset).or_default();
    }

    fn set_type(&mut self, offset: u64, guess: AbiType, confidence: u8) {
        let entry = self.evidence.entry(offset).or_default();
        if guess == AbiType::Bool && entry.not_bool {
            return;
        }
        match &entry.typed {
            Some((_, existing)) if *existing >= confidence => {}
            _ => entry.typed = Some((guess, confidence)),
        }
    }

    fn mark_used(&mut self, offset: u64) {
        self.evidence.entry(offset).or_default().used = true;
    }

    fn mark_not_bool(&mut self, offset: u64) {
        let entry = self.evidence.entry(offset).or_default();
        entry.not_bool = true;
        entry.used = true;
        if matches!(entry.typed, Some((AbiType::Bool, _))) {
            entry.typed = None;
        }
    }

    fn finish(self) -> Vec<AbiType> {
        // Loads bucket into 32-byte argument slots; evidence within a slot merges with the
        // strongest guess winning.
        let mut slots: BTreeMap<u64, Evidence> = BTreeMap::new();
        for (offset, evidence) in self.evidence {
            let slot = slots.entry(offset / 32).or_default();
            slot.used |= evidence.used;
            slot.not_bool |= evidence.not_bool;
            match (&slot.typed, &evidence.typed) {
                (Some((_, a)), Some((_, b))) if *b > *a => slot.typed = evidence.typed,
                (None, Some(_)) => slot.typed = evidence.typed,
                _ => {}
            }
        }

        slots
            .into_values()
            .map(|evidence| match evidence.typed {
                Some((AbiType::Bool, _)) if evidence.not_bool => AbiType::Uint(256),
                Some((guess, _)) => guess,
                None if evidence.used => AbiType::Uint(256),
                None => AbiType::Unknown,
            })
            .collect()
    }
}

fn arg_offset(value: &crate::analysis::interp::Value<ArgTag>) -> Option<u64> {
    match &value.tag {
        Some(ArgTag::Arg { offset }) => Some(*offset),
        _ => None,
    }
}

impl Visitor<ArgTag> for ArgVisitor {
    fn visit(
        &mut self,
        instruction: &Instruction,
        outcome: &StepOutcome<ArgTag>,
        stack: &mut AbstractStack<ArgTag>,
    ) {
        match instruction.opcode {
            opcode::CALLDATALOAD => {
                let loaded = outcome.inputs[0]
                    .provenance
                    .as_const()
                    .and_then(|v| u64::try_from(v).ok())
                    .filter(|off| (4..MAX_ARG_OFFSET).contains(off));
                if let Some(off) = loaded {
                    let offset = off - 4;
                    self.record_load(offset);
                    if let Some(top) = stack.peek_mut() {
                        top.tag = Some(ArgTag::Arg { offset });
                    }
                }
            }

            opcode::CALLDATACOPY => {
                // inputs: [dest, source offset, length]
                if let Some(offset) = arg_offset(&outcome.inputs[1]) {
                    self.set_type(offset, AbiType::Bytes, 10);
                } else if let Some(off) = outcome.inputs[1]
                    .provenance
                    .as_const()
                    .and_then(|v| u64::try_from(v).ok())
                    .filter(|off| (4..MAX_ARG_OFFSET).contains(off))
                {
                    self.record_load(off - 4);
                    self.mark_used(off - 4);
                }
            }

            opcode::AND => {
                for (idx, input) in outcome.inputs.iter().enumerate() {
                    if let Some(offset) = arg_offset(input) {
                        let other = &outcome.inputs[1 - idx];
                        if let Some(mask) = other.provenance.as_const() {
                            self.mark_used(offset);
                            if let Some(guess) = mask_type(mask) {
                                self.set_type(offset, guess, 5);
                            }
                            // The masked value still is the argument; keep tracking it.
                            if let Some(top) = stack.peek_mut() {
                                top.tag = Some(ArgTag::Arg { offset });
                            }
                        }
                    }
                }
            }

            opcode::SIGNEXTEND => {
                // inputs: [byte index, value]
                if let Some(offset) = arg_offset(&outcome.inputs[1]) {
                    self.mark_not_bool(offset);
                    if let Some(byte) = outcome.inputs[0]
                        .provenance
                        .as_const()
                        .and_then(|v| u8::try_from(v).ok())
                        .filter(|b| *b < 32)
                    {
                        self.set_type(offset, AbiType::Int((u16::from(byte) + 1) * 8), 20);
                    }
                }
            }

            opcode::BYTE => {
                if let Some(offset) = arg_offset(&outcome.inputs[1]) {
                    self.set_type(offset, AbiType::FixedBytes(32), 4);
                }
            }

            opcode::ISZERO => match &outcome.inputs[0].tag {
                Some(ArgTag::Arg { offset }) => {
                    let offset = *offset;
                    self.mark_used(offset);
                    if let Some(top) = stack.peek_mut() {
                        top.tag = Some(ArgTag::IsZero { offset });
                    }
                }
                Some(ArgTag::IsZero { offset }) => {
                    self.set_type(*offset, AbiType::Bool, 5);
                }
                None => {}
            },

            opcode::ADD
            | opcode::SUB
            | opcode::MUL
            | opcode::DIV
            | opcode::SDIV
            | opcode::MOD
            | opcode::SMOD
            | opcode::EXP
            | opcode::LT
            | opcode::GT
            | opcode::SLT
            | opcode::SGT
            | opcode::SHL
            | opcode::SHR
            | opcode::SAR => {
                for input in &outcome.inputs {
                    if let Some(offset) = arg_offset(input) {
                        self.mark_not_bool(offset);
                    }
                }
            }

            opcode::EQ | opcode::MSTORE | opcode::SSTORE | opcode::KECCAK256 => {
                for input in &outcome.inputs {
                    if let Some(offset) = arg_offset(input) {
                        self.mark_used(offset);
                    }
                }
            }

            _ => {}
        }
    }
}

/// Infers the argument types of the function body entered at `entry`.
///
/// The returned list is ordered by calldata offset, one entry per 32-byte argument slot that
/// was observed to be loaded. A budget-limited walk yields the (possibly partial) evidence
/// gathered so far.
///
/// # Arguments
///
/// * `instructions` - The decoded instruction stream
/// * `blocks` - The basic blocks partitioning `instructions`
/// * `cfg` - The control flow graph over `blocks`
/// * `entry` - Byte offset of the function body's entry block
/// * `budget` - Interpreter budget for the walk
///
/// # Errors
///
/// Returns [`crate::Error::BudgetExceeded`] for a zero-step budget.
pub fn infer_arguments(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    cfg: &ControlFlowGraph,
    entry: usize,
    budget: &InterpBudget,
) -> Result<Vec<AbiType>> {
    let interp = Interp::new(instructions, blocks, cfg);
    let mut visitor = ArgVisitor::default();
    interp.explore(entry, budget, &mut visitor)?;
    Ok(visitor.finish())
}
