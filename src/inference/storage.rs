//! Storage layout recovery.
//!
//! Every block containing a storage access is re-interpreted locally and each `SSTORE`/`SLOAD`
//! site contributes a layout record when its slot operand resolves to a constant. Packed
//! variables are recognized from the masking idiom that surrounds sub-slot writes — load the
//! slot, clear the field's byte range with an inverted mask, `OR` in the new value, store — and
//! from the shift-then-mask idiom on reads. Sites whose slot index stays symbolic (mapping and
//! array slots derived from hashes) are skipped; that is the expected outcome for them, not a
//! failure.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use rayon::prelude::*;

use crate::{
    analysis::{
        interp::{low_mask_bytes, step, AbstractStack, InterpBudget, Provenance},
        BasicBlock, ControlFlowGraph,
    },
    disassembler::{opcode, Instruction},
    inference::AbiType,
    Result,
};

/// A recovered storage variable location.
///
/// Multiple records may share a slot index when variables are packed; they then differ in
/// `offset`. Offsets count bytes from the least significant end of the 32-byte slot, matching
/// how compilers pack variables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StorageSlot {
    /// The storage slot index
    pub slot: U256,
    /// Byte offset of the variable within the slot (from the least significant byte)
    pub offset: u8,
    /// Size of the variable in bytes
    pub size: u8,
    /// Best-effort type guess derived from size and value provenance
    pub type_guess: AbiType,
}

/// Pass-local annotations on values flowing out of storage loads.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreTag {
    /// The raw result of `SLOAD slot`
    Loaded { slot: U256 },
    /// `Loaded` shifted right by a whole number of bytes (a packed read in progress)
    Shifted { slot: U256, offset: u8 },
    /// `Loaded` with one byte range cleared (a packed write in progress)
    Cleared { slot: U256, mask: U256 },
    /// A cleared slot value with the new field `OR`ed in
    Packed { slot: U256, mask: U256 },
}

/// Decomposes an inverted field mask: a mask that is all ones except for one contiguous,
/// byte-aligned run of zeros yields that run as `(offset, size)`.
fn hole_range(mask: U256) -> Option<(u8, u8)> {
    let inv = !mask;
    if inv.is_zero() {
        return None;
    }
    let shift = inv.trailing_zeros();
    if shift % 8 != 0 {
        return None;
    }
    let size = low_mask_bytes(inv >> shift)?;
    let offset = u8::try_from(shift / 8).ok()?;
    Some((offset, size))
}

fn guess_for(size: u8, value: Option<&Provenance>) -> AbiType {
    match size {
        20 => AbiType::Address,
        1 => AbiType::Bool,
        32 => match value {
            Some(Provenance::CallData { width: 20, .. }) => AbiType::Address,
            _ => AbiType::Uint(256),
        },
        _ => AbiType::Uint(u16::from(size) * 8),
    }
}

#[derive(Debug, Clone)]
struct SiteRecord {
    slot: U256,
    offset: u8,
    size: u8,
    type_guess: AbiType,
    from_write: bool,
}

/// Interprets one block from an empty entry state, collecting the storage access records its
/// sites yield.
fn walk_block(
    instructions: &[Instruction],
    block: &BasicBlock,
    records: &mut Vec<SiteRecord>,
) {
    let mut stack: AbstractStack<StoreTag> = AbstractStack::new();

    for instruction in block.instructions(instructions) {
        let outcome = step(instruction, &mut stack);

        match instruction.opcode {
            opcode::SLOAD => {
                if let Some(slot) = outcome.inputs[0].provenance.as_const() {
                    records.push(SiteRecord {
                        slot,
                        offset: 0,
                        size: 32,
                        type_guess: AbiType::Uint(256),
                        from_write: false,
                    });
                    if let Some(top) = stack.peek_mut() {
                        top.tag = Some(StoreTag::Loaded { slot });
                    }
                }
            }

            opcode::SHR => {
                if let (Some(shift), Some(StoreTag::Loaded { slot })) = (
                    outcome.inputs[0].provenance.as_const(),
                    outcome.inputs[1].tag.clone(),
                ) {
                    if let Ok(bits) = u16::try_from(shift) {
                        if bits % 8 == 0 && bits < 256 {
                            if let Some(top) = stack.peek_mut() {
                                #[allow(clippy::cast_possible_truncation)]
                                let offset = (bits / 8) as u8;
                                top.tag = Some(StoreTag::Shifted { slot, offset });
                            }
                        }
                    }
                }
            }

            opcode::AND => {
                for (idx, input) in outcome.inputs.iter().enumerate() {
                    let Some(mask) = outcome.inputs[1 - idx].provenance.as_const() else {
                        continue;
                    };
                    match input.tag.clone() {
                        // Clearing a byte range of a loaded slot starts a packed write.
                        Some(StoreTag::Loaded { slot }) => {
                            if hole_range(mask).is_some() {
                                if let Some(top) = stack.peek_mut() {
                                    top.tag = Some(StoreTag::Cleared { slot, mask });
                                }
                            } else if let Some(size) = low_mask_bytes(mask) {
                                // Masking the low bytes of a loaded slot is a packed read.
                                records.push(SiteRecord {
                                    slot,
                                    offset: 0,
                                    size,
                                    type_guess: guess_for(size, None),
                                    from_write: false,
                                });
                            }
                        }
                        Some(StoreTag::Shifted { slot, offset }) => {
                            if let Some(size) = low_mask_bytes(mask) {
                                records.push(SiteRecord {
                                    slot,
                                    offset,
                                    size,
                                    type_guess: guess_for(size, None),
                                    from_write: false,
                                });
                            }
                        }
                        _ => {}
                    }
                    break;
                }
            }

            opcode::OR => {
                for input in &outcome.inputs {
                    if let Some(StoreTag::Cleared { slot, mask }) = input.tag.clone() {
                        if let Some(top) = stack.peek_mut() {
                            top.tag = Some(StoreTag::Packed { slot, mask });
                        }
                        break;
                    }
                }
            }

            opcode::SSTORE => {
                let Some(slot) = outcome.inputs[0].provenance.as_const() else {
                    // Slot computed from a hash or other symbolic value: skip the site.
                    continue;
                };
                let value = &outcome.inputs[1];
                let record = match &value.tag {
                    Some(StoreTag::Packed { slot: packed, mask }) if *packed == slot => {
                        hole_range(*mask).map(|(offset, size)| SiteRecord {
                            slot,
                            offset,
                            size,
                            type_guess: guess_for(size, None),
                            from_write: true,
                        })
                    }
                    _ => None,
                };
                records.push(record.unwrap_or_else(|| SiteRecord {
                    slot,
                    offset: 0,
                    size: 32,
                    type_guess: guess_for(32, Some(&value.provenance)),
                    from_write: true,
                }));
            }

            _ => {}
        }
    }
}

/// Merges per-site records into the final layout.
///
/// Records keyed by `(slot, offset)` refine each other: writes dominate reads, and within the
/// same origin the narrower size wins — two writes to different byte ranges of one slot end up
/// as two packed entries rather than conflicting.
fn merge_records(records: Vec<SiteRecord>) -> Vec<StorageSlot> {
    let mut merged: BTreeMap<(U256, u8), SiteRecord> = BTreeMap::new();

    for record in records {
        let key = (record.slot, record.offset);
        match merged.entry(key) {
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                if record.from_write && !existing.from_write {
                    *existing = record;
                } else if record.from_write == existing.from_write && record.size < existing.size {
                    existing.size = record.size;
                    existing.type_guess = record.type_guess;
                }
            }
        }
    }

    merged
        .into_values()
        .map(|record| StorageSlot {
            slot: record.slot,
            offset: record.offset,
            size: record.size,
            type_guess: record.type_guess,
        })
        .collect()
}

/// Recovers the contract's storage layout from all storage access sites.
///
/// The walk covers the whole contract, not individual functions: every block containing an
/// `SSTORE` or `SLOAD` is interpreted locally and its resolvable sites contribute records.
/// Sites with symbolic slot indices contribute nothing.
///
/// # Arguments
///
/// * `instructions` - The decoded instruction stream
/// * `blocks` - The basic blocks partitioning `instructions`
/// * `cfg` - The control flow graph over `blocks` (site blocks are enumerated from it)
/// * `budget` - Interpreter budget; a zero-step budget is rejected
///
/// # Errors
///
/// Returns [`crate::Error::BudgetExceeded`] for a zero-step budget.
pub fn recover_storage(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    cfg: &ControlFlowGraph,
    budget: &InterpBudget,
) -> Result<Vec<StorageSlot>> {
    if budget.steps == 0 {
        return Err(crate::Error::BudgetExceeded { limit: 0 });
    }

    let site_blocks: Vec<&BasicBlock> = cfg
        .edges
        .keys()
        .filter_map(|start| blocks.iter().find(|block| block.start == *start))
        .filter(|block| {
            block
                .instructions(instructions)
                .iter()
                .any(|i| i.opcode == opcode::SSTORE || i.opcode == opcode::SLOAD)
        })
        .collect();

    let records: Vec<SiteRecord> = site_blocks
        .par_iter()
        .map(|block| {
            let mut records = Vec::new();
            walk_block(instructions, block, &mut records);
            records
        })
        .reduce(Vec::new, |mut acc, mut part| {
            acc.append(&mut part);
            acc
        });

    Ok(merge_records(records))
}
