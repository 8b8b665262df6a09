//! Public function selector recovery.
//!
//! Solidity-style runtime bytecode starts with a dispatcher: the first four bytes of calldata
//! are extracted (`SHR 0xe0`, the legacy `DIV 2^224`, or an `AND 0xffffffff` mask) and compared
//! against each public function's 4-byte selector, conditionally jumping to the matching body.
//! This pass abstract-interprets the contract from its entry block, tags the extracted selector
//! value and every comparison of it against a constant, and records a function each time such a
//! comparison feeds a conditional jump. Both equality (`EQ`) and inequality (`SUB`/`XOR`)
//! comparison idioms are recognized, including `ISZERO`-negated chains.
//!
//! A contract without a recognizable dispatcher simply yields no functions — that is data, not
//! an error.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{
        interp::{AbstractStack, Interp, InterpBudget, Provenance, StepOutcome, Visitor},
        BasicBlock, ControlFlowGraph, Terminator,
    },
    disassembler::{opcode, Instruction},
    Result,
};

/// A 4-byte public function selector.
pub type Selector = [u8; 4];

/// Result of dispatcher recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Recovered selectors mapped to the byte offset of their function body entry
    pub selectors: BTreeMap<Selector, usize>,
    /// Entry offset of the catch-all fallback body, when the dispatcher ends in an
    /// unconditional jump
    pub fallback: Option<usize>,
    /// Whether the interpreter budget cut the dispatcher walk short (results may be partial)
    pub exhausted: bool,
}

/// Pass-local annotations tracked on top of value provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchTag {
    /// The extracted 4-byte calldata selector
    SelectorWord,
    /// Result of comparing the selector against a constant. `matches_on_true` records the
    /// comparison polarity: `EQ` is true on match, `SUB`/`XOR` are true on mismatch.
    Cmp {
        selector: Selector,
        matches_on_true: bool,
    },
}

fn selector_of(value: alloy_primitives::U256) -> Option<Selector> {
    if value.bit_len() > 32 {
        return None;
    }
    let bytes = value.to_be_bytes::<32>();
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&bytes[28..32]);
    Some(selector)
}

/// Shared tagging rules, applied after each instruction's base transfer.
///
/// Used by both the graph-wide dispatcher walk and the linear no-match walk that locates the
/// fallback body.
fn tag_step(
    instruction: &Instruction,
    outcome: &StepOutcome<DispatchTag>,
    stack: &mut AbstractStack<DispatchTag>,
    selectors: &mut BTreeMap<Selector, usize>,
) {
    match instruction.opcode {
        // Selector extraction: any operation whose result narrows calldata offset 0 to its
        // first four bytes produces the dispatch word.
        opcode::CALLDATALOAD | opcode::SHR | opcode::DIV | opcode::AND => {
            if let Some(top) = stack.peek_mut() {
                if top.provenance
                    == (Provenance::CallData {
                        offset: Some(0),
                        width: 4,
                    })
                {
                    top.tag = Some(DispatchTag::SelectorWord);
                }
            }
        }

        opcode::EQ | opcode::XOR | opcode::SUB => {
            let tagged = outcome
                .inputs
                .iter()
                .any(|v| v.tag == Some(DispatchTag::SelectorWord));
            let constant = outcome
                .inputs
                .iter()
                .find_map(|v| v.provenance.as_const())
                .and_then(selector_of);
            if tagged {
                if let (Some(selector), Some(top)) = (constant, stack.peek_mut()) {
                    top.tag = Some(DispatchTag::Cmp {
                        selector,
                        matches_on_true: instruction.opcode == opcode::EQ,
                    });
                }
            }
        }

        opcode::ISZERO => match outcome.inputs[0].tag {
            Some(DispatchTag::Cmp {
                selector,
                matches_on_true,
            }) => {
                if let Some(top) = stack.peek_mut() {
                    top.tag = Some(DispatchTag::Cmp {
                        selector,
                        matches_on_true: !matches_on_true,
                    });
                }
            }
            // ISZERO of the raw selector word is how the zero selector is matched.
            Some(DispatchTag::SelectorWord) => {
                if let Some(top) = stack.peek_mut() {
                    top.tag = Some(DispatchTag::Cmp {
                        selector: [0; 4],
                        matches_on_true: true,
                    });
                }
            }
            None => {}
        },

        opcode::JUMPI => {
            if let Some(DispatchTag::Cmp {
                selector,
                matches_on_true,
            }) = outcome.inputs[1].tag
            {
                let entry = if matches_on_true {
                    outcome.inputs[0]
                        .provenance
                        .as_const()
                        .and_then(|v| usize::try_from(v).ok())
                } else {
                    // Inequality idiom: the jump leaves on mismatch, the body is the
                    // fallthrough.
                    Some(instruction.offset + instruction.size)
                };
                if let Some(entry) = entry {
                    selectors.entry(selector).or_insert(entry);
                }
            }
        }

        _ => {}
    }
}

struct DispatchVisitor {
    selectors: BTreeMap<Selector, usize>,
}

impl Visitor<DispatchTag> for DispatchVisitor {
    fn visit(
        &mut self,
        instruction: &Instruction,
        outcome: &StepOutcome<DispatchTag>,
        stack: &mut AbstractStack<DispatchTag>,
    ) {
        tag_step(instruction, outcome, stack, &mut self.selectors);
    }
}

/// Follows the no-match spine of the dispatcher to locate the fallback body.
///
/// Walks linearly from the entry block, always taking the branch on which the selector
/// comparison failed, until the chain halts (no fallback) or exits through an unconditional
/// jump after at least one comparison — that jump's target is the catch-all fallback.
fn find_fallback(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    budget: &InterpBudget,
    selectors: &mut BTreeMap<Selector, usize>,
) -> Option<usize> {
    let index: BTreeMap<usize, usize> = blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| (block.start, idx))
        .collect();

    let mut stack: AbstractStack<DispatchTag> = AbstractStack::new();
    let mut visited: BTreeSet<usize> = BTreeSet::new();
    let mut steps = 0usize;
    let mut idx = 0usize;

    while visited.insert(idx) {
        let block = blocks.get(idx)?;
        let mut last: Option<StepOutcome<DispatchTag>> = None;

        for instruction in block.instructions(instructions) {
            if steps == budget.steps {
                return None;
            }
            steps += 1;
            let outcome = crate::analysis::interp::step(instruction, &mut stack);
            tag_step(instruction, &outcome, &mut stack, selectors);
            last = Some(outcome);
        }

        let jump_target = || {
            last.as_ref()
                .and_then(|o| o.inputs.first())
                .and_then(|v| v.provenance.as_const())
                .and_then(|v| usize::try_from(v).ok())
        };

        match block.terminator {
            Terminator::Halt | Terminator::Invalid => return None,
            Terminator::FallThrough => idx += 1,
            Terminator::ConditionalJump => {
                let mismatch_jumps = matches!(
                    last.as_ref().and_then(|o| o.inputs.get(1)).and_then(|v| v.tag.as_ref()),
                    Some(DispatchTag::Cmp {
                        matches_on_true: false,
                        ..
                    })
                );
                if mismatch_jumps {
                    idx = *index.get(&jump_target()?)?;
                } else {
                    // Match-style comparison (or an unrelated guard): the no-match path is
                    // the fallthrough.
                    idx += 1;
                }
            }
            Terminator::Jump => {
                let target = jump_target()?;
                if selectors.is_empty() {
                    // Still in the prologue; follow the jump toward the dispatcher.
                    idx = *index.get(&target)?;
                } else {
                    return Some(target);
                }
            }
        }
    }

    None
}

/// Recovers the public function dispatch table.
///
/// Runs the dispatcher walk from the contract entry and the linear no-match walk for the
/// fallback body. Contracts without a dispatcher yield an empty table.
///
/// # Arguments
///
/// * `instructions` - The decoded instruction stream
/// * `blocks` - The basic blocks partitioning `instructions`
/// * `cfg` - The control flow graph over `blocks`
/// * `budget` - Interpreter budget for each walk
///
/// # Errors
///
/// Returns [`crate::Error::BudgetExceeded`] for a zero-step budget.
pub fn recover_dispatch(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    cfg: &ControlFlowGraph,
    budget: &InterpBudget,
) -> Result<Dispatch> {
    if blocks.is_empty() {
        return Ok(Dispatch {
            selectors: BTreeMap::new(),
            fallback: None,
            exhausted: false,
        });
    }

    let interp = Interp::new(instructions, blocks, cfg);
    let mut visitor = DispatchVisitor {
        selectors: BTreeMap::new(),
    };
    let exploration = interp.explore(cfg.entry, budget, &mut visitor)?;

    let mut selectors = visitor.selectors;
    let fallback = find_fallback(instructions, blocks, budget, &mut selectors);

    Ok(Dispatch {
        selectors,
        fallback,
        exhausted: exploration.exhausted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{build_blocks, build_cfg};
    use crate::disassembler::decode_stream;

    fn dispatch_of(code: &[u8]) -> Dispatch {
        let instructions = decode_stream(code);
        let blocks = build_blocks(&instructions);
        let cfg = build_cfg(&instructions, &blocks).unwrap();
        recover_dispatch(&instructions, &blocks, &cfg, &InterpBudget::default()).unwrap()
    }

    /// PUSH0 CALLDATALOAD PUSH1 e0 SHR | DUP1 PUSH4 <sel> EQ PUSH1 <dest> JUMPI | fall through
    fn dispatcher(entries: &[(Selector, u8)], tail: &[u8]) -> Vec<u8> {
        let mut code = vec![0x5F, 0x35, 0x60, 0xE0, 0x1C];
        for (selector, dest) in entries {
            code.push(0x80); // DUP1
            code.push(0x63); // PUSH4
            code.extend_from_slice(selector);
            code.extend_from_slice(&[0x14, 0x60, *dest, 0x57]); // EQ, PUSH1 dest, JUMPI
        }
        code.extend_from_slice(tail);
        code
    }

    #[test]
    fn single_selector_eq_dispatch() {
        // dispatcher entry is 10 bytes; body JUMPDEST lands right after the revert tail
        let tail = [0x5F, 0x5F, 0xFD, 0x5B, 0x00]; // PUSH0 PUSH0 REVERT | JUMPDEST STOP
        let code = dispatcher(&[([0xA9, 0x05, 0x9C, 0xBB], 18)], &tail);
        assert_eq!(code[18], 0x5B);

        let dispatch = dispatch_of(&code);

        assert_eq!(dispatch.selectors.len(), 1);
        assert_eq!(dispatch.selectors[&[0xA9, 0x05, 0x9C, 0xBB]], 18);
        assert_eq!(dispatch.fallback, None);
    }

    #[test]
    fn multiple_selectors_chain() {
        let tail = [0x5F, 0x5F, 0xFD, 0x5B, 0x00, 0x5B, 0x00]; // revert | JUMPDEST STOP | JUMPDEST STOP
        let code = dispatcher(&[([0x11, 0x22, 0x33, 0x44], 28), ([0xAA, 0xBB, 0xCC, 0xDD], 30)], &tail);
        assert_eq!(code[28], 0x5B);
        assert_eq!(code[30], 0x5B);

        let dispatch = dispatch_of(&code);

        assert_eq!(dispatch.selectors.len(), 2);
        assert_eq!(dispatch.selectors[&[0x11, 0x22, 0x33, 0x44]], 28);
        assert_eq!(dispatch.selectors[&[0xAA, 0xBB, 0xCC, 0xDD]], 30);
    }

    #[test]
    fn sub_idiom_matches_on_fallthrough() {
        // DUP1 PUSH4 sel SUB PUSH1 dest JUMPI — jump leaves on mismatch, body follows inline
        let mut code = vec![0x5F, 0x35, 0x60, 0xE0, 0x1C]; // selector extraction
        code.extend_from_slice(&[0x80, 0x63, 0xDE, 0xAD, 0xBE, 0xEF, 0x03, 0x60, 17, 0x57]);
        let body = code.len(); // fallthrough body entry
        code.extend_from_slice(&[0x00]); // STOP (body)
        code.extend_from_slice(&[0x00, 0x5B, 0x5F, 0x5F, 0xFD]); // pad, JUMPDEST @17, revert

        let dispatch = dispatch_of(&code);

        assert_eq!(dispatch.selectors.len(), 1);
        assert_eq!(dispatch.selectors[&[0xDE, 0xAD, 0xBE, 0xEF]], body);
    }

    #[test]
    fn fallback_from_final_jump() {
        // one comparison, then the no-match path jumps unconditionally to the fallback body
        let tail = [0x60, 24, 0x56, 0x5B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5B, 0x00];
        //          PUSH1 24, JUMP | JUMPDEST STOP (selector body @18) | padding | JUMPDEST STOP @24
        let code = dispatcher(&[([0x01, 0x02, 0x03, 0x04], 18)], &tail);
        assert_eq!(code[18], 0x5B);
        assert_eq!(code[24], 0x5B);

        let dispatch = dispatch_of(&code);

        assert_eq!(dispatch.selectors.len(), 1);
        assert_eq!(dispatch.fallback, Some(24));
    }

    #[test]
    fn no_dispatcher_yields_nothing() {
        let dispatch = dispatch_of(&[0x60, 0x01, 0x60, 0x02, 0x01, 0x00]);

        assert!(dispatch.selectors.is_empty());
        assert_eq!(dispatch.fallback, None);
    }

    #[test]
    fn empty_blocks_yield_nothing() {
        let instructions = decode_stream(&[]);
        let blocks = build_blocks(&instructions);
        let cfg = build_cfg(&instructions, &blocks).unwrap();
        let dispatch =
            recover_dispatch(&instructions, &blocks, &cfg, &InterpBudget::default()).unwrap();

        assert!(dispatch.selectors.is_empty());
    }
}
