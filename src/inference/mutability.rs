//! State mutability classification.
//!
//! Each recovered function is classified by walking the code reachable from its body entry
//! (within the same call context — external call targets are never followed). A reachable read
//! of the message value makes the function `payable`; otherwise any state-changing instruction
//! makes it `nonpayable`; otherwise any read of persistent or environment state makes it
//! `view`; otherwise it is `pure`. The opcode classes live in fixed lookup tables — the
//! instruction set is closed, so there is nothing to dispatch on at runtime.

use crate::{
    analysis::{
        interp::{AbstractStack, Interp, InterpBudget, StepOutcome, Visitor},
        BasicBlock, ControlFlowGraph,
    },
    disassembler::{opcode, Instruction},
    Result,
};

/// Whether a function can read or modify persistent state, or receive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StateMutability {
    /// Touches neither state nor environment
    Pure,
    /// Reads state or environment without modifying it
    View,
    /// Modifies state but rejects attached value
    NonPayable,
    /// Accepts attached value
    Payable,
}

const fn opcode_set<const N: usize>(ops: [u8; N]) -> [bool; 256] {
    let mut set = [false; 256];
    let mut i = 0;
    while i < N {
        set[ops[i] as usize] = true;
        i += 1;
    }
    set
}

/// Instructions that modify persistent state, create contracts, self-destruct, or hand
/// execution to code that can (value-transferring and delegated calls included).
const STATE_CHANGING: [bool; 256] = opcode_set([
    opcode::SSTORE,
    opcode::TSTORE,
    opcode::CREATE,
    opcode::CREATE2,
    opcode::SELFDESTRUCT,
    opcode::CALL,
    opcode::CALLCODE,
    opcode::DELEGATECALL,
]);

/// Instructions that read persistent state or the chain environment without modifying it.
const STATE_READING: [bool; 256] = opcode_set([
    opcode::SLOAD,
    opcode::TLOAD,
    opcode::BALANCE,
    opcode::SELFBALANCE,
    opcode::CALLER,
    opcode::ORIGIN,
    opcode::GASPRICE,
    opcode::BLOCKHASH,
    opcode::COINBASE,
    opcode::TIMESTAMP,
    opcode::NUMBER,
    opcode::PREVRANDAO,
    opcode::GASLIMIT,
    opcode::CHAINID,
    opcode::BASEFEE,
    opcode::BLOBHASH,
    opcode::BLOBBASEFEE,
    opcode::EXTCODESIZE,
    opcode::EXTCODECOPY,
    opcode::EXTCODEHASH,
    opcode::STATICCALL,
]);

#[derive(Default)]
struct MutabilityVisitor {
    reads_value: bool,
    writes_state: bool,
    reads_state: bool,
}

impl Visitor<()> for MutabilityVisitor {
    fn visit(
        &mut self,
        instruction: &Instruction,
        _outcome: &StepOutcome<()>,
        _stack: &mut AbstractStack<()>,
    ) {
        let op = instruction.opcode;
        if op == opcode::CALLVALUE {
            self.reads_value = true;
        } else if STATE_CHANGING[op as usize] {
            self.writes_state = true;
        } else if STATE_READING[op as usize] {
            self.reads_state = true;
        }
    }

    fn finished(&self) -> bool {
        // payable dominates every other classification; nothing else can change the outcome
        self.reads_value
    }
}

/// Classifies the state mutability of the function body entered at `entry`.
///
/// Returns `None` when the reachability walk was cut short by the budget without establishing
/// `payable` — reporting `pure`/`view`/`nonpayable` from an incomplete reachable set would be
/// unsound, so the classification degrades to absent instead.
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
pub fn infer_state_mutability(
    instructions: &[Instruction],
    blocks: &[BasicBlock],
    cfg: &ControlFlowGraph,
    entry: usize,
    budget: &InterpBudget,
) -> Result<Option<StateMutability>> {
    let interp = Interp::new(instructions, blocks, cfg);
    let mut visitor = MutabilityVisitor::default();
    let exploration = interp.explore(entry, budget, &mut visitor)?;

    if visitor.reads_value {
        return Ok(Some(StateMutability::Payable));
    }
    if exploration.exhausted {
        return Ok(None);
    }
    Ok(Some(if visitor.writes_state {
        StateMutability::NonPayable
    } else if visitor.reads_state {
        StateMutability::View
    } else {
        StateMutability::Pure
    }))
}
