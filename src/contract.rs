//! The analysis entry point and its result types.
//!
//! [`analyze`] is the single door into the engine: it takes decoded runtime bytecode and a set
//! of pass toggles, runs exactly the passes those toggles require, and returns a
//! [`ContractInfo`] whose fields mirror the toggles — omitted analyses are absent fields, not
//! empty placeholders. All working state lives in a per-invocation context that dies when the
//! call returns; the engine holds nothing across calls and never retains references into its
//! results.

use bitflags::bitflags;
use rayon::prelude::*;

use crate::{
    analysis::{
        build_blocks, build_cfg,
        interp::{InterpBudget, DEFAULT_STEP_BUDGET},
        BasicBlock, ControlFlowGraph,
    },
    disassembler::{decode_stream, Instruction},
    inference::{
        infer_arguments, infer_state_mutability, recover_dispatch, recover_storage, AbiType,
        Selector, StateMutability, StorageSlot,
    },
    Error, Result,
};

/// Deployed EVM bytecode is capped at this size (EIP-170); larger inputs are rejected.
pub const MAX_CODE_SIZE: usize = 24_576;

bitflags! {
    /// Independent pass toggles for one analysis invocation.
    ///
    /// Each flag enables one output field of [`ContractInfo`]. Flags whose output hangs off the
    /// function list ([`ARGUMENTS`](Passes::ARGUMENTS),
    /// [`STATE_MUTABILITY`](Passes::STATE_MUTABILITY)) imply
    /// [`SELECTORS`](Passes::SELECTORS).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Passes: u32 {
        /// Recover public function selectors and the fallback entry
        const SELECTORS = 1;
        /// Infer argument types per recovered function
        const ARGUMENTS = 1 << 1;
        /// Classify state mutability per recovered function
        const STATE_MUTABILITY = 1 << 2;
        /// Recover the storage slot layout
        const STORAGE_LAYOUT = 1 << 3;
        /// Include the decoded instruction sequence
        const DISASSEMBLY = 1 << 4;
        /// Include the basic block partition
        const BASIC_BLOCKS = 1 << 5;
        /// Include the control flow graph
        const CONTROL_FLOW_GRAPH = 1 << 6;
    }
}

/// Configuration for one [`analyze`] call: which passes to run and how much interpreter budget
/// each walk gets.
///
/// # Examples
///
/// ```rust
/// use evmscope::AnalysisOptions;
///
/// let options = AnalysisOptions::new()
///     .with_selectors()
///     .with_state_mutability();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// The enabled passes
    pub passes: Passes,
    /// Instruction-step ceiling per interpreter walk
    pub step_budget: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            passes: Passes::empty(),
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

impl AnalysisOptions {
    /// Creates a configuration with no passes enabled and the default step budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables selector recovery.
    #[must_use]
    pub fn with_selectors(mut self) -> Self {
        self.passes |= Passes::SELECTORS;
        self
    }

    /// Enables argument inference (implies selector recovery).
    #[must_use]
    pub fn with_arguments(mut self) -> Self {
        self.passes |= Passes::SELECTORS | Passes::ARGUMENTS;
        self
    }

    /// Enables state mutability classification (implies selector recovery).
    #[must_use]
    pub fn with_state_mutability(mut self) -> Self {
        self.passes |= Passes::SELECTORS | Passes::STATE_MUTABILITY;
        self
    }

    /// Enables storage layout recovery.
    #[must_use]
    pub fn with_storage_layout(mut self) -> Self {
        self.passes |= Passes::STORAGE_LAYOUT;
        self
    }

    /// Enables the disassembly listing in the result.
    #[must_use]
    pub fn with_disassembly(mut self) -> Self {
        self.passes |= Passes::DISASSEMBLY;
        self
    }

    /// Enables the basic block partition in the result.
    #[must_use]
    pub fn with_basic_blocks(mut self) -> Self {
        self.passes |= Passes::BASIC_BLOCKS;
        self
    }

    /// Enables the control flow graph in the result.
    #[must_use]
    pub fn with_control_flow_graph(mut self) -> Self {
        self.passes |= Passes::CONTROL_FLOW_GRAPH;
        self
    }

    /// Overrides the interpreter step budget.
    ///
    /// The budget is a deterministic ceiling on work per interpreter walk; it exists to bound
    /// analysis of adversarial bytecode, and the default suits real-world contracts.
    #[must_use]
    pub fn with_step_budget(mut self, steps: usize) -> Self {
        self.step_budget = steps;
        self
    }
}

/// A recovered public contract function.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionInfo {
    /// The 4-byte dispatcher selector; `None` for the catch-all fallback body
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub selector: Option<Selector>,
    /// Byte offset of the function body's entry block
    pub entry: usize,
    /// Inferred argument types, present when argument inference ran
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub arguments: Option<Vec<AbiType>>,
    /// State mutability classification, present when the mutability pass ran and could
    /// classify soundly
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub state_mutability: Option<StateMutability>,
}

/// The aggregate analysis result.
///
/// Every field mirrors one [`Passes`] toggle: requested analyses are present, everything else
/// is absent. Constructed once per [`analyze`] call and immutable afterwards; ownership passes
/// entirely to the caller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContractInfo {
    /// Recovered functions, ordered by selector with the fallback (if any) last
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub functions: Option<Vec<FunctionInfo>>,
    /// Recovered storage layout, ordered by slot and offset
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub storage: Option<Vec<StorageSlot>>,
    /// The decoded instruction sequence
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub disassembly: Option<Vec<Instruction>>,
    /// The basic block partition
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub basic_blocks: Option<Vec<BasicBlock>>,
    /// The control flow graph
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub control_flow_graph: Option<ControlFlowGraph>,
}

/// Per-invocation working state, built up front and passed by reference through the passes.
/// Dropped when [`analyze`] returns — the engine keeps no state across calls.
struct AnalysisContext {
    instructions: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
    cfg: ControlFlowGraph,
    budget: InterpBudget,
}

fn recover_functions(ctx: &AnalysisContext, passes: Passes) -> Result<Vec<FunctionInfo>> {
    let dispatch = recover_dispatch(&ctx.instructions, &ctx.blocks, &ctx.cfg, &ctx.budget)?;

    let mut functions: Vec<FunctionInfo> = dispatch
        .selectors
        .into_iter()
        .map(|(selector, entry)| FunctionInfo {
            selector: Some(selector),
            entry,
            arguments: None,
            state_mutability: None,
        })
        .collect();

    if let Some(entry) = dispatch.fallback {
        functions.push(FunctionInfo {
            selector: None,
            entry,
            arguments: None,
            state_mutability: None,
        });
    }

    // Per-function walks are independent given the finished CFG; fan them out.
    if passes.intersects(Passes::ARGUMENTS | Passes::STATE_MUTABILITY) {
        functions.par_iter_mut().try_for_each(|function| {
            if passes.contains(Passes::ARGUMENTS) {
                function.arguments = Some(infer_arguments(
                    &ctx.instructions,
                    &ctx.blocks,
                    &ctx.cfg,
                    function.entry,
                    &ctx.budget,
                )?);
            }
            if passes.contains(Passes::STATE_MUTABILITY) {
                function.state_mutability = infer_state_mutability(
                    &ctx.instructions,
                    &ctx.blocks,
                    &ctx.cfg,
                    function.entry,
                    &ctx.budget,
                )?;
            }
            Ok::<(), Error>(())
        })?;
    }

    Ok(functions)
}

/// Analyzes EVM runtime bytecode without executing it.
///
/// Runs exactly the passes enabled in `options` (plus their prerequisites) and returns a
/// [`ContractInfo`] with one populated field per requested analysis. Re-running with identical
/// input and options yields an identical result.
///
/// # Arguments
///
/// * `code` - The decoded runtime bytecode (the caller handles hex decoding)
/// * `options` - Pass toggles and interpreter budget
///
/// # Errors
///
/// * [`Error::Empty`] - `code` is empty
/// * [`Error::OversizedInput`] - `code` exceeds [`MAX_CODE_SIZE`]
/// * [`Error::BudgetExceeded`] - the configured step budget is zero
/// * [`Error::InvariantViolation`] - an internal engine bug was detected
///
/// Content-level anomalies in the bytecode — invalid opcodes, unresolvable jumps, a missing
/// dispatcher — are never errors; they show up as absent or partial data instead.
///
/// # Examples
///
/// ```rust
/// use evmscope::{analyze, AnalysisOptions};
///
/// // PUSH1 0x2A, PUSH1 0x00, SSTORE, STOP
/// let code = [0x60, 0x2A, 0x60, 0x00, 0x55, 0x00];
/// let info = analyze(&code, &AnalysisOptions::new().with_storage_layout())?;
///
/// let storage = info.storage.expect("requested");
/// assert_eq!(storage.len(), 1);
/// assert!(info.functions.is_none()); // not requested
/// # Ok::<(), evmscope::Error>(())
/// ```
pub fn analyze(code: &[u8], options: &AnalysisOptions) -> Result<ContractInfo> {
    if code.is_empty() {
        return Err(Error::Empty);
    }
    if code.len() > MAX_CODE_SIZE {
        return Err(Error::OversizedInput { size: code.len() });
    }

    let mut passes = options.passes;
    if passes.intersects(Passes::ARGUMENTS | Passes::STATE_MUTABILITY) {
        passes |= Passes::SELECTORS;
    }

    let needs_structure = passes.intersects(
        Passes::SELECTORS
            | Passes::STORAGE_LAYOUT
            | Passes::BASIC_BLOCKS
            | Passes::CONTROL_FLOW_GRAPH,
    );

    let instructions = decode_stream(code);
    let blocks = if needs_structure {
        build_blocks(&instructions)
    } else {
        Vec::new()
    };
    let cfg = if needs_structure {
        build_cfg(&instructions, &blocks)?
    } else {
        ControlFlowGraph {
            entry: 0,
            edges: std::collections::BTreeMap::new(),
        }
    };

    let ctx = AnalysisContext {
        instructions,
        blocks,
        cfg,
        budget: InterpBudget::with_steps(options.step_budget),
    };

    let functions = if passes.contains(Passes::SELECTORS) {
        Some(recover_functions(&ctx, passes)?)
    } else {
        None
    };

    let storage = if passes.contains(Passes::STORAGE_LAYOUT) {
        Some(recover_storage(
            &ctx.instructions,
            &ctx.blocks,
            &ctx.cfg,
            &ctx.budget,
        )?)
    } else {
        None
    };

    let AnalysisContext {
        instructions,
        blocks,
        cfg,
        ..
    } = ctx;

    Ok(ContractInfo {
        functions,
        storage,
        disassembly: passes.contains(Passes::DISASSEMBLY).then_some(instructions),
        basic_blocks: passes.contains(Passes::BASIC_BLOCKS).then_some(blocks),
        control_flow_graph: passes.contains(Passes::CONTROL_FLOW_GRAPH).then_some(cfg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let result = analyze(&[], &AnalysisOptions::new().with_selectors());
        assert!(matches!(result, Err(Error::Empty)));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let code = vec![0x00; MAX_CODE_SIZE + 1];
        let result = analyze(&code, &AnalysisOptions::new().with_selectors());
        assert!(matches!(
            result,
            Err(Error::OversizedInput { size }) if size == MAX_CODE_SIZE + 1
        ));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let code = [0x60, 0x00, 0x00];
        let result = analyze(
            &code,
            &AnalysisOptions::new().with_selectors().with_step_budget(0),
        );
        assert!(matches!(result, Err(Error::BudgetExceeded { .. })));
    }

    #[test]
    fn unrequested_fields_are_absent() {
        let code = [0x60, 0x2A, 0x60, 0x00, 0x55, 0x00];
        let info = analyze(&code, &AnalysisOptions::new().with_selectors()).unwrap();

        assert!(info.functions.is_some());
        assert!(info.storage.is_none());
        assert!(info.disassembly.is_none());
        assert!(info.basic_blocks.is_none());
        assert!(info.control_flow_graph.is_none());
    }

    #[test]
    fn arguments_imply_selectors() {
        let code = [0x60, 0x00, 0x00];
        let info = analyze(&code, &AnalysisOptions::new().with_arguments()).unwrap();

        let functions = info.functions.expect("selector pass implied");
        assert!(functions.is_empty()); // no dispatcher in this bytecode
    }

    #[test]
    fn disassembly_only() {
        let code = [0x60, 0x80, 0x60, 0x40, 0x52, 0x00];
        let info = analyze(&code, &AnalysisOptions::new().with_disassembly()).unwrap();

        let listing = info.disassembly.expect("requested");
        assert_eq!(listing.len(), 4);
        assert!(info.functions.is_none());
    }

    #[test]
    fn determinism() {
        let code = [
            0x5F, 0x35, 0x60, 0xE0, 0x1C, 0x80, 0x63, 0x11, 0x22, 0x33, 0x44, 0x14, 0x60, 0x13,
            0x57, 0x5F, 0x5F, 0xFD, 0x00, 0x5B, 0x60, 0x00, 0x54, 0x50, 0x00,
        ];
        let options = AnalysisOptions::new()
            .with_arguments()
            .with_state_mutability()
            .with_storage_layout()
            .with_basic_blocks()
            .with_control_flow_graph()
            .with_disassembly();

        let first = analyze(&code, &options).unwrap();
        let second = analyze(&code, &options).unwrap();

        assert_eq!(first, second);
    }
}
