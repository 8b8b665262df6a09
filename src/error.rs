use thiserror::Error;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvariantViolation {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvariantViolation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only input-shape problems and internal engine bugs surface as errors. Everything that can go
/// wrong *inside* adversarial bytecode — undefined opcodes, truncated push immediates, jumps to
/// computed targets that cannot be resolved, storage slots derived from hashed keys, a missing
/// dispatcher — is modeled as absent or partial data in [`crate::ContractInfo`], never as a
/// failure. Malformed real-world bytecode is the expected common case.
///
/// # Error Categories
///
/// ## Input Shape Errors
/// - [`Error::Empty`] - Zero-length bytecode was provided
/// - [`Error::OversizedInput`] - Input exceeds the deployed-code size ceiling
///
/// ## Analysis Errors
/// - [`Error::BudgetExceeded`] - An interpreter walk could not make progress within its budget
///
/// ## Engine Bugs
/// - [`Error::InvariantViolation`] - An internal invariant was broken; always fatal
///
/// # Examples
///
/// ```rust
/// use evmscope::{analyze, AnalysisOptions, Error};
///
/// match analyze(&[], &AnalysisOptions::new().with_selectors()) {
///     Err(Error::Empty) => println!("no bytecode to analyze"),
///     Err(e) => println!("error: {}", e),
///     Ok(_) => unreachable!("empty input is rejected"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Provided input was empty.
    ///
    /// This error occurs when a zero-length byte slice is handed to the engine
    /// where deployed contract bytecode was expected.
    #[error("Provided input was empty")]
    Empty,

    /// Provided input exceeds the deployed-code size ceiling.
    ///
    /// Deployed EVM bytecode is capped at 24 576 bytes (EIP-170). Inputs larger
    /// than that are not runtime bytecode and are rejected before any analysis
    /// runs.
    #[error("Input of {size} bytes exceeds the maximum deployed code size")]
    OversizedInput {
        /// Size of the rejected input in bytes
        size: usize,
    },

    /// An abstract interpreter walk could not make progress within its step budget.
    ///
    /// The interpreter enforces a deterministic, finite step ceiling so that
    /// analysis terminates even on maliciously looping bytecode. When a walk hits
    /// the ceiling mid-flight the affected pass degrades to partial results; this
    /// error escapes only when the configured budget leaves no room to produce any
    /// result at all.
    #[error("Interpreter budget of {limit} steps exceeded")]
    BudgetExceeded {
        /// The step ceiling that was in effect
        limit: usize,
    },

    /// An internal engine invariant was violated.
    ///
    /// Indicates a bug in the analysis engine itself — a control flow edge
    /// pointing outside the block set, a block partition with gaps, or similar.
    /// Never caused by input bytecode and never user-recoverable. The error
    /// includes the source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file in which the violation was detected
    /// * `line` - Source line at which the violation was detected
    #[error("Invariant violation - {file}:{line}: {message}")]
    InvariantViolation {
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
