//! Derived-fact inference passes.
//!
//! Everything in this module consumes the structural layers — decoded instructions, basic
//! blocks, the control flow graph — through the abstract stack interpreter and produces facts
//! about the contract: which public functions exist, what arguments they take, whether they
//! touch state, and how storage is laid out. Each pass is independently invocable and walks
//! within its own interpreter budget.
//!
//! # Passes
//! - [`recover_dispatch`] - Selector and fallback recovery from the dispatcher prologue
//! - [`infer_arguments`] - Calldata-load tracking and ABI type guessing per function
//! - [`infer_state_mutability`] - `pure`/`view`/`nonpayable`/`payable` classification
//! - [`recover_storage`] - Slot layout from storage access sites, packed variables included

mod arguments;
mod mutability;
mod selectors;
mod storage;

pub use arguments::{infer_arguments, AbiType};
pub use mutability::{infer_state_mutability, StateMutability};
pub use selectors::{recover_dispatch, Dispatch, Selector};
pub use storage::{recover_storage, StorageSlot};
