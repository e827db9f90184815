//! Write-bounds guard passes for SSA MIR
//!
//! This library analyzes MIR functions for data reachable from untrusted
//! input and instruments memory writes with runtime range checks:
//!
//! - `taint-track` marks every value reachable from the arguments of
//!   recognized input-source calls and reports which of them are written to
//!   memory.
//! - `bounds-guard` synthesizes (lower bound, extent) metadata for pointers,
//!   propagates it through the def-use graph, merges, calls and local
//!   storage, then guards every bounded store with a branch to a shared
//!   fault block.

pub mod compiler;
pub mod config;

pub use compiler::{GuardError, PassManager};
pub use config::GuardConfig;
