//! Collaborators the pipeline drives through narrow interfaces.
//!
//! - [`BinaryProvider`] supplies the consensus binary that creates the
//!   testnet skeleton.
//! - [`AccountSource`] supplies the signing accounts, index-aligned with
//!   nodes.
//! - [`ExecutionGenesisSource`] supplies the execution-layer genesis.

mod accounts;
mod binary;
mod execution_genesis;
mod process;

pub use accounts::{AccountSource, GeneratedAccounts, SignerDump};
pub use binary::{BinaryProvider, PrebuiltBinary, SourceBuild};
pub use execution_genesis::{DefaultExecutionGenesis, ExecutionGenesisSource, ExecutionGenesisTemplate};
pub use process::run_command;
