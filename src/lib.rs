//! Holdco: orchestration kernel for a self-running holding company.
//!
//! Autonomous companies, each driven by its own decision loop, trade,
//! invest, replicate and acquire one another against one shared capital
//! ledger. The kernel keeps capital conserved and every cap table whole no
//! matter how those loops interleave.

pub mod agent;
pub mod collaborators;
pub mod company;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mna;
pub mod orchestrator;
pub mod replication;
pub mod types;

pub use error::{KernelError, KernelResult};
pub use orchestrator::{Orchestrator, Scheduler, TickReport};
