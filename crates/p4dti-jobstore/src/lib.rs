//! Job-side adapter for the p4dti replicator.
//!
//! Wraps a subprocess-oriented revision-control client that speaks a
//! marshalled-dictionary protocol. [`protocol::JobClient`] is the thin
//! transport boundary (command execution, encoding negotiation);
//! [`store::JobStore`] is the higher-level trait the replicator core
//! polls against, covering jobspec lifecycle, event-log tailing,
//! counters, fixes and user lookup. [`store::ProcessJobStore`] is the
//! only shipped implementation, built on [`protocol::ProcessJobClient`].

pub mod error;
pub mod jobspec;
pub mod protocol;
pub mod store;

pub use error::{JobStoreError, Result};
pub use protocol::{EncodingMode, JobClient, ProcessJobClient};
pub use store::{JobStore, JobStoreUser, ProcessJobStore};
