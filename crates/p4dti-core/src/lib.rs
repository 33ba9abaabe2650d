//! Core domain types for the p4dti replicator.
//!
//! This crate contains the entities and pure logic shared by both adapters
//! and the replicator core: [`issue::Issue`], [`job::Job`]/[`job::Jobspec`],
//! [`fix::Fix`], [`filespec::Filespec`], [`changelist::Changelist`], the
//! [`link::Link`] row, the shared [`enums`], content hashing for the
//! consistency audit, and the invariant checks applied during an issue
//! update.

pub mod changelist;
pub mod content_hash;
pub mod enums;
pub mod filespec;
pub mod fix;
pub mod issue;
pub mod job;
pub mod link;
pub mod validation;
