//! Bijective field translators between the issue-side and job-side
//! representations of the p4dti replicator.
//!
//! Each module translates one field type in both directions, `to_1` for
//! side-0-to-side-1 and `to_0` for the reverse; [`status::StatusTranslator`]
//! and [`user::UserTranslator`] additionally carry state built once per
//! configuration (status) or poll cycle (user), since their mappings are
//! not derivable from a single value in isolation.

pub mod date;
pub mod enum_field;
pub mod error;
pub mod int;
pub mod keyword;
pub mod status;
pub mod text;
pub mod user;

pub use date::Side1DateForm;
pub use error::{Result, TranslateError};
pub use status::StatusTranslator;
pub use user::{Mode as UserMode, Side0User, Side1User, UserTranslator};
