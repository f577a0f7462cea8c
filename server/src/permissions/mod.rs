//! Permission system types and utilities.
//!
//! Three inputs decide what a member may do:
//! - Degree (1-3): gates content, events and library documents
//! - Officer role: one active position per member, mapped to a group
//! - Codenames: direct grants stored as bitflags, filled by the cascade

pub mod cascade;
pub mod degree;
pub mod guards;
pub mod lodge;
pub mod officer;

pub use degree::Degree;
pub use guards::{AccessContext, PermissionError};
pub use lodge::LodgePermissions;
pub use officer::OfficerRoleCode;
