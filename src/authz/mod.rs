//! Access resolution for deployment approvals
//!
//! A requester may hold grants at four breadths:
//! - Exact: one environment of one repository (`repo#env`)
//! - Repo: every environment of a repository (`repo#*`)
//! - Environment: one environment across all repositories (`*#env`)
//! - Org: everything (`*#*`)
//!
//! Any one of them is sufficient; there is no precedence among them.

mod resolver;
mod scope;

pub use resolver::{AccessResolver, DEFAULT_LOOKUP_TIMEOUT};
pub use scope::{AccessScope, PermissionKey};
