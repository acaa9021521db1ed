//! Policy service: the request pipeline.
//!
//! Reads run evaluate → scope or conceal → fetch → expand and mask, all
//! against one snapshot. Writes authorize against a snapshot and commit with
//! that snapshot's version, retrying from fresh state on a lost race:
//!
//! 1. **Relay creation** commits the relay, the creator's owner edge and a
//!    member invitation together
//! 2. **Membership management** enforces owner rank, the relay user limit
//!    and the owned-relay limit
//! 3. **Invitations** let a key holder join without any prior membership
//!
//! Single-record denials leave this module as [`ServiceError::NotFound`],
//! indistinguishable from a missing record.
//!
//! [`ServiceError::NotFound`]: crate::error::ServiceError::NotFound

mod handler;
mod keys;
mod types;
mod writes;

pub use handler::PolicyService;
pub use types::{CreatedRelay, ServiceConfig, UserUpdate};

#[cfg(test)]
mod tests;
