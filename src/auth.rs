//! Auth-domain identifiers, authorization state, and credential payloads.

pub mod credential;
pub mod id;
pub mod secret;
pub mod state;

pub use credential::*;
pub use id::*;
pub use secret::*;
pub use state::*;
