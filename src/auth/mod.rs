//! Account boundary: registration, login, token issuance.
//!
//! External collaborator of the relay engine; the engine itself never
//! checks usernames against this store.

pub mod handler;
pub mod store;
pub mod token;

pub use store::{AuthError, UserProfile, UserStore};
pub use token::TokenIssuer;
