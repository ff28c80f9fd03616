//! Browser sessions: principal serialization and the pluggable store behind it.

pub mod codec;
mod store;

pub use codec::{SessionCodec, SessionDecodeError, SessionLookup, SessionRecord};
pub use store::{InMemorySessionStore, SessionStore};
