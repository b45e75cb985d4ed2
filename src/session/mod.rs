//! Wallet session lifecycle and persistence.

mod manager;
mod store;

pub use self::manager::{ConnectEvent, SessionManager};
pub use self::store::{
    FileSessionStore, MemorySessionStore, PersistedSessionRecord, SESSION_NAMESPACE, SessionStore,
};
