//! In-memory state that lives outside the database.

mod typing;

pub use typing::TypingCache;
