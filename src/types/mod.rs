// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod message;
pub mod session;

// Re-exports
pub use chat_request::{ChatRequest, WireMessage};
pub use chat_response::ChatResponse;
pub use message::{Message, Role};
pub use session::{DEFAULT_TITLE, Session, TITLE_MAX_CHARS, UNTITLED, derive_title};
