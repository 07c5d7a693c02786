//! Client-facing sync requests.
//!
//! [`RequestPool`] turns a since token into a response: it computes every
//! category's delta against one composed `to` token and, when nothing is new,
//! parks on the [`Notifier`](crate::notifier::Notifier) until something is or
//! the timeout passes.

mod pool;
mod request;
mod response;

pub use pool::RequestPool;
pub use request::SyncRequest;
pub use response::SyncResponse;
