//! Fetch executor
//!
//! Everything that talks to the remote service in bulk goes through here:
//! - a strictly sequential paginator for listing endpoints
//! - a bounded worker pool that fetches message details with retry/backoff
//! - a sequential chunked mutator for batch label changes

mod batch;
mod paginate;
mod pool;
mod retry;

pub use batch::modify_labels;
pub use paginate::paginate;
pub use pool::{fetch_messages, fetch_messages_with_progress};
pub use retry::{Attempt, RetryPolicy};
