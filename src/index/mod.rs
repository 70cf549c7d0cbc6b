//! Index build: page text to lemma and posting rows
//!
//! Writes that keep hitting a transient conflict are deferred to a
//! [`PendingFinalization`] set and replayed once after the site's crawl.

mod pending;
mod retry;
mod writer;

pub use pending::{PendingEntry, PendingFinalization};
pub use retry::{RetryOutcome, RetryPolicy};
pub use writer::{FinalizeReport, IndexOutcome, IndexWriter};
