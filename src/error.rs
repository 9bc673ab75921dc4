//! Unhandled request faults
//!
//! Every expected failure (bad token, bad body, unknown route) becomes a JSON
//! response inside the router. The variants here are the ones the router
//! does not handle; the connection layer turns them into a bare 500.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("stored secrets blob is not a JSON object: {0}")]
    CorruptBlob(#[source] serde_json::Error),
}
