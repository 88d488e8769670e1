//! Translation between caller-facing types and backend requests.
//!
//! Key namespacing happens in the dispatcher; everything here receives the
//! already-translated backend key.

use harbor_state::{self as state, BulkGetResponse, DeleteRequest, GetResponse, SetRequest};

use crate::keys::original_key;
use crate::request::{BulkStateItem, GetStateResponse, StateItem, StateOptions};

/// Map caller options to backend vocabulary. Absent options become empty
/// strings on both fields.
pub(crate) fn backend_options(options: Option<&StateOptions>) -> state::StateOptions {
    match options {
        Some(opts) => state::StateOptions {
            concurrency: opts.concurrency.as_str().to_string(),
            consistency: opts.consistency.as_str().to_string(),
        },
        None => state::StateOptions::default(),
    }
}

pub(crate) fn set_request(item: StateItem, key: String) -> SetRequest {
    SetRequest {
        key,
        options: backend_options(item.options.as_ref()),
        value: item.value,
        etag: item.etag,
        metadata: item.metadata,
    }
}

pub(crate) fn delete_request(item: StateItem, key: String) -> DeleteRequest {
    DeleteRequest {
        key,
        options: backend_options(item.options.as_ref()),
        etag: item.etag,
        metadata: item.metadata,
    }
}

impl From<GetResponse> for GetStateResponse {
    fn from(resp: GetResponse) -> Self {
        Self {
            data: resp.data.unwrap_or_default(),
            etag: resp.etag,
            metadata: resp.metadata,
        }
    }
}

/// A bulk read entry, re-keyed to the caller's original key.
pub(crate) fn bulk_item(resp: BulkGetResponse) -> BulkStateItem {
    BulkStateItem {
        key: original_key(&resp.key).to_string(),
        data: resp.data.unwrap_or_default(),
        etag: resp.etag,
        metadata: resp.metadata,
        error: resp.error,
    }
}
