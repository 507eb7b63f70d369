//! Values shared between the pipeline and its callers.

use std::fmt;

use uuid::Uuid;

use crate::error::FetchError;

/// Terminal value of a fetch: the raw response bytes, headers included, or
/// the reason it failed. There is no partial success.
pub type Outcome = Result<Vec<u8>, FetchError>;

/// Identity of one pipeline instance. Carried on its tracing span and on
/// the handle so log lines and results can be matched up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(Uuid);

impl FetchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FetchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first group is enough to tell concurrent fetches apart in logs.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}
