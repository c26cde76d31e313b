//! Gates the dashboard behind a shared access code.

use serde::Serialize;
use tracing::debug;

pub const INVALID_CODE: &str = "Invalid code. Please try again.";

/// The outcome of checking a candidate code.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Granted,
    /// `notice` is shown next to the form. Nothing is shown for an empty submission.
    Denied { notice: Option<String> },
}

impl Verdict {
    pub fn is_granted(&self) -> bool {
        matches!(self, Verdict::Granted)
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            Verdict::Granted => None,
            Verdict::Denied { notice } => notice.as_deref(),
        }
    }
}

/// Compares candidates against the configured code. There is no lockout and no hashing.
#[derive(Clone)]
pub struct Authenticator {
    code: String,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn verify(&self, candidate: &str) -> Verdict {
        if candidate == self.code {
            debug!("Access code accepted");
            return Verdict::Granted;
        }
        debug!("Access code rejected");
        Verdict::Denied {
            notice: (!candidate.is_empty()).then(|| INVALID_CODE.to_string()),
        }
    }
}
