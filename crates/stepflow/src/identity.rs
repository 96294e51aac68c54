//! Execution identities keying runners and published contexts.

use derive_more::{Deref, From};
use std::fmt;

/// Key of one logical execution unit: a worker thread or a test class.
///
/// # Examples
///
/// ```
/// use stepflow::RunnerIdentity;
///
/// let id = RunnerIdentity::from("worker-1");
/// assert_eq!(id.as_str(), "worker-1");
/// assert_eq!(RunnerIdentity::fixed().as_str(), "0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deref, From)]
pub struct RunnerIdentity(String);

impl RunnerIdentity {
    /// Identity used for every identity-less lookup when parallel execution
    /// is disabled.
    pub const FIXED: &'static str = "0";

    /// Wrap a caller-chosen key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Identity of the calling OS thread.
    #[must_use]
    pub fn current_thread() -> Self {
        Self(format!("{:?}", std::thread::current().id()))
    }

    /// The fixed logical identity.
    #[must_use]
    pub fn fixed() -> Self {
        Self(Self::FIXED.to_owned())
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunnerIdentity {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl fmt::Display for RunnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
