use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Record identifier. ULID so generated ids sort by creation time,
/// but any caller-supplied opaque string is accepted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct VisitId(String);

impl Display for VisitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VisitId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VisitId(s.to_string()))
    }
}

impl Deref for VisitId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for VisitId {
    fn from(fr: &str) -> Self {
        VisitId(fr.to_string())
    }
}

impl From<String> for VisitId {
    fn from(fr: String) -> Self {
        VisitId(fr)
    }
}

impl From<VisitId> for String {
    fn from(fr: VisitId) -> Self {
        fr.0
    }
}

impl VisitId {
    #[inline]
    pub fn new() -> VisitId {
        VisitId(rusty_ulid::generate_ulid_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VisitId {
    fn default() -> Self {
        Self::new()
    }
}
