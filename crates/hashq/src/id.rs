use crate::Error;
use core::{fmt, num::NonZeroU64, str::FromStr};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a dispatched unit of work.
///
/// Identifiers are positive, strictly increasing in issuance order and never
/// reused for the lifetime of the process. They render as plain decimal text,
/// which is also the only accepted textual form when parsing.
///
/// # Example
///
/// ```
/// use hashq::HashId;
///
/// let id: HashId = "42".parse().unwrap();
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.to_string(), "42");
///
/// assert!("0".parse::<HashId>().is_err());
/// assert!("+7".parse::<HashId>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashId(NonZeroU64);

impl HashId {
    /// Returns `None` for zero, which is never issued.
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HashId {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedId {
            raw: raw.to_string(),
        };

        // `u64::from_str` tolerates a leading `+`; identifiers are digits only.
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        raw.parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(malformed)
    }
}

impl From<HashId> for u64 {
    fn from(id: HashId) -> Self {
        id.get()
    }
}
