//! Network interface device names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A validated network interface name.
///
/// Must be non-empty, at most 15 bytes (the kernel's `IFNAMSIZ - 1`), and
/// contain no whitespace, `/`, or `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceName(String);

impl DeviceName {
    /// Validate and construct a device name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > 15 {
            return Err(Error::InvalidFormat(format!(
                "device name {name:?} must be 1-15 bytes"
            )));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == ':')
        {
            return Err(Error::InvalidFormat(format!(
                "device name {name:?} contains a forbidden character"
            )));
        }
        Ok(DeviceName(name))
    }

    /// Borrow the device name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DeviceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for DeviceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceName::new(s)
    }
}
