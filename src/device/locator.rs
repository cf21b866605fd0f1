//! Element locators
//!
//! A locator names an element by the package that owns it and the stable
//! key it was given in the app layout. On Android the pair maps to the
//! resource id `package:id/key`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Locates a UI element by owning package and resource key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub package: String,
    pub key: String,
}

impl Locator {
    pub fn new(package: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            key: key.into(),
        }
    }

    /// Full resource id as it appears in the UI hierarchy
    pub fn resource_id(&self) -> String {
        format!("{}:id/{}", self.package, self.key)
    }

    /// Parse a full resource id (`package:id/key`)
    pub fn from_resource_id(resource_id: &str) -> Option<Self> {
        let (package, key) = resource_id.split_once(":id/")?;
        if package.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(package, key))
    }

    /// Parse user input: either a full resource id or a bare key in `package`
    pub fn parse(input: &str, package: &str) -> Self {
        Self::from_resource_id(input).unwrap_or_else(|| Self::new(package, input))
    }

    /// Whether a node resource id refers to this element
    pub fn matches(&self, resource_id: &str) -> bool {
        resource_id
            .strip_prefix(self.package.as_str())
            .and_then(|rest| rest.strip_prefix(":id/"))
            == Some(self.key.as_str())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:id/{}", self.package, self.key)
    }
}
