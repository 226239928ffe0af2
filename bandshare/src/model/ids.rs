//! Identifier newtypes for products and bands.

use std::fmt;

/// Identifier of a remote product (a satellite acquisition).
///
/// The identifier doubles as the remote key prefix: every object of the
/// product lives under `<product>/`.
///
/// # Example
///
/// ```
/// use bandshare::model::ProductId;
///
/// let id = ProductId::new("S2A_MSIL1C_20170202T090201_N0204_R007_T35SNA_20170202T090155.SAFE");
/// assert_eq!(id.prefix(), format!("{}/", id));
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product identifier from its name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string value of this identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the remote listing prefix for this product (`<product>/`).
    pub fn prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl fmt::Debug for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductId({})", self.0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one spectral band, e.g. `B04`.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BandId(String);

impl BandId {
    /// Creates a band identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string value of this identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BandId({})", self.0)
    }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BandId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
