//! Structured registry keys and values.

use std::fmt;

use crate::model::{BandId, ProductId};

/// Key of a registry entry, namespaced by product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    /// Readiness flag of one band object.
    Band { product: ProductId, band: BandId },
    /// Readiness flag of the product's metadata objects.
    Meta(ProductId),
    /// Countdown of workers still to register (`nbproc`).
    Workers(ProductId),
    /// Set once the countdown has elected a leader.
    Init(ProductId),
}

impl RegistryKey {
    /// Key of a band readiness flag.
    pub fn band(product: &ProductId, band: &BandId) -> Self {
        Self::Band {
            product: product.clone(),
            band: band.clone(),
        }
    }

    /// Product namespace of this key.
    pub fn product(&self) -> &ProductId {
        match self {
            Self::Band { product, .. }
            | Self::Meta(product)
            | Self::Workers(product)
            | Self::Init(product) => product,
        }
    }

    /// Returns true for keys holding a readiness flag.
    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Band { .. } | Self::Meta(_))
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Band { product, band } => write!(f, "{}:{}", product, band),
            Self::Meta(product) => write!(f, "{}:meta", product),
            Self::Workers(product) => write!(f, "{}:nbproc", product),
            Self::Init(product) => write!(f, "{}:init", product),
        }
    }
}

/// Value stored under a [`RegistryKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryValue {
    Flag(bool),
    Counter(usize),
}

impl RegistryValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            Self::Counter(_) => None,
        }
    }

    pub fn as_counter(&self) -> Option<usize> {
        match self {
            Self::Counter(v) => Some(*v),
            Self::Flag(_) => None,
        }
    }
}
