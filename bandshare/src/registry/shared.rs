//! The registry shared by all workers of a job.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::board::{ProductBoard, ProductPhase};
use super::key::{RegistryKey, RegistryValue};
use crate::error::CoordinationError;
use crate::model::{BandId, ProductId};

type BoardCell = Arc<watch::Sender<ProductBoard>>;

/// Process-shared store of readiness flags and per-product election state.
///
/// Cheap to share: wrap in an `Arc` and hand a clone to every worker. Entries
/// are created on first use and live as long as the registry.
///
/// # Example
///
/// ```
/// use bandshare::model::{BandId, ProductId};
/// use bandshare::registry::{RegistryKey, RegistryValue, SharedRegistry};
///
/// let registry = SharedRegistry::new();
/// let product = ProductId::from("P");
/// let workers = RegistryKey::Workers(product.clone());
///
/// registry.init_if_absent(&workers, RegistryValue::Counter(2)).unwrap();
/// assert_eq!(registry.compare_and_decrement(&workers).unwrap(), 1);
/// assert_eq!(registry.compare_and_decrement(&workers).unwrap(), 0);
///
/// let b04 = RegistryKey::band(&product, &BandId::from("B04"));
/// assert!(!registry.is_ready(&b04));
/// registry.set(&b04, RegistryValue::Flag(true)).unwrap();
/// assert!(registry.is_ready(&b04));
/// ```
#[derive(Default)]
pub struct SharedRegistry {
    products: DashMap<ProductId, BoardCell>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the board cell of a product, creating an empty one if needed.
    ///
    /// The cell is cloned out so the map shard is not held while mutating.
    fn cell(&self, product: &ProductId) -> BoardCell {
        self.products
            .entry(product.clone())
            .or_insert_with(|| Arc::new(watch::channel(ProductBoard::default()).0))
            .value()
            .clone()
    }

    fn existing_cell(&self, product: &ProductId) -> Option<BoardCell> {
        self.products.get(product).map(|cell| Arc::clone(cell.value()))
    }

    /// Runs `f` against a product's board without creating it.
    fn read<R>(&self, product: &ProductId, f: impl FnOnce(&ProductBoard) -> R) -> Option<R> {
        let cell = self.existing_cell(product)?;
        let board = cell.borrow();
        Some(f(&board))
    }

    // =========================================================================
    // Key/value contract
    // =========================================================================

    /// Reads a value; absent keys return `None`.
    pub fn get(&self, key: &RegistryKey) -> Option<RegistryValue> {
        self.read(key.product(), |board| match key {
            RegistryKey::Band { band, .. } => {
                board.bands.get(band).copied().map(RegistryValue::Flag)
            }
            RegistryKey::Meta(_) => board.meta.map(RegistryValue::Flag),
            RegistryKey::Workers(_) => board.phase.as_ref().map(|phase| match phase {
                ProductPhase::Pending { remaining } => RegistryValue::Counter(*remaining),
                _ => RegistryValue::Counter(0),
            }),
            RegistryKey::Init(_) => match board.phase.as_ref()? {
                ProductPhase::Pending { .. } => None,
                ProductPhase::Ready => Some(RegistryValue::Flag(true)),
                ProductPhase::Leading | ProductPhase::Failed(_) => Some(RegistryValue::Flag(false)),
            },
        })
        .flatten()
    }

    /// Returns true only if `key` holds a `true` flag. Missing keys are not ready.
    pub fn is_ready(&self, key: &RegistryKey) -> bool {
        matches!(self.get(key), Some(RegistryValue::Flag(true)))
    }

    /// Writes a readiness flag and wakes the product's waiters if it changed.
    ///
    /// Flags are monotone: writing `false` over `true` is rejected. Counter
    /// and init keys are owned by the election protocol and cannot be set
    /// directly.
    pub fn set(&self, key: &RegistryKey, value: RegistryValue) -> Result<(), CoordinationError> {
        let flag = match (key.is_flag(), value) {
            (true, RegistryValue::Flag(flag)) => flag,
            _ => return Err(conflict(key, format!("cannot set {:?} directly", value))),
        };

        let cell = self.cell(key.product());
        let mut outcome = Ok(());
        cell.send_if_modified(|board| {
            let slot = match key {
                RegistryKey::Band { band, .. } => board.bands.entry(band.clone()).or_insert(false),
                _ => board.meta.get_or_insert(false),
            };
            if *slot && !flag {
                outcome = Err(conflict(key, "readiness flags cannot be reset"));
                return false;
            }
            let changed = *slot != flag;
            *slot = flag;
            changed
        });

        if outcome.is_ok() {
            trace!(key = %key, ready = flag, "Registry flag written");
        }
        outcome
    }

    /// Atomically creates `key` with `value` unless it already exists.
    ///
    /// Returns the value now stored and whether this call created it. For the
    /// workers key, creation starts the countdown at `value`.
    pub fn init_if_absent(
        &self,
        key: &RegistryKey,
        value: RegistryValue,
    ) -> Result<(RegistryValue, bool), CoordinationError> {
        match (key, value) {
            (RegistryKey::Band { .. } | RegistryKey::Meta(_), RegistryValue::Flag(flag)) => {
                let cell = self.cell(key.product());
                let mut result = (RegistryValue::Flag(flag), false);
                cell.send_if_modified(|board| {
                    let (current, created) = match key {
                        RegistryKey::Band { band, .. } => match board.bands.get(band) {
                            Some(existing) => (*existing, false),
                            None => {
                                board.bands.insert(band.clone(), flag);
                                (flag, true)
                            }
                        },
                        _ => match board.meta {
                            Some(existing) => (existing, false),
                            None => {
                                board.meta = Some(flag);
                                (flag, true)
                            }
                        },
                    };
                    result = (RegistryValue::Flag(current), created);
                    // only a new `true` flag can release a waiter
                    created && flag
                });
                Ok(result)
            }
            (RegistryKey::Workers(product), RegistryValue::Counter(count)) => {
                if count == 0 {
                    return Err(conflict(key, "countdown must start above zero"));
                }
                let cell = self.cell(product);
                let mut result = (RegistryValue::Counter(count), true);
                cell.send_if_modified(|board| match &board.phase {
                    Some(phase) => {
                        let current = match phase {
                            ProductPhase::Pending { remaining } => *remaining,
                            _ => 0,
                        };
                        result = (RegistryValue::Counter(current), false);
                        false
                    }
                    None => {
                        board.phase = Some(ProductPhase::Pending { remaining: count });
                        true
                    }
                });
                if result.1 {
                    debug!(product = %product, workers = count, "Worker countdown initialized");
                }
                Ok(result)
            }
            _ => Err(conflict(key, format!("cannot initialize with {:?}", value))),
        }
    }

    /// Atomically decrements the worker countdown and returns the new value.
    ///
    /// The call that brings the countdown to zero moves the product to
    /// [`ProductPhase::Leading`]; exactly one caller ever observes `0`.
    /// Decrementing an uninitialized or exhausted countdown is a conflict.
    pub fn compare_and_decrement(&self, key: &RegistryKey) -> Result<usize, CoordinationError> {
        let product = match key {
            RegistryKey::Workers(product) => product,
            _ => return Err(conflict(key, "only the worker countdown can be decremented")),
        };
        let cell = self
            .existing_cell(product)
            .ok_or_else(|| conflict(key, "countdown was never initialized"))?;

        let mut outcome = Err(conflict(key, "countdown was never initialized"));
        cell.send_if_modified(|board| match board.phase {
            Some(ProductPhase::Pending { remaining }) if remaining > 0 => {
                let next = remaining - 1;
                outcome = Ok(next);
                if next == 0 {
                    board.phase = Some(ProductPhase::Leading);
                    true
                } else {
                    board.phase = Some(ProductPhase::Pending { remaining: next });
                    false
                }
            }
            Some(_) => {
                outcome = Err(conflict(key, "countdown already reached zero"));
                false
            }
            None => false,
        });
        outcome
    }

    // =========================================================================
    // Product-level operations
    // =========================================================================

    /// Every band identifier registered under a product's namespace.
    pub fn bands_for(&self, product: &ProductId) -> BTreeSet<BandId> {
        self.read(product, |board| board.bands.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Current phase of a product, if its countdown exists.
    pub fn phase(&self, product: &ProductId) -> Option<ProductPhase> {
        self.read(product, |board| board.phase.clone()).flatten()
    }

    /// Returns true if any entry exists for the product.
    pub fn contains_product(&self, product: &ProductId) -> bool {
        self.products.contains_key(product)
    }

    /// Subscribes to every change of a product's board.
    pub fn subscribe(&self, product: &ProductId) -> watch::Receiver<ProductBoard> {
        self.cell(product).subscribe()
    }

    /// Clones the product's current board.
    pub fn snapshot(&self, product: &ProductId) -> ProductBoard {
        self.read(product, ProductBoard::clone).unwrap_or_default()
    }

    /// Marks the leader's download run as finished successfully.
    pub fn complete(&self, product: &ProductId) -> Result<(), CoordinationError> {
        self.finish(product, ProductPhase::Ready)
    }

    /// Broadcasts a download failure to every waiter of the product.
    pub fn fail(&self, product: &ProductId, error: CoordinationError) -> Result<(), CoordinationError> {
        self.finish(product, ProductPhase::Failed(error))
    }

    fn finish(&self, product: &ProductId, terminal: ProductPhase) -> Result<(), CoordinationError> {
        let key = RegistryKey::Init(product.clone());
        let cell = self
            .existing_cell(product)
            .ok_or_else(|| conflict(&key, "product has no leader"))?;

        let mut outcome = Ok(());
        cell.send_if_modified(|board| match board.phase {
            Some(ProductPhase::Leading) => {
                board.phase = Some(terminal);
                true
            }
            _ => {
                outcome = Err(conflict(&key, "product is not in the leading phase"));
                false
            }
        });
        outcome
    }
}

impl std::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("products", &self.products.len())
            .finish()
    }
}

fn conflict(key: &RegistryKey, reason: impl Into<String>) -> CoordinationError {
    CoordinationError::RegistrationConflict {
        key: key.to_string(),
        reason: reason.into(),
    }
}
