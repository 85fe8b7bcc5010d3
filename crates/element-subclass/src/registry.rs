//! Generation-counted slot arena mapping opaque 64-bit handles to host values.
//!
//! Handles travel through the foreign instance's private slot, so they are
//! plain integers: `generation:32 | shard:8 | index:24`. A slot's generation
//! is bumped on release, which turns every outstanding copy of the old handle
//! stale. Slots whose generation would wrap are retired instead of reused.

use std::any::Any;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::{config, SubclassConfig};
use crate::error::{RegistryFull, ResolveError};

pub type HostValue = Arc<dyn Any + Send + Sync>;

const INDEX_BITS: u32 = 24;
const SHARD_BITS: u32 = 8;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const SHARD_MASK: u64 = (1 << SHARD_BITS) - 1;
const MAX_SLOTS_PER_SHARD: usize = 1 << INDEX_BITS;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    fn new(generation: u32, shard: usize, index: usize) -> Self {
        let raw = (u64::from(generation) << (INDEX_BITS + SHARD_BITS))
            | ((shard as u64 & SHARD_MASK) << INDEX_BITS)
            | (index as u64 & INDEX_MASK);
        // generations start at 1, so the high half is never zero
        Handle(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Handle)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }

    pub fn generation(self) -> u32 {
        (self.0.get() >> (INDEX_BITS + SHARD_BITS)) as u32
    }

    pub fn shard(self) -> usize {
        ((self.0.get() >> INDEX_BITS) & SHARD_MASK) as usize
    }

    pub fn index(self) -> usize {
        (self.0.get() & INDEX_MASK) as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("generation", &self.generation())
            .field("shard", &self.shard())
            .field("index", &self.index())
            .finish()
    }
}

struct Slot {
    generation: u32,
    value: Option<HostValue>,
}

#[derive(Default)]
struct Shard {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Shard {
    fn insert(&mut self, shard: usize, value: HostValue) -> Result<Handle, RegistryFull> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Ok(Handle::new(slot.generation, shard, index as usize));
        }
        let index = self.slots.len();
        if index >= MAX_SLOTS_PER_SHARD {
            return Err(RegistryFull { shard });
        }
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Ok(Handle::new(1, shard, index))
    }

    fn slot(&self, handle: Handle) -> Result<&Slot, ResolveError> {
        let slot = self.slots.get(handle.index()).ok_or(ResolveError::Invalid)?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return Err(ResolveError::Stale);
        }
        Ok(slot)
    }
}

pub struct Registry {
    shards: Box<[RwLock<Shard>]>,
    next_shard: AtomicUsize,
    live: AtomicUsize,
}

impl Registry {
    /// Creates a registry with `shards` shards, clamped to `1..=256`.
    pub fn new(shards: usize) -> Self {
        let shards = shards.clamp(1, SubclassConfig::MAX_SHARDS);
        Self {
            shards: (0..shards).map(|_| RwLock::new(Shard::default())).collect(),
            next_shard: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register(&self, value: HostValue) -> Result<Handle, RegistryFull> {
        let start = self.next_shard.fetch_add(1, Ordering::Relaxed);
        let mut last_error = RegistryFull { shard: 0 };
        for offset in 0..self.shards.len() {
            let shard = (start + offset) % self.shards.len();
            match self.shards[shard].write().insert(shard, value.clone()) {
                Ok(handle) => {
                    self.live.fetch_add(1, Ordering::AcqRel);
                    log::trace!(target: "element_subclass::registry", "registered {handle:?}");
                    return Ok(handle);
                }
                Err(err) => last_error = err,
            }
        }
        log::error!(target: "element_subclass::registry", "{last_error}");
        Err(last_error)
    }

    pub fn resolve(&self, handle: Handle) -> Result<HostValue, ResolveError> {
        let shard = self.shards.get(handle.shard()).ok_or(ResolveError::Invalid)?;
        let shard = shard.read();
        let slot = shard.slot(handle)?;
        slot.value.clone().ok_or(ResolveError::Stale)
    }

    pub fn resolve_as<T: Any + Send + Sync>(&self, handle: Handle) -> Result<Arc<T>, ResolveError> {
        self.resolve(handle)?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch)
    }

    /// Removes the entry and hands back the stored value. The handle and
    /// every copy of it become stale.
    pub fn release(&self, handle: Handle) -> Result<HostValue, ResolveError> {
        let shard = self.shards.get(handle.shard()).ok_or(ResolveError::Invalid)?;
        let mut shard = shard.write();
        shard.slot(handle)?;
        let index = handle.index();
        let slot = &mut shard.slots[index];
        let value = slot.value.take().ok_or(ResolveError::Stale)?;
        if slot.generation == u32::MAX {
            log::debug!(target: "element_subclass::registry", "retiring slot {index} of shard {}", handle.shard());
        } else {
            slot.generation += 1;
            shard.free.push(index as u32);
        }
        self.live.fetch_sub(1, Ordering::AcqRel);
        log::trace!(target: "element_subclass::registry", "released {handle:?}");
        Ok(value)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("shards", &self.shards.len())
            .field("live", &self.len())
            .finish()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::new(config().registry_shards));

/// Process-wide registry used for instance handles and dispose notifies.
pub fn registry() -> &'static Registry {
    &REGISTRY
}
