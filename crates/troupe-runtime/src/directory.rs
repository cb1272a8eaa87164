//! Sharded actor directory
//!
//! Address-to-cell map split over a fixed number of independently-locked
//! buckets, chosen by hashing the canonical address string. Lookup is O(1)
//! expected; at most one live cell per address.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use troupe_core::address::Address;
use troupe_core::error::{Error, Result};

use crate::cell::AnyCell;

/// Per-bucket occupancy counts for diagnostics
#[derive(Debug, Clone)]
pub struct DirectoryStats {
    /// Total registered cells
    pub total: usize,

    /// Cell count per bucket, in bucket order
    pub per_bucket: Vec<usize>,
}

type Bucket = RwLock<HashMap<String, Arc<dyn AnyCell>>>;

pub(crate) struct Directory {
    buckets: Vec<Bucket>,
}

impl Directory {
    pub(crate) fn new(buckets: usize) -> Self {
        debug_assert!(buckets >= 1, "directory needs at least one bucket");
        Self {
            buckets: (0..buckets)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn bucket(&self, address: &Address) -> &Bucket {
        let mut hasher = DefaultHasher::new();
        address.as_str().hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.buckets.len();
        &self.buckets[index]
    }

    fn read(bucket: &Bucket) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn AnyCell>>> {
        match bucket.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(
        bucket: &Bucket,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn AnyCell>>> {
        match bucket.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a cell under its address; fails if the address is taken
    pub(crate) fn register(&self, cell: Arc<dyn AnyCell>) -> Result<()> {
        let address = cell.address().clone();
        let mut bucket = Self::write(self.bucket(&address));
        if bucket.contains_key(address.as_str()) {
            return Err(Error::AlreadyRegistered {
                address: address.as_str().into(),
            });
        }
        bucket.insert(address.as_str().into(), cell);
        Ok(())
    }

    pub(crate) fn get(&self, address: &Address) -> Option<Arc<dyn AnyCell>> {
        Self::read(self.bucket(address)).get(address.as_str()).cloned()
    }

    pub(crate) fn unregister(&self, address: &Address) -> Option<Arc<dyn AnyCell>> {
        Self::write(self.bucket(address)).remove(address.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| Self::read(bucket).len())
            .sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration (stage close, after all cells stopped)
    pub(crate) fn clear(&self) {
        for bucket in &self.buckets {
            Self::write(bucket).clear();
        }
    }

    pub(crate) fn stats(&self) -> DirectoryStats {
        let per_bucket: Vec<usize> = self
            .buckets
            .iter()
            .map(|bucket| Self::read(bucket).len())
            .collect();
        DirectoryStats {
            total: per_bucket.iter().sum(),
            per_bucket,
        }
    }
}
