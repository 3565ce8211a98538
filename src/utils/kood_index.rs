use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::{Stream, StreamExt};
use moka::future::Cache;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use crate::store::StoreError;

/// Expected capacity and false-positive rate.
/// Tune these based on real registry sizes.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Fast kood ownership lookups for one registry (clients or employees).
///
/// The cuckoo filter answers "definitely unused" without touching the
/// database; the moka cache answers "owned by id N" for recently seen codes.
/// Everything else falls through to the store, whose unique key stays the
/// final word.
pub struct KoodIndex {
    name: &'static str,
    filter: RwLock<CuckooFilter<String>>,
    owners: Cache<String, u64>,
}

impl KoodIndex {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            owners: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    /// Check if a kood might be registered (false positives possible)
    pub fn might_exist(&self, kood: &str) -> bool {
        match self.filter.read() {
            Ok(filter) => filter.contains(&kood.to_string()),
            // a poisoned filter can't prove absence
            Err(_) => true,
        }
    }

    /// Returns the id owning `kood`, consulting `lookup` only when the
    /// filter and cache can't answer.
    pub async fn owner_of<F, Fut>(&self, kood: &str, lookup: F) -> Result<Option<u64>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<u64>, StoreError>>,
    {
        if !self.might_exist(kood) {
            return Ok(None);
        }

        if let Some(id) = self.owners.get(kood).await {
            return Ok(Some(id));
        }

        let owner = lookup().await?;
        if let Some(id) = owner {
            self.owners.insert(kood.to_string(), id).await;
        }
        Ok(owner)
    }

    /// Record a freshly stored kood
    pub async fn insert(&self, kood: &str, owner: u64) {
        if let Ok(mut filter) = self.filter.write() {
            filter.add(&kood.to_string());
        }
        self.owners.insert(kood.to_string(), owner).await;
    }

    /// Forget a kood after its record was deleted or re-coded
    pub async fn remove(&self, kood: &str) {
        if let Ok(mut filter) = self.filter.write() {
            filter.remove(&kood.to_string());
        }
        self.owners.invalidate(kood).await;
    }

    /// Load every stored kood into the filter and cache, in batches.
    pub async fn warmup<S>(&self, mut rows: S, batch_size: usize) -> Result<()>
    where
        S: Stream<Item = Result<(String, u64), StoreError>> + Unpin,
    {
        let batch_size = batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = rows.next().await {
            let entry = row.map_err(|e| anyhow!("{} kood fetch failed: {}", self.name, e))?;
            batch.push(entry);
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch).await?;
        }

        log::info!("{} kood index warmup complete: {} records", self.name, total);
        Ok(())
    }

    async fn insert_batch(&self, batch: &[(String, u64)]) -> Result<()> {
        {
            let mut filter = self
                .filter
                .write()
                .map_err(|_| anyhow!("{} kood filter poisoned", self.name))?;
            for (kood, _) in batch {
                filter.add(kood);
            }
        }

        let inserts: Vec<_> = batch
            .iter()
            .map(|(kood, id)| self.owners.insert(kood.clone(), *id))
            .collect();
        futures::future::join_all(inserts).await;
        Ok(())
    }
}

/// One index per registry that carries a unique kood.
pub struct KoodRegistry {
    pub clients: KoodIndex,
    pub employees: KoodIndex,
}

impl KoodRegistry {
    pub fn new() -> Self {
        Self {
            clients: KoodIndex::new("client"),
            employees: KoodIndex::new("employee"),
        }
    }
}

impl Default for KoodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
