mod catalog_repository;
mod memory;

pub use catalog_repository::SqliteCatalogRepository;
pub use memory::InMemoryCatalog;

use crate::error::Result;
use crate::models::{AccessionNo, CatalogEntry};

/// Persistence boundary for catalog entries.
///
/// Implementations own accession-number assignment: `append_entry` must hand
/// out each number once, in increasing order, and never reuse one.
pub trait CatalogRepository: Send + Sync {
    /// Every persisted entry, in accession order.
    fn fetch_all_entries(&self) -> Result<Vec<CatalogEntry>>;

    /// Persists a new entry and returns the accession number it was given.
    /// Entries that already carry an accession number are rejected.
    fn append_entry(&self, entry: CatalogEntry) -> Result<AccessionNo>;

    fn find_entry(&self, accession_no: AccessionNo) -> Result<Option<CatalogEntry>>;

    /// Removes an entry from the catalog. Its accession number stays retired.
    fn withdraw_entry(&self, accession_no: AccessionNo) -> Result<bool>;

    fn count(&self) -> Result<usize>;
}
