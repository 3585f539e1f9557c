use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::{CoreError, Result};
use crate::models::{AccessionNo, CatalogEntry};

use super::CatalogRepository;

#[derive(Debug, Default)]
struct CatalogState {
    entries: Vec<CatalogEntry>,
    /// Highest accession number ever handed out, including withdrawn ones.
    high_water: u64,
}

/// Catalog kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the catalog. Entries keep their accession numbers when they have
    /// one; the rest are numbered after the highest seen so far.
    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut entries: Vec<CatalogEntry> = entries.into_iter().collect();
        let mut high_water = entries
            .iter()
            .filter_map(|e| e.accession_no.map(|n| n.value()))
            .max()
            .unwrap_or(0);
        for entry in entries.iter_mut().filter(|e| e.accession_no.is_none()) {
            high_water += 1;
            entry.accession_no = Some(AccessionNo::new(high_water));
        }
        entries.sort_by_key(|e| e.accession_no);

        Self {
            state: Mutex::new(CatalogState {
                entries,
                high_water,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogRepository for InMemoryCatalog {
    fn fetch_all_entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.state().entries.clone())
    }

    fn append_entry(&self, mut entry: CatalogEntry) -> Result<AccessionNo> {
        if let Some(existing) = entry.accession_no {
            return Err(CoreError::AccessionAlreadyAssigned(existing));
        }

        let mut state = self.state();
        state.high_water += 1;
        let accession_no = AccessionNo::new(state.high_water);
        entry.accession_no = Some(accession_no);
        entry.added_at.get_or_insert_with(Utc::now);
        state.entries.push(entry);
        Ok(accession_no)
    }

    fn find_entry(&self, accession_no: AccessionNo) -> Result<Option<CatalogEntry>> {
        Ok(self
            .state()
            .entries
            .iter()
            .find(|e| e.accession_no == Some(accession_no))
            .cloned())
    }

    fn withdraw_entry(&self, accession_no: AccessionNo) -> Result<bool> {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|e| e.accession_no != Some(accession_no));
        Ok(state.entries.len() < before)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.state().entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_seeded_entries_are_numbered_after_existing() {
        let mut numbered = CatalogEntry::new("Old", "A");
        numbered.accession_no = Some(AccessionNo::new(10));
        let catalog = InMemoryCatalog::with_entries([CatalogEntry::new("New", "B"), numbered]);

        let entries = catalog.fetch_all_entries().unwrap();
        assert_eq!(entries[0].accession_no, Some(AccessionNo::new(10)));
        assert_eq!(entries[1].accession_no, Some(AccessionNo::new(11)));
        assert_eq!(
            catalog.append_entry(CatalogEntry::new("Next", "C")).unwrap(),
            AccessionNo::new(12)
        );
    }

    #[test]
    fn test_withdrawal_does_not_free_number() {
        let catalog = InMemoryCatalog::new();
        let first = catalog.append_entry(CatalogEntry::new("A", "")).unwrap();
        assert!(catalog.withdraw_entry(first).unwrap());
        let second = catalog.append_entry(CatalogEntry::new("B", "")).unwrap();
        assert_eq!(second.value(), 2);
        assert!(catalog.find_entry(first).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_appends_get_distinct_numbers() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    catalog
                        .append_entry(CatalogEntry::new(format!("Book {i}"), ""))
                        .unwrap()
                })
            })
            .collect();

        let mut numbers: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().value())
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        assert_eq!(catalog.count().unwrap(), 8);
    }
}
