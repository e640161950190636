//! Batch scheduling over primary and promoted SKU queries.
//!
//! Promoted SKUs are always served first; the remaining batch capacity walks
//! the primary set from a cursor, so every primary SKU is revisited within
//! `ceil(primary / batch_size)` calls when nothing is promoted.

use std::collections::{HashMap, HashSet};

use crate::core::product::SkuQuery;

/// Scheduler tuning, hot-reloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Maximum SKUs per batch.
    pub batch_size: usize,
    /// Consecutive misses before a SKU is reset to the unloaded record.
    pub unload_threshold: u32,
    /// Consecutive empty size lists before persisted sizes may be cleared.
    pub size_reset_threshold: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            unload_threshold: 3,
            size_reset_threshold: 2,
        }
    }
}

/// Round-robin cursor over primary SKUs plus a promoted fast lane.
#[derive(Debug, Clone, Default)]
pub struct SkuScheduler {
    settings: SchedulerSettings,
    primary: Vec<SkuQuery>,
    promoted: Vec<SkuQuery>,
    pointer: usize,
    misses: HashMap<SkuQuery, u32>,
    unloaded: HashSet<SkuQuery>,
    empty_sizes: HashMap<SkuQuery, u32>,
}

impl SkuScheduler {
    /// Create a scheduler over an initial primary set. Duplicates are dropped.
    #[must_use]
    pub fn new(settings: SchedulerSettings, primary: impl IntoIterator<Item = SkuQuery>) -> Self {
        let mut scheduler = Self {
            settings,
            ..Self::default()
        };
        for sku in primary {
            scheduler.add_primary(sku);
        }
        scheduler
    }

    /// Serve the next batch and advance the cursor.
    pub fn next_batch(&mut self) -> Vec<SkuQuery> {
        let size = self.settings.batch_size.max(1);
        let mut batch: Vec<SkuQuery> = self.promoted.iter().take(size).cloned().collect();

        let len = self.primary.len();
        if len == 0 {
            self.pointer = 0;
            return batch;
        }

        let mut index = self.pointer % len;
        let mut visited = 0;
        while batch.len() < size && visited < len {
            let sku = &self.primary[index];
            if !batch.contains(sku) {
                batch.push(sku.clone());
            }
            index = (index + 1) % len;
            visited += 1;
        }
        self.pointer = index;

        batch
    }

    /// Add a SKU to the primary set; a promoted copy is dropped. Returns
    /// `false` if already primary.
    pub fn add_primary(&mut self, sku: SkuQuery) -> bool {
        if self.primary.contains(&sku) {
            return false;
        }
        self.promoted.retain(|p| p != &sku);
        self.primary.push(sku);
        true
    }

    /// Remove a SKU from the primary set, keeping the cursor valid.
    pub fn remove_primary(&mut self, sku: &SkuQuery) -> bool {
        let Some(index) = self.primary.iter().position(|p| p == sku) else {
            return false;
        };
        self.primary.remove(index);
        if index < self.pointer {
            self.pointer -= 1;
        }
        if self.pointer >= self.primary.len() {
            self.pointer = 0;
        }
        self.misses.remove(sku);
        self.unloaded.remove(sku);
        self.empty_sizes.remove(sku);
        true
    }

    /// Inject a discovery SKU. Ignored if already primary or promoted.
    pub fn promote(&mut self, sku: SkuQuery) -> bool {
        if self.primary.contains(&sku) || self.promoted.contains(&sku) {
            return false;
        }
        self.promoted.push(sku);
        true
    }

    /// Drop promoted SKUs that were observed.
    pub fn resolve_promoted(&mut self, resolved: &[SkuQuery]) {
        self.promoted.retain(|p| !resolved.contains(p));
    }

    /// Account for one served batch. `observed` SKUs have their miss counter
    /// cleared; requested primary SKUs that were missing count a miss.
    ///
    /// Returns the SKUs whose miss counter just reached the unload threshold.
    /// Each SKU is returned once until it is observed again.
    pub fn record_batch_result(
        &mut self,
        requested: &[SkuQuery],
        observed: &[SkuQuery],
    ) -> Vec<SkuQuery> {
        let threshold = self.settings.unload_threshold.max(1);
        let mut unload = Vec::new();

        for sku in requested {
            if observed.contains(sku) {
                self.misses.remove(sku);
                self.unloaded.remove(sku);
                continue;
            }
            if !self.primary.contains(sku) {
                continue;
            }

            let misses = self.misses.entry(sku.clone()).or_insert(0);
            *misses = misses.saturating_add(1);
            if *misses >= threshold && self.unloaded.insert(sku.clone()) {
                unload.push(sku.clone());
            }
        }

        unload
    }

    /// Track consecutive empty size lists for a SKU. Returns whether an empty
    /// list may now overwrite persisted sizes.
    pub fn observe_sizes(&mut self, sku: &SkuQuery, sizes_empty: bool) -> bool {
        if !sizes_empty {
            self.empty_sizes.remove(sku);
            return false;
        }
        let count = self.empty_sizes.entry(sku.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count >= self.settings.size_reset_threshold
    }

    /// Apply new tuning.
    pub fn apply_settings(&mut self, settings: SchedulerSettings) {
        self.settings = settings;
    }

    /// Whether a SKU is in the primary set.
    #[must_use]
    pub fn is_primary(&self, sku: &SkuQuery) -> bool {
        self.primary.contains(sku)
    }

    /// Whether a SKU is waiting in the promoted lane.
    #[must_use]
    pub fn is_promoted(&self, sku: &SkuQuery) -> bool {
        self.promoted.contains(sku)
    }

    /// Primary SKUs in rotation order.
    #[must_use]
    pub fn primary(&self) -> &[SkuQuery] {
        &self.primary
    }

    /// Promoted SKUs in arrival order.
    #[must_use]
    pub fn promoted(&self) -> &[SkuQuery] {
        &self.promoted
    }

    /// Current cursor into the primary set.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        self.pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skus(names: &[&str]) -> Vec<SkuQuery> {
        names.iter().copied().map(SkuQuery::new).collect()
    }

    fn scheduler(names: &[&str], batch_size: usize) -> SkuScheduler {
        SkuScheduler::new(
            SchedulerSettings {
                batch_size,
                ..SchedulerSettings::default()
            },
            skus(names),
        )
    }

    #[test]
    fn test_cursor_wraps() {
        let mut s = scheduler(&["A", "B", "C"], 2);
        assert_eq!(s.next_batch(), skus(&["A", "B"]));
        assert_eq!(s.pointer(), 2);
        assert_eq!(s.next_batch(), skus(&["C", "A"]));
        assert_eq!(s.pointer(), 1);
    }

    #[test]
    fn test_small_set_stops_at_pointer() {
        let mut s = scheduler(&["A", "B"], 5);
        assert_eq!(s.next_batch(), skus(&["A", "B"]));
        assert_eq!(s.pointer(), 0);
    }

    #[test]
    fn test_promoted_first_and_dedupe() {
        let mut s = scheduler(&["A", "B", "C"], 2);
        assert!(s.promote(SkuQuery::new("X")));
        assert!(!s.promote(SkuQuery::new("X")));
        assert!(!s.promote(SkuQuery::new("a")));
        assert_eq!(s.next_batch(), skus(&["X", "A"]));

        s.resolve_promoted(&skus(&["X"]));
        assert_eq!(s.next_batch(), skus(&["B", "C"]));
    }

    #[test]
    fn test_add_primary_drops_promoted() {
        let mut s = scheduler(&["A"], 2);
        s.promote(SkuQuery::new("X"));
        assert!(s.add_primary(SkuQuery::new("X")));
        assert!(s.promoted().is_empty());
        assert!(!s.add_primary(SkuQuery::new("X")));
    }

    #[test]
    fn test_remove_keeps_pointer_valid() {
        let mut s = scheduler(&["A", "B", "C"], 2);
        s.next_batch();
        assert_eq!(s.pointer(), 2);
        assert!(s.remove_primary(&SkuQuery::new("C")));
        assert_eq!(s.pointer(), 0);

        s.remove_primary(&SkuQuery::new("A"));
        s.remove_primary(&SkuQuery::new("B"));
        assert_eq!(s.pointer(), 0);
        assert!(s.next_batch().is_empty());
    }

    #[test]
    fn test_remove_before_pointer_shifts_cursor() {
        let mut s = scheduler(&["A", "B", "C", "D"], 2);
        s.next_batch();
        s.remove_primary(&SkuQuery::new("A"));
        assert_eq!(s.pointer(), 1);
        assert_eq!(s.next_batch(), skus(&["C", "D"]));
    }

    #[test]
    fn test_unload_once_at_threshold() {
        let mut s = scheduler(&["A", "B"], 2);
        let requested = skus(&["A", "B"]);
        let observed = skus(&["B"]);

        assert!(s.record_batch_result(&requested, &observed).is_empty());
        assert!(s.record_batch_result(&requested, &observed).is_empty());
        assert_eq!(s.record_batch_result(&requested, &observed), skus(&["A"]));
        assert!(s.record_batch_result(&requested, &observed).is_empty());

        // Observation re-arms the counter.
        s.record_batch_result(&requested, &requested);
        for _ in 0..2 {
            assert!(s.record_batch_result(&requested, &observed).is_empty());
        }
        assert_eq!(s.record_batch_result(&requested, &observed), skus(&["A"]));
    }

    #[test]
    fn test_promoted_misses_are_not_counted() {
        let mut s = scheduler(&[], 2);
        s.promote(SkuQuery::new("X"));
        for _ in 0..5 {
            assert!(s.record_batch_result(&skus(&["X"]), &[]).is_empty());
        }
    }

    #[test]
    fn test_size_reset_debounce() {
        let mut s = scheduler(&["A"], 2);
        let a = SkuQuery::new("A");
        assert!(!s.observe_sizes(&a, true));
        assert!(s.observe_sizes(&a, true));
        assert!(!s.observe_sizes(&a, false));
        assert!(!s.observe_sizes(&a, true));
    }
}
