//! Diff engine between observed snapshots and persisted product state.

use std::cmp::Ordering;

use parking_lot::RwLock;

use crate::core::ports::{Notification, NotificationKind, NotifyReason};
use crate::core::product::{sort_available_sizes, AvailableSize, ProductSnapshot, SkuQuery};
use crate::core::state::{PersistedProductState, SharedStates};

/// Notification policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchPolicy {
    /// Notify on price increases as well as drops.
    pub notify_price_increase: bool,
}

/// Result of matching one snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchOutcome {
    /// Whether persisted state was modified.
    pub changed: bool,
    /// Merged notification, if anything warranted one.
    pub notification: Option<Notification>,
}

/// Compares snapshots against the normal-group state under its mutex.
#[derive(Debug)]
pub struct StateMatcher {
    states: SharedStates,
    policy: RwLock<MatchPolicy>,
}

impl StateMatcher {
    /// Create a matcher over shared state.
    #[must_use]
    pub fn new(states: SharedStates, policy: MatchPolicy) -> Self {
        Self {
            states,
            policy: RwLock::new(policy),
        }
    }

    /// Replace the notification policy.
    pub fn apply_policy(&self, policy: MatchPolicy) {
        *self.policy.write() = policy;
    }

    /// Match a snapshot against persisted state, writing through any
    /// difference.
    ///
    /// With `allow_size_clear` unset, an empty size list never overwrites a
    /// non-empty persisted one. A first observation is only recorded for a
    /// SKU in the monitoring list.
    pub fn match_snapshot(&self, snapshot: &ProductSnapshot, allow_size_clear: bool) -> MatchOutcome {
        let policy = *self.policy.read();
        let sku = snapshot.sku_query();

        let mut sizes = snapshot.available_sizes.clone();
        sort_available_sizes(&mut sizes);

        let mut normal = self.states.normal();
        let Some(state) = normal.get_mut(&sku) else {
            if !normal.is_listed(&sku) {
                tracing::debug!(sku = %sku, "observation of unmonitored sku dropped");
                return MatchOutcome::default();
            }
            normal.upsert(PersistedProductState {
                sku: sku.to_string(),
                available_for_sale: snapshot.available_for_sale,
                available_sizes: sizes,
                price: snapshot.price.clone(),
            });
            tracing::debug!(sku = %sku, "first observation recorded");
            return MatchOutcome {
                changed: true,
                notification: None,
            };
        };

        let mut changed = false;
        let mut reasons = Vec::new();

        if !same_sizes(&state.available_sizes, &sizes) {
            if sizes.is_empty() && !allow_size_clear {
                tracing::debug!(sku = %sku, "empty size list ignored until confirmed");
            } else {
                let added = added_sizes(&state.available_sizes, &sizes);
                if !added.is_empty() {
                    reasons.push(NotifyReason::SizesAdded(added));
                }
                state.available_sizes = sizes.clone();
                changed = true;
            }
        }

        if state.price != snapshot.price {
            let old_price = std::mem::replace(&mut state.price, snapshot.price.clone());
            changed = true;
            match compare_prices(&snapshot.price, &old_price) {
                Some(Ordering::Less) => reasons.push(NotifyReason::PriceDropped { old_price }),
                Some(Ordering::Greater) if policy.notify_price_increase => {
                    reasons.push(NotifyReason::PriceIncreased { old_price });
                }
                _ => {
                    tracing::debug!(sku = %sku, old = %old_price, new = %snapshot.price, "price changed");
                }
            }
        }

        if state.available_for_sale != snapshot.available_for_sale {
            if snapshot.available_for_sale {
                reasons.push(NotifyReason::BackForSale);
            }
            state.available_for_sale = snapshot.available_for_sale;
            changed = true;
        }
        drop(normal);

        if reasons.is_empty() {
            if !changed {
                tracing::debug!(sku = %sku, "no changes on product");
            }
            return MatchOutcome {
                changed,
                notification: None,
            };
        }

        tracing::info!(sku = %sku, reasons = ?reasons, "product update");
        let mut observed = snapshot.clone();
        observed.available_sizes = sizes;
        MatchOutcome {
            changed,
            notification: Some(Notification {
                kind: NotificationKind::Update,
                snapshot: observed,
                reasons,
            }),
        }
    }

    /// Reset a SKU to the unloaded record. Returns whether anything changed.
    /// A SKU that is neither listed nor recorded is left alone.
    pub fn reset_unloaded(&self, sku: &SkuQuery) -> bool {
        let record = PersistedProductState::unloaded(sku.as_str());
        let mut normal = self.states.normal();
        match normal.get(sku) {
            Some(current) if *current == record => return false,
            None if !normal.is_listed(sku) => return false,
            _ => {}
        }
        normal.upsert(record);
        tracing::info!(sku = %sku, "product unloaded");
        true
    }

    /// Copy of the persisted record for a SKU.
    #[must_use]
    pub fn persisted(&self, sku: &SkuQuery) -> Option<PersistedProductState> {
        self.states.normal().get(sku).cloned()
    }
}

fn same_sizes(old: &[AvailableSize], new: &[AvailableSize]) -> bool {
    if old.len() != new.len() {
        return false;
    }
    let mut a: Vec<(&str, u32)> = old.iter().map(|s| (s.name.as_str(), s.amount_in_stock)).collect();
    let mut b: Vec<(&str, u32)> = new.iter().map(|s| (s.name.as_str(), s.amount_in_stock)).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

fn added_sizes(old: &[AvailableSize], new: &[AvailableSize]) -> Vec<AvailableSize> {
    new.iter()
        .filter(|s| !old.iter().any(|o| o.name == s.name))
        .cloned()
        .collect()
}

/// Compare two raw price strings numerically. `None` when either side does
/// not parse.
fn compare_prices(new: &str, old: &str) -> Option<Ordering> {
    let new = parse_price(new)?;
    let old = parse_price(old)?;
    new.partial_cmp(&old)
}

/// The last `.` or `,` is the decimal separator unless that character occurs
/// more than once, in which case every separator groups thousands.
fn parse_price(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let decimal = kept
        .rfind(['.', ','])
        .filter(|&at| kept.matches(&kept[at..=at]).count() == 1);
    let normalized: String = kept
        .char_indices()
        .filter_map(|(i, c)| match c {
            '.' | ',' if Some(i) == decimal => Some('.'),
            '.' | ',' => None,
            digit => Some(digit),
        })
        .collect();
    normalized.parse().ok()
}
