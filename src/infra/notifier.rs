//! Notifier that writes alerts to the tracing pipeline.

use crate::core::{Notification, NotificationKind, Notifier, NotifyReason};

/// Logs each notification at `info`. Stand-in until a real transport is
/// wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let snapshot = &notification.snapshot;
        let reasons: Vec<String> = notification.reasons.iter().map(describe).collect();
        match notification.kind {
            NotificationKind::Update => tracing::info!(
                sku = %snapshot.sku,
                title = %snapshot.title,
                price = %snapshot.price,
                url = %snapshot.product_url,
                reasons = ?reasons,
                "product update"
            ),
            NotificationKind::NewArrival => tracing::info!(
                sku = %snapshot.sku,
                title = %snapshot.title,
                url = %snapshot.product_url,
                reasons = ?reasons,
                "new arrival"
            ),
        }
    }
}

fn describe(reason: &NotifyReason) -> String {
    match reason {
        NotifyReason::SizesAdded(sizes) => {
            let names: Vec<&str> = sizes.iter().map(|s| s.name.as_str()).collect();
            format!("sizes added: {}", names.join(", "))
        }
        NotifyReason::PriceDropped { old_price } => format!("price dropped from {old_price}"),
        NotifyReason::PriceIncreased { old_price } => format!("price increased from {old_price}"),
        NotifyReason::BackForSale => "back for sale".into(),
        NotifyReason::KeywordMatch(queries) => format!("matches {}", queries.join(", ")),
    }
}
