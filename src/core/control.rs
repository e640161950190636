//! Add/remove/list surface consumed by any control-plane transport.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::discovery::DiscoveryGroup;
use crate::core::normal::NormalGroup;
use crate::core::product::SkuQuery;
use crate::core::MonitorError;

/// Kind of a monitored query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// Exact SKU, monitored by the normal group.
    Sku,
    /// Keyword query, evaluated against new arrivals.
    Keyword,
}

impl QueryKind {
    /// Label used in errors and messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sku => "SKU",
            Self::Keyword => "KEYWORD",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QueryKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SKU" => Ok(Self::Sku),
            "KWD_QUERY" | "KEYWORD" => Ok(Self::Keyword),
            _ => Err(MonitorError::UnknownQueryKind(s.to_owned())),
        }
    }
}

/// Control operations over both task groups.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    normal: Arc<NormalGroup>,
    discovery: Arc<DiscoveryGroup>,
}

impl ControlSurface {
    /// Wrap the two groups.
    #[must_use]
    pub const fn new(normal: Arc<NormalGroup>, discovery: Arc<DiscoveryGroup>) -> Self {
        Self { normal, discovery }
    }

    /// Start monitoring a query.
    ///
    /// # Errors
    ///
    /// `AlreadyMonitored` if the query is present; `InvalidQuery` if it is
    /// empty.
    pub fn add_query(&self, kind: QueryKind, value: &str) -> Result<(), MonitorError> {
        match kind {
            QueryKind::Sku => {
                let sku = parse_sku(value)?;
                self.normal
                    .add_sku(&sku)
                    .map_err(|_| already_monitored(kind, sku.as_str()))
            }
            QueryKind::Keyword => {
                let query = normalize_keyword(value)?;
                self.discovery
                    .add_keyword(&query)
                    .map_err(|_| already_monitored(kind, &query))
            }
        }
    }

    /// Stop monitoring a query.
    ///
    /// # Errors
    ///
    /// `QueryNotFound` if the query is absent; `InvalidQuery` if it is empty.
    pub fn remove_query(&self, kind: QueryKind, value: &str) -> Result<(), MonitorError> {
        match kind {
            QueryKind::Sku => {
                let sku = parse_sku(value)?;
                self.normal
                    .remove_sku(&sku)
                    .map_err(|_| not_found(kind, sku.as_str()))
            }
            QueryKind::Keyword => {
                let query = normalize_keyword(value)?;
                self.discovery
                    .remove_keyword(&query)
                    .map_err(|_| not_found(kind, &query))
            }
        }
    }

    /// Monitored queries of one kind.
    #[must_use]
    pub fn list_queries(&self, kind: QueryKind) -> Vec<String> {
        match kind {
            QueryKind::Sku => self.normal.list_skus(),
            QueryKind::Keyword => self.discovery.list_keywords(),
        }
    }
}

fn parse_sku(value: &str) -> Result<SkuQuery, MonitorError> {
    let sku = SkuQuery::new(value);
    if sku.is_empty() {
        return Err(MonitorError::InvalidQuery {
            kind: QueryKind::Sku.label().into(),
            value: value.into(),
        });
    }
    Ok(sku)
}

/// Lowercase and collapse a keyword query; a query without a leading sign is
/// inclusive.
fn normalize_keyword(value: &str) -> Result<String, MonitorError> {
    let collapsed = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if collapsed.is_empty() {
        return Err(MonitorError::InvalidQuery {
            kind: QueryKind::Keyword.label().into(),
            value: value.into(),
        });
    }
    if collapsed.starts_with(['+', '-']) {
        Ok(collapsed)
    } else {
        Ok(format!("+{collapsed}"))
    }
}

fn already_monitored(kind: QueryKind, value: &str) -> MonitorError {
    MonitorError::AlreadyMonitored {
        kind: kind.label().into(),
        value: value.into(),
    }
}

fn not_found(kind: QueryKind, value: &str) -> MonitorError {
    MonitorError::QueryNotFound {
        kind: kind.label().into(),
        value: value.into(),
    }
}
