//! Read-only views over the document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{StorageDocument, daily_key};

/// How many pages [`StatsSnapshot::top_pages`] keeps.
const TOP_PAGES: usize = 10;

/// Site statistics at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// The `total_views` counter.
    pub total_views: u64,
    /// Views recorded for today's UTC date.
    pub today_views: u64,
    /// Users seen within the activity window.
    pub active_users: usize,
    /// Views per page.
    pub page_views: BTreeMap<String, u64>,
    /// Up to ten most viewed pages, most viewed first.
    pub top_pages: Vec<PageViews>,
    /// Cache accounting.
    pub cache: CacheSummary,
}

/// One row of the top-pages ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageViews {
    /// Page id.
    pub page: String,
    /// Visit count.
    pub views: u64,
}

impl PageViews {
    /// Creates a ranking row.
    pub fn new(page: impl Into<String>, views: u64) -> Self {
        Self {
            page: page.into(),
            views,
        }
    }
}

/// Cache hit/miss summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// `hits + misses`.
    pub total_requests: u64,
    /// Rounded hit percentage.
    pub hit_rate: u64,
    /// Estimated time saved by hits.
    pub saved_time_ms: u64,
    /// Live entries currently stored.
    pub entries: usize,
}

impl StatsSnapshot {
    /// Computes the snapshot of `document` as seen at `now`.
    pub fn from_document(document: &StorageDocument, now: DateTime<Utc>) -> Self {
        let analytics = &document.analytics;

        let mut top_pages: Vec<PageViews> = analytics
            .page_views
            .iter()
            .map(|(page, views)| PageViews::new(page.clone(), *views))
            .collect();
        // stable: ties keep page order
        top_pages.sort_by(|a, b| b.views.cmp(&a.views));
        top_pages.truncate(TOP_PAGES);

        let stats = document.cache_stats;
        Self {
            total_views: document.counter("total_views"),
            today_views: analytics
                .daily_views
                .get(&daily_key(now))
                .copied()
                .unwrap_or(0),
            active_users: document.active_users(now),
            page_views: analytics.page_views.clone(),
            top_pages,
            cache: CacheSummary {
                hits: stats.hits,
                misses: stats.misses,
                total_requests: stats.total_requests,
                hit_rate: stats.hit_rate(),
                saved_time_ms: stats.saved_time_ms,
                entries: document.live_entries(now),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_top_pages_ranked_and_capped() {
        let mut document = StorageDocument::default();
        let now = Utc::now();
        for i in 0..12u64 {
            for _ in 0..=i {
                document.track_page_view(&format!("/p{i:02}"), now);
            }
        }

        let stats = StatsSnapshot::from_document(&document, now);

        assert_eq!(stats.top_pages.len(), 10);
        assert_eq!(stats.top_pages[0], PageViews::new("/p11", 12));
        assert_eq!(stats.top_pages[9], PageViews::new("/p02", 3));
        assert_eq!(stats.total_views, 78);
        assert_eq!(stats.today_views, 78);
    }

    #[test]
    fn test_empty_document_snapshot() {
        let stats = StatsSnapshot::from_document(&StorageDocument::default(), Utc::now());
        assert_eq!(stats.total_views, 0);
        assert_eq!(stats.cache, CacheSummary::default());
        assert!(stats.top_pages.is_empty());
    }
}
