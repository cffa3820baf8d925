//! Read side of the catalog

use paperscout_common::models::DiscoveriesView;
use paperscout_common::{DiscoveryStore, Result, SourceKind};

/// Everything stored plus both scan timestamps.
pub async fn get_discoveries(store: &dyn DiscoveryStore) -> Result<DiscoveriesView> {
    let discoveries = store.load().await?;
    let last_scan = store.last_scan_time(SourceKind::Primary).await?;
    let last_scholar_scan = store.last_scan_time(SourceKind::Secondary).await?;

    Ok(DiscoveriesView {
        total: discoveries.len(),
        discoveries,
        last_scan,
        last_scholar_scan,
    })
}
