use super::model::{ShareList, ShareReport};
use super::store::RemoteStore;
use tracing::{debug, warn};

/// Grants read access to every recipient; one failure does not stop the rest.
pub async fn apply_shares(store: &dyn RemoteStore, object_id: &str, shares: &ShareList) -> ShareReport {
    let mut report = ShareReport::default();
    for identity in shares.iter() {
        match store.grant_read(object_id, identity).await {
            Ok(()) => {
                debug!("Shared {} with {}", object_id, identity);
                report.granted.push(identity.to_string());
            }
            Err(e) => {
                warn!("Failed to share {} with {}: {}", object_id, identity, e);
                report.failed.push((identity.to_string(), e.to_string()));
            }
        }
    }
    report
}
