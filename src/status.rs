//! Persist an Original's status and notify its owner's subscribers.

use rendition_common::{Error, OriginalId, OriginalStatus, Result};
use rendition_db::queries::originals;
use rendition_db::{get_conn, DbPool};

use crate::events::{Broadcaster, StatusEvent};

/// The single write path for Original status.
///
/// Every status change goes through here so that the stored status and the
/// notifications subscribers receive never disagree.
#[derive(Debug, Clone)]
pub struct StatusSetter {
    pool: DbPool,
    broadcaster: Broadcaster,
}

impl StatusSetter {
    pub fn new(pool: DbPool, broadcaster: Broadcaster) -> Self {
        Self { pool, broadcaster }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Store `status` for `id` and publish it to the owner's subscribers.
    ///
    /// The event is published even when the stored status did not change.
    pub fn set_original_status(&self, id: OriginalId, status: OriginalStatus) -> Result<()> {
        let owner = {
            let conn = get_conn(&self.pool)?;
            if !originals::set_status(&conn, id, status)? {
                return Err(Error::not_found("original", id));
            }
            originals::owner_of(&conn, id)?
        };

        let delivered = self.broadcaster.publish(owner, StatusEvent::new(id, status));
        tracing::info!(
            original_id = %id,
            owner_id = %owner,
            %status,
            subscribers = delivered,
            "Original status updated"
        );

        Ok(())
    }
}
