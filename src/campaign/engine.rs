use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::campaign::{BatchSummary, CampaignBatch, CampaignRecord};
use crate::store::StoreError;

/// Something that can open a write transaction over `campaign_data`.
pub trait CampaignGateway {
    type Transaction<'t>: CampaignTransaction
    where
        Self: 't;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, StoreError>;
}

/// An open write transaction.
///
/// After `commit` or `rollback` has been called once, further calls to
/// `rollback` must be harmless.
pub trait CampaignTransaction {
    /// Inserts the record, or overwrites quantity, amount and `date_added`
    /// when its natural key already exists.
    fn upsert(&mut self, record: &CampaignRecord) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("No valid campaign data to insert")]
    EmptyBatch,
    #[error("failed to open transaction: {0}")]
    BeginFailure(#[source] StoreError),
    #[error("failed to insert/update campaign {campaign_id}: {source}")]
    PartialWriteFailure {
        campaign_id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to commit campaign batch: {0}")]
    CommitFailure(#[source] StoreError),
}

pub fn execute_batch_upsert<G: CampaignGateway>(
    gateway: &mut G,
    batch: &CampaignBatch,
) -> Result<BatchSummary, UpsertError> {
    execute_batch_upsert_at(gateway, batch, Utc::now())
}

/// Writes every non-blank entry of `batch` in one transaction, all stamped
/// with `written_at`.
pub fn execute_batch_upsert_at<G: CampaignGateway>(
    gateway: &mut G,
    batch: &CampaignBatch,
    written_at: DateTime<Utc>,
) -> Result<BatchSummary, UpsertError> {
    // date_added is stored with second precision
    let written_at = written_at.trunc_subsecs(0);
    let records = batch.records(written_at);
    let skipped = batch.campaigns.len() - records.len();
    if records.is_empty() {
        debug!(month = %batch.month, skipped, "campaign batch has nothing to write");
        return Err(UpsertError::EmptyBatch);
    }

    let mut tx = gateway.begin().map_err(UpsertError::BeginFailure)?;
    for record in &records {
        if let Err(source) = tx.upsert(record) {
            warn!(
                campaign_id = %record.campaign_id,
                error = %source,
                "campaign upsert failed, rolling back batch"
            );
            abort(&mut tx);
            return Err(UpsertError::PartialWriteFailure {
                campaign_id: record.campaign_id.clone(),
                source,
            });
        }
    }
    if let Err(source) = tx.commit() {
        warn!(error = %source, "campaign batch commit failed, rolling back");
        abort(&mut tx);
        return Err(UpsertError::CommitFailure(source));
    }

    info!(
        month = %batch.month,
        state = %batch.location.state,
        district = %batch.location.district,
        village = %batch.location.village,
        block = %batch.location.block,
        written = records.len(),
        skipped,
        "campaign batch committed"
    );
    Ok(BatchSummary {
        written: records.len(),
        skipped,
        written_at,
    })
}

fn abort<T: CampaignTransaction>(tx: &mut T) {
    if let Err(err) = tx.rollback() {
        warn!("rollback failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};
    use rusqlite::Connection;

    use super::{
        execute_batch_upsert, execute_batch_upsert_at, CampaignGateway, CampaignTransaction,
        UpsertError,
    };
    use crate::campaign::{CampaignBatch, CampaignFigures, CampaignFilter, CampaignRecord, Location};
    use crate::store::campaigns::{list_campaigns, SqliteTransaction};
    use crate::store::{migrate, StoreError};

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        migrate(&conn).expect("migrate");
        conn
    }

    fn batch(entries: &[(&str, f64, f64)]) -> CampaignBatch {
        CampaignBatch {
            month: "2024-01".to_string(),
            location: Location {
                state: "S".to_string(),
                district: "D".to_string(),
                village: "V".to_string(),
                block: "B".to_string(),
            },
            user_id: None,
            campaigns: entries
                .iter()
                .map(|(id, q, a)| (id.to_string(), CampaignFigures::new(*q, *a)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn rows(conn: &Connection) -> Vec<CampaignRecord> {
        list_campaigns(conn, &CampaignFilter::default()).expect("list")
    }

    /// Rejects inserts of a given campaign id from inside the store itself.
    fn reject_campaign(conn: &Connection, campaign_id: &str) {
        conn.execute_batch(&format!(
            "CREATE TRIGGER reject_{campaign_id} BEFORE INSERT ON campaign_data \
             WHEN NEW.campaign_id = '{campaign_id}' \
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
        ))
        .expect("trigger");
    }

    #[test]
    fn writes_non_blank_entries_and_drops_blank_ones() {
        let mut conn = connection();
        let summary = execute_batch_upsert(&mut conn, &batch(&[("c1", 5.0, 100.0), ("c2", 0.0, 0.0)]))
            .expect("batch committed");
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 1);

        let stored = rows(&conn);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].campaign_id, "c1");
        assert_eq!(stored[0].quantity, 5.0);
        assert_eq!(stored[0].amount, 100.0);
        assert_eq!(stored[0].date_added, summary.written_at);
    }

    #[test]
    fn resubmission_updates_in_place_with_new_timestamp() {
        let mut conn = connection();
        let first_at = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
        let second_at = first_at + Duration::minutes(5);
        execute_batch_upsert_at(&mut conn, &batch(&[("c1", 5.0, 100.0)]), first_at)
            .expect("first batch");
        execute_batch_upsert_at(&mut conn, &batch(&[("c1", 7.0, 150.0)]), second_at)
            .expect("second batch");

        let stored = rows(&conn);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 7.0);
        assert_eq!(stored[0].amount, 150.0);
        assert_eq!(stored[0].date_added, second_at);
    }

    #[test]
    fn identical_batches_are_idempotent() {
        let mut conn = connection();
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let input = batch(&[("c1", 5.0, 100.0), ("c2", 2.0, 0.0)]);
        execute_batch_upsert_at(&mut conn, &input, at).expect("first");
        let once = rows(&conn);
        execute_batch_upsert_at(&mut conn, &input, at).expect("second");
        assert_eq!(rows(&conn), once);
    }

    #[test]
    fn all_blank_batch_is_empty_and_opens_no_transaction() {
        struct NoBegin;
        impl CampaignGateway for NoBegin {
            type Transaction<'t> = SqliteTransaction<'t>;
            fn begin(&mut self) -> Result<SqliteTransaction<'_>, StoreError> {
                panic!("transaction opened for an empty batch");
            }
        }

        let err = execute_batch_upsert(&mut NoBegin, &batch(&[("c1", 0.0, 0.0), ("c2", 0.0, 0.0)]))
            .expect_err("empty batch");
        assert!(matches!(err, UpsertError::EmptyBatch));

        let err = execute_batch_upsert(&mut NoBegin, &batch(&[])).expect_err("empty batch");
        assert!(matches!(err, UpsertError::EmptyBatch));
    }

    #[test]
    fn store_error_mid_batch_leaves_nothing_behind() {
        let mut conn = connection();
        reject_campaign(&conn, "c2");

        let err = execute_batch_upsert(
            &mut conn,
            &batch(&[("c1", 1.0, 10.0), ("c2", 2.0, 20.0), ("c3", 3.0, 30.0)]),
        )
        .expect_err("second upsert fails");
        match err {
            UpsertError::PartialWriteFailure { campaign_id, .. } => assert_eq!(campaign_id, "c2"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(rows(&conn).is_empty());
        assert!(conn.is_autocommit(), "transaction left open");
    }

    #[test]
    fn failed_batch_keeps_previously_committed_rows() {
        let mut conn = connection();
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
        execute_batch_upsert_at(&mut conn, &batch(&[("c1", 5.0, 100.0)]), at).expect("first");
        reject_campaign(&conn, "c9");

        execute_batch_upsert(&mut conn, &batch(&[("c1", 8.0, 80.0), ("c9", 1.0, 1.0)]))
            .expect_err("c9 rejected");

        let stored = rows(&conn);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 5.0);
        assert_eq!(stored[0].date_added, at);
    }

    struct CommitFails<'c> {
        inner: SqliteTransaction<'c>,
        rolled_back: &'c mut bool,
    }

    impl CampaignTransaction for CommitFails<'_> {
        fn upsert(&mut self, record: &CampaignRecord) -> Result<(), StoreError> {
            self.inner.upsert(record)
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
                Some("disk I/O error".to_string()),
            )))
        }

        fn rollback(&mut self) -> Result<(), StoreError> {
            *self.rolled_back = true;
            self.inner.rollback()
        }
    }

    struct CommitFailsGateway {
        conn: Connection,
        rolled_back: bool,
    }

    impl CampaignGateway for CommitFailsGateway {
        type Transaction<'t> = CommitFails<'t>;

        fn begin(&mut self) -> Result<CommitFails<'_>, StoreError> {
            Ok(CommitFails {
                inner: self.conn.begin()?,
                rolled_back: &mut self.rolled_back,
            })
        }
    }

    #[test]
    fn commit_failure_rolls_back() {
        let mut gateway = CommitFailsGateway {
            conn: connection(),
            rolled_back: false,
        };
        let err = execute_batch_upsert(&mut gateway, &batch(&[("c1", 1.0, 1.0), ("c2", 2.0, 2.0)]))
            .expect_err("commit fails");
        assert!(matches!(err, UpsertError::CommitFailure(_)));
        assert!(gateway.rolled_back);
        assert!(rows(&gateway.conn).is_empty());
    }
}
