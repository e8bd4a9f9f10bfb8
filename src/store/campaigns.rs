use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::campaign::{CampaignFilter, CampaignGateway, CampaignRecord, CampaignTransaction};
use crate::store::{StoreError, DATE_FORMAT};

const UPSERT_CAMPAIGN: &str = r#"
INSERT INTO campaign_data(
    month, state, district, villageZone, blockName, campaign_id,
    quantity, amount, date_added, user_id
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(month, state, district, villageZone, blockName, campaign_id) DO UPDATE SET
    quantity = excluded.quantity,
    amount = excluded.amount,
    date_added = excluded.date_added
"#;

/// `rusqlite` transaction adapted to [`CampaignTransaction`].
///
/// Dropping it without committing rolls back.
pub struct SqliteTransaction<'c> {
    inner: Option<Transaction<'c>>,
}

impl CampaignGateway for Connection {
    type Transaction<'t> = SqliteTransaction<'t>;

    fn begin(&mut self) -> Result<SqliteTransaction<'_>, StoreError> {
        let tx = self.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { inner: Some(tx) })
    }
}

impl CampaignTransaction for SqliteTransaction<'_> {
    fn upsert(&mut self, record: &CampaignRecord) -> Result<(), StoreError> {
        let tx = self.inner.as_ref().ok_or(StoreError::TransactionClosed)?;
        let mut stmt = tx.prepare_cached(UPSERT_CAMPAIGN)?;
        stmt.execute(params![
            record.month,
            record.state,
            record.district,
            record.village_zone,
            record.block_name,
            record.campaign_id,
            record.quantity,
            record.amount,
            record.date_added.format(DATE_FORMAT).to_string(),
            record.user_id,
        ])?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.inner.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        match self.inner.take() {
            Some(tx) => Ok(tx.rollback()?),
            None => Ok(()),
        }
    }
}

pub fn list_campaigns(
    conn: &Connection,
    filter: &CampaignFilter,
) -> Result<Vec<CampaignRecord>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
SELECT month, state, district, villageZone, blockName, campaign_id,
       quantity, amount, date_added, user_id
FROM campaign_data
WHERE (?1 IS NULL OR month = ?1)
  AND (?2 IS NULL OR state = ?2)
  AND (?3 IS NULL OR district = ?3)
  AND (?4 IS NULL OR villageZone = ?4)
  AND (?5 IS NULL OR blockName = ?5)
ORDER BY month, state, district, villageZone, blockName, campaign_id
"#,
    )?;
    let rows = stmt
        .query_map(filter_params(filter), row_to_campaign_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most recent `date_added` among rows matching `filter`.
pub fn last_updated(
    conn: &Connection,
    filter: &CampaignFilter,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            r#"
SELECT MAX(date_added)
FROM campaign_data
WHERE (?1 IS NULL OR month = ?1)
  AND (?2 IS NULL OR state = ?2)
  AND (?3 IS NULL OR district = ?3)
  AND (?4 IS NULL OR villageZone = ?4)
  AND (?5 IS NULL OR blockName = ?5)
"#,
            filter_params(filter),
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    raw.map(|value| parse_date_added(&value)).transpose()
}

fn filter_params(filter: &CampaignFilter) -> [Option<&str>; 5] {
    [
        filter.month.as_deref(),
        filter.state.as_deref(),
        filter.district.as_deref(),
        filter.village.as_deref(),
        filter.block.as_deref(),
    ]
}

fn row_to_campaign_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CampaignRecord> {
    let date_added_raw: String = row.get(8)?;
    let date_added = parse_date_added(&date_added_raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(CampaignRecord {
        month: row.get(0)?,
        state: row.get(1)?,
        district: row.get(2)?,
        village_zone: row.get(3)?,
        block_name: row.get(4)?,
        campaign_id: row.get(5)?,
        quantity: row.get(6)?,
        amount: row.get(7)?,
        date_added,
        user_id: row.get(9)?,
    })
}

fn parse_date_added(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| StoreError::Corrupt {
            table: "campaign_data",
            detail: format!("bad date_added {raw:?}: {err}"),
        })
}
