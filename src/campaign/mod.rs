pub mod engine;
pub mod request;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{non_zero, value_as_f64};

pub use engine::{
    execute_batch_upsert, execute_batch_upsert_at, CampaignGateway, CampaignTransaction,
    UpsertError,
};
pub use request::{BatchRequest, ValidationError};

/// Geography a batch reports against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub district: String,
    pub village: String,
    pub block: String,
}

/// Quantity and amount reported for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct CampaignFigures {
    pub quantity: Option<f64>,
    pub amount: Option<f64>,
}

impl CampaignFigures {
    pub fn new(quantity: f64, amount: f64) -> Self {
        Self {
            quantity: Some(quantity),
            amount: Some(amount),
        }
    }

    /// An entry with neither a quantity nor an amount carries no data.
    pub fn is_blank(&self) -> bool {
        non_zero(self.quantity).is_none() && non_zero(self.amount).is_none()
    }

    pub fn quantity_or_zero(&self) -> f64 {
        non_zero(self.quantity).unwrap_or(0.0)
    }

    pub fn amount_or_zero(&self) -> f64 {
        non_zero(self.amount).unwrap_or(0.0)
    }
}

impl From<Value> for CampaignFigures {
    fn from(value: Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            quantity: value_as_f64(object.get("quantity")),
            amount: value_as_f64(object.get("amount")),
        }
    }
}

/// One month's figures for every campaign at a location.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignBatch {
    pub month: String,
    pub location: Location,
    pub user_id: Option<String>,
    pub campaigns: BTreeMap<String, CampaignFigures>,
}

impl CampaignBatch {
    /// Expands the batch into the rows it writes, dropping blank entries.
    pub fn records(&self, written_at: DateTime<Utc>) -> Vec<CampaignRecord> {
        self.campaigns
            .iter()
            .filter(|(_, figures)| !figures.is_blank())
            .map(|(campaign_id, figures)| CampaignRecord {
                month: self.month.clone(),
                state: self.location.state.clone(),
                district: self.location.district.clone(),
                village_zone: self.location.village.clone(),
                block_name: self.location.block.clone(),
                campaign_id: campaign_id.clone(),
                quantity: figures.quantity_or_zero(),
                amount: figures.amount_or_zero(),
                date_added: written_at,
                user_id: self.user_id.clone(),
            })
            .collect()
    }
}

/// A stored `campaign_data` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub month: String,
    pub state: String,
    pub district: String,
    #[serde(rename = "villageZone")]
    pub village_zone: String,
    #[serde(rename = "blockName")]
    pub block_name: String,
    pub campaign_id: String,
    pub quantity: f64,
    pub amount: f64,
    pub date_added: DateTime<Utc>,
    pub user_id: Option<String>,
}

/// Aggregate result of a committed batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub written_at: DateTime<Utc>,
}

/// Optional filters for reading stored rows back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CampaignFilter {
    pub month: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub village: Option<String>,
    pub block: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{CampaignBatch, CampaignFigures, Location};

    #[test]
    fn figures_deserialize_from_loose_shapes() {
        let figures: BTreeMap<String, CampaignFigures> = serde_json::from_value(json!({
            "c1": {"quantity": "5", "amount": 100},
            "c2": {"quantity": null},
            "c3": "not an object",
            "c4": {"quantity": "0", "amount": "0"}
        }))
        .expect("figures");
        assert_eq!(figures["c1"], CampaignFigures::new(5.0, 100.0));
        assert!(figures["c2"].is_blank());
        assert!(figures["c3"].is_blank());
        assert!(figures["c4"].is_blank());
    }

    #[test]
    fn records_drop_blank_entries_and_share_timestamp() {
        let written_at = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
        let batch = CampaignBatch {
            month: "2024-01".to_string(),
            location: Location {
                state: "S".to_string(),
                district: "D".to_string(),
                village: "V".to_string(),
                block: "B".to_string(),
            },
            user_id: None,
            campaigns: BTreeMap::from([
                ("c1".to_string(), CampaignFigures::new(5.0, 100.0)),
                ("c2".to_string(), CampaignFigures::new(0.0, 0.0)),
                (
                    "c3".to_string(),
                    CampaignFigures {
                        quantity: None,
                        amount: Some(40.0),
                    },
                ),
            ]),
        };

        let records = batch.records(written_at);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].campaign_id, "c1");
        assert_eq!(records[1].campaign_id, "c3");
        assert_eq!(records[1].quantity, 0.0);
        assert!(records.iter().all(|r| r.date_added == written_at));
        assert_eq!(records[0].village_zone, "V");
        assert_eq!(records[0].block_name, "B");
    }
}
