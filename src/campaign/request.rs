use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::campaign::{CampaignBatch, CampaignFigures, Location};
use crate::payload::{required_text, value_as_text};

/// Raw body of `PUT /update`, before presence checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub month: Option<Value>,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub district: Option<Value>,
    #[serde(default)]
    pub village: Option<Value>,
    #[serde(default)]
    pub block: Option<Value>,
    #[serde(default, alias = "userId")]
    pub user_id: Option<Value>,
    #[serde(default, rename = "campaignsData")]
    pub campaigns_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("campaignsData must be an object keyed by campaign id")]
    MalformedCampaigns,
}

impl BatchRequest {
    /// Checks every required field is present and builds the batch.
    ///
    /// An empty `campaignsData` object (or an array) passes here; it is
    /// rejected later as an empty batch, not as a missing field.
    pub fn into_batch(self, require_user_id: bool) -> Result<CampaignBatch, ValidationError> {
        let mut missing = Vec::new();
        let month = required_text(&mut missing, "month", self.month.as_ref());
        let state = required_text(&mut missing, "state", self.state.as_ref());
        let district = required_text(&mut missing, "district", self.district.as_ref());
        let village = required_text(&mut missing, "village", self.village.as_ref());
        let block = required_text(&mut missing, "block", self.block.as_ref());
        let user_id = value_as_text(self.user_id.as_ref());
        if require_user_id && user_id.is_none() {
            missing.push("user_id");
        }
        let campaigns = campaign_map(self.campaigns_data);
        if matches!(campaigns, CampaignsField::Missing) {
            missing.push("campaignsData");
        }

        match (month, state, district, village, block, campaigns) {
            (
                Some(month),
                Some(state),
                Some(district),
                Some(village),
                Some(block),
                CampaignsField::Entries(campaigns),
            ) if missing.is_empty() =>
            {
                Ok(CampaignBatch {
                    month,
                    location: Location {
                        state,
                        district,
                        village,
                        block,
                    },
                    user_id,
                    campaigns,
                })
            }
            (.., CampaignsField::Malformed) if missing.is_empty() => {
                Err(ValidationError::MalformedCampaigns)
            }
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }
}

enum CampaignsField {
    Missing,
    Malformed,
    Entries(BTreeMap<String, CampaignFigures>),
}

/// `null`, `false`, `""` and `0` count as absent. An array carries no
/// campaign ids, so it reads as an empty mapping.
fn campaign_map(value: Option<Value>) -> CampaignsField {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => CampaignsField::Missing,
        Some(Value::String(s)) if s.is_empty() => CampaignsField::Missing,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => CampaignsField::Missing,
        Some(Value::Array(_)) => CampaignsField::Entries(BTreeMap::new()),
        Some(Value::Object(entries)) => CampaignsField::Entries(
            entries
                .into_iter()
                .map(|(campaign_id, figures)| (campaign_id, CampaignFigures::from(figures)))
                .collect(),
        ),
        Some(_) => CampaignsField::Malformed,
    }
}
