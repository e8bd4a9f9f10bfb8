use anyhow::Result;

use crate::campaign::CampaignRecord;
use crate::output::format_figure;
use crate::store::DATE_FORMAT;

pub fn campaigns_to_csv(records: &[CampaignRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "month",
        "state",
        "district",
        "villageZone",
        "blockName",
        "campaign_id",
        "quantity",
        "amount",
        "date_added",
        "user_id",
    ])?;
    for record in records {
        writer.write_record([
            record.month.clone(),
            record.state.clone(),
            record.district.clone(),
            record.village_zone.clone(),
            record.block_name.clone(),
            record.campaign_id.clone(),
            format_figure(record.quantity),
            format_figure(record.amount),
            record.date_added.format(DATE_FORMAT).to_string(),
            record.user_id.clone().unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::campaigns_to_csv;
    use crate::campaign::CampaignRecord;

    #[test]
    fn quotes_free_text_locations() {
        let record = CampaignRecord {
            month: "2024-01".to_string(),
            state: "S".to_string(),
            district: "North, East".to_string(),
            village_zone: "V".to_string(),
            block_name: "B".to_string(),
            campaign_id: "c1".to_string(),
            quantity: 7.0,
            amount: 150.0,
            date_added: Utc.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap(),
            user_id: Some("9876543210".to_string()),
        };
        let csv = campaigns_to_csv(&[record]).expect("csv");
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").starts_with("month,state"));
        assert_eq!(
            lines.next().expect("row"),
            "2024-01,S,\"North, East\",V,B,c1,7,150,2024-01-31 09:30:00,9876543210"
        );
    }
}
