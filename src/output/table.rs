use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Row, Table};

use crate::campaign::{BatchSummary, CampaignRecord};
use crate::output::format_figure;
use crate::store::DATE_FORMAT;

pub fn render_campaign_table(records: &[CampaignRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Month",
        "State",
        "District",
        "Village/Zone",
        "Block",
        "Campaign",
        "Quantity",
        "Amount",
        "Updated",
    ]);

    for r in records {
        table.add_row(Row::from(vec![
            Cell::new(&r.month),
            Cell::new(&r.state),
            Cell::new(&r.district),
            Cell::new(&r.village_zone),
            Cell::new(&r.block_name),
            Cell::new(&r.campaign_id),
            Cell::new(format_figure(r.quantity)).set_alignment(CellAlignment::Right),
            Cell::new(format_figure(r.amount)).set_alignment(CellAlignment::Right),
            Cell::new(r.date_added.format(DATE_FORMAT).to_string()),
        ]));
    }

    if !records.is_empty() {
        let quantity: f64 = records.iter().map(|r| r.quantity).sum();
        let amount: f64 = records.iter().map(|r| r.amount).sum();
        table.add_row(Row::from(vec![
            Cell::new("Total").fg(Color::Cyan),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{} rows", records.len())),
            Cell::new(format_figure(quantity)).set_alignment(CellAlignment::Right),
            Cell::new(format_figure(amount)).set_alignment(CellAlignment::Right),
            Cell::new(""),
        ]));
    }
    table.to_string()
}

pub fn render_summary_table(summary: &BatchSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Written", "Skipped", "Written At"]);
    table.add_row(Row::from(vec![
        Cell::new(summary.written).fg(Color::Green),
        Cell::new(summary.skipped),
        Cell::new(summary.written_at.format(DATE_FORMAT).to_string()),
    ]));
    table.to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::render_campaign_table;
    use crate::campaign::CampaignRecord;

    #[test]
    fn renders_rows_and_total() {
        let record = CampaignRecord {
            month: "2024-01".to_string(),
            state: "S".to_string(),
            district: "D".to_string(),
            village_zone: "V".to_string(),
            block_name: "B".to_string(),
            campaign_id: "c1".to_string(),
            quantity: 5.0,
            amount: 100.25,
            date_added: Utc.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap(),
            user_id: None,
        };
        let rendered = render_campaign_table(&[record.clone(), record]);
        assert!(rendered.contains("c1"));
        assert!(rendered.contains("2024-01-31 09:30:00"));
        assert!(rendered.contains("2 rows"));
        assert!(rendered.contains("200.50"));
    }
}
