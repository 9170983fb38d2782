use anyhow::{Context, Result, anyhow};

use crate::models::model::{Category, TransferCategory, TransferTableItem, ViewType};
use crate::view::table::decimal_adjusted_value;

pub const CSV_HEADERS: [&str; 6] = ["Date", "Safe", "Amount", "To/From", "Category", "Description"];

/// Serializes table rows for export. Amounts are sign-prefixed by direction
/// and formatted with one fraction digit for ETH/WETH/untyped transfers,
/// none otherwise; annotations resolve through the category mappings with
/// `None` / `-` fallbacks.
pub fn transfers_to_csv(
    rows: &[TransferTableItem],
    transfer_categories: &[TransferCategory],
    categories: &[Category],
) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record(CSV_HEADERS)
        .context("Failed to write CSV header")?;

    for item in rows {
        let transfer = &item.transfer;
        let value = decimal_adjusted_value(transfer);
        let symbol = transfer.token_symbol.as_deref().unwrap_or("ETH");

        let formatted_amount = if matches!(symbol, "ETH" | "WETH") {
            format!("{} {}", format_amount(value, 1), symbol)
        } else {
            format!("{} {}", format_amount(value, 0), symbol)
        };

        let outgoing = item.view_type == ViewType::Out;
        let sign = if outgoing { "-" } else { "+" };
        let (main_party, counterparty) = if outgoing {
            (&transfer.from_address, &transfer.to_address)
        } else {
            (&transfer.to_address, &transfer.from_address)
        };

        let mapping = transfer_categories
            .iter()
            .find(|tc| tc.transfer_id == transfer.transfer_id);
        let category = mapping.and_then(|m| categories.iter().find(|c| c.id == m.category_id));

        writer
            .write_record([
                transfer.execution_date.format("%b %-d, %Y").to_string(),
                main_party.clone(),
                format!("{}{}", sign, formatted_amount),
                counterparty.clone(),
                category
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "None".to_string()),
                mapping
                    .and_then(|m| m.description.clone())
                    .unwrap_or_else(|| "-".to_string()),
            ])
            .context("Failed to write CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV writer: {}", e))?;

    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Fixed-precision decimal with thousands separators, e.g. `1,234.5`.
fn format_amount(value: f64, fraction_digits: usize) -> String {
    let formatted = format!("{:.*}", fraction_digits, value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac_part) => format!("{}.{}", grouped, frac_part),
        None => grouped,
    }
}
