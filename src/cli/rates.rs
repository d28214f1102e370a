use super::ui;
use crate::aggregator::{ProviderRates, RateAggregator};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Fetches every provider for `base_currency` and prints the result.
pub async fn run(aggregator: &RateAggregator, base_currency: &str, json: bool) -> Result<()> {
    let base = base_currency.trim().to_uppercase();
    let rates = aggregator
        .fetch_all(&base)
        .await
        .with_context(|| format!("Failed to fetch rates for {base}"))?;

    if rates.is_empty() {
        return Ok(());
    }

    let output = if json {
        render_json(&rates)?
    } else {
        render_table(&base, &rates)
    };
    println!("{output}");
    Ok(())
}

/// Provider label to response, as pretty-printed JSON.
pub fn render_json(rates: &ProviderRates) -> Result<String> {
    let by_label: BTreeMap<&str, _> = rates
        .iter()
        .map(|(provider, response)| (provider.label(), response))
        .collect();
    serde_json::to_string_pretty(&by_label).context("Failed to serialize rates")
}

/// One row per currency, one column per provider.
pub fn render_table(base_currency: &str, rates: &ProviderRates) -> String {
    let currencies: BTreeSet<&str> = rates
        .values()
        .flat_map(|response| response.rates.keys().map(String::as_str))
        .collect();

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Currency")];
    header.extend(rates.keys().map(|provider| ui::header_cell(provider.label())));
    table.set_header(header);

    for currency in currencies {
        let mut row = vec![Cell::new(currency)];
        row.extend(rates.values().map(|response| {
            if !response.success {
                ui::na_cell(true)
            } else {
                response
                    .rate(currency)
                    .map_or_else(|| ui::na_cell(false), ui::rate_cell)
            }
        }));
        table.add_row(row);
    }

    let mut output = format!(
        "Rates for 1 {}\n\n",
        ui::style_text(base_currency, ui::StyleType::Title)
    );
    output.push_str(&table.to_string());

    for (provider, response) in rates {
        let note = match (&response.date, response.success) {
            (_, false) => ui::style_text("unavailable", ui::StyleType::Error),
            (Some(date), true) => ui::style_text(&format!("as of {date}"), ui::StyleType::Subtle),
            (None, true) => continue,
        };
        output.push_str(&format!("\n{}: {note}", provider.label()));
    }

    output
}
