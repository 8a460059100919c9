//! History export
//!
//! Flattens a market history into one row per step: market columns first,
//! then `{provider}_{field}` columns for every provider seen anywhere in
//! history, in first-seen order. Cells for a provider not committed at a step
//! are empty, as is the annualised return of a zero-stake provider.

use crate::history::MarketHistory;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;
use types::errors::{MechanismError, ProviderError};

/// Unrecognised column name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown field: {0}")]
pub struct UnknownField(pub String);

/// Market-level export column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketField {
    N,
    MarkPrice,
    TradedVolume,
    OpenInterest,
    Valuation,
    TargetStake,
    TotalStake,
    TotalMargin,
    FeeRate,
    FeesCollected,
    AnnualisedReturn,
    AnnualisedReturnOnCapital,
    TotalEquity,
}

impl MarketField {
    pub const ALL: [MarketField; 13] = [
        MarketField::N,
        MarketField::MarkPrice,
        MarketField::TradedVolume,
        MarketField::OpenInterest,
        MarketField::Valuation,
        MarketField::TargetStake,
        MarketField::TotalStake,
        MarketField::TotalMargin,
        MarketField::FeeRate,
        MarketField::FeesCollected,
        MarketField::AnnualisedReturn,
        MarketField::AnnualisedReturnOnCapital,
        MarketField::TotalEquity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketField::N => "_n",
            MarketField::MarkPrice => "mark_price",
            MarketField::TradedVolume => "traded_volume",
            MarketField::OpenInterest => "open_interest",
            MarketField::Valuation => "valuation",
            MarketField::TargetStake => "target_stake",
            MarketField::TotalStake => "total_stake",
            MarketField::TotalMargin => "total_margin",
            MarketField::FeeRate => "fee_rate",
            MarketField::FeesCollected => "fees_collected",
            MarketField::AnnualisedReturn => "annualised_return",
            MarketField::AnnualisedReturnOnCapital => "annualised_return_on_capital",
            MarketField::TotalEquity => "total_equity",
        }
    }
}

impl fmt::Display for MarketField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Provider-level export column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderField {
    Stake,
    FeeBid,
    Equity,
    EquityShare,
    StakeShare,
    FeeRevenue,
    AnnualisedReturn,
    Margin,
    EntryValuation,
    Obligation,
}

impl ProviderField {
    pub const ALL: [ProviderField; 10] = [
        ProviderField::Stake,
        ProviderField::FeeBid,
        ProviderField::Equity,
        ProviderField::EquityShare,
        ProviderField::StakeShare,
        ProviderField::FeeRevenue,
        ProviderField::AnnualisedReturn,
        ProviderField::Margin,
        ProviderField::EntryValuation,
        ProviderField::Obligation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderField::Stake => "stake",
            ProviderField::FeeBid => "fee_bid",
            ProviderField::Equity => "equity",
            ProviderField::EquityShare => "equity_share",
            ProviderField::StakeShare => "stake_share",
            ProviderField::FeeRevenue => "fee_revenue",
            ProviderField::AnnualisedReturn => "annualised_return",
            ProviderField::Margin => "margin",
            ProviderField::EntryValuation => "entry_valuation",
            ProviderField::Obligation => "obligation",
        }
    }
}

impl fmt::Display for ProviderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Market columns of the CSV export.
pub const CSV_MARKET_FIELDS: [MarketField; 12] = [
    MarketField::N,
    MarketField::MarkPrice,
    MarketField::TradedVolume,
    MarketField::Valuation,
    MarketField::TargetStake,
    MarketField::TotalStake,
    MarketField::TotalMargin,
    MarketField::FeeRate,
    MarketField::FeesCollected,
    MarketField::AnnualisedReturn,
    MarketField::AnnualisedReturnOnCapital,
    MarketField::TotalEquity,
];

/// Provider columns of the CSV export.
pub const CSV_PROVIDER_FIELDS: [ProviderField; 8] = [
    ProviderField::Stake,
    ProviderField::Equity,
    ProviderField::EquityShare,
    ProviderField::FeeRevenue,
    ProviderField::AnnualisedReturn,
    ProviderField::Margin,
    ProviderField::EntryValuation,
    ProviderField::Obligation,
];

/// Market columns of the numeric frame export.
pub const FRAME_MARKET_FIELDS: [MarketField; 12] = [
    MarketField::N,
    MarketField::MarkPrice,
    MarketField::TradedVolume,
    MarketField::OpenInterest,
    MarketField::Valuation,
    MarketField::TargetStake,
    MarketField::TotalStake,
    MarketField::TotalMargin,
    MarketField::FeeRate,
    MarketField::FeesCollected,
    MarketField::AnnualisedReturn,
    MarketField::AnnualisedReturnOnCapital,
];

/// Provider columns of the numeric frame export.
pub const FRAME_PROVIDER_FIELDS: [ProviderField; 6] = [
    ProviderField::Stake,
    ProviderField::EquityShare,
    ProviderField::StakeShare,
    ProviderField::FeeRevenue,
    ProviderField::AnnualisedReturn,
    ProviderField::Margin,
];

/// One row per snapshot of a market history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTable {
    pub version: String,
    pub market: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl HistoryTable {
    /// Evaluate `market_fields` and `provider_fields` at every step.
    pub fn build(
        history: &MarketHistory,
        market_fields: &[MarketField],
        provider_fields: &[ProviderField],
    ) -> Result<Self, MechanismError> {
        let mut providers: Vec<&str> = Vec::new();
        for snapshot in history.iter() {
            for name in snapshot.provider_names() {
                if !providers.contains(&name.as_str()) {
                    providers.push(name.as_str());
                }
            }
        }

        let mut columns: Vec<String> =
            market_fields.iter().map(|f| f.as_str().to_string()).collect();
        for provider in &providers {
            for field in provider_fields {
                columns.push(format!("{provider}_{field}"));
            }
        }

        let mut rows = Vec::with_capacity(history.len());
        for view in history.views() {
            let mut row = Vec::with_capacity(columns.len());
            for field in market_fields {
                row.push(Some(view.field(*field)?));
            }
            for provider in &providers {
                for field in provider_fields {
                    let cell = match view.provider_field(provider, *field) {
                        None => None,
                        Some(Ok(value)) => Some(value),
                        Some(Err(MechanismError::Provider(ProviderError::UndefinedReturn {
                            ..
                        }))) => None,
                        Some(Err(e)) => return Err(e),
                    };
                    row.push(cell);
                }
            }
            rows.push(row);
        }

        Ok(Self {
            version: crate::VERSION.to_string(),
            market: history.latest().name.to_string(),
            columns,
            rows,
        })
    }

    /// Table with the CSV column set.
    pub fn csv(history: &MarketHistory) -> Result<Self, MechanismError> {
        Self::build(history, &CSV_MARKET_FIELDS, &CSV_PROVIDER_FIELDS)
    }

    /// Table with the frame column set (adds open interest and stake share).
    pub fn frame(history: &MarketHistory) -> Result<Self, MechanismError> {
        Self::build(history, &FRAME_MARKET_FIELDS, &FRAME_PROVIDER_FIELDS)
    }

    /// Header and rows as comma-separated values; missing cells are empty.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        let header: Vec<Cow<'_, str>> = self.columns.iter().map(|c| csv_cell(c)).collect();
        writeln!(writer, "{}", header.join(","))?;
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default())
                .collect();
            writeln!(writer, "{}", cells.join(","))?;
        }
        Ok(())
    }

    pub fn to_csv_string(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.write_csv(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Rows with missing cells read as zero.
    pub fn numeric_rows(&self) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.unwrap_or(0.0)).collect())
            .collect()
    }

    /// Values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Write the CSV export to a file path.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

/// Quote a cell holding a separator, quote or line break; inner quotes are doubled.
fn csv_cell(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketConfig, StepUpdate};
    use crate::provider::LiquidityProvider;

    fn test_history() -> MarketHistory {
        let mut history = MarketHistory::new(MarketConfig {
            name: "SOL-PERP".to_string(),
            mark_price: 100.0,
            traded_volume: 50.0,
            ..Default::default()
        })
        .unwrap();
        history.attach(LiquidityProvider::new("alice", 100.0, 0.01).unwrap());
        history.next(StepUpdate::new().traded_volume(60.0)).unwrap();
        history.attach(LiquidityProvider::new("bob", 0.0, 0.02).unwrap());
        history.next(StepUpdate::new().traded_volume(70.0)).unwrap();
        history
    }

    #[test]
    fn test_field_names_parse() {
        for field in MarketField::ALL {
            assert_eq!(field.as_str().parse::<MarketField>().unwrap(), field);
        }
        for field in ProviderField::ALL {
            assert_eq!(field.as_str().parse::<ProviderField>().unwrap(), field);
        }
        assert_eq!(
            "volume".parse::<MarketField>().unwrap_err(),
            UnknownField("volume".to_string())
        );
    }

    #[test]
    fn test_columns_in_first_seen_order() {
        let table = HistoryTable::csv(&test_history()).unwrap();
        assert_eq!(table.columns.len(), 12 + 2 * 8);
        assert_eq!(table.columns[0], "_n");
        assert_eq!(table.columns[12], "alice_stake");
        assert_eq!(table.columns[20], "bob_stake");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.market, "SOL-PERP");
    }

    #[test]
    fn test_missing_provider_cells_are_empty() {
        let table = HistoryTable::csv(&test_history()).unwrap();
        let bob_stake = table.column("bob_stake").unwrap();
        assert_eq!(bob_stake, vec![None, Some(0.0), Some(0.0)]);
        // Zero stake: return undefined
        let bob_return = table.column("bob_annualised_return").unwrap();
        assert_eq!(bob_return, vec![None, None, None]);
        let alice_return = table.column("alice_annualised_return").unwrap();
        assert!(alice_return.iter().all(|cell| cell.is_some()));
    }

    #[test]
    fn test_write_csv() {
        let table = HistoryTable::csv(&test_history()).unwrap();
        let csv = table.to_csv_string();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("_n,mark_price,traded_volume,valuation"));
        assert!(lines[1].starts_with("0,100,50,"));
        assert_eq!(lines[1].split(',').count(), table.columns.len());
        assert!(lines[1].ends_with(",,,,,,,"));
    }

    #[test]
    fn test_csv_quotes_awkward_provider_names() {
        let mut history = MarketHistory::new(MarketConfig {
            mark_price: 100.0,
            ..Default::default()
        })
        .unwrap();
        history.attach(LiquidityProvider::new("a,b", 10.0, 0.01).unwrap());
        history.attach(LiquidityProvider::new("x\"y", 20.0, 0.02).unwrap());
        let table = HistoryTable::csv(&history).unwrap();
        let csv = table.to_csv_string();
        let header = csv.lines().next().unwrap();

        assert!(header.contains(",\"a,b_stake\","));
        assert!(header.contains(",\"x\"\"y_stake\","));
        assert_eq!(csv_cell("alice_stake"), "alice_stake");
        assert_eq!(csv_cell("line\nbreak"), "\"line\nbreak\"");

        // Quoted header still splits into one field per column
        let mut fields = 0;
        let mut quoted = false;
        for ch in header.chars() {
            match ch {
                '"' => quoted = !quoted,
                ',' if !quoted => fields += 1,
                _ => {}
            }
        }
        assert_eq!(fields + 1, table.columns.len());
    }

    #[test]
    fn test_frame_fields_and_numeric_rows() {
        let table = HistoryTable::frame(&test_history()).unwrap();
        assert!(table.columns.contains(&"open_interest".to_string()));
        assert!(table.columns.contains(&"alice_stake_share".to_string()));
        assert!(!table.columns.contains(&"total_equity".to_string()));

        let numeric = table.numeric_rows();
        let bob_stake = table.columns.iter().position(|c| c == "bob_stake").unwrap();
        assert_eq!(numeric[0][bob_stake], 0.0);
    }

    #[test]
    fn test_to_json() {
        let table = HistoryTable::csv(&test_history()).unwrap();
        let json = table.to_json().unwrap();
        let parsed: HistoryTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.columns, table.columns);
        assert_eq!(parsed.version, crate::VERSION);
    }
}
