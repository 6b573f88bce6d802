use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FilingResult;

/// Value of the `type` property on every persisted Document node.
pub const DOCUMENT_TYPE: &str = "business_description";

// --- Filings ---

/// One pre-parsed 10-K filing, reduced to the fields the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingDocument {
    /// Archive entry file stem.
    pub filing_id: String,
    pub company_name: String,
    /// Company key shared with the pre-existing `Company` node.
    pub cusip: String,
    /// Item 1 ("Business") section text.
    pub business_description: String,
}

// --- Embedding records ---

/// The persisted unit: one chunk of a filing plus its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub company_name: String,
    pub cusip: String,
    pub seq_id: usize,
    /// Document node key.
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
}

/// How the Document node key is derived from a filing and a chunk sequence.
///
/// `CompanyName` concatenates company name and sequence id (`Acme0`). It is
/// only unique while no two filings share a company name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentIdStrategy {
    #[default]
    CompanyName,
    Cusip,
    FilingId,
}

impl DocumentIdStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyName => "company-name",
            Self::Cusip => "cusip",
            Self::FilingId => "filing-id",
        }
    }
}

impl fmt::Display for DocumentIdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentIdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company-name" => Ok(Self::CompanyName),
            "cusip" => Ok(Self::Cusip),
            "filing-id" => Ok(Self::FilingId),
            other => Err(format!(
                "unknown id strategy '{other}' (expected company-name, cusip or filing-id)"
            )),
        }
    }
}

pub fn document_id(strategy: DocumentIdStrategy, filing: &FilingDocument, seq_id: usize) -> String {
    match strategy {
        DocumentIdStrategy::CompanyName => format!("{}{}", filing.company_name, seq_id),
        DocumentIdStrategy::Cusip => format!("{}-{}", filing.cusip, seq_id),
        DocumentIdStrategy::FilingId => format!("{}-{}", filing.filing_id, seq_id),
    }
}

// --- Sinks ---

/// Outcome of writing a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Round trips issued (one per batch).
    pub batches: usize,
    /// Records that landed.
    pub written: usize,
}

impl AddAssign for WriteStats {
    fn add_assign(&mut self, rhs: Self) {
        self.batches += rhs.batches;
        self.written += rhs.written;
    }
}

/// Destination for embedding records: the graph writer or a staging file.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn write(&self, records: &[EmbeddingRecord]) -> FilingResult<WriteStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> FilingDocument {
        FilingDocument {
            filing_id: "0000950170-23-000001".into(),
            company_name: "Acme".into(),
            cusip: "C1".into(),
            business_description: String::new(),
        }
    }

    #[test]
    fn company_name_ids_concatenate_name_and_sequence() {
        assert_eq!(document_id(DocumentIdStrategy::CompanyName, &acme(), 2), "Acme2");
    }

    #[test]
    fn alternate_ids_are_scoped_by_key() {
        assert_eq!(document_id(DocumentIdStrategy::Cusip, &acme(), 0), "C1-0");
        assert_eq!(
            document_id(DocumentIdStrategy::FilingId, &acme(), 7),
            "0000950170-23-000001-7"
        );
    }

    #[test]
    fn id_strategy_parses_its_display_form() {
        for s in [
            DocumentIdStrategy::CompanyName,
            DocumentIdStrategy::Cusip,
            DocumentIdStrategy::FilingId,
        ] {
            assert_eq!(s.to_string().parse::<DocumentIdStrategy>(), Ok(s));
        }
        assert!("name".parse::<DocumentIdStrategy>().is_err());
    }

    #[test]
    fn write_stats_accumulate() {
        let mut total = WriteStats::default();
        total += WriteStats { batches: 2, written: 150 };
        total += WriteStats { batches: 1, written: 3 };
        assert_eq!(total, WriteStats { batches: 3, written: 153 });
    }
}
