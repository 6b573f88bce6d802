use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use filing_common::{DocumentSink, EmbeddingRecord, FilingError, FilingResult, WriteStats};

/// One CSV row of the staging artifact. The vector is kept in a single
/// column as a JSON array.
#[derive(Debug, Serialize, Deserialize)]
struct StagingRow {
    company_name: String,
    cusip: String,
    seq_id: usize,
    id: String,
    embedding: String,
    text: String,
}

impl StagingRow {
    fn from_record(record: &EmbeddingRecord) -> FilingResult<Self> {
        Ok(Self {
            company_name: record.company_name.clone(),
            cusip: record.cusip.clone(),
            seq_id: record.seq_id,
            id: record.id.clone(),
            embedding: serde_json::to_string(&record.embedding)
                .map_err(|e| FilingError::Staging(e.to_string()))?,
            text: record.text.clone(),
        })
    }

    fn into_record(self) -> FilingResult<EmbeddingRecord> {
        let embedding = serde_json::from_str(&self.embedding).map_err(|e| {
            FilingError::Staging(format!("row {}: bad embedding column: {e}", self.id))
        })?;
        Ok(EmbeddingRecord {
            company_name: self.company_name,
            cusip: self.cusip,
            seq_id: self.seq_id,
            id: self.id,
            embedding,
            text: self.text,
        })
    }
}

/// CSV hand-off file for a separate loading stage.
pub struct CsvStaging {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvStaging {
    /// Create (or truncate) the staging file and write its header.
    pub fn create(path: &Path) -> FilingResult<Self> {
        let writer = csv::Writer::from_path(path)
            .map_err(|e| FilingError::Staging(format!("{}: {e}", path.display())))?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl DocumentSink for CsvStaging {
    async fn write(&self, records: &[EmbeddingRecord]) -> FilingResult<WriteStats> {
        let rows = records
            .iter()
            .map(StagingRow::from_record)
            .collect::<FilingResult<Vec<_>>>()?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| FilingError::Staging("staging writer poisoned".into()))?;
        for row in &rows {
            writer
                .serialize(row)
                .map_err(|e| FilingError::Staging(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| FilingError::Staging(e.to_string()))?;

        Ok(WriteStats {
            batches: 1,
            written: rows.len(),
        })
    }
}

/// Read a staging file back into records.
pub fn read_staging(path: &Path) -> FilingResult<Vec<EmbeddingRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| FilingError::Staging(format!("{}: {e}", path.display())))?;

    let records = reader
        .deserialize::<StagingRow>()
        .map(|row| {
            row.map_err(|e| FilingError::Staging(e.to_string()))
                .and_then(StagingRow::into_record)
        })
        .collect::<FilingResult<Vec<_>>>()?;

    info!(path = %path.display(), records = records.len(), "Staging file read");
    Ok(records)
}
