//! CSV bulk import and export of buyers

use std::sync::Arc;

use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Buyer, BuyerFilter, BuyerHistory, BuyerSort, ImportSummary, InvalidRow};
use crate::repository::BuyerRepository;
use crate::services::buyer::now_micros;
use crate::services::history;
use shared::{validate_csv_row, BuyerFields, CsvBuyerRow, EXPORT_HEADERS};

/// CSV import/export service
#[derive(Clone)]
pub struct CsvService {
    buyers: Arc<dyn BuyerRepository>,
    max_rows: usize,
}

/// Attachment name for an export taken on `date`
pub fn export_filename(date: NaiveDate) -> String {
    format!("buyers-export-{}.csv", date.format("%Y-%m-%d"))
}

impl CsvService {
    pub fn new(buyers: Arc<dyn BuyerRepository>, max_rows: usize) -> Self {
        Self { buyers, max_rows }
    }

    /// Parse CSV text into header-keyed rows. Blank lines are skipped and
    /// every cell is trimmed.
    pub fn parse_rows(&self, text: &str) -> AppResult<Vec<CsvBuyerRow>> {
        let invalid = |e: csv::Error| {
            tracing::debug!("CSV parse failure: {}", e);
            AppError::BadRequest("Invalid CSV format".to_string())
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(invalid)?;
        if headers.iter().all(str::is_empty) {
            return Err(AppError::BadRequest("Invalid CSV format".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.deserialize::<CsvBuyerRow>() {
            rows.push(record.map_err(invalid)?);
            if rows.len() > self.max_rows {
                return Err(AppError::BadRequest(format!(
                    "CSV contains too many rows. Maximum allowed is {}",
                    self.max_rows
                )));
            }
        }

        if rows.is_empty() {
            return Err(AppError::BadRequest("CSV file contains no data rows".to_string()));
        }
        Ok(rows)
    }

    /// Validate every row; any failure rejects the whole file
    pub fn validate_rows(rows: &[CsvBuyerRow]) -> AppResult<Vec<BuyerFields>> {
        let mut valid = Vec::with_capacity(rows.len());
        let mut invalid = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            match validate_csv_row(row) {
                Ok(fields) => valid.push(fields),
                Err(errors) => invalid.push(InvalidRow { row: index + 1, errors }),
            }
        }

        if invalid.is_empty() {
            Ok(valid)
        } else {
            Err(AppError::CsvRowsInvalid(invalid))
        }
    }

    /// Import a CSV file as buyers owned by `owner_id`, all or nothing
    pub async fn import(&self, owner_id: Uuid, text: &str) -> AppResult<ImportSummary> {
        let rows = self.parse_rows(text)?;
        let rows = Self::validate_rows(&rows).map_err(|e| {
            if let AppError::CsvRowsInvalid(ref invalid) = e {
                tracing::info!(invalid = invalid.len(), "CSV import rejected");
            }
            e
        })?;

        let now = now_micros();
        let batch = rows
            .into_iter()
            .map(|fields| {
                let submitted = fields.clone();
                let buyer = Buyer {
                    id: Uuid::new_v4(),
                    status: fields.resolved_status(None),
                    full_name: fields.full_name,
                    email: fields.email,
                    phone: fields.phone,
                    city: fields.city,
                    property_type: fields.property_type,
                    bhk: fields.bhk,
                    purpose: fields.purpose,
                    budget_min: fields.budget_min,
                    budget_max: fields.budget_max,
                    timeline: fields.timeline,
                    source: fields.source,
                    notes: fields.notes,
                    tags: fields.tags,
                    owner_id,
                    created_at: now,
                    updated_at: now,
                };
                let entry = history::imported_entry(&buyer, &submitted, owner_id)?;
                Ok((buyer, entry))
            })
            .collect::<AppResult<Vec<(Buyer, BuyerHistory)>>>()?;

        self.buyers.insert_buyers(&batch).await?;

        tracing::info!(count = batch.len(), owner_id = %owner_id, "CSV import completed");
        Ok(ImportSummary::new(batch.len()))
    }

    /// Every buyer matching `filter`, as CSV text with a header row
    pub async fn export(&self, filter: &BuyerFilter, sort: BuyerSort) -> AppResult<String> {
        let items = self.buyers.list_buyers(filter, sort, None).await?;
        let buyers: Vec<Buyer> = items.into_iter().map(|item| item.buyer).collect();
        Self::export_to_csv(&buyers)
    }

    /// Render buyers as CSV: every cell quoted, `\n` line endings
    pub fn export_to_csv(buyers: &[Buyer]) -> AppResult<String> {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(vec![]);

        wtr.write_record(EXPORT_HEADERS)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        for buyer in buyers {
            wtr.write_record(CsvBuyerRow::from_buyer(buyer).to_record())
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }

        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}
