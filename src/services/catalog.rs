use crate::error::{RecommenderError, Result};
use crate::models::{Catalog, CatalogItem, ItemId, UNKNOWN_VALUE};
use crate::utils::median;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// A styles row as it appears on disk; any attribute may be blank.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalogRow {
    id: ItemId,
    gender: Option<String>,
    master_category: Option<String>,
    sub_category: Option<String>,
    article_type: Option<String>,
    base_colour: Option<String>,
    season: Option<String>,
    year: Option<f64>,
    usage: Option<String>,
    product_display_name: Option<String>,
}

/// Reads the styles CSV. A strict pass is tried first; if any row is malformed
/// the file is re-read skipping rows whose shape does not match the header.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let bytes = std::fs::read(path)
        .map_err(|e| RecommenderError::io(format!("reading catalog {}", path.display()), e))?;
    let catalog = parse_catalog(&bytes, &path.display().to_string())?;
    info!(path = %path.display(), items = catalog.len(), "Catalog loaded");
    Ok(catalog)
}

pub fn parse_catalog(bytes: &[u8], source_name: &str) -> Result<Catalog> {
    let rows = match parse_strict(bytes) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(source = source_name, error = %e, "Malformed catalog rows, re-reading and skipping bad lines");
            parse_skipping(bytes, source_name)?
        }
    };
    Ok(impute(rows))
}

fn parse_strict(bytes: &[u8]) -> std::result::Result<Vec<RawCatalogRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    reader.deserialize().collect()
}

fn parse_skipping(bytes: &[u8], source_name: &str) -> Result<Vec<RawCatalogRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| RecommenderError::data_shape(source_name, e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line + 2, error = %e, "Skipping unreadable catalog line");
                skipped += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            warn!(
                line = line + 2,
                fields = record.len(),
                expected = headers.len(),
                "Skipping catalog line with wrong field count"
            );
            skipped += 1;
            continue;
        }
        match record.deserialize::<RawCatalogRow>(Some(&headers)) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(line = line + 2, error = %e, "Skipping catalog line that does not parse");
                skipped += 1;
            }
        }
    }

    if rows.is_empty() && skipped > 0 {
        return Err(RecommenderError::data_shape(
            source_name,
            format!("no usable rows ({} skipped)", skipped),
        ));
    }
    info!(kept = rows.len(), skipped, "Catalog re-read with malformed lines skipped");
    Ok(rows)
}

/// Blank categoricals become "Unknown", blank names "", blank years the median year.
fn impute(rows: Vec<RawCatalogRow>) -> Catalog {
    let years: Vec<f64> = rows.iter().filter_map(|row| row.year).collect();
    let median_year = median(&years).map_or(0, |year| year.round() as i32);

    let categorical = |value: Option<String>| match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN_VALUE.to_string(),
    };

    let items = rows
        .into_iter()
        .map(|row| CatalogItem {
            id: row.id,
            gender: categorical(row.gender),
            master_category: categorical(row.master_category),
            sub_category: categorical(row.sub_category),
            article_type: categorical(row.article_type),
            base_colour: categorical(row.base_colour),
            season: categorical(row.season),
            usage: categorical(row.usage),
            year: row.year.map_or(median_year, |year| year.round() as i32),
            product_display_name: row.product_display_name.unwrap_or_default(),
        })
        .collect();
    Catalog::new(items)
}
