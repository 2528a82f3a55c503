//! Material import from CSV.
//!
//! Expected columns (matched case-insensitively, surrounding whitespace
//! ignored): `Material`, `Quantity in Kgs`, `Rate`, `COST`,
//! `Certification if any`. A few common aliases are accepted as well.

use std::io::Read;

use vendorflow_storage::{Material, MaterialId};

/// Certification applied when the first row names none.
pub const DEFAULT_CERTIFICATION: &str = "FSSAI";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("'{file_name}' is not a CSV file")]
    NotCsv { file_name: String },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of importing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialImport {
    pub materials: Vec<Material>,
    /// Taken from the first row and applied to the whole batch.
    pub certification: String,
}

/// Reject an upload that is neither declared nor named as CSV.
pub fn ensure_csv_upload(file_name: &str, content_type: Option<&str>) -> Result<(), ImportError> {
    let declared = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("csv"));
    let named = file_name.to_ascii_lowercase().ends_with(".csv");
    if declared || named {
        Ok(())
    } else {
        Err(ImportError::NotCsv {
            file_name: file_name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Material,
    Quantity,
    Rate,
    Cost,
    Certification,
}

fn classify(header: &str) -> Option<Column> {
    let normalized = header
        .trim()
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    match normalized.as_str() {
        "material" | "material name" | "name" => Some(Column::Material),
        "quantity in kgs" | "quantity" | "qty" => Some(Column::Quantity),
        "rate" => Some(Column::Rate),
        "cost" | "total cost" => Some(Column::Cost),
        "certification if any" | "certification" => Some(Column::Certification),
        _ => None,
    }
}

/// Column positions resolved from the header row. First match wins.
#[derive(Debug, Default)]
struct Layout {
    material: Option<usize>,
    quantity: Option<usize>,
    rate: Option<usize>,
    cost: Option<usize>,
    certification: Option<usize>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut layout = Layout::default();
        for (idx, header) in headers.iter().enumerate() {
            let slot = match classify(header) {
                Some(Column::Material) => &mut layout.material,
                Some(Column::Quantity) => &mut layout.quantity,
                Some(Column::Rate) => &mut layout.rate,
                Some(Column::Cost) => &mut layout.cost,
                Some(Column::Certification) => &mut layout.certification,
                None => continue,
            };
            slot.get_or_insert(idx);
        }
        layout
    }
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Import materials from CSV text with a header row.
///
/// Ids are assigned sequentially from 1. Blank or unparsable numbers become
/// 0; a cost of 0 is derived as `quantity * rate`.
pub fn import_materials<R: Read>(reader: R) -> Result<MaterialImport, ImportError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let layout = Layout::from_headers(csv.headers()?);

    let mut materials = Vec::new();
    let mut certification = DEFAULT_CERTIFICATION.to_string();
    for (row, record) in csv.records().enumerate() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if materials.is_empty() {
            let cert = cell(&record, layout.certification);
            if !cert.is_empty() {
                certification = cert.to_string();
            }
        }

        let quantity = parse_leading_number(cell(&record, layout.quantity));
        let rate = parse_leading_number(cell(&record, layout.rate));
        let cost = parse_leading_number(cell(&record, layout.cost));
        let mut material = Material::new(
            Some(MaterialId::Seq(materials.len() as u64 + 1)),
            cell(&record, layout.material),
            quantity,
            rate,
        );
        if cost != 0.0 {
            material.total_cost = cost;
        }
        tracing::trace!(row, material = %material.name, quantity, rate, "imported row");
        materials.push(material);
    }

    tracing::debug!(count = materials.len(), %certification, "csv import finished");
    Ok(MaterialImport {
        materials,
        certification,
    })
}

/// Parse the longest leading decimal number in `s`: `"20 kg"` is 20,
/// `"1,200"` is 1, `"abc"` is 0.
pub fn parse_leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut best = 0;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
                best = end;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return 0.0;
    }
    // Exponent, only if followed by at least one digit.
    if matches!(bytes.get(best), Some(b'e' | b'E')) {
        let mut exp_end = best + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while matches!(bytes.get(exp_end), Some(b'0'..=b'9')) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            best = exp_end;
        }
    }
    s[..best].parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}
