// CSV loading with a text-encoding fallback chain

use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use encoding_rs::{Encoding, EUC_KR, UTF_8, WINDOWS_1252};
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encodings a CSV may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum TextEncoding {
    /// UTF-8, a leading byte-order mark stays part of the first header
    Utf8,
    /// UTF-8, a leading byte-order mark is stripped
    Utf8Sig,
    /// Korean code page 949 (decoded as the WHATWG EUC-KR superset)
    Cp949,
    /// windows-1252; every byte sequence decodes, so keep it last
    Latin1,
}

impl TextEncoding {
    pub fn default_chain() -> Vec<TextEncoding> {
        vec![TextEncoding::Utf8Sig, TextEncoding::Cp949, TextEncoding::Latin1]
    }

    fn encoding(self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Sig => UTF_8,
            TextEncoding::Cp949 => EUC_KR,
            TextEncoding::Latin1 => WINDOWS_1252,
        }
    }

    /// Strict decode: malformed input yields `None` instead of replacement characters.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        let bytes = match self {
            TextEncoding::Utf8Sig => bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes),
            _ => bytes,
        };
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(bytes)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Cp949 => "cp949",
            TextEncoding::Latin1 => "latin1",
        };
        f.write_str(name)
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(TextEncoding::Utf8Sig),
            "cp949" | "euc-kr" | "euckr" => Ok(TextEncoding::Cp949),
            "latin1" | "latin-1" | "iso-8859-1" | "windows-1252" | "cp1252" => {
                Ok(TextEncoding::Latin1)
            }
            other => Err(format!("unknown text encoding '{}'", other)),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Read a file and decode it with the first encoding that yields valid CSV.
pub fn read_csv_file(path: &Path, encodings: &[TextEncoding]) -> Result<Dataset> {
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
    read_csv_bytes(&name, &bytes, encodings)
}

/// Decode `bytes` with each encoding in turn until one both decodes strictly
/// and parses as CSV.
pub fn read_csv_bytes(source_name: &str, bytes: &[u8], encodings: &[TextEncoding]) -> Result<Dataset> {
    if encodings.is_empty() {
        return Err(DashboardError::data_load(source_name, "no text encodings to try"));
    }

    let mut attempts = Vec::with_capacity(encodings.len());
    for &encoding in encodings {
        let text = match encoding.decode(bytes) {
            Some(text) => text,
            None => {
                debug!(%encoding, source = source_name, "input is not valid in this encoding");
                attempts.push(format!("{}: invalid byte sequence", encoding));
                continue;
            }
        };

        match parse_csv(&text) {
            Ok(dataset) => {
                info!(
                    %encoding,
                    source = source_name,
                    rows = dataset.len(),
                    columns = dataset.headers.len(),
                    "loaded CSV"
                );
                return Ok(dataset);
            }
            Err(reason) => {
                debug!(%encoding, source = source_name, %reason, "CSV parse failed");
                attempts.push(format!("{}: {}", encoding, reason));
            }
        }
    }

    Err(DashboardError::data_load(
        source_name,
        format!("unparseable under every attempted encoding ({})", attempts.join("; ")),
    ))
}

/// Parse decoded CSV text into a dataset. Header names are trimmed.
fn parse_csv(text: &str) -> std::result::Result<Dataset, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err("CSV has no header row".to_string());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Dataset::new(headers, rows).map_err(|e| match e {
        DashboardError::DataLoad { reason, .. } => reason,
        other => other.to_string(),
    })
}
