use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::RawRecord;

/// Columns every source file must provide. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "gender",
    "age",
    "dob_year",
    "dob_month",
    "dob_day",
    "friend_count",
    "likes",
    "likes_received",
    "mobile_likes",
    "tenure",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read header row")]
    Header(#[source] csv::Error),
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("failed to parse row at line {line}")]
    Row {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// Load the source dataset. The delimiter is chosen by extension:
/// `.tsv` / `.txt` are read as tab-separated, everything else as CSV.
pub fn load(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&bytes, delimiter_for(path))
}

pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    }
}

/// Parse a delimited byte blob into raw records.
pub fn parse(bytes: &[u8], delimiter: u8) -> Result<Vec<RawRecord>, LoadError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(LoadError::Header)?;
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for result in reader.deserialize::<RawRecord>() {
        let record = result.map_err(|source| LoadError::Row {
            line: source.position().map_or(0, |p| p.line()),
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Decode the file as UTF-8, falling back to Latin-1 for the extended
/// byte sequences the source exports sometimes carry. Every Latin-1
/// byte maps to the Unicode code point of the same value.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "gender,age,dob_year,dob_month,dob_day,friend_count,likes,likes_received,mobile_likes,tenure";

    #[test]
    fn parses_rows_and_ignores_extra_columns() {
        let data = format!(
            "{HEADER},city\nmale,20,2000,5,25,10,4,9,2,250,Oslo\nfemale,30,1990,1,2,5,1,1,0,100,Lima\n"
        );
        let records = parse(data.as_bytes(), b',').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gender.as_deref(), Some("male"));
        assert_eq!(records[0].friend_count, 10);
        assert_eq!(records[1].age, 30);
    }

    #[test]
    fn empty_and_na_cells_become_null() {
        let data = format!("{HEADER}\n,25,1995,3,3,3,0,0,0,NA\nNA,40,1980,7,7,8,2,2,1,\n");
        let records = parse(data.as_bytes(), b',').unwrap();
        assert_eq!(records[0].gender, None);
        assert_eq!(records[0].tenure, None);
        assert_eq!(records[1].gender, None);
        assert_eq!(records[1].tenure, None);
    }

    #[test]
    fn reports_every_missing_column() {
        let data = "gender,age,dob_year,dob_month,dob_day,friend_count,likes\nmale,20,2000,5,25,10,4\n";
        let err = parse(data.as_bytes(), b',').unwrap_err();
        match err {
            LoadError::MissingColumns(missing) => {
                assert_eq!(missing, vec!["likes_received", "mobile_likes", "tenure"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn row_errors_carry_the_line_number() {
        let data = format!("{HEADER}\nmale,20,2000,5,25,10,4,9,2,250\nfemale,not-a-number,1990,1,2,5,1,1,0,100\n");
        let err = parse(data.as_bytes(), b',').unwrap_err();
        match err {
            LoadError::Row { line, .. } => assert_eq!(line, 3),
            other => panic!("expected Row, got {other:?}"),
        }
    }

    #[test]
    fn tolerates_latin1_byte_sequences() {
        let mut data = format!("{HEADER},city\nmale,20,2000,5,25,10,4,9,2,250,").into_bytes();
        // "Zürich" in ISO-8859-1: the ü is a single 0xFC byte, invalid as UTF-8.
        data.extend_from_slice(&[b'Z', 0xFC, b'r', b'i', b'c', b'h', b'\n']);
        let records = parse(&data, b',').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].friend_count, 10);
    }

    #[test]
    fn reads_tab_separated_files() {
        let header = HEADER.replace(',', "\t");
        let data = format!("{header}\nmale\t20\t2000\t5\t25\t10\t4\t9\t2\t250\n");
        let records = parse(data.as_bytes(), b'\t').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].likes_received, 9);
    }

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(delimiter_for(Path::new("data.tsv")), b'\t');
        assert_eq!(delimiter_for(Path::new("data.txt")), b'\t');
        assert_eq!(delimiter_for(Path::new("pseudo_facebook.csv")), b',');
    }
}
