use crate::models::{AggregateTable, Dataset, Histogram, PivotTable};

/// Column order of the full-record export, matching `Record`'s fields.
const RECORD_COLUMNS: [&str; 10] = [
    "gender",
    "age",
    "dob",
    "friend_count",
    "likes",
    "likes_received",
    "mobile_likes",
    "tenure",
    "engagement_rate",
    "click_through_rate",
];

/// Serialize a grouped table to a comma-separated blob, headers first.
/// Parsing the blob back reproduces the in-memory keys and values.
pub fn table_to_csv(table: &AggregateTable) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = table.key_columns.iter().map(String::as_str).collect();
    header.push(&table.value_column);
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut fields: Vec<String> = row.keys.iter().map(|k| k.to_string()).collect();
        fields.push(row.value.to_string());
        writer.write_record(&fields)?;
    }

    finish(writer)
}

/// Serialize the full filtered dataset. An undefined dob becomes an
/// empty cell.
pub fn records_to_csv(dataset: &Dataset) -> anyhow::Result<String> {
    // The header is written explicitly so an empty dataset still
    // exports its column names.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(RECORD_COLUMNS)?;
    for record in dataset.records() {
        writer.serialize(record)?;
    }
    finish(writer)
}

pub fn pivot_to_csv(pivot: &PivotTable) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = vec![&pivot.row_column];
    header.extend(pivot.column_labels.iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in &pivot.rows {
        let mut fields = vec![row.key.to_string()];
        fields.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&fields)?;
    }

    finish(writer)
}

pub fn histogram_to_csv(histogram: &Histogram) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["lower", "upper", "count"])?;
    for bin in &histogram.bins {
        writer.write_record([
            bin.lower.to_string(),
            bin.upper.to_string(),
            bin.count.to_string(),
        ])?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<String> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
