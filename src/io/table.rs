use crate::io::error::Error;
use crate::model::record::StructureRecord;
use std::io::{Read, Write};

pub const FORMULA_COLUMN: &str = "full_formula";
pub const ID_COLUMN: &str = "task_id";

/// One `(identifier, target)` row of a summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub id: String,
    pub target: Option<f64>,
}

/// Writes the `full_formula,task_id,<property>` summary, one row per record.
/// Missing property values are written as empty cells.
pub fn write_summary<W: Write>(
    writer: W,
    property: &str,
    records: &[StructureRecord],
) -> Result<usize, Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([FORMULA_COLUMN, ID_COLUMN, property])?;

    for record in records {
        let value = record.value.map(|v| v.to_string()).unwrap_or_default();
        csv.write_record([
            record.full_formula.as_str(),
            record.task_id.as_str(),
            value.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(records.len())
}

/// Reads identifiers and target values from a summary table.
pub fn read_targets<R: Read>(reader: R, property: &str) -> Result<Vec<TargetRow>, Error> {
    let mut csv = csv::Reader::from_reader(reader);
    let headers = csv.headers()?.clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let id_col = find(ID_COLUMN)?;
    let target_col = find(property)?;

    let mut rows = Vec::new();
    for (i, result) in csv.records().enumerate() {
        let record = result?;
        let id = record.get(id_col).unwrap_or_default().trim().to_string();
        let raw = record.get(target_col).unwrap_or_default().trim();
        let target = if raw.is_empty() {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|_| {
                Error::parse(
                    crate::io::Format::Csv,
                    i + 2,
                    format!("invalid {property} value '{raw}'"),
                )
            })?)
        };
        rows.push(TargetRow { id, target });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Element;

    fn record(id: &str, formula: &str, value: Option<f64>) -> StructureRecord {
        StructureRecord {
            task_id: id.to_string(),
            full_formula: formula.to_string(),
            value,
            elements: vec![Element::Na, Element::Cl],
            cif: String::new(),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let records = vec![
            record("mp-22862", "Na4Cl4", Some(-27.1)),
            record("mp-1", "Cs1", None),
        ];
        let mut buf = Vec::new();
        let n = write_summary(&mut buf, "final_energy", &records).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "full_formula,task_id,final_energy\nNa4Cl4,mp-22862,-27.1\nCs1,mp-1,\n"
        );
    }

    #[test]
    fn reads_targets_by_column_name() {
        let src = "full_formula,task_id,band_gap\nSi2,mp-149,0.61\nFe2,mp-13,\n";
        let rows = read_targets(src.as_bytes(), "band_gap").unwrap();
        assert_eq!(
            rows,
            vec![
                TargetRow { id: "mp-149".into(), target: Some(0.61) },
                TargetRow { id: "mp-13".into(), target: None },
            ]
        );
    }

    #[test]
    fn missing_property_column() {
        let src = "full_formula,task_id,band_gap\n";
        let err = read_targets(src.as_bytes(), "vbm").unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "vbm"));
    }

    #[test]
    fn bad_number_reports_row_line() {
        let src = "full_formula,task_id,vbm\nA,mp-1,1.0\nB,mp-2,nope\n";
        let err = read_targets(src.as_bytes(), "vbm").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
    }
}
