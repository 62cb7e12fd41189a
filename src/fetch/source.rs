use super::error::Error;
use super::query::{CIF_FIELD, ELEMENTS_FIELD, FORMULA_FIELD, ID_FIELD, Query};
use crate::model::record::StructureRecord;
use crate::model::types::Element;
use serde_json::{Map, Value};

/// A provider of structure records, typically a remote materials database.
pub trait StructureSource {
    fn query(&self, query: &Query) -> Result<Vec<StructureRecord>, Error>;
}

impl<T: StructureSource + ?Sized> StructureSource for &T {
    fn query(&self, query: &Query) -> Result<Vec<StructureRecord>, Error> {
        (**self).query(query)
    }
}

/// Converts one JSON document of a query response into a record.
pub fn record_from_document(
    index: usize,
    doc: &Map<String, Value>,
    target: &str,
) -> Result<StructureRecord, Error> {
    let string_field = |name: &str| -> Result<String, Error> {
        match doc.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(Error::malformed(
                index,
                format!("field '{name}' should be a string, found {other}"),
            )),
            None => Err(Error::malformed(index, format!("missing field '{name}'"))),
        }
    };

    let task_id = string_field(ID_FIELD)?;
    if task_id.is_empty() || task_id.contains(['/', '\\']) || task_id == "." || task_id == ".." {
        return Err(Error::malformed(
            index,
            format!("'{task_id}' cannot be used as a file name"),
        ));
    }

    let full_formula = string_field(FORMULA_FIELD)?;
    let cif = string_field(CIF_FIELD)?;

    let value = match doc.get(target) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(Error::malformed(
                index,
                format!("property '{target}' should be numeric, found {other}"),
            ));
        }
    };

    let elements = match doc.get(ELEMENTS_FIELD) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(|s| s.parse::<Element>().ok())
                    .ok_or_else(|| Error::malformed(index, format!("invalid element entry {item}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(Error::malformed(
                index,
                format!("field '{ELEMENTS_FIELD}' should be a list, found {other}"),
            ));
        }
        None => return Err(Error::malformed(index, format!("missing field '{ELEMENTS_FIELD}'"))),
    };

    Ok(StructureRecord {
        task_id,
        full_formula,
        value,
        elements,
        cif,
    })
}
