use crate::io::{Format, error::Error};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

/// Element embedding table keyed by atomic number.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomInitTable {
    pub features: HashMap<u8, Vec<f64>>,
    pub feature_len: usize,
}

/// Reads an `atom_init.json` document: `{"1": [..], "2": [..], ...}`.
/// Every vector must have the same length.
pub fn read<R: Read>(reader: R) -> Result<AtomInitTable, Error> {
    let raw: BTreeMap<String, Vec<f64>> = serde_json::from_reader(reader)?;

    let mut features = HashMap::with_capacity(raw.len());
    let mut feature_len: Option<usize> = None;

    for (key, vector) in raw {
        let z: u8 = key.trim().parse().map_err(|_| {
            Error::parse(Format::AtomInit, 1, format!("key '{key}' is not an atomic number"))
        })?;
        match feature_len {
            None => feature_len = Some(vector.len()),
            Some(len) if len != vector.len() => {
                return Err(Error::parse(
                    Format::AtomInit,
                    1,
                    format!(
                        "element {z} has {} features, expected {len}",
                        vector.len()
                    ),
                ));
            }
            Some(_) => {}
        }
        features.insert(z, vector);
    }

    let feature_len =
        feature_len.ok_or_else(|| Error::parse(Format::AtomInit, 1, "table is empty"))?;

    Ok(AtomInitTable {
        features,
        feature_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_uniform_table() {
        let src = r#"{"1": [0, 1, 0], "8": [1, 0, 0.5]}"#;
        let table = read(src.as_bytes()).unwrap();
        assert_eq!(table.feature_len, 3);
        assert_eq!(table.features[&8], vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn rejects_ragged_table() {
        let src = r#"{"1": [0, 1], "2": [1]}"#;
        assert!(matches!(read(src.as_bytes()), Err(Error::Parse { .. })));
    }

    #[test]
    fn rejects_non_numeric_keys() {
        let src = r#"{"H": [0, 1]}"#;
        let err = read(src.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("not an atomic number"));
    }

    #[test]
    fn rejects_empty_table() {
        assert!(read("{}".as_bytes()).is_err());
    }
}
