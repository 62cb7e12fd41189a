use serde_json::{Map, Value, json};

/// Field projected for the structure identifier.
pub const ID_FIELD: &str = "task_id";
pub const FORMULA_FIELD: &str = "full_formula";
pub const CIF_FIELD: &str = "cif";
pub const ELEMENTS_FIELD: &str = "elements";

/// A database query: filter criteria plus the projected fields.
///
/// `target` names the property whose value becomes
/// [`StructureRecord::value`](crate::StructureRecord::value).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub criteria: Map<String, Value>,
    pub properties: Vec<String>,
    pub target: String,
}

impl Query {
    /// Thermodynamically stable (`e_above_hull == 0`), fully ordered structures,
    /// projecting formula, identifier, `target`, CIF text and element list.
    pub fn stable_ordered(target: &str) -> Self {
        let mut criteria = Map::new();
        criteria.insert("is_ordered".into(), json!(true));
        criteria.insert("e_above_hull".into(), json!(0));

        Self {
            criteria,
            properties: vec![
                FORMULA_FIELD.to_string(),
                ID_FIELD.to_string(),
                target.to_string(),
                CIF_FIELD.to_string(),
                ELEMENTS_FIELD.to_string(),
            ],
            target: target.to_string(),
        }
    }

    pub fn with_criterion(mut self, key: impl Into<String>, value: Value) -> Self {
        self.criteria.insert(key.into(), value);
        self
    }
}
