use super::element_set::ElementSet;
use super::types::Element;

/// One structure as returned by the materials database.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureRecord {
    pub task_id: String,
    pub full_formula: String,
    /// Target property value; `None` when the database reports null.
    pub value: Option<f64>,
    pub elements: Vec<Element>,
    /// Raw CIF text describing the structure.
    pub cif: String,
}

impl StructureRecord {
    #[inline]
    pub fn element_set(&self) -> ElementSet {
        self.elements.iter().collect()
    }

    /// Elements of this record that fall outside `allowed`.
    #[inline]
    pub fn disallowed(&self, allowed: &ElementSet) -> ElementSet {
        self.element_set().difference(allowed)
    }
}
