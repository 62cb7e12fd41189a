use crate::io::atom_init::AtomInitTable;
use crate::model::types::Element;
use std::collections::HashMap;

/// Supplies the initial feature vector of each element.
pub trait AtomInitializer: Send + Sync {
    /// Length of every vector returned by [`features`](Self::features).
    fn feature_len(&self) -> usize;

    /// `None` when the element has no embedding.
    fn features(&self, element: Element) -> Option<&[f32]>;
}

/// Embeddings read from an `atom_init.json` table.
#[derive(Debug, Clone)]
pub struct JsonAtomInitializer {
    embeddings: HashMap<Element, Vec<f32>>,
    feature_len: usize,
}

impl JsonAtomInitializer {
    /// Keys that are not valid atomic numbers are ignored.
    pub fn new(table: &AtomInitTable) -> Self {
        let embeddings = table
            .features
            .iter()
            .filter_map(|(&z, v)| {
                let element = Element::from_atomic_number(z)?;
                Some((element, v.iter().map(|&x| x as f32).collect()))
            })
            .collect();
        Self {
            embeddings,
            feature_len: table.feature_len,
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.embeddings.keys().copied()
    }
}

impl AtomInitializer for JsonAtomInitializer {
    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn features(&self, element: Element) -> Option<&[f32]> {
        self.embeddings.get(&element).map(Vec::as_slice)
    }
}

/// One-hot encoding of the atomic number over all known elements.
#[derive(Debug, Clone)]
pub struct OneHotInitializer {
    rows: Vec<Vec<f32>>,
}

impl OneHotInitializer {
    pub fn new() -> Self {
        let n = Element::ALL.len();
        let rows = (0..n)
            .map(|i| {
                let mut row = vec![0.0; n];
                row[i] = 1.0;
                row
            })
            .collect();
        Self { rows }
    }
}

impl Default for OneHotInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomInitializer for OneHotInitializer {
    fn feature_len(&self) -> usize {
        self.rows.len()
    }

    fn features(&self, element: Element) -> Option<&[f32]> {
        self.rows
            .get(usize::from(element.atomic_number()) - 1)
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_initializer_looks_up_by_atomic_number() {
        let table = crate::io::atom_init::read(r#"{"8": [1, 0], "26": [0, 1]}"#.as_bytes()).unwrap();
        let init = JsonAtomInitializer::new(&table);
        assert_eq!(init.feature_len(), 2);
        assert_eq!(init.features(Element::O), Some(&[1.0f32, 0.0][..]));
        assert_eq!(init.features(Element::Fe), Some(&[0.0f32, 1.0][..]));
        assert_eq!(init.features(Element::H), None);
    }

    #[test]
    fn one_hot_marks_atomic_number() {
        let init = OneHotInitializer::new();
        assert_eq!(init.feature_len(), 118);
        let fe = init.features(Element::Fe).unwrap();
        assert_eq!(fe.iter().sum::<f32>(), 1.0);
        assert_eq!(fe[25], 1.0);
    }
}
