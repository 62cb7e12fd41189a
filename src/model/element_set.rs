use super::types::Element;
use std::fmt;

/// Set of chemical elements backed by a 128-bit mask indexed by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElementSet(u128);

/// Symbols admitted by the fetcher: H through Bi, without the noble gases.
#[rustfmt::skip]
pub const ALLOWED_SYMBOLS: [&str; 78] = [
    "H", "Li", "Be", "B", "C", "N", "O", "F", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag",
    "Cd", "In", "Sn", "Sb", "Te", "I", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm",
    "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os",
    "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi",
];

impl ElementSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The 78-element allow-list used when filtering database records.
    pub fn allowed() -> Self {
        ALLOWED_SYMBOLS
            .iter()
            .filter_map(|s| s.parse::<Element>().ok())
            .collect()
    }

    #[inline]
    fn bit(element: Element) -> u128 {
        1u128 << (element.atomic_number() - 1)
    }

    pub fn insert(&mut self, element: Element) -> bool {
        let had = self.contains(element);
        self.0 |= Self::bit(element);
        !had
    }

    #[inline]
    pub fn contains(&self, element: Element) -> bool {
        self.0 & Self::bit(element) != 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Elements in `self` that are absent from `other`.
    #[inline]
    pub fn difference(&self, other: &ElementSet) -> ElementSet {
        ElementSet(self.0 & !other.0)
    }

    #[inline]
    pub fn is_subset(&self, other: &ElementSet) -> bool {
        self.difference(other).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Element> + '_ {
        Element::ALL.iter().copied().filter(|e| self.contains(*e))
    }
}

impl FromIterator<Element> for ElementSet {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        let mut set = ElementSet::empty();
        for el in iter {
            set.insert(el);
        }
        set
    }
}

impl<'a> FromIterator<&'a Element> for ElementSet {
    fn from_iter<I: IntoIterator<Item = &'a Element>>(iter: I) -> Self {
        iter.into_iter().copied().collect()
    }
}

impl fmt::Display for ElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<_> = self.iter().map(|e| e.symbol()).collect();
        write!(f, "{{{}}}", symbols.join(", "))
    }
}
