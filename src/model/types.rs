use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element symbol: '{0}'")]
pub struct ParseElementError(String);

macro_rules! periodic_table {
    ($($sym:ident = $z:literal),+ $(,)?) => {
        /// A chemical element, H through Og.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Element {
            $($sym = $z),+
        }

        impl Element {
            /// Every element in order of increasing atomic number.
            pub const ALL: &'static [Element] = &[$(Element::$sym),+];

            pub fn symbol(&self) -> &'static str {
                match self {
                    $(Element::$sym => stringify!($sym)),+
                }
            }
        }

        impl FromStr for Element {
            type Err = ParseElementError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($sym) => Ok(Element::$sym),)+
                    _ => Err(ParseElementError(s.to_string())),
                }
            }
        }
    };
}

#[rustfmt::skip]
periodic_table! {
    H = 1, He = 2,
    Li = 3, Be = 4, B = 5, C = 6, N = 7, O = 8, F = 9, Ne = 10,
    Na = 11, Mg = 12, Al = 13, Si = 14, P = 15, S = 16, Cl = 17, Ar = 18,
    K = 19, Ca = 20, Sc = 21, Ti = 22, V = 23, Cr = 24, Mn = 25, Fe = 26, Co = 27,
    Ni = 28, Cu = 29, Zn = 30, Ga = 31, Ge = 32, As = 33, Se = 34, Br = 35, Kr = 36,
    Rb = 37, Sr = 38, Y = 39, Zr = 40, Nb = 41, Mo = 42, Tc = 43, Ru = 44, Rh = 45,
    Pd = 46, Ag = 47, Cd = 48, In = 49, Sn = 50, Sb = 51, Te = 52, I = 53, Xe = 54,
    Cs = 55, Ba = 56, La = 57, Ce = 58, Pr = 59, Nd = 60, Pm = 61, Sm = 62, Eu = 63,
    Gd = 64, Tb = 65, Dy = 66, Ho = 67, Er = 68, Tm = 69, Yb = 70, Lu = 71, Hf = 72,
    Ta = 73, W = 74, Re = 75, Os = 76, Ir = 77, Pt = 78, Au = 79, Hg = 80, Tl = 81,
    Pb = 82, Bi = 83, Po = 84, At = 85, Rn = 86,
    Fr = 87, Ra = 88, Ac = 89, Th = 90, Pa = 91, U = 92, Np = 93, Pu = 94, Am = 95,
    Cm = 96, Bk = 97, Cf = 98, Es = 99, Fm = 100, Md = 101, No = 102, Lr = 103, Rf = 104,
    Db = 105, Sg = 106, Bh = 107, Hs = 108, Mt = 109, Ds = 110, Rg = 111, Cn = 112,
    Nh = 113, Fl = 114, Mc = 115, Lv = 116, Ts = 117, Og = 118,
}

impl Element {
    #[inline]
    pub fn atomic_number(&self) -> u8 {
        *self as u8
    }

    pub fn from_atomic_number(z: u8) -> Option<Self> {
        if z == 0 {
            return None;
        }
        Self::ALL.get(usize::from(z) - 1).copied()
    }

    /// Infers an element from a CIF label or oxidation-decorated symbol such as
    /// `Fe1`, `O2-` or `fe`.
    pub fn guess(token: &str) -> Option<Self> {
        let letters: String = token
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if letters.is_empty() {
            return None;
        }

        let mut chars = letters.chars();
        let first = chars.next()?.to_ascii_uppercase();
        if let Some(second) = chars.next() {
            let two = format!("{first}{}", second.to_ascii_lowercase());
            if let Ok(el) = two.parse() {
                return Some(el);
            }
        }
        first.to_string().parse().ok()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_from_str_valid() {
        assert_eq!(Element::from_str("H").unwrap(), Element::H);
        assert_eq!(Element::from_str("Fe").unwrap(), Element::Fe);
        assert_eq!(Element::from_str("Og").unwrap(), Element::Og);
    }

    #[test]
    fn element_from_str_invalid_case() {
        let err = Element::from_str("h").unwrap_err();
        assert_eq!(err.to_string(), "invalid or unsupported element symbol: 'h'");
    }

    #[test]
    fn table_is_contiguous() {
        assert_eq!(Element::ALL.len(), 118);
        for (i, el) in Element::ALL.iter().enumerate() {
            assert_eq!(usize::from(el.atomic_number()), i + 1);
        }
    }

    #[test]
    fn atomic_number_round_trip() {
        assert_eq!(Element::Na.atomic_number(), 11);
        assert_eq!(Element::from_atomic_number(26), Some(Element::Fe));
        assert_eq!(Element::from_atomic_number(0), None);
        assert_eq!(Element::from_atomic_number(119), None);
    }

    #[test]
    fn guess_handles_labels_and_charges() {
        assert_eq!(Element::guess("Fe1"), Some(Element::Fe));
        assert_eq!(Element::guess("O2-"), Some(Element::O));
        assert_eq!(Element::guess("cl"), Some(Element::Cl));
        assert_eq!(Element::guess("C12"), Some(Element::C));
        assert_eq!(Element::guess("Ca"), Some(Element::Ca));
        assert_eq!(Element::guess("12"), None);
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&vec![Element::Si, Element::O]).unwrap();
        assert_eq!(json, r#"["Si","O"]"#);
        let back: Vec<Element> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Element::Si, Element::O]);
        assert!(serde_json::from_str::<Element>(r#""Xx""#).is_err());
    }
}
