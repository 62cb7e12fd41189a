/// A crystallographic symmetry operation acting on fractional coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymOp {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl SymOp {
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Parses the Jones-faithful notation used by `_symmetry_equiv_pos_as_xyz`,
    /// e.g. `x, y, z` or `-x+1/2, y-1/2, -z`.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 3 {
            return None;
        }

        let mut op = SymOp {
            rotation: [[0.0; 3]; 3],
            translation: [0.0; 3],
        };
        for (row, part) in parts.iter().enumerate() {
            let (coeffs, shift) = parse_component(part)?;
            op.rotation[row] = coeffs;
            op.translation[row] = shift;
        }
        Some(op)
    }

    pub fn apply(&self, frac: [f64; 3]) -> [f64; 3] {
        let mut out = self.translation;
        for (row, o) in out.iter_mut().enumerate() {
            for (col, f) in frac.iter().enumerate() {
                *o += self.rotation[row][col] * f;
            }
        }
        out
    }
}

fn parse_component(text: &str) -> Option<([f64; 3], f64)> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return None;
    }

    let mut coeffs = [0.0; 3];
    let mut shift = 0.0;
    let mut sign = 1.0;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '+' => {
                sign = 1.0;
                i += 1;
            }
            '-' => {
                sign = -1.0;
                i += 1;
            }
            c @ ('x' | 'y' | 'z' | 'X' | 'Y' | 'Z') => {
                let axis = match c.to_ascii_lowercase() {
                    'x' => 0,
                    'y' => 1,
                    _ => 2,
                };
                coeffs[axis] += sign;
                sign = 1.0;
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '/') {
                    i += 1;
                }
                let number: String = chars[start..i].iter().collect();
                let value = parse_fraction(&number)?;

                // A numeric factor directly before an axis scales it, e.g. `2x`.
                if let Some(axis) = chars.get(i).and_then(|c| match c.to_ascii_lowercase() {
                    'x' => Some(0),
                    'y' => Some(1),
                    'z' => Some(2),
                    _ => None,
                }) {
                    coeffs[axis] += sign * value;
                    i += 1;
                } else {
                    shift += sign * value;
                }
                sign = 1.0;
            }
            _ => return None,
        }
    }

    Some((coeffs, shift))
}

fn parse_fraction(text: &str) -> Option<f64> {
    match text.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / den)
        }
        None => text.parse().ok(),
    }
}

/// Wraps a fractional coordinate into `[0, 1)`.
pub fn wrap_unit(x: f64) -> f64 {
    let w = x - x.floor();
    if w >= 1.0 - 1e-10 { 0.0 } else { w }
}

/// Whether two fractional positions coincide modulo lattice translations.
pub fn same_position(a: [f64; 3], b: [f64; 3], tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| {
        let d = x - y;
        (d - d.round()).abs() <= tol
    })
}
