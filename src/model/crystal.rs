use super::types::Element;

/// Periodic lattice given by three Cartesian row vectors in Ångströms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    pub vectors: [[f64; 3]; 3],
}

impl Lattice {
    pub fn new(vectors: [[f64; 3]; 3]) -> Self {
        Self { vectors }
    }

    pub fn cubic(a: f64) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    /// Builds a lattice from cell lengths (Å) and angles (degrees), with `a`
    /// along x and `b` in the xy plane.
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let (alpha, beta, gamma) = (alpha.to_radians(), beta.to_radians(), gamma.to_radians());
        let (cos_a, cos_b, cos_g) = (alpha.cos(), beta.cos(), gamma.cos());
        let sin_g = gamma.sin();

        let cx = c * cos_b;
        let cy = c * (cos_a - cos_b * cos_g) / sin_g;
        let cz = (c * c - cx * cx - cy * cy).max(0.0).sqrt();

        Self::new([
            [a, 0.0, 0.0],
            [b * cos_g, b * sin_g, 0.0],
            [cx, cy, cz],
        ])
    }

    pub fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let v = &self.vectors;
        let mut out = [0.0; 3];
        for (k, o) in out.iter_mut().enumerate() {
            *o = frac[0] * v[0][k] + frac[1] * v[1][k] + frac[2] * v[2][k];
        }
        out
    }

    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.vectors;
        dot(a, cross(b, c)).abs()
    }

    /// Perpendicular distances between opposite cell faces.
    pub fn plane_spacings(&self) -> [f64; 3] {
        let [a, b, c] = self.vectors;
        let vol = self.volume();
        [
            vol / norm(cross(b, c)),
            vol / norm(cross(c, a)),
            vol / norm(cross(a, b)),
        ]
    }

    pub fn lengths(&self) -> [f64; 3] {
        let [a, b, c] = self.vectors;
        [norm(a), norm(b), norm(c)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub element: Element,
    pub frac: [f64; 3],
}

impl Site {
    pub fn new(element: Element, frac: [f64; 3]) -> Self {
        Self { element, frac }
    }
}

/// An ordered periodic crystal: one element per site.
#[derive(Debug, Clone, PartialEq)]
pub struct Crystal {
    pub lattice: Lattice,
    pub sites: Vec<Site>,
}

impl Crystal {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self {
        Self { lattice, sites }
    }

    #[inline]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn cartesian_positions(&self) -> Vec<[f64; 3]> {
        self.sites
            .iter()
            .map(|s| self.lattice.to_cartesian(s.frac))
            .collect()
    }
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
