use super::symmetry::{SymOp, same_position, wrap_unit};
use super::syntax::{DataBlock, Field, Loop, parse_first_block, parse_number};
use crate::io::{Format, error::Error};
use crate::model::crystal::{Crystal, Lattice, Site};
use crate::model::types::Element;
use std::io::BufRead;

const SYMOP_TAGS: [&str; 2] = [
    "_symmetry_equiv_pos_as_xyz",
    "_space_group_symop_operation_xyz",
];
const POSITION_TOLERANCE: f64 = 1e-4;
const OCCUPANCY_TOLERANCE: f64 = 1e-3;

pub fn read<R: BufRead>(reader: R) -> Result<Crystal, Error> {
    let block = parse_first_block(reader)?;

    let lattice = read_lattice(&block)?;
    let ops = read_symops(&block)?;
    let asymmetric = read_sites(&block)?;

    let mut sites: Vec<Site> = Vec::new();
    for site in &asymmetric {
        for op in &ops {
            let p = op.apply(site.frac);
            let frac = [wrap_unit(p[0]), wrap_unit(p[1]), wrap_unit(p[2])];
            let duplicate = sites.iter().any(|s| {
                s.element == site.element && same_position(s.frac, frac, POSITION_TOLERANCE)
            });
            if !duplicate {
                sites.push(Site::new(site.element, frac));
            }
        }
    }

    Ok(Crystal::new(lattice, sites))
}

fn read_lattice(block: &DataBlock) -> Result<Lattice, Error> {
    let param = |tag: &str| -> Result<f64, Error> {
        let field = block.item(tag).ok_or_else(|| {
            Error::parse(Format::Cif, 1, format!("missing required item '{tag}'"))
        })?;
        parse_number(&field.text)
            .ok_or_else(|| Error::parse(Format::Cif, field.line, format!("invalid number for '{tag}'")))
    };

    let a = param("_cell_length_a")?;
    let b = param("_cell_length_b")?;
    let c = param("_cell_length_c")?;
    let alpha = param("_cell_angle_alpha")?;
    let beta = param("_cell_angle_beta")?;
    let gamma = param("_cell_angle_gamma")?;

    if a <= 0.0 || b <= 0.0 || c <= 0.0 {
        return Err(Error::parse(Format::Cif, 1, "cell lengths must be positive"));
    }

    Ok(Lattice::from_parameters(a, b, c, alpha, beta, gamma))
}

fn read_symops(block: &DataBlock) -> Result<Vec<SymOp>, Error> {
    let fields: Vec<&Field> = match block.loop_with(&SYMOP_TAGS) {
        Some(lp) => {
            let col = SYMOP_TAGS
                .iter()
                .find_map(|t| lp.column(t))
                .unwrap_or_default();
            lp.rows.iter().map(|row| &row[col]).collect()
        }
        None => SYMOP_TAGS.iter().filter_map(|t| block.item(t)).collect(),
    };

    if fields.is_empty() {
        return Ok(vec![SymOp::identity()]);
    }

    fields
        .into_iter()
        .map(|f| {
            SymOp::parse(&f.text).ok_or_else(|| {
                Error::parse(
                    Format::Cif,
                    f.line,
                    format!("invalid symmetry operation '{}'", f.text),
                )
            })
        })
        .collect()
}

fn read_sites(block: &DataBlock) -> Result<Vec<Site>, Error> {
    let lp = block
        .loop_with(&["_atom_site_fract_x"])
        .ok_or_else(|| Error::parse(Format::Cif, 1, "no _atom_site loop with fractional coordinates"))?;

    let col = |tag: &str| lp.column(tag);
    let (Some(cx), Some(cy), Some(cz)) = (
        col("_atom_site_fract_x"),
        col("_atom_site_fract_y"),
        col("_atom_site_fract_z"),
    ) else {
        return Err(Error::parse(
            Format::Cif,
            first_line(lp),
            "atom site loop lacks one of fract_x/y/z",
        ));
    };
    let symbol_col = col("_atom_site_type_symbol");
    let label_col = col("_atom_site_label");
    let occ_col = col("_atom_site_occupancy");

    if symbol_col.is_none() && label_col.is_none() {
        return Err(Error::parse(
            Format::Cif,
            first_line(lp),
            "atom site loop has neither type_symbol nor label",
        ));
    }

    let mut sites = Vec::with_capacity(lp.rows.len());
    for row in &lp.rows {
        let line = row[cx].line;
        let coord = |c: usize, axis: &str| {
            parse_number(&row[c].text).ok_or_else(|| {
                Error::parse(Format::Cif, line, format!("invalid fractional {axis} coordinate"))
            })
        };
        let frac = [coord(cx, "x")?, coord(cy, "y")?, coord(cz, "z")?];

        let element = symbol_col
            .and_then(|c| Element::guess(&row[c].text))
            .or_else(|| label_col.and_then(|c| Element::guess(&row[c].text)))
            .ok_or_else(|| Error::parse(Format::Cif, line, "unable to infer element symbol"))?;

        if let Some(c) = occ_col
            && let Some(occupancy) = parse_number(&row[c].text)
            && occupancy < 1.0 - OCCUPANCY_TOLERANCE
        {
            let site = label_col
                .map(|c| row[c].text.clone())
                .unwrap_or_else(|| element.to_string());
            return Err(Error::PartialOccupancy { site, occupancy });
        }

        sites.push(Site::new(element, frac));
    }

    Ok(sites)
}

fn first_line(lp: &Loop) -> usize {
    lp.rows
        .first()
        .and_then(|r| r.first())
        .map(|f| f.line)
        .unwrap_or(1)
}
