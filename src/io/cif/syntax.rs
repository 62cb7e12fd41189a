use crate::io::{Format, error::Error};
use std::collections::HashMap;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Data(String),
    Loop,
    Tag(String),
    Value(String),
}

/// A value together with the line it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Loop {
    pub tags: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

impl Loop {
    pub fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Items and loops of a single `data_` block. Tags are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct DataBlock {
    pub name: String,
    pub items: HashMap<String, Field>,
    pub loops: Vec<Loop>,
}

impl DataBlock {
    pub fn item(&self, tag: &str) -> Option<&Field> {
        self.items.get(&tag.to_ascii_lowercase())
    }

    /// First loop that declares any of the given tags.
    pub fn loop_with(&self, tags: &[&str]) -> Option<&Loop> {
        self.loops
            .iter()
            .find(|lp| tags.iter().any(|t| lp.column(t).is_some()))
    }
}

/// Parses the first data block of a CIF document.
pub fn parse_first_block<R: BufRead>(reader: R) -> Result<DataBlock, Error> {
    let tokens = tokenize(reader)?;
    let mut iter = tokens.into_iter().peekable();
    let mut block: Option<DataBlock> = None;

    while let Some((line, token)) = iter.next() {
        match token {
            Token::Data(name) => {
                if block.is_some() {
                    break;
                }
                block = Some(DataBlock {
                    name,
                    ..DataBlock::default()
                });
            }
            Token::Tag(tag) => {
                let current = block
                    .as_mut()
                    .ok_or_else(|| Error::parse(Format::Cif, line, "tag outside of a data block"))?;
                match iter.next() {
                    Some((vline, Token::Value(text))) => {
                        current
                            .items
                            .insert(tag.to_ascii_lowercase(), Field { line: vline, text });
                    }
                    _ => {
                        return Err(Error::parse(
                            Format::Cif,
                            line,
                            format!("tag '{tag}' has no value"),
                        ));
                    }
                }
            }
            Token::Loop => {
                let current = block
                    .as_mut()
                    .ok_or_else(|| Error::parse(Format::Cif, line, "loop_ outside of a data block"))?;

                let mut lp = Loop::default();
                while let Some((_, Token::Tag(_))) = iter.peek() {
                    if let Some((_, Token::Tag(tag))) = iter.next() {
                        lp.tags.push(tag.to_ascii_lowercase());
                    }
                }
                if lp.tags.is_empty() {
                    return Err(Error::parse(Format::Cif, line, "loop_ declares no tags"));
                }

                let mut values = Vec::new();
                while let Some((_, Token::Value(_))) = iter.peek() {
                    if let Some((vline, Token::Value(text))) = iter.next() {
                        values.push(Field { line: vline, text });
                    }
                }
                if values.len() % lp.tags.len() != 0 {
                    return Err(Error::parse(
                        Format::Cif,
                        line,
                        format!(
                            "loop has {} values, not a multiple of its {} tags",
                            values.len(),
                            lp.tags.len()
                        ),
                    ));
                }

                let width = lp.tags.len();
                let mut values = values.into_iter();
                loop {
                    let row: Vec<Field> = values.by_ref().take(width).collect();
                    if row.is_empty() {
                        break;
                    }
                    lp.rows.push(row);
                }
                current.loops.push(lp);
            }
            Token::Value(text) => {
                return Err(Error::parse(
                    Format::Cif,
                    line,
                    format!("unexpected value '{text}' without a tag"),
                ));
            }
        }
    }

    block.ok_or_else(|| Error::parse(Format::Cif, 1, "no data_ block found"))
}

fn tokenize<R: BufRead>(reader: R) -> Result<Vec<(usize, Token)>, Error> {
    let mut tokens = Vec::new();
    let mut text_field: Option<(usize, String)> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let ln = i + 1;

        if let Some((start, mut buf)) = text_field.take() {
            if line.starts_with(';') {
                tokens.push((start, Token::Value(buf.trim().to_string())));
            } else {
                buf.push_str(&line);
                buf.push('\n');
                text_field = Some((start, buf));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(';') {
            text_field = Some((ln, format!("{rest}\n")));
            continue;
        }

        tokenize_line(&line, ln, &mut tokens)?;
    }

    if let Some((start, _)) = text_field {
        return Err(Error::parse(Format::Cif, start, "unterminated text field"));
    }

    Ok(tokens)
}

fn tokenize_line(line: &str, ln: usize, tokens: &mut Vec<(usize, Token)>) -> Result<(), Error> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        if c == '\'' || c == '"' {
            // A quote only closes when followed by whitespace or end of line.
            let mut j = i + 1;
            loop {
                if j >= chars.len() {
                    return Err(Error::parse(Format::Cif, ln, "unterminated quoted string"));
                }
                if chars[j] == c && chars.get(j + 1).is_none_or(|n| n.is_whitespace()) {
                    break;
                }
                j += 1;
            }
            let value: String = chars[i + 1..j].iter().collect();
            tokens.push((ln, Token::Value(value)));
            i = j + 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        tokens.push((ln, classify(word)));
    }

    Ok(())
}

fn classify(word: String) -> Token {
    let lower = word.to_ascii_lowercase();
    if lower == "loop_" {
        Token::Loop
    } else if lower.starts_with("data_") {
        Token::Data(word[5..].to_string())
    } else if word.starts_with('_') {
        Token::Tag(word)
    } else {
        Token::Value(word)
    }
}

/// Parses a CIF numeric value, dropping a trailing standard uncertainty such
/// as `5.4307(2)`.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = match text.find('(') {
        Some(idx) => &text[..idx],
        None => text,
    };
    trimmed.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_items_and_loops() {
        let src = "\
# comment
data_test
_cell_length_a   5.43(1)
_chemical_formula_sum  'Si8'
loop_
 _atom_site_label
 _atom_site_fract_x
  Si1  0.0
  Si2  0.25
";
        let block = parse_first_block(Cursor::new(src)).unwrap();
        assert_eq!(block.name, "test");
        assert_eq!(block.item("_cell_length_a").unwrap().text, "5.43(1)");
        assert_eq!(block.item("_chemical_formula_sum").unwrap().text, "Si8");

        let lp = block.loop_with(&["_atom_site_fract_x"]).unwrap();
        assert_eq!(lp.rows.len(), 2);
        assert_eq!(lp.rows[1][0].text, "Si2");
        assert_eq!(lp.rows[1][1].line, 9);
    }

    #[test]
    fn quoted_values_keep_inner_spaces_and_apostrophes() {
        let src = "data_q\n_symmetry_space_group_name_H-M 'P 1'\n_note \"it's fine\"\n";
        let block = parse_first_block(Cursor::new(src)).unwrap();
        assert_eq!(block.item("_symmetry_space_group_name_h-m").unwrap().text, "P 1");
        assert_eq!(block.item("_note").unwrap().text, "it's fine");
    }

    #[test]
    fn semicolon_text_fields_are_single_values() {
        let src = "data_t\n_audit_creation_method\n;\nmulti\nline\n;\n_cell_length_a 1.0\n";
        let block = parse_first_block(Cursor::new(src)).unwrap();
        assert_eq!(block.item("_audit_creation_method").unwrap().text, "multi\nline");
        assert_eq!(block.item("_cell_length_a").unwrap().text, "1.0");
    }

    #[test]
    fn stops_at_second_block() {
        let src = "data_one\n_a 1\ndata_two\n_b 2\n";
        let block = parse_first_block(Cursor::new(src)).unwrap();
        assert!(block.item("_a").is_some());
        assert!(block.item("_b").is_none());
    }

    #[test]
    fn ragged_loop_is_rejected() {
        let src = "data_r\nloop_\n_x\n_y\n1 2 3\n";
        let err = parse_first_block(Cursor::new(src)).unwrap_err();
        assert!(matches!(err, Error::Parse { format: Format::Cif, line: 2, .. }));
    }

    #[test]
    fn number_with_uncertainty() {
        assert_eq!(parse_number("5.4307(2)"), Some(5.4307));
        assert_eq!(parse_number("90"), Some(90.0));
        assert_eq!(parse_number("?"), None);
    }
}
