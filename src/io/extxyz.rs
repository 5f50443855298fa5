use crate::io::{Format, error::Error};
use crate::model::configuration::AtomicConfiguration;
use crate::model::types::Element;
use serde_json::{Map, Value};
use std::io::BufRead;

const DEFAULT_PROPERTIES: &str = "species:S:1:pos:R:3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Str,
    Real,
    Int,
    Logical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PropertyColumn {
    name: String,
    kind: ColumnKind,
    width: usize,
}

/// Reads every frame of an extended-XYZ stream.
pub fn read<R: BufRead>(reader: R) -> Result<Vec<AtomicConfiguration>, Error> {
    let lines = collect_lines(reader)?;
    let mut frames = Vec::new();
    let mut cursor = 0;

    while let Some((count_line_no, count_line)) = next_data_line(&lines, &mut cursor) {
        let natoms = count_line.trim().parse::<usize>().map_err(|_| {
            Error::parse(Format::ExtXyz, count_line_no, "expected an atom count")
        })?;

        let (comment_no, comment) = lines
            .get(cursor)
            .cloned()
            .ok_or_else(|| Error::parse(Format::ExtXyz, count_line_no + 1, "missing comment line"))?;
        cursor += 1;

        let atom_lines = lines.get(cursor..cursor + natoms).ok_or_else(|| {
            Error::parse(
                Format::ExtXyz,
                lines.last().map(|(ln, _)| *ln).unwrap_or(comment_no),
                format!("frame ended before {natoms} atom lines"),
            )
        })?;
        cursor += natoms;

        frames.push(parse_frame(comment_no, &comment, atom_lines)?);
    }

    Ok(frames)
}

fn collect_lines<R: BufRead>(reader: R) -> Result<Vec<(usize, String)>, Error> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| {
            line.map(|v| (i + 1, v))
                .map_err(|e| Error::Io { source: e })
        })
        .collect()
}

fn next_data_line(lines: &[(usize, String)], cursor: &mut usize) -> Option<(usize, String)> {
    while *cursor < lines.len() {
        let (ln, content) = &lines[*cursor];
        *cursor += 1;
        if content.trim().is_empty() {
            continue;
        }
        return Some((*ln, content.clone()));
    }
    None
}

fn parse_frame(
    comment_no: usize,
    comment: &str,
    atom_lines: &[(usize, String)],
) -> Result<AtomicConfiguration, Error> {
    let pairs = parse_comment(comment, comment_no)?;

    let mut cell = [[0.0; 3]; 3];
    let mut pbc = [false; 3];
    let mut pbc_given = None;
    let mut properties = parse_properties(DEFAULT_PROPERTIES, comment_no)?;
    let mut info = Map::new();

    for (key, raw) in pairs {
        match key.as_str() {
            "Lattice" => {
                cell = parse_lattice(&raw, comment_no)?;
                pbc = [true; 3];
            }
            "pbc" => pbc_given = Some(parse_pbc(&raw, comment_no)?),
            "Properties" => properties = parse_properties(&raw, comment_no)?,
            _ => {
                info.insert(key, parse_info_value(&raw));
            }
        }
    }
    if let Some(explicit) = pbc_given {
        pbc = explicit;
    }

    if !properties.iter().any(|c| c.name == "species") {
        return Err(Error::parse(Format::ExtXyz, comment_no, "Properties lacks 'species'"));
    }
    if !properties.iter().any(|c| c.name == "pos" && c.width == 3) {
        return Err(Error::parse(Format::ExtXyz, comment_no, "Properties lacks 'pos:R:3'"));
    }
    let expected_width: usize = properties.iter().map(|c| c.width).sum();

    let mut numbers = Vec::with_capacity(atom_lines.len());
    let mut positions = Vec::with_capacity(atom_lines.len());
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(atom_lines.len()); properties.len()];

    for (ln, raw) in atom_lines {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.len() != expected_width {
            return Err(Error::parse(
                Format::ExtXyz,
                *ln,
                format!("expected {expected_width} columns, found {}", parts.len()),
            ));
        }

        let mut offset = 0;
        for (idx, column) in properties.iter().enumerate() {
            let fields = &parts[offset..offset + column.width];
            offset += column.width;

            match column.name.as_str() {
                "species" => {
                    let element = fields[0].parse::<Element>().map_err(|_| {
                        Error::parse(Format::ExtXyz, *ln, format!("unknown element '{}'", fields[0]))
                    })?;
                    numbers.push(element.atomic_number());
                }
                "pos" => {
                    let mut xyz = [0.0; 3];
                    for (slot, field) in xyz.iter_mut().zip(fields) {
                        *slot = field.parse::<f64>().map_err(|_| {
                            Error::parse(Format::ExtXyz, *ln, format!("invalid coordinate '{field}'"))
                        })?;
                    }
                    positions.push(xyz);
                }
                _ => {
                    let values = fields
                        .iter()
                        .map(|f| parse_typed(f, column.kind, *ln))
                        .collect::<Result<Vec<_>, _>>()?;
                    columns[idx].push(if column.width == 1 {
                        values.into_iter().next().unwrap_or(Value::Null)
                    } else {
                        Value::Array(values)
                    });
                }
            }
        }
    }

    let mut arrays = Map::new();
    for (column, values) in properties.into_iter().zip(columns) {
        if column.name != "species" && column.name != "pos" {
            arrays.insert(column.name, Value::Array(values));
        }
    }

    AtomicConfiguration::new(numbers, positions, cell, pbc)
        .and_then(|c| c.with_info(info).with_arrays(arrays))
        .map_err(|e| Error::parse(Format::ExtXyz, comment_no, e.to_string()))
}

/// Splits the comment line into `key=value` pairs. Values may be quoted;
/// a bare key stands for a true flag.
fn parse_comment(line: &str, line_no: usize) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();
    let mut chars = line.trim().chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        if key.is_empty() {
            return Err(Error::parse(Format::ExtXyz, line_no, "empty key in comment line"));
        }

        if chars.next_if_eq(&'=').is_none() {
            pairs.push((key, "T".to_string()));
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(Error::parse(
                    Format::ExtXyz,
                    line_no,
                    format!("unterminated quote in value of '{key}'"),
                ));
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }
        pairs.push((key, value));
    }

    Ok(pairs)
}

fn parse_lattice(raw: &str, line_no: usize) -> Result<[[f64; 3]; 3], Error> {
    let values = raw
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::parse(Format::ExtXyz, line_no, "Lattice holds a non-numeric value"))?;
    if values.len() != 9 {
        return Err(Error::parse(
            Format::ExtXyz,
            line_no,
            format!("Lattice needs 9 numbers, found {}", values.len()),
        ));
    }
    let mut cell = [[0.0; 3]; 3];
    for (i, v) in values.into_iter().enumerate() {
        cell[i / 3][i % 3] = v;
    }
    Ok(cell)
}

fn parse_pbc(raw: &str, line_no: usize) -> Result<[bool; 3], Error> {
    let flags = raw
        .split_whitespace()
        .map(parse_bool)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::parse(Format::ExtXyz, line_no, "pbc must hold T/F flags"))?;
    match flags.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        [a] => Ok([*a; 3]),
        _ => Err(Error::parse(Format::ExtXyz, line_no, "pbc needs 1 or 3 flags")),
    }
}

fn parse_properties(raw: &str, line_no: usize) -> Result<Vec<PropertyColumn>, Error> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(Error::parse(
            Format::ExtXyz,
            line_no,
            "Properties must be name:type:count triples",
        ));
    }

    parts
        .chunks(3)
        .map(|triple| {
            let kind = match triple[1] {
                "S" => ColumnKind::Str,
                "R" => ColumnKind::Real,
                "I" => ColumnKind::Int,
                "L" => ColumnKind::Logical,
                other => {
                    return Err(Error::parse(
                        Format::ExtXyz,
                        line_no,
                        format!("unknown Properties type '{other}'"),
                    ));
                }
            };
            let width = triple[2]
                .parse::<usize>()
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| {
                    Error::parse(Format::ExtXyz, line_no, "invalid Properties column count")
                })?;
            Ok(PropertyColumn {
                name: triple[0].to_string(),
                kind,
                width,
            })
        })
        .collect()
}

fn parse_typed(field: &str, kind: ColumnKind, line_no: usize) -> Result<Value, Error> {
    let invalid = || Error::parse(Format::ExtXyz, line_no, format!("invalid value '{field}'"));
    Ok(match kind {
        ColumnKind::Str => Value::from(field),
        ColumnKind::Real => Value::from(field.parse::<f64>().map_err(|_| invalid())?),
        ColumnKind::Int => Value::from(field.parse::<i64>().map_err(|_| invalid())?),
        ColumnKind::Logical => Value::from(parse_bool(field).ok_or_else(invalid)?),
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "T" | "True" | "true" => Some(true),
        "F" | "False" | "false" => Some(false),
        _ => None,
    }
}

fn parse_scalar(s: &str) -> Option<Value> {
    if let Some(b) = parse_bool(s) {
        return Some(Value::from(b));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::from)
}

/// Integers, floats and booleans become typed values. A whitespace list of
/// such values becomes an array. Anything else stays a string.
fn parse_info_value(raw: &str) -> Value {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Value::from(raw),
        [single] => parse_scalar(single).unwrap_or_else(|| Value::from(raw)),
        many => many
            .iter()
            .map(|t| parse_scalar(t))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array)
            .unwrap_or_else(|| Value::from(raw)),
    }
}
