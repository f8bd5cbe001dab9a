//! Reading and writing of YOLO annotation files.
//!
//! Each line holds one box as `<class> <center_x> <center_y> <width> <height>`,
//! whitespace delimited, with every coordinate normalized to the image size.

use crate::dataset::common_structs::BoundingBox;
use crate::error::{Error, ParseError, Result};
use itertools::Itertools;
use std::fs;
use std::path::Path;

/// Decimal places used for the coordinates of written records
pub const RECORD_PRECISION: usize = 6;

const FIELD_NAMES: [&str; 4] = ["center_x", "center_y", "width", "height"];

pub fn parse_record(
    line: &str,
    img_width: u32,
    img_height: u32,
) -> Result<BoundingBox, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ParseError::FieldCount(fields.len()));
    }
    let class_id = parse_class_id(fields[0])?;
    let mut coords = [0f64; 4];
    for ((coord, raw), field) in coords.iter_mut().zip(&fields[1..]).zip(FIELD_NAMES) {
        *coord = raw.parse().map_err(|_| ParseError::NonNumeric {
            field,
            value: raw.to_string(),
        })?;
    }
    let [center_x, center_y, width, height] = coords;
    BoundingBox::from_normalized(
        class_id, center_x, center_y, width, height, img_width, img_height,
    )
}

// Tabular tools sometimes write the class column as a float, accept "3.0" as 3
fn parse_class_id(raw: &str) -> Result<u32, ParseError> {
    if let Ok(class_id) = raw.parse::<u32>() {
        return Ok(class_id);
    }
    match raw.parse::<f64>() {
        Ok(value) if value >= 0. && value.fract() == 0. && value <= u32::MAX as f64 => {
            Ok(value as u32)
        }
        _ => Err(ParseError::ClassId(raw.to_string())),
    }
}

/// Parses a whole annotation file content, skipping blank lines.
/// `path` is only used for error reporting.
pub fn parse_annotations(
    content: &str,
    path: &Path,
    img_width: u32,
    img_height: u32,
) -> Result<Vec<BoundingBox>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_idx, line)| {
            parse_record(line, img_width, img_height).map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                source,
            })
        })
        .collect()
}

pub fn read_annotations(path: &Path, img_width: u32, img_height: u32) -> Result<Vec<BoundingBox>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_annotations(&content, path, img_width, img_height)
}

pub fn format_record(bbox: &BoundingBox) -> String {
    let (class_id, center_x, center_y, width, height) = bbox.to_normalized_record();
    format!(
        "{} {:.prec$} {:.prec$} {:.prec$} {:.prec$}",
        class_id,
        center_x,
        center_y,
        width,
        height,
        prec = RECORD_PRECISION
    )
}

pub fn write_annotations(path: &Path, bboxes: &[BoundingBox]) -> Result<()> {
    let mut content = bboxes.iter().map(format_record).join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))
}
