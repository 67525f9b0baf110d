//! Survey area input
//!
//! Width and height are whole, positive cell counts. Interactive prompting
//! re-asks on invalid input, up to a fixed number of attempts.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::types::MissionArea;

/// Parses one dimension of the survey area
///
/// # Arguments
/// * `name` - Dimension name used in error messages ("width" or "height")
/// * `text` - Raw user input; surrounding whitespace is ignored
pub fn parse_dimension(name: &str, text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let value: u32 = trimmed.parse().map_err(|_| {
        Error::InvalidMissionArea(format!("{} must be a positive whole number, got {:?}", name, trimmed))
    })?;

    if value == 0 {
        return Err(Error::InvalidMissionArea(format!("{} must be at least 1", name)));
    }

    Ok(value)
}

/// Parses a width/height pair into a validated area
pub fn parse_area(width: &str, height: &str) -> Result<MissionArea> {
    let width = parse_dimension("width", width)?;
    let height = parse_dimension("height", height)?;
    MissionArea::new(width, height)
}

/// Prompts for width and height until both are valid or attempts run out
///
/// Returns the last validation error once `max_attempts` is exhausted, and an
/// error straight away if the input is closed.
pub fn prompt_area<R: BufRead, W: Write>(input: &mut R, output: &mut W, max_attempts: u32) -> Result<MissionArea> {
    let mut last_error = Error::InvalidMissionArea("no attempts allowed".to_string());

    for _ in 0..max_attempts {
        let width = prompt_line(input, output, "Enter the width to scan (in cells): ")?;
        let height = prompt_line(input, output, "Enter the height to scan (in cells): ")?;

        match parse_area(&width, &height) {
            Ok(area) => return Ok(area),
            Err(err) => {
                writeln!(output, "Error: {}. Please enter valid numeric values.", err)?;
                last_error = err;
            }
        }
    }

    Err(last_error)
}

fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::InvalidMissionArea("input closed before the area was entered".to_string()));
    }

    Ok(line)
}
