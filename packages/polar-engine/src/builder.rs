//! # builder
//!
//! Builds a static [`PolarTable`] from a text matrix:
//!
//! ```text
//! twa/tws;6;8;10
//! 45;4.8;5.6;6.1
//! 90;6.2;7.0;7.4
//! ```
//!
//! The header row lists wind speeds (the first cell is a label and ignored), every
//! following row starts with a wind angle and carries one boat speed per wind column.
//! Cells may be separated by `;`, `,`, tabs or runs of spaces (ORC exports and `.pol`
//! files). Empty and zero speeds are "no data". Values are converted to radians and m/s.
//!
//! The build is all-or-nothing: any malformed row fails the whole import.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::PolarError;
use crate::table::{AngleEntry, PolarTable, WindSpeedBucket};
use crate::units::{AngleUnit, SpeedUnit};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    pub angle_unit: AngleUnit,
    pub wind_speed_unit: SpeedUnit,
    pub boat_speed_unit: SpeedUnit,
    /// Copy every positive-angle point to the port side
    pub mirror: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            angle_unit: AngleUnit::Deg,
            wind_speed_unit: SpeedUnit::Knots,
            boat_speed_unit: SpeedUnit::Knots,
            mirror: true,
        }
    }
}

/// Cells of one non-blank input row with its 1-based line number.
struct Row {
    line: usize,
    cells: Vec<String>,
}

impl Row {
    fn cell(&self, i: usize) -> &str {
        self.cells.get(i).map_or("", String::as_str)
    }

    /// Drop trailing empty cells beyond `keep` (a trailing delimiter).
    fn trim_trailing(&mut self, keep: usize) {
        while self.cells.len() > keep && self.cells.last().is_some_and(|c| c.is_empty()) {
            self.cells.pop();
        }
    }
}

/// `;` or `,` separated text is read as is. Tab or space separated text (`.pol`) is
/// first rewritten with a single tab between cells.
fn read_rows(text: &str) -> Result<Vec<Row>, PolarError> {
    let header = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| PolarError::import(1, "table is empty"))?;

    let (delimiter, input) = if header.contains(';') {
        (b';', Cow::Borrowed(text))
    } else if !header.contains('\t') && header.contains(',') {
        (b',', Cow::Borrowed(text))
    } else {
        let normalised: Vec<String> = text
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join("\t"))
            .collect();
        (b'\t', Cow::Owned(normalised.join("\n")))
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map_or(rows.len() + 1, |p| p.line() as usize);
            PolarError::import(line, e.to_string())
        })?;
        let cells: Vec<String> = record.iter().map(|c| clean_cell(c).to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        let line = record.position().map_or(rows.len() + 1, |p| p.line() as usize);
        rows.push(Row { line, cells });
    }
    Ok(rows)
}

fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_end_matches('°').trim_end_matches('Â').trim()
}

fn parse_number(cell: &str, row: usize, what: &str) -> Result<f64, PolarError> {
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PolarError::import(row, format!("{what} {cell:?} is not a number")))
}

/// Parse `text` into a table with the given identity.
pub fn build_table(
    id: Uuid,
    name: &str,
    description: &str,
    text: &str,
    options: &ImportOptions,
) -> Result<PolarTable, PolarError> {
    let mut rows = read_rows(text)?.into_iter();

    let mut header = rows
        .next()
        .ok_or_else(|| PolarError::import(1, "table is empty"))?;
    header.trim_trailing(1);
    if header.cells.len() < 2 {
        return Err(PolarError::import(header.line, "header lists no wind speeds"));
    }

    let wind_speeds = header.cells[1..]
        .iter()
        .map(|cell| {
            parse_number(cell, header.line, "wind speed")
                .map(|v| options.wind_speed_unit.to_meters_per_second(v))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if !wind_speeds.windows(2).all(|w| w[0] < w[1]) {
        return Err(PolarError::import(header.line, "wind speeds must be ascending"));
    }

    let columns = header.cells.len();
    let mut angle_data: Vec<Vec<AngleEntry>> = vec![Vec::new(); wind_speeds.len()];

    for mut row in rows {
        row.trim_trailing(columns);
        if row.cells.len() != columns {
            return Err(PolarError::import(
                row.line,
                format!("expected {columns} columns, found {}", row.cells.len()),
            ));
        }

        let angle = options
            .angle_unit
            .to_radians(parse_number(row.cell(0), row.line, "wind angle")?);

        for (column, cell) in row.cells[1..].iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let speed = parse_number(cell, row.line, "boat speed")?;
            if speed < 0.0 {
                return Err(PolarError::import(row.line, format!("negative boat speed {cell}")));
            }
            if speed == 0.0 {
                continue;
            }
            let entries = &mut angle_data[column];
            if entries.iter().any(|e| e.angle == angle) {
                return Err(PolarError::import(
                    row.line,
                    format!("duplicate wind angle {}", row.cell(0)),
                ));
            }
            entries.push(AngleEntry::with_speed(
                angle,
                options.boat_speed_unit.to_meters_per_second(speed),
            ));
        }
    }

    if options.mirror {
        for entries in &mut angle_data {
            let mirrored: Vec<AngleEntry> = entries
                .iter()
                .filter(|e| e.angle > 0.0 && !entries.iter().any(|o| o.angle == -e.angle))
                .filter_map(|e| e.speed.map(|speed| AngleEntry::with_speed(-e.angle, speed)))
                .collect();
            entries.extend(mirrored);
        }
    }

    let wind_data: Vec<WindSpeedBucket> = wind_speeds
        .into_iter()
        .zip(angle_data)
        .map(|(tws, entries)| WindSpeedBucket::new(tws, entries))
        .collect();

    let table = PolarTable::new(id, name, description, wind_data);
    debug!(
        "Built polar {} ({}): {} wind speeds, {} points",
        table.name,
        table.id,
        table.wind_data.len(),
        table.data_points()
    );
    Ok(table)
}
