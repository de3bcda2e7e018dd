//! Range-bounded spreadsheet reader.
//!
//! Operates on an already-parsed worksheet range; workbook opening and sheet
//! selection happen in the resolver. Row/column indices are 0-based and
//! sheet-absolute; a range end of 0 means "to the sheet's last populated
//! row/column", and a non-zero end is inclusive.

use calamine::{Data, Range};
use chrono::NaiveTime;

use crate::config::RangeBound;
use crate::error::{LoadError, Result};
use crate::reader::{RawRow, RowReader};

/// Reader over the rectangular sub-range of one worksheet.
pub struct SheetReader {
    range: Range<Data>,
    next_row: u32,
    row_hi: u32,
    col_lo: u32,
    col_hi: u32,
    width: usize,
    exhausted: bool,
}

impl SheetReader {
    /// `skip` is applied within the row range, consuming rows from its start.
    pub fn new(range: Range<Data>, rows: &RangeBound, cols: &RangeBound, skip: usize) -> Self {
        let (sheet_row_end, sheet_col_end) = match range.end() {
            Some(end) => end,
            None => {
                // Empty sheet: nothing to yield.
                return Self {
                    range,
                    next_row: 1,
                    row_hi: 0,
                    col_lo: 0,
                    col_hi: 0,
                    width: 0,
                    exhausted: true,
                };
            }
        };

        let row_hi = if rows.end == 0 {
            sheet_row_end
        } else {
            rows.end as u32
        };
        let col_lo = cols.start as u32;
        let col_hi = if cols.end == 0 {
            sheet_col_end
        } else {
            cols.end as u32
        };
        let exhausted = col_hi < col_lo;
        let width = if exhausted {
            0
        } else {
            (col_hi - col_lo + 1) as usize
        };

        Self {
            range,
            next_row: rows.start as u32 + skip as u32,
            row_hi,
            col_lo,
            col_hi,
            width,
            exhausted,
        }
    }
}

impl RowReader for SheetReader {
    fn next_row(&mut self) -> Result<Option<RawRow>> {
        if self.exhausted || self.next_row > self.row_hi {
            return Ok(None);
        }
        let row = self.next_row;
        self.next_row += 1;

        let cells = (self.col_lo..=self.col_hi)
            .map(|col| {
                self.range
                    .get_value((row, col))
                    .map(cell_to_string)
                    .unwrap_or_default()
            })
            .collect();
        Ok(Some(cells))
    }

    fn read_header(&mut self) -> Result<Vec<String>> {
        self.next_row()?.ok_or_else(|| {
            LoadError::SourceAccess("no header row: sheet range is empty".to_string())
        })
    }

    fn width(&self) -> Option<usize> {
        Some(self.width)
    }
}

/// Render one cell the way it would appear in the sheet.
fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Integral floats render without the fractional part, matching
            // how spreadsheets display whole numbers.
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time() == NaiveTime::MIN => ndt.date().format("%Y-%m-%d").to_string(),
            Some(ndt) => ndt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(start: usize, end: usize) -> RangeBound {
        RangeBound { start, end }
    }

    fn sample_range() -> Range<Data> {
        // Sheet rows 0..=5, cols 0..=4.
        let mut range = Range::new((0, 0), (5, 4));
        for row in 0..=5u32 {
            for col in 0..=4u32 {
                range.set_value((row, col), Data::String(format!("r{}c{}", row, col)));
            }
        }
        range
    }

    #[test]
    fn test_range_extraction_row4_col2_onward() {
        let mut rdr = SheetReader::new(sample_range(), &bound(4, 0), &bound(2, 0), 0);
        let row = rdr.next_row().unwrap().unwrap();
        // First yielded row starts at column index 2 of sheet row 4.
        assert_eq!(row, vec!["r4c2", "r4c3", "r4c4"]);
        assert_eq!(rdr.width(), Some(3));
        let row = rdr.next_row().unwrap().unwrap();
        assert_eq!(row[0], "r5c2");
        assert!(rdr.next_row().unwrap().is_none());
    }

    #[test]
    fn test_non_zero_range_end_is_inclusive() {
        let mut rdr = SheetReader::new(sample_range(), &bound(1, 2), &bound(0, 1), 0);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["r1c0", "r1c1"]);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["r2c0", "r2c1"]);
        assert!(rdr.next_row().unwrap().is_none());
    }

    #[test]
    fn test_skip_applies_within_range() {
        let mut rdr = SheetReader::new(sample_range(), &bound(2, 0), &bound(0, 0), 2);
        let row = rdr.next_row().unwrap().unwrap();
        assert_eq!(row[0], "r4c0");
    }

    #[test]
    fn test_header_then_rows() {
        let mut rdr = SheetReader::new(sample_range(), &bound(0, 0), &bound(0, 1), 0);
        assert_eq!(rdr.read_header().unwrap(), vec!["r0c0", "r0c1"]);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["r1c0", "r1c1"]);
    }

    #[test]
    fn test_empty_sheet() {
        let mut rdr = SheetReader::new(
            Range::new((0, 0), (0, 0)),
            &bound(0, 0),
            &bound(0, 0),
            0,
        );
        // A 1x1 range of Empty still yields its one (empty) cell row.
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec![""]);
        assert!(rdr.next_row().unwrap().is_none());
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(3.25)), "3.25");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(
            cell_to_string(&Data::String("text".to_string())),
            "text"
        );
    }
}
