//! Delimited-text reader: tab-delimited and CSV sources.

use std::io::{self, Read};

use crate::error::{LoadError, Result};
use crate::reader::{RawRow, RowReader};

/// Strips carriage-return control bytes from the underlying stream before
/// the parser sees them. Line breaks stay `\n`.
struct StripCr<R> {
    inner: R,
}

impl<R: Read> Read for StripCr<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..n {
                if buf[i] != b'\r' {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            // A chunk of pure CR bytes yields nothing; read again rather
            // than reporting a zero-length (EOF-looking) read.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Reader over a byte stream split on a single-byte separator, honoring one
/// quote byte and skipping a configurable number of leading rows.
pub struct DelimitedReader {
    records: csv::StringRecordsIntoIter<StripCr<Box<dyn Read + Send>>>,
    width: Option<usize>,
    /// Rows handed out so far, for error positions when the parser cannot
    /// supply a line number.
    rows_read: u64,
}

impl DelimitedReader {
    /// Construct over any byte source. `skip` leading rows are consumed and
    /// discarded before the first yielded row.
    pub fn new<R>(input: R, separator: u8, quote: u8, skip: usize) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let boxed: Box<dyn Read + Send> = Box::new(input);
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(separator)
            .quote(quote)
            .flexible(true)
            .from_reader(StripCr { inner: boxed });

        let mut records = reader.into_records();
        for _ in 0..skip {
            match records.next() {
                Some(record) => {
                    record?;
                }
                None => break,
            }
        }

        Ok(Self {
            records,
            width: None,
            rows_read: 0,
        })
    }

    fn next_record(&mut self) -> Result<Option<csv::StringRecord>> {
        match self.records.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }
}

impl RowReader for DelimitedReader {
    fn next_row(&mut self) -> Result<Option<RawRow>> {
        let record = match self.next_record()? {
            Some(r) => r,
            None => return Ok(None),
        };
        self.rows_read += 1;

        let got = record.len();
        match self.width {
            None => self.width = Some(got),
            Some(expected) if expected != got => {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.rows_read);
                return Err(LoadError::MalformedRow {
                    line,
                    expected,
                    got,
                });
            }
            Some(_) => {}
        }

        Ok(Some(record.iter().map(str::to_string).collect()))
    }

    fn read_header(&mut self) -> Result<Vec<String>> {
        let record = self.next_record()?.ok_or_else(|| {
            LoadError::SourceAccess("no header row: source is empty".to_string())
        })?;
        self.rows_read += 1;
        self.width = Some(record.len());
        Ok(record.iter().map(str::to_string).collect())
    }

    fn width(&self) -> Option<usize> {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn csv_reader(data: &str, skip: usize) -> DelimitedReader {
        DelimitedReader::new(Cursor::new(data.as_bytes().to_vec()), b',', b'"', skip).unwrap()
    }

    #[test]
    fn test_basic_rows_and_width() {
        let mut rdr = csv_reader("a,b,c\n1,2,3\n", 0);
        assert_eq!(rdr.width(), None);
        let row = rdr.next_row().unwrap().unwrap();
        assert_eq!(row, vec!["a", "b", "c"]);
        assert_eq!(rdr.width(), Some(3));
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["1", "2", "3"]);
        assert!(rdr.next_row().unwrap().is_none());
    }

    #[test]
    fn test_tab_separator() {
        let mut rdr =
            DelimitedReader::new(Cursor::new(b"x\ty\n1\t2\n".to_vec()), b'\t', b'"', 0).unwrap();
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_quoted_cells_suppress_separator_and_newline() {
        let mut rdr = csv_reader("\"a,b\",\"c\nd\"\n1,2\n", 0);
        let row = rdr.next_row().unwrap().unwrap();
        assert_eq!(row, vec!["a,b", "c\nd"]);
    }

    #[test]
    fn test_carriage_returns_are_discarded() {
        let mut rdr = csv_reader("a\r,b\r\n1,2\r\n", 0);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["a", "b"]);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_skip_leading_rows() {
        let mut rdr = csv_reader("junk\nmore junk\nh1,h2\n1,2\n", 2);
        assert_eq!(rdr.read_header().unwrap(), vec!["h1", "h2"]);
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_malformed_row_width() {
        let mut rdr = csv_reader("a,b,c\n1,2\n9,8,7\n", 0);
        rdr.next_row().unwrap();
        let err = rdr.next_row().unwrap_err();
        match err {
            LoadError::MalformedRow {
                expected, got, ..
            } => {
                assert_eq!(expected, 3);
                assert_eq!(got, 2);
            }
            other => panic!("expected MalformedRow, got {:?}", other),
        }
        // The reader stays usable past the bad row.
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["9", "8", "7"]);
    }

    #[test]
    fn test_header_on_empty_source() {
        let mut rdr = csv_reader("", 0);
        assert!(matches!(
            rdr.read_header().unwrap_err(),
            LoadError::SourceAccess(_)
        ));
    }

    #[test]
    fn test_alternate_quote_character() {
        let mut rdr =
            DelimitedReader::new(Cursor::new(b"'a,b',c\n".to_vec()), b',', b'\'', 0).unwrap();
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["a,b", "c"]);
    }
}
