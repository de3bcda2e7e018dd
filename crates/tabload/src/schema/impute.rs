//! Type imputation: one pass over the row stream, assigning each untyped
//! column the narrowest type that clears the acceptance threshold.

use tracing::debug;

use crate::error::Result;
use crate::reader::RowReader;
use crate::schema::{FieldType, SchemaBuilder};
use crate::value::DateParser;

/// Parse-success tallies for one column.
#[derive(Debug, Clone, Copy, Default)]
struct TypeCounts {
    non_empty: u64,
    date: u64,
    int: u64,
    float: u64,
}

impl TypeCounts {
    fn observe(&mut self, cell: &str, dates: &DateParser) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return;
        }
        self.non_empty += 1;
        if dates.parse(trimmed).is_some() {
            self.date += 1;
        }
        if trimmed.parse::<i64>().is_ok() {
            self.int += 1;
        }
        if trimmed.parse::<f64>().is_ok() {
            self.float += 1;
        }
    }

    /// First candidate meeting the threshold wins, checked in fixed priority
    /// order Date, Int64, Float64; String is the fallback. The comparison is
    /// `>=`: a column at exactly the threshold qualifies.
    fn resolve(&self, threshold: f64) -> FieldType {
        if self.non_empty == 0 {
            return FieldType::String;
        }
        let n = self.non_empty as f64;
        if self.date as f64 / n >= threshold {
            FieldType::Date
        } else if self.int as f64 / n >= threshold {
            FieldType::Int64
        } else if self.float as f64 / n >= threshold {
            FieldType::Float64
        } else {
            FieldType::String
        }
    }
}

impl SchemaBuilder {
    /// Consume the entire remaining row stream once and assign a type to
    /// every still-untyped column.
    ///
    /// The reader is spent afterward; the coercion pass must re-resolve the
    /// source for a fresh one.
    pub fn impute(
        &mut self,
        reader: &mut dyn RowReader,
        threshold: f64,
        dates: &DateParser,
    ) -> Result<()> {
        let width = self.width();
        let mut counts = vec![TypeCounts::default(); width];
        let mut rows: u64 = 0;

        while let Some(row) = reader.next_row()? {
            rows += 1;
            for (tally, cell) in counts.iter_mut().zip(&row) {
                tally.observe(cell, dates);
            }
        }
        debug!("imputation sampled {} rows across {} columns", rows, width);

        for (slot, tally) in self.types_mut().iter_mut().zip(&counts) {
            if slot.is_none() {
                *slot = Some(tally.resolve(threshold));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::reader::RawRow;
    use crate::schema::NamingOptions;

    /// In-memory reader for feeding fixed rows to the imputer.
    struct RowsReader {
        rows: std::vec::IntoIter<RawRow>,
        width: Option<usize>,
    }

    impl RowsReader {
        fn new(rows: Vec<Vec<&str>>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(str::to_string).collect())
                    .collect::<Vec<_>>()
                    .into_iter(),
                width: None,
            }
        }
    }

    impl RowReader for RowsReader {
        fn next_row(&mut self) -> crate::error::Result<Option<RawRow>> {
            let next = self.rows.next();
            if let Some(row) = &next {
                self.width.get_or_insert(row.len());
            }
            Ok(next)
        }

        fn read_header(&mut self) -> crate::error::Result<Vec<String>> {
            self.next_row()?
                .ok_or_else(|| LoadError::SourceAccess("empty".to_string()))
        }

        fn width(&self) -> Option<usize> {
            self.width
        }
    }

    fn imputed(rows: Vec<Vec<&str>>, threshold: f64) -> Vec<FieldType> {
        let width = rows[0].len();
        let names: Vec<String> = (0..width).map(|i| format!("c{}", i)).collect();
        let mut builder = SchemaBuilder::from_header(names, &NamingOptions::default());
        let mut reader = RowsReader::new(rows);
        builder
            .impute(&mut reader, threshold, &DateParser::new(None))
            .unwrap();
        builder
            .build()
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.ftype)
            .collect()
    }

    #[test]
    fn test_clean_columns() {
        let types = imputed(
            vec![
                vec!["1", "1.5", "20230101", "abc"],
                vec!["2", "2.5", "20230102", "def"],
            ],
            0.95,
        );
        assert_eq!(
            types,
            vec![
                FieldType::Int64,
                FieldType::Float64,
                FieldType::Date,
                FieldType::String
            ]
        );
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // 19 of 20 parse as Int64: exactly 95%.
        let mut rows: Vec<Vec<&str>> = (0..19).map(|_| vec!["7"]).collect();
        rows.push(vec!["oops"]);
        assert_eq!(imputed(rows, 0.95), vec![FieldType::Int64]);

        // 949 of 1000: 94.9% falls short.
        let mut rows: Vec<Vec<&str>> = (0..949).map(|_| vec!["7"]).collect();
        rows.extend((0..51).map(|_| vec!["oops"]));
        assert_eq!(imputed(rows, 0.95), vec![FieldType::String]);
    }

    #[test]
    fn test_date_takes_precedence_over_int() {
        // Every value parses as both Date and Int64; Date is checked first.
        let rows = vec![vec!["20230101"], vec!["20230102"], vec!["20231231"]];
        assert_eq!(imputed(rows, 0.95), vec![FieldType::Date]);
    }

    #[test]
    fn test_empty_cells_are_excluded_from_the_denominator() {
        // 1 of 1 non-empty values parses as Int64; empties don't dilute it.
        let rows = vec![vec!["42"], vec![""], vec!["  "]];
        assert_eq!(imputed(rows, 0.95), vec![FieldType::Int64]);
    }

    #[test]
    fn test_all_empty_column_falls_back_to_string() {
        let rows = vec![vec![""], vec![""]];
        assert_eq!(imputed(rows, 0.95), vec![FieldType::String]);
    }

    #[test]
    fn test_supplied_types_are_not_overwritten() {
        let mut builder = SchemaBuilder::from_supplied(vec!["a".to_string()])
            .with_supplied_types(&["s".to_string()])
            .unwrap();
        let mut reader = RowsReader::new(vec![vec!["1"], vec!["2"]]);
        builder
            .impute(&mut reader, 0.95, &DateParser::new(None))
            .unwrap();
        let schema = builder.build().unwrap();
        assert_eq!(schema.fields()[0].ftype, FieldType::String);
    }
}
