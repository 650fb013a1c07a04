//! Record codecs for import/export files.
//!
//! A file is a header row of column titles followed by one row per record.
//! Codecs are purely syntactic: they turn bytes into rows of string cells
//! and back, without looking at what the cells mean.

pub mod csv;
mod legacy;

use crate::{Error, Result};
use std::io::{Read, Write};
use std::str::FromStr;

pub use legacy::decode_windows_1251;

/// Supported codec variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Comma separated, LF terminated, strict UTF-8.
    Csv,
    /// Semicolon separated, CRLF terminated, BOM prefixed, legacy cells
    /// decoded as Windows-1251.
    ExcelCsv,
}

impl CodecKind {
    /// Returns the configuration name of the codec.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::ExcelCsv => "excelCsv",
        }
    }

    /// Returns the field delimiter.
    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::ExcelCsv => b';',
        }
    }

    /// Returns whether files start with a UTF-8 byte order mark.
    #[must_use]
    pub const fn uses_bom(&self) -> bool {
        matches!(self, Self::ExcelCsv)
    }

    /// Returns whether non-UTF-8 cells are decoded as Windows-1251.
    #[must_use]
    pub const fn decodes_legacy(&self) -> bool {
        matches!(self, Self::ExcelCsv)
    }
}

impl FromStr for CodecKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "excelcsv" | "excel-csv" | "excel_csv" => Ok(Self::ExcelCsv),
            _ => Err(Error::Configuration(format!("unsupported codec type: {s}"))),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads rows of cells one at a time.
pub trait RowSource {
    /// Reads the next row.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if the file cannot be read or decoded.
    fn next_row(&mut self) -> Result<Option<Vec<String>>>;

    /// Returns the 1-indexed line of the last row read (0 before the first).
    fn line(&self) -> usize;
}

/// Appends rows to an output stream.
///
/// Rows are written as they arrive; nothing written earlier is retained.
pub trait RowSink {
    /// Writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_header(&mut self, titles: &[String]) -> Result<()>;

    /// Writes a data row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the cell count differs from the
    /// header.
    fn write_row(&mut self, cells: &[String]) -> Result<()>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Creates a row source for the given codec.
#[must_use]
pub fn create_row_source<R: Read + 'static>(reader: R, kind: CodecKind) -> Box<dyn RowSource> {
    Box::new(csv::CsvRowSource::new(reader, kind))
}

/// Creates a row sink for the given codec.
///
/// # Errors
///
/// Returns an error if the byte order mark cannot be written.
pub fn create_row_sink<W: Write + 'static>(writer: W, kind: CodecKind) -> Result<Box<dyn RowSink>> {
    Ok(Box::new(csv::CsvRowSink::new(writer, kind)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_str() {
        assert_eq!("csv".parse::<CodecKind>().unwrap(), CodecKind::Csv);
        assert_eq!("excelCsv".parse::<CodecKind>().unwrap(), CodecKind::ExcelCsv);
        assert_eq!("EXCELCSV".parse::<CodecKind>().unwrap(), CodecKind::ExcelCsv);
        assert!(matches!(
            "xlsx".parse::<CodecKind>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_codec_conventions() {
        assert_eq!(CodecKind::Csv.delimiter(), b',');
        assert_eq!(CodecKind::ExcelCsv.delimiter(), b';');
        assert!(CodecKind::ExcelCsv.uses_bom());
        assert!(!CodecKind::Csv.decodes_legacy());
        assert_eq!(CodecKind::ExcelCsv.to_string(), "excelCsv");
    }
}
