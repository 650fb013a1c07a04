//! Delimited text codec shared by the plain and Excel-flavoured variants.

use std::io::{Read, Write};

use super::{CodecKind, RowSink, RowSource, decode_windows_1251};
use crate::{Error, Result};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV row source.
///
/// Every row, including the header, is returned as-is; rows may have any
/// number of cells (cell-count checks belong to the row mapper).
pub struct CsvRowSource<R: Read> {
    reader: csv::Reader<R>,
    kind: CodecKind,
    record: csv::ByteRecord,
    line: usize,
    first: bool,
}

impl<R: Read> CsvRowSource<R> {
    /// Creates a new CSV row source.
    pub fn new(reader: R, kind: CodecKind) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(kind.delimiter())
            .from_reader(reader);

        Self {
            reader,
            kind,
            record: csv::ByteRecord::new(),
            line: 0,
            first: true,
        }
    }

    fn decode_cell(&self, index: usize, bytes: &[u8]) -> Result<String> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) if self.kind.decodes_legacy() => Ok(decode_windows_1251(bytes)),
            Err(e) => Err(Error::Structural {
                line: self.line,
                message: format!("cell {} is not valid UTF-8: {e}", index + 1),
            }),
        }
    }
}

impl<R: Read> RowSource for CsvRowSource<R> {
    fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let has_record = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|e| Error::Structural {
                line: e
                    .position()
                    .and_then(|p| usize::try_from(p.line()).ok())
                    .unwrap_or(self.line),
                message: e.to_string(),
            })?;
        if !has_record {
            return Ok(None);
        }

        self.line = self
            .record
            .position()
            .and_then(|p| usize::try_from(p.line()).ok())
            .unwrap_or(self.line + 1);

        let strip_bom = std::mem::take(&mut self.first);
        let mut cells = Vec::with_capacity(self.record.len());
        for (index, field) in self.record.iter().enumerate() {
            let field = if strip_bom && index == 0 {
                field.strip_prefix(BOM).unwrap_or(field)
            } else {
                field
            };
            cells.push(self.decode_cell(index, field)?);
        }

        Ok(Some(cells))
    }

    fn line(&self) -> usize {
        self.line
    }
}

/// CSV row sink.
pub struct CsvRowSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvRowSink<W> {
    /// Creates a new CSV row sink, writing the byte order mark if the codec
    /// uses one.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte order mark cannot be written.
    pub fn new(mut writer: W, kind: CodecKind) -> Result<Self> {
        if kind.uses_bom() {
            writer
                .write_all(BOM)
                .map_err(|e| Error::operation("write_bom", e))?;
        }

        let terminator = match kind {
            CodecKind::Csv => csv::Terminator::Any(b'\n'),
            CodecKind::ExcelCsv => csv::Terminator::CRLF,
        };
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(kind.delimiter())
            .terminator(terminator)
            .from_writer(writer);

        Ok(Self { writer })
    }

    fn write_cells(&mut self, operation: &str, cells: &[String]) -> Result<()> {
        self.writer
            .write_record(cells)
            .map_err(|e| Error::operation(operation, e))
    }
}

impl<W: Write> RowSink for CsvRowSink<W> {
    fn write_header(&mut self, titles: &[String]) -> Result<()> {
        self.write_cells("write_csv_header", titles)
    }

    fn write_row(&mut self, cells: &[String]) -> Result<()> {
        self.write_cells("write_csv_row", cells)
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))
    }
}
