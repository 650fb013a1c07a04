//! Row mapping for imports.
//!
//! Turns a decoded row into native attributes, property values and the
//! left-over ("unchecked") columns that have no configured destination.

use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashMap};

use crate::models::{FieldValue, ResolvedFields};
use crate::{Error, Result};

/// Column carrying the identifier of an existing record.
pub const INTERNAL_ID: &str = "internal_id";

/// Columns never turned into auto-created properties.
pub const DEPRECATED_FIELDS: [&str; 3] = [INTERNAL_ID, "categories", "images"];

/// Returns whether a column title is on the deprecated list (any casing).
#[must_use]
pub fn is_deprecated(title: &str) -> bool {
    DEPRECATED_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(title.trim()))
}

/// Multi-value delimiter of a job.
#[derive(Debug, Clone)]
pub enum Delimiter {
    /// A literal separator such as `|`.
    Literal(String),
    /// A `/pattern/flags` expression. Values containing the raw text are
    /// still split on it literally.
    Pattern {
        /// The configured text.
        raw: String,
        /// The compiled expression.
        regex: Regex,
    },
}

impl Delimiter {
    /// Parses a configured delimiter.
    ///
    /// Text starting with `/` is a pattern in `/expr/flags` form; supported
    /// flags are `i`, `m`, `s`, `x` and `u` (always on).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a pattern is malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(body) = raw.strip_prefix('/') else {
            return Ok(Self::Literal(raw.to_string()));
        };
        let Some(end) = body.rfind('/') else {
            return Err(Error::Configuration(format!(
                "delimiter pattern '{raw}' has no closing '/'"
            )));
        };

        let (expr, flags) = (&body[..end], &body[end + 1..]);
        let mut builder = RegexBuilder::new(expr);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'u' => builder.unicode(true),
                other => {
                    return Err(Error::Configuration(format!(
                        "unsupported flag '{other}' in delimiter pattern '{raw}'"
                    )));
                },
            };
        }
        let regex = builder
            .build()
            .map_err(|e| Error::Configuration(format!("invalid delimiter pattern '{raw}': {e}")))?;

        Ok(Self::Pattern {
            raw: raw.to_string(),
            regex,
        })
    }

    /// Returns the configured text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(raw) | Self::Pattern { raw, .. } => raw,
        }
    }

    /// Splits a cell into trimmed, non-empty elements.
    #[must_use]
    pub fn split(&self, value: &str) -> Vec<String> {
        let raw = self.as_str();
        let parts: Vec<&str> = if !raw.is_empty() && value.contains(raw) {
            value.split(raw).collect()
        } else if let Self::Pattern { regex, .. } = self {
            regex.split(value).collect()
        } else {
            vec![value]
        };

        parts
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Column titles of a file, built once from its header row.
#[derive(Debug, Clone)]
pub struct TitleMap {
    titles: Vec<String>,
    positions: HashMap<String, usize>,
}

impl TitleMap {
    /// Builds the map from the header row.
    ///
    /// When a title repeats, the last column wins.
    #[must_use]
    pub fn from_header(header: Vec<String>) -> Self {
        let positions = header
            .iter()
            .enumerate()
            .map(|(i, title)| (title.clone(), i))
            .collect();
        Self {
            titles: header,
            positions,
        }
    }

    /// Returns the column index of a title.
    #[must_use]
    pub fn position(&self, title: &str) -> Option<usize> {
        self.positions.get(title).copied()
    }

    /// Returns the titles in column order.
    #[must_use]
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Returns whether the header is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// One decoded row split by destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedRow {
    /// Value of the `internal_id` column (0 when absent or not a number).
    pub object_id: i64,
    /// Native attributes present in the file.
    pub object_attributes: BTreeMap<String, String>,
    /// Property values keyed by property key.
    pub property_values: BTreeMap<String, FieldValue>,
    /// Columns with no configured destination, keyed by title.
    pub unchecked: BTreeMap<String, String>,
    /// Every cell keyed by title, for record hooks.
    pub row: BTreeMap<String, String>,
    /// Line the row was read from.
    pub line: usize,
}

/// Maps rows of one file.
#[derive(Debug, Clone)]
pub struct RowMapper {
    titles: TitleMap,
    object_fields: Vec<String>,
    property_fields: Vec<String>,
    delimiter: Option<Delimiter>,
}

impl RowMapper {
    /// Creates a mapper for a file with the given header.
    #[must_use]
    pub fn new(header: Vec<String>, fields: &ResolvedFields, delimiter: Option<Delimiter>) -> Self {
        Self {
            titles: TitleMap::from_header(header),
            object_fields: fields.object_fields.clone(),
            property_fields: fields.property_fields.clone(),
            delimiter,
        }
    }

    /// Returns the header of the file.
    #[must_use]
    pub const fn titles(&self) -> &TitleMap {
        &self.titles
    }

    /// Maps one data row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if the row's cell count differs from the
    /// header's.
    pub fn map(&self, cells: Vec<String>, line: usize) -> Result<MappedRow> {
        if cells.len() != self.titles.len() {
            return Err(Error::Structural {
                line,
                message: format!(
                    "expected {} cells, found {}",
                    self.titles.len(),
                    cells.len()
                ),
            });
        }

        let mut remaining: Vec<bool> = vec![true; cells.len()];
        let mut object_attributes = BTreeMap::new();
        for field in &self.object_fields {
            if let Some(i) = self.titles.position(field) {
                object_attributes.insert(field.clone(), cells[i].clone());
                remaining[i] = false;
            }
        }

        let mut unchecked: BTreeMap<String, String> = self
            .titles
            .titles()
            .iter()
            .zip(&cells)
            .zip(&remaining)
            .filter(|((title, _), keep)| **keep && !is_deprecated(title))
            .map(|((title, cell), _)| (title.clone(), cell.clone()))
            .collect();

        let mut property_values = BTreeMap::new();
        for key in &self.property_fields {
            unchecked.remove(key);
            let Some(i) = self.titles.position(key) else {
                continue;
            };
            let value = match &self.delimiter {
                Some(delimiter) => FieldValue::List(delimiter.split(&cells[i])),
                None => FieldValue::Scalar(cells[i].clone()),
            };
            property_values.insert(key.clone(), value);
        }

        let object_id = self
            .titles
            .position(INTERNAL_ID)
            .and_then(|i| cells[i].trim().parse::<i64>().ok())
            .unwrap_or(0);

        let row = self
            .titles
            .titles()
            .iter()
            .cloned()
            .zip(cells)
            .collect();

        Ok(MappedRow {
            object_id,
            object_attributes,
            property_values,
            unchecked,
            row,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    fn fields(object: &[&str], property: &[&str]) -> ResolvedFields {
        ResolvedFields {
            object_fields: strings(object),
            property_fields: strings(property),
            additional_fields: Vec::new(),
        }
    }

    #[test]
    fn test_scenario_row() {
        let mapper = RowMapper::new(
            strings(&["internal_id", "name", "price", "color"]),
            &fields(&["name", "price"], &["color"]),
            Some(Delimiter::parse("|").unwrap()),
        );
        let mapped = mapper
            .map(strings(&["0", "Widget", "9.99", "red|blue"]), 2)
            .unwrap();

        assert_eq!(mapped.object_id, 0);
        assert_eq!(mapped.object_attributes.get("name").unwrap(), "Widget");
        assert_eq!(mapped.object_attributes.get("price").unwrap(), "9.99");
        assert_eq!(
            mapped.property_values.get("color"),
            Some(&FieldValue::List(strings(&["red", "blue"])))
        );
        assert!(mapped.unchecked.is_empty());
        assert_eq!(mapped.row.len(), 4);
    }

    #[test]
    fn test_unmapped_columns_are_unchecked() {
        let mapper = RowMapper::new(
            strings(&["name", "Vendor Code", "Images", "color"]),
            &fields(&["name"], &["color"]),
            None,
        );
        let mapped = mapper
            .map(strings(&["Widget", "V-1", "a.png", "red"]), 2)
            .unwrap();

        assert_eq!(mapped.unchecked.len(), 1);
        assert_eq!(mapped.unchecked.get("Vendor Code").unwrap(), "V-1");
        assert_eq!(
            mapped.property_values.get("color"),
            Some(&FieldValue::Scalar("red".to_string()))
        );
    }

    #[test]
    fn test_empty_values_are_preserved() {
        let mapper = RowMapper::new(strings(&["name", "color"]), &fields(&["name"], &["color"]), None);
        let mapped = mapper.map(strings(&["", ""]), 2).unwrap();
        assert_eq!(mapped.object_attributes.get("name").unwrap(), "");
        assert_eq!(
            mapped.property_values.get("color"),
            Some(&FieldValue::Scalar(String::new()))
        );
    }

    #[test]
    fn test_internal_id() {
        let mapper = RowMapper::new(strings(&["internal_id", "name"]), &fields(&["name"], &[]), None);
        assert_eq!(mapper.map(strings(&[" 42 ", "x"]), 2).unwrap().object_id, 42);
        assert_eq!(mapper.map(strings(&["abc", "x"]), 3).unwrap().object_id, 0);

        let without = RowMapper::new(strings(&["name"]), &fields(&["name"], &[]), None);
        assert_eq!(without.map(strings(&["x"]), 2).unwrap().object_id, 0);
    }

    #[test]
    fn test_cell_count_mismatch_is_structural() {
        let mapper = RowMapper::new(strings(&["a", "b", "c"]), &fields(&["a"], &[]), None);
        assert!(matches!(
            mapper.map(strings(&["1", "2"]), 7),
            Err(Error::Structural { line: 7, .. })
        ));
        assert!(mapper.map(strings(&["1", "2", "3", "4"]), 8).is_err());
    }

    #[test_case("|", "red|blue", &["red", "blue"]; "literal")]
    #[test_case("|", " red | | blue ", &["red", "blue"]; "trims and drops empty")]
    #[test_case("|", "red", &["red"]; "single element")]
    #[test_case("|", "", &[]; "empty cell")]
    #[test_case("/[,;]\\s*/", "red, blue;green", &["red", "blue", "green"]; "pattern")]
    #[test_case("/AND/i", "red and blue", &["red", "blue"]; "pattern with flag")]
    #[test_case(",", "0,1", &["0", "1"]; "zero is kept")]
    fn test_delimiter_split(delimiter: &str, value: &str, expected: &[&str]) {
        let delimiter = Delimiter::parse(delimiter).unwrap();
        assert_eq!(delimiter.split(value), strings(expected));
    }

    #[test_case("/[a-/"; "bad expression")]
    #[test_case("/abc"; "unterminated")]
    #[test_case("/abc/q"; "unknown flag")]
    fn test_invalid_delimiter_pattern(delimiter: &str) {
        assert!(matches!(
            Delimiter::parse(delimiter),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_deprecated_titles_any_case() {
        assert!(is_deprecated("internal_id"));
        assert!(is_deprecated("CATEGORIES"));
        assert!(is_deprecated(" Images "));
        assert!(!is_deprecated("vendor"));
    }

    fn deprecated_title() -> impl Strategy<Value = String> {
        (prop::sample::select(DEPRECATED_FIELDS.to_vec()), any::<u64>()).prop_map(
            |(field, mask)| {
                field
                    .chars()
                    .enumerate()
                    .map(|(i, c)| {
                        if mask >> (i % 64) & 1 == 1 {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        }
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_deprecated_columns_never_unchecked(
            deprecated in deprecated_title(),
            extra in "[a-z]{3,8}",
            position in 0usize..3,
        ) {
            let mut header = strings(&["name", "color"]);
            header.insert(position, deprecated.clone());
            header.push(format!("x_{extra}"));
            let cells = vec!["v".to_string(); header.len()];

            let mapper = RowMapper::new(header, &fields(&["name"], &["color"]), None);
            let mapped = mapper.map(cells, 2).unwrap();

            prop_assert!(!mapped.unchecked.contains_key(&deprecated));
            prop_assert_eq!(mapped.unchecked.len(), 1);
        }
    }
}
