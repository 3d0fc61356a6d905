//! JSON form of a [`GlobalConfig`].
//!
//! Closures cannot be written down in a file, so the file describes rules
//! with a small vocabulary of matchers and transforms that compile to the
//! same closures a hand-built config would use:
//!
//! ```json
//! {
//!   "aliases": [{ "pattern": "2024-*", "config": "monthly" }],
//!   "sheets": [{
//!     "name": "monthly",
//!     "headerRow": 3,
//!     "asserts": [{ "name": "title", "column": "A", "row": 1, "equals": "Sales" }],
//!     "headFields": [{ "name": "Seller", "column": "A", "row": 2, "pattern": "Seller: (.*)" }],
//!     "headers": [
//!       { "name": "Group", "column": "A", "transform": "fillDown" },
//!       { "name": "Amount", "header": { "startsWith": "Amount" }, "transform": "money" },
//!       { "name": "Seller", "headField": "Seller" }
//!     ],
//!     "rowsFilter": { "requireNonEmpty": [1], "exclude": { "0": ["Total"] } }
//!   }]
//! }
//! ```
use crate::config::{
    ActualHeader, AssertRule, GlobalConfig, HeadFieldRule, HeaderNameTest, HeaderRule, SheetConfig, ValueFn,
    VirtualHeader,
};
use crate::error::ResultMessage;
use crate::error::SheetRowsError;
use crate::spreadsheet::ColumnKey;
use crate::tools::{fill_head_field_value, fill_last_value, fill_not_empty_col_num, fill_not_empty_row_num, money};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid sheet name pattern '{pattern}': {source}")]
    SheetPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid column key '{key}' in rule \"{rule}\"")]
    InvalidColumnKey { rule: String, key: String },

    #[error("Matcher of \"{0}\" has no condition")]
    EmptyMatcher(String),

    #[error("Header #{0} has no name, column or header matcher")]
    UnboundHeader(usize),

    #[error("Virtual header #{0} needs a name")]
    UnnamedVirtualHeader(usize),

    #[error("Virtual header \"{0}\" cannot have a transform")]
    VirtualTransform(String),
}

/// Root of a configuration file.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub sheets: Vec<SheetDef>,
    /// Sheet name globs mapped to config names, first match wins
    #[serde(default)]
    pub aliases: Vec<AliasDef>,
}

#[derive(Deserialize, Debug)]
pub struct AliasDef {
    pub pattern: String,
    pub config: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SheetDef {
    pub name: Option<String>,
    pub sheet_index: Option<usize>,
    pub header_row: Option<usize>,
    #[serde(default)]
    pub asserts: Vec<AssertDef>,
    #[serde(default)]
    pub head_fields: Vec<HeadFieldDef>,
    pub headers: Option<Vec<HeaderDef>>,
    pub rows_filter: Option<RowsFilterDef>,
}

/// Column number (1-based) or letters.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ColumnDef {
    Index(usize),
    Letter(String),
}

/// Text conditions; every given condition must hold.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MatcherDef {
    pub equals: Option<String>,
    pub starts_with: Option<String>,
    pub matches: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AssertDef {
    pub name: String,
    pub column: ColumnDef,
    pub row: usize,
    #[serde(flatten)]
    pub matcher: MatcherDef,
}

#[derive(Deserialize, Debug)]
pub struct HeadFieldDef {
    pub name: String,
    pub column: ColumnDef,
    pub row: usize,
    /// Regex applied to the cell text; the first group (or the whole match) is kept
    pub pattern: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeaderDef {
    pub name: Option<String>,
    pub column: Option<ColumnDef>,
    pub header: Option<MatcherDef>,
    pub transform: Option<TransformDef>,
    /// Makes the header virtual, filled from this head field
    pub head_field: Option<String>,
    /// Makes the header virtual, filled from the head field of its own name
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransformDef {
    Text,
    Money,
    FillDown,
    RowNumber,
    ColumnNumber,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RowsFilterDef {
    /// Output slots that must hold a non-empty value
    #[serde(default)]
    pub require_non_empty: Vec<usize>,
    /// Output slots mapped to values that drop the row
    #[serde(default)]
    pub exclude: BTreeMap<usize, Vec<String>>,
}

/// Reads and compiles a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<GlobalConfig, SheetRowsError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let result: Result<GlobalConfig, SheetRowsError> = (|| {
        let json = std::fs::read_to_string(path)?;
        Ok(parse_config(&json)?)
    })();
    result.with_prefix(&display)
}

/// Parses and compiles a configuration document.
pub fn parse_config(json: &str) -> Result<GlobalConfig, ConfigError> {
    let file: ConfigFile = serde_json::from_str(json)?;
    file.compile()
}

impl ConfigFile {
    pub fn compile(self) -> Result<GlobalConfig, ConfigError> {
        let mut config = GlobalConfig::new();
        for sheet in self.sheets {
            config = config.with_sheet(sheet.compile()?);
        }
        if !self.aliases.is_empty() {
            let aliases = self
                .aliases
                .into_iter()
                .map(|alias| {
                    glob::Pattern::new(&alias.pattern)
                        .map(|pattern| (pattern, alias.config))
                        .map_err(|source| ConfigError::SheetPattern {
                            pattern: alias.pattern,
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_selector(move |sheet_name| {
                aliases
                    .iter()
                    .find(|(pattern, _)| pattern.matches(sheet_name))
                    .map(|(_, name)| name.clone())
            });
        }
        Ok(config)
    }
}

impl SheetDef {
    fn compile(self) -> Result<SheetConfig, ConfigError> {
        let mut sheet = SheetConfig {
            name: self.name,
            sheet_index: self.sheet_index,
            header_row: self.header_row.unwrap_or(1),
            ..SheetConfig::EMPTY
        };

        for assert in self.asserts {
            let column_key = assert.column.compile(&assert.name)?;
            let test = assert.matcher.compile(&assert.name)?;
            sheet = sheet.with_assert(AssertRule::new(assert.name, column_key, assert.row, move |cell| {
                test(&cell.text())
            }));
        }

        for field in self.head_fields {
            let column_key = field.column.compile(&field.name)?;
            let mut rule = HeadFieldRule::new(&field.name, column_key, field.row);
            if let Some(pattern) = field.pattern {
                let regex = compile_regex(&pattern)?;
                rule = rule.with_value(move |cell| {
                    let text = cell.text();
                    let captures = regex.captures(&text)?;
                    captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|found| found.as_str().to_owned())
                });
            }
            sheet = sheet.with_head_field(rule);
        }

        if let Some(headers) = self.headers {
            let rules = headers
                .into_iter()
                .enumerate()
                .map(|(slot, header)| header.compile(slot))
                .collect::<Result<Vec<_>, _>>()?;
            sheet.headers = Some(rules);
        }

        if let Some(filter) = self.rows_filter {
            sheet = sheet.with_rows_filter(move |values| filter.accepts(values));
        }
        Ok(sheet)
    }
}

impl ColumnDef {
    fn compile(&self, rule: &str) -> Result<ColumnKey, ConfigError> {
        let key = match self {
            ColumnDef::Index(index) => ColumnKey::Index(*index),
            ColumnDef::Letter(letters) => ColumnKey::Letter(letters.clone()),
        };
        match key.index() {
            Some(_) => Ok(key),
            None => Err(ConfigError::InvalidColumnKey {
                rule: rule.to_owned(),
                key: key.to_string(),
            }),
        }
    }
}

impl MatcherDef {
    fn compile(&self, rule: &str) -> Result<HeaderNameTest, ConfigError> {
        if self.equals.is_none() && self.starts_with.is_none() && self.matches.is_none() {
            return Err(ConfigError::EmptyMatcher(rule.to_owned()));
        }
        let regex = self.matches.as_deref().map(compile_regex).transpose()?;
        let equals = self.equals.clone();
        let starts_with = self.starts_with.clone();
        Ok(Arc::new(move |text: &str| {
            equals.as_deref().map_or(true, |expected| text == expected)
                && starts_with.as_deref().map_or(true, |prefix| text.starts_with(prefix))
                && regex.as_ref().map_or(true, |regex| regex.is_match(text))
        }))
    }
}

impl HeaderDef {
    fn compile(self, slot: usize) -> Result<HeaderRule, ConfigError> {
        if self.is_virtual || self.head_field.is_some() {
            let name = self.name.ok_or(ConfigError::UnnamedVirtualHeader(slot))?;
            if self.transform.is_some() {
                return Err(ConfigError::VirtualTransform(name));
            }
            let value = fill_head_field_value(self.head_field.as_deref());
            return Ok(VirtualHeader::from_fn(name, value).into());
        }

        let label = self.name.clone().unwrap_or_else(|| format!("#{}", slot + 1));
        if self.name.is_none() && self.column.is_none() && self.header.is_none() {
            return Err(ConfigError::UnboundHeader(slot));
        }
        let mut header = ActualHeader {
            name: self.name,
            ..ActualHeader::default()
        };
        if let Some(column) = &self.column {
            header.column_key = Some(column.compile(&label)?);
        }
        if let Some(matcher) = &self.header {
            header.header_name_test = Some(matcher.compile(&label)?);
        }
        header.value = self.transform.and_then(TransformDef::compile);
        Ok(header.into())
    }
}

impl TransformDef {
    fn compile(self) -> Option<ValueFn> {
        match self {
            TransformDef::Text => None,
            TransformDef::Money => Some(money()),
            TransformDef::FillDown => Some(fill_last_value()),
            TransformDef::RowNumber => Some(fill_not_empty_row_num()),
            TransformDef::ColumnNumber => Some(fill_not_empty_col_num()),
        }
    }
}

impl RowsFilterDef {
    fn accepts(&self, values: &[Option<String>]) -> bool {
        let value = |slot: usize| values.get(slot).and_then(Option::as_deref).unwrap_or("");
        self.require_non_empty.iter().all(|slot| !value(*slot).is_empty())
            && self
                .exclude
                .iter()
                .all(|(slot, excluded)| !excluded.iter().any(|text| text == value(*slot)))
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_owned(),
        source,
    })
}
