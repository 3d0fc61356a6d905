use crate::config::ActualHeader;
use crate::config::GlobalConfig;
use crate::config::HeaderRule;
use crate::engine::preamble::column_index;
use crate::engine::EngineError;
use crate::spreadsheet::Row;
use tracing::debug;

/// Where an actual header rule reads its values from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Label emitted for this column when the rule has no name
    pub header: String,
    /// 1-based source column
    pub column: usize,
}

/// One actual header per populated cell of the header row, labelled by that cell.
pub(crate) fn derive_headers(row: &Row) -> Vec<HeaderRule> {
    row.cells()
        .map(|cell| HeaderRule::Actual(ActualHeader::at(cell.col)))
        .collect()
}

/// Binds every actual rule to a source column of the header row. Virtual
/// rules get no column.
pub(crate) fn resolve_columns(
    sheet: &str,
    rules: &[HeaderRule],
    row: &Row,
    config: &GlobalConfig,
) -> Result<Vec<Option<ResolvedColumn>>, EngineError> {
    let columns = rules
        .iter()
        .enumerate()
        .map(|(slot, rule)| match rule {
            HeaderRule::Actual(header) => resolve_column(sheet, slot, header, row, config).map(Some),
            HeaderRule::Virtual(_) => Ok(None),
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(sheet, row = row.number, columns = ?columns, "resolved header columns");
    Ok(columns)
}

fn resolve_column(
    sheet: &str,
    slot: usize,
    header: &ActualHeader,
    row: &Row,
    config: &GlobalConfig,
) -> Result<ResolvedColumn, EngineError> {
    match &header.column_key {
        Some(key) => {
            let label = header.name.as_deref().unwrap_or("");
            let column = column_index(sheet, label, key)?;
            let source = config.cell_text(row.cell_at(column));
            let target = header.name.clone().unwrap_or_else(|| source.clone());
            if target.is_empty() {
                return Err(EngineError::EmptyHeader {
                    sheet: sheet.to_owned(),
                    column,
                });
            }
            if let Some(test) = &header.header_name_test {
                if !test(&source) {
                    return Err(EngineError::HeaderMismatch {
                        sheet: sheet.to_owned(),
                        header: target,
                    });
                }
            }
            Ok(ResolvedColumn { header: target, column })
        }
        None => {
            let found = match (&header.header_name_test, &header.name) {
                (Some(test), _) => row.cells().find_map(|cell| {
                    let text = config.cell_text(Some(cell));
                    test(&text).then_some((cell.col, text))
                }),
                (None, Some(name)) => row.cells().find_map(|cell| {
                    let text = config.cell_text(Some(cell));
                    (&text == name).then_some((cell.col, text))
                }),
                (None, None) => {
                    return Err(EngineError::ConfigurationGap {
                        sheet: sheet.to_owned(),
                        slot,
                    })
                }
            };
            match found {
                Some((column, header)) => Ok(ResolvedColumn { header, column }),
                None => Err(EngineError::ColumnNotFound {
                    sheet: sheet.to_owned(),
                    header: header.name.clone().unwrap_or_else(|| format!("#{}", slot + 1)),
                }),
            }
        }
    }
}

/// Output labels of the header row, one per rule.
pub(crate) fn header_labels(rules: &[HeaderRule], columns: &[Option<ResolvedColumn>]) -> Vec<String> {
    rules
        .iter()
        .zip(columns)
        .map(|(rule, column)| match (rule.name(), column) {
            (Some(name), _) => name.to_owned(),
            (None, Some(column)) => column.header.clone(),
            (None, None) => String::new(),
        })
        .collect()
}
