use crate::config::GlobalConfig;
use crate::config::HeadFields;
use crate::config::HeaderRule;
use crate::config::ValueContext;
use crate::engine::header::ResolvedColumn;
use crate::engine::EngineError;
use crate::engine::OutputRow;
use crate::spreadsheet::Row;

/// Computes the output values of one data row, one per header rule.
pub(crate) fn project_row(
    sheet: &str,
    rules: &[HeaderRule],
    columns: &[Option<ResolvedColumn>],
    row: &Row,
    head_fields: &HeadFields,
    config: &GlobalConfig,
) -> Result<OutputRow, EngineError> {
    let mut values = Vec::with_capacity(rules.len());
    for (slot, rule) in rules.iter().enumerate() {
        let value = match rule {
            HeaderRule::Virtual(header) => (header.value)(&ValueContext {
                sheet_name: sheet,
                cell: None,
                row,
                head_fields,
                header_name: &header.name,
            }),
            HeaderRule::Actual(header) => {
                let Some(Some(column)) = columns.get(slot) else {
                    return Err(EngineError::MissingHeaderConfig {
                        sheet: sheet.to_owned(),
                        row: row.number,
                    });
                };
                let cell = row.cell_at(column.column);
                // A transform that gives nothing falls back to the cell text
                header
                    .value
                    .as_ref()
                    .and_then(|value| {
                        value(&ValueContext {
                            sheet_name: sheet,
                            cell,
                            row,
                            head_fields,
                            header_name: &column.header,
                        })
                    })
                    .or_else(|| Some(config.cell_text(cell)))
            }
        };
        values.push(value);
    }
    Ok(values)
}
