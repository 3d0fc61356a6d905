//! Ready-made value transforms for header rules.
use crate::config::ValueContext;
use crate::config::ValueFn;
use crate::spreadsheet::Cell;
use std::sync::{Arc, Mutex, PoisonError};

/// Numeric value, or text holding a number, rendered with two decimals.
pub fn parse_money(cell: &Cell) -> Option<String> {
    cell.to_double().map(|value| format!("{value:.2}"))
}

/// [`parse_money`] as a value transform.
pub fn money() -> ValueFn {
    Arc::new(|ctx: &ValueContext<'_>| ctx.cell.and_then(parse_money))
}

/// Where a fill-down transform stands in the sheet it last saw.
#[derive(Default)]
struct FillState {
    sheet_name: String,
    row: usize,
    value: Option<String>,
}

/// Carries the last non-empty text down into empty cells.
///
/// Every call returns a transform with its own memory, so use one per column.
/// The memory starts over whenever another sheet is streamed, or the same
/// sheet is streamed again.
pub fn fill_last_value() -> ValueFn {
    let state: Mutex<FillState> = Mutex::new(FillState::default());
    Arc::new(move |ctx: &ValueContext<'_>| {
        let text = ctx.cell.map(Cell::text).unwrap_or_default();
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.sheet_name != ctx.sheet_name || ctx.row.number <= state.row {
            state.sheet_name = ctx.sheet_name.to_owned();
            state.value = None;
        }
        state.row = ctx.row.number;
        if !text.is_empty() {
            state.value = Some(text);
        }
        state.value.clone()
    })
}

/// Source row number of non-empty cells.
pub fn fill_not_empty_row_num() -> ValueFn {
    Arc::new(|ctx: &ValueContext<'_>| {
        ctx.cell
            .filter(|cell| !cell.text().is_empty())
            .map(|cell| cell.row.to_string())
    })
}

/// Source column number of non-empty cells.
pub fn fill_not_empty_col_num() -> ValueFn {
    Arc::new(|ctx: &ValueContext<'_>| {
        ctx.cell
            .filter(|cell| !cell.text().is_empty())
            .map(|cell| cell.col.to_string())
    })
}

/// Copies a head field into the column: `field`, or the field named like
/// the column itself.
pub fn fill_head_field_value(field: Option<&str>) -> ValueFn {
    let field = field.map(str::to_owned);
    Arc::new(move |ctx: &ValueContext<'_>| {
        let name = field.as_deref().unwrap_or(ctx.header_name);
        ctx.head_fields.get(name).map(str::to_owned)
    })
}
