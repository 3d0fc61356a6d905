use crate::config::AssertRule;
use crate::config::GlobalConfig;
use crate::config::HeadFieldRule;
use crate::config::HeadFields;
use crate::config::SheetConfig;
use crate::engine::EngineError;
use crate::spreadsheet::{ColumnKey, Row};
use std::collections::HashMap;

/// Runs assertions and collects head fields over the rows above the header.
pub(crate) struct PreambleScanner<'c> {
    asserts: HashMap<usize, Vec<&'c AssertRule>>,
    head_field_rules: HashMap<usize, Vec<&'c HeadFieldRule>>,
    head_fields: HeadFields,
}

impl<'c> PreambleScanner<'c> {
    pub(crate) fn new(sheet_config: &'c SheetConfig) -> Self {
        let mut asserts: HashMap<usize, Vec<&'c AssertRule>> = HashMap::new();
        for rule in &sheet_config.asserts {
            asserts.entry(rule.row_num).or_default().push(rule);
        }
        let mut head_field_rules: HashMap<usize, Vec<&'c HeadFieldRule>> = HashMap::new();
        for rule in &sheet_config.head_fields {
            head_field_rules.entry(rule.row_num).or_default().push(rule);
        }
        PreambleScanner {
            asserts,
            head_field_rules,
            head_fields: HeadFields::default(),
        }
    }

    /// Fails on the first assertion of this row whose cell exists and is rejected.
    pub(crate) fn check_asserts(&self, sheet: &str, row: &Row) -> Result<(), EngineError> {
        let Some(rules) = self.asserts.get(&row.number) else {
            return Ok(());
        };
        for rule in rules {
            let column = column_index(sheet, &rule.name, &rule.column_key)?;
            if let Some(cell) = row.cell_at(column) {
                if !(rule.assert)(cell) {
                    return Err(EngineError::AssertionFailure {
                        name: rule.name.clone(),
                        address: cell.address(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Records the head fields declared on this row, in declaration order.
    /// Rules whose cell is absent leave the field untouched.
    pub(crate) fn extract_head_fields(
        &mut self,
        sheet: &str,
        row: &Row,
        config: &GlobalConfig,
    ) -> Result<(), EngineError> {
        let Some(rules) = self.head_field_rules.get(&row.number) else {
            return Ok(());
        };
        for rule in rules {
            let column = column_index(sheet, &rule.name, &rule.column_key)?;
            let Some(cell) = row.cell_at(column) else {
                continue;
            };
            let value = match &rule.value {
                Some(value) => value(cell),
                None => Some(config.cell_text(Some(cell))),
            };
            self.head_fields.set(&rule.name, value);
        }
        Ok(())
    }

    /// Hands the collected head fields over; the scanner is done afterwards.
    pub(crate) fn finish(self) -> HeadFields {
        self.head_fields
    }
}

pub(crate) fn column_index(sheet: &str, rule: &str, key: &ColumnKey) -> Result<usize, EngineError> {
    key.index().ok_or_else(|| EngineError::InvalidColumnKey {
        sheet: sheet.to_owned(),
        rule: rule.to_owned(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;

    fn config() -> SheetConfig {
        SheetConfig::new()
            .with_header_row(3)
            .with_assert(AssertRule::new("title", "A", 1, |cell| cell.text() == "Report"))
            .with_head_field(HeadFieldRule::new("Period", "B", 1))
            .with_head_field(HeadFieldRule::new("Seller", "B", 2))
            .with_head_field(HeadFieldRule::new("Code", 3usize, 2).with_value(|cell| Some(format!("#{}", cell.text()))))
    }

    #[test]
    fn test_assert_passes_and_fails() {
        let sheet_config = config();
        let scanner = PreambleScanner::new(&sheet_config);
        assert!(scanner.check_asserts("S", &Row::from_texts(1, &["Report"])).is_ok());
        let error = scanner.check_asserts("S", &Row::from_texts(1, &["Other"])).unwrap_err();
        assert_eq!(
            error,
            EngineError::AssertionFailure {
                name: "title".to_owned(),
                address: "A1".to_owned()
            }
        );
    }

    #[test]
    fn test_assert_skips_absent_cell() {
        let sheet_config = config();
        let scanner = PreambleScanner::new(&sheet_config);
        assert!(scanner.check_asserts("S", &Row::from_texts(1, &["", "x"])).is_ok());
    }

    #[test]
    fn test_head_fields_are_collected() {
        let sheet_config = config();
        let global = GlobalConfig::new();
        let mut scanner = PreambleScanner::new(&sheet_config);
        scanner
            .extract_head_fields("S", &Row::from_texts(1, &["Report", "2024-03"]), &global)
            .unwrap();
        scanner
            .extract_head_fields("S", &Row::from_texts(2, &["Seller", "Acme", "42"]), &global)
            .unwrap();
        let fields = scanner.finish();
        assert_eq!(fields.get("Period"), Some("2024-03"));
        assert_eq!(fields.get("Seller"), Some("Acme"));
        assert_eq!(fields.get("Code"), Some("#42"));
    }

    #[test]
    fn test_head_field_of_absent_cell() {
        let sheet_config = config();
        let global = GlobalConfig::new();
        let mut scanner = PreambleScanner::new(&sheet_config);
        scanner.extract_head_fields("S", &Row::from_texts(2, &["Seller"]), &global).unwrap();
        let fields = scanner.finish();
        assert_eq!(fields.get("Seller"), None);
        assert_eq!(fields.get("Code"), None);
    }

    #[test]
    fn test_absent_cell_keeps_earlier_value() {
        let sheet_config = SheetConfig::new()
            .with_header_row(3)
            .with_head_field(HeadFieldRule::new("Seller", "A", 1))
            .with_head_field(HeadFieldRule::new("Seller", "B", 2))
            .with_head_field(HeadFieldRule::new("Seller", "C", 2).with_value(|cell| Some(cell.text())));
        let global = GlobalConfig::new();
        let mut scanner = PreambleScanner::new(&sheet_config);
        scanner.extract_head_fields("S", &Row::from_texts(1, &["Acme"]), &global).unwrap();
        scanner.extract_head_fields("S", &Row::from_texts(2, &["note"]), &global).unwrap();
        assert_eq!(scanner.finish().get("Seller"), Some("Acme"));
    }

    #[test]
    fn test_invalid_column_key() {
        let sheet_config = SheetConfig::new().with_assert(AssertRule::new("bad", "1A", 1, |_| true));
        let scanner = PreambleScanner::new(&sheet_config);
        let error = scanner.check_asserts("S", &Row::from_texts(1, &["x"])).unwrap_err();
        assert!(matches!(error, EngineError::InvalidColumnKey { ref key, .. } if key == "1A"));
    }
}
