use crate::config::GlobalConfig;
use crate::config::SheetConfig;
use tracing::debug;

static DEFAULT_SHEET_CONFIG: SheetConfig = SheetConfig::EMPTY;

/// Picks the [`SheetConfig`] governing a worksheet.
///
/// The selector (if any) maps the sheet name to a config name, otherwise the
/// sheet name is used as is. The first config that matches that name, the
/// sheet index, or sits at the sheet's own position while carrying neither
/// a name nor an index wins. Without a match the empty config applies.
pub fn bind<'c>(sheet_name: &str, sheet_index: usize, config: &'c GlobalConfig) -> &'c SheetConfig {
    let config_name = config
        .sheet_config_selector
        .as_ref()
        .and_then(|selector| selector(sheet_name))
        .unwrap_or_else(|| sheet_name.to_owned());

    let found = config
        .sheet_configs
        .iter()
        .enumerate()
        .find(|(position, candidate)| {
            candidate.name.as_deref() == Some(config_name.as_str())
                || candidate.sheet_index == Some(sheet_index)
                || (candidate.name.is_none() && candidate.sheet_index.is_none() && *position == sheet_index)
        });

    match found {
        Some((position, sheet_config)) => {
            debug!(sheet = sheet_name, config = position, "bound sheet config");
            sheet_config
        }
        None => {
            debug!(sheet = sheet_name, "no sheet config matched, using defaults");
            &DEFAULT_SHEET_CONFIG
        }
    }
}
