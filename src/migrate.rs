//! One-time upgrade from the flat pre-theme settings record.
//!
//! Early releases stored a single implicit theme as scalar values directly
//! under `DisplayOptions`. The upgrade rebuilds that record as one default
//! theme under the current `IndentGuide` tree and deletes the old record.
//! Guarded by "the current-format root already exists", so it is idempotent
//! and safe to run on every page construction.

use anyhow::Result;
use tracing::{info, warn};

use crate::store::{SettingsHive, SettingsTree, LEGACY_KEY};
use crate::theme::{self, IndentTheme};

/// Run the upgrade if it has not happened yet. Failures are logged and
/// swallowed: the options page must still come up, and a later load or reset
/// repairs the stored state.
pub fn upgrade(hive: &SettingsHive) {
    match try_upgrade(hive) {
        Ok(true) => info!("migrated legacy settings record to the themed layout"),
        Ok(false) => {}
        Err(err) => warn!("settings upgrade failed: {err:#}"),
    }
}

fn try_upgrade(hive: &SettingsHive) -> Result<bool> {
    if hive.open_root()?.is_some() {
        return Ok(false);
    }

    let mut writable = hive.open_writable()?;
    let theme = match writable.tree().child(LEGACY_KEY) {
        Some(record) => legacy_theme(record),
        None => IndentTheme::default_theme(),
    };
    theme.save(writable.root_mut());
    writable.tree_mut().remove_child(LEGACY_KEY);
    writable.commit()?;
    Ok(true)
}

/// Rebuild the implicit theme from the flat record. Each field converts from
/// its stored string form independently; a value that no longer parses keeps
/// the default so one bad scalar cannot strand the old layout forever.
fn legacy_theme(record: &SettingsTree) -> IndentTheme {
    let mut theme = IndentTheme::default_theme();

    if let Some(name) = record.get(theme::KEY_NAME) {
        theme.name = name.to_string();
    }
    if let Some(raw) = record.get(theme::KEY_EMPTY_LINE_MODE) {
        match raw.parse() {
            Ok(mode) => theme.empty_line_mode = mode,
            Err(err) => warn!("ignoring legacy {}: {err:#}", theme::KEY_EMPTY_LINE_MODE),
        }
    }
    if let Some(raw) = record.get(theme::KEY_LINE_COLOR) {
        match raw.parse() {
            Ok(color) => theme.line_format.line_color = color,
            Err(err) => warn!("ignoring legacy {}: {err:#}", theme::KEY_LINE_COLOR),
        }
    }
    if let Some(raw) = record.get(theme::KEY_LINE_STYLE) {
        match raw.parse() {
            Ok(style) => theme.line_format.line_style = style,
            Err(err) => warn!("ignoring legacy {}: {err:#}", theme::KEY_LINE_STYLE),
        }
    }
    if let Some(raw) = record.get(theme::KEY_VISIBLE) {
        match theme::parse_bool(raw) {
            Ok(visible) => theme.line_format.visible = visible,
            Err(err) => warn!("ignoring legacy {}: {err:#}", theme::KEY_VISIBLE),
        }
    }
    theme
}
