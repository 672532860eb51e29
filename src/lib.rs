//! Settings management for named indent-guide themes.
//!
//! This crate is the persistence and reconciliation engine behind an editor
//! extension's indent-guide options page. It keeps three views of the theme
//! collection consistent across load, edit, apply, cancel, and reset: the
//! canonical in-memory set owned by the options page, the rendering
//! service's live copy, and the on-disk settings hive. It also performs the
//! one-time upgrade from the old single-record settings layout.
//!
//! The windowed editor UI, the guide-painting service, and the host IDE's
//! view plumbing are external collaborators, reached through the traits in
//! [`host`].

pub mod host;
pub mod migrate;
pub mod options;
pub mod store;
pub mod theme;
pub mod xml;

pub use host::{ContentTypeProbe, RenderService, SettingsXmlStore, SETTINGS_CATEGORY};
pub use options::{OptionsPage, OptionsWindow};
pub use store::{SettingsHive, SettingsTree, WritableHive};
pub use theme::{
    EmptyLineMode, GuideColor, IndentTheme, LineFormat, LineStyle, ThemeSet, DEFAULT_THEME_NAME,
};
