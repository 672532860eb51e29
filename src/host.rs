//! Contracts for the host editor's collaborators.
//!
//! The options page never talks to the host directly; it is handed these
//! capabilities at the call sites that need them, which keeps the page fully
//! testable with in-memory stand-ins.

use anyhow::Result;

use crate::theme::{IndentTheme, ThemeSet};

/// Category key the settings XML blob travels under.
pub const SETTINGS_CATEGORY: &str = "IndentGuide";

/// Host-side storage for the settings exchange XML. Failures propagate:
/// import/export are explicit user actions.
pub trait SettingsXmlStore {
    fn read_xml(&mut self, category: &str) -> Result<String>;
    fn write_xml(&mut self, category: &str, xml: &str) -> Result<()>;
}

/// Looks up the display name of the active document's content type. The one
/// consumer swallows failure to "no label": the value is informational only.
pub trait ContentTypeProbe {
    fn active_content_type(&self) -> Result<String>;
}

/// The rendering service that paints guides from the theme collection.
///
/// The page pushes the default-theme reference eagerly and raises
/// `themes_changed` once per reconciliation; receivers must re-read the
/// collection they are handed on every notification rather than caching
/// pieces of an older one.
pub trait RenderService {
    fn set_default_theme(&mut self, theme: IndentTheme);
    fn themes_changed(&mut self, themes: &ThemeSet);
}
