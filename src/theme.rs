//! Indent guide theme entity and its serialized forms.
//!
//! A theme is a named bundle of guide-formatting settings. Themes round-trip
//! through two stores: the hierarchical settings hive (one child entry per
//! theme, scalar string values) and the XML settings document used for
//! import/export. Missing fields fall back to the constructor defaults so a
//! partially written entry still loads.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;

use crate::store::SettingsTree;

/// Name carried by the built-in default theme.
pub const DEFAULT_THEME_NAME: &str = "Default";

/// Canonical theme collection, keyed by theme name.
///
/// `BTreeMap` keeps iteration lexicographic, which makes "last default wins"
/// deterministic when malformed input flags more than one default.
pub type ThemeSet = BTreeMap<String, IndentTheme>;

// Field keys shared by the hive entries and the XML attributes.
pub(crate) const KEY_NAME: &str = "Name";
pub(crate) const KEY_IS_DEFAULT: &str = "IsDefault";
pub(crate) const KEY_EMPTY_LINE_MODE: &str = "EmptyLineMode";
pub(crate) const KEY_LINE_COLOR: &str = "LineColor";
pub(crate) const KEY_LINE_STYLE: &str = "LineStyle";
pub(crate) const KEY_VISIBLE: &str = "Visible";

/// How guides are drawn on lines with no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyLineMode {
    NoGuides,
    #[default]
    SameAsLineAboveActual,
    SameAsLineAboveLogical,
    SameAsLineBelowActual,
    SameAsLineBelowLogical,
}

impl EmptyLineMode {
    pub fn all() -> [EmptyLineMode; 5] {
        [
            EmptyLineMode::NoGuides,
            EmptyLineMode::SameAsLineAboveActual,
            EmptyLineMode::SameAsLineAboveLogical,
            EmptyLineMode::SameAsLineBelowActual,
            EmptyLineMode::SameAsLineBelowLogical,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyLineMode::NoGuides => "NoGuides",
            EmptyLineMode::SameAsLineAboveActual => "SameAsLineAboveActual",
            EmptyLineMode::SameAsLineAboveLogical => "SameAsLineAboveLogical",
            EmptyLineMode::SameAsLineBelowActual => "SameAsLineBelowActual",
            EmptyLineMode::SameAsLineBelowLogical => "SameAsLineBelowLogical",
        }
    }
}

impl fmt::Display for EmptyLineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmptyLineMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoGuides" => Ok(EmptyLineMode::NoGuides),
            "SameAsLineAboveActual" => Ok(EmptyLineMode::SameAsLineAboveActual),
            "SameAsLineAboveLogical" => Ok(EmptyLineMode::SameAsLineAboveLogical),
            "SameAsLineBelowActual" => Ok(EmptyLineMode::SameAsLineBelowActual),
            "SameAsLineBelowLogical" => Ok(EmptyLineMode::SameAsLineBelowLogical),
            other => Err(anyhow!("unknown empty line mode {other:?}")),
        }
    }
}

/// Stroke style used for guide lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineStyle {
    Solid,
    Thick,
    #[default]
    Dotted,
    Dashed,
}

impl LineStyle {
    pub fn all() -> [LineStyle; 4] {
        [
            LineStyle::Solid,
            LineStyle::Thick,
            LineStyle::Dotted,
            LineStyle::Dashed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineStyle::Solid => "Solid",
            LineStyle::Thick => "Thick",
            LineStyle::Dotted => "Dotted",
            LineStyle::Dashed => "Dashed",
        }
    }
}

impl fmt::Display for LineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Solid" => Ok(LineStyle::Solid),
            "Thick" => Ok(LineStyle::Thick),
            "Dotted" => Ok(LineStyle::Dotted),
            "Dashed" => Ok(LineStyle::Dashed),
            other => Err(anyhow!("unknown line style {other:?}")),
        }
    }
}

/// Guide color, stored as `#RRGGBB` hex.
///
/// Parsing also accepts a small table of color names because legacy records
/// were written with named colors rather than hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl GuideColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Conventional default guide color.
    pub const fn teal() -> Self {
        Self::rgb(0, 128, 128)
    }
}

impl fmt::Display for GuideColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for GuideColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(anyhow!("color {trimmed:?} is not #RRGGBB"));
            }
            let r = u8::from_str_radix(&hex[0..2], 16)
                .with_context(|| format!("color {trimmed:?} is not #RRGGBB"))?;
            let g = u8::from_str_radix(&hex[2..4], 16)
                .with_context(|| format!("color {trimmed:?} is not #RRGGBB"))?;
            let b = u8::from_str_radix(&hex[4..6], 16)
                .with_context(|| format!("color {trimmed:?} is not #RRGGBB"))?;
            return Ok(Self::rgb(r, g, b));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "black" => Ok(Self::rgb(0, 0, 0)),
            "white" => Ok(Self::rgb(255, 255, 255)),
            "red" => Ok(Self::rgb(255, 0, 0)),
            "maroon" => Ok(Self::rgb(128, 0, 0)),
            "lime" => Ok(Self::rgb(0, 255, 0)),
            "green" => Ok(Self::rgb(0, 128, 0)),
            "blue" => Ok(Self::rgb(0, 0, 255)),
            "navy" => Ok(Self::rgb(0, 0, 128)),
            "yellow" => Ok(Self::rgb(255, 255, 0)),
            "olive" => Ok(Self::rgb(128, 128, 0)),
            "aqua" | "cyan" => Ok(Self::rgb(0, 255, 255)),
            "teal" => Ok(Self::rgb(0, 128, 128)),
            "fuchsia" | "magenta" => Ok(Self::rgb(255, 0, 255)),
            "purple" => Ok(Self::rgb(128, 0, 128)),
            "silver" => Ok(Self::rgb(192, 192, 192)),
            "gray" | "grey" => Ok(Self::rgb(128, 128, 128)),
            other => Err(anyhow!("unknown color {other:?}")),
        }
    }
}

/// Per-theme line formatting. Cloned by value, never shared between themes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    pub line_color: GuideColor,
    pub line_style: LineStyle,
    pub visible: bool,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            line_color: GuideColor::teal(),
            line_style: LineStyle::default(),
            visible: true,
        }
    }
}

/// A named bundle of indent-guide formatting settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentTheme {
    pub name: String,
    pub is_default: bool,
    pub empty_line_mode: EmptyLineMode,
    pub line_format: LineFormat,
}

impl IndentTheme {
    /// A non-default theme with conventional defaults and the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            empty_line_mode: EmptyLineMode::default(),
            line_format: LineFormat::default(),
        }
    }

    /// The built-in default theme a fresh install starts with.
    pub fn default_theme() -> Self {
        Self {
            is_default: true,
            ..Self::new(DEFAULT_THEME_NAME)
        }
    }

    /// Read the named child entry of `root`. Missing fields keep their
    /// defaults; a malformed value fails this theme only.
    pub fn load(root: &SettingsTree, name: &str) -> Result<IndentTheme> {
        let entry = root
            .child(name)
            .ok_or_else(|| anyhow!("no stored theme named {name:?}"))?;

        let mut theme = IndentTheme::new(name);
        if let Some(raw) = entry.get(KEY_IS_DEFAULT) {
            theme.is_default = parse_bool(raw)
                .with_context(|| format!("theme {name:?}: bad {KEY_IS_DEFAULT}"))?;
        }
        if let Some(raw) = entry.get(KEY_EMPTY_LINE_MODE) {
            theme.empty_line_mode = raw
                .parse()
                .with_context(|| format!("theme {name:?}: bad {KEY_EMPTY_LINE_MODE}"))?;
        }
        if let Some(raw) = entry.get(KEY_LINE_COLOR) {
            theme.line_format.line_color = raw
                .parse()
                .with_context(|| format!("theme {name:?}: bad {KEY_LINE_COLOR}"))?;
        }
        if let Some(raw) = entry.get(KEY_LINE_STYLE) {
            theme.line_format.line_style = raw
                .parse()
                .with_context(|| format!("theme {name:?}: bad {KEY_LINE_STYLE}"))?;
        }
        if let Some(raw) = entry.get(KEY_VISIBLE) {
            theme.line_format.visible =
                parse_bool(raw).with_context(|| format!("theme {name:?}: bad {KEY_VISIBLE}"))?;
        }
        Ok(theme)
    }

    /// Write all fields under `root/name`, replacing any existing entry.
    pub fn save(&self, root: &mut SettingsTree) {
        let entry = root.replace_child(&self.name);
        entry.set(KEY_IS_DEFAULT, self.is_default.to_string());
        entry.set(KEY_EMPTY_LINE_MODE, self.empty_line_mode.to_string());
        entry.set(KEY_LINE_COLOR, self.line_format.line_color.to_string());
        entry.set(KEY_LINE_STYLE, self.line_format.line_style.to_string());
        entry.set(KEY_VISIBLE, self.line_format.visible.to_string());
    }

    /// Remove this theme's entry. An already-absent entry is a no-op; returns
    /// whether anything was removed.
    pub fn delete(&self, root: &mut SettingsTree) -> bool {
        root.remove_child(&self.name)
    }

    /// Emit this theme as one `<Theme .../>` element.
    pub(crate) fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut elem = BytesStart::new("Theme");
        elem.push_attribute((KEY_NAME, self.name.as_str()));
        elem.push_attribute((KEY_IS_DEFAULT, self.is_default.to_string().as_str()));
        elem.push_attribute((KEY_EMPTY_LINE_MODE, self.empty_line_mode.as_str()));
        elem.push_attribute((
            KEY_LINE_COLOR,
            self.line_format.line_color.to_string().as_str(),
        ));
        elem.push_attribute((KEY_LINE_STYLE, self.line_format.line_style.as_str()));
        elem.push_attribute((KEY_VISIBLE, self.line_format.visible.to_string().as_str()));
        writer.write_event(Event::Empty(elem))?;
        Ok(())
    }

    /// Build a theme from the attributes of a `<Theme>` start tag. Missing
    /// attributes keep their defaults, same as the hive path.
    pub(crate) fn from_xml_start(elem: &BytesStart<'_>) -> Result<IndentTheme> {
        let mut theme = IndentTheme::new(DEFAULT_THEME_NAME);
        for attr in elem.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.as_ref() {
                b"Name" => theme.name = value,
                b"IsDefault" => {
                    theme.is_default = parse_bool(&value).context("bad IsDefault attribute")?;
                }
                b"EmptyLineMode" => {
                    theme.empty_line_mode =
                        value.parse().context("bad EmptyLineMode attribute")?;
                }
                b"LineColor" => {
                    theme.line_format.line_color =
                        value.parse().context("bad LineColor attribute")?;
                }
                b"LineStyle" => {
                    theme.line_format.line_style =
                        value.parse().context("bad LineStyle attribute")?;
                }
                b"Visible" => {
                    theme.line_format.visible =
                        parse_bool(&value).context("bad Visible attribute")?;
                }
                _ => {}
            }
        }
        Ok(theme)
    }
}

/// Accepts `"true"`/`"false"` in any casing; legacy records were written with
/// capitalized `"True"`/`"False"`.
pub(crate) fn parse_bool(raw: &str) -> Result<bool> {
    raw.to_ascii_lowercase()
        .parse()
        .map_err(|_| anyhow!("{raw:?} is not a boolean"))
}
