//! XML settings import/export.
//!
//! The host's settings exchange format is a single `<IndentGuide>` document
//! with one `<Theme .../>` element per theme. Import is an explicit user
//! action, so parse failures here are hard errors rather than the soft-skip
//! the hive loader uses. Export always writes the whole collection.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::theme::IndentTheme;

const ROOT_ELEMENT: &str = "IndentGuide";
const THEME_ELEMENT: &str = "Theme";

/// Parse a whole settings document into themes.
pub fn load_all(xml: &str) -> Result<Vec<IndentTheme>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut themes = Vec::new();
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"IndentGuide" => saw_root = true,
                b"Theme" => {
                    let theme = IndentTheme::from_xml_start(e)
                        .with_context(|| format!("bad <{THEME_ELEMENT}> element"))?;
                    themes.push(theme);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(anyhow!("settings XML has no <{ROOT_ELEMENT}> root element"));
    }
    Ok(themes)
}

/// Serialize the whole collection as one settings document.
pub fn save_all<'a, I>(themes: I) -> Result<String>
where
    I: IntoIterator<Item = &'a IndentTheme>,
{
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
    for theme in themes {
        theme.write_xml(&mut writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

    String::from_utf8(writer.into_inner()).context("settings XML is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{EmptyLineMode, GuideColor, LineStyle};

    #[test]
    fn document_round_trips_every_field() {
        let mut dark = IndentTheme::new("Dark");
        dark.empty_line_mode = EmptyLineMode::SameAsLineBelowLogical;
        dark.line_format.line_color = GuideColor::rgb(0x10, 0x20, 0x30);
        dark.line_format.line_style = LineStyle::Solid;
        dark.line_format.visible = false;
        let mut light = IndentTheme::new("Light");
        light.is_default = true;

        let xml = save_all([&dark, &light]).unwrap();
        let loaded = load_all(&xml).unwrap();

        assert_eq!(loaded, vec![dark, light]);
    }

    #[test]
    fn theme_names_with_markup_characters_survive() {
        let theme = IndentTheme::new("C & C++ <generics>");

        let xml = save_all([&theme]).unwrap();
        let loaded = load_all(&xml).unwrap();

        assert_eq!(loaded[0].name, "C & C++ <generics>");
    }

    #[test]
    fn sparse_theme_element_uses_defaults() {
        let loaded = load_all(r#"<IndentGuide><Theme Name="Plain"/></IndentGuide>"#).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Plain");
        assert!(!loaded[0].is_default);
        assert_eq!(loaded[0].line_format.line_style, LineStyle::Dotted);
    }

    #[test]
    fn empty_document_yields_no_themes() {
        assert!(load_all("<IndentGuide></IndentGuide>").unwrap().is_empty());
        assert!(load_all("<IndentGuide/>").unwrap().is_empty());
    }

    #[test]
    fn malformed_document_is_a_hard_error() {
        assert!(load_all("<IndentGuide><Theme").is_err());
        assert!(load_all("not xml at all").is_err());
    }

    #[test]
    fn document_without_the_expected_root_is_rejected() {
        assert!(load_all(r#"<Other><Theme Name="X"/></Other>"#).is_err());
    }

    #[test]
    fn malformed_attribute_is_a_hard_error() {
        let xml = r#"<IndentGuide><Theme Name="X" LineColor="nope"/></IndentGuide>"#;
        assert!(load_all(xml).is_err());
    }
}
