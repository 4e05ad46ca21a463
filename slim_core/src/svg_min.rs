//! In-process SVG minification.
//!
//! The SVG optimizer's workhorse, applied after sanitization:
//! - strip the XML prolog, comments, and DOCTYPE
//! - remove descriptive elements (`<title>`, `<desc>`, `<metadata>`)
//! - remove editor namespaces and prefixed attributes (Inkscape,
//!   Sodipodi, Adobe)
//! - shorten element ids, rewriting `#id` and `url(#id)` references
//! - add a viewBox from width/height when missing
//! - drop whitespace-only text (no indentation in output)
//!
//! Output is well-formed XML; pixel-affecting attributes are untouched.

use crate::errors::{Result, SlimError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;

const DESCRIPTIVE_ELEMENTS: [&str; 3] = ["title", "desc", "metadata"];
const EDITOR_PREFIXES: [&str; 2] = ["inkscape", "sodipodi"];

fn url_ref_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"url\(#([^)]+)\)").unwrap())
}

/// Minify sanitized SVG text.
pub fn minify(data: &[u8]) -> Result<Vec<u8>> {
    let id_map = collect_id_map(data)?;

    let mut reader = Reader::from_reader(data);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    let mut skip_depth: u32 = 0;
    let mut is_root = true;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| SlimError::MalformedSvg(e.to_string()))?;

        match event {
            Event::Start(ref e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    buf.clear();
                    continue;
                }
                let local = local_name(e.name().as_ref());
                if DESCRIPTIVE_ELEMENTS.contains(&local.as_str()) {
                    skip_depth = 1;
                    buf.clear();
                    continue;
                }
                let rebuilt = rewrite_element(e, &id_map, is_root && local == "svg")?;
                is_root = false;
                writer
                    .write_event(Event::Start(rebuilt))
                    .map_err(write_err)?;
            }
            Event::Empty(ref e) => {
                if skip_depth > 0 {
                    buf.clear();
                    continue;
                }
                let local = local_name(e.name().as_ref());
                if DESCRIPTIVE_ELEMENTS.contains(&local.as_str()) {
                    buf.clear();
                    continue;
                }
                let rebuilt = rewrite_element(e, &id_map, is_root && local == "svg")?;
                is_root = false;
                writer
                    .write_event(Event::Empty(rebuilt))
                    .map_err(write_err)?;
            }
            Event::End(ref e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    buf.clear();
                    continue;
                }
                writer.write_event(Event::End(e.to_owned())).map_err(write_err)?;
            }
            Event::Text(ref t) => {
                if skip_depth > 0 {
                    buf.clear();
                    continue;
                }
                let raw = t.as_ref();
                if !raw.iter().all(|b| b.is_ascii_whitespace()) {
                    writer.write_event(Event::Text(t.to_owned())).map_err(write_err)?;
                }
            }
            Event::CData(ref c) => {
                if skip_depth == 0 {
                    writer.write_event(Event::CData(c.to_owned())).map_err(write_err)?;
                }
            }
            // Prolog, comments, DOCTYPE, and processing instructions all
            // go.
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn write_err<E: std::fmt::Display>(e: E) -> SlimError {
    SlimError::MalformedSvg(format!("write error: {}", e))
}

fn local_name(qname: &[u8]) -> String {
    let name = match qname.iter().rposition(|&b| b == b':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    };
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

fn prefix_of(qname: &[u8]) -> Option<String> {
    qname
        .iter()
        .position(|&b| b == b':')
        .map(|pos| String::from_utf8_lossy(&qname[..pos]).to_ascii_lowercase())
}

/// First pass: map every id to a short replacement (a, b, ..., z, a0,
/// a1, ...), in document order.
fn collect_id_map(data: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut ids = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| SlimError::MalformedSvg(e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"id" {
                        if let Ok(value) = attr.unescape_value() {
                            ids.push(value.into_owned());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let mut map = HashMap::new();
    for (index, id) in ids.into_iter().enumerate() {
        let short = short_id(index);
        // Never grow an id that is already minimal.
        if short.len() < id.len() {
            map.insert(id, short);
        }
    }
    Ok(map)
}

fn short_id(index: usize) -> String {
    if index < 26 {
        ((b'a' + index as u8) as char).to_string()
    } else {
        format!("a{}", index - 26)
    }
}

fn rewrite_element(
    elem: &BytesStart,
    id_map: &HashMap<String, String>,
    is_svg_root: bool,
) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);

    let mut width: Option<f64> = None;
    let mut height: Option<f64> = None;
    let mut has_viewbox = false;

    for attr in elem.attributes() {
        let attr = attr.map_err(|e| SlimError::MalformedSvg(e.to_string()))?;
        let key_bytes = attr.key.as_ref();
        let key = String::from_utf8_lossy(key_bytes).into_owned();

        // Editor namespace declarations and prefixed attributes.
        if let Some(prefix) = prefix_of(key_bytes) {
            if prefix == "xmlns" {
                let suffix = local_name(key_bytes);
                if EDITOR_PREFIXES.contains(&suffix.as_str()) {
                    continue;
                }
                let value = attr
                    .unescape_value()
                    .map_err(|e| SlimError::MalformedSvg(e.to_string()))?;
                if value.to_ascii_lowercase().contains("adobe") {
                    continue;
                }
                rebuilt.push_attribute((key.as_str(), value.as_ref()));
                continue;
            }
            if EDITOR_PREFIXES.contains(&prefix.as_str()) {
                continue;
            }
        }

        let value = attr
            .unescape_value()
            .map_err(|e| SlimError::MalformedSvg(e.to_string()))?;

        if key == "id" {
            let new_id = id_map.get(value.as_ref()).cloned();
            rebuilt.push_attribute(("id", new_id.as_deref().unwrap_or(value.as_ref())));
            continue;
        }

        if is_svg_root {
            match key.as_str() {
                "width" => width = parse_length(&value),
                "height" => height = parse_length(&value),
                "viewBox" => has_viewbox = true,
                _ => {}
            }
        }

        let rewritten = rewrite_references(&value, id_map);
        rebuilt.push_attribute((key.as_str(), rewritten.as_str()));
    }

    if is_svg_root && !has_viewbox {
        if let (Some(w), Some(h)) = (width, height) {
            rebuilt.push_attribute(("viewBox", format!("0 0 {} {}", w, h).as_str()));
        }
    }

    Ok(rebuilt)
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

/// Rewrite `#id` and `url(#id)` references through the id map.
fn rewrite_references(value: &str, id_map: &HashMap<String, String>) -> String {
    if id_map.is_empty() {
        return value.to_string();
    }

    if let Some(target) = value.strip_prefix('#') {
        if let Some(short) = id_map.get(target) {
            return format!("#{}", short);
        }
        return value.to_string();
    }

    url_ref_re()
        .replace_all(value, |caps: &regex::Captures| {
            match id_map.get(&caps[1]) {
                Some(short) => format!("url(#{})", short),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify_str(svg: &str) -> String {
        String::from_utf8(minify(svg.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn test_strips_prolog_and_comments() {
        let out = minify_str("<?xml version=\"1.0\"?><!-- hi --><svg><rect/></svg>");
        assert!(!out.contains("<?xml"));
        assert!(!out.contains("hi"));
        assert!(out.contains("<svg"));
    }

    #[test]
    fn test_removes_descriptive_elements() {
        let out = minify_str("<svg><title>t</title><desc>d</desc><metadata>m</metadata><rect/></svg>");
        assert!(!out.contains("title"));
        assert!(!out.contains("metadata"));
        assert!(out.contains("rect"));
    }

    #[test]
    fn test_removes_editor_attributes() {
        let out = minify_str(
            r#"<svg xmlns:inkscape="http://www.inkscape.org" inkscape:version="1.0" sodipodi:docname="f.svg"><rect/></svg>"#,
        );
        assert!(!out.contains("inkscape"));
        assert!(!out.contains("sodipodi"));
    }

    #[test]
    fn test_shortens_ids_and_rewrites_references() {
        let out = minify_str(
            r##"<svg><defs><linearGradient id="myLongGradientName"/></defs><rect fill="url(#myLongGradientName)"/><use href="#myLongGradientName"/></svg>"##,
        );
        assert!(!out.contains("myLongGradientName"));
        assert!(out.contains(r#"id="a""#));
        assert!(out.contains("url(#a)"));
        assert!(out.contains(r##"href="#a""##));
    }

    #[test]
    fn test_short_ids_are_left_alone() {
        let out = minify_str(r#"<svg><rect id="b"/></svg>"#);
        assert!(out.contains(r#"id="b""#));
    }

    #[test]
    fn test_adds_viewbox_from_dimensions() {
        let out = minify_str(r#"<svg width="120" height="80"><rect/></svg>"#);
        assert!(out.contains(r#"viewBox="0 0 120 80""#));

        let untouched = minify_str(r#"<svg width="120" height="80" viewBox="0 0 12 8"/>"#);
        assert!(untouched.contains(r#"viewBox="0 0 12 8""#));
        assert!(!untouched.contains("0 0 120 80"));
    }

    #[test]
    fn test_drops_indentation_whitespace() {
        let out = minify_str("<svg>\n    <g>\n        <rect/>\n    </g>\n</svg>");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_output_shrinks_bloated_input() {
        let input = format!(
            "<?xml version=\"1.0\"?><!--{}--><svg><metadata>{}</metadata><rect/></svg>",
            "c".repeat(200),
            "m".repeat(200)
        );
        let out = minify(input.as_bytes()).unwrap();
        assert!(out.len() < input.len() / 2);
    }

    #[test]
    fn test_minify_preserves_drawing_content() {
        let out = minify_str(r##"<svg><circle cx="5" cy="5" r="4" fill="#ff0000"/></svg>"##);
        assert!(out.contains(r#"cx="5""#));
        assert!(out.contains(r##"fill="#ff0000""##));
    }
}
