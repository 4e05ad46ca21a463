//! SVG text analysis: dimensions, metadata flags, bloat measurement.
//!
//! Works on the decompressed text for both SVG and SVGZ. Regex-based:
//! these are optimization signals, not a parser.

use regex::Regex;
use std::io::Read;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct SvgAnalysis {
    pub width: u32,
    pub height: u32,
    pub has_metadata: bool,
    pub bloat_ratio: Option<f64>,
}

fn regexes() -> &'static SvgRegexes {
    static CELL: OnceLock<SvgRegexes> = OnceLock::new();
    CELL.get_or_init(SvgRegexes::new)
}

struct SvgRegexes {
    viewbox: Regex,
    comments: Regex,
    prolog: Regex,
    metadata: Regex,
    editor_xmlns: Regex,
    editor_attrs: Regex,
    adobe_xmlns: Regex,
    ids: Regex,
    redundant: Regex,
}

impl SvgRegexes {
    fn new() -> Self {
        Self {
            viewbox: Regex::new(r#"viewBox="([^"]*)""#).unwrap(),
            comments: Regex::new(r"(?s)<!--.*?-->").unwrap(),
            prolog: Regex::new(r"<\?xml[^?]*\?>").unwrap(),
            metadata: Regex::new(r"(?is)<metadata.*?</metadata>").unwrap(),
            editor_xmlns: Regex::new(r#"xmlns:(inkscape|sodipodi)="[^"]*""#).unwrap(),
            editor_attrs: Regex::new(r#"(inkscape|sodipodi):[a-zA-Z-]+="[^"]*""#).unwrap(),
            adobe_xmlns: Regex::new(r#"(?i)xmlns:x="[^"]*adobe[^"]*""#).unwrap(),
            ids: Regex::new(r#"id="([^"]+)""#).unwrap(),
            redundant: Regex::new(r#"stroke="none"|stroke-width="0"|opacity="1""#).unwrap(),
        }
    }
}

/// Analyze SVG text. For SVGZ pass the gunzipped bytes (see
/// [`gunzip_svg`]).
pub fn analyze(text: &str) -> SvgAnalysis {
    let mut analysis = SvgAnalysis::default();
    let re = regexes();

    if let Some(caps) = re.viewbox.captures(text) {
        let parts: Vec<&str> = caps[1].split_whitespace().collect();
        if parts.len() == 4 {
            if let (Ok(w), Ok(h)) = (parts[2].parse::<f64>(), parts[3].parse::<f64>()) {
                analysis.width = w.max(0.0) as u32;
                analysis.height = h.max(0.0) as u32;
            }
        }
    }

    let lower = text.to_ascii_lowercase();
    let has_comments = text.contains("<!--");
    let has_metadata_element = lower.contains("<metadata");
    let has_editor =
        text.contains("xmlns:inkscape") || text.contains("xmlns:sodipodi") || lower.contains("adobe");
    analysis.has_metadata = has_comments || has_metadata_element || has_editor;

    analysis.bloat_ratio = Some(bloat_ratio(text));
    analysis
}

/// Fraction of the text classified as removable: comments, the XML
/// prolog, metadata blocks, editor namespaces and prefixed attributes,
/// long-id savings, and redundant attribute defaults. Capped at 1.0.
pub fn bloat_ratio(text: &str) -> f64 {
    let total = text.len();
    if total == 0 {
        return 0.0;
    }
    let re = regexes();

    let mut removable = 0usize;
    for m in re.comments.find_iter(text) {
        removable += m.len();
    }
    for m in re.prolog.find_iter(text) {
        removable += m.len();
    }
    for m in re.metadata.find_iter(text) {
        removable += m.len();
    }
    for m in re.editor_xmlns.find_iter(text) {
        removable += m.len();
    }
    for m in re.editor_attrs.find_iter(text) {
        removable += m.len();
    }
    for m in re.adobe_xmlns.find_iter(text) {
        removable += m.len();
    }
    for caps in re.ids.captures_iter(text) {
        let id = &caps[1];
        if id.len() > 2 {
            removable += id.len() - 2;
        }
    }
    for m in re.redundant.find_iter(text) {
        removable += m.len();
    }

    (removable as f64 / total as f64).min(1.0)
}

/// Gunzip SVGZ bytes with a sanity bound against decompression bombs.
pub fn gunzip_svg(data: &[u8]) -> Option<Vec<u8>> {
    const MAX_DECOMPRESSED: u64 = 256 * 1024 * 1024;
    let mut decoder = flate2::read::GzDecoder::new(data).take(MAX_DECOMPRESSED);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}
