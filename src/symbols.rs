//! Symbol registry built from the glyph declarations in the document header.
//!
//! Articles cite glyphs with `<g ref="#id"/>`. The registry maps those ids
//! to display characters and tracks which ids were cited, keeping undeclared
//! ones with a null mapping so consumers can flag them.

use crate::model::Symbol;
use crate::tei::Element;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Placeholder returned when asked to resolve an empty id.
const REPLACEMENT: &str = "\u{FFFD}";

#[derive(Debug, Default, Clone)]
pub struct SymbolRegistry {
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `glyph` declaration in the document (normally inside
    /// `teiHeader/encodingDesc/charDecl`).
    pub fn from_document(root: &Element) -> Self {
        let mut registry = SymbolRegistry::new();
        for glyph in root.find_all("glyph") {
            match parse_glyph(glyph) {
                Some(symbol) => registry.declare(symbol),
                None => warn!("Skipping glyph declaration without xml:id"),
            }
        }
        debug!("Symbol registry holds {} declarations", registry.symbols.len());
        registry
    }

    pub fn declare(&mut self, symbol: Symbol) {
        if self.symbols.contains_key(&symbol.id) {
            warn!("Glyph '{}' declared more than once, keeping the first", symbol.id);
            return;
        }
        self.symbols.insert(symbol.id.clone(), symbol);
    }

    /// Count a citation of `id`. Returns `true` the first time an undeclared
    /// id is seen, so callers can report it exactly once.
    pub fn note_reference(&mut self, id: &str) -> bool {
        if let Some(symbol) = self.symbols.get_mut(id) {
            symbol.reference_count += 1;
            return false;
        }
        self.symbols.insert(
            id.to_string(),
            Symbol {
                id: id.to_string(),
                name: String::new(),
                description: String::new(),
                unicode: None,
                additional_mappings: BTreeMap::new(),
                graphic: None,
                declared: false,
                reference_count: 1,
            },
        );
        true
    }

    /// Display form of a symbol: its mapped character, else its name, else
    /// the id itself. Never empty.
    pub fn resolve(&self, id: &str) -> String {
        let id = id.trim_start_matches('#');
        if let Some(symbol) = self.symbols.get(id) {
            if let Some(ch) = symbol.unicode.as_deref().filter(|c| !c.is_empty()) {
                return ch.to_string();
            }
            if !symbol.name.trim().is_empty() {
                return symbol.name.trim().to_string();
            }
        }
        if id.is_empty() {
            REPLACEMENT.to_string()
        } else {
            id.to_string()
        }
    }

    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn is_declared(&self, id: &str) -> bool {
        self.symbols.get(id).is_some_and(|s| s.declared)
    }

    pub fn declared_count(&self) -> usize {
        self.symbols.values().filter(|s| s.declared).count()
    }

    /// Ids cited by records but never declared, sorted.
    pub fn undeclared(&self) -> Vec<&str> {
        self.symbols
            .values()
            .filter(|s| !s.declared)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn symbols(&self) -> &BTreeMap<String, Symbol> {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn parse_glyph(glyph: &Element) -> Option<Symbol> {
    let id = glyph
        .attr_trimmed("xml:id")
        .or_else(|| glyph.attr_trimmed("id"))?
        .to_string();

    let name = glyph
        .find("glyphName")
        .or_else(|| glyph.find("charName"))
        .map(|e| e.text())
        .unwrap_or_default();
    let description = glyph.find("desc").map(|e| e.text()).unwrap_or_default();

    let mut unicode = None;
    let mut additional_mappings = BTreeMap::new();
    for mapping in glyph.find_all("mapping") {
        let text = mapping.text();
        if text.is_empty() {
            continue;
        }
        let kind = mapping.attr_trimmed("type").unwrap_or("unknown");
        if kind.eq_ignore_ascii_case("unicode") && unicode.is_none() {
            unicode = parse_unicode_mapping(&text);
            if unicode.is_none() {
                warn!("Glyph '{}' has unparseable Unicode mapping '{}'", id, text);
            }
        } else {
            additional_mappings.entry(kind.to_string()).or_insert(text);
        }
    }

    let graphic = glyph
        .find("graphic")
        .and_then(|g| g.attr_trimmed("url"))
        .map(str::to_string);

    Some(Symbol {
        id,
        name,
        description,
        unicode,
        additional_mappings,
        graphic,
        declared: true,
        reference_count: 0,
    })
}

/// Convert a Unicode mapping to literal characters.
///
/// Accepts one or more space-separated code points written as `U+263F`,
/// `u+263f`, `0x263F` or `&#x263F;`, or the literal character(s) themselves.
pub fn parse_unicode_mapping(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if !tokens.iter().any(|t| code_point_digits(t).is_some()) {
        return Some(raw.to_string());
    }
    let mut out = String::new();
    for token in tokens {
        let digits = code_point_digits(token)?;
        let value = u32::from_str_radix(digits, 16).ok()?;
        out.push(char::from_u32(value)?);
    }
    Some(out)
}

fn code_point_digits(token: &str) -> Option<&str> {
    let lower = token.to_ascii_lowercase();
    let prefix_len = if lower.starts_with("u+") || lower.starts_with("0x") {
        2
    } else if lower.starts_with("&#x") {
        3
    } else {
        return None;
    };
    let digits = token[prefix_len..].trim_end_matches(';');
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::TeiDocument;
    use std::path::Path;

    fn registry(xml: &str) -> SymbolRegistry {
        let doc = TeiDocument::parse(xml.to_string(), Path::new("test.xml")).unwrap();
        SymbolRegistry::from_document(&doc.root)
    }

    const HEADER: &str = r##"<TEI><teiHeader><encodingDesc><charDecl>
        <glyph xml:id="mercury">
            <glyphName>Mercurius</glyphName>
            <desc>Planetary sign of <hi>quicksilver</hi></desc>
            <mapping type="Unicode">U+263F</mapping>
            <mapping type="standardized">Mercurius</mapping>
        </glyph>
        <glyph xml:id="sulphur">
            <glyphName>Sulphur</glyphName>
            <graphic url="img/sulphur.png"/>
        </glyph>
        <glyph xml:id="sol"><mapping type="Unicode">☉</mapping></glyph>
        <glyph><glyphName>anonymous</glyphName></glyph>
    </charDecl></encodingDesc></teiHeader><text><body/></text></TEI>"##;

    #[test]
    fn resolves_code_point_mapping() {
        let reg = registry(HEADER);
        assert_eq!(reg.resolve("mercury"), "\u{263F}");
        assert_eq!(reg.resolve("#mercury"), "\u{263F}");
    }

    #[test]
    fn literal_mapping_is_kept() {
        let reg = registry(HEADER);
        assert_eq!(reg.resolve("sol"), "☉");
    }

    #[test]
    fn falls_back_to_name_then_id() {
        let mut reg = registry(HEADER);
        assert_eq!(reg.resolve("sulphur"), "Sulphur");
        assert_eq!(reg.resolve("antimony"), "antimony");
        reg.note_reference("antimony");
        assert_eq!(reg.resolve("antimony"), "antimony");
    }

    #[test]
    fn resolve_never_returns_empty() {
        let reg = registry(HEADER);
        for id in ["", "#", "mercury", "sulphur", "unknown"] {
            assert!(!reg.resolve(id).is_empty(), "empty resolution for {id:?}");
        }
    }

    #[test]
    fn captures_description_and_extra_mappings() {
        let reg = registry(HEADER);
        let mercury = reg.get("mercury").unwrap();
        assert_eq!(mercury.name, "Mercurius");
        assert_eq!(mercury.description, "Planetary sign of quicksilver");
        assert_eq!(
            mercury.additional_mappings.get("standardized").map(String::as_str),
            Some("Mercurius")
        );
        let sulphur = reg.get("sulphur").unwrap();
        assert_eq!(sulphur.unicode, None);
        assert_eq!(sulphur.graphic.as_deref(), Some("img/sulphur.png"));
    }

    #[test]
    fn glyph_without_id_is_skipped() {
        let reg = registry(HEADER);
        assert_eq!(reg.declared_count(), 3);
    }

    #[test]
    fn undeclared_references_are_retained_once() {
        let mut reg = registry(HEADER);
        assert!(!reg.note_reference("mercury"));
        assert!(reg.note_reference("antimony"));
        assert!(!reg.note_reference("antimony"));

        assert_eq!(reg.undeclared(), vec!["antimony"]);
        let antimony = reg.get("antimony").unwrap();
        assert!(!antimony.declared);
        assert_eq!(antimony.unicode, None);
        assert_eq!(antimony.reference_count, 2);
        assert_eq!(reg.get("mercury").unwrap().reference_count, 1);
        assert!(reg.is_declared("mercury"));
        assert!(!reg.is_declared("antimony"));
    }

    #[test]
    fn unicode_mapping_forms() {
        assert_eq!(parse_unicode_mapping("U+263F").as_deref(), Some("\u{263F}"));
        assert_eq!(parse_unicode_mapping("u+2609 U+FE0E").as_deref(), Some("\u{2609}\u{FE0E}"));
        assert_eq!(parse_unicode_mapping("0x2640").as_deref(), Some("\u{2640}"));
        assert_eq!(parse_unicode_mapping("&#x2642;").as_deref(), Some("\u{2642}"));
        assert_eq!(parse_unicode_mapping("♄").as_deref(), Some("♄"));
        assert_eq!(parse_unicode_mapping("U+D800"), None);
        assert_eq!(parse_unicode_mapping("   "), None);
    }
}
