//! Record extraction.
//!
//! An article subtree is first flattened into a list of typed fragments in
//! document order, then folded into an [`Article`] by [`reduce`]. Optional,
//! repeated and reordered sub-elements therefore need no special casing in
//! the walker: it only classifies what it sees.

use crate::model::{
    ExplicitReference, FormRole, GlossContext, Note, Record, Source, TextualReference, Translation,
};
use crate::normalize::{collapse_whitespace, index_letter, normalize_lemma};
use crate::tei::{Element, Node, TeiDocument};
use crate::xref::ReferenceScanner;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

lazy_static! {
    // "12. text" or "12 text" at the start of a note
    static ref NOTE_NUMBER: Regex = Regex::new(r"^(\d+)[.\s]+").unwrap();
    static ref GERMAN_MARKER: Regex = Regex::new(r"(?i)^germ\.?$").unwrap();
}

/// Element names treated as one dictionary article.
const ARTICLE_ELEMENTS: &[&str] = &["entry", "entryFree"];

/// Where an article sits in its document.
#[derive(Debug, Clone)]
pub struct EntrySite<'a> {
    pub element: &'a Element,
    /// `n` of the nearest preceding page break
    pub page: Option<String>,
    /// `facs` of the nearest preceding page break
    pub facs: Option<String>,
}

/// Find every article in document order, with its pagination context.
/// Articles nested inside another article belong to the outer one.
pub fn locate_entries(root: &Element) -> Vec<EntrySite<'_>> {
    let mut sites = Vec::new();
    let mut cursor = PageCursor::default();
    visit(root, &mut cursor, &mut sites);
    sites
}

#[derive(Debug, Default)]
struct PageCursor {
    page: Option<String>,
    facs: Option<String>,
}

impl PageCursor {
    fn advance(&mut self, pb: &Element) {
        self.page = pb.attr_trimmed("n").map(str::to_string);
        self.facs = pb.attr_trimmed("facs").map(str::to_string);
    }
}

fn visit<'a>(el: &'a Element, cursor: &mut PageCursor, sites: &mut Vec<EntrySite<'a>>) {
    for child in el.child_elements() {
        if ARTICLE_ELEMENTS.contains(&child.name.as_str()) {
            sites.push(EntrySite {
                element: child,
                page: cursor.page.clone(),
                facs: cursor.facs.clone(),
            });
            // Breaks inside an article still move the cursor for later ones
            for pb in child.find_all("pb") {
                cursor.advance(pb);
            }
        } else if child.is("pb") {
            cursor.advance(child);
        } else if !child.is("teiHeader") {
            visit(child, cursor, sites);
        }
    }
}

/// Typed pieces of an article, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Headword { role: FormRole, text: String },
    Definition(String),
    Gloss(Translation),
    Note(Note),
    Symbol(String),
    CrossRef(ExplicitReference),
}

/// A reduced article, before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// 0-based position among the collection's articles
    pub position: usize,
    /// `xml:id`, else `n`, when present
    pub preferred_id: Option<String>,
    pub lemma: String,
    pub lemma_type: FormRole,
    pub entry_type: Option<String>,
    pub variants: Vec<String>,
    pub translations: Vec<Translation>,
    pub definition: String,
    pub notes: Vec<Note>,
    pub symbols: Vec<String>,
    pub explicit_references: Vec<ExplicitReference>,
    pub textual_references: Vec<TextualReference>,
    pub page: Option<String>,
    pub facs: Option<String>,
    pub raw_markup: String,
}

impl Article {
    pub fn into_record(self, source: Source, id: String) -> Record {
        Record {
            id,
            source,
            lemma_norm: normalize_lemma(&self.lemma),
            letter: index_letter(&self.lemma),
            lemma: self.lemma,
            lemma_type: self.lemma_type,
            entry_type: self.entry_type,
            variants: self.variants,
            translations: self.translations,
            definition: self.definition,
            notes: self.notes,
            symbols: self.symbols,
            explicit_references: self.explicit_references,
            textual_references: self.textual_references,
            page: self.page,
            facs: self.facs,
            raw_markup: self.raw_markup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The article has no content at all
    Empty,
    /// Content, but no headword with text
    NoHeadword,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Empty => f.write_str("empty article"),
            SkipReason::NoHeadword => f.write_str("no recognizable headword"),
        }
    }
}

/// An article excluded from the output.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedArticle {
    pub position: usize,
    pub preferred_id: Option<String>,
    pub reason: SkipReason,
}

pub struct Extractor<'a> {
    scanner: &'a ReferenceScanner,
}

impl<'a> Extractor<'a> {
    pub fn new(scanner: &'a ReferenceScanner) -> Self {
        Extractor { scanner }
    }

    pub fn extract(
        &self,
        doc: &TeiDocument,
        site: &EntrySite,
        position: usize,
    ) -> Result<Article, SkippedArticle> {
        let entry = site.element;
        let preferred_id = entry
            .attr_trimmed("xml:id")
            .or_else(|| entry.attr_trimmed("n"))
            .map(str::to_string);

        let fragments = self.fragments(entry);
        let folded = reduce(fragments).map_err(|reason| SkippedArticle {
            position,
            preferred_id: preferred_id.clone(),
            reason,
        })?;

        let textual_references = self.textual_references(&folded);
        Ok(Article {
            position,
            preferred_id,
            lemma: folded.lemma,
            lemma_type: folded.lemma_type,
            entry_type: entry.attr_trimmed("type").map(str::to_string),
            variants: folded.variants,
            translations: folded.translations,
            definition: folded.definition,
            notes: folded.notes,
            symbols: folded.symbols,
            explicit_references: folded.explicit_references,
            textual_references,
            page: site.page.clone(),
            facs: site.facs.clone(),
            raw_markup: doc.source_of(entry).to_string(),
        })
    }

    /// Flatten an article subtree into fragments.
    pub fn fragments(&self, entry: &Element) -> Vec<Fragment> {
        let mut walker = Walker::new(self.scanner);
        walker.walk(entry);
        walker.flush();
        walker.fragments
    }

    fn textual_references(&self, folded: &Folded) -> Vec<TextualReference> {
        // Prose that repeats an explicit link is not a second reference
        let mut seen: HashSet<String> = folded
            .explicit_references
            .iter()
            .flat_map(|r| [r.target.as_deref(), Some(r.text.as_str())])
            .flatten()
            .map(normalize_lemma)
            .collect();

        let texts = std::iter::once(folded.definition.as_str())
            .chain(folded.notes.iter().map(|n| n.text.as_str()));
        let mut out = Vec::new();
        for text in texts {
            for reference in self.scanner.scan(text) {
                if seen.insert(normalize_lemma(&reference.phrase)) {
                    out.push(reference);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProseKind {
    Definition,
    /// Text following an inline `Germ.` language marker
    German,
}

struct Walker<'s> {
    scanner: &'s ReferenceScanner,
    fragments: Vec<Fragment>,
    prose: String,
    kind: ProseKind,
    context: GlossContext,
}

impl<'s> Walker<'s> {
    fn new(scanner: &'s ReferenceScanner) -> Self {
        Walker {
            scanner,
            fragments: Vec::new(),
            prose: String::new(),
            kind: ProseKind::Definition,
            context: GlossContext::Entry,
        }
    }

    fn walk(&mut self, el: &Element) {
        for child in &el.children {
            match child {
                Node::Text(t) => self.prose.push_str(t),
                Node::Element(e) => self.element(e),
            }
        }
    }

    fn element(&mut self, e: &Element) {
        match e.name.as_str() {
            "form" | "orth" => {
                self.flush();
                let text = text_without(e, is_gloss);
                if !text.is_empty() {
                    self.fragments.push(Fragment::Headword {
                        role: FormRole::from_type_attr(e.attr("type")),
                        text,
                    });
                }
                self.nested_glosses(e);
                self.inline_markup(e);
            }
            "def" => {
                self.flush();
                let text = text_without(e, is_gloss);
                if has_content(&text) {
                    self.fragments.push(Fragment::Definition(text));
                }
                self.nested_glosses(e);
                self.inline_markup(e);
            }
            "cit" if is_gloss(e) => {
                self.flush();
                for gloss in glosses(e, self.context) {
                    self.fragments.push(Fragment::Gloss(gloss));
                }
            }
            "note" => {
                self.flush();
                self.note(e);
            }
            "xr" => {
                self.flush();
                self.fragments.push(Fragment::CrossRef(cross_reference(e)));
                self.symbols(e);
            }
            "ref" => {
                if let Some(reference) = standalone_reference(e) {
                    self.fragments.push(Fragment::CrossRef(reference));
                }
                e.push_text(&mut self.prose);
            }
            "g" => {
                if let Some(id) = symbol_ref(e) {
                    self.fragments.push(Fragment::Symbol(id));
                }
                e.push_text(&mut self.prose);
            }
            "lang" => {
                self.flush();
                self.kind = if GERMAN_MARKER.is_match(&e.text()) {
                    ProseKind::German
                } else {
                    ProseKind::Definition
                };
            }
            "sense" | "dictScrap" => {
                self.flush();
                let saved = (self.context, self.kind);
                self.context = GlossContext::Sense;
                self.walk(e);
                self.flush();
                (self.context, self.kind) = saved;
            }
            _ if e.is_break() => self.prose.push(' '),
            _ => self.walk(e),
        }
    }

    /// Emit the pending prose as a definition or an inline gloss.
    fn flush(&mut self) {
        let text = collapse_whitespace(&std::mem::take(&mut self.prose));
        if !has_content(&text) {
            return;
        }
        match self.kind {
            ProseKind::Definition => self.fragments.push(Fragment::Definition(text)),
            ProseKind::German => {
                // The gloss ends where a "see" marker starts
                let (gloss, rest) = match self.scanner.find_marker(&text) {
                    Some(at) => text.split_at(at),
                    None => (text.as_str(), ""),
                };
                let gloss = gloss.trim().trim_matches(|c| matches!(c, ',' | ';' | ':')).trim();
                if has_content(gloss) {
                    self.fragments.push(Fragment::Gloss(Translation {
                        text: gloss.to_string(),
                        lang: Some("de".to_string()),
                        style: Some("lang-germ".to_string()),
                        context: self.context,
                    }));
                }
                if has_content(rest) {
                    self.fragments.push(Fragment::Definition(rest.trim().to_string()));
                }
            }
        }
    }

    fn note(&mut self, note: &Element) {
        let nested = glosses_within(note, GlossContext::Note);
        let mut text = text_without(note, is_gloss);
        let mut number = note.attr_trimmed("n").map(str::to_string);
        if let Some(caps) = NOTE_NUMBER.captures(&text) {
            let digits = caps[1].to_string();
            text = text[caps[0].len()..].trim().to_string();
            number.get_or_insert(digits);
        }
        let translations = nested.iter().map(|t| t.text.clone()).collect();
        if has_content(&text) || !nested.is_empty() {
            self.fragments.push(Fragment::Note(Note {
                number,
                text,
                translations,
            }));
        }
        for gloss in nested {
            self.fragments.push(Fragment::Gloss(gloss));
        }
        self.inline_markup(note);
    }

    fn nested_glosses(&mut self, el: &Element) {
        for gloss in glosses_within(el, self.context) {
            self.fragments.push(Fragment::Gloss(gloss));
        }
    }

    /// Symbols and references inside an element consumed as one text block.
    fn inline_markup(&mut self, el: &Element) {
        for xr in outermost(el, |e| e.is("xr"), |_| false) {
            self.fragments.push(Fragment::CrossRef(cross_reference(xr)));
        }
        // A ref inside an xr is already part of that xr's reference
        for r in outermost(el, |e| e.is("ref"), |e| e.is("xr")) {
            if let Some(reference) = standalone_reference(r) {
                self.fragments.push(Fragment::CrossRef(reference));
            }
        }
        self.symbols(el);
    }

    fn symbols(&mut self, el: &Element) {
        for g in el.find_all("g") {
            if let Some(id) = symbol_ref(g) {
                self.fragments.push(Fragment::Symbol(id));
            }
        }
    }
}

fn has_content(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn is_gloss(el: &Element) -> bool {
    el.is("cit")
        && (el
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("translation"))
            || el.attr_trimmed("xml:lang").is_some())
}

fn style_of(el: &Element) -> Option<String> {
    el.attr_trimmed("rend")
        .or_else(|| el.attr_trimmed("style"))
        .map(str::to_string)
}

/// One gloss per `quote` of a translation `cit`, or the whole cit when it
/// has no quotes.
fn glosses(cit: &Element, context: GlossContext) -> Vec<Translation> {
    let lang = cit.attr_trimmed("xml:lang");
    let style = style_of(cit);
    let quotes = cit.find_all("quote");
    if quotes.is_empty() {
        let text = cit.text();
        if !has_content(&text) {
            return Vec::new();
        }
        return vec![Translation {
            text,
            lang: lang.map(str::to_string),
            style,
            context,
        }];
    }
    quotes
        .into_iter()
        .map(|q| (q, q.text()))
        .filter(|(_, text)| has_content(text))
        .map(|(q, text)| Translation {
            text,
            lang: q.attr_trimmed("xml:lang").or(lang).map(str::to_string),
            style: style_of(q).or_else(|| style.clone()),
            context,
        })
        .collect()
}

fn glosses_within(el: &Element, context: GlossContext) -> Vec<Translation> {
    outermost(el, is_gloss, |_| false)
        .into_iter()
        .flat_map(|cit| glosses(cit, context))
        .collect()
}

/// Descendants matching `wanted`, not looking inside a match or inside a
/// subtree matching `barrier`.
fn outermost(el: &Element, wanted: fn(&Element) -> bool, barrier: fn(&Element) -> bool) -> Vec<&Element> {
    fn visit<'a>(
        el: &'a Element,
        wanted: fn(&Element) -> bool,
        barrier: fn(&Element) -> bool,
        out: &mut Vec<&'a Element>,
    ) {
        for child in el.child_elements() {
            if wanted(child) {
                out.push(child);
            } else if !barrier(child) {
                visit(child, wanted, barrier, out);
            }
        }
    }
    let mut out = Vec::new();
    visit(el, wanted, barrier, &mut out);
    out
}

fn target_of(el: &Element) -> Option<String> {
    el.attr_trimmed("target")
        .map(|t| t.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

fn cross_reference(xr: &Element) -> ExplicitReference {
    let label = xr.find("lbl").map(|l| l.text()).filter(|l| !l.is_empty());
    let inner = xr.find("ref");
    let target = inner.and_then(target_of).or_else(|| target_of(xr));
    let text = match inner {
        Some(r) => r.text(),
        None => text_without(xr, |e| e.is("lbl")),
    };
    ExplicitReference {
        ref_type: xr.attr_trimmed("type").unwrap_or("xr").to_string(),
        target,
        label,
        text,
        resolved: None,
        resolved_source: None,
    }
}

/// A `ref` outside any `xr`; only targeted ones count as references.
fn standalone_reference(r: &Element) -> Option<ExplicitReference> {
    let target = target_of(r)?;
    Some(ExplicitReference {
        ref_type: r.attr_trimmed("type").unwrap_or("ref").to_string(),
        target: Some(target),
        label: None,
        text: r.text(),
        resolved: None,
        resolved_source: None,
    })
}

fn symbol_ref(g: &Element) -> Option<String> {
    g.attr_trimmed("ref")
        .map(|r| r.trim_start_matches('#').to_string())
        .filter(|r| !r.is_empty())
}

/// Descendant text, with subtrees matching `skip` left out.
fn text_without(el: &Element, skip: fn(&Element) -> bool) -> String {
    fn push(el: &Element, skip: fn(&Element) -> bool, buf: &mut String) {
        for child in &el.children {
            match child {
                Node::Text(t) => buf.push_str(t),
                Node::Element(e) if skip(e) || e.is_break() => buf.push(' '),
                Node::Element(e) => push(e, skip, buf),
            }
        }
    }
    let mut buf = String::new();
    push(el, skip, &mut buf);
    collapse_whitespace(&buf)
}

/// Result of folding the fragment list.
#[derive(Debug, Clone, PartialEq)]
pub struct Folded {
    pub lemma: String,
    pub lemma_type: FormRole,
    pub variants: Vec<String>,
    pub translations: Vec<Translation>,
    pub definition: String,
    pub notes: Vec<Note>,
    pub symbols: Vec<String>,
    pub explicit_references: Vec<ExplicitReference>,
}

/// Fold fragments into article fields.
///
/// The first `lemma` form is the headword, else the first `phrase` form,
/// else the first form of any other role. Every other form is a variant.
pub fn reduce(fragments: Vec<Fragment>) -> Result<Folded, SkipReason> {
    if fragments.is_empty() {
        return Err(SkipReason::Empty);
    }

    let mut headwords = Vec::new();
    let mut definitions = Vec::new();
    let mut translations = Vec::new();
    let mut notes = Vec::new();
    let mut symbols: Vec<String> = Vec::new();
    let mut explicit_references = Vec::new();

    for fragment in fragments {
        match fragment {
            Fragment::Headword { role, text } => headwords.push((role, text)),
            Fragment::Definition(text) => definitions.push(text),
            Fragment::Gloss(t) => translations.push(t),
            Fragment::Note(n) => notes.push(n),
            Fragment::Symbol(id) => {
                if !symbols.contains(&id) {
                    symbols.push(id);
                }
            }
            Fragment::CrossRef(r) => explicit_references.push(r),
        }
    }

    let primary = [FormRole::Lemma, FormRole::Phrase]
        .iter()
        .find_map(|wanted| headwords.iter().position(|(role, _)| role == wanted))
        .or(if headwords.is_empty() { None } else { Some(0) })
        .ok_or(SkipReason::NoHeadword)?;
    let (lemma_type, lemma) = headwords.remove(primary);

    let mut variants: Vec<String> = Vec::new();
    for (_, text) in headwords {
        if text != lemma && !variants.contains(&text) {
            variants.push(text);
        }
    }

    Ok(Folded {
        lemma,
        lemma_type,
        variants,
        translations,
        definition: collapse_whitespace(&definitions.join(" ")),
        notes,
        symbols,
        explicit_references,
    })
}
