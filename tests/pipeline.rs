use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tei_lexicon::{run, Config, Source};

const RULAND: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <encodingDesc><charDecl>
      <glyph xml:id="sulphur"><glyphName>Sulphur</glyphName><desc>Sign of brimstone</desc></glyph>
    </charDecl></encodingDesc>
  </teiHeader>
  <text><body>
    <pb n="1" facs="ruland/001.jpg"/>
    <entry xml:id="abc"><form type="lemma">Aqua Fortis</form>
      <sense><def>Aqua acris, quae metalla solvit.</def>
        <cit type="translation" xml:lang="de"><quote>Scheidwasser</quote></cit></sense>
    </entry>
    <entry xml:id="abc"><form type="lemma">Aqua Stygia</form><form type="variant">Aqua Fortis</form>
      <sense><def>Idem. Vide Aqua Fortis.</def></sense>
    </entry>
    <entry xml:id="empty"/>
    <pb n="2" facs="ruland/002.jpg"/>
    <entry n="42"><form type="lemma">Hydrargyrum</form>
      <sense>Metallum fluidum, vide Argentum vivum.</sense>
      <xr type="see"><lbl>vid.</lbl> <ref target="#s-azoth">Azoth</ref></xr>
    </entry>
    <entry><form type="lemma">Sulphur <g ref="#sulphur"/></form><def>vide Chrysocolla</def></entry>
    <entry><form type="lemma">12 ☿</form></entry>
  </body></text>
</TEI>"##;

const SOMMERHOFF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <encodingDesc><charDecl>
      <glyph xml:id="mercury"><glyphName>Mercurius</glyphName><mapping type="Unicode">U+263F</mapping></glyph>
    </charDecl></encodingDesc>
  </teiHeader>
  <text><body>
    <entry xml:id="s-argentum"><form type="lemma">Argentum vivum</form>
      <sense><g ref="#mercury"/> Mercurius. <lang>Germ.</lang> Quecksilber</sense>
    </entry>
    <entry xml:id="s-azoth"><form type="lemma">Azoth</form>
      <note>1. Mercurius philosophorum, <g ref="#antimony"/>.</note>
    </entry>
    <entry><sense><def>No headword here.</def></sense></entry>
  </body></text>
</TEI>"##;

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let ruland = dir.join("Ruland.xml");
    fs::write(&ruland, RULAND).unwrap();

    let sommerhoff = dir.join("Sommerhoff.xml.bz2");
    let mut encoder = BzEncoder::new(fs::File::create(&sommerhoff).unwrap(), Compression::best());
    encoder.write_all(SOMMERHOFF.as_bytes()).unwrap();
    encoder.finish().unwrap();

    (ruland, sommerhoff)
}

fn config() -> Config {
    Config {
        show_progress: false,
        threads: 2,
        ..Config::default()
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn converts_both_collections() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let out = dir.path().join("out");

    let artifacts = run(&ruland, &sommerhoff, &out, &config()).unwrap();
    assert!(artifacts.failures.is_empty());

    let r = artifacts.collection(Source::Ruland).unwrap();
    assert_eq!(r.stats.total_articles, 6);
    assert_eq!(r.stats.extracted, 5);
    assert_eq!(r.stats.skipped, 1);
    let ids: Vec<_> = r.records.iter().map(|rec| rec.id.as_str()).collect();
    assert_eq!(ids, vec!["abc", "abc~dup1", "42", "ruland:4", "ruland:5"]);

    let s = artifacts.collection(Source::Sommerhoff).unwrap();
    assert_eq!(s.stats.extracted + s.stats.skipped, s.stats.total_articles);
    assert_eq!(s.stats.skipped, 1);
    assert_eq!(s.stats.undeclared_symbols, 1);
}

#[test]
fn record_fields_survive_serialization() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let out = dir.path().join("out");
    run(&ruland, &sommerhoff, &out, &config()).unwrap();

    let records = read_json(&out.join("ruland_dictionary.json"));
    let first = &records[0];
    assert_eq!(first["lemma"], "Aqua Fortis");
    assert_eq!(first["lemma_norm"], "aqua fortis");
    assert_eq!(first["letter"], "A");
    assert_eq!(first["page"], "1");
    assert_eq!(first["translations"][0]["text"], "Scheidwasser");
    assert_eq!(first["translations"][0]["lang"], "de");
    assert!(first["raw_markup"].as_str().unwrap().starts_with(r#"<entry xml:id="abc">"#));

    let hydrargyrum = &records[2];
    assert_eq!(hydrargyrum["page"], "2");
    assert_eq!(hydrargyrum["facs"], "ruland/002.jpg");
    assert_eq!(hydrargyrum["explicit_references"][0]["resolved"], "s-azoth");
    assert_eq!(hydrargyrum["explicit_references"][0]["resolved_source"], "sommerhoff");

    let sommer = read_json(&out.join("sommerhoff_dictionary.json"));
    assert_eq!(sommer[0]["symbols"][0], "mercury");
    assert_eq!(sommer[0]["translations"][0]["style"], "lang-germ");
    assert_eq!(sommer[1]["notes"][0]["number"], "1");
}

#[test]
fn reference_graph_is_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let out = dir.path().join("out");
    run(&ruland, &sommerhoff, &out, &config()).unwrap();

    let mut known = HashSet::new();
    for s in ["ruland", "sommerhoff"] {
        for rec in read_json(&out.join(format!("{s}_dictionary.json"))).as_array().unwrap() {
            known.insert((s.to_string(), rec["id"].as_str().unwrap().to_string()));
        }
    }

    let edges = read_json(&out.join("reference_graph.json"));
    let edges = edges.as_array().unwrap();
    for edge in edges {
        let source = edge["source"].as_str().unwrap().to_string();
        assert!(known.contains(&(source, edge["source_id"].as_str().unwrap().to_string())));
        if let Some(target) = edge["target_id"].as_str() {
            let target_source = edge["target_source"].as_str().unwrap().to_string();
            assert!(known.contains(&(target_source, target.to_string())), "{edge}");
        }
    }

    let find = |label: &str| {
        edges
            .iter()
            .find(|e| e["label"] == label)
            .unwrap_or_else(|| panic!("no edge labelled {label}"))
    };
    // Cross-collection textual match
    let vide = find("vide Argentum vivum");
    assert_eq!(vide["edge_type"], "textual-vide");
    assert_eq!(vide["target_source"], "sommerhoff");
    assert_eq!(vide["target_id"], "s-argentum");
    // Same-collection match
    assert_eq!(find("Vide Aqua Fortis")["target_id"], "abc");
    // Dangling observation kept
    assert!(find("vide Chrysocolla")["target_id"].is_null());
    // Explicit link by id into the companion collection
    let xr = find("vid. Azoth");
    assert_eq!(xr["edge_type"], "explicit-xref");
    assert_eq!(xr["target_id"], "s-azoth");
    // Variant of the duplicate points back at the first record
    let variant = find("Aqua Fortis");
    assert_eq!(variant["edge_type"], "variant");
    assert_eq!(variant["source_id"], "abc~dup1");
    assert_eq!(variant["target_id"], "abc");
}

#[test]
fn letter_partitions_and_master_index() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let out = dir.path().join("out");
    run(&ruland, &sommerhoff, &out, &config()).unwrap();

    let master = read_json(&out.join("ruland_letter_index.json"));
    let letters = master["letters"].as_object().unwrap();
    assert_eq!(letters.len(), 26);
    let sum: u64 = letters.values().map(|b| b["count"].as_u64().unwrap()).sum();
    // "12 ☿" has no alphabetic character
    assert_eq!(sum, 4);
    assert_eq!(master["unindexed"], 1);
    assert_eq!(master["total_entries"], 5);
    assert_eq!(master["letters"]["A"]["entries"], serde_json::json!(["abc", "abc~dup1"]));

    for letter in letters.keys() {
        let part = out.join(format!("ruland_index_{}.json", letter.to_lowercase()));
        assert!(part.exists(), "missing {}", part.display());
    }
    let a = read_json(&out.join("ruland_index_a.json"));
    assert_eq!(a[1]["lemma"], "Aqua Stygia");
    assert_eq!(read_json(&out.join("ruland_index_z.json")), serde_json::json!([]));
}

#[test]
fn symbols_metadata_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let out = dir.path().join("out");
    run(&ruland, &sommerhoff, &out, &config()).unwrap();

    let symbols = read_json(&out.join("sommerhoff_symbols.json"));
    assert_eq!(symbols["mercury"]["unicode"], "\u{263F}");
    assert_eq!(symbols["mercury"]["reference_count"], 1);
    assert_eq!(symbols["antimony"]["declared"], false);
    assert!(symbols["antimony"]["unicode"].is_null());

    let metadata = read_json(&out.join("dictionary_metadata.json"));
    assert_eq!(metadata["collections"]["ruland"]["year"], 1612);
    assert_eq!(metadata["collections"]["ruland"]["record_count"], 5);
    assert_eq!(metadata["collections"]["sommerhoff"]["symbol_count"], 1);

    let report = read_json(&out.join("conversion_report.json"));
    assert_eq!(report["collections"][0]["source"], "ruland");
    assert_eq!(report["collections"][0]["skipped"], 1);
    assert_eq!(report["collections"][0]["duplicate_ids"], 1);
    assert_eq!(report["collections"][0]["unresolved_references"], 1);

    let search = read_json(&out.join("sommerhoff_search_index.json"));
    assert_eq!(search["documents"].as_array().unwrap().len(), 2);
    assert!(search["index"]["quecksilber"]["translations"].is_array());
}

#[test]
fn reruns_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, sommerhoff) = write_inputs(dir.path());
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let one_thread = Config {
        threads: 1,
        ..config()
    };
    let a = run(&ruland, &sommerhoff, &first, &config()).unwrap();
    run(&ruland, &sommerhoff, &second, &one_thread).unwrap();

    let mut names: Vec<_> = fs::read_dir(&first)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert!(names.len() >= 2 * 29 + 3);
    for name in names {
        let x = fs::read(first.join(&name)).unwrap();
        let y = fs::read(second.join(&name)).unwrap();
        assert!(x == y, "{:?} differs between runs", name);
    }
    assert_eq!(a.collections.len(), 2);
}

#[test]
fn malformed_document_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (ruland, _) = write_inputs(dir.path());
    let broken = dir.path().join("Sommerhoff.xml");
    fs::write(&broken, "<TEI><text><entry></text></TEI>").unwrap();
    let out = dir.path().join("out");

    let artifacts = run(&ruland, &broken, &out, &config()).unwrap();
    assert_eq!(artifacts.failures.len(), 1);
    assert_eq!(artifacts.failures[0].source, Source::Sommerhoff);
    assert!(out.join("ruland_dictionary.json").exists());
    assert!(!out.join("sommerhoff_dictionary.json").exists());
    let report = read_json(&out.join("conversion_report.json"));
    assert_eq!(report["failures"][0]["source"], "sommerhoff");
}
