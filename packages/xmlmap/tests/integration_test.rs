//! End-to-end tests for the map ↔ XML codec.
//!
//! Covers both directions through the public API, round trips, and the
//! roxmltree import path.

use pretty_assertions::assert_eq;
use serde_json::json;

use xmlmap::{Config, Decoder, Encoder, Map, Value, XmlDocument, XmlMapError};

const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

fn map(json: serde_json::Value) -> Map {
    match Value::from(json) {
        Value::Map(map) => map,
        other => panic!("expected a map, got {other:?}"),
    }
}

fn encode(input: &Map) -> String {
    Encoder::new(Config::default())
        .build_xml_string(input)
        .unwrap_or_else(|e| panic!("encode failed: {e}"))
}

fn decode(xml: &str) -> Map {
    Decoder::new(Config::default())
        .build_from_str(xml)
        .unwrap_or_else(|e| panic!("decode failed: {e}"))
}

#[test]
fn test_round_trip() {
    let input = map(json!({
        "note": {
            "@attributes": {"id": "501", "lang": "nl"},
            "to": ["Tove", "Jani"],
            "from": "Bart",
            "body": {"@cdata": "1 < 2 & 3 > 2"},
            "meta": {"@value": "draft", "@attributes": {"rev": "3"}},
        }
    }));

    let xml = encode(&input);
    assert_eq!(decode(&xml), input);
}

#[test]
fn test_round_trip_is_idempotent() {
    // Booleans and numbers only survive as strings; after one pass the
    // output is stable.
    let input = map(json!({
        "table": {"name": "", "width": 80, "legs": {}, "round": true}
    }));

    let once = decode(&encode(&input));
    let twice = decode(&encode(&once));
    assert_eq!(once, twice);
    assert_eq!(
        Value::Map(once),
        Value::from(json!({"table": {"name": "", "width": "80", "legs": "", "round": "true"}}))
    );
}

#[test]
fn test_list_expansion_round_trip() {
    let input = map(json!({
        "note": {"to": [{"name": "n1", "file": "q"}, {"name": "n2", "file": "f"}]}
    }));

    let xml = encode(&input);
    assert_eq!(
        xml,
        format!("{DECL}<note><to><name>n1</name><file>q</file></to><to><name>n2</name><file>f</file></to></note>\n")
    );

    let decoded = decode(&xml);
    let to = decoded["note"].get("to").and_then(Value::as_list).unwrap();
    assert_eq!(to.len(), 2);
    assert_eq!(decoded, input);
}

#[test]
fn test_value_cdata_and_attributes_coexist() {
    let input = map(json!({
        "note": [{
            "to": "Tove",
            "from": "Jani",
            "heading": "Reminder",
            "body": {"@cdata": "I can use double dashes as much as I want (along with <, &, ', and \")"},
            "@value": "test",
            "@attributes": {"id": "501"},
        }]
    }));

    let xml = encode(&input);
    assert_eq!(
        xml,
        format!(
            "{DECL}<note id=\"501\">test<to>Tove</to><from>Jani</from><heading>Reminder</heading>\
             <body><![CDATA[I can use double dashes as much as I want (along with <, &, ', and \")]]></body></note>\n"
        )
    );

    // Text next to child elements wins over them when decoding.
    assert_eq!(
        Value::Map(decode(&xml)),
        Value::from(json!({"note": {"@value": "test", "@attributes": {"id": "501"}}}))
    );
}

#[test]
fn test_root_cardinality() {
    let encoder = Encoder::new(Config::default());

    for input in [json!({}), json!({"a": "1", "b": "2"}), json!({"a": ["1", "2"]})] {
        let err = encoder.build_xml(&map(input)).unwrap_err();
        assert!(matches!(err, XmlMapError::RootCardinality { .. }));
    }
}

#[test]
fn test_illegal_tag_name() {
    let err = Encoder::new(Config::default())
        .build_xml(&map(json!({"note": {"to": "Tove", "!WOW": "x"}})))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Illegal character in tag name. tag: !WOW in node: note"
    );
}

#[test]
fn test_namespaces_round_trip() {
    let xml = concat!(
        r#"<root xmlns:h="http://www.w3.org/TR/html4/">"#,
        r#"<h:table><h:td id="2">Apples</h:td><h:td>Bananas</h:td></h:table>"#,
        "</root>"
    );

    let without = decode(xml);
    assert!(without["root"].get("@attributes").is_none());

    let decoder = Decoder::new(Config::default().with_use_namespaces(true));
    let with = decoder.build_from_str(xml).unwrap();
    assert_eq!(
        with["root"].get("@attributes"),
        Some(&Value::from(json!({"xmlns:h": "http://www.w3.org/TR/html4/"})))
    );

    let encoded = encode(&with);
    assert!(encoded.contains(r#"<root xmlns:h="http://www.w3.org/TR/html4/">"#));
    assert_eq!(decoder.build_from_str(&encoded).unwrap(), with);
}

#[test]
fn test_formatted_output_decodes_the_same() {
    let input = map(json!({"note": {"to": "Tove", "cc": ["a", "b"], "body": {"@cdata": "x"}}}));
    let formatted = Encoder::new(Config::default().with_format_output(true))
        .build_xml_string(&input)
        .unwrap();

    assert!(formatted.contains("\n  <to>Tove</to>\n"));
    assert_eq!(decode(&formatted), input);
}

#[test]
fn test_malformed_input() {
    let decoder = Decoder::new(Config::default());

    let cases = [
        ("no_xml", "Start tag expected, '<' not found"),
        ("", "Document is empty"),
        ("<a></a><b/>", "Extra content at the end of the document"),
    ];
    for (input, expected) in cases {
        match decoder.build_from_str(input) {
            Err(XmlMapError::ParseError { message, .. }) => assert_eq!(message, expected),
            other => panic!("expected a parse error for {input:?}, got {other:?}"),
        }
    }

    assert!(matches!(
        decoder.build_from_str("<a><b></a>"),
        Err(XmlMapError::ParseError { .. })
    ));
}

#[test]
fn test_roxmltree_import() {
    let xml = r#"<table xmlns="https://www.w3schools.com/furniture"><name>African Coffee Table</name><width>80</width></table>"#;
    let doc = roxmltree::Document::parse(xml).unwrap();
    let imported = XmlDocument::from_roxmltree(&doc);

    let decoder = Decoder::new(Config::default().with_use_namespaces(true));
    assert_eq!(
        Value::Map(decoder.build_from_document(&imported)),
        Value::from(json!({
            "table": {
                "name": "African Coffee Table",
                "width": "80",
                "@attributes": {"xmlns": "https://www.w3schools.com/furniture"},
            }
        }))
    );
}

#[test]
fn test_parsed_document_reserializes() {
    let xml = format!("{DECL}<note id=\"1\"><to>Tove</to><body><![CDATA[a<b]]></body></note>\n");
    let doc = XmlDocument::parse(&xml, &Config::default()).unwrap();
    assert_eq!(doc.to_xml_string().unwrap(), xml);
}

#[test]
fn test_write_to_sink() {
    let doc = Encoder::new(Config::default())
        .build_xml(&map(json!({"a": "b"})))
        .unwrap();

    let mut sink = Vec::new();
    doc.write_to(&mut sink).unwrap();
    assert_eq!(String::from_utf8(sink).unwrap(), format!("{DECL}<a>b</a>\n"));
}

#[test]
fn test_shared_across_threads() {
    let encoder = std::sync::Arc::new(Encoder::new(Config::default()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let encoder = encoder.clone();
            std::thread::spawn(move || {
                encoder
                    .build_xml_string(&map(json!({"n": i})))
                    .unwrap_or_default()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let xml = handle.join().unwrap();
        assert!(xml.contains(&format!("<n>{i}</n>")));
    }
}

#[test]
fn test_line_endings_and_empty_lists() {
    assert_eq!(
        Value::Map(decode("<a x=\"1\r\n2\">one\r\ntwo\rthree</a>")),
        Value::from(json!({"a": {"@value": "one\ntwo\nthree", "@attributes": {"x": "1 2"}}}))
    );

    let input = map(json!({"a": {"b": []}}));
    let xml = encode(&input);
    assert_eq!(xml, format!("{DECL}<a><b/></a>\n"));
    assert_eq!(Value::Map(decode(&xml)), Value::from(json!({"a": {"b": ""}})));
}
