//! Codec behaviour across module boundaries

use reqrec::capture::{decompose, BodyClassifier, Classified, SequenceAllocator};
use reqrec::http::Headers;
use reqrec::record::{self, PartBody};
use reqrec::replay::compact_json;
use reqrec::replay::multipart::write_parts;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

const WINDOW: usize = 64 * 1024;

#[test]
fn test_header_fold_unfold() {
    let mut headers = Headers::new();
    headers.insert("Host", "example.com");
    headers.insert("Accept", "text/html");
    headers.insert("X-Trace", "a");
    headers.insert("accept", "application/json");
    headers.insert("X-Trace", "b");
    headers.insert("X-Trace", "c");

    let folded = record::fold(&headers);
    assert_eq!(folded.len(), 3);
    assert_eq!(
        folded.get("Accept").unwrap().values().to_vec(),
        vec!["text/html", "application/json"]
    );

    let unfolded = record::unfold(&folded);
    for name in ["Host", "Accept", "X-Trace"] {
        assert_eq!(unfolded.get_all(name), headers.get_all(name), "{}", name);
    }
    assert_eq!(unfolded.len(), headers.len());
}

#[test]
fn test_text_window_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = BodyClassifier::new(dir.path());

    let exact = vec![b'a'; WINDOW];
    match classifier.classify(&mut Cursor::new(&exact), "text/plain", "exact-body.dat").unwrap() {
        Classified::Text(text) => assert_eq!(text.len(), WINDOW),
        other => panic!("unexpected {:?}", other),
    }

    let over = vec![b'a'; WINDOW + 1];
    match classifier.classify(&mut Cursor::new(&over), "text/plain", "over-body.dat").unwrap() {
        Classified::File(name) => assert_eq!(fs::read(dir.path().join(name)).unwrap(), over),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_single_control_byte_spools() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = BodyClassifier::new(dir.path());

    let body = b"plain words\x07and more".to_vec();
    match classifier.classify(&mut Cursor::new(&body), "", "bell-body.dat").unwrap() {
        Classified::File(name) => {
            assert_eq!(name, "bell-body.dat");
            assert_eq!(fs::read(dir.path().join(name)).unwrap(), body);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_json_compaction() {
    let pretty = "{\n  \"name\": \"a b\",\n  \"list\": [ 1, 2.5, true, null ],\n  \"nested\": { \"k\": \"v \\\" q\" }\n}";
    let compact = compact_json(pretty);
    assert_eq!(
        compact,
        r#"{"name":"a b","list":[1,2.5,true,null],"nested":{"k":"v \" q"}}"#
    );
    let before: serde_json::Value = serde_json::from_str(pretty).unwrap();
    let after: serde_json::Value = serde_json::from_str(&compact).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_multipart_order_survives_reboundary() {
    let source = tempfile::tempdir().unwrap();
    let copy = tempfile::tempdir().unwrap();

    let body = b"--one\r\n\
Content-Disposition: form-data; name=\"tag\"\r\n\r\n\
first\r\n\
--one\r\n\
Content-Disposition: form-data; name=\"meta\"\r\nContent-Type: application/json\r\n\r\n\
{\"n\": 2}\r\n\
--one\r\n\
Content-Disposition: form-data; name=\"tag\"\r\n\r\n\
third\r\n\
--one--\r\n";

    let parts = decompose(&body[..], "one", &BodyClassifier::new(source.path()), "rec").unwrap();
    assert_eq!(parts.len(), 3);

    let mut wire = Vec::new();
    write_parts(&mut wire, &parts, "two", source.path()).unwrap();
    let again = decompose(&wire[..], "two", &BodyClassifier::new(copy.path()), "rec").unwrap();
    assert_eq!(again.len(), 3);

    for (index, (a, b)) in parts.iter().zip(&again).enumerate() {
        assert_eq!(a.header, b.header, "part {}", index);
        match (&a.body, &b.body) {
            (PartBody::File(x), PartBody::File(y)) => assert_eq!(
                fs::read(source.path().join(x)).unwrap(),
                fs::read(copy.path().join(y)).unwrap()
            ),
            (PartBody::Json(x), PartBody::Json(y)) => assert_eq!(x.get(), y.get()),
            other => panic!("part {} changed kind: {:?}", index, other),
        }
    }
    assert!(matches!(&again[1].body, PartBody::Json(raw) if raw.get() == "{\"n\": 2}"));
    assert_eq!(fs::read(copy.path().join("rec-multipart_1.dat")).unwrap(), b"third");
}

#[test]
fn test_sequence_continues_after_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("0007_20240101_000000_GET_a.json"), "{}").unwrap();
    fs::write(dir.path().join("0003_20240101_000000_GET_b.json"), "{}").unwrap();
    fs::write(dir.path().join("0007_20240101_000000_GET_a-body.dat"), "x").unwrap();

    let allocator = Arc::new(SequenceAllocator::for_dir(dir.path()).unwrap());
    assert_eq!(allocator.next(), 8);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let allocator = Arc::clone(&allocator);
            thread::spawn(move || (0..250).map(|_| allocator.next()).collect::<Vec<_>>())
        })
        .collect();
    let mut seen = HashSet::new();
    for handle in handles {
        for n in handle.join().unwrap() {
            assert!(n > 8);
            assert!(seen.insert(n), "duplicate {}", n);
        }
    }
    assert_eq!(seen.len(), 1000);
    assert_eq!(allocator.current(), 1008);
}
