//! End-to-end processing of in-memory EPUB archives

use std::io::{Cursor, Write};

use epub_inliner::output::{write_book, SUMMARY_FILE};
use epub_inliner::{Config, EpubError, EpubProcessor, FileContent, Progress};
use zip::{write::SimpleFileOptions, ZipWriter};

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">inline-test-001</dc:identifier>
    <dc:title>Inline Test</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="c2" href="chap2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="chap1.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="css/main.css" media-type="text/css"/>
    <item id="cover" href="img/cover.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

const CHAP1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>One</title><link href="css/main.css" rel="stylesheet" type="text/css"/></head>
<body><img src="img/cover.jpg" alt="cover"/></body>
</html>"#;

const CHAP2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Two</title></head>
<body><p>Undeclared art:</p><img src="img/extra.png"/></body>
</html>"#;

const CSS: &str = "body { background: url('../img/cover.jpg') }";

const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0];
const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

fn build_epub(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (name, data) in files {
            let options = if *name == "mimetype" { stored } else { deflated };
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

fn sample_files() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("mimetype", b"application/epub+zip".as_slice()),
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", OPF.as_bytes()),
        ("OEBPS/chap1.xhtml", CHAP1.as_bytes()),
        ("OEBPS/chap2.xhtml", CHAP2.as_bytes()),
        ("OEBPS/css/main.css", CSS.as_bytes()),
        ("OEBPS/img/cover.jpg", JPEG),
        ("OEBPS/img/extra.png", PNG),
    ]
}

fn sample_epub() -> Vec<u8> {
    build_epub(&sample_files())
}

#[test]
fn test_end_to_end_inlining() {
    let data = sample_epub();
    let mut progress = Vec::new();

    let book = EpubProcessor::default()
        .process(&data, |p| progress.push(p))
        .expect("sample package processes");

    let chap1 = book.files.text("OEBPS/chap1.xhtml").unwrap();
    assert!(chap1.contains(r#"src="data:image/jpeg;base64,/9j/4A==""#));
    assert!(chap1.contains(r#"<style type="text/css" data-orig-href="css/main.css">"#));
    assert!(chap1.contains("url(data:image/jpeg;base64,/9j/4A==)"));
    assert!(!chap1.contains("<link"));

    assert_eq!(
        book.files.text("OEBPS/css/main.css"),
        Some("body { background: url(data:image/jpeg;base64,/9j/4A==) }")
    );

    // not declared in the manifest: typed image/png from its extension
    let chap2 = book.files.text("OEBPS/chap2.xhtml").unwrap();
    assert!(chap2.contains(r#"src="data:image/png;base64,iVBORw==""#));
    assert_eq!(
        book.files.get("OEBPS/img/extra.png"),
        Some(&FileContent::Embedded("data:image/png;base64,iVBORw==".to_string()))
    );

    assert_eq!(book.report.references_embedded, 3);
    assert_eq!(book.report.links_inlined, 1);
    assert_eq!(book.report.references_missing, 0);
}

#[test]
fn test_progress_sequence() {
    let data = sample_epub();
    let mut progress = Vec::new();

    EpubProcessor::default()
        .process(&data, |p| progress.push(p))
        .unwrap();

    let names: Vec<&str> = sample_files().iter().map(|(name, _)| *name).collect();
    let mut expected = vec![
        Progress::Opening,
        Progress::Opened {
            entries: names.len(),
        },
    ];
    expected.extend(names.iter().map(|name| Progress::Decoded {
        name: name.to_string(),
    }));
    expected.extend([Progress::PackageRead, Progress::PostProcessing, Progress::Finished]);

    assert_eq!(progress, expected);

    let codes: Vec<i32> = progress.iter().map(Progress::code).collect();
    assert_eq!(&codes[..2], &[1, 1]);
    assert!(codes[2..2 + names.len()].iter().all(|&code| code == 2));
    assert_eq!(&codes[2 + names.len()..], &[3, 4, 5]);
}

#[test]
fn test_package_model() {
    let book = EpubProcessor::default()
        .process(&sample_epub(), |_| {})
        .unwrap();

    assert_eq!(book.package.path(), "OEBPS/content.opf");
    assert_eq!(book.package.metadata_text("dc:title"), Some("Inline Test"));
    assert_eq!(book.package.spine(), ["c1", "c2"]);

    let chapters: Vec<&str> = book
        .chapters()
        .map(|(_, item, _)| item.unwrap().href.as_str())
        .collect();
    assert_eq!(chapters, vec!["OEBPS/chap1.xhtml", "OEBPS/chap2.xhtml"]);

    assert_eq!(book.meta.mimetype.as_deref(), Some("application/epub+zip"));
    assert_eq!(book.meta.container_xml.as_deref(), Some(CONTAINER));
    assert!(!book.files.contains("mimetype"));
    assert!(!book.files.contains("META-INF/container.xml"));
    // the package document stays text even though it is not in the manifest
    assert_eq!(book.files.text("OEBPS/content.opf"), Some(OPF));
}

#[test]
fn test_invalid_mimetype_rejected() {
    let mut files = sample_files();
    files[0] = ("mimetype", b"text/plain".as_slice());

    let mut codes = Vec::new();
    let result = EpubProcessor::default().process(&build_epub(&files), |p| codes.push(p.code()));

    assert!(matches!(result, Err(EpubError::InvalidMimetype(found)) if found == "text/plain"));
    assert!(!codes.contains(&-1));
}

#[test]
fn test_validation_can_be_disabled() {
    let files: Vec<_> = sample_files()
        .into_iter()
        .filter(|(name, _)| *name != "mimetype")
        .collect();
    let data = build_epub(&files);

    assert!(matches!(
        EpubProcessor::default().process(&data, |_| {}),
        Err(EpubError::MissingMimetype)
    ));

    let lenient = EpubProcessor::new(Config {
        validate: false,
        ..Config::default()
    });
    let book = lenient.process(&data, |_| {}).unwrap();
    assert!(book.meta.mimetype.is_none());
}

#[test]
fn test_missing_container() {
    let files: Vec<_> = sample_files()
        .into_iter()
        .filter(|(name, _)| *name != "META-INF/container.xml")
        .collect();

    assert!(matches!(
        EpubProcessor::default().process(&build_epub(&files), |_| {}),
        Err(EpubError::MissingContainer)
    ));
}

#[test]
fn test_missing_package_document() {
    let files: Vec<_> = sample_files()
        .into_iter()
        .filter(|(name, _)| *name != "OEBPS/content.opf")
        .collect();

    assert!(matches!(
        EpubProcessor::default().process(&build_epub(&files), |_| {}),
        Err(EpubError::MissingPackageDocument(path)) if path == "OEBPS/content.opf"
    ));
}

#[test]
fn test_malformed_package_document() {
    let mut files = sample_files();
    files[2] = ("OEBPS/content.opf", b"<package><metadata>".as_slice());

    assert!(matches!(
        EpubProcessor::default().process(&build_epub(&files), |_| {}),
        Err(EpubError::MalformedXml { .. })
    ));
}

#[test]
fn test_not_a_zip() {
    let mut codes = Vec::new();
    let result = EpubProcessor::default().process(b"PK\x03\x04 truncated", |p| codes.push(p.code()));

    assert!(matches!(result, Err(EpubError::Archive(_))));
    assert_eq!(codes, vec![1, -1]);
}

#[test]
fn test_stylesheet_links_kept_when_disabled() {
    let processor = EpubProcessor::new(Config {
        inline_stylesheets: false,
        ..Config::default()
    });
    let book = processor.process(&sample_epub(), |_| {}).unwrap();

    let chap1 = book.files.text("OEBPS/chap1.xhtml").unwrap();
    assert!(chap1.contains(r#"<link href="css/main.css""#));
    assert!(chap1.contains(r#"src="data:image/jpeg;base64,/9j/4A==""#));
}

const XML_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>XML Only</dc:title></metadata>
  <manifest>
    <item id="c1" href="chap1.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="css/main.css" media-type="text/css"/>
    <item id="cover" href="img/cover.jpg" media-type="image/jpeg"/>
    <item id="notes" href="notes.txt"/>
  </manifest>
  <spine><itemref idref="c1"/></spine>
</package>"#;

const XML_CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:svg="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
<head><title/><script type="text/javascript" src="a.js"/><link rel="stylesheet" type="text/css" href="css/main.css"/></head>
<body>
<script><![CDATA[ var s = "<img src='img/cover.jpg'/>"; ]]></script>
<img src="img/cover.jpg"/>
<svg:svg><svg:image xlink:href="img/cover.jpg"/></svg:svg>
</body>
</html>"#;

#[test]
fn test_xml_only_markup_inlined() {
    let data = build_epub(&[
        ("mimetype", b"application/epub+zip".as_slice()),
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", XML_OPF.as_bytes()),
        ("OEBPS/chap1.xhtml", XML_CHAPTER.as_bytes()),
        ("OEBPS/css/main.css", CSS.as_bytes()),
        ("OEBPS/img/cover.jpg", JPEG),
        ("OEBPS/notes.txt", b"hello".as_slice()),
    ]);

    let book = EpubProcessor::default().process(&data, |_| {}).unwrap();
    let chap1 = book.files.text("OEBPS/chap1.xhtml").unwrap();

    assert!(chap1.contains(r#"<title/><script type="text/javascript" src="a.js"/><style type="text/css" data-orig-href="css/main.css">"#));
    assert!(chap1.contains(r#"<img src="data:image/jpeg;base64,/9j/4A=="/>"#));
    assert!(chap1.contains(r#"<svg:image xlink:href="data:image/jpeg;base64,/9j/4A=="/>"#));
    assert!(chap1.contains(r#"<![CDATA[ var s = "<img src='img/cover.jpg'/>"; ]]>"#));
    assert_eq!(book.report.links_inlined, 1);
    assert_eq!(book.report.references_missing, 0);

    // declared without a media-type: kept as text
    assert_eq!(
        book.files.get("OEBPS/notes.txt"),
        Some(&FileContent::Text("hello".to_string()))
    );
}

#[tokio::test]
async fn test_process_async_matches_sync() {
    let data = sample_epub();
    let processor = EpubProcessor::default();

    let sync = processor.process(&data, |_| {}).unwrap();
    let asynchronous = processor.process_async(data, |_| {}).await.unwrap();

    assert_eq!(sync.files, asynchronous.files);
    assert_eq!(sync.package.spine(), asynchronous.package.spine());
}

#[test]
fn test_write_book() {
    let book = EpubProcessor::default()
        .process(&sample_epub(), |_| {})
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let written = write_book(&book, dir.path()).unwrap();
    assert_eq!(written, book.files.len());

    let chap1 = std::fs::read_to_string(dir.path().join("OEBPS/chap1.xhtml")).unwrap();
    assert_eq!(chap1, book.files.text("OEBPS/chap1.xhtml").unwrap());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(summary["package"]["path"], "OEBPS/content.opf");
    assert_eq!(summary["package"]["spine"][0], "c1");
    assert_eq!(summary["meta"]["mimetype"], "application/epub+zip");
    assert_eq!(summary["files"].as_array().unwrap().len(), written);
}
