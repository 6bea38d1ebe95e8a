//! Classifier totality through the public API

use confvault::FileType;

#[test]
fn test_classifier_never_returns_unknown() {
    let names = [
        "",
        ".",
        "..",
        "a",
        ".hidden",
        "no_ext.",
        "x.json.bak",
        "x.bak.json",
        "weird.\u{1F600}",
        "double..dots",
        "UPPER.YAML",
        "spaces in name.txt",
    ];
    for name in names {
        assert_ne!(
            FileType::from_filename(name),
            FileType::Unknown,
            "{name:?} classified as unknown"
        );
    }
}

#[test]
fn test_classifier_matches_mapping() {
    let cases = [
        ("a.txt", FileType::Text),
        ("a.csv", FileType::Csv),
        ("a.json", FileType::Json),
        ("a.xml", FileType::Xml),
        ("a.yaml", FileType::Yaml),
        ("a.yml", FileType::Yaml),
        ("a.toml", FileType::Text),
        ("a.Json", FileType::Text),
        (".yml", FileType::Yaml),
        (".xml", FileType::Xml),
        ("a.", FileType::Text),
    ];
    for (name, expected) in cases {
        assert_eq!(FileType::from_filename(name), expected, "{name}");
    }
}

#[test]
fn test_wire_codes_are_stable() {
    assert_eq!(FileType::Unknown.code(), 0);
    assert_eq!(FileType::Text.code(), 1);
    assert_eq!(FileType::Csv.code(), 2);
    assert_eq!(FileType::Json.code(), 3);
    assert_eq!(FileType::Xml.code(), 4);
    assert_eq!(FileType::Yaml.code(), 5);
}
