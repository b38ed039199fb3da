use matchbot_cli::commands::run_format;
use tempfile::TempDir;

const LOG: &str = "============================================================
Date: 2026-03-01 10:15:00
Name: Jane Doe
URL: https://example.test/profiles/42
Reason: Built a surgical robot for her thesis and later led the controls team at a medical device startup that shipped two products
============================================================

";

#[test]
fn test_format_command_writes_wrapped_copy() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("recommended_candidates.txt");
    let output = dir.path().join("formatted_candidates.txt");
    std::fs::write(&input, LOG).unwrap();

    let report = run_format(&input, &output, 10).unwrap();

    let formatted = std::fs::read_to_string(&output).unwrap();
    assert!(formatted.starts_with(&"=".repeat(60)));
    assert!(formatted.contains("Name: Jane Doe"));
    assert!(formatted
        .lines()
        .all(|line| line.split_whitespace().count() <= 11));
    assert_eq!(report.input_words, LOG.split_whitespace().count());
    assert_eq!(std::fs::read_to_string(&input).unwrap(), LOG);
}

#[test]
fn test_format_command_reports_missing_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.txt");
    let output = dir.path().join("out.txt");

    let err = run_format(&input, &output, 15).unwrap_err();

    assert!(format!("{:#}", err).contains("missing.txt"));
    assert!(!output.exists());
}
