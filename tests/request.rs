use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_initial_request() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("citelink")?;
    cmd.env("NO_COLOR", "1");
    let output = cmd
        .arg("request")
        .arg("https://www.arxiv-vanity.com/papers/1211.1036/")
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.trim(), r#"{"arxivId":"1211.1036"}"#);
    Ok(())
}

#[test]
fn rejects_urls_without_identifier() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("citelink")?;
    cmd.env("NO_COLOR", "1");
    cmd.arg("request")
        .arg("https://www.arxiv-vanity.com/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no document identifier"));
    Ok(())
}
