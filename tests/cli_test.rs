mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::{CATALOG, write_lines};
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_replay_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let catalog = dir.path().join("catalog.csv");
    let journal = dir.path().join("journal.csv");
    write_lines(&catalog, CATALOG)?;
    write_lines(
        &journal,
        &[
            "kind,reference,workshop,user,contact,status,note",
            "book,a,W1,user-1,asha@example.com,,",
            "book,b,W1,user-2,+91 98000 00000,,",
            "book,c,W2,user-3,ravi@example.com,,",
            "webhook,a,,,,success,paid by card",
            "webhook,b,,,,pending,",
            "webhook,b,,,,failed,declined",
            "webhook,b,,,,success,",
            "webhook,zz,,,,success,",
        ],
    )?;

    let mut cmd = Command::new(cargo_bin!("workshop-pass"));
    cmd.arg("replay").arg(&catalog).arg(&journal);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "order_id,user,workshop,amount,currency,status,history,artifact",
        ))
        .stdout(predicate::str::contains(
            ",user-1,W1,500,INR,successful,created>successful,true",
        ))
        .stdout(predicate::str::contains(
            ",user-2,W1,500,INR,failed,created>pending>failed,false",
        ))
        .stdout(predicate::str::contains("user-3").not())
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains(
            "Invalid status transition from failed to successful",
        ));

    Ok(())
}

#[test]
fn test_cli_replay_skips_malformed_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let catalog = dir.path().join("catalog.csv");
    let journal = dir.path().join("journal.csv");
    write_lines(
        &catalog,
        &[
            "reference,title,price,currency,bookable",
            "W1,Pottery basics,500,INR,true",
            "W9,Free lunch,-1,INR,true",
        ],
    )?;
    write_lines(
        &journal,
        &[
            "kind,reference,workshop,user,contact,status,note",
            "book,a,W1,user-1,,,",
            "book,b,W1,user-1,asha@example.com,,",
            "webhook,b,,,,settled,",
        ],
    )?;

    let mut cmd = Command::new(cargo_bin!("workshop-pass"));
    cmd.arg("replay").arg(&catalog).arg(&journal);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            ",user-1,W1,500,INR,created,created,false",
        ))
        .stderr(predicate::str::contains("Error reading catalog item"))
        .stderr(predicate::str::contains("Error reading journal entry"))
        .stderr(predicate::str::contains("Unknown order status 'settled'"));

    Ok(())
}

#[test]
fn test_cli_missing_journal_fails() {
    let mut cmd = Command::new(cargo_bin!("workshop-pass"));
    cmd.arg("replay")
        .arg("does/not/exist.csv")
        .arg("nope.csv");

    cmd.assert().failure();
}

#[test]
fn test_cli_validate_rejects_garbage_token() {
    let mut cmd = Command::new(cargo_bin!("workshop-pass"));
    cmd.arg("validate").arg("wp1.not-a-token");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid artifact"));
}
