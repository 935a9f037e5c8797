#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use kinddb::{Key, KeyValueStore, FileStore, Record, StoreConfig, Value};
use predicates::prelude::*;
use tempfile::TempDir;

fn kinddb_cmd() -> Command {
    Command::new(cargo_bin("kinddb"))
}

fn seeded_config_dir() -> (TempDir, Key, Key) {
    let temp = TempDir::new().unwrap();
    StoreConfig::default().save(temp.path()).unwrap();
    let store = FileStore::open(temp.path().join("kinddb-data.json")).unwrap();

    let author = Key::new("Author", 7).unwrap();
    let post = Key::with_parent(&author, "Post", Some("hello".into())).unwrap();
    store
        .put(&author, Record::from([("name".to_string(), Value::from("Ann"))]))
        .unwrap();
    store
        .put(&post, Record::from([("title".to_string(), Value::from("Hello"))]))
        .unwrap();
    (temp, author, post)
}

#[test]
fn init_writes_config_once() {
    let temp = TempDir::new().unwrap();
    kinddb_cmd()
        .args(["--config-dir", temp.path().to_str().unwrap(), "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(temp.path().join("kinddb.json").exists());

    kinddb_cmd()
        .args(["--config-dir", temp.path().to_str().unwrap(), "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn keys_lists_tokens_and_filters_by_kind() {
    let (temp, author, post) = seeded_config_dir();
    let dir = temp.path().to_str().unwrap();

    kinddb_cmd()
        .args(["--config-dir", dir, "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains(author.urlsafe()))
        .stdout(predicate::str::contains(post.urlsafe()));

    kinddb_cmd()
        .args(["--config-dir", dir, "keys", "--kind", "Post"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Key(Author, 7, Post, hello)"))
        .stdout(predicate::str::contains(author.urlsafe() + "\t").not());
}

#[test]
fn show_prints_the_record() {
    let (temp, _author, post) = seeded_config_dir();
    kinddb_cmd()
        .args(["--config-dir", temp.path().to_str().unwrap(), "show", &post.urlsafe()])
        .assert()
        .success()
        .stdout(predicate::str::contains("title = \"Hello\""));
}

#[test]
fn show_of_missing_key_fails() {
    let (temp, _author, _post) = seeded_config_dir();
    let missing = Key::new("Author", 8).unwrap();
    kinddb_cmd()
        .args(["--config-dir", temp.path().to_str().unwrap(), "show", &missing.urlsafe()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entity not found"));
}

#[test]
fn encode_then_decode() {
    let expected = Key::from_pairs(vec![
        ("Author", Some(7.into())),
        ("Post", Some("hello".into())),
    ])
    .unwrap();

    kinddb_cmd()
        .args(["encode", "Author", "7", "Post", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.urlsafe()));

    kinddb_cmd()
        .args(["decode", &expected.urlsafe()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Key(Author, 7, Post, hello)"));
}

#[test]
fn encode_rejects_odd_arguments() {
    kinddb_cmd()
        .args(["encode", "Author", "7", "Post"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn decode_rejects_garbage() {
    kinddb_cmd()
        .args(["decode", "!!not-a-token!!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Encoding error"));
}
