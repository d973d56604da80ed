use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ledger_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("news-ledger");
    path
}

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Explained</title>
    <item>
      <title>UPSC Key — October data</title>
      <link>https://example.com/key</link>
    </item>
    <item>
      <title>Delhi HC on X: Daily Subject Wise Quiz</title>
      <link>https://example.com/quiz</link>
    </item>
    <item>
      <title>Random headline</title>
      <link>https://example.com/random</link>
    </item>
  </channel>
</rss>
"#;

const PAYLOAD: &str = r#"{
    "n1": {"Type": "Knowledge Nugget", "Title": "Ramsar sites", "Link": "https://example.com/ramsar"},
    "n2": {"Title": "The world this week: ceasefire talks", "Link": "https://example.com/world"}
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("feed.xml"), FEED).unwrap();
    fs::write(data_dir.join("scraped.json"), PAYLOAD).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/news.sqlite"

[staging]
path = "{root}/data/backup.json"

[feed]
url = "file://{root}/data/feed.xml"
timeout_secs = 5

[source]
path = "{root}/data/scraped.json"

[pipeline]
user_id = "integration"

[server]
bind = "127.0.0.1:7331"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("news-ledger.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ledger(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ledger_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run news-ledger binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ledger(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/news.sqlite").exists());

    // Idempotent
    let (_, stderr, success) = run_ledger(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_classify_needs_no_config() {
    let missing = Path::new("/nonexistent/news-ledger.toml");

    let (stdout, _, success) = run_ledger(missing, &["classify", "UPSC Key — October data"]);
    assert!(success);
    assert!(stdout.contains("category: UPSC Key"));
    assert!(stdout.contains("id prefix: uKey"));
    assert!(stdout.contains("title: October data"));

    let (stdout, _, success) =
        run_ledger(missing, &["classify", "Delhi HC on X: Daily Subject Wise Quiz"]);
    assert!(success);
    assert_eq!(stdout.trim(), "skip");
}

#[test]
fn test_run_then_rerun() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ledger(&config_path, &["run"]);
    assert!(success, "run failed: {}\n{}", stdout, stderr);
    assert!(stdout.contains("feed new:  2"), "{}", stdout);
    assert!(stdout.contains("json new:  2"), "{}", stdout);
    assert!(stdout.contains("db new:    4"), "{}", stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("uKey0001  [Not Covered]  October data"), "{}", stdout);
    assert!(stdout.contains("knoNugg0001"));
    assert!(stdout.contains("worWee0001  [Not Covered]  ceasefire talks"), "{}", stdout);
    assert!(!stdout.contains("example.com/quiz"));
    assert!(stdout.contains("4 article(s)"));

    let (stdout, _, success) = run_ledger(&config_path, &["run"]);
    assert!(success);
    assert!(stdout.contains("db new:    0"), "{}", stdout);
}

#[test]
fn test_staged_ingest_then_sync() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ledger(&config_path, &["ingest"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("added:   2"), "{}", stdout);
    assert!(stdout.contains("+ knoNugg0001"));

    let (stdout, stderr, success) = run_ledger(&config_path, &["sync"]);
    assert!(success, "sync failed: {}", stderr);
    assert!(stdout.contains("Sync committed"), "{}", stdout);
    assert!(stdout.contains("inserted:      2"));

    let (stdout, _, success) = run_ledger(&config_path, &["sync"]);
    assert!(success);
    assert!(stdout.contains("Sync up-to-date"), "{}", stdout);
}

#[test]
fn test_sync_missing_staging_fails() {
    let (tmp, config_path) = setup_test_env();
    let absent = tmp.path().join("data/none.json");

    let (_, stderr, success) =
        run_ledger(&config_path, &["sync", "--path", absent.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("input not found"), "{}", stderr);
}

#[test]
fn test_notebook_and_status_updates() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ledger(&config_path, &["run"]);
    assert!(success, "run failed: {}", stderr);

    let (stdout, _, success) = run_ledger(
        &config_path,
        &["notebook", "https://example.com/key", "https://nb.example.com/1"],
    );
    assert!(success);
    assert!(stdout.contains("Notebook link updated"));

    let (stdout, _, success) = run_ledger(
        &config_path,
        &["status", "https://example.com/key", "covered"],
    );
    assert!(success);
    assert!(stdout.contains("Status updated (Covered)"));

    let (stdout, _, success) = run_ledger(&config_path, &["list", "--status", "covered"]);
    assert!(success);
    assert!(stdout.contains("uKey0001"));
    assert!(stdout.contains("notebook: https://nb.example.com/1"));
    assert!(stdout.contains("1 article(s)"));
}

#[test]
fn test_counters_and_rebuild() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ledger(&config_path, &["run"]);
    assert!(success, "run failed: {}", stderr);

    let (stdout, _, success) = run_ledger(&config_path, &["counters"]);
    assert!(success);
    assert!(stdout.contains("Stored:      4"), "{}", stdout);
    assert!(!stdout.contains("(behind)"));

    let (stdout, stderr, success) = run_ledger(&config_path, &["rebuild", "--clear"]);
    assert!(success, "rebuild failed: {}", stderr);
    assert!(stdout.contains("removed:   4"), "{}", stdout);
    assert!(stdout.contains("inserted:  4"));
    assert!(stdout.contains("upsc_key_seq: 1"));

    let (stdout, _, success) = run_ledger(&config_path, &["counters", "restore"]);
    assert!(success);
    assert!(stdout.contains("general_article_seq: 1"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n[staging]\npath = \"y.json\"\n[feed]\nurl = \"\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_ledger(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("feed.url must not be empty"), "{}", stderr);
}
