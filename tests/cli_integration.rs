//! Integration tests for the pkgfront binary.
//!
//! These tests run the CLI against a temporary config whose directories
//! all live under a temp dir. No daemon is running.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

/// Temporary client layout with a config file pointing into it.
struct TestClient {
    dir: TempDir,
}

impl TestClient {
    /// Layout with repositories `main` and `community` on branch `testing`.
    fn new() -> Self {
        let client = Self::with_order(&["main", "community"]);
        client.add_repository("main");
        client.add_repository("community");
        client
    }

    fn with_order(order: &[&str]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path();
        let order = order
            .iter()
            .map(|id| format!("\"{}\"", id))
            .collect::<Vec<_>>()
            .join(", ");
        let config = format!(
            "[repositories]\n\
             branch = \"testing\"\n\
             order = [{order}]\n\
             database_dir = \"{db}\"\n\
             \n\
             [cache]\n\
             directory = \"{cache}\"\n\
             \n\
             [daemon]\n\
             socket = \"{socket}\"\n\
             connect_timeout_ms = 200\n\
             \n\
             [lock]\n\
             directory = \"{locks}\"\n",
            db = root.join("db").display(),
            cache = root.join("cache").display(),
            socket = root.join("daemon.sock").display(),
            locks = root.join("locks").display(),
        );
        fs::write(root.join("config.toml"), config).expect("write config");
        Self { dir }
    }

    fn add_repository(&self, id: &str) {
        let repo = self.dir.path().join("db").join(id);
        fs::create_dir_all(&repo).expect("create repository dir");
        fs::write(repo.join("packages.db"), id).expect("write database");
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config_path(&self) -> PathBuf {
        self.path("config.toml")
    }

    /// A pkgfront command using this layout's config.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("pkgfront").unwrap();
        cmd.env("PKGFRONT_CONFIG", self.config_path())
            .env_remove("RUST_LOG");
        cmd
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).output().expect("run pkgfront");
        assert!(output.status.success(), "pkgfront {:?} failed", args);
        String::from_utf8(output.stdout).expect("utf-8 output")
    }
}

fn is_hex_digest(line: &str) -> bool {
    line.len() == 64 && line.chars().all(|c| c.is_ascii_hexdigit())
}

fn mode(path: &Path) -> u32 {
    fs::metadata(path).expect("stat").permissions().mode() & 0o777
}

// =============================================================================
// Basic Flags
// =============================================================================

#[test]
fn version_flag_works() {
    Command::cargo_bin("pkgfront")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pkgfront"));
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("pkgfront")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fingerprint"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn completion_bash_generates_script() {
    Command::cargo_bin("pkgfront")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkgfront"));
}

// =============================================================================
// Fingerprint
// =============================================================================

#[test]
fn fingerprint_is_stable_between_runs() {
    let client = TestClient::new();
    let first = client.stdout(&["fingerprint"]);
    let second = client.stdout(&["fingerprint"]);

    assert!(is_hex_digest(first.trim()));
    assert_eq!(first, second);
}

#[test]
fn fingerprint_all_differs_only_with_package_repositories() {
    let client = TestClient::with_order(&["main", "local.tbz2"]);
    client.add_repository("main");
    client.add_repository("local.tbz2");

    let filtered = client.stdout(&["fingerprint"]);
    let all = client.stdout(&["fingerprint", "--all"]);
    assert_ne!(filtered, all);
}

#[test]
fn fingerprint_key_differs_from_fingerprint() {
    let client = TestClient::new();
    let fingerprint = client.stdout(&["fingerprint"]);
    let key = client.stdout(&["fingerprint", "--key"]);

    assert!(is_hex_digest(key.trim()));
    assert_ne!(fingerprint, key);
}

#[test]
fn fingerprint_json_reports_missing_repository() {
    let client = TestClient::with_order(&["main", "ghost"]);
    client.add_repository("main");

    client
        .cmd()
        .args(["fingerprint", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"branch\": \"testing\""))
        .stdout(predicate::str::contains("\"id\": \"ghost\""))
        .stdout(predicate::str::contains("\"reason\": \"unavailable\""));
}

#[test]
fn all_and_key_conflict() {
    let client = TestClient::new();
    client
        .cmd()
        .args(["fingerprint", "--all", "--key"])
        .assert()
        .failure();
}

// =============================================================================
// Cache, Lock, Config, Status
// =============================================================================

#[test]
fn cache_clear_recreates_directory() {
    let client = TestClient::new();
    let cache = client.path("cache");
    fs::create_dir_all(cache.join("available")).unwrap();
    fs::write(cache.join("available").join("stale.json"), "{}").unwrap();

    client
        .cmd()
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache cleared"));

    assert!(cache.is_dir());
    assert_eq!(fs::read_dir(&cache).unwrap().count(), 0);
    assert_eq!(mode(&cache), 0o775);
}

#[test]
fn lock_exclusive_succeeds_when_free() {
    let client = TestClient::new();
    client
        .cmd()
        .args(["lock", "--exclusive", "--timeout", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acquired exclusive lock"));
}

#[test]
fn config_shows_effective_values() {
    let client = TestClient::new();
    client
        .cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("branch = \"testing\""))
        .stdout(predicate::str::contains("group = \"pkgfront\""));
}

#[test]
fn explicit_missing_config_fails() {
    let client = TestClient::new();
    client
        .cmd()
        .args(["--config", "/nonexistent/pkgfront.toml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn invalid_config_is_reported() {
    let client = TestClient::new();
    fs::write(client.config_path(), "[repositories]\nbranch = \"\"\n").unwrap();
    client
        .cmd()
        .arg("fingerprint")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid branch"));
}

#[test]
fn status_without_daemon_reports_unreachable() {
    let client = TestClient::new();
    client
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not reachable"))
        .stdout(predicate::str::contains("testing"));
}

#[test]
fn status_caches_repository_summary_until_database_changes() {
    let client = TestClient::new();
    let first = client.stdout(&["status"]);
    assert!(first.contains("2 repositories, cached now"));

    let second = client.stdout(&["status"]);
    assert!(second.contains("available:"));
    assert!(!second.contains("cached now"));

    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(client.path("db").join("main").join("packages.db"))
        .unwrap()
        .set_modified(later)
        .unwrap();
    let third = client.stdout(&["status"]);
    assert!(third.contains("cached now"));
}

#[test]
fn run_without_daemon_fails_startup() {
    let client = TestClient::new();
    client
        .cmd()
        .arg("run")
        .write_stdin("quit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Startup failed"));
}
