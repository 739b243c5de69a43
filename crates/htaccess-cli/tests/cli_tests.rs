//! Integration tests for the htaccess CLI binary.
//!
//! These tests exercise the actual compiled binary using assert_cmd.

use assert_cmd::Command;
use htaccess_test_utils::{TestSite, WORDPRESS_BLOCK};
use predicates::prelude::*;

const CONFIG: &str = r#"
[site]
home_url = "https://example.com"

[health]
probe = false

[engine]
legacy_labels = ["Old Rules"]

[[fragments]]
id = "security"
priority = 10
content = "Options -Indexes"

[[fragments]]
id = "headers"
content = "Header set X-Frame-Options SAMEORIGIN"
"#;

/// Get a Command for the htaccess binary running inside `site`
fn htaccess_cmd(site: &TestSite) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("htaccess"));
    cmd.current_dir(site.root()).env_remove("HTACCESS_CONFIG");
    cmd
}

fn configured_site() -> TestSite {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    site.write_config(CONFIG);
    site
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let site = TestSite::new();
    htaccess_cmd(&site)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("list-backups"));
}

#[test]
fn test_version_output() {
    let site = TestSite::new();
    htaccess_cmd(&site)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("htaccess"));
}

// ============================================================================
// Apply / Status
// ============================================================================

#[test]
fn test_apply_writes_block_with_version() {
    let site = configured_site();
    htaccess_cmd(&site)
        .args(["apply", "--version", "2.5.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Written"));

    site.assert_target_contains("# Managed by NFD Htaccess Manager v2.5.0 (example.com)");
    site.assert_target_contains("Options -Indexes\n\nHeader set X-Frame-Options SAMEORIGIN\n# END NFD Htaccess");
    site.assert_block_count("WordPress", 1);
}

#[test]
fn test_second_apply_is_unchanged() {
    let site = configured_site();
    htaccess_cmd(&site).arg("apply").assert().success();
    let first = site.read_target();

    htaccess_cmd(&site)
        .args(["apply", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unchanged\""));
    assert_eq!(site.read_target(), first);
}

#[test]
fn test_status_json_before_and_after_apply() {
    let site = configured_site();
    htaccess_cmd(&site)
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"missing\""));

    htaccess_cmd(&site).arg("apply").assert().success();

    let output = htaccess_cmd(&site)
        .args(["status", "--format", "json"])
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "ok");
    assert_eq!(report["expected_hash"], report["current_hash"]);
}

#[test]
fn test_strict_status_fails_on_drift() {
    let site = configured_site();
    htaccess_cmd(&site)
        .args(["status", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status check failed"));
}

#[test]
fn test_yaml_output() {
    let site = configured_site();
    htaccess_cmd(&site)
        .args(["diagnose", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file_valid: true"))
        .stdout(predicate::str::contains("http_status: 0"));
}

#[test]
fn test_legacy_blocks_removed_on_apply() {
    let site = TestSite::with_htaccess(&format!(
        "# BEGIN Old Rules\nHeader set X-Old 1\n# END Old Rules\n{WORDPRESS_BLOCK}"
    ));
    site.write_config(CONFIG);

    htaccess_cmd(&site).arg("apply").assert().success();
    site.assert_target_not_contains("Old Rules");
    site.assert_block_count("NFD Htaccess", 1);
}

// ============================================================================
// Scan / Remediate / Restore
// ============================================================================

#[test]
fn test_scan_strict_fails_on_invalid_file() {
    let site = TestSite::with_htaccess("<IfModule mod_rewrite.c>\nRewriteEngine On\n");
    site.write_config(CONFIG);

    htaccess_cmd(&site)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Issues found"));
    htaccess_cmd(&site).args(["scan", "--strict"]).assert().failure();
}

#[test]
fn test_remediate_fixes_broken_fragment() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    site.write_config(
        "[health]\nprobe = false\n\n[[fragments]]\nid = \"broken\"\ncontent = \"RewriteRule ^old$ /new [R=301,L]]\"\n",
    );

    htaccess_cmd(&site).arg("remediate").assert().success();
    site.assert_target_contains("RewriteRule ^old$ /new [R=301,L]\n");
}

#[test]
fn test_restore_and_list_backups() {
    let site = configured_site();
    htaccess_cmd(&site)
        .arg("list-backups")
        .assert()
        .success()
        .stdout(predicate::str::contains("None"));

    htaccess_cmd(&site).arg("apply").assert().success();
    htaccess_cmd(&site)
        .args(["backups", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".htaccess.nfd-backup"));

    htaccess_cmd(&site)
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));
    assert_eq!(site.read_target(), WORDPRESS_BLOCK);
}

#[test]
fn test_restore_without_backup_is_an_error() {
    let site = configured_site();
    htaccess_cmd(&site)
        .arg("restore")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup found"));
}

#[test]
fn test_missing_target_fails_apply_under_strict() {
    let site = TestSite::new();
    site.write_config(CONFIG);
    htaccess_cmd(&site)
        .args(["apply", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("does not exist"));
}
