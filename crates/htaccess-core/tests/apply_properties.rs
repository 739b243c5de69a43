//! Behavioural properties of the apply pipeline, exercised through the
//! public API against real files.

use std::sync::Arc;

use htaccess_blocks::text::strip_block_header;
use htaccess_blocks::{PatchDirective, PatchScope, extract_marker_lines};
use htaccess_core::{
    ApplyOutcome, ApplyReport, BlockMerger, BlockStatus, Context, Engine, EngineConfig,
    EngineSettings, Probe, StaticFragment, expected_body_hash,
};
use htaccess_fs::LockOptions;
use htaccess_fs::checksum::sha256_hex;
use htaccess_test_utils::{TestSite, WORDPRESS_BLOCK};
use pretty_assertions::assert_eq;
use rstest::rstest;

const NO_LEGACY: &[&str] = &[];

struct FixedProbe(u16);

impl Probe for FixedProbe {
    fn status(&self, _url: &str) -> Option<u16> {
        Some(self.0)
    }
}

fn merger(site: &TestSite) -> BlockMerger {
    BlockMerger::new(Context::new(site.target()), EngineSettings::default())
}

fn managed_body(text: &str) -> Option<String> {
    extract_marker_lines(text, "NFD Htaccess").map(|lines| strip_block_header(&lines).join("\n"))
}

#[test]
fn test_idempotent_apply_writes_once() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let merger = merger(&site);

    let first = merger.apply_managed_block("Options -Indexes", "example.com", "1.0.0", NO_LEGACY).unwrap();
    assert!(matches!(first, ApplyOutcome::Written { .. }));
    let written = site.read_target();
    let backup = std::fs::read_to_string(site.backup(".nfd-backup")).unwrap();

    let second = merger.apply_managed_block("Options -Indexes", "example.com", "1.0.0", NO_LEGACY).unwrap();
    assert_eq!(second, ApplyOutcome::Unchanged);
    assert_eq!(site.read_target(), written);
    // No second backup refresh either
    assert_eq!(std::fs::read_to_string(site.backup(".nfd-backup")).unwrap(), backup);
}

#[rstest]
#[case("RuleA")]
#[case("RuleA\r\nRuleB\r\n")]
#[case("\n\n  Indented\n\n# BEGIN Patch\nx\n# END Patch\n\n")]
fn test_current_hash_matches_normalized_body(#[case] body: &str) {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let merger = merger(&site);
    merger.apply_managed_block(body, "h", "1", NO_LEGACY).unwrap();

    assert_eq!(merger.get_current_body_hash(), Some(expected_body_hash(body)));
}

#[test]
fn test_deletion_keeps_surroundings() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let merger = merger(&site);
    merger.apply_managed_block("Header set X 1", "h", "1", NO_LEGACY).unwrap();
    site.write_target(&format!("{}\n# trailing comment\n", site.read_target()));

    let outcome = merger.apply_managed_block("", "h", "1", NO_LEGACY).unwrap();
    assert_eq!(outcome, ApplyOutcome::Removed);
    assert_eq!(site.read_target(), format!("{WORDPRESS_BLOCK}\n# trailing comment\n"));
}

#[test]
fn test_legacy_migration() {
    let site = TestSite::with_htaccess(&format!(
        "{WORDPRESS_BLOCK}# BEGIN Old Rules\nHeader set X-Old 1\n# END Old Rules\n"
    ));
    let merger = merger(&site);

    let outcome = merger.apply_managed_block("X", "h", "1", &["Old Rules"]).unwrap();
    assert!(outcome.succeeded());
    site.assert_target_not_contains("Old Rules");
    site.assert_block_count("WordPress", 1);
    assert_eq!(managed_body(&site.read_target()), Some("X".to_string()));
}

#[test]
fn test_corruption_recovery_restores_backup() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let merger = BlockMerger::new(
        Context::new(site.target()).with_home_url("https://example.com"),
        EngineSettings::default(),
    )
    .with_probe(Some(Arc::new(FixedProbe(502))));

    let outcome = merger.apply_managed_block("Rule", "h", "1", NO_LEGACY).unwrap();
    assert!(matches!(outcome, ApplyOutcome::RolledBack { .. }));
    assert_eq!(site.read_target(), WORDPRESS_BLOCK);
}

#[test]
fn test_wp_block_patch_is_applied_and_kept_on_reapply() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let mut merger = merger(&site);
    merger.set_patches(vec![PatchDirective::new(
        PatchScope::WpBlock,
        r"RewriteRule \. /index\.php \[L\]",
        "RewriteRule . /index.php [L,QSA]",
    )]);

    merger.apply_managed_block("Rule", "h", "1", NO_LEGACY).unwrap();
    site.assert_target_contains("RewriteRule . /index.php [L,QSA]");
    let outcome = merger.apply_managed_block("Rule", "h", "1", NO_LEGACY).unwrap();
    assert_eq!(outcome, ApplyOutcome::Unchanged);
}

#[test]
fn test_composition_is_rewritten_wholesale() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let mut engine = Engine::new(EngineSettings::default(), LockOptions::default());
    engine.initialize(Context::new(site.target()));
    engine.register(Box::new(StaticFragment::new("A", "RuleA").with_priority(100)));
    engine.register(Box::new(StaticFragment::new("B", "RuleB").with_priority(200)));

    engine.apply().unwrap();
    assert_eq!(managed_body(&site.read_target()), Some("RuleA\n\nRuleB".to_string()));

    engine.unregister("B");
    let report = engine.apply().unwrap();
    assert!(matches!(report, ApplyReport::Completed(ApplyOutcome::Written { .. })));
    assert_eq!(managed_body(&site.read_target()), Some("RuleA".to_string()));
    assert_eq!(engine.current_body_hash().unwrap(), Some(sha256_hex("RuleA")));
    site.assert_block_count("NFD Htaccess", 1);
}

#[test]
fn test_status_tracks_drift() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let mut engine = Engine::new(EngineSettings::default(), LockOptions::default());
    engine.initialize(Context::new(site.target()));
    engine.register(Box::new(StaticFragment::new("A", "RuleA")));

    assert_eq!(engine.status().unwrap().status, BlockStatus::Missing);
    engine.apply().unwrap();
    assert_eq!(engine.status().unwrap().status, BlockStatus::Ok);

    site.write_target(&site.read_target().replace("RuleA", "RuleEdited"));
    let report = engine.status().unwrap();
    assert_eq!(report.status, BlockStatus::Mismatch);
    assert_ne!(report.current_hash, report.expected_hash);
}

#[test]
fn test_engine_from_config_file() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    site.write_file("rules/cache.conf", "ExpiresActive On\n");
    let config_path = site.write_config(
        r#"
[site]
home_url = "https://shop.example.com"

[health]
probe = false

[[fragments]]
id = "security"
priority = 10
content = "Options -Indexes"

[[fragments]]
id = "cache"
file = "rules/cache.conf"

[[fragments]]
id = "disabled"
enabled = false
content = "Header set X-Off 1"
"#,
    );

    let config = EngineConfig::load(&config_path).unwrap();
    let mut engine = Engine::from_config(&config, site.root()).unwrap().with_version("3.1.4");
    engine.apply().unwrap();

    site.assert_target_contains("# Managed by NFD Htaccess Manager v3.1.4 (shop.example.com)");
    assert_eq!(
        managed_body(&site.read_target()),
        Some("Options -Indexes\n\nExpiresActive On".to_string())
    );
    site.assert_target_not_contains("X-Off");
}
