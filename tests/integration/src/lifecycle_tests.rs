//! End-to-end lifecycle of a managed `.htaccess` across all crates.

use htaccess_blocks::{PatchDirective, PatchScope, StateLine, Validator};
use htaccess_core::{
    ApplyOutcome, ApplyReport, BlockStatus, Context, Engine, EngineConfig, EngineSettings,
    StaticFragment,
};
use htaccess_fs::LockOptions;
use htaccess_test_utils::{TestSite, WORDPRESS_BLOCK};
use pretty_assertions::assert_eq;
use regex::Regex;

fn engine_for(site: &TestSite, settings: EngineSettings) -> Engine {
    let mut engine = Engine::new(settings, LockOptions::default());
    engine.initialize(Context::new(site.target()).with_home_url("https://example.com"));
    engine
}

fn completed(report: ApplyReport) -> ApplyOutcome {
    match report {
        ApplyReport::Completed(outcome) => outcome,
        ApplyReport::Skipped => panic!("apply was skipped"),
    }
}

#[test]
fn test_full_lifecycle() {
    let site = TestSite::with_htaccess(&format!(
        "# BEGIN Legacy Cache\nExpiresActive On\n# END Legacy Cache\n\n{WORDPRESS_BLOCK}"
    ));
    let settings = EngineSettings {
        legacy_labels: vec!["Legacy Cache".into()],
        ..EngineSettings::default()
    };
    let mut engine = engine_for(&site, settings);

    // Fragments registered by independent features, then one commit point
    engine.register(Box::new(StaticFragment::new("security", "Options -Indexes").with_priority(10)));
    engine.register(Box::new(
        StaticFragment::new("cache", "<IfModule mod_expires.c>\nExpiresActive On\n</IfModule>")
            .with_patches(vec![PatchDirective::new(
                PatchScope::WpBlock,
                r"RewriteRule \. /index\.php \[L\]",
                "RewriteRule . /index.php [L,QSA]",
            )]),
    ));
    engine.mark_dirty();

    let outcome = completed(engine.apply_if_dirty().unwrap().unwrap());
    assert!(matches!(outcome, ApplyOutcome::Written { .. }));
    site.assert_target_not_contains("Legacy Cache");
    site.assert_target_contains("[L,QSA]");
    assert_eq!(engine.status().unwrap().status, BlockStatus::Ok);
    assert!(Validator::new("NFD Htaccess").validate_file(&site.read_target(), &["WordPress"]).is_valid());

    // Nothing dirty, nothing to do
    assert_eq!(engine.apply_if_dirty().unwrap(), None);

    // Hand edits inside the block are drift and get overwritten
    site.write_target(&site.read_target().replace("Options -Indexes", "Options +Indexes"));
    assert_eq!(engine.status().unwrap().status, BlockStatus::Mismatch);
    assert!(matches!(completed(engine.apply().unwrap()), ApplyOutcome::Written { .. }));
    site.assert_target_contains("Options -Indexes");

    // Disabling every fragment removes the block but keeps WordPress
    engine.unregister("security");
    engine.unregister("cache");
    assert_eq!(completed(engine.apply().unwrap()), ApplyOutcome::Removed);
    site.assert_block_count("NFD Htaccess", 0);
    site.assert_block_count("WordPress", 1);
    assert_eq!(engine.current_body_hash().unwrap(), None);
    assert_eq!(engine.status().unwrap().status, BlockStatus::Ok);
}

#[test]
fn test_crlf_file_is_managed_without_churn() {
    let site = TestSite::with_htaccess(&WORDPRESS_BLOCK.replace('\n', "\r\n"));
    let mut engine = engine_for(&site, EngineSettings::default());
    engine.register(Box::new(StaticFragment::new("a", "RuleA\r\nRuleB")));

    assert!(matches!(completed(engine.apply().unwrap()), ApplyOutcome::Written { .. }));
    assert!(!site.read_target().contains('\r'));
    assert_eq!(completed(engine.apply().unwrap()), ApplyOutcome::Unchanged);
}

#[test]
fn test_state_line_format_on_disk() {
    let site = TestSite::with_htaccess("");
    let mut engine = engine_for(&site, EngineSettings::default());
    engine.register(Box::new(StaticFragment::new("a", "RuleA")));
    engine.apply().unwrap();

    let text = site.read_target();
    let state = Regex::new(r"(?m)^# STATE sha256: [0-9a-f]{64} applied: \d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").unwrap();
    assert!(state.is_match(&text), "unexpected STATE line in:\n{text}");
    assert_eq!(
        StateLine::find(&text).map(|s| s.checksum),
        engine.expected_body_hash().unwrap()
    );
    assert!(text.starts_with("# BEGIN NFD Htaccess\n# Managed by NFD Htaccess Manager v"));
    assert!(text.ends_with("\n\nRuleA\n# END NFD Htaccess\n"));
}

#[test]
fn test_config_formats_are_equivalent() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let toml_path = site.write_file(
        "conf/htaccess.toml",
        "[site]\ntarget = \"../.htaccess\"\n\n[health]\nprobe = false\n\n[[fragments]]\nid = \"a\"\ncontent = \"RuleA\"\n",
    );
    let json_path = site.write_file(
        "conf/htaccess.json",
        r#"{"site": {"target": "../.htaccess"}, "health": {"probe": false}, "fragments": [{"id": "a", "content": "RuleA"}]}"#,
    );
    let yaml_path = site.write_file(
        "conf/htaccess.yaml",
        "site:\n  target: ../.htaccess\nhealth:\n  probe: false\nfragments:\n  - id: a\n    content: RuleA\n",
    );

    let from_toml = EngineConfig::load(&toml_path).unwrap();
    assert_eq!(EngineConfig::load(&json_path).unwrap(), from_toml);
    assert_eq!(EngineConfig::load(&yaml_path).unwrap(), from_toml);

    let mut engine = Engine::from_config(&from_toml, &site.root().join("conf")).unwrap();
    assert!(completed(engine.apply().unwrap()).succeeded());
    site.assert_target_contains("\nRuleA\n# END NFD Htaccess");
}
