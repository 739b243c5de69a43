//! Concurrent apply cycles from independent engines sharing one file.

use std::sync::{Arc, Barrier};
use std::thread;

use htaccess_blocks::Validator;
use htaccess_core::{ApplyOutcome, ApplyReport, Context, Engine, EngineSettings, StaticFragment};
use htaccess_fs::LockOptions;
use htaccess_test_utils::{TestSite, WORDPRESS_BLOCK};
use std::time::Duration;

#[test]
fn test_parallel_engines_leave_one_valid_block() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let target = site.target();
    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let target = target.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Each worker behaves like a separate server process
                let options = LockOptions {
                    wait: Duration::from_secs(5),
                    ..LockOptions::default()
                };
                let mut engine = Engine::new(EngineSettings::default(), options);
                engine.initialize(Context::new(&target));
                engine.register(Box::new(StaticFragment::new("shared", format!("Header set X-Worker {i}"))));
                barrier.wait();
                engine.apply().unwrap()
            })
        })
        .collect();

    let reports: Vec<ApplyReport> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(reports.iter().all(|r| !r.is_failure()), "{reports:?}");
    assert!(reports.iter().any(|r| matches!(r, ApplyReport::Completed(ApplyOutcome::Written { .. }))));

    site.assert_block_count("NFD Htaccess", 1);
    site.assert_block_count("WordPress", 1);
    let text = site.read_target();
    assert!(Validator::new("NFD Htaccess").validate_file(&text, &["WordPress", "NFD Htaccess"]).is_valid());
}

#[test]
fn test_contended_lock_without_wait_skips() {
    let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
    let target = htaccess_fs::NormalizedPath::resolve(site.target()).unwrap();
    let _held = htaccess_fs::LeaseLock::for_target(&target, LockOptions::default())
        .try_acquire()
        .unwrap()
        .unwrap();

    let mut engine = Engine::new(EngineSettings::default(), LockOptions::default());
    engine.initialize(Context::new(site.target()));
    engine.register(Box::new(StaticFragment::new("a", "RuleA")));
    engine.mark_dirty();

    assert_eq!(engine.apply_if_dirty().unwrap(), Some(ApplyReport::Skipped));
    assert!(engine.is_dirty());
    assert_eq!(site.read_target(), WORDPRESS_BLOCK);
}
