//! Media list integration tests
//!
//! Exercises the public API through the process-wide engine handle:
//! - Full add / lock / size / remove / release scenario
//! - Construction before the engine exists
//! - Concurrent mutation serialized through the list lock
//! - Engine installed from a configuration file
//!
//! Every test touching the process-wide slot is `#[serial]`.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use medialink::{Error, Media, MediaList, MemoryEngine, NativeEngine};
use serial_test::serial;

/// Install a fresh memory engine, returning it for inspection
fn install_memory_engine() -> Arc<MemoryEngine> {
    medialink_common::logging::init_tracing("medialink=debug");
    medialink::release();
    let memory = Arc::new(MemoryEngine::new());
    medialink::init(memory.clone()).unwrap();
    memory
}

#[test]
#[serial]
fn test_add_lock_remove_release_scenario() {
    let memory = install_memory_engine();

    let mut list = MediaList::new().unwrap();
    list.add_media_from_path("a.mp4").unwrap();
    list.add_media_from_path("b.mp4").unwrap();

    let guard = list.lock().unwrap();
    assert_eq!(guard.size().unwrap(), 2);
    guard.remove_at_index(0).unwrap();
    assert_eq!(guard.size().unwrap(), 1);
    guard.unlock().unwrap();

    assert_eq!(
        memory.list_mrls(list.as_raw().unwrap()),
        vec!["file:///b.mp4"]
    );

    list.release().unwrap();
    list.release().unwrap();
    assert_eq!(memory.live_lists(), 0);
    assert_eq!(memory.live_media(), 0);

    medialink::release();
}

#[test]
#[serial]
fn test_construction_requires_engine() {
    medialink::release();

    assert!(matches!(Media::from_path("a.mp4"), Err(Error::NotInitialized)));
    assert!(matches!(
        Media::from_url("http://example.com/a.ogg"),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        Media::with_options("a.mp4", true, &[":no-video"]),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(MediaList::new(), Err(Error::NotInitialized)));
}

#[test]
#[serial]
fn test_handles_outlive_engine_release() {
    let memory = install_memory_engine();

    let list = MediaList::new().unwrap();
    let media = Media::from_path("/kept.flac").unwrap();
    medialink::release();

    // Existing handles keep their engine alive
    list.add_media(&media).unwrap();
    assert_eq!(list.lock().unwrap().size().unwrap(), 1);
    assert!(matches!(MediaList::new(), Err(Error::NotInitialized)));

    drop(list);
    drop(media);
    assert_eq!(memory.live_media(), 0);
}

#[test]
#[serial]
fn test_with_options_applies_in_order() {
    let memory = install_memory_engine();

    let media = Media::with_options(
        "http://example.com/live",
        false,
        &[":network-caching=300", ":no-video"],
    )
    .unwrap();

    assert_eq!(
        memory.media_options(media.as_raw().unwrap()),
        vec![":network-caching=300", ":no-video"]
    );

    medialink::release();
}

#[test]
#[serial]
fn test_with_options_rejected_option_releases_media() {
    let memory = install_memory_engine();
    memory.reject_option(":rejected");

    let calls = memory.native_calls();
    let result = Media::with_options(
        "/a.mp4",
        true,
        &[":first", ":rejected", ":never-applied"],
    );

    assert!(matches!(
        result,
        Err(Error::Engine(ref m)) if m == "option rejected: :rejected"
    ));
    // create, two options, release: the third option never reaches the engine
    assert_eq!(memory.native_calls(), calls + 4);
    assert_eq!(memory.live_media(), 0);

    medialink::release();
}

#[test]
#[serial]
fn test_with_options_nul_option_releases_media() {
    let memory = install_memory_engine();

    let result = Media::with_options("/a.mp4", true, &[":bad\0option", ":never-applied"]);

    assert!(matches!(result, Err(Error::InvalidString(_))));
    assert_eq!(memory.live_media(), 0);

    medialink::release();
}

#[test]
#[serial]
fn test_concurrent_clear_under_lock() {
    let memory = install_memory_engine();
    let list = Arc::new(MediaList::new().unwrap());
    for i in 0..32 {
        list.add_media_from_url(&format!("tag://{}", i)).unwrap();
    }

    // Each worker trims the list by one item under the lock
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let list = list.clone();
            thread::spawn(move || {
                let guard = list.lock().unwrap();
                let size = guard.size().unwrap();
                guard.clear_list(size - 1).unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let guard = list.lock().unwrap();
    assert_eq!(guard.size().unwrap(), 24);
    drop(guard);

    let expected: Vec<String> = (0..24).map(|i| format!("tag://{}", i)).collect();
    assert_eq!(memory.list_mrls(list.as_raw().unwrap()), expected);

    medialink::release();
}

#[test]
#[serial]
fn test_event_manager_from_global_list() {
    install_memory_engine();

    let list = MediaList::new().unwrap();
    let manager = list.event_manager().unwrap();
    assert_eq!(manager, list.event_manager().unwrap());

    medialink::release();
}

#[test]
#[serial]
fn test_init_from_config_file() {
    medialink::release();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "backend = \"memory\"").unwrap();
    writeln!(file, "args = [\"--quiet\"]").unwrap();

    let config =
        medialink_common::config::load_config(Some(file.path()), "MEDIALINK_TEST_UNSET").unwrap();
    medialink::init_from_config(&config).unwrap();

    let engine: Arc<dyn NativeEngine> = medialink::instance().unwrap();
    assert_eq!(engine.name(), "memory");
    assert!(MediaList::new().is_ok());

    medialink::release();
}
