//! Cross-thread command delivery, lifecycle ordering and image resolution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

use dashstack::prelude::*;

fn list_with_image(id: &str, row: &str, image: &str) -> Command {
    Command::new(
        "push-template",
        json!({
            "runtimeType": "ListTemplate",
            "template": {
                "elementId": id,
                "sections": [{"elementId": format!("{id}-s"), "items": [
                    {"elementId": row, "text": "Row", "image": image}
                ]}]
            }
        }),
    )
}

fn grid_root(id: &str) -> Command {
    Command::new(
        "set-root-template",
        json!({"runtimeType": "GridTemplate", "template": {"elementId": id}}),
    )
}

#[test]
fn test_dispatch_blocking_from_driver_thread() {
    let mut session =
        Session::new(BridgeConfig::default(), MemoryHost::new()).expect("Failed to create session");
    let handle = session.handle();
    let timeout = Some(Duration::from_secs(5));

    let driver = std::thread::spawn(move || {
        let root = handle
            .dispatch_blocking(grid_root("root"), timeout)
            .expect("root reply");
        let bogus = handle
            .dispatch_blocking(Command::new("no-such-method", json!({})), timeout)
            .expect("bogus reply");
        let stack = handle
            .dispatch_blocking(Command::bare(Method::GetStack), timeout)
            .expect("stack reply");
        handle.quit().expect("quit");
        (root, bogus, stack)
    });

    session.run();
    let (root, bogus, stack) = driver.join().expect("driver thread panicked");

    assert!(root.is_ok());
    assert_eq!(bogus.code(), Some("unknown_method"));
    assert_eq!(stack.value.expect("stack value")["stack"], json!(["root"]));
    assert!(session.quit_requested());
}

#[test]
fn test_duplicate_lifecycle_callbacks_are_not_deduplicated() {
    let mut session =
        Session::new(BridgeConfig::default(), MemoryHost::new()).expect("Failed to create session");
    let (sink, events) = ChannelSink::bounded(16);
    session.register_sink(sink);

    let handle = session.handle();
    for callback in [HostLifecycle::Start, HostLifecycle::Resume, HostLifecycle::Pause, HostLifecycle::Pause] {
        handle.lifecycle(callback).expect("post lifecycle");
    }
    session.pump_at(Instant::now());

    let statuses: Vec<_> = events
        .try_iter()
        .map(|event| event.to_json()["data"]["status"].clone())
        .collect();
    assert_eq!(
        statuses,
        vec![json!("connecting"), json!("foreground"), json!("background"), json!("background")]
    );
    assert_eq!(session.connection_state(), ConnectionState::Background);
}

#[test]
fn test_events_without_sink_are_dropped() {
    let mut session =
        Session::new(BridgeConfig::default(), MemoryHost::new()).expect("Failed to create session");
    session.on_lifecycle(HostLifecycle::Start);

    let (sink, events) = ChannelSink::bounded(4);
    session.register_sink(sink);
    session.on_lifecycle(HostLifecycle::Resume);
    assert_eq!(events.try_iter().count(), 1);

    // Last registration wins.
    let (second, second_events) = ChannelSink::bounded(4);
    session.register_sink(second);
    session.on_lifecycle(HostLifecycle::Pause);
    assert_eq!(events.try_iter().count(), 0);
    assert_eq!(second_events.try_iter().count(), 1);
}

#[test]
fn test_full_sink_drops_without_blocking() {
    let mut session =
        Session::new(BridgeConfig::default(), MemoryHost::new()).expect("Failed to create session");
    let (sink, events) = ChannelSink::bounded(1);
    session.register_sink(sink);

    session.on_lifecycle(HostLifecycle::Start);
    session.on_lifecycle(HostLifecycle::Resume);
    assert_eq!(events.try_iter().count(), 1);
}

#[test]
fn test_resolved_image_is_applied() {
    let resolver = Arc::new(
        PooledImageResolver::from_config(&BridgeConfig::default(), |reference, _| {
            assert_eq!(reference.as_str(), "asset://cover");
            Ok(ImageHandle(42))
        })
        .expect("Failed to create resolver"),
    );
    let mut session = Session::new(BridgeConfig::default(), MemoryHost::new())
        .expect("Failed to create session")
        .with_image_resolver(resolver.clone());

    assert!(session.dispatch(grid_root("root")).is_ok());
    assert!(session.dispatch(list_with_image("album", "track", "asset://cover")).is_ok());
    assert_eq!(session.pending_image_loads(), 1);

    resolver.wait_idle();
    session.pump_at(Instant::now());

    assert_eq!(session.pending_image_loads(), 0);
    let native = session.host().top_native().and_then(NativeTemplate::as_list).cloned();
    let native = native.expect("top is a list");
    assert_eq!(native.rows()[0].image, Some(ImageHandle(42)));
}

#[test]
fn test_image_for_popped_screen_is_discarded() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let resolver = Arc::new(
        PooledImageResolver::new(1, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ImageHandle(7))
        })
        .expect("Failed to create resolver"),
    );
    let mut session = Session::new(BridgeConfig::default(), MemoryHost::new())
        .expect("Failed to create session")
        .with_image_resolver(resolver.clone());

    assert!(session.dispatch(grid_root("root")).is_ok());
    assert!(session.dispatch(list_with_image("album", "track", "asset://cover")).is_ok());
    let album_handle = *session.host().screens().last().expect("album screen");

    // The user backs out before the load lands.
    assert!(session.dispatch(Command::bare(Method::PopTemplate)).is_ok());
    assert_eq!(session.pending_image_loads(), 0);

    resolver.wait_idle();
    session.pump_at(Instant::now());

    assert_eq!(session.host().invalidations(album_handle), 0);
    assert_eq!(session.stack().depth(), 1);
    assert!(loads.load(Ordering::SeqCst) <= 1);
}

#[test]
fn test_failed_image_load_leaves_row_unchanged() {
    let resolver = Arc::new(
        PooledImageResolver::new(1, |_, _| Err("not found".to_string()))
            .expect("Failed to create resolver"),
    );
    let mut session = Session::new(BridgeConfig::default(), MemoryHost::new())
        .expect("Failed to create session")
        .with_image_resolver(resolver.clone());

    assert!(session.dispatch(grid_root("root")).is_ok());
    assert!(session.dispatch(list_with_image("album", "track", "asset://missing")).is_ok());
    let album_handle = *session.host().screens().last().expect("album screen");

    resolver.wait_idle();
    session.pump_at(Instant::now());

    assert_eq!(session.pending_image_loads(), 0);
    assert_eq!(session.host().invalidations(album_handle), 0);
    let native = session.host().top_native().and_then(NativeTemplate::as_list).cloned();
    assert_eq!(native.expect("list").rows()[0].image, None);
}
