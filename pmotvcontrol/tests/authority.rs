//! Ownership, source chain and error policy as seen from the authority.

mod common;

use std::sync::Arc;

use common::{Call, ClientBuilder, FakeClock, FakeSession, Presence, deliver, ready_and_start};
use pmotvcontrol::{
    BackendEvent, BackendKind, ControllerError, PlayerEvent, PlayerSettings, PlayerState,
    RepeatMode,
};
use pmotvsource::{
    MediaErrorCode, MediaUrl, PlayerId, PlaylistSource, QueueSource, Source, SourceManager,
    StreamSource,
};

const URL_A: &str = "https://example.com/a.mp4";

fn session() -> (FakeClock, FakeSession) {
    let clock = FakeClock::default();
    clock.set(100.0);
    let session = FakeSession::default();
    session.set_owner(Some(PlayerId(1)));
    (clock, session)
}

/// Queue (index 0) in front of a two-track playlist (index 1).
fn queue_and_playlist() -> SourceManager {
    let mut manager = SourceManager::new();
    manager.push(Source::Queue(QueueSource::new("queue")));
    let mut playlist = PlaylistSource::new("main");
    playlist.load(vec![
        MediaUrl::new("https://example.com/p0.mp4"),
        MediaUrl::new("https://example.com/p1.mp4"),
    ]);
    manager.push(Source::Playlist(playlist));
    manager
}

fn last_load(client: &common::Client) -> Option<String> {
    client.backend.loads().last().cloned()
}

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn test_lock_denies_and_whitelist_overrides() {
    let (clock, session) = session();
    let mut admin = ClientBuilder::new(1).admin().build(&clock, &session);
    let mut guest = ClientBuilder::new(2).build(&clock, &session);
    let mut trusted = ClientBuilder::new(3)
        .whitelist(vec![PlayerId(3)])
        .build(&clock, &session);

    admin.controller.set_locked(true).unwrap();
    admin.controller.tick();
    deliver(&session, &mut [&mut admin, &mut guest, &mut trusted]);
    assert!(guest.controller.record().locked);

    assert!(!guest.controller.can_take_control(false));
    assert!(guest.controller.can_take_control(true));
    assert!(matches!(
        guest.controller.play_url(MediaUrl::new(URL_A)),
        Err(ControllerError::OwnershipDenied)
    ));
    assert!(matches!(
        guest.controller.set_locked(false),
        Err(ControllerError::NotAuthorized(_))
    ));
    assert_eq!(session.owner(), Some(PlayerId(1)));

    // Taking control bumps the video number by two.
    trusted.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    assert_eq!(session.owner(), Some(PlayerId(3)));
    assert_eq!(trusted.controller.record().video_number, 2);

    admin.controller.tick();
    trusted.controller.tick();
    deliver(&session, &mut [&mut admin, &mut guest, &mut trusted]);
    assert_eq!(admin.backend.loads(), vec![URL_A.to_string()]);
    assert_eq!(guest.backend.loads(), vec![URL_A.to_string()]);

    // The admin can take it back despite the lock.
    admin
        .controller
        .play_url(MediaUrl::new("https://example.com/b.mp4"))
        .unwrap();
    assert_eq!(session.owner(), Some(PlayerId(1)));
    assert_eq!(admin.controller.record().video_number, 4);
}

#[test]
fn test_locked_session_refuses_guest_queueing() {
    let (clock, session) = session();
    let mut admin = ClientBuilder::new(1)
        .admin()
        .sources(queue_and_playlist())
        .build(&clock, &session);
    let mut guest = ClientBuilder::new(2)
        .sources(queue_and_playlist())
        .build(&clock, &session);

    admin.controller.set_locked(true).unwrap();
    admin.controller.tick();
    deliver(&session, &mut [&mut admin, &mut guest]);

    assert!(matches!(
        guest
            .controller
            .enqueue(0, MediaUrl::new("https://example.com/q0.mp4")),
        Err(ControllerError::OwnershipDenied)
    ));
    assert!(matches!(
        guest.controller.enqueue_catalog(0, 1, 0),
        Err(ControllerError::OwnershipDenied)
    ));
    assert_eq!(session.owner(), Some(PlayerId(1)));
    assert!(guest.controller.sources().queue(0).unwrap().is_empty());

    // Still no way in for transport either.
    assert!(matches!(
        guest.controller.stop(),
        Err(ControllerError::OwnershipDenied)
    ));
}

#[test]
fn test_unlocked_session_lets_anyone_play() {
    let (clock, session) = session();
    let mut first = ClientBuilder::new(1).build(&clock, &session);
    let mut second = ClientBuilder::new(2).build(&clock, &session);

    first.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    first.controller.tick();
    deliver(&session, &mut [&mut first, &mut second]);

    second
        .controller
        .play_url(MediaUrl::new("https://example.com/b.mp4"))
        .unwrap();
    assert!(second.controller.is_owner());
    assert_eq!(second.controller.record().video_number, 3);
}

#[test]
fn test_invalid_urls_are_rejected() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1).build(&clock, &session);

    assert!(matches!(
        client.controller.play_url(MediaUrl::new("   ")),
        Err(ControllerError::EmptyUrl)
    ));
    assert!(matches!(
        client.controller.play_url(MediaUrl::new("not a url")),
        Err(ControllerError::MalformedUrl(_))
    ));
    assert_eq!(client.controller.record().video_number, 0);
    assert!(client.backend.calls().is_empty());
}

// ============================================================================
// Source chain
// ============================================================================

#[test]
fn test_queue_takes_precedence_over_playlist() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1)
        .sources(queue_and_playlist())
        .build(&clock, &session);

    client.controller.trigger_play().unwrap();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/p0.mp4"));
    assert_eq!(client.controller.record().source_index, Some(1));

    client
        .controller
        .enqueue(0, MediaUrl::new("https://example.com/q0.mp4"))
        .unwrap();
    ready_and_start(&mut client, 60.0);
    client.backend.emit(BackendEvent::End);
    client.controller.tick();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/q0.mp4"));
    assert_eq!(client.controller.record().source_index, Some(0));
    assert!(client.controller.sources().queue(0).unwrap().is_empty());

    ready_and_start(&mut client, 60.0);
    client.backend.emit(BackendEvent::End);
    client.controller.tick();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/p1.mp4"));

    // End of the playlist without repeat: nothing left.
    ready_and_start(&mut client, 60.0);
    client.backend.emit(BackendEvent::End);
    client.controller.tick();
    assert!(client.controller.record().is_empty());
    assert_eq!(client.controller.state(), PlayerState::Stopped);
}

#[test]
fn test_source_chain_is_replicated() {
    let (clock, session) = session();
    let mut authority = ClientBuilder::new(1)
        .sources(queue_and_playlist())
        .build(&clock, &session);
    let mut follower = ClientBuilder::new(2)
        .sources(queue_and_playlist())
        .build(&clock, &session);

    authority
        .controller
        .enqueue(0, MediaUrl::new("https://example.com/q0.mp4"))
        .unwrap();
    authority.controller.tick();
    deliver(&session, &mut [&mut authority, &mut follower]);

    let queue = follower.controller.sources().queue(0).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.entries()[0].owner, PlayerId(1));
}

#[test]
fn test_repeat_single_restarts_the_same_url() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1)
        .sources(queue_and_playlist())
        .build(&clock, &session);

    client.controller.set_repeat_mode(RepeatMode::Single).unwrap();
    client.controller.trigger_play().unwrap();
    ready_and_start(&mut client, 60.0);
    client.backend.emit(BackendEvent::End);
    client.controller.tick();

    assert_eq!(
        client.backend.loads(),
        vec!["https://example.com/p0.mp4".to_string(); 2]
    );
    assert_eq!(client.controller.record().video_number, 2);

    // Skip ignores repeat-single.
    client.controller.skip().unwrap();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/p1.mp4"));
}

#[test]
fn test_repeat_all_wraps_the_playlist() {
    let (clock, session) = session();
    let settings = PlayerSettings {
        repeat_mode: RepeatMode::All,
        ..Default::default()
    };
    let mut client = ClientBuilder::new(1)
        .sources(queue_and_playlist())
        .settings(settings)
        .build(&clock, &session);

    client.controller.trigger_play().unwrap();
    for expected in ["p1", "p0", "p1"] {
        ready_and_start(&mut client, 60.0);
        client.backend.emit(BackendEvent::End);
        client.controller.tick();
        assert_eq!(
            last_load(&client),
            Some(format!("https://example.com/{expected}.mp4"))
        );
    }
}

#[test]
fn test_previous_goes_back_in_the_playlist() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1)
        .sources(queue_and_playlist())
        .build(&clock, &session);

    client.controller.trigger_play().unwrap();
    client.controller.skip().unwrap();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/p1.mp4"));
    client.controller.previous().unwrap();
    assert_eq!(last_load(&client).as_deref(), Some("https://example.com/p0.mp4"));
    assert!(matches!(
        client.controller.previous(),
        Err(ControllerError::NothingToPlay)
    ));
}

// ============================================================================
// Error policy
// ============================================================================

#[test]
fn test_stream_retries_then_gives_up() {
    let (clock, session) = session();
    let mut sources = SourceManager::new();
    sources.push(Source::Stream(StreamSource::new(
        "live",
        MediaUrl::new("rtsp://live.example.com/cam"),
    )));
    let mut client = ClientBuilder::new(1).sources(sources).build(&clock, &session);

    client.controller.trigger_play().unwrap();
    assert_eq!(client.controller.active_backend_kind(), BackendKind::Stream);

    for attempt in 1..=3 {
        client.backend.emit(BackendEvent::Error(MediaErrorCode::RateLimited));
        client.controller.tick();
        assert_eq!(client.controller.state(), PlayerState::Error);
        assert_eq!(client.controller.pending_load_time(), clock_now(&clock) + 10.0);
        clock.advance(10.0);
        client.controller.tick();
        assert_eq!(client.backend.loads().len(), attempt + 1);
    }

    // Budget exhausted: advance, and the stream does not replay itself.
    client.backend.emit(BackendEvent::Error(MediaErrorCode::RateLimited));
    client.controller.tick();
    clock.advance(10.0);
    client.controller.tick();
    assert_eq!(client.backend.loads().len(), 4);
    assert!(client.controller.record().is_empty());
}

fn clock_now(clock: &FakeClock) -> f64 {
    use pmotvcontrol::NetworkClock;
    clock.now()
}

#[test]
fn test_decoder_fallback_happens_once() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1).build(&clock, &session);
    let url = "https://example.com/page";

    client.controller.play_url(MediaUrl::new(url)).unwrap();
    assert_eq!(client.backend.calls()[0], Call::Load(url.to_string(), BackendKind::Progressive));

    client.backend.emit(BackendEvent::Error(MediaErrorCode::PlayerError));
    client.controller.tick();
    assert_eq!(
        client.backend.calls().last(),
        Some(&Call::Load(url.to_string(), BackendKind::Stream))
    );
    assert_eq!(client.controller.record().video_number, 1);
    assert_eq!(client.controller.state(), PlayerState::Loading);

    // Second failure goes through the regular retry policy.
    client.backend.emit(BackendEvent::Error(MediaErrorCode::PlayerError));
    client.controller.tick();
    assert_eq!(client.controller.state(), PlayerState::Error);
    assert_eq!(client.controller.pending_load_time(), 110.0);

    clock.advance(10.0);
    client.controller.tick();
    assert_eq!(client.controller.record().video_number, 2);
    assert_eq!(
        client.backend.calls().last(),
        Some(&Call::Load(url.to_string(), BackendKind::Stream))
    );
}

#[test]
fn test_stop_cancels_pending_retry() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1).build(&clock, &session);

    client.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    client.backend.emit(BackendEvent::Error(MediaErrorCode::AccessDenied));
    client.controller.tick();
    assert_eq!(client.controller.state(), PlayerState::Error);
    assert_eq!(client.controller.pending_load_time(), 110.0);

    client.controller.stop().unwrap();
    clock.advance(15.0);
    client.controller.tick();

    assert_eq!(client.backend.loads().len(), 1);
    assert!(client.controller.record().is_empty());
    assert_eq!(client.controller.state(), PlayerState::Stopped);
    assert_eq!(client.controller.pending_load_time(), 0.0);
}

#[test]
fn test_errors_stop_without_retry_policy() {
    let (clock, session) = session();
    let settings = PlayerSettings {
        retry_on_error: false,
        ..Default::default()
    };
    let mut client = ClientBuilder::new(1).settings(settings).build(&clock, &session);

    client.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    client.backend.emit(BackendEvent::Error(MediaErrorCode::AccessDenied));
    client.controller.tick();
    assert_eq!(client.backend.calls().last(), Some(&Call::Stop));
    assert_eq!(client.controller.last_error(), Some(MediaErrorCode::AccessDenied));

    clock.advance(30.0);
    client.controller.tick();
    assert_eq!(client.backend.loads().len(), 1);
}

#[test]
fn test_stale_backend_events_are_ignored() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1).build(&clock, &session);

    client.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    client.controller.stop().unwrap();
    client.backend.emit(BackendEvent::Ready { duration: 60.0 });
    client.controller.tick();
    assert!(!client.controller.is_video_ready());
    assert_eq!(client.backend.play_count(), 0);
}

// ============================================================================
// Presence and observers
// ============================================================================

#[test]
fn test_presence_gates_loading() {
    let (clock, session) = session();
    let presence = Arc::new(Presence::default());
    let mut authority = ClientBuilder::new(1).build(&clock, &session);
    let mut follower = ClientBuilder::new(2)
        .presence(presence.clone())
        .build(&clock, &session);

    authority.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    authority.controller.tick();
    deliver(&session, &mut [&mut authority, &mut follower]);
    assert!(follower.backend.loads().is_empty());

    presence.set(true);
    follower.controller.on_presence_changed();
    assert_eq!(follower.backend.loads(), vec![URL_A.to_string()]);

    presence.set(false);
    follower.controller.on_presence_changed();
    assert_eq!(follower.backend.calls().last(), Some(&Call::Stop));
    assert_eq!(follower.controller.state(), PlayerState::Stopped);
}

#[test]
fn test_observers_receive_events() {
    let (clock, session) = session();
    let mut client = ClientBuilder::new(1).admin().build(&clock, &session);
    let all = client.controller.events().subscribe();
    let locks = client.controller.events().subscribe_to(PlayerEvent::LockUpdate);

    client.controller.play_url(MediaUrl::new(URL_A)).unwrap();
    client.controller.set_locked(true).unwrap();

    let seen: Vec<PlayerEvent> = all.try_iter().collect();
    assert!(seen.contains(&PlayerEvent::VideoStateUpdate));
    assert!(seen.contains(&PlayerEvent::LockUpdate));
    assert_eq!(locks.try_iter().collect::<Vec<_>>(), vec![PlayerEvent::LockUpdate]);
}
