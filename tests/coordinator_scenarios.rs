mod support;

use std::time::Duration;

use deepnote_signin_lib::test_support::{session_for, RecordingBridge};
use deepnote_signin_lib::{
    GatewayOutcome, SignInError, SignInOutcome, SignInProgress, SignInProvider,
    PRESENTATION_UNAVAILABLE_MESSAGE, TOKEN_MISSING_MESSAGE, USER_CANCELLED_MESSAGE,
};
use support::{google_credential, HarnessBuilder};

#[tokio::test]
async fn google_happy_path_exchanges_credential_and_returns_to_idle() {
    let h = HarnessBuilder::new()
        .google(|g| g.then(Ok(google_credential(Some("google-id-token")))))
        .build();

    let outcome = h.coordinator.start_google_sign_in().await;

    assert_eq!(
        outcome,
        SignInOutcome::SignedIn(session_for(SignInProvider::Google))
    );
    assert_eq!(h.google.calls(), 1);
    assert_eq!(h.google.surfaces_seen(), 1);
    let exchanged = h.bridge.credentials();
    assert_eq!(exchanged.len(), 1);
    assert_eq!(exchanged[0].id_token(), Some("google-id-token"));
    assert_eq!(exchanged[0].access_token(), Some("ya29.test-access"));
    assert_eq!(h.coordinator.active_provider(), None);
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn google_without_surface_fails_without_calling_gateway() {
    let h = HarnessBuilder::new().without_surface().build();

    let outcome = h.coordinator.start_google_sign_in().await;

    assert_eq!(outcome, SignInOutcome::Failed);
    assert_eq!(h.google.calls(), 0);
    assert_eq!(h.coordinator.active_provider(), None);
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some(PRESENTATION_UNAVAILABLE_MESSAGE)
    );
}

#[tokio::test]
async fn apple_does_not_need_host_surface_from_coordinator() {
    let h = HarnessBuilder::new()
        .without_surface()
        .apple(|g| {
            g.then(Ok(GatewayOutcome::Session(session_for(
                SignInProvider::Apple,
            ))))
        })
        .build();

    let outcome = h.coordinator.start_apple_sign_in().await;

    assert_eq!(
        outcome,
        SignInOutcome::SignedIn(session_for(SignInProvider::Apple))
    );
    assert_eq!(h.apple.surfaces_seen(), 0);
    assert!(h.bridge.credentials().is_empty());
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn credential_without_id_token_reports_token_missing() {
    let h = HarnessBuilder::new()
        .google(|g| g.then(Ok(google_credential(None))))
        .build();

    assert_eq!(h.coordinator.start_google_sign_in().await, SignInOutcome::Failed);
    assert!(h.bridge.credentials().is_empty());
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some(TOKEN_MISSING_MESSAGE)
    );
}

#[tokio::test]
async fn blank_id_token_is_treated_as_missing() {
    let h = HarnessBuilder::new()
        .google(|g| g.then(Ok(google_credential(Some("   ")))))
        .build();

    assert_eq!(h.coordinator.start_google_sign_in().await, SignInOutcome::Failed);
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some(TOKEN_MISSING_MESSAGE)
    );
}

#[tokio::test]
async fn exchange_rejection_surfaces_backend_message_verbatim() {
    let h = HarnessBuilder::new()
        .google(|g| g.then(Ok(google_credential(Some("id")))))
        .bridge(RecordingBridge::failing("INVALID_IDP_RESPONSE"))
        .build();

    assert_eq!(h.coordinator.start_google_sign_in().await, SignInOutcome::Failed);
    assert_eq!(h.bridge.credentials().len(), 1);
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some("INVALID_IDP_RESPONSE")
    );
    assert!(!h.coordinator.is_busy());
}

#[tokio::test]
async fn every_gateway_failure_kind_returns_to_idle_with_its_message() {
    let cases = [
        (SignInError::UserCancelled, USER_CANCELLED_MESSAGE.to_string()),
        (
            SignInError::ProviderFailure("network down".into()),
            "network down".to_string(),
        ),
        (
            SignInError::ExchangeFailed("LINE backend rejected".into()),
            "LINE backend rejected".to_string(),
        ),
        (
            SignInError::TokenMissing,
            TOKEN_MISSING_MESSAGE.to_string(),
        ),
    ];

    for (err, expected) in cases {
        let h = HarnessBuilder::new().line(|g| g.then(Err(err))).build();

        assert_eq!(h.coordinator.start_line_sign_in().await, SignInOutcome::Failed);
        assert_eq!(h.coordinator.active_provider(), None);
        assert_eq!(h.coordinator.last_error(), Some(expected));
    }
}

#[tokio::test]
async fn retry_after_failure_is_accepted_and_keeps_stale_error_on_success() {
    let h = HarnessBuilder::new()
        .apple(|g| {
            g.then(Err(SignInError::UserCancelled))
                .then(Ok(GatewayOutcome::Session(session_for(
                    SignInProvider::Apple,
                ))))
        })
        .build();

    assert_eq!(h.coordinator.start_apple_sign_in().await, SignInOutcome::Failed);
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some(USER_CANCELLED_MESSAGE)
    );

    let outcome = h.coordinator.start_apple_sign_in().await;
    assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
    assert_eq!(h.apple.calls(), 2);
    assert_eq!(h.coordinator.active_provider(), None);
    assert_eq!(
        h.coordinator.last_error().as_deref(),
        Some(USER_CANCELLED_MESSAGE)
    );
}

#[tokio::test]
async fn start_while_another_attempt_is_in_flight_is_ignored() {
    let h = HarnessBuilder::new()
        .apple(|g| {
            g.gated().then(Ok(GatewayOutcome::Session(session_for(
                SignInProvider::Apple,
            ))))
        })
        .build();

    let handle = h
        .coordinator
        .spawn_sign_in(SignInProvider::Apple)
        .expect("accepted");
    assert_eq!(h.coordinator.active_provider(), Some(SignInProvider::Apple));
    h.apple.entered().await;

    assert_eq!(h.coordinator.start_google_sign_in().await, SignInOutcome::Ignored);
    assert_eq!(h.coordinator.start_line_sign_in().await, SignInOutcome::Ignored);
    assert!(h
        .coordinator
        .spawn_sign_in(SignInProvider::Apple)
        .is_none());
    assert_eq!(h.google.calls(), 0);
    assert_eq!(h.line.calls(), 0);
    assert_eq!(h.apple.calls(), 1);
    assert_eq!(h.coordinator.active_provider(), Some(SignInProvider::Apple));

    h.apple.release();
    let outcome = handle.await.expect("join");
    assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
    assert_eq!(h.coordinator.active_provider(), None);
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn concurrent_taps_only_run_the_first_provider() {
    let h = HarnessBuilder::new()
        .apple(|g| {
            g.gated().then(Ok(GatewayOutcome::Session(session_for(
                SignInProvider::Apple,
            ))))
        })
        .google(|g| g.then(Ok(google_credential(Some("id")))))
        .build();

    let (apple, google) = tokio::join!(h.coordinator.start_apple_sign_in(), async {
        h.apple.entered().await;
        let outcome = h.coordinator.start_google_sign_in().await;
        h.apple.release();
        outcome
    });

    assert!(matches!(apple, SignInOutcome::SignedIn(_)));
    assert_eq!(google, SignInOutcome::Ignored);
    assert_eq!(h.apple.calls(), 1);
    assert_eq!(h.google.calls(), 0);
    assert!(h.bridge.credentials().is_empty());
}

#[tokio::test]
async fn abandoned_attempt_returns_to_idle_without_error() {
    let h = HarnessBuilder::new().line(|g| g.gated()).build();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        h.coordinator.start_line_sign_in(),
    )
    .await;

    assert!(timed_out.is_err());
    assert_eq!(h.line.calls(), 1);
    assert_eq!(h.coordinator.active_provider(), None);
    assert_eq!(h.coordinator.last_error(), None);

    h.line.push(Ok(GatewayOutcome::Session(session_for(
        SignInProvider::Line,
    ))));
    h.line.release();
    assert!(matches!(
        h.coordinator.start_line_sign_in().await,
        SignInOutcome::SignedIn(_)
    ));
}

#[tokio::test]
async fn watch_subscribers_observe_attempting_then_idle() {
    let h = HarnessBuilder::new()
        .line(|g| g.gated().then(Err(SignInError::UserCancelled)))
        .build();
    let mut rx = h.coordinator.subscribe();
    assert!(!rx.borrow_and_update().is_busy());

    let handle = h
        .coordinator
        .spawn_sign_in(SignInProvider::Line)
        .expect("accepted");

    rx.changed().await.expect("sender alive");
    {
        let snapshot = rx.borrow_and_update();
        assert_eq!(snapshot.active_provider, Some(SignInProvider::Line));
        assert!(!snapshot.button_state(SignInProvider::Google).enabled);
        assert!(snapshot.button_state(SignInProvider::Line).loading);
    }

    h.line.entered().await;
    h.line.release();
    assert_eq!(handle.await.expect("join"), SignInOutcome::Failed);

    rx.changed().await.expect("sender alive");
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.active_provider, None);
    assert_eq!(snapshot.last_error.as_deref(), Some(USER_CANCELLED_MESSAGE));
}

#[tokio::test]
async fn progress_events_follow_the_attempt() {
    let h = HarnessBuilder::new()
        .google(|g| g.then(Ok(google_credential(Some("id")))))
        .build();
    let mut progress = h.coordinator.progress();

    h.coordinator.start_google_sign_in().await;

    let provider = SignInProvider::Google;
    let mut seen = Vec::new();
    while let Ok(event) = progress.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SignInProgress::Started { provider },
            SignInProgress::AwaitingUser { provider },
            SignInProgress::Exchanging { provider },
            SignInProgress::Completed { provider },
        ]
    );
}

#[tokio::test]
async fn ignored_start_is_reported_on_progress_channel() {
    let h = HarnessBuilder::new().apple(|g| g.gated()).build();
    let mut progress = h.coordinator.progress();

    let handle = h
        .coordinator
        .spawn_sign_in(SignInProvider::Apple)
        .expect("accepted");
    h.apple.entered().await;
    assert_eq!(h.coordinator.start_google_sign_in().await, SignInOutcome::Ignored);
    h.apple.push(Err(SignInError::UserCancelled));
    h.apple.release();
    handle.await.expect("join");

    let mut seen = Vec::new();
    while let Ok(event) = progress.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&SignInProgress::Ignored {
        provider: SignInProvider::Google,
        active: SignInProvider::Apple,
    }));
    assert_eq!(
        seen.last(),
        Some(&SignInProgress::Failed {
            provider: SignInProvider::Apple,
            kind: "user_cancelled",
        })
    );
}
