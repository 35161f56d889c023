//! Integration tests for the blockpreview-sandbox crate.
//!
//! Async tests drive real sessions through their actors; time is paused so
//! handshake deadlines elapse instantly and deterministically.

use std::time::Duration;

use blockpreview_sandbox::{
    CloseReason, ContextMessage, HostMessage, PreviewPipeline, SandboxConfig, SandboxError,
    SandboxHost, SandboxSession, SessionState, UpdateReceipt,
};
use blockpreview_sanitize::{SafeMarkup, SanitizePolicy, sanitize};
use proptest::prelude::*;

fn markup(text: &str) -> SafeMarkup {
    sanitize(&format!("<p>{text}</p>"), &SanitizePolicy::default())
}

fn host() -> SandboxHost {
    SandboxHost::new(SandboxConfig::new().with_handshake_timeout_ms(1000))
}

// ═══════════════════════════════════════════════════════════════════════
//  Sessions
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn handshake_then_queued_updates_in_order() {
    let host = host();
    let (handle, mut context) = host.open();

    assert_eq!(context.recv().await, Some(HostMessage::Handshake));

    for text in ["one", "two", "three"] {
        let receipt = handle.update(markup(text)).await.unwrap();
        assert!(matches!(receipt, UpdateReceipt::Queued { .. }));
    }

    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    let mut delivered = Vec::new();
    for _ in 0..3 {
        match context.recv().await {
            Some(HostMessage::UpdateContent { revision, markup }) => {
                delivered.push((revision, markup.into_string()))
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
    assert_eq!(
        delivered,
        [
            (1, "<p>one</p>".to_string()),
            (2, "<p>two</p>".to_string()),
            (3, "<p>three</p>".to_string()),
        ]
    );

    let receipt = handle.update(markup("four")).await.unwrap();
    assert_eq!(receipt, UpdateReceipt::Delivered { revision: 4 });
    assert_eq!(context.recv().await.and_then(|m| m.revision()), Some(4));
}

#[tokio::test]
async fn acknowledgements_are_visible_in_info() {
    let host = host();
    let (handle, mut context) = host.open();
    context.recv().await;
    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    handle.update(markup("x")).await.unwrap();
    context.recv().await;
    context
        .send(ContextMessage::ContentAck { revision: 1 })
        .await
        .unwrap();

    // Acks are processed in order before a later update is handled.
    handle.update(markup("y")).await.unwrap();
    let info = handle.info();
    assert_eq!(info.state, SessionState::Ready);
    assert_eq!(info.last_acknowledged, Some(1));
}

#[tokio::test(start_paused = true)]
async fn handshake_timeout_closes_session() {
    let host = host();
    let (handle, mut context) = host.open();
    assert_eq!(context.recv().await, Some(HostMessage::Handshake));

    handle.update(markup("never shown")).await.unwrap();

    match handle.ready().await {
        Err(SandboxError::HandshakeTimeout { timeout_ms }) => assert_eq!(timeout_ms, 1000),
        other => panic!("expected handshake timeout, got {other:?}"),
    }
    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(handle.wait_closed().await, CloseReason::HandshakeTimeout);
    assert!(matches!(
        handle.update(markup("late")).await,
        Err(SandboxError::SessionClosed)
    ));
    // The queued update was discarded, not delivered.
    assert_eq!(context.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn ready_before_deadline_survives_it() {
    let host = host();
    let (handle, mut context) = host.open();
    context.recv().await;

    tokio::time::sleep(Duration::from_millis(900)).await;
    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(handle.state(), SessionState::Ready);
}

#[tokio::test]
async fn dropping_context_closes_session() {
    let host = host();
    let (handle, context) = host.open();
    drop(context);
    assert_eq!(handle.wait_closed().await, CloseReason::ContextGone);
    assert!(matches!(
        handle.update(markup("x")).await,
        Err(SandboxError::SessionClosed)
    ));
}

#[tokio::test]
async fn stalled_context_can_still_be_closed() {
    let host = SandboxHost::new(SandboxConfig::new().with_mailbox_capacity(1));
    // The handshake fills the only slot and is never read.
    let (handle, context) = host.open();
    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    for text in ["one", "two", "three"] {
        let receipt = tokio::time::timeout(Duration::from_secs(1), handle.update(markup(text)))
            .await
            .expect("update stalled behind a full mailbox")
            .unwrap();
        assert!(matches!(receipt, UpdateReceipt::Delivered { .. }));
    }

    handle.close().await;
    let reason = tokio::time::timeout(Duration::from_secs(1), handle.wait_closed())
        .await
        .expect("close stalled behind a full mailbox");
    assert_eq!(reason, CloseReason::HostClosed);
    drop(context);
}

#[tokio::test]
async fn slow_context_still_receives_everything_in_order() {
    let host = SandboxHost::new(SandboxConfig::new().with_mailbox_capacity(1));
    let (handle, mut context) = host.open();
    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    for text in ["one", "two", "three"] {
        handle.update(markup(text)).await.unwrap();
    }

    assert_eq!(context.recv().await, Some(HostMessage::Handshake));
    let mut revisions = Vec::new();
    for _ in 0..3 {
        match context.recv().await {
            Some(HostMessage::UpdateContent { revision, .. }) => revisions.push(revision),
            other => panic!("expected update, got {other:?}"),
        }
    }
    assert_eq!(revisions, [1, 2, 3]);
}

#[tokio::test]
async fn ack_before_ready_is_a_protocol_violation() {
    let host = host();
    let (handle, mut context) = host.open();
    context.recv().await;
    context
        .send(ContextMessage::ContentAck { revision: 1 })
        .await
        .unwrap();
    assert_eq!(handle.wait_closed().await, CloseReason::ProtocolViolation);
}

#[tokio::test]
async fn host_close_is_idempotent_and_forgets_session() {
    let host = host();
    let (handle, _context) = host.open();
    let id = handle.id();
    assert!(host.get(&id).is_some());

    host.close(&id).await.unwrap();
    assert_eq!(handle.wait_closed().await, CloseReason::HostClosed);
    assert!(host.get(&id).is_none());
    assert!(matches!(
        host.close(&id).await,
        Err(SandboxError::SessionNotFound { .. })
    ));

    handle.close().await;
    assert!(matches!(
        handle.update(markup("x")).await,
        Err(SandboxError::SessionClosed)
    ));
}

#[tokio::test]
async fn sessions_are_independent() {
    let host = host();
    let (a, mut ctx_a) = host.open();
    let (b, mut ctx_b) = host.open();
    ctx_a.recv().await;
    ctx_b.recv().await;

    ctx_a.send(ContextMessage::PreviewReady).await.unwrap();
    a.ready().await.unwrap();
    a.update(markup("for a")).await.unwrap();
    b.update(markup("for b")).await.unwrap();

    match ctx_a.recv().await {
        Some(HostMessage::UpdateContent { markup, .. }) => assert_eq!(markup.as_str(), "<p>for a</p>"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(b.state(), SessionState::Handshaking);
    assert_eq!(host.live_count(), 2);

    b.close().await;
    b.wait_closed().await;
    assert_eq!(host.live_count(), 1);
    assert_eq!(host.list().len(), 2);
    assert_eq!(host.prune_closed(), 1);
    assert_eq!(host.list().len(), 1);
}

#[tokio::test]
async fn pipeline_output_flows_into_session() {
    let host = host();
    let (handle, mut context) = host.open();
    context.recv().await;
    context.send(ContextMessage::PreviewReady).await.unwrap();
    handle.ready().await.unwrap();

    let raw = serde_json::from_str(
        r#"[{"id":"b1","type":"text","content":"<b>not bold</b>"}]"#,
    )
    .unwrap();
    let preview = PreviewPipeline::default().render(None, raw).unwrap();
    handle.update(preview.markup).await.unwrap();

    match context.recv().await {
        Some(HostMessage::UpdateContent { markup, .. }) => {
            assert_eq!(markup.as_str(), "<p>&lt;b&gt;not bold&lt;/b&gt;</p>")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn mapped_lines_hold_their_blocks_under_every_policy() {
    let raw = || {
        serde_json::from_str(
            r#"[
                {"id":"t0","type":"text","content":"first\nsecond"},
                {"id":"l0","sortIndex":1,"type":"link","url":"https://example.org","text":"go\nnow"},
                {"id":"t1","sortIndex":2,"type":"text","content":"third"},
                {"id":"i0","sortIndex":3,"type":"image","url":"javascript:x","altText":"a\nb"},
                {"id":"t2","sortIndex":4,"type":"text","content":"fourth\nfifth\nsixth"}
            ]"#,
        )
        .unwrap()
    };
    let expected = [
        ("t0", "<p>first\nsecond</p>"),
        ("t1", "<p>third</p>"),
        ("t2", "<p>fourth\nfifth\nsixth</p>"),
    ];

    for policy in [
        SanitizePolicy::default(),
        SanitizePolicy::strict(),
        SanitizePolicy::default().deny_tags(["a", "img"]),
    ] {
        let preview = PreviewPipeline::new(policy).render(None, raw()).unwrap();
        let lines: Vec<&str> = preview.markup.as_str().split('\n').collect();
        assert_eq!(lines.len(), preview.mapping.line_count());

        for (id, fragment) in expected {
            let range = preview
                .mapping
                .iter()
                .find(|r| r.block_id.as_str() == id)
                .unwrap();
            assert_eq!(lines[range.start_line - 1..range.end_line].join("\n"), fragment);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Properties
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    /// However many updates are requested before readiness, they all come
    /// out in request order right after `preview_ready`, exactly once.
    #[test]
    fn queued_updates_flush_in_order(before in 0usize..20, after in 0usize..5, early in any::<bool>()) {
        let mut session = SandboxSession::new();
        let mut expected = Vec::new();

        if early {
            for i in 0..before {
                expected.push(session.request_update(markup(&i.to_string())).unwrap().revision());
            }
            session.context_created().unwrap();
        } else {
            session.context_created().unwrap();
            for i in 0..before {
                expected.push(session.request_update(markup(&i.to_string())).unwrap().revision());
            }
        }
        let handshake = session.take_outbox();
        prop_assert_eq!(handshake, vec![HostMessage::Handshake]);

        session.receive(ContextMessage::PreviewReady).unwrap();
        for i in 0..after {
            expected.push(session.request_update(markup(&format!("late {i}"))).unwrap().revision());
        }

        let delivered: Vec<u64> = session
            .take_outbox()
            .iter()
            .filter_map(HostMessage::revision)
            .collect();
        let in_order: Vec<u64> = (1..=(before + after) as u64).collect();
        prop_assert_eq!(&delivered, &expected);
        prop_assert_eq!(delivered, in_order);
    }
}
