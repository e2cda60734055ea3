// tests/reload_signals.rs

//! Reload broadcasting: one signal per batch, style scoping, and the
//! WebSocket channel end to end.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::timeout;

use sitepipe::reload::{spawn_reload_server, ReloadBroadcaster, ReloadScope, ReloadSignal};
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn one_notify_delivers_exactly_one_signal_to_every_client() -> TestResult {
    init_tracing();

    let broadcaster = ReloadBroadcaster::new("/project/dist");
    let mut first = broadcaster.subscribe();
    let mut second = broadcaster.subscribe();
    assert_eq!(broadcaster.client_count(), 2);

    broadcaster.notify(&[
        PathBuf::from("/project/dist/index.html"),
        PathBuf::from("/project/dist/assets/styles/main.css"),
    ]);

    for rx in [&mut first, &mut second] {
        let signal = rx.recv().await?;
        assert_eq!(signal.scope, ReloadScope::Full);
        assert_eq!(
            signal.paths,
            vec![
                "index.html".to_string(),
                "assets/styles/main.css".to_string()
            ]
        );
        // Batch-level coalescing: one batch, one signal.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    Ok(())
}

#[tokio::test]
async fn style_only_batches_scope_to_styles() -> TestResult {
    init_tracing();

    let broadcaster = ReloadBroadcaster::new("/project/dist");
    let mut rx = broadcaster.subscribe();

    broadcaster.notify(&[
        PathBuf::from("/project/dist/assets/styles/main.css"),
        PathBuf::from("/project/dist/assets/styles/main.css.map"),
    ]);

    let signal = rx.recv().await?;
    assert_eq!(signal.scope, ReloadScope::Styles);

    Ok(())
}

#[tokio::test]
async fn empty_batches_are_not_broadcast() {
    init_tracing();

    let broadcaster = ReloadBroadcaster::new("/project/dist");
    let mut rx = broadcaster.subscribe();

    broadcaster.notify(&[]);

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn notify_without_clients_is_harmless() {
    init_tracing();

    let broadcaster = ReloadBroadcaster::new("/project/dist");
    assert_eq!(broadcaster.client_count(), 0);
    broadcaster.notify(&[PathBuf::from("/project/dist/index.html")]);
}

#[tokio::test]
async fn websocket_client_receives_reload_signal() -> TestResult {
    with_timeout(async {
        init_tracing();

        let broadcaster = ReloadBroadcaster::new("/project/dist");
        let server = spawn_reload_server("127.0.0.1:0", broadcaster.clone()).await?;
        let addr = server.addr();

        let (mut socket, _resp) =
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;

        // The subscription is created during the upgrade; wait for it to
        // land before notifying.
        let mut tries = 0;
        while broadcaster.client_count() == 0 {
            tries += 1;
            assert!(tries < 200, "client never subscribed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        broadcaster.notify(&[PathBuf::from("/project/dist/assets/styles/main.css")]);

        let message = timeout(Duration::from_secs(3), socket.next())
            .await
            .expect("signal must arrive")
            .expect("stream open")?;
        let text = message.into_text()?;
        let signal: ReloadSignal = serde_json::from_str(&text)?;

        assert_eq!(signal.scope, ReloadScope::Styles);
        assert_eq!(signal.paths, vec!["assets/styles/main.css".to_string()]);

        server.stop();
        Ok(())
    })
    .await
}
