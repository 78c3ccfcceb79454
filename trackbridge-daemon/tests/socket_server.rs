//! Drives a real daemon over its Unix socket with a stubbed sync runner.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use trackbridge_core::config::DaemonSettings;
use trackbridge_daemon::paths::socket_path;
use trackbridge_daemon::{
    request_status, request_stop, request_sync, run, send_request, DaemonError, DaemonRequest,
    SyncRunner,
};
use trackbridge_sync::RunSummary;

fn counting_runner(calls: Arc<AtomicUsize>) -> SyncRunner {
    Arc::new(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n == 1 {
            return Err("linear returned 503".to_string());
        }
        Ok(RunSummary {
            scanned: 3,
            mapped: 2,
            ..RunSummary::default()
        })
    })
}

async fn blocking<T: Send + 'static>(
    home: &Path,
    f: impl FnOnce(PathBuf) -> T + Send + 'static,
) -> T {
    let home = home.to_path_buf();
    tokio::task::spawn_blocking(move || f(home))
        .await
        .expect("blocking client call")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_sync_and_stop_round_trip() {
    let home = TempDir::new().expect("home");
    let calls = Arc::new(AtomicUsize::new(0));
    let settings = DaemonSettings {
        poll_interval_secs: 0,
        trigger_token: Some("s3cret".to_string()),
    };
    let daemon = tokio::spawn(run(
        home.path().to_path_buf(),
        settings,
        counting_runner(calls.clone()),
    ));

    let status = assert_ok!(blocking(home.path(), |h| request_status(&h)).await);
    assert_eq!(status["running"], true);
    assert_eq!(status["runs"], 0);
    assert_eq!(status["token_required"], true);

    let err = assert_err!(blocking(home.path(), |h| request_sync(&h, None)).await);
    assert!(matches!(err, DaemonError::Unauthorized), "got {err}");
    let err = assert_err!(
        blocking(home.path(), |h| request_sync(&h, Some("wrong".into()))).await
    );
    assert!(matches!(err, DaemonError::Unauthorized), "got {err}");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "refused syncs never run");

    let summary =
        assert_ok!(blocking(home.path(), |h| request_sync(&h, Some("s3cret".into()))).await);
    assert_eq!(summary["scanned"], 3);
    assert_eq!(summary["mapped"], 2);

    let err = assert_err!(
        blocking(home.path(), |h| request_sync(&h, Some("s3cret".into()))).await
    );
    assert!(
        matches!(err, DaemonError::Protocol(ref m) if m == "linear returned 503"),
        "got {err}"
    );

    let status = assert_ok!(blocking(home.path(), |h| request_status(&h)).await);
    assert_eq!(status["runs"], 2);
    assert_eq!(status["failures"], 1);
    assert_eq!(status["last_error"], "linear returned 503");
    assert_eq!(status["last_run"]["source"], "socket");
    assert!(status["last_success_at"].is_string());

    assert_ok!(blocking(home.path(), |h| request_stop(&h)).await);
    assert_ok!(daemon.await.expect("daemon task"));
    assert!(!socket_path(home.path()).exists(), "socket removed on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_command_and_bad_json_are_answered_not_fatal() {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;

    let home = TempDir::new().expect("home");
    let daemon = tokio::spawn(run(
        home.path().to_path_buf(),
        DaemonSettings {
            poll_interval_secs: 0,
            trigger_token: None,
        },
        counting_runner(Arc::new(AtomicUsize::new(0))),
    ));
    assert_ok!(blocking(home.path(), |h| request_status(&h)).await);

    let response = assert_ok!(
        blocking(home.path(), |h| send_request(&h, &DaemonRequest::new("reindex"))).await
    );
    assert!(!response.ok);
    assert_eq!(response.error.as_deref(), Some("unknown command 'reindex'"));

    let line = blocking(home.path(), |h| {
        let mut stream = UnixStream::connect(socket_path(&h)).expect("connect");
        stream.write_all(b"not json\n").expect("write");
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).expect("read");
        line
    })
    .await;
    assert!(line.contains("invalid request JSON"), "got {line}");

    // No token configured: any sync request is accepted.
    assert_ok!(blocking(home.path(), |h| request_sync(&h, None)).await);

    assert_ok!(blocking(home.path(), |h| request_stop(&h)).await);
    assert_ok!(daemon.await.expect("daemon task"));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn socket_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().expect("home");
    let daemon = tokio::spawn(run(
        home.path().to_path_buf(),
        DaemonSettings {
            poll_interval_secs: 0,
            trigger_token: None,
        },
        counting_runner(Arc::new(AtomicUsize::new(0))),
    ));
    assert_ok!(blocking(home.path(), |h| request_status(&h)).await);

    let mode = std::fs::metadata(socket_path(home.path()))
        .expect("socket metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);

    assert_ok!(blocking(home.path(), |h| request_stop(&h)).await);
    assert_ok!(daemon.await.expect("daemon task"));
}

#[test]
fn clients_report_a_missing_daemon() {
    let home = TempDir::new().expect("home");
    let err = request_stop(home.path()).unwrap_err();
    assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
}
