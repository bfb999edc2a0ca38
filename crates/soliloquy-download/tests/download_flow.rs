//! Download manager behavior against an in-memory transport.

mod common;

use std::sync::Arc;

use soliloquy_core::{AppConfig, ModelCatalog};
use soliloquy_download::{
    DownloadError, DownloadEvent, DownloadManager, DownloadManagerConfig, DownloadManagerDeps,
    DownloadManagerPort, DownloadProgress, DownloadStatus,
};
use tokio::sync::watch;

use common::{Behavior, CountingWakeLock, FakeTransport, RecordingEmitter, descriptor, wait_until};

const CONTENT: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

struct Setup {
    dir: tempfile::TempDir,
    transport: Arc<FakeTransport>,
    emitter: RecordingEmitter,
    wake_lock: Arc<CountingWakeLock>,
    manager: DownloadManager,
}

fn setup(transport: FakeTransport) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(transport);
    let emitter = RecordingEmitter::default();
    let wake_lock = Arc::new(CountingWakeLock::default());
    let manager = DownloadManager::new(
        DownloadManagerConfig::new(dir.path().join("models")),
        DownloadManagerDeps {
            transport: transport.clone(),
            emitter: Arc::new(emitter.clone()),
            wake_lock: wake_lock.clone(),
            catalog: ModelCatalog::new(vec![descriptor("tiny", "tiny.gguf")]),
        },
    );
    Setup {
        dir,
        transport,
        emitter,
        wake_lock,
        manager,
    }
}

async fn wait_terminal(rx: &mut watch::Receiver<DownloadProgress>) -> DownloadStatus {
    let progress = rx.wait_for(|p| p.status.is_terminal()).await.unwrap();
    progress.status.clone()
}

#[tokio::test]
async fn completed_download_lands_at_final_name() {
    let s = setup(FakeTransport::new(CONTENT));
    let model = descriptor("tiny", "tiny.gguf");

    let mut rx = s.manager.start_download(&model).await.unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);

    let final_path = s.dir.path().join("models/tiny.gguf");
    assert_eq!(std::fs::read(&final_path).unwrap(), CONTENT);
    assert!(!s.dir.path().join("models/tiny.gguf.part").exists());
    assert!((rx.borrow().fraction() - 1.0).abs() < f64::EPSILON);

    wait_until(|| {
        matches!(
            s.emitter.download_events().last(),
            Some(DownloadEvent::Completed { .. })
        )
    })
    .await;
    let events = s.emitter.download_events();
    assert!(matches!(events.first(), Some(DownloadEvent::Started { .. })));
    assert!(matches!(events.last(), Some(DownloadEvent::Completed { .. })));

    wait_until(|| s.wake_lock.held() == 0).await;
    assert_eq!(s.wake_lock.acquired(), 1);
    assert!(!s.manager.is_downloading("tiny").await);
}

#[tokio::test]
async fn progress_notifications_respect_watermark() {
    let s = setup(FakeTransport::new(CONTENT));
    let mut rx = s
        .manager
        .start_download(&descriptor("tiny", "tiny.gguf"))
        .await
        .unwrap();
    wait_terminal(&mut rx).await;

    let percents = s.emitter.progress_percents();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    // At most one notification per 5-point bucket.
    for pair in percents.windows(2) {
        assert!(pair[1] / 5 > pair[0] / 5, "notifications too close: {pair:?}");
    }
}

#[tokio::test]
async fn cancel_mid_transfer_leaves_no_file() {
    let s = setup(FakeTransport::new(CONTENT).then(Behavior::StallAfter(20)));
    let model = descriptor("tiny", "tiny.gguf");

    let rx = s.manager.start_download(&model).await.unwrap();
    let mut watch = rx.clone();
    watch.wait_for(|p| p.downloaded >= 20).await.unwrap();
    assert!(s.manager.is_downloading("tiny").await);

    s.manager.cancel_download("tiny").await.unwrap();

    assert!(!s.dir.path().join("models/tiny.gguf").exists());
    assert!(!s.dir.path().join("models/tiny.gguf.part").exists());
    assert!(!s.manager.is_downloading("tiny").await);
    assert_eq!(rx.borrow().status, DownloadStatus::Cancelled);
    assert_eq!(s.wake_lock.held(), 0);
    assert!(matches!(
        s.emitter.download_events().last(),
        Some(DownloadEvent::Cancelled { .. })
    ));
}

#[tokio::test]
async fn cancel_without_transfer_removes_only_partial_data() {
    let s = setup(FakeTransport::new(CONTENT));
    let models = s.dir.path().join("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("tiny.gguf.part"), b"half").unwrap();
    std::fs::write(models.join("tiny.gguf.part.validator"), b"\"v1\"").unwrap();
    std::fs::write(models.join("tiny.gguf"), b"whole").unwrap();

    s.manager.cancel_download("tiny").await.unwrap();
    s.manager.cancel_download("tiny").await.unwrap();

    assert_eq!(std::fs::read(models.join("tiny.gguf")).unwrap(), b"whole");
    assert!(!models.join("tiny.gguf.part").exists());
    assert!(!models.join("tiny.gguf.part.validator").exists());
}

#[tokio::test]
async fn cancel_after_completion_keeps_the_model() {
    let s = setup(FakeTransport::new(CONTENT));
    let mut rx = s
        .manager
        .start_download(&descriptor("tiny", "tiny.gguf"))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);
    let final_path = s.dir.path().join("models/tiny.gguf");
    assert!(!s.manager.is_downloading("tiny").await);

    s.manager.cancel_download("tiny").await.unwrap();

    assert_eq!(std::fs::read(&final_path).unwrap(), CONTENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_during_cancel_cleanup_is_refused() {
    let s = setup(FakeTransport::new(CONTENT).then(Behavior::HoldOnDrop(8)));
    let model = descriptor("tiny", "tiny.gguf");
    let gate = s.transport.gate();
    let manager = Arc::new(s.manager);

    let mut rx = manager.start_download(&model).await.unwrap();
    rx.wait_for(|p| p.downloaded >= 8).await.unwrap();

    let canceller = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.cancel_download("tiny").await })
    };
    wait_until(|| gate.entered()).await;

    let during = manager.start_download(&model).await;
    gate.release();
    canceller.await.unwrap().unwrap();

    assert_eq!(
        during.unwrap_err(),
        DownloadError::cancel_in_progress("tiny")
    );
    let models = s.dir.path().join("models");
    assert!(!models.join("tiny.gguf.part").exists());
    assert!(!models.join("tiny.gguf").exists());

    let mut rx = manager.start_download(&model).await.unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);
    assert_eq!(std::fs::read(models.join("tiny.gguf")).unwrap(), CONTENT);
    assert_eq!(s.transport.offsets(), vec![0, 0]);
}

#[tokio::test]
async fn cancel_unknown_model_is_an_error() {
    let s = setup(FakeTransport::new(CONTENT));
    let err = s.manager.cancel_download("nope").await.unwrap_err();
    assert_eq!(err, DownloadError::unknown_model("nope"));
}

#[tokio::test]
async fn failure_keeps_partial_and_next_start_resumes() {
    let s = setup(
        FakeTransport::new(CONTENT)
            .with_etag("\"v1\"")
            .then(Behavior::FailAfter(24)),
    );
    let model = descriptor("tiny", "tiny.gguf");

    let mut rx = s.manager.start_download(&model).await.unwrap();
    assert!(matches!(wait_terminal(&mut rx).await, DownloadStatus::Failed { .. }));

    let part = s.dir.path().join("models/tiny.gguf.part");
    assert_eq!(std::fs::read(&part).unwrap(), &CONTENT[..24]);
    assert!(!s.dir.path().join("models/tiny.gguf").exists());
    wait_until(|| s.wake_lock.held() == 0).await;

    let mut rx = s.manager.start_download(&model).await.unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);

    assert_eq!(s.transport.offsets(), vec![0, 24]);
    assert_eq!(
        s.transport.validators(),
        vec![None, Some("\"v1\"".to_string())]
    );
    assert!(!s.dir.path().join("models/tiny.gguf.part.validator").exists());
    assert_eq!(
        std::fs::read(s.dir.path().join("models/tiny.gguf")).unwrap(),
        CONTENT
    );
}

#[tokio::test]
async fn server_ignoring_range_restarts_from_zero() {
    let s = setup(FakeTransport::new(CONTENT).then(Behavior::IgnoreRange));
    let models = s.dir.path().join("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("tiny.gguf.part"), b"garbage-prefix").unwrap();

    let mut rx = s
        .manager
        .start_download(&descriptor("tiny", "tiny.gguf"))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);
    assert_eq!(std::fs::read(models.join("tiny.gguf")).unwrap(), CONTENT);
}

#[tokio::test]
async fn restart_while_active_shares_the_transfer() {
    let s = setup(FakeTransport::new(CONTENT).then(Behavior::StallAfter(8)));
    let model = descriptor("tiny", "tiny.gguf");

    let first = s.manager.start_download(&model).await.unwrap();
    let mut second = s.manager.start_download(&model).await.unwrap();
    second.wait_for(|p| p.downloaded >= 8).await.unwrap();

    assert_eq!(s.transport.offsets(), vec![0]);
    assert_eq!(first.borrow().downloaded, second.borrow().downloaded);
    assert!(s.manager.subscribe("tiny").await.is_some());

    s.manager.cancel_download("tiny").await.unwrap();
    assert!(s.manager.subscribe("tiny").await.is_none());
}

#[tokio::test]
async fn app_config_downloads_land_where_models_load_from() {
    let dir = tempfile::tempdir().unwrap();
    let app = AppConfig::default().with_data_root(dir.path());
    let manager = DownloadManager::new(
        DownloadManagerConfig::from_app_config(&app).unwrap(),
        DownloadManagerDeps {
            transport: Arc::new(FakeTransport::new(CONTENT)),
            emitter: Arc::new(RecordingEmitter::default()),
            wake_lock: Arc::new(CountingWakeLock::default()),
            catalog: ModelCatalog::new(vec![descriptor("tiny", "tiny.gguf")]),
        },
    );

    let mut rx = manager
        .start_download(&descriptor("tiny", "tiny.gguf"))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&mut rx).await, DownloadStatus::Completed);
    assert!(app.models_dir().unwrap().join("tiny.gguf").is_file());
}
