use mcphub::directory::{DirectoryEntry, ServerDirectory};
use mcphub::provision::{ProvisionError, Provisioner};
use mcphub::test_utils::test_helpers::{descriptor, RecordingInstaller};
use std::sync::Arc;

fn setup(
    installer: RecordingInstaller,
) -> (
    Provisioner,
    Arc<ServerDirectory>,
    Arc<RecordingInstaller>,
    tempfile::TempDir,
) {
    let tmp = tempfile::tempdir().unwrap();
    let directory = Arc::new(ServerDirectory::load(tmp.path().join("mcp-config.json")));
    let installer = Arc::new(installer);
    let provisioner = Provisioner::new(
        directory.clone(),
        installer.clone(),
        tmp.path().join("servers"),
    );
    (provisioner, directory, installer, tmp)
}

#[tokio::test]
async fn install_records_server_in_directory() {
    let (provisioner, directory, installer, _tmp) = setup(RecordingInstaller::succeeding());

    let mut d = descriptor("gh-x");
    d.repository = "https://example.com/gh-x".to_string();
    provisioner.install(&d).await.unwrap();

    let entry = directory.get("gh-x").await.unwrap();
    assert_eq!(entry.command, "npx");
    assert_eq!(entry.args, vec!["-y", "gh-x"]);
    assert_eq!(entry.metadata.source, "https://example.com/gh-x");
    assert_eq!(installer.installed(), vec!["gh-x"]);
}

#[tokio::test]
async fn install_prefers_published_package_name() {
    let (provisioner, directory, installer, _tmp) = setup(RecordingInstaller::succeeding());

    let mut d = descriptor("acme/server-x");
    d.package = Some("@acme/server-x".to_string());
    provisioner.install(&d).await.unwrap();

    // Installed by package name; the directory entry is still keyed by id.
    assert_eq!(installer.installed(), vec!["@acme/server-x"]);
    assert!(directory.has("acme/server-x").await);
}

#[tokio::test]
async fn install_is_idempotent_for_known_servers() {
    let tmp = tempfile::tempdir().unwrap();
    let directory = Arc::new(ServerDirectory::load(tmp.path().join("mcp-config.json")));
    let installer = Arc::new(RecordingInstaller::succeeding());
    let provisioner = Provisioner::new(
        directory.clone(),
        installer.clone(),
        tmp.path().join("servers"),
    );

    let d = descriptor("gh-x");
    directory
        .append("gh-x", DirectoryEntry::for_descriptor(&d))
        .await;

    provisioner.install(&d).await.unwrap();
    assert!(installer.installed().is_empty());
}

#[tokio::test]
async fn failed_install_does_not_touch_the_directory() {
    let (provisioner, directory, _installer, _tmp) = setup(RecordingInstaller::failing());

    let err = provisioner.install(&descriptor("gh-x")).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InstallFailed { .. }));
    assert!(!directory.has("gh-x").await);
    assert!(directory.is_empty().await);
}
