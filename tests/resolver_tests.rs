use chrono::Utc;
use mcphub::cache::TtlCache;
use mcphub::directory::{DirectoryEntry, ServerDirectory};
use mcphub::models::normalize_server_data;
use mcphub::provision::Provisioner;
use mcphub::registry::{DiscoveryAggregator, RegistryClient};
use mcphub::resolver::{ResolutionEngine, ResolveError};
use mcphub::test_utils::test_helpers::{descriptor_with, RecordingInstaller, StaticRegistry};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    engine: ResolutionEngine,
    cache: Arc<TtlCache>,
    directory: Arc<ServerDirectory>,
    installer: Arc<RecordingInstaller>,
    sources: Vec<Arc<StaticRegistry>>,
    _tmp: tempfile::TempDir,
}

fn fixture(sources: Vec<StaticRegistry>, installer: RecordingInstaller) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let cache = TtlCache::in_memory(1000);
    let directory = Arc::new(ServerDirectory::load(tmp.path().join("mcp-config.json")));
    let sources: Vec<Arc<StaticRegistry>> = sources.into_iter().map(Arc::new).collect();
    let clients: Vec<Arc<dyn RegistryClient>> = sources
        .iter()
        .map(|s| s.clone() as Arc<dyn RegistryClient>)
        .collect();
    let aggregator = Arc::new(DiscoveryAggregator::new(clients, cache.clone()));
    let installer = Arc::new(installer);
    let provisioner = Arc::new(Provisioner::new(
        directory.clone(),
        installer.clone(),
        tmp.path().join("servers"),
    ));
    let engine = ResolutionEngine::new(
        cache.clone(),
        directory.clone(),
        aggregator,
        provisioner,
    );
    Fixture {
        engine,
        cache,
        directory,
        installer,
        sources,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn cached_binding_short_circuits_everything() {
    let f = fixture(
        vec![StaticRegistry::new("s", vec![])],
        RecordingInstaller::succeeding(),
    );
    f.cache
        .set("tool-server:list_repos", json!("cached-id"), None)
        .await;

    let id = f.engine.resolve("list_repos").await.unwrap();
    assert_eq!(id, "cached-id");
    assert_eq!(f.sources[0].calls(), 0);
    assert!(f.installer.installed().is_empty());
}

#[tokio::test]
async fn declared_tools_match_by_substring_in_either_direction() {
    let f = fixture(
        vec![StaticRegistry::new("s", vec![])],
        RecordingInstaller::succeeding(),
    );
    let descriptor = normalize_server_data(&json!({
        "id": "gh-x",
        "tools": ["repos"],
    }))
    .unwrap();
    f.directory
        .append("gh-x", DirectoryEntry::for_descriptor(&descriptor))
        .await;

    // Declared "repos" is a substring of the request.
    assert_eq!(f.engine.resolve("List_Repos").await.unwrap(), "gh-x");
    // And the other direction: a request that is a substring of a declared tool.
    assert_eq!(f.engine.resolve("repo").await.unwrap(), "gh-x");
    assert_eq!(f.sources[0].calls(), 0);
}

#[tokio::test]
async fn empty_declared_tool_does_not_claim_every_name() {
    let f = fixture(
        vec![StaticRegistry::new("s", vec![])],
        RecordingInstaller::succeeding(),
    );
    let descriptor = normalize_server_data(&json!({
        "id": "sloppy",
        "tools": ["", "real_tool"],
    }))
    .unwrap();
    f.directory
        .append("sloppy", DirectoryEntry::for_descriptor(&descriptor))
        .await;

    // An unrelated name falls through the directory to discovery and fails
    // there; the empty declared tool must not bind it.
    let err = f.engine.resolve("levitate").await.unwrap_err();
    assert!(matches!(err, ResolveError::NoProviderFound(_)));

    // Non-empty declared tools still match.
    assert_eq!(f.engine.resolve("real_tool").await.unwrap(), "sloppy");
}

#[tokio::test]
async fn heuristic_families_bind_without_discovery() {
    let f = fixture(
        vec![StaticRegistry::new("s", vec![])],
        RecordingInstaller::succeeding(),
    );

    assert_eq!(
        f.engine.resolve("github_create_issue").await.unwrap(),
        "@modelcontextprotocol/server-github"
    );
    assert_eq!(
        f.engine.resolve("read_file").await.unwrap(),
        "@modelcontextprotocol/server-filesystem"
    );
    assert_eq!(
        f.engine.resolve("git_commit").await.unwrap(),
        "@modelcontextprotocol/server-git"
    );
    assert_eq!(f.sources[0].calls(), 0);
}

#[tokio::test]
async fn discovery_installs_best_candidate_and_binds() {
    let f = fixture(
        vec![
            StaticRegistry::new(
                "gh",
                vec![descriptor_with("gh-x", &["list_repos"], 50, Utc::now())],
            ),
            StaticRegistry::new("empty", vec![]),
        ],
        RecordingInstaller::succeeding(),
    );

    let id = f.engine.resolve("list_repos").await.unwrap();
    assert_eq!(id, "gh-x");
    assert_eq!(f.installer.installed(), vec!["gh-x"]);
    assert!(f.directory.has("gh-x").await);

    // Second resolution is served from the cache: no further installs or
    // registry calls.
    let again = f.engine.resolve("list_repos").await.unwrap();
    assert_eq!(again, "gh-x");
    assert_eq!(f.installer.installed().len(), 1);
    assert_eq!(f.sources[0].calls(), 1);
    assert_eq!(f.sources[1].calls(), 1);
}

#[tokio::test]
async fn already_installed_candidate_binds_without_install() {
    let descriptor = descriptor_with("gh-x", &[], 50, Utc::now());
    let f = fixture(
        vec![StaticRegistry::new("s", vec![descriptor.clone()])],
        RecordingInstaller::succeeding(),
    );
    f.directory
        .append("gh-x", DirectoryEntry::for_descriptor(&descriptor))
        .await;

    // Declared tools are empty, so this reaches discovery, then binds the
    // already-present id directly.
    let id = f.engine.resolve("deploy_rocket").await.unwrap();
    assert_eq!(id, "gh-x");
    assert!(f.installer.installed().is_empty());
}

#[tokio::test]
async fn no_candidates_is_a_distinct_unresolved_error() {
    let f = fixture(
        vec![StaticRegistry::new("s", vec![])],
        RecordingInstaller::succeeding(),
    );

    let err = f.engine.resolve("levitate").await.unwrap_err();
    assert!(matches!(err, ResolveError::NoProviderFound(ref tool) if tool == "levitate"));

    // Nothing was cached, so a later attempt re-runs discovery.
    f.engine.resolve("levitate").await.unwrap_err();
    assert_eq!(f.sources[0].calls(), 2);
}

#[tokio::test]
async fn install_failure_surfaces_and_leaves_no_binding() {
    let f = fixture(
        vec![StaticRegistry::new(
            "s",
            vec![descriptor_with("gh-x", &["deploy"], 1, Utc::now())],
        )],
        RecordingInstaller::failing(),
    );

    let err = f.engine.resolve("deploy_service").await.unwrap_err();
    assert!(matches!(err, ResolveError::InstallFailed { .. }));
    assert!(!f.directory.has("gh-x").await);
    assert_eq!(f.cache.get("tool-server:deploy_service").await, None);
}

#[tokio::test]
async fn end_to_end_two_registries_one_result() {
    // The scenario from the drawing board: one registry knows gh-x, the
    // other is empty.
    let f = fixture(
        vec![
            StaticRegistry::new(
                "gh",
                vec![descriptor_with("gh-x", &["list_repos"], 50, Utc::now())],
            ),
            StaticRegistry::new("other", vec![]),
        ],
        RecordingInstaller::succeeding(),
    );

    assert_eq!(f.engine.resolve("list_repos").await.unwrap(), "gh-x");
    assert_eq!(f.installer.installed(), vec!["gh-x"]);

    assert_eq!(f.engine.resolve("list_repos").await.unwrap(), "gh-x");
    assert_eq!(f.installer.installed().len(), 1);
    assert_eq!(f.sources[0].calls() + f.sources[1].calls(), 2);
}
