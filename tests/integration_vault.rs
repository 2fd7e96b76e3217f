#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests of a vault index backed by LanceDB and a mocked Ollama server

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vault_index::VaultIndex;
use vault_index::config::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const DIMENSION: usize = 64;

/// Hash each lowercase word into a bucket so similar texts get similar vectors
fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text.split_whitespace() {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        vector[usize::from(digest[0]) % DIMENSION] += 1.0;
    }
    vector[DIMENSION - 1] += 0.01;
    vector
}

fn embed_response(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).expect("request body is JSON");
    let input = body["input"].as_str().unwrap_or_default();
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "all-minilm:latest",
        "embeddings": [bag_of_words(input)],
    }))
}

async fn start_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "all-minilm:latest" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(embed_response)
        .mount(&server)
        .await;
    server
}

struct TestVault {
    _temp_dir: TempDir,
    root: PathBuf,
    config: Config,
}

impl TestVault {
    fn new(server: &MockServer) -> Self {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let root = temp_dir.path().join("vault");
        fs::create_dir_all(&root).expect("should create vault");

        let mut config = Config::load(temp_dir.path().join("data")).expect("defaults load");
        config.ollama.host = server.address().ip().to_string();
        config.ollama.port = server.address().port();
        config.ollama.retry_attempts = 1;
        config.ollama.timeout_secs = 5;
        config
            .ollama
            .set_embedding_dimension(DIMENSION as u32)
            .expect("valid dimension");

        Self {
            _temp_dir: temp_dir,
            root,
            config,
        }
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("should create parent dirs");
        }
        fs::write(&path, content).expect("should write note");
        path
    }

    fn index(&self) -> VaultIndex {
        VaultIndex::from_config(self.config.clone())
    }
}

fn relative_paths(root: &Path, paths: impl Iterator<Item = PathBuf>) -> Vec<String> {
    paths
        .map(|p| {
            p.strip_prefix(root)
                .expect("result under root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn index_search_update_and_collect_garbage() {
    let server = start_ollama().await;
    let vault = TestVault::new(&server);
    vault.write("rust/ownership.md", "rust ownership moves values between bindings");
    vault.write("rust/lifetimes.md", "rust lifetimes annotate how long references live");
    vault.write("garden.md", "tomatoes basil and peppers in raised beds");
    vault.write(".trash/old.md", "rust ownership draft");

    let index = vault.index();
    let report = index
        .indexer()
        .sync_corpus(&vault.root)
        .await
        .expect("initial sync succeeds");
    assert_eq!(report.indexed, 3);
    assert_eq!(report.embedded, 3);
    assert!(report.failed.is_empty());

    let results = index
        .search()
        .try_search("tomatoes basil and peppers in raised beds", &vault.root, 10)
        .await
        .expect("search succeeds");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].path, vault.root.join("garden.md"));
    assert_eq!(results[0].relevance(), 100);

    fs::remove_file(vault.root.join("garden.md")).expect("should delete note");
    vault.write("rust/lifetimes.md", "lifetimes are regions of code");

    let report = index
        .indexer()
        .sync_corpus(&vault.root)
        .await
        .expect("second sync succeeds");
    assert_eq!(report.indexed, 2);
    assert_eq!(report.embedded, 1);
    assert_eq!(report.removed, 1);

    let results = index
        .search()
        .search("regions of code", &vault.root, 10)
        .await;
    let mut paths = relative_paths(&vault.root, results.into_iter().map(|r| r.path));
    assert_eq!(paths[0], "rust/lifetimes.md");
    paths.sort();
    assert_eq!(paths, vec!["rust/lifetimes.md", "rust/ownership.md"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn index_survives_restart() {
    let server = start_ollama().await;
    let vault = TestVault::new(&server);
    vault.write("journal.md", "walked along the river at dawn");

    vault
        .index()
        .indexer()
        .sync_corpus(&vault.root)
        .await
        .expect("sync succeeds");

    let reopened = vault.index();
    assert_eq!(reopened.store().count().await.expect("should count"), 1);

    let report = reopened
        .indexer()
        .sync_corpus(&vault.root)
        .await
        .expect("resync succeeds");
    assert_eq!(report.indexed, 1);
    assert_eq!(report.embedded, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_makes_search_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;
    let vault = TestVault::new(&server);
    vault.write("note.md", "anything at all");

    let index = vault.index();
    let err = index
        .indexer()
        .sync_corpus(&vault.root)
        .await
        .expect_err("model is not installed");
    assert!(err.is_unavailable());

    let engine = index.search();
    assert!(engine.search("anything", &vault.root, 5).await.is_empty());
    assert!(!engine.is_available());
}
