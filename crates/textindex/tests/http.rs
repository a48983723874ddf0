use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use odict_lemmatizer::Lemmatizer;
use tower::util::ServiceExt;
use wordnet_db::{LazyThesaurus, Thesaurus};
use wordnet_types::{DataRecord, IndexRecord};

use textindex::handlers::{AppState, router};
use textindex::index::TextIndex;

fn make_index() -> Arc<TextIndex> {
    let lemmatizer = Lemmatizer::from_lines([
        "форма,ж,форме,формы,форм",
        "двойка,ж",
        "стол,м",
        "диван,м",
    ])
    .unwrap();
    let lines = ["форма форме формы", "тесты форм, двойка", "двойка стол диван"];
    Arc::new(TextIndex::build(
        lines.iter().map(|l| l.to_string()).collect(),
        &lemmatizer,
    ))
}

fn furniture(data_lines: &[&str]) -> anyhow::Result<Thesaurus> {
    let index = IndexRecord::parse("мебель n 1 1 ~ 1 0 00000001")?;
    let data = data_lines
        .iter()
        .map(|line| DataRecord::parse(line, wordnet_types::Pos::Noun))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Thesaurus::from_records([index], data))
}

fn complete_furniture() -> anyhow::Result<Thesaurus> {
    furniture(&[
        "00000001 06 n 01 мебель 0 002 ~ 00000002 n 0000 ~ 00000003 n 0000 | мебель",
        "00000002 06 n 01 стол 0 000 | стол",
        "00000003 06 n 01 диван 0 000 | диван",
    ])
}

fn make_state(thesaurus: LazyThesaurus) -> AppState {
    AppState {
        index: make_index(),
        thesaurus: Arc::new(thesaurus),
        max_count: 100,
    }
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    (status, body)
}

fn lazy_state() -> AppState {
    make_state(LazyThesaurus::with_loader(complete_furniture))
}

#[tokio::test]
async fn healthz_ok() {
    let app = router(lazy_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn common_endpoint_ranks_lemmas() {
    let (status, body) = get_json(router(lazy_state()), "/v1/common?count=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["word"], "форма");
    assert_eq!(body["items"][0]["occurrences"], 4);
    assert_eq!(body["items"][1]["word"], "двойка");
}

#[tokio::test]
async fn common_endpoint_rejects_zero_count() {
    let (status, body) = get_json(router(lazy_state()), "/v1/common?count=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("count"));
}

#[tokio::test]
async fn lines_endpoint_returns_numbered_lines() {
    let uri = "/v1/lines?word=%D1%84%D0%BE%D1%80%D0%BC"; // "форм"
    let (status, body) = get_json(router(lazy_state()), uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["lines"],
        serde_json::json!(["1: форма форме формы", "2: тесты форм, двойка"])
    );
}

#[tokio::test]
async fn lines_endpoint_requires_word() {
    let (status, body) = get_json(router(lazy_state()), "/v1/lines").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("required")
    );
}

#[tokio::test]
async fn info_endpoint_reports_missing_word() {
    let uri = "/v1/info?word=%D0%BE%D0%B1%D0%BB%D0%B0%D0%BA%D0%BE"; // "облако"
    let (status, body) = get_json(router(lazy_state()), uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"], serde_json::json!(["облако: no occurrences"]));
}

#[tokio::test]
async fn group_endpoint_loads_thesaurus_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let state = make_state(LazyThesaurus::with_loader(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        complete_furniture()
    }));
    let thesaurus = Arc::clone(&state.thesaurus);
    assert!(!thesaurus.is_loaded());

    let uri = "/v1/group?group=%D0%BC%D0%B5%D0%B1%D0%B5%D0%BB%D1%8C"; // "мебель"
    for _ in 0..3 {
        let (status, body) = get_json(router(state.clone()), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["report"],
            serde_json::json!([
                "мебель: total 2 occurrences",
                "  стол: 1 occurrences",
                "  диван: 1 occurrences"
            ])
        );
    }
    assert!(thesaurus.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn group_endpoint_reports_empty_synset() {
    let broken = furniture(&["00000001 06 n 01 мебель 0 001 ~ 00000009 n 0000 | мебель"]).unwrap();
    let state = make_state(LazyThesaurus::preloaded(broken));
    let uri = "/v1/group?group=%D0%BC%D0%B5%D0%B1%D0%B5%D0%BB%D1%8C";
    let (status, body) = get_json(router(state.clone()), uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("no member words")
    );

    // Other queries keep working against the same state.
    let (status, _) = get_json(router(state), "/v1/common").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn group_endpoint_reports_unavailable_thesaurus() {
    let state = make_state(LazyThesaurus::with_loader(|| {
        anyhow::bail!("missing required WordNet file: rwn3/index.noun")
    }));
    let uri = "/v1/group?group=%D0%BC%D0%B5%D0%B1%D0%B5%D0%BB%D1%8C";
    let (status, body) = get_json(router(state), uri).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("thesaurus unavailable")
    );
}
