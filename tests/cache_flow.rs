mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use review_console::config::ClientConfig;
use review_console::keys;
use review_console::models::Project;
use review_console::{ApiClient, AppState};

fn list_projects(
    api: &ApiClient,
) -> impl Fn() -> futures_util::future::BoxFuture<'static, review_console::ApiResult<Vec<Project>>>
       + Clone
       + Send
       + Sync
       + 'static {
    use futures_util::FutureExt;
    let api = api.clone();
    move || {
        let api = api.clone();
        async move { api.projects().get_all().await }.boxed()
    }
}

#[tokio::test]
async fn concurrent_reads_issue_one_request() -> Result<()> {
    let app = TestApp::new().await?;
    app.seed_project("NDA Review").await?;
    app.backend.set_latency(Duration::from_millis(100)).await;

    let fetch = list_projects(&app.state.api);
    let queries = &app.state.queries;
    let (first, second, third) = tokio::join!(
        queries.query(keys::projects(), fetch.clone()),
        queries.query(keys::projects(), fetch.clone()),
        queries.fetch_query(keys::projects(), fetch),
    );

    assert_eq!(app.backend.hits("GET /projects").await, 1);
    let first = first.map_err(|err| anyhow::anyhow!("{err}"))?;
    assert_eq!(first.len(), 1);
    assert_eq!(second.ok(), Some(first.clone()));
    assert_eq!(third.ok(), Some(first));
    Ok(())
}

#[tokio::test]
async fn stale_data_is_served_while_revalidating() -> Result<()> {
    let app = TestApp::new().await?;
    let fetch = list_projects(&app.state.api);
    let queries = &app.state.queries;

    let empty = queries
        .query(keys::projects(), fetch.clone())
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    assert!(empty.is_empty());

    app.seed_project("Lease Review").await?;
    app.backend.set_latency(Duration::from_millis(50)).await;
    let stale = queries
        .query(keys::projects(), fetch)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    assert!(stale.is_empty(), "stale list returned without waiting");
    assert!(queries.is_fetching(&keys::projects()).await);

    let mut refreshed = None;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        let cached = queries.get_query_data::<Vec<Project>>(&keys::projects()).await;
        if cached.as_ref().is_some_and(|projects| projects.len() == 1) {
            refreshed = cached;
            break;
        }
    }
    assert_eq!(refreshed.map(|projects| projects[0].name.clone()).as_deref(), Some("Lease Review"));
    assert_eq!(app.backend.hits("GET /projects").await, 2);
    Ok(())
}

#[tokio::test]
async fn fresh_entries_skip_the_network_until_invalidated() -> Result<()> {
    let app = TestApp::with_stale_time(Duration::from_secs(60)).await?;
    let fetch = list_projects(&app.state.api);
    let queries = &app.state.queries;

    queries.query(keys::projects(), fetch.clone()).await.ok();
    queries.query(keys::projects(), fetch.clone()).await.ok();
    assert_eq!(app.backend.hits("GET /projects").await, 1);

    assert_eq!(queries.invalidate(&keys::projects()).await, 1);
    queries.fetch_query(keys::projects(), fetch).await.ok();
    assert_eq!(app.backend.hits("GET /projects").await, 2);
    Ok(())
}

#[tokio::test]
async fn errors_stay_on_the_key_until_a_fetch_succeeds() -> Result<()> {
    let app = TestApp::new().await?;
    let fetch = list_projects(&app.state.api);
    let observer = app.state.queries.observe(keys::projects(), fetch).await;

    app.backend
        .fail_next("GET /projects", StatusCode::INTERNAL_SERVER_ERROR)
        .await;
    let failed = observer.load().await;
    assert!(failed.data.is_none());
    assert!(failed.error.as_ref().is_some_and(|err| err.is_server_error()));

    let recovered = observer.refetch().await;
    assert!(recovered.is_ok());
    let state = observer.state().await;
    assert!(state.error.is_none());
    assert_eq!(state.data.map(|projects| projects.len()), Some(0));
    Ok(())
}

#[tokio::test]
async fn json_content_type_and_timeout_are_applied() -> Result<()> {
    let app = TestApp::new().await?;
    app.seed_project("NDA Review").await?;
    assert_eq!(
        app.backend.content_type("POST /projects").await.as_deref(),
        Some("application/json")
    );

    let config = ClientConfig {
        timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    }
    .with_api_url(&format!("http://{}", app.addr))?;
    let impatient = AppState::new(config)?;
    app.backend.set_latency(Duration::from_millis(500)).await;

    let err = impatient.api.health().check().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err}");
    Ok(())
}

#[tokio::test]
async fn shutdown_drops_cached_entries() -> Result<()> {
    let app = TestApp::new().await?;
    let fetch = list_projects(&app.state.api);
    app.state.queries.query(keys::projects(), fetch).await.ok();
    assert!(app
        .state
        .queries
        .get_query_data::<Vec<Project>>(&keys::projects())
        .await
        .is_some());

    app.state.shutdown().await;
    assert!(app
        .state
        .queries
        .get_query_data::<Vec<Project>>(&keys::projects())
        .await
        .is_none());
    Ok(())
}

#[tokio::test]
async fn mutations_invalidate_only_on_success() -> Result<()> {
    let app = TestApp::with_stale_time(Duration::from_secs(60)).await?;
    let fetch = list_projects(&app.state.api);
    let queries = &app.state.queries;
    let api = app.state.api.clone();

    queries.query(keys::projects(), fetch.clone()).await.ok();
    app.backend
        .fail_next("POST /projects", StatusCode::INTERNAL_SERVER_ERROR)
        .await;
    let failed = queries
        .mutate(
            api.projects().create(&review_console::models::NewProject {
                name: "NDA Review".to_string(),
                ..Default::default()
            }),
            &[keys::projects()],
        )
        .await;
    assert!(failed.is_err());
    let cached = queries.query(keys::projects(), fetch.clone()).await;
    assert_eq!(cached.ok().map(|projects| projects.len()), Some(0));
    assert_eq!(app.backend.hits("GET /projects").await, 1);

    queries
        .mutate(
            api.projects().create(&review_console::models::NewProject {
                name: "NDA Review".to_string(),
                ..Default::default()
            }),
            &[keys::projects()],
        )
        .await?;
    let refetched = queries
        .fetch_query(keys::projects(), fetch.clone())
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    assert_eq!(refetched[0].name, "NDA Review");
    let fresh = queries
        .query(keys::projects(), fetch)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    assert_eq!(fresh, refetched);
    assert_eq!(app.backend.hits("GET /projects").await, 2);
    Ok(())
}
