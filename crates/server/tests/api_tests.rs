use catalogdb_core::activity::ActivityLog;
use catalogdb_core::storage::Catalog;
use catalogdb_server::api::create_router;
use catalogdb_server::api::handlers::AppState;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

async fn spawn_app() -> (String, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();

    let state = AppState {
        catalog: Catalog::new(),
        activity: ActivityLog::new(100),
        data_dir: tmp_dir.path().to_path_buf(),
        prometheus_handle,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, tmp_dir)
}

fn client() -> Client {
    Client::new()
}

fn record(platform: &str, title: &str, year: i32) -> Value {
    json!({
        "platform": platform,
        "title": title,
        "primaryLanguage": "Hindi",
        "year": year,
    })
}

async fn create(base_url: &str, body: Value) -> reqwest::Response {
    client()
        .post(format!("{}/api/content", base_url))
        .header("x-user-id", "editor-1")
        .json(&body)
        .send()
        .await
        .expect("Failed to create content")
}

async fn get_json(url: String) -> Value {
    let resp = client().get(url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

/// Three active records plus one soft-deleted record.
async fn seed(base_url: &str) {
    let items = json!({ "items": [
        {
            "platform": "Netflix", "title": "Alpha", "primaryLanguage": "English",
            "year": 2020, "assignedGenre": "Drama", "assignedFormat": "Series",
            "durationHours": 10.0, "seasons": 2, "releaseDate": "2020-03-01",
            "dubbing": { "hindi": true, "tamil": true },
        },
        {
            "platform": "Netflix", "title": "Beta", "primaryLanguage": "Hindi",
            "year": 2021, "assignedGenre": "Comedy", "assignedFormat": "Movie",
            "durationHours": 2.0,
        },
        {
            "platform": "Prime", "title": "Gamma", "primaryLanguage": "Hindi",
            "year": 2021, "assignedGenre": "Drama", "assignedFormat": "Movie",
            "dubbing": { "english": true },
        },
        {
            "platform": "Prime", "title": "Deleted", "primaryLanguage": "Tamil",
            "year": 2022, "assignedGenre": "Drama", "durationHours": 99.0,
        },
    ]});
    let resp = client()
        .post(format!("{}/api/content/batch", base_url))
        .json(&items)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let deleted = body["ids"][3].as_str().unwrap().to_string();
    let resp = client()
        .delete(format!("{}/api/content/{}", base_url, deleted))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ========== Health & Middleware ==========

#[tokio::test]
async fn health_returns_ok() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_records"], 0);
}

#[tokio::test]
async fn metrics_endpoint_renders_text() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ========== Content CRUD ==========

#[tokio::test]
async fn create_ignores_client_total_dubbings() {
    let (base_url, _tmp) = spawn_app().await;
    let mut body = record("Netflix", "Alpha", 2020);
    body["dubbing"] = json!({ "hindi": true, "tamil": false });
    body["totalDubbings"] = json!(9);

    let resp = create(&base_url, body).await;
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["totalDubbings"], 1);
    assert_eq!(created["isActive"], true);
    assert_eq!(created["createdBy"], "editor-1");
}

#[tokio::test]
async fn create_rejects_invalid_year() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = create(&base_url, record("Netflix", "Alpha", 1850)).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("year"));
}

#[tokio::test]
async fn duplicate_natural_key_conflicts() {
    let (base_url, _tmp) = spawn_app().await;
    assert_eq!(create(&base_url, record("Netflix", "Alpha", 2020)).await.status(), 201);
    assert_eq!(create(&base_url, record("Netflix", "Alpha", 2020)).await.status(), 409);
    // Same title on another platform or year is a different record.
    assert_eq!(create(&base_url, record("Prime", "Alpha", 2020)).await.status(), 201);
    assert_eq!(create(&base_url, record("Netflix", "Alpha", 2021)).await.status(), 201);
}

#[tokio::test]
async fn update_recomputes_total_dubbings() {
    let (base_url, _tmp) = spawn_app().await;
    let created: Value = create(&base_url, record("Netflix", "Alpha", 2020))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = client()
        .put(format!("{}/api/content/{}", base_url, id))
        .json(&json!({ "dubbing": { "hindi": true, "french": true }, "durationHours": 1.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["totalDubbings"], 2);
    assert_eq!(updated["durationHours"], 1.5);
    assert_eq!(updated["title"], "Alpha");
}

#[tokio::test]
async fn soft_delete_hides_and_restore_returns() {
    let (base_url, _tmp) = spawn_app().await;
    let created: Value = create(&base_url, record("Netflix", "Alpha", 2020))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();
    let url = format!("{}/api/content/{}", base_url, id);

    assert_eq!(client().delete(&url).send().await.unwrap().status(), 200);
    assert_eq!(client().get(&url).send().await.unwrap().status(), 404);
    // The natural key is free while the record is inactive.
    assert_eq!(create(&base_url, record("Netflix", "Alpha", 2020)).await.status(), 201);
    let resp = client()
        .post(format!("{}/restore", url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn restore_reactivates_record() {
    let (base_url, _tmp) = spawn_app().await;
    let created: Value = create(&base_url, record("Netflix", "Alpha", 2020))
        .await
        .json()
        .await
        .unwrap();
    let url = format!("{}/api/content/{}", base_url, created["id"].as_str().unwrap());
    client().delete(&url).send().await.unwrap();

    let resp = client()
        .post(format!("{}/restore", url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(client().get(&url).send().await.unwrap().status(), 200);
}

#[tokio::test]
async fn get_unknown_content_is_not_found() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{}/api/content/{}", base_url, uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .post(format!("{}/api/content/batch", base_url))
        .json(&json!({ "items": [
            record("Netflix", "A", 2020),
            record("Netflix", "B", 2020),
            record("Netflix", "A", 2020),
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("batch entry 2"));

    let list = get_json(format!("{}/api/content", base_url)).await;
    assert_eq!(list["pagination"]["total"], 0);
}

#[tokio::test]
async fn list_filters_searches_and_paginates() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let all = get_json(format!("{}/api/content", base_url)).await;
    assert_eq!(all["pagination"]["total"], 3);
    // Newest first without an explicit sort.
    assert_eq!(all["data"][0]["title"], "Gamma");

    let netflix = get_json(format!("{}/api/content?platform=Netflix", base_url)).await;
    assert_eq!(netflix["pagination"]["total"], 2);

    let search = get_json(format!("{}/api/content?search=ALP", base_url)).await;
    assert_eq!(search["data"].as_array().unwrap().len(), 1);
    assert_eq!(search["data"][0]["title"], "Alpha");

    let page = get_json(format!(
        "{}/api/content?sortBy=title&sortOrder=asc&page=2&limit=2",
        base_url
    ))
    .await;
    assert_eq!(page["pagination"]["pages"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["data"][0]["title"], "Gamma");
}

#[tokio::test]
async fn list_rejects_unknown_sort_field() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{}/api/content?sortBy=colour", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ========== Analytics ==========

#[tokio::test]
async fn overview_counts_active_records_only() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/overview", base_url)).await;
    assert_eq!(body["totalContent"], 3);
    assert_eq!(body["platforms"], 2);
    assert_eq!(body["yearRange"]["min"], 2020);
    assert_eq!(body["yearRange"]["max"], 2021);
    assert_eq!(body["dubbing"]["dubbedTitles"], 2);
    assert_eq!(body["duration"]["withDuration"], 2);
    assert_eq!(body["duration"]["avgHours"], 6);
}

#[tokio::test]
async fn platforms_report_skips_null_durations_in_average() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/platforms", base_url)).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["platform"], "Netflix");
    assert_eq!(data[0]["count"], 2);
    assert_eq!(data[0]["avgDuration"], 6);
    assert_eq!(data[1]["platform"], "Prime");
    assert_eq!(data[1]["count"], 1);
    assert_eq!(data[1]["avgDuration"], Value::Null);
}

#[tokio::test]
async fn filters_apply_to_reports() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let single = get_json(format!("{}/api/analytics/genres?platform=Prime", base_url)).await;
    let list = get_json(format!("{}/api/analytics/genres?platform=Prime,", base_url)).await;
    assert_eq!(single, list);
    assert_eq!(single["data"][0]["genre"], "Drama");
    assert_eq!(single["data"][0]["count"], 1);

    let years = get_json(format!("{}/api/analytics/years?year=2021-2023", base_url)).await;
    let years = years["data"].as_array().unwrap();
    assert_eq!(years.len(), 1);
    assert_eq!(years[0]["year"], 2021);
    assert_eq!(years[0]["count"], 2);

    let undubbed = get_json(format!(
        "{}/api/analytics/overview?hasDubbing=false&minPopularity=1",
        base_url
    ))
    .await;
    assert_eq!(undubbed["totalContent"], 1);
}

#[tokio::test]
async fn formats_are_title_cased() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/formats?type=movie", base_url)).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["format"], "Movie");
    assert_eq!(data[0]["count"], 2);
}

#[tokio::test]
async fn duration_histogram_emits_every_bucket() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/duration", base_url)).await;
    let buckets = body["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 8);
    let count = |range: &str| {
        buckets
            .iter()
            .find(|b| b["range"] == range)
            .map(|b| b["count"].as_u64().unwrap())
    };
    assert_eq!(count("2-3"), Some(1));
    assert_eq!(count("10-20"), Some(1));
    assert_eq!(count("50+"), Some(0));
    assert_eq!(body["stats"]["count"], 2);
}

#[tokio::test]
async fn custom_query_groups_by_two_dimensions() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!(
        "{}/api/analytics/custom?groupBy=platform,year&metrics=count,avgDuration&sortBy=platform&sortOrder=asc",
        base_url
    ))
    .await;
    assert_eq!(body["total"], 2);
    let data = body["data"].as_array().unwrap();
    // avgDuration drops Prime's record, which has no duration.
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["platform"], "Netflix");
    assert!(data.iter().all(|row| row["avgDuration"].is_number()));
}

#[tokio::test]
async fn custom_query_rejects_unknown_dimension() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{}/api/analytics/custom?groupBy=colour", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client()
        .get(format!(
            "{}/api/analytics/custom?groupBy=platform,year,genre",
            base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn matrix_crosses_genre_and_platform() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/matrix", base_url)).await;
    assert_eq!(body["rows"], json!(["Comedy", "Drama"]));
    assert_eq!(body["columns"], json!(["Netflix", "Prime"]));
    assert_eq!(body["values"], json!([[1, null], [1, 1]]));
}

#[tokio::test]
async fn facets_use_friendly_dimensions() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!(
        "{}/api/analytics/facets?facets=platform,language",
        base_url
    ))
    .await;
    assert_eq!(body["platform"][0], json!({ "value": "Netflix", "count": 2 }));
    assert_eq!(body["language"][0], json!({ "value": "Hindi", "count": 2 }));
}

#[tokio::test]
async fn dubbing_report_counts_languages() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/dubbing", base_url)).await;
    assert_eq!(body["totalContent"], 3);
    let languages = body["languages"].as_array().unwrap();
    assert_eq!(languages.len(), 15);
    let hindi = languages.iter().find(|l| l["language"] == "hindi").unwrap();
    assert_eq!(hindi["count"], 1);
}

#[tokio::test]
async fn quality_and_freshness_reports() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let quality = get_json(format!("{}/api/analytics/quality", base_url)).await;
    assert_eq!(quality["total"], 3);
    let freshness = get_json(format!("{}/api/analytics/freshness", base_url)).await;
    assert_eq!(freshness["total"], 3);
    assert!(freshness["averageAgeDays"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn filter_options_list_distinct_values() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!("{}/api/analytics/filter-options", base_url)).await;
    assert_eq!(body["platforms"], json!(["Netflix", "Prime"]));
    assert_eq!(body["dubbingLanguages"].as_array().unwrap().len(), 15);
    assert_eq!(body["years"]["min"], 2020);
}

#[tokio::test]
async fn explain_describes_pipeline() {
    let (base_url, _tmp) = spawn_app().await;
    let body = get_json(format!(
        "{}/api/analytics/explain?groupBy=platform&platform=Netflix&metrics=avgDuration",
        base_url
    ))
    .await;
    assert_eq!(body["match"]["platform"], "Netflix");
    assert_eq!(body["match"]["isActive"], true);
    assert!(body["stages"].as_array().unwrap().len() >= 3);
}

#[tokio::test]
async fn release_trends_honours_explicit_window() {
    let (base_url, _tmp) = spawn_app().await;
    seed(&base_url).await;

    let body = get_json(format!(
        "{}/api/analytics/release-trends?startDate=2020-01-01&endDate=2020-12-31",
        base_url
    ))
    .await;
    assert_eq!(body["window"]["startDate"], "2020-01-01");
    assert_eq!(body["data"][0]["month"], "2020-03");
    assert_eq!(body["data"][0]["count"], 1);
}

// ========== Activity & Admin ==========

#[tokio::test]
async fn activity_log_records_writes() {
    let (base_url, _tmp) = spawn_app().await;
    create(&base_url, record("Netflix", "Alpha", 2020)).await;
    create(&base_url, record("Netflix", "Alpha", 2020)).await;

    let body = get_json(format!("{}/api/activity?actor=editor-1", base_url)).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["entries"][0]["outcome"], "failure");
    assert_eq!(body["entries"][1]["action"], "content.create");
    assert_eq!(body["entries"][1]["outcome"], "success");
}

#[tokio::test]
async fn snapshot_writes_catalog_file() {
    let (base_url, tmp) = spawn_app().await;
    seed(&base_url).await;

    let resp = client()
        .post(format!("{}/admin/snapshot", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["records"], 4);

    let loaded = catalogdb_core::storage::load_or_default(tmp.path()).unwrap();
    assert_eq!(loaded.counts().active, 3);
    assert_eq!(loaded.counts().inactive, 1);

    let stats = get_json(format!("{}/admin/stats", base_url)).await;
    assert_eq!(stats["records"]["total"], 4);
    assert!(stats["snapshot_bytes"].as_u64().unwrap() > 0);
}
