use fetch_pool::config::parse_config;
use fetch_pool::fetch::FetchError;
use fetch_pool::output::{CollectSink, JobFailure, JobOutcome, JobResult};
use fetch_pool::{Config, Job, Pipeline};
use std::time::{Duration, Instant};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a config with no rate limit and short backoffs
fn create_test_config(urls: Vec<String>) -> Config {
    let mut config = Config::default();
    config.pipeline.workers = 3;
    config.rate_limit.interval_ms = 0;
    config.retry.max_retries = 1;
    config.retry.backoff_unit_ms = 10;
    config.http.attempt_timeout_ms = 2_000;
    config.jobs.urls = urls;
    config
}

async fn run(config: &Config) -> (Vec<JobResult>, fetch_pool::RunSummary) {
    let pipeline = Pipeline::from_config(config).expect("Failed to build pipeline");
    let jobs = Job::from_urls(config.jobs.urls.iter().cloned());
    let mut sink = CollectSink::default();

    let summary = pipeline.run(jobs, &mut sink).await.expect("Run failed");

    let mut results = sink.results;
    results.sort_by_key(|r| r.job.id());
    (results, summary)
}

#[tokio::test]
async fn test_successes_and_exhausted_failures() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/ok"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    // One attempt plus one retry
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(vec![
        format!("{}/ok", base_url),
        format!("{}/missing", base_url),
        format!("{}/ok", base_url),
    ]);
    let (results, summary) = run(&config).await;

    assert_eq!(results.len(), 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failures_of("exhausted"), 1);

    match &results[0].outcome {
        JobOutcome::Success(success) => {
            assert_eq!(success.status, 200);
            assert_eq!(success.final_url, format!("{}/ok", base_url));
            assert_eq!(success.content_length, Some(5));
        }
        other => panic!("Expected success, got {:?}", other),
    }

    assert_eq!(
        results[1].outcome,
        JobOutcome::Failed(JobFailure::Exhausted {
            last_error: FetchError::Status { status: 404 }
        })
    );
    assert_eq!(results[1].attempts, 2);
}

#[tokio::test]
async fn test_transient_errors_recover_with_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(vec![format!("{}/flaky", mock_server.uri())]);
    config.retry.max_retries = 3;
    config.retry.backoff_unit_ms = 50;

    let start = Instant::now();
    let (results, summary) = run(&config).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(results[0].attempts, 3);
    // 50ms + 100ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_slow_responses_time_out_per_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(vec![format!("{}/slow", mock_server.uri())]);
    config.retry.max_retries = 0;
    config.http.attempt_timeout_ms = 200;

    let start = Instant::now();
    let (results, _) = run(&config).await;

    let failure = results[0].outcome.failure().expect("Expected failure");
    match failure {
        JobFailure::Exhausted { last_error } => assert!(last_error.is_retryable()),
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_deadline_cancels_in_flight_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let urls = (0..5)
        .map(|i| format!("{}/page{}", mock_server.uri(), i))
        .collect();
    let mut config = create_test_config(urls);
    config.pipeline.deadline_secs = Some(1);
    config.http.attempt_timeout_ms = 30_000;

    let start = Instant::now();
    let (results, summary) = run(&config).await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| {
        r.outcome
            .failure()
            .is_some_and(|failure| failure.is_cancellation())
    }));
    assert_eq!(summary.failures_of("cancelled"), 3);
}

#[tokio::test]
async fn test_malformed_job_fails_without_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(vec![
        "definitely not a url".to_string(),
        format!("{}/fine", mock_server.uri()),
    ]);
    let (results, summary) = run(&config).await;

    assert_eq!(summary.received, 2);
    assert!(matches!(
        results[0].outcome,
        JobOutcome::Failed(JobFailure::Fatal {
            error: FetchError::InvalidUrl(_)
        })
    ));
    assert_eq!(results[0].attempts, 0);
    assert!(results[1].is_success());
}

#[tokio::test]
async fn test_rate_limit_spaces_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&mock_server)
        .await;

    let urls = (0..3)
        .map(|i| format!("{}/r{}", mock_server.uri(), i))
        .collect();
    let mut config = create_test_config(urls);
    config.rate_limit.interval_ms = 200;

    let start = Instant::now();
    let (_, summary) = run(&config).await;

    assert_eq!(summary.succeeded, 3);
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_pipeline_from_toml_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let toml = format!(
        r#"
[pipeline]
workers = 2

[rate-limit]
interval-ms = 0

[retry]
max-retries = 2
backoff-unit-ms = 5

[http]
accept-any-status = true

[user-agent]
name = "IntegrationBot"

[jobs]
urls = ["{base}/a", "{base}/b"]
"#,
        base = mock_server.uri()
    );
    let config = parse_config(&toml).expect("Failed to parse config");
    let (results, summary) = run(&config).await;

    // accept-any-status turns the 500 into a successful fetch
    assert_eq!(summary.succeeded, 2);
    match &results[1].outcome {
        JobOutcome::Success(success) => assert_eq!(success.status, 500),
        other => panic!("Expected success, got {:?}", other),
    }
    assert_eq!(results[1].attempts, 1);
}
