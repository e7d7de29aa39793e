mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use ntest::timeout;
    use rampage::prelude::*;
    use std::time::Duration;

    const PERSON: &str =
        r#"{"apelido": "ana", "nome": "Ana Barbosa", "nascimento": "1985-09-23", "stack": ["rust"]}"#;

    fn short_plan() -> Vec<Stage> {
        vec![
            Stage::new(Duration::from_millis(500), 10),
            Stage::new(Duration::from_secs(1), 20),
        ]
    }

    fn client() -> ReqwestClient {
        ReqwestClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn posting_people_passes_created_check() {
        let addr = init().await;

        let config = RunConfig::new(&format!("http://{addr}/pessoas"), short_plan())
            .method(Method::Post)
            .payload(PERSON)
            .header("content-type", "application/json")
            .check(CheckSpec {
                name: "created".into(),
                kind: CheckKind::Status { equals: 201 },
            })
            .sleep(Duration::from_millis(10));

        let report = LoadTest::new(config, client()).unwrap().await;
        let stats = &report.stats;

        assert!(stats.requests > 0);
        assert_eq!(stats.transport_errors, 0);
        assert_eq!(stats.checks_failed, 0);
        assert_eq!(stats.checks_passed, stats.requests);
        assert!((18..=20).contains(&stats.peak_users));
        assert_eq!(stats.latency.count, stats.requests);
        assert_eq!(report.exit_code, 0);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn login_check_fails_without_affecting_exit_status() {
        let addr = init().await;

        // The target answers 201 while the check expects 200.
        let config = RunConfig::new(&format!("http://{addr}/pessoas"), short_plan())
            .method(Method::Post)
            .payload(PERSON)
            .header("content-type", "application/json")
            .check(CheckSpec::status("success login", 200))
            .sleep(Duration::from_millis(10));

        let report = LoadTest::new(config, client()).unwrap().await;

        assert!(report.stats.requests > 0);
        assert_eq!(report.stats.checks_passed, 0);
        assert_eq!(report.stats.checks[0].name, "success login");
        assert_eq!(report.stats.checks[0].failed, report.stats.requests);
        assert!(report.passed());
        assert_eq!(report.exit_code, 0);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn invalid_payload_is_rejected() {
        let addr = init().await;

        let config = RunConfig::new(&format!("http://{addr}/pessoas"), short_plan())
            .method(Method::Post)
            .payload("{}")
            .check(CheckSpec {
                name: "bad request".into(),
                kind: CheckKind::Status { equals: 400 },
            })
            .sleep(Duration::from_millis(10));

        let report = LoadTest::new(config, client()).unwrap().await;

        assert!(report.stats.requests > 0);
        assert_eq!(report.stats.checks_failed, 0);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn server_errors_cross_failure_threshold() {
        let addr = init().await;

        let config = RunConfig::new(&format!("http://{addr}/status/500"), short_plan())
            .check(CheckSpec {
                name: "ok".into(),
                kind: CheckKind::Success,
            })
            .sleep(Duration::from_millis(10))
            .thresholds(Thresholds {
                max_check_failure_rate: Some(0.1),
                exit_code: 3,
                ..Default::default()
            });

        let report = LoadTest::new(config, client()).unwrap().await;

        assert!(report.stats.requests > 0);
        assert_eq!(report.stats.transport_errors, 0);
        assert_eq!(report.stats.checks_passed, 0);
        assert!(!report.passed());
        assert_eq!(report.exit_code, 3);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn flaky_target_reports_partial_failure_rate() {
        let addr = init().await;

        let config = RunConfig::new(&format!("http://{addr}/flaky/4"), short_plan())
            .check(CheckSpec::status("ok", 200))
            .sleep(Duration::from_millis(10));

        let report = LoadTest::new(config, client()).unwrap().await;
        let rate = report.stats.check_failure_rate();

        assert!(report.stats.requests >= 100);
        assert!((0.2..=0.3).contains(&rate), "failure rate {rate}");
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn body_checks_see_response_text() {
        let addr = init().await;

        let config = RunConfig::new(&format!("http://{addr}/delay/ms/20"), short_plan())
            .check(CheckSpec {
                name: "says ok".into(),
                kind: CheckKind::BodyContains { text: "ok".into() },
            });

        let report = LoadTest::new(config, client()).unwrap().await;

        assert!(report.stats.requests > 0);
        assert_eq!(report.stats.checks_failed, 0);
        assert!(report.stats.latency.min >= Duration::from_millis(20));
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn throttled_target_splits_ok_and_429() {
        let addr = init().await;

        let url = format!("http://{addr}/limited/20/server/throttled");
        let config = RunConfig::new(&url, short_plan())
            .check(CheckSpec::status("ok", 200))
            .check(CheckSpec::status("throttled", 429))
            .sleep(Duration::from_millis(10));

        let report = LoadTest::new(config, client()).unwrap().await;
        let stats = &report.stats;

        assert!(stats.requests >= 100);
        assert!(stats.checks[0].passed > 0);
        // Burst of 20, then 20 per second over roughly 1.6s.
        assert!(stats.checks[0].passed <= 60, "{} passed", stats.checks[0].passed);
        assert!(stats.checks[1].passed > 0);
        assert_eq!(stats.checks[0].passed + stats.checks[1].passed, stats.requests);
        assert_eq!(report.exit_code, 0);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn refused_connections_are_transport_errors() {
        init().await;
        let addr = closed_port().await;

        let config = RunConfig::new(&format!("http://{addr}/"), short_plan())
            .check(CheckSpec::status("ok", 200))
            .sleep(Duration::from_millis(50))
            .thresholds(Thresholds {
                max_check_failure_rate: Some(0.0),
                ..Default::default()
            });

        let report = LoadTest::new(config, client()).unwrap().await;
        let stats = &report.stats;

        assert!(stats.requests > 0);
        assert_eq!(stats.transport_errors, stats.requests);
        assert_eq!(stats.checks_failed, stats.requests);
        assert_eq!(stats.latency.count, 0);
        assert_eq!(report.exit_code, 99);
    }

    #[tokio::test]
    #[timeout(10_000)]
    async fn stop_ends_a_long_run_early() {
        let addr = init().await;

        let config = RunConfig::new(
            &format!("http://{addr}/delay/ms/5"),
            vec![Stage::new(Duration::from_secs(60), 10)],
        );

        let load_test = LoadTest::new(config, client()).unwrap();
        let handle = load_test.handle();
        let run = tokio::spawn(load_test);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(handle.state(), RunState::Ramping(0)));
        handle.stop();

        let report = run.await.unwrap();
        assert_eq!(handle.state(), RunState::Completed);
        assert!(report.elapsed() < Duration::from_secs(5));
        assert!(report.stats.requests > 0);
    }
}
