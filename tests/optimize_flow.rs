//! Optimize request/response exchange against a mock service.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cut_planner::client::{ClientError, OptimizerClient, SERVICE_WAKING_MESSAGE};
use cut_planner::report::build_report;
use cut_planner::types::{Credential, Problem};

fn solution_body() -> serde_json::Value {
    json!({
        "board_plan": {"0": 1},
        "cut_plan": {"0": [[24.0, 24.0, 24.0]]},
        "waste_summary": {"0": 24.0},
        "total_cost": 8.0
    })
}

#[tokio::test]
async fn anonymous_optimize_returns_solution() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/optimize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(solution_body()))
        .mount(&server)
        .await;

    let client = OptimizerClient::new(&server.uri()).unwrap();
    let problem = Problem::default();
    let solution = client.optimize(&problem, None).await.unwrap();

    assert_eq!(solution.board_plan.get(&0), Some(&1));
    assert_eq!(solution.total_cost, 8.0);

    // The single board instance fits within the 96" board, with the
    // remainder matching the reported waste.
    let report = build_report(&problem.boards, &solution).unwrap();
    let instance = &report.cutting[0].instances[0];
    assert!(instance.used <= 96.0);
    assert_eq!(instance.waste, solution.waste_summary[&0]);
    assert!(report.inconsistencies.is_empty());

    // Anonymous submission carries no bearer header.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn authenticated_optimize_attaches_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/optimize"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(solution_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = OptimizerClient::new(&server.uri()).unwrap();
    let credential = Credential {
        access_token: "at-1".to_string(),
        refresh_token: "rt-1".to_string(),
    };
    client
        .optimize(&Problem::default(), Some(&credential))
        .await
        .unwrap();
}

#[tokio::test]
async fn structured_rejection_surfaces_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/optimize"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "cut 120\" does not fit any board"})),
        )
        .mount(&server)
        .await;

    let client = OptimizerClient::new(&server.uri()).unwrap();
    let err = client.optimize(&Problem::default(), None).await.unwrap_err();
    match err {
        ClientError::Rejected(message) => {
            assert_eq!(message, "cut 120\" does not fit any board");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_reports_warm_up_message() {
    // Start and drop a mock server so the port is bound to nothing. The
    // unpooled builder server is required: pooled servers from
    // `MockServer::start()` keep their listener alive after drop.
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let client = OptimizerClient::new(&uri).unwrap();
    let err = client.optimize(&Problem::default(), None).await.unwrap_err();
    assert!(matches!(err, ClientError::ServiceWaking));
    assert_eq!(err.to_string(), SERVICE_WAKING_MESSAGE);
}

#[tokio::test]
async fn second_request_in_flight_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/optimize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(solution_body())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let client = OptimizerClient::new(&server.uri()).unwrap();
    let problem = Problem::default();

    let slow = client.optimize(&problem, None);
    let concurrent = async {
        // Let the first submission take the slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.optimize(&problem, None).await
    };

    let (first, second) = tokio::join!(slow, concurrent);
    assert!(first.is_ok());
    assert!(matches!(second, Err(ClientError::RequestInFlight)));
}

#[tokio::test]
async fn ping_reports_liveness() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = OptimizerClient::new(&server.uri()).unwrap();
    assert!(client.ping().await);

    let gone = MockServer::start().await;
    let uri = gone.uri();
    drop(gone);
    let client = OptimizerClient::new(&uri).unwrap();
    assert!(!client.ping().await);
}
