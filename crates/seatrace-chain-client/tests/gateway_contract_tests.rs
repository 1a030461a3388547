//! Contract tests for ChainClient against a simulated WeBASE-Front node.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST   | `/WeBASE-Front/trans/handle` | `handle_*` |
//! | POST   | `/WeBASE-Front/trans/call` (`getFullTrace`) | `full_trace_*` |
//! | POST   | `/WeBASE-Front/trans/call` (`getGoodStatus`) | `good_status_*` |
//! | GET    | `/WeBASE-Front/{group}/web3/blockNumber` | `block_number_*` |
//! | GET    | `/WeBASE-Front/{group}/web3/transaction/{hash}` | `transaction_*` |

use std::time::Duration;

use seatrace_chain_client::{
    ChainClient, ChainConfig, ChainError, ChainGateway, ContractCall, ReadRetry,
};
use seatrace_core::{GoodId, GoodStatus};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: &str = "0x1111111111111111111111111111111111111111";
const COMPANY: &str = "0x8f2a55949038a9610f50fb23b5883af3b4ecb3c3";

fn good_id() -> GoodId {
    GoodId::new("G120250515abcd1234").unwrap()
}

fn test_config(mock_server: &MockServer) -> ChainConfig {
    let mut config = ChainConfig::local_mock(&mock_server.uri(), CONTRACT).unwrap();
    config.contract_abi = serde_json::json!([{"name": "registerGood", "type": "function"}]);
    config
}

fn test_client(mock_server: &MockServer) -> ChainClient {
    ChainClient::new(test_config(mock_server)).unwrap()
}

// ── POST /WeBASE-Front/trans/handle ──────────────────────────────────

#[tokio::test]
async fn handle_sends_gateway_body_and_returns_receipt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .and(body_partial_json(serde_json::json!({
            "groupId": 1,
            "contractAddress": CONTRACT,
            "contractName": "Traceability",
            "funcName": "registerGood",
            "funcParam": ["G120250515abcd1234", "Yellow Croaker Batch 1"],
            "user": COMPANY,
            "useCns": false,
            "contractAbi": [{"name": "registerGood", "type": "function"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "data": {},
            "transactionHash": "0xabc123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ContractCall::register_good(&good_id(), "Yellow Croaker Batch 1", COMPANY);
    let receipt = client.invoke(&call).await.unwrap();
    assert_eq!(receipt.transaction_hash, "0xabc123");
    assert!(receipt.is_success());
}

#[tokio::test]
async fn handle_passes_non_success_message_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "transaction reverted",
            "transactionHash": "0xdead"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ContractCall::ship_good(&good_id(), "reefer", COMPANY);
    let receipt = client.invoke(&call).await.unwrap();
    assert!(!receipt.is_success());
    assert_eq!(receipt.message, "transaction reverted");
}

#[tokio::test]
async fn handle_rejects_nonzero_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 201151,
            "message": "contract address is invalid"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ContractCall::inspect_good(&good_id(), "ok", COMPANY);
    match client.invoke(&call).await {
        Err(ChainError::Rejected { code, function, .. }) => {
            assert_eq!(code, 201151);
            assert_eq!(function, "inspectGood");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn handle_requires_transaction_hash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "transactionHash": ""
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ContractCall::deliver_good(&good_id(), "handed over", COMPANY);
    assert!(matches!(
        client.invoke(&call).await,
        Err(ChainError::MissingTransactionHash { .. })
    ));
}

#[tokio::test]
async fn handle_is_not_retried_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ContractCall::register_good(&good_id(), "x", COMPANY);
    match client.invoke(&call).await {
        Err(ChainError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn handle_sends_app_credentials_when_both_set() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/handle"))
        .and(header("App-Key", "key-1"))
        .and(header("App-Secret", "secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "transactionHash": "0x1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server);
    config.app_key = Some("key-1".into());
    config.app_secret = Some(zeroize::Zeroizing::new("secret-1".into()));
    let client = ChainClient::new(config).unwrap();

    let call = ContractCall::register_good(&good_id(), "x", COMPANY);
    assert!(client.invoke(&call).await.is_ok());
}

// ── POST /WeBASE-Front/trans/call ────────────────────────────────────

#[tokio::test]
async fn full_trace_decodes_result_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .and(body_partial_json(serde_json::json!({
            "funcName": "getFullTrace",
            "user": "public_user",
            "funcParam": ["G120250515abcd1234"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "data": {
                "result": {
                    "goodId": "G120250515abcd1234",
                    "ownerCompanyId": "1",
                    "goodName": "Yellow Croaker Batch 1",
                    "registerTime": "1747300000",
                    "shipCompanyId": "2",
                    "shipOperatorAddr": COMPANY,
                    "transportInfo": "reefer",
                    "shipTime": "1747303600",
                    "shipExists": true,
                    "portCompanyId": "3",
                    "inspectOperatorAddr": COMPANY,
                    "inspectionInfo": "grade A",
                    "inspectTime": "1747307200",
                    "inspectExists": true,
                    "dealerCompanyId": "",
                    "deliveryOperatorAddr": "",
                    "deliveryInfo": "",
                    "deliveryTime": "0",
                    "deliveryExists": false
                }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let trace = client.full_trace(&good_id()).await.unwrap();
    assert_eq!(trace.good_id, "G120250515abcd1234");
    assert_eq!(trace.owner_company_id, "1");
    assert_eq!(trace.completed_stages, 3);
    assert_eq!(trace.inspection.as_ref().unwrap().info, "grade A");
    assert!(trace.delivery.is_none());
    assert!(trace.register_time.is_some());
}

#[tokio::test]
async fn full_trace_without_result_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "data": {}
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(matches!(
        client.full_trace(&good_id()).await,
        Err(ChainError::Decode { .. })
    ));
}

#[tokio::test]
async fn good_status_parses_string_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .and(body_partial_json(serde_json::json!({"funcName": "getGoodStatus"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "data": {"result": "3"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(
        client.good_status(&good_id()).await.unwrap(),
        GoodStatus::Inspected
    );
}

#[tokio::test]
async fn good_status_recovers_after_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .respond_with(ResponseTemplate::new(503).set_body_string("node restarting"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "Success",
            "data": {"result": "2"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let retry = ReadRetry::new(4, Duration::from_millis(1));
    let client = ChainClient::with_read_retry(test_config(&mock_server), retry).unwrap();
    assert_eq!(
        client.good_status(&good_id()).await.unwrap(),
        GoodStatus::Shipped
    );
}

#[tokio::test]
async fn good_status_reports_exhausted_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/WeBASE-Front/trans/call"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let retry = ReadRetry::new(3, Duration::from_millis(1));
    let client = ChainClient::with_read_retry(test_config(&mock_server), retry).unwrap();
    let err = client.good_status(&good_id()).await.unwrap_err();
    assert_eq!(err.attempts(), 3);
    assert!(err.to_string().contains("after 3 attempts"), "{err}");
}

// ── GET /WeBASE-Front/{group}/web3/... ───────────────────────────────

#[tokio::test]
async fn block_number_accepts_hex() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/WeBASE-Front/1/web3/blockNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0x2a"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.block_number().await.unwrap(), 42);
}

#[tokio::test]
async fn block_number_accepts_decimal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/WeBASE-Front/1/web3/blockNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1234"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.block_number().await.unwrap(), 1234);
}

#[tokio::test]
async fn block_number_uses_configured_group() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/WeBASE-Front/7/web3/blockNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server);
    config.group_id = 7;
    let client = ChainClient::new(config).unwrap();
    assert_eq!(client.block_number().await.unwrap(), 1);
}

#[tokio::test]
async fn transaction_returns_raw_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/WeBASE-Front/1/web3/transaction/0xabc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "hash": "0xabc123",
            "blockNumber": 17,
            "from": COMPANY
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let tx = client.transaction("0xabc123").await.unwrap();
    assert_eq!(tx["blockNumber"], 17);
}

#[tokio::test]
async fn transaction_not_found_surfaces_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/WeBASE-Front/1/web3/transaction/0xmissing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(matches!(
        client.transaction("0xmissing").await,
        Err(ChainError::Status { status: 404, .. })
    ));
}
