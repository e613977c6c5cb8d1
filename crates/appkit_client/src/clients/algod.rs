//! [`Transport`] and [`Compiler`] over the algod REST API.

use crate::compiler::{CompiledProgram, Compiler, CompilerError};
use crate::transport::{
    AccountInfo, AppState, ApplicationInfo, NodeStatus, PendingTransactionInfo, SimulateResponse,
    SuggestedParams, TealValue, Transport, TransportError,
};
use appkit_http_client::{HttpClient, HttpError, HttpRequest};
use appkit_transact::{Address, AlgorandMsgpack, SignedTransaction, StateSchema};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

const TOKEN_HEADER: &str = "X-Algo-API-Token";
const LOCALNET_SERVER: &str = "http://localhost";
const LOCALNET_PORT: u16 = 4001;
const LOCALNET_TOKEN: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Where to find an algod node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgodConfig {
    /// Base URL of the server e.g. http://localhost, https://testnet-api.algonode.cloud
    pub server: String,
    pub port: Option<u16>,
    pub token: Option<String>,
}

impl AlgodConfig {
    pub fn localnet() -> Self {
        AlgodConfig {
            server: LOCALNET_SERVER.to_string(),
            port: Some(LOCALNET_PORT),
            token: Some(LOCALNET_TOKEN.to_string()),
        }
    }

    /// Reads `ALGOD_SERVER`, `ALGOD_PORT` and `ALGOD_TOKEN` (a `.env` file is honoured), falling
    /// back to the localnet defaults when no server is configured.
    pub fn from_environment() -> Self {
        let _ = dotenvy::dotenv();
        match env::var("ALGOD_SERVER") {
            Ok(server) => AlgodConfig {
                server,
                port: env::var("ALGOD_PORT").ok().and_then(|p| p.parse().ok()),
                token: env::var("ALGOD_TOKEN").ok(),
            },
            Err(_) => Self::localnet(),
        }
    }

    pub fn base_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        match self.port {
            Some(port) => format!("{}:{}", server, port),
            None => server.to_string(),
        }
    }
}

pub struct AlgodTransport {
    http_client: Arc<dyn HttpClient>,
}

impl AlgodTransport {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    #[cfg(feature = "default_http_client")]
    pub fn from_config(config: &AlgodConfig) -> Result<Self, TransportError> {
        use appkit_http_client::DefaultHttpClient;

        let base_url = config.base_url();
        let http_client: Arc<dyn HttpClient> = match &config.token {
            Some(token) => Arc::new(
                DefaultHttpClient::with_header(&base_url, TOKEN_HEADER, token)
                    .map_err(request_error)?,
            ),
            None => Arc::new(DefaultHttpClient::new(&base_url)),
        };
        Ok(Self::new(http_client))
    }

    #[cfg(feature = "default_http_client")]
    pub fn from_environment() -> Result<Self, TransportError> {
        Self::from_config(&AlgodConfig::from_environment())
    }

    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>, HttpError> {
        Ok(self.http_client.send(request).await?.body)
    }

    async fn get<T: DeserializeOwned>(&self, path: String) -> Result<T, TransportError> {
        let body = self
            .send(HttpRequest::get(path))
            .await
            .map_err(transport_error)?;
        decode_json(&body)
    }
}

fn request_error(e: HttpError) -> TransportError {
    TransportError::Request {
        message: e.to_string(),
    }
}

/// 404 means not found and 400 is a rejection carrying the node's message verbatim.
fn transport_error(e: HttpError) -> TransportError {
    match e {
        HttpError::StatusError { status: 404, message } => TransportError::NotFound { message },
        HttpError::StatusError { status: 400, message } => TransportError::Rejected {
            message: node_message(&message),
        },
        e => request_error(e),
    }
}

/// algod wraps errors as `{"message": "..."}`.
fn node_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        message: String,
    }
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(body).map_err(|e| TransportError::Decode {
        message: e.to_string(),
    })
}

fn decode_base64(value: &str) -> Result<Vec<u8>, TransportError> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TransactionParamsResponse {
    consensus_version: String,
    fee: u64,
    genesis_hash: String,
    genesis_id: String,
    last_round: u64,
    min_fee: u64,
}

#[derive(Deserialize)]
struct PostTransactionsResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct PendingTransactionResponse {
    confirmed_round: Option<u64>,
    #[serde(default)]
    pool_error: String,
    application_index: Option<u64>,
    #[serde(default)]
    logs: Vec<String>,
}

impl PendingTransactionResponse {
    fn into_info(self) -> Result<PendingTransactionInfo, TransportError> {
        Ok(PendingTransactionInfo {
            confirmed_round: self.confirmed_round,
            pool_error: self.pool_error,
            application_index: self.application_index,
            logs: self
                .logs
                .iter()
                .map(|log| decode_base64(log))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct NodeStatusResponse {
    last_round: u64,
}

#[derive(Deserialize)]
struct TealValueResponse {
    #[serde(rename = "type")]
    value_type: u8,
    #[serde(default)]
    bytes: String,
    #[serde(default)]
    uint: u64,
}

#[derive(Deserialize)]
struct TealKeyValue {
    key: String,
    value: TealValueResponse,
}

fn decode_state(entries: &[TealKeyValue]) -> Result<AppState, TransportError> {
    entries
        .iter()
        .map(|entry| {
            let value = match entry.value.value_type {
                1 => TealValue::Bytes(decode_base64(&entry.value.bytes)?),
                2 => TealValue::Uint(entry.value.uint),
                other => {
                    return Err(TransportError::Decode {
                        message: format!("Unknown TEAL value type {}", other),
                    });
                }
            };
            Ok((decode_base64(&entry.key)?, value))
        })
        .collect()
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct SchemaResponse {
    #[serde(default)]
    num_uint: u64,
    #[serde(default)]
    num_byte_slice: u64,
}

impl From<SchemaResponse> for StateSchema {
    fn from(schema: SchemaResponse) -> Self {
        StateSchema::new(schema.num_uint, schema.num_byte_slice)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ApplicationParamsResponse {
    creator: String,
    approval_program: String,
    clear_state_program: String,
    #[serde(default)]
    extra_program_pages: u64,
    #[serde(default)]
    global_state: Vec<TealKeyValue>,
    #[serde(default)]
    global_state_schema: SchemaResponse,
    #[serde(default)]
    local_state_schema: SchemaResponse,
}

#[derive(Deserialize)]
struct ApplicationResponse {
    id: u64,
    params: ApplicationParamsResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LocalStateResponse {
    #[serde(default)]
    key_value: Vec<TealKeyValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AccountResponse {
    address: String,
    amount: u64,
    auth_addr: Option<String>,
    #[serde(default)]
    total_apps_opted_in: u64,
    #[serde(default)]
    total_created_apps: u64,
    round: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AccountApplicationResponse {
    app_local_state: Option<LocalStateResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SimulateRequest<'a> {
    txn_groups: Vec<SimulateRequestGroup<'a>>,
    allow_empty_signatures: bool,
}

#[derive(Serialize)]
struct SimulateRequestGroup<'a> {
    txns: &'a [SignedTransaction],
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SimulateResponseBody {
    last_round: u64,
    txn_groups: Vec<SimulateGroupResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SimulateGroupResponse {
    failure_message: Option<String>,
    txn_results: Vec<SimulateTransactionResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SimulateTransactionResult {
    txn_result: PendingTransactionResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CompileResponse {
    hash: String,
    result: String,
    sourcemap: Option<serde_json::Value>,
}

#[async_trait]
impl Transport for AlgodTransport {
    async fn suggested_params(&self) -> Result<SuggestedParams, TransportError> {
        let response: TransactionParamsResponse =
            self.get("/v2/transactions/params".to_string()).await?;
        let genesis_hash = decode_base64(&response.genesis_hash)?
            .try_into()
            .map_err(|_| TransportError::Decode {
                message: "Genesis hash is not 32 bytes".to_string(),
            })?;

        Ok(SuggestedParams {
            fee: response.fee,
            min_fee: response.min_fee,
            last_round: response.last_round,
            genesis_id: response.genesis_id,
            genesis_hash,
            consensus_version: response.consensus_version,
        })
    }

    async fn submit(&self, signed: &[SignedTransaction]) -> Result<String, TransportError> {
        let mut body = Vec::new();
        for stx in signed {
            body.extend(stx.encode().map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?);
        }

        let response = self
            .send(HttpRequest::post(
                "/v2/transactions",
                body,
                "application/x-binary",
            ))
            .await
            .map_err(transport_error)?;
        Ok(decode_json::<PostTransactionsResponse>(&response)?.tx_id)
    }

    async fn pending_transaction_info(
        &self,
        tx_id: &str,
    ) -> Result<PendingTransactionInfo, TransportError> {
        let response: PendingTransactionResponse = self
            .get(format!("/v2/transactions/pending/{}", tx_id))
            .await?;
        response.into_info()
    }

    async fn status(&self) -> Result<NodeStatus, TransportError> {
        let response: NodeStatusResponse = self.get("/v2/status".to_string()).await?;
        Ok(NodeStatus {
            last_round: response.last_round,
        })
    }

    async fn wait_for_block(&self, round: u64) -> Result<NodeStatus, TransportError> {
        let response: NodeStatusResponse = self
            .get(format!("/v2/status/wait-for-block-after/{}", round))
            .await?;
        Ok(NodeStatus {
            last_round: response.last_round,
        })
    }

    async fn application_info(&self, app_id: u64) -> Result<ApplicationInfo, TransportError> {
        let response: ApplicationResponse =
            self.get(format!("/v2/applications/{}", app_id)).await?;
        let params = response.params;

        Ok(ApplicationInfo {
            app_id: response.id,
            creator: Address::from_str(&params.creator).map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })?,
            approval_program: decode_base64(&params.approval_program)?,
            clear_state_program: decode_base64(&params.clear_state_program)?,
            global_state: decode_state(&params.global_state)?,
            global_state_schema: params.global_state_schema.into(),
            local_state_schema: params.local_state_schema.into(),
            extra_program_pages: params.extra_program_pages,
        })
    }

    async fn account_info(&self, address: &Address) -> Result<AccountInfo, TransportError> {
        // Holdings and local states are not needed here
        let request =
            HttpRequest::get(format!("/v2/accounts/{}", address)).query("exclude", "all");
        let body = self.send(request).await.map_err(transport_error)?;
        let response: AccountResponse = decode_json(&body)?;
        let decode_address = |value: &str| {
            Address::from_str(value).map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })
        };

        Ok(AccountInfo {
            address: decode_address(&response.address)?,
            amount: response.amount,
            auth_address: response.auth_addr.as_deref().map(decode_address).transpose()?,
            total_apps_opted_in: response.total_apps_opted_in,
            total_created_apps: response.total_created_apps,
            round: response.round,
        })
    }

    async fn account_application_info(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<AppState, TransportError> {
        let response: AccountApplicationResponse = self
            .get(format!("/v2/accounts/{}/applications/{}", address, app_id))
            .await?;
        let local_state = response
            .app_local_state
            .ok_or_else(|| TransportError::NotFound {
                message: format!("{} has not opted in to application {}", address, app_id),
            })?;
        decode_state(&local_state.key_value)
    }

    async fn simulate(
        &self,
        signed: &[SignedTransaction],
    ) -> Result<SimulateResponse, TransportError> {
        let request = SimulateRequest {
            txn_groups: vec![SimulateRequestGroup { txns: signed }],
            allow_empty_signatures: true,
        };
        let mut body = Vec::new();
        let mut serializer = rmp_serde::Serializer::new(&mut body).with_struct_map();
        request
            .serialize(&mut serializer)
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;

        let response = self
            .send(
                HttpRequest::post("/v2/transactions/simulate", body, "application/msgpack")
                    .query("format", "json"),
            )
            .await
            .map_err(transport_error)?;
        let response: SimulateResponseBody = decode_json(&response)?;

        let group = response
            .txn_groups
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Decode {
                message: "Simulate response has no groups".to_string(),
            })?;
        Ok(SimulateResponse {
            last_round: response.last_round,
            failure_message: group.failure_message,
            txn_results: group
                .txn_results
                .into_iter()
                .map(|result| result.txn_result.into_info())
                .collect::<Result<_, _>>()?,
        })
    }
}

#[async_trait]
impl Compiler for AlgodTransport {
    async fn compile(&self, source: &str, _version: u8) -> Result<CompiledProgram, CompilerError> {
        let response = self
            .send(
                HttpRequest::post("/v2/teal/compile", source.as_bytes().to_vec(), "text/plain")
                    .query("sourcemap", "true"),
            )
            .await
            .map_err(|e| match e {
                HttpError::StatusError { message, .. } => CompilerError::Rejected {
                    message: node_message(&message),
                },
                e => CompilerError::Unavailable {
                    message: e.to_string(),
                },
            })?;

        let response: CompileResponse =
            serde_json::from_slice(&response).map_err(|e| CompilerError::Unavailable {
                message: e.to_string(),
            })?;
        let bytecode = general_purpose::STANDARD
            .decode(&response.result)
            .map_err(|e| CompilerError::Unavailable {
                message: e.to_string(),
            })?;

        Ok(CompiledProgram {
            bytecode,
            hash: response.hash,
            source_map: response.sourcemap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appkit_http_client::HttpResponse;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Answers every request with one canned response and records what was asked.
    struct CannedHttpClient {
        response: Result<Vec<u8>, (u16, String)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(body.as_bytes().to_vec()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn status(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err((status, body.to_string())),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn paths(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|request| request.path.clone())
                .collect()
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for CannedHttpClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().unwrap().push(request);
            match &self.response {
                Ok(body) => Ok(HttpResponse {
                    status: 200,
                    body: body.clone(),
                }),
                Err((status, message)) => Err(HttpError::StatusError {
                    status: *status,
                    message: message.clone(),
                }),
            }
        }
    }

    #[test]
    fn test_config_base_url() {
        assert_eq!(AlgodConfig::localnet().base_url(), "http://localhost:4001");
        let config = AlgodConfig {
            server: "https://testnet-api.algonode.cloud/".to_string(),
            port: None,
            token: None,
        };
        assert_eq!(config.base_url(), "https://testnet-api.algonode.cloud");
    }

    #[tokio::test]
    async fn test_suggested_params_are_decoded() {
        let http = CannedHttpClient::ok(
            r#"{"consensus-version":"future","fee":0,"genesis-hash":"AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=","genesis-id":"dockernet-v1","last-round":42,"min-fee":1000}"#,
        );
        let transport = AlgodTransport::new(http.clone());

        let params = transport.suggested_params().await.unwrap();
        assert_eq!(params.last_round, 42);
        assert_eq!(params.min_fee, 1000);
        assert_eq!(params.genesis_hash, [1u8; 32]);
        assert_eq!(http.paths(), vec!["/v2/transactions/params"]);
    }

    #[tokio::test]
    async fn test_pending_transaction_logs_are_decoded() {
        let http = CannedHttpClient::ok(
            r#"{"confirmed-round":7,"pool-error":"","application-index":1001,"logs":["FR98dQAAAAAAAAAD"]}"#,
        );
        let transport = AlgodTransport::new(http.clone());

        let info = transport.pending_transaction_info("TXID").await.unwrap();
        assert_eq!(info.confirmed_round, Some(7));
        assert_eq!(info.application_index, Some(1001));
        assert_eq!(
            info.logs,
            vec![vec![0x15, 0x1f, 0x7c, 0x75, 0, 0, 0, 0, 0, 0, 0, 3]]
        );
        assert_eq!(http.paths(), vec!["/v2/transactions/pending/TXID"]);
    }

    #[tokio::test]
    async fn test_missing_transaction_is_not_found() {
        let transport = AlgodTransport::new(CannedHttpClient::status(404, "txn not found"));
        let err = transport.pending_transaction_info("TXID").await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejection_message_is_verbatim() {
        let transport = AlgodTransport::new(CannedHttpClient::status(
            400,
            r#"{"message":"TransactionPool.Remember: transaction TXID: logic eval error: err opcode executed"}"#,
        ));
        let err = transport.submit(&[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "TransactionPool.Remember: transaction TXID: logic eval error: err opcode executed"
        );
    }

    #[tokio::test]
    async fn test_global_state_is_decoded() {
        let creator = Address([3; 32]);
        let http = CannedHttpClient::ok(&format!(
            r#"{{"id":1001,"params":{{"creator":"{}","approval-program":"CIEBQw==","clear-state-program":"CIEBQw==","global-state":[{{"key":"Y291bnRlcg==","value":{{"type":2,"uint":3}}}},{{"key":"b3duZXI=","value":{{"type":1,"bytes":"aGk="}}}}],"global-state-schema":{{"num-uint":1,"num-byte-slice":1}}}}}}"#,
            creator
        ));
        let transport = AlgodTransport::new(http);

        let info = transport.application_info(1001).await.unwrap();
        assert_eq!(info.creator, creator);
        assert_eq!(info.global_state[&b"counter".to_vec()], TealValue::Uint(3));
        assert_eq!(
            info.global_state[&b"owner".to_vec()],
            TealValue::Bytes(b"hi".to_vec())
        );
        assert_eq!(info.global_state_schema, StateSchema::new(1, 1));
        assert_eq!(info.approval_program, vec![8, 0x81, 0x01, 0x43]);
    }

    #[tokio::test]
    async fn test_account_info_is_decoded() {
        let account = Address([4; 32]);
        let signer = Address([5; 32]);
        let http = CannedHttpClient::ok(&format!(
            r#"{{"address":"{}","amount":1500000,"auth-addr":"{}","min-balance":100000,"round":12,"total-apps-opted-in":2,"total-created-apps":1,"status":"Offline"}}"#,
            account, signer
        ));
        let transport = AlgodTransport::new(http.clone());

        let info = transport.account_info(&account).await.unwrap();
        assert_eq!(
            info,
            AccountInfo {
                address: account.clone(),
                amount: 1_500_000,
                auth_address: Some(signer),
                total_apps_opted_in: 2,
                total_created_apps: 1,
                round: 12,
            }
        );

        let request = http.last_request();
        assert_eq!(request.path, format!("/v2/accounts/{}", account));
        assert_eq!(request.query.get("exclude").map(String::as_str), Some("all"));
    }

    #[tokio::test]
    async fn test_account_without_local_state_is_not_found() {
        let transport = AlgodTransport::new(CannedHttpClient::ok(r#"{"round":5}"#));
        let err = transport
            .account_application_info(&Address([0; 32]), 1001)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_compile_rejection_carries_diagnostic() {
        let transport = AlgodTransport::new(CannedHttpClient::status(
            400,
            r#"{"message":"1: unknown opcode: intt"}"#,
        ));
        let err = transport.compile("#pragma version 8\nintt 1", 8).await.unwrap_err();
        assert_eq!(err.to_string(), "1: unknown opcode: intt");
    }

    #[tokio::test]
    async fn test_compile_decodes_bytecode() {
        let http = CannedHttpClient::ok(r#"{"hash":"HASH","result":"CIEBQw=="}"#);
        let transport = AlgodTransport::new(http.clone());

        let compiled = transport.compile("#pragma version 8\nint 1", 8).await.unwrap();
        assert_eq!(compiled.bytecode, vec![8, 0x81, 0x01, 0x43]);
        assert_eq!(compiled.hash, "HASH");
        assert_eq!(http.paths(), vec!["/v2/teal/compile"]);

        let request = http.last_request();
        assert_eq!(request.query.get("sourcemap").map(String::as_str), Some("true"));
        assert_eq!(
            request.body.map(|(_, content_type)| content_type),
            Some("text/plain".to_string())
        );
    }
}
