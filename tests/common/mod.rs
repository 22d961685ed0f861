//! Shared test doubles: a scripted gateway, a counting event sink, and a
//! fully wired router over the in-memory store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use malipo_backend::api::{self, AppState};
use malipo_backend::config::PesapalConfig;
use malipo_backend::gateway::error::{GatewayError, GatewayResult};
use malipo_backend::gateway::{GatewayApi, GatewayStatus, OrderRequest, SubmittedOrder};
use malipo_backend::services::{
    CallbackProcessor, EventSink, InitiationService, StatusReconciler,
};
use malipo_backend::store::{
    MemoryTransactionStore, StoreError, Transaction, TransactionStore,
};

/// Gateway double scripted per call.
///
/// `submit` feeds `submit_order`; `statuses` maps tracking ids to the
/// description `query_status` reports. Unknown tracking ids raise a network
/// error.
pub struct ScriptedGateway {
    pub submit: Mutex<Vec<GatewayResult<SubmittedOrder>>>,
    pub statuses: Mutex<HashMap<String, String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            submit: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub async fn push_submit(&self, result: GatewayResult<SubmittedOrder>) {
        self.submit.lock().await.push(result);
    }

    pub async fn set_status(&self, tracking_id: &str, description: &str) {
        self.statuses
            .lock()
            .await
            .insert(tracking_id.to_string(), description.to_string());
    }
}

#[async_trait]
impl GatewayApi for ScriptedGateway {
    async fn submit_order(&self, _order: &OrderRequest) -> GatewayResult<SubmittedOrder> {
        self.submit
            .lock()
            .await
            .pop()
            .unwrap_or_else(|| {
                Err(GatewayError::Network {
                    message: "no scripted submit response".to_string(),
                })
            })
    }

    async fn query_status(&self, tracking_id: &str) -> GatewayResult<GatewayStatus> {
        match self.statuses.lock().await.get(tracking_id) {
            Some(description) => Ok(GatewayStatus {
                raw_description: description.clone(),
                confirmation_code: Some("CONF123".to_string()),
                payment_method: Some("MpesaKE".to_string()),
            }),
            None => Err(GatewayError::Network {
                message: "connection reset".to_string(),
            }),
        }
    }
}

/// Event sink that counts completion fires.
pub struct RecordingSink {
    fired: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            fired: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn transaction_completed(&self, _tx: &Transaction) -> Result<(), StoreError> {
        self.fired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_pesapal_config() -> PesapalConfig {
    PesapalConfig {
        base_url: "https://cybqa.pesapal.com/pesapalv3".to_string(),
        consumer_key: "ck_test".to_string(),
        consumer_secret: "cs_test".to_string(),
        callback_url: "https://merchant.example/payments/complete".to_string(),
        notification_id: "ipn-id".to_string(),
        currency: "KES".to_string(),
        country_code: "KE".to_string(),
        description: "Payment for goods".to_string(),
        request_timeout: 5,
        max_retries: 0,
    }
}

/// Everything a test needs to drive the service end to end.
pub struct TestHarness {
    pub store: MemoryTransactionStore,
    pub gateway: Arc<ScriptedGateway>,
    pub sink: Arc<RecordingSink>,
    pub reconciler: Arc<StatusReconciler>,
    pub state: AppState,
}

impl TestHarness {
    pub fn router(&self) -> axum::Router {
        api::router(self.state.clone())
    }
}

pub fn harness() -> TestHarness {
    let store = MemoryTransactionStore::new();
    let shared: Arc<dyn TransactionStore> = Arc::new(store.clone());
    let gateway = Arc::new(ScriptedGateway::new());
    let sink = Arc::new(RecordingSink::new());

    let reconciler = Arc::new(StatusReconciler::new(shared.clone(), sink.clone()));
    let initiation = Arc::new(InitiationService::new(
        shared.clone(),
        gateway.clone(),
        test_pesapal_config(),
    ));
    let callbacks = Arc::new(CallbackProcessor::new(
        shared.clone(),
        gateway.clone(),
        reconciler.clone(),
    ));

    let state = AppState {
        initiation,
        callbacks,
    };

    TestHarness {
        store,
        gateway,
        sink,
        reconciler,
        state,
    }
}
