// SPDX-License-Identifier: MIT OR Apache-2.0
//! The capability-object transactor: peer discovery over the event bus,
//! the single-call-in-flight gate, and peer-death propagation.

use crate::caller::{ApiCallHandler, ApiCallerProxy, ApiCallerStub};
use crate::{ConnectionStat, TransactorConfig};
use anyhow::{Context, bail};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utk_bus::{BusEvent, EndpointHandle, EventBus, caller_publish_topic};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

/// Callback invoked once when the peer dies.
pub type DeathCallback = Box<dyn FnOnce() + Send>;

struct Shared {
    state: Mutex<ConnectionStat>,
    processing_api: Mutex<String>,
    on_death: Mutex<Option<DeathCallback>>,
}

impl Shared {
    fn on_peer_death(&self) {
        warn!("connection with peer died");
        *self.state.lock().expect("state lock") = ConnectionStat::Disconnected;
        if let Some(callback) = self.on_death.lock().expect("death lock").take() {
            callback();
        }
    }
}

/// One api transaction participant, client or server role.
pub struct ApiTransactor {
    as_server: bool,
    singleness: bool,
    config: TransactorConfig,
    shared: Arc<Shared>,
    caller: Option<Arc<ApiCallerStub>>,
    remote: Option<ApiCallerProxy>,
    death_recipient: Option<JoinHandle<()>>,
}

impl ApiTransactor {
    /// A transactor in the given role, with death tracking enabled.
    #[must_use]
    pub fn new(as_server: bool) -> Self {
        Self::with_config(as_server, TransactorConfig::default())
    }

    /// A transactor for the configuration where client and server share one
    /// process: the peer endpoint is a local stub, liveness is trivially
    /// guaranteed, and death tracking is skipped.
    #[must_use]
    pub fn new_singleness(as_server: bool) -> Self {
        let mut transactor = Self::new(as_server);
        transactor.singleness = true;
        transactor
    }

    /// Like [`ApiTransactor::new`] with explicit tunables.
    #[must_use]
    pub fn with_config(as_server: bool, config: TransactorConfig) -> Self {
        Self {
            as_server,
            singleness: false,
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionStat::Uninit),
                processing_api: Mutex::new(String::new()),
                on_death: Mutex::new(None),
            }),
            caller: None,
            remote: None,
            death_recipient: None,
        }
    }

    /// Register the once-only callback fired on peer death. Rejected in
    /// singleness mode.
    pub fn set_death_callback(&self, callback: DeathCallback) {
        if self.singleness {
            warn!("cannot set death callback in singleness mode");
            return;
        }
        *self.shared.on_death.lock().expect("death lock") = Some(callback);
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_stat(&self) -> ConnectionStat {
        *self.shared.state.lock().expect("state lock")
    }

    /// Establish the peer link for `token`, installing `handler` for calls
    /// arriving from the peer.
    ///
    /// The server publishes its stub under the discovery topic and waits,
    /// republishing, for the client's back-caller; the client waits for the
    /// published stub, then registers its own stub in the reverse direction.
    pub async fn init_and_connect_peer(
        &mut self,
        bus: &Arc<EventBus>,
        token: &str,
        handler: ApiCallHandler,
    ) -> anyhow::Result<()> {
        info!(as_server = self.as_server, token, "connecting peer");
        {
            let mut state = self.shared.state.lock().expect("state lock");
            if *state != ConnectionStat::Uninit {
                bail!("transactor already initialized");
            }
            *state = ConnectionStat::Disconnected;
        }
        let caller = Arc::new(ApiCallerStub::new());
        caller.set_call_handler(handler);

        let remote = if self.as_server {
            publish_caller_and_wait_for_backcaller(bus, token, &caller, &self.config).await?
        } else {
            wait_for_published_caller(bus, token, &self.config).await?
        };
        let proxy =
            ApiCallerProxy::from_endpoint(&remote).context("peer endpoint is not a caller")?;
        if !self.as_server {
            // Register our stub as the server's reverse direction.
            let endpoint: EndpointHandle = Arc::clone(&caller) as EndpointHandle;
            if !proxy.set_back_caller(endpoint) {
                bail!("failed to set backcaller to server");
            }
        }
        if !self.singleness {
            let mut death_watch = proxy.death_watch();
            let shared = Arc::clone(&self.shared);
            self.death_recipient = Some(tokio::spawn(async move {
                while death_watch.changed().await.is_ok() {
                    if *death_watch.borrow() {
                        shared.on_peer_death();
                        break;
                    }
                }
            }));
        }
        self.caller = Some(caller);
        self.remote = Some(proxy);
        *self.shared.state.lock().expect("state lock") = ConnectionStat::Connected;
        info!("peer connected");
        Ok(())
    }

    /// Synchronous call/reply exchange with the peer.
    ///
    /// Enforces the at-most-one-in-flight rule: a second call issued while
    /// one is processing is rejected with `ApiUsage` naming both ids.
    pub async fn transact(&self, call: ApiCallInfo) -> ApiReplyInfo {
        let mut reply = ApiReplyInfo::default();
        match self.connection_stat() {
            ConnectionStat::Uninit => {
                reply.exception =
                    ApiError::with_message(ErrCode::Internal, "transactor not initialized");
                return reply;
            }
            ConnectionStat::Disconnected => {
                reply.exception =
                    ApiError::with_message(ErrCode::Internal, "ipc connection is dead");
                return reply;
            }
            ConnectionStat::Connected => {}
        }
        {
            let mut processing = self.shared.processing_api.lock().expect("processing lock");
            if !processing.is_empty() {
                reply.exception = ApiError::with_message(
                    ErrCode::ApiUsage,
                    format!(
                        "uitest-api does not allow calling concurrently, \
                         current processing: {processing}, incoming: {}",
                        call.api_id
                    ),
                );
                return reply;
            }
            *processing = call.api_id.clone();
        }
        if let Some(remote) = &self.remote {
            remote.call(&call, &mut reply);
        } else {
            reply.exception = ApiError::with_message(ErrCode::Internal, "ipc connection is dead");
        }
        self.shared
            .processing_api
            .lock()
            .expect("processing lock")
            .clear();
        reply
    }

    /// Tear down the link: the death recipient is unregistered first, then
    /// the proxy is dropped, then the own stub is declared dead and dropped.
    pub async fn finalize(&mut self) {
        if self.connection_stat() == ConnectionStat::Uninit {
            return;
        }
        if let Some(recipient) = self.death_recipient.take() {
            recipient.abort();
            let _ = recipient.await;
        }
        self.remote = None;
        if let Some(caller) = self.caller.take() {
            caller.notify_death();
        }
        *self.shared.state.lock().expect("state lock") = ConnectionStat::Disconnected;
        info!("transactor disposed");
    }
}

/// Server side of discovery: publish the stub with retries until the client
/// registers its back-caller or the window closes.
async fn publish_caller_and_wait_for_backcaller(
    bus: &Arc<EventBus>,
    token: &str,
    caller: &Arc<ApiCallerStub>,
    config: &TransactorConfig,
) -> anyhow::Result<EndpointHandle> {
    let (tx, rx) = oneshot::channel::<EndpointHandle>();
    let slot = Mutex::new(Some(tx));
    caller.set_back_caller_hook(Some(Box::new(move |endpoint| {
        if let Some(tx) = slot.lock().expect("hook slot").take() {
            let _ = tx.send(endpoint);
        }
    })));

    let topic = caller_publish_topic(token);
    let period =
        Duration::from_millis(config.wait_conn_timeout_ms / u64::from(config.publish_max_retries));
    let endpoint: EndpointHandle = Arc::clone(caller) as EndpointHandle;
    let mut rx = rx;
    let mut result = None;
    for _ in 0..config.publish_max_retries {
        let event = BusEvent::new(topic.clone())
            .with_param(token, json!(token))
            .with_endpoint(Arc::clone(&endpoint));
        if bus.publish(event).is_err() {
            warn!("publish caller event failed");
        }
        match tokio::time::timeout(period, &mut rx).await {
            Ok(Ok(backcaller)) => {
                result = Some(backcaller);
                break;
            }
            Ok(Err(_)) => break,
            Err(_) => continue,
        }
    }
    caller.set_back_caller_hook(None);
    result.context("wait for backcaller registration timed out")
}

/// Client side of discovery: wait for the server's published stub.
async fn wait_for_published_caller(
    bus: &Arc<EventBus>,
    token: &str,
    config: &TransactorConfig,
) -> anyhow::Result<EndpointHandle> {
    let topic = caller_publish_topic(token);
    let mut subscription = bus.subscribe(&topic);
    let timeout = Duration::from_millis(config.wait_conn_timeout_ms);
    let wait = async {
        loop {
            match subscription.recv().await {
                Some(event) => {
                    if let Some(endpoint) = event.endpoint {
                        return Some(endpoint);
                    }
                    warn!("published event carries no endpoint");
                }
                None => return None,
            }
        }
    };
    match tokio::time::timeout(timeout, wait).await {
        Ok(Some(endpoint)) => Ok(endpoint),
        Ok(None) => bail!("discovery topic closed"),
        Err(_) => bail!("wait for published caller timed out"),
    }
}
