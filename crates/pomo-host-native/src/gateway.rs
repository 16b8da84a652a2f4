//! HTTP session gateway

use async_trait::async_trait;
use pomo_api::TimerSnapshot;
use pomo_host_api::{GatewayCall, GatewayError, GatewayResult, SessionGateway};
use pomo_util::{ActivityId, SessionId};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for [`HttpGateway`]
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// API root, e.g. `https://pomo.example.com/api`
    pub base_url: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    pub timeout: Duration,
}

/// `SessionGateway` over the REST API:
/// `GET {base}/activities/{a}/sessions/{s}` for snapshots and
/// `POST {base}/activities/{a}/sessions/{s}/{action}` for transitions.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::transient(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    pub fn session_url(&self, activity_id: &ActivityId, session_id: &SessionId) -> String {
        format!(
            "{}/activities/{}/sessions/{}",
            self.base_url, activity_id, session_id
        )
    }

    pub fn call_url(
        &self,
        call: GatewayCall,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> String {
        let session = self.session_url(activity_id, session_id);
        match call.action_path() {
            Some(action) => format!("{}/{}", session, action),
            None => session,
        }
    }

    async fn send(
        &self,
        call: GatewayCall,
        activity_id: &ActivityId,
        session_id: &SessionId,
    ) -> GatewayResult<TimerSnapshot> {
        let url = self.call_url(call, activity_id, session_id);
        let mut request = match call {
            GatewayCall::GetSession => self.client.get(&url),
            _ => self.client.post(&url),
        };
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Gateway request failed");
            GatewayError::transient(e.to_string())
        })?;

        let status = response.status();
        debug!(url = %url, status = %status, call = call.name(), "Gateway response");

        if !status.is_success() {
            return Err(classify_status(status));
        }

        response
            .json::<TimerSnapshot>()
            .await
            .map_err(|e| GatewayError::transient(format!("Invalid session payload: {}", e)))
    }
}

/// Map a non-success HTTP status onto the gateway error taxonomy
pub fn classify_status(status: StatusCode) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        StatusCode::CONFLICT => GatewayError::Conflict,
        other => GatewayError::transient(format!("HTTP {}", other)),
    }
}

#[async_trait]
impl SessionGateway for HttpGateway {
    async fn get_session(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::GetSession, a, s).await
    }

    async fn complete_phase(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::CompletePhase, a, s).await
    }

    async fn start(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::Start, a, s).await
    }

    async fn pause(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::Pause, a, s).await
    }

    async fn resume(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::Resume, a, s).await
    }

    async fn stop(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::Stop, a, s).await
    }

    async fn finish(&self, a: &ActivityId, s: &SessionId) -> GatewayResult<TimerSnapshot> {
        self.send(GatewayCall::Finish, a, s).await
    }
}
