use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use shared::{
    domain::{Event, EventId, SortOrder, Subscriber, UserProfile},
    error::EndpointFailure,
    protocol::{
        GetEventRequest, ListEventsRequest, LoginForm, LoginResult,
        SubscribeRequest, UpdateEventRequest, EVENT_ENDPOINT, SUBSCRIBER_ENDPOINT,
        USER_INFO_ENDPOINT,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{backend::EventBackend, error::BackendError};

/// Event service client over HTTP.
///
/// Endpoint methods are `POST {base}/connect/{Endpoint}/{method}` with the
/// named parameters as a JSON object. Authentication uses a cookie session
/// established by `POST {base}/login`.
pub struct HttpEventBackend {
    http: Client,
    base_url: Url,
}

impl HttpEventBackend {
    pub fn new(server_url: &str) -> Result<Self, BackendError> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| BackendError::Transport(format!("failed to build http client: {err}")))?;
        Self::with_client(http, server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, BackendError> {
        let mut raw = server_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|err| BackendError::Transport(format!("invalid server url '{raw}': {err}")))?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url.join(path).map_err(|err| {
            BackendError::Transport(format!("invalid endpoint path '{path}': {err}"))
        })
    }

    async fn call<P, R>(&self, endpoint: &str, method: &str, params: &P) -> Result<R, BackendError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(&format!("connect/{endpoint}/{method}"))?;
        debug!(endpoint, method, "calling endpoint");
        let response = self.http.post(url).json(params).send().await?;
        let response = check_status(response).await?;
        response.json::<R>().await.map_err(|err| {
            BackendError::Decode(format!("{endpoint}.{method} returned unexpected body: {err}"))
        })
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let failure = EndpointFailure::from_response(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        &body,
    );
    warn!(status = status.as_u16(), message = %failure.message, "endpoint call failed");
    Err(BackendError::Endpoint(failure))
}

#[async_trait]
impl EventBackend for HttpEventBackend {
    async fn find_all_events(&self) -> Result<Vec<Event>, BackendError> {
        self.call(EVENT_ENDPOINT, "findAll", &json!({})).await
    }

    async fn list_events(
        &self,
        offset: u64,
        limit: u32,
        sort_orders: &[SortOrder],
    ) -> Result<Vec<Event>, BackendError> {
        let request = ListEventsRequest {
            offset,
            limit,
            sort_order: sort_orders.to_vec(),
        };
        let events: Option<Vec<Event>> = self.call(EVENT_ENDPOINT, "list", &request).await?;
        Ok(events.unwrap_or_default())
    }

    async fn count_events(&self) -> Result<u64, BackendError> {
        let count: Option<u64> = self.call(EVENT_ENDPOINT, "count", &json!({})).await?;
        Ok(count.unwrap_or_default())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, BackendError> {
        self.call(EVENT_ENDPOINT, "get", &GetEventRequest { id }).await
    }

    async fn update_event(&self, event: &Event) -> Result<Event, BackendError> {
        let request = UpdateEventRequest {
            entity: event.clone(),
        };
        self.call(EVENT_ENDPOINT, "update", &request).await
    }

    async fn subscribe_to(&self, subscriber: &Subscriber) -> Result<Subscriber, BackendError> {
        let request = SubscribeRequest {
            entity: subscriber.clone(),
        };
        self.call(SUBSCRIBER_ENDPOINT, "subscribeTo", &request).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, BackendError> {
        let form = LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("login")?)
            .form(&form)
            .send()
            .await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let accepted = response.status().is_success()
            && header("Result").as_deref() == Some("success");
        if accepted {
            return Ok(LoginResult::success(header("Saved-url"), header("Default-url")));
        }

        if response.status() == StatusCode::UNAUTHORIZED || response.status().is_success() {
            return Ok(LoginResult::incorrect_credentials());
        }

        let status = response.status();
        Ok(LoginResult::failure("Error", format!("Login failed with status {status}")))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let response = self.http.post(self.url("logout")?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<UserProfile, BackendError> {
        self.call(USER_INFO_ENDPOINT, "getUserInfo", &json!({})).await
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        // Any answer at all means the service is reachable.
        self.http.head(self.base_url.clone()).send().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_backend_tests.rs"]
mod tests;
