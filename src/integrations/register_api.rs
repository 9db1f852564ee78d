use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    core::{
        directory::{ParticipantDirectory, ParticipantEditor},
        participant::{Counters, Identifier, ParticipantRecord, ReconcileCountersResponse},
        settings::Settings,
    },
    error::{DirectoryError, DirectoryResult},
};

/// HTTP client for the events registration API
#[derive(Clone)]
pub struct RegisterApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RegisterApi {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_url()?,
            token: settings.api_token.clone(),
        })
    }

    /// Builds a url from path segments, escaping each one
    fn url(&self, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DirectoryError::InvalidRequest(format!("'{}' cannot be a base url", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request and returns the body on a 2xx answer
    async fn send(&self, request: RequestBuilder) -> DirectoryResult<String> {
        let response = request.send().await.map_err(|e| {
            log::warn!("An error occurred: {}", e);
            DirectoryError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            Err(DirectoryError::NotFound)
        } else if !status.is_success() {
            log::warn!("Backend returned code {}, body was: {}", status.as_u16(), body);
            Err(DirectoryError::Server {
                status: status.as_u16(),
                body,
            })
        } else {
            Ok(body)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> DirectoryResult<T> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_with_body<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> DirectoryResult<T> {
        self.send_json(
            self.request(method, url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_string(body)?),
        )
        .await
    }

    /// Mutations are keyed by email only
    fn email_of(id: &Identifier) -> DirectoryResult<&str> {
        match id {
            Identifier::Email(email) => Ok(email),
            Identifier::Phone(_) => Err(DirectoryError::InvalidRequest(format!(
                "{} cannot be used to change a participant",
                id
            ))),
        }
    }

    pub async fn counters(&self, event: &str) -> DirectoryResult<Counters> {
        let url = self.url(&["v1", event, "counters"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Asks the API to recount the event's counters from the stored records
    pub async fn reconcile_counters(
        &self,
        event: &str,
    ) -> DirectoryResult<ReconcileCountersResponse> {
        let url = self.url(&["v1", "reconcile-counters", event])?;
        self.send_json(self.request(Method::POST, url)).await
    }
}

#[async_trait]
impl ParticipantDirectory for RegisterApi {
    async fn fetch(
        &self,
        id: &Identifier,
        event: &str,
    ) -> DirectoryResult<Option<ParticipantRecord>> {
        log::debug!("Fetching {} for {}", id, event);
        let url = match id {
            Identifier::Email(email) => self.url(&["v1", event, email])?,
            Identifier::Phone(phone) => self.url(&["v1", event, "phone", phone])?,
        };

        let body = self.send(self.request(Method::GET, url)).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn confirm_check_in(
        &self,
        id: &Identifier,
        event: &str,
    ) -> DirectoryResult<ParticipantRecord> {
        let url = self.url(&["v2", event, Self::email_of(id)?, "checkin"])?;
        self.send_json(self.request(Method::PUT, url)).await
    }

    async fn cancel_check_in(&self, id: &Identifier, event: &str) -> DirectoryResult<()> {
        let url = self.url(&["v2", event, Self::email_of(id)?, "checkin"])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[async_trait]
impl ParticipantEditor for RegisterApi {
    async fn update_participant(
        &self,
        id: &Identifier,
        event: &str,
        record: &ParticipantRecord,
    ) -> DirectoryResult<ParticipantRecord> {
        let url = self.url(&["v2", event, Self::email_of(id)?])?;
        self.send_with_body(Method::PUT, url, record).await
    }
}
