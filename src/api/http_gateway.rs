//! Implements the `Gateway` trait against the expense backend's HTTP endpoints.

use crate::api::wire::{
    CheckUsernameResponse, CreateSessionResponse, EnableAiRequest, ErrorBody, ProcessingResponse,
    SessionRequest, UpdateProductRequest, UpdateTagRequest, UsernameRequest,
};
use crate::api::Gateway;
use crate::error::{ErrorType, IntoResult};
use crate::model::{
    ProcessingStatus, ProductUpdate, SessionId, StatementSource, TagMappingSource, TagUpdate,
    Transaction, UploadFile,
};
use crate::{Config, Error, Result};
use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

const CREATE_SESSION: &str = "";
const CHECK_USERNAME: &str = "check_username";
const UPLOAD: &str = "upload";
const SAMPLE_DATA: &str = "sample-data";
const UPLOAD_TAGS: &str = "upload_tags";
const SAMPLE_TAGS: &str = "sample-tags";
const SET_AI: &str = "set-ai";
const POPULATE: &str = "populate-expense-data";
const EDIT: &str = "edit";
const UPDATE_TAG: &str = "update-tag";
const UPDATE_PRODUCT: &str = "update-product";

const CSV_MIME: &str = "text/csv";

pub(crate) struct HttpGateway {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpGateway {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("expense-ninja/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .context("Unable to build the HTTP client")
            .pub_result(ErrorType::Config)?;
        Ok(Self {
            base_url: config.api_base_url().clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Unable to build the URL for '{path}'"))
            .pub_result(ErrorType::Config)
    }

    async fn post_json<B>(&self, path: &str, body: &B, what: &str) -> Result<Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url.path());
        self.send(self.http.post(url).json(body), what, ErrorType::Transport)
            .await
    }

    /// Sends the request and turns any non-success status into a classified error. `conflict` is
    /// the `ErrorType` reported for a 409.
    async fn send(
        &self,
        request: RequestBuilder,
        what: &str,
        conflict: ErrorType,
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Unable to reach the backend to {what}"))
            .pub_result(ErrorType::Transport)?;
        let status = response.status();
        trace!("Response status {status} for '{what}'");
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status.to_string());
        Err(Error::new(
            classify(status, conflict),
            format!("Unable to {what}: {message}"),
        ))
    }
}

/// Maps a non-success status to an `ErrorType`.
fn classify(status: StatusCode, conflict: ErrorType) -> ErrorType {
    match status.as_u16() {
        400 | 422 => ErrorType::Validation,
        409 => conflict,
        _ => ErrorType::Transport,
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .with_context(|| format!("Unable to read the backend's response to {what}"))
        .pub_result(ErrorType::Transport)
}

fn csv_part(file: &UploadFile) -> Result<Part> {
    Part::bytes(file.contents().to_vec())
        .file_name(file.file_name().to_string())
        .mime_str(CSV_MIME)
        .context("Unable to build the upload")
        .pub_result(ErrorType::Validation)
}

#[async_trait::async_trait]
impl Gateway for HttpGateway {
    async fn create_session(&mut self, username: &str) -> Result<SessionId> {
        let what = "create a session";
        let url = self.endpoint(CREATE_SESSION)?;
        debug!("POST {}", url.path());
        let request = self.http.post(url).json(&UsernameRequest { username });
        let response = self.send(request, what, ErrorType::DuplicateUsername).await?;
        let created: CreateSessionResponse = decode(response, what).await?;
        Ok(created.session_id)
    }

    async fn username_exists(&mut self, username: &str) -> Result<bool> {
        let what = "check the username";
        let response = self
            .post_json(CHECK_USERNAME, &UsernameRequest { username }, what)
            .await?;
        let checked: CheckUsernameResponse = decode(response, what).await?;
        Ok(checked.exists)
    }

    async fn upload_statement(
        &mut self,
        session_id: &SessionId,
        source: &StatementSource,
        enable_ai: bool,
    ) -> Result<()> {
        match source {
            StatementSource::File(file) => {
                let url = self.endpoint(UPLOAD)?;
                debug!("POST {} ({:?})", url.path(), file);
                let form = Form::new()
                    .part("file", csv_part(file)?)
                    .text("enableAI", enable_ai.to_string())
                    .text("sessionId", session_id.to_string());
                self.send(
                    self.http.post(url).multipart(form),
                    "upload the statement",
                    ErrorType::Transport,
                )
                .await?;
            }
            StatementSource::Sample => {
                let body = EnableAiRequest {
                    session_id,
                    enable_ai,
                };
                self.post_json(SAMPLE_DATA, &body, "load the sample statement")
                    .await?;
            }
        }
        Ok(())
    }

    async fn upload_tag_mapping(
        &mut self,
        session_id: &SessionId,
        source: &TagMappingSource,
    ) -> Result<()> {
        match source {
            TagMappingSource::File(file) => {
                let url = self.endpoint(UPLOAD_TAGS)?;
                debug!("POST {} ({:?})", url.path(), file);
                let form = Form::new()
                    .part("pdtFile", csv_part(file)?)
                    .text("sessionId", session_id.to_string());
                self.send(
                    self.http.post(url).multipart(form),
                    "upload the tag mapping",
                    ErrorType::Transport,
                )
                .await?;
            }
            TagMappingSource::Sample => {
                self.post_json(
                    SAMPLE_TAGS,
                    &SessionRequest { session_id },
                    "load the sample tag mapping",
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn set_enable_ai(&mut self, session_id: &SessionId, enabled: bool) -> Result<()> {
        let body = EnableAiRequest {
            session_id,
            enable_ai: enabled,
        };
        self.post_json(SET_AI, &body, "update the AI setting")
            .await?;
        Ok(())
    }

    async fn trigger_processing(&mut self, session_id: &SessionId) -> Result<ProcessingStatus> {
        let what = "process the uploaded data";
        let response = self
            .post_json(POPULATE, &SessionRequest { session_id }, what)
            .await?;
        let processing: ProcessingResponse = decode(response, what).await?;
        Ok(processing.status)
    }

    async fn list_transactions(&mut self, session_id: &SessionId) -> Result<Vec<Transaction>> {
        let what = "load the transactions";
        let url = self.endpoint(EDIT)?;
        debug!("GET {}", url.path());
        let request = self
            .http
            .get(url)
            .query(&[("sessionId", session_id.as_str())]);
        let response = self.send(request, what, ErrorType::Transport).await?;
        decode(response, what).await
    }

    async fn update_tag(&mut self, session_id: &SessionId, update: &TagUpdate) -> Result<()> {
        self.post_json(
            UPDATE_TAG,
            &UpdateTagRequest::new(session_id, update),
            "update the tag",
        )
        .await?;
        Ok(())
    }

    async fn update_product(
        &mut self,
        session_id: &SessionId,
        update: &ProductUpdate,
    ) -> Result<()> {
        self.post_json(
            UPDATE_PRODUCT,
            &UpdateProductRequest::new(session_id, update),
            "update the product",
        )
        .await?;
        Ok(())
    }
}
