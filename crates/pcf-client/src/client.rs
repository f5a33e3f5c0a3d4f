//! Webhook server HTTP client.

use async_trait::async_trait;
use pcf_core::wire::{
    AssortmentResponse, DeleteImagesRequest, DeleteImagesResponse, LoadSample,
    ModificationsUpdate,
};
use pcf_core::{UploadedImage, UserModifications};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{AssortmentSource, ImageMutations, PendingUpload, ResourceKind};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Success envelope of the JSON endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the packing-instruction webhook server.
#[derive(Clone)]
pub struct AssortmentClient {
    http: Client,
    config: ClientConfig,
}

impl AssortmentClient {
    /// Create a client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { http, config })
    }

    /// Perform a health check against the server.
    pub async fn health_check(&self) -> Result<bool> {
        let url = self.config.health_url();
        debug!(url = %url, "Health check");
        let response = self.http.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    /// Get an assortment, retrying transient failures.
    ///
    /// Returns `None` on 404 without retrying.
    pub async fn get_assortment(&self, assortment_id: &str) -> Result<Option<AssortmentResponse>> {
        let url = self.config.assortment_url(assortment_id);
        self.get_with_retry(&url).await
    }

    /// Merge labels, custom fields and form data into the user modifications.
    pub async fn update_modifications(
        &self,
        assortment_id: &str,
        update: &ModificationsUpdate,
    ) -> Result<UserModifications> {
        let response = self
            .http
            .put(self.config.modifications_url(assortment_id))
            .json(update)
            .send()
            .await?;
        read_data(response).await
    }

    /// Report one load measurement.
    pub async fn record_load(&self, assortment_id: &str, sample: LoadSample) -> Result<()> {
        let response = self
            .http
            .post(self.config.load_url(assortment_id))
            .json(&sample)
            .send()
            .await?;
        let _: LoadSample = read_data(response).await?;
        Ok(())
    }

    /// Replace one uploaded image in a single server call.
    pub async fn replace_image(
        &self,
        assortment_id: &str,
        old_filename: &str,
        upload: &PendingUpload,
    ) -> Result<UploadedImage> {
        let form = upload_form(upload)?.text("oldFilename", old_filename.to_string());
        let response = self
            .http
            .post(self.config.replace_image_url(assortment_id))
            .multipart(form)
            .send()
            .await?;
        read_data(response).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let retry = &self.config.retry;
        let mut attempts = 0u32;

        loop {
            match self.try_get(url).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempts += 1;
                    if !err.is_retryable() || !retry.should_retry(attempts) {
                        return Err(err);
                    }
                    let delay = retry.delay_for_attempt(attempts - 1);
                    warn!(
                        url = %url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "GET failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "Not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(Some(response.json().await?))
    }
}

impl std::fmt::Debug for AssortmentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssortmentClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl AssortmentSource for AssortmentClient {
    async fn fetch_assortment(
        &self,
        _kind: ResourceKind,
        assortment_id: &str,
    ) -> Result<Option<AssortmentResponse>> {
        self.get_assortment(assortment_id).await
    }
}

#[async_trait]
impl ImageMutations for AssortmentClient {
    async fn delete_images(
        &self,
        assortment_id: &str,
        filenames: &[String],
    ) -> Result<DeleteImagesResponse> {
        let request = DeleteImagesRequest {
            filenames: filenames.to_vec(),
        };
        let response = self
            .http
            .post(self.config.delete_images_url(assortment_id))
            .json(&request)
            .send()
            .await?;
        read_data(response).await
    }

    async fn upload_image(
        &self,
        assortment_id: &str,
        upload: &PendingUpload,
    ) -> Result<UploadedImage> {
        let response = self
            .http
            .post(self.config.images_url(assortment_id))
            .multipart(upload_form(upload)?)
            .send()
            .await?;
        read_data(response).await
    }
}

fn upload_form(upload: &PendingUpload) -> Result<Form> {
    let part = Part::bytes(upload.bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)?;

    let mut form = Form::new()
        .text("bucket", upload.bucket.key())
        .part("file", part);
    if let Some(pack_index) = upload.pack_index {
        form = form.text("packIndex", pack_index.to_string());
    }
    Ok(form)
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let envelope: Envelope<T> = response.json().await?;
    Ok(envelope.data)
}

async fn status_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| json.get("message")?.as_str().map(str::to_string))
        .unwrap_or(body);

    ClientError::Status { status, message }
}
