//! Integration tests for pcf-client.
//!
//! Most tests run against in-process mocks. Tests marked `#[ignore]` need a
//! webhook server; point `PCF_SERVER_URL` at one (default
//! `http://localhost:8790`) and run:
//!   cargo test --test integration_tests -- --ignored

use async_trait::async_trait;
use pcf_client::{
    AssortmentCache, AssortmentClient, AssortmentSource, CacheOrigin, ClientConfig, ClientError,
    FileStore, ImageMutations, ImageStaging, MemoryStore, PendingUpload, ResourceKind,
    RetryConfig,
};
use pcf_core::transform::AssortmentRecord;
use pcf_core::wire::{AssortmentResponse, DeleteImagesResponse};
use pcf_core::{
    Assortment, DataSource, ImageBucket, UploadedImage, UploadedImages, UserModifications,
};
use std::env;
use std::sync::Mutex;
use std::time::Duration;

fn server_url() -> String {
    env::var("PCF_SERVER_URL").unwrap_or_else(|_| "http://localhost:8790".to_string())
}

// ============================================================================
// Unit tests (no server required)
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8790");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_config_trims_slash() {
        let config = ClientConfig::new("http://127.0.0.1:9000/");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_client_config_urls() {
        let config = ClientConfig::new("http://localhost:8790");
        assert_eq!(
            config.assortment_url("A01"),
            "http://localhost:8790/webhook/assortment/A01"
        );
        assert_eq!(
            config.images_url("A01"),
            "http://localhost:8790/webhook/assortment/A01/images"
        );
        assert_eq!(
            config.delete_images_url("A01"),
            "http://localhost:8790/webhook/assortment/A01/images/delete"
        );
        assert_eq!(
            config.replace_image_url("A01"),
            "http://localhost:8790/webhook/assortment/A01/images/replace"
        );
        assert_eq!(
            config.modifications_url("A01"),
            "http://localhost:8790/webhook/assortment/A01/modifications"
        );
        assert_eq!(
            config.load_url("A01"),
            "http://localhost:8790/webhook/assortment/A01/load"
        );
        assert_eq!(config.health_url(), "http://localhost:8790/health");
    }

    #[test]
    fn test_assortment_url_encodes_id() {
        let config = ClientConfig::default();
        assert_eq!(
            config.assortment_url("A 01/x"),
            "http://localhost:8790/webhook/assortment/A%2001%2Fx"
        );
    }
}

mod retry_config_tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_retry_delay_calculation() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_delay_max() {
        let config = RetryConfig::default();
        // After many attempts, should cap at max_delay
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_limited() {
        let config = RetryConfig::default();
        assert!(config.should_retry(1));
        assert!(config.should_retry(3));
        assert!(!config.should_retry(4));
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_status_retryable() {
        let server = ClientError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        let throttled = ClientError::Status {
            status: 429,
            message: "slow down".to_string(),
        };
        let missing = ClientError::Status {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!ClientError::Cache("x".to_string()).is_retryable());
    }
}

// ============================================================================
// Cache and staging flow against mocks
// ============================================================================

/// In-memory stand-in for the server: one individual assortment whose
/// uploaded images change with the mutations it receives.
struct FakeServer {
    uploads: Mutex<UploadedImages>,
    fetches: Mutex<u32>,
}

impl FakeServer {
    fn with_uploads(names: &[&str]) -> Self {
        let mut uploads = UploadedImages::default();
        for name in names {
            uploads.push(
                ImageBucket::Display,
                None,
                UploadedImage {
                    filename: name.to_string(),
                    ..UploadedImage::default()
                },
            );
        }
        Self {
            uploads: Mutex::new(uploads),
            fetches: Mutex::new(0),
        }
    }

    fn fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl AssortmentSource for FakeServer {
    async fn fetch_assortment(
        &self,
        _kind: ResourceKind,
        assortment_id: &str,
    ) -> pcf_client::Result<Option<AssortmentResponse>> {
        *self.fetches.lock().unwrap() += 1;
        let mut record = AssortmentRecord::from_assortment(Assortment {
            item_no: assortment_id.to_string(),
            ..Assortment::default()
        });
        record.user_modifications = Some(UserModifications {
            uploaded_images: self.uploads.lock().unwrap().clone(),
            ..UserModifications::default()
        });
        record.access_count = Some(1);
        Ok(Some(AssortmentResponse {
            success: true,
            source: DataSource::Individual,
            data: record,
        }))
    }
}

#[async_trait]
impl ImageMutations for FakeServer {
    async fn delete_images(
        &self,
        _assortment_id: &str,
        filenames: &[String],
    ) -> pcf_client::Result<DeleteImagesResponse> {
        let mut uploads = self.uploads.lock().unwrap();
        let before = uploads.image_count();
        uploads.retain(|image| !filenames.contains(&image.filename));
        let removed = before - uploads.image_count();
        Ok(DeleteImagesResponse {
            deleted: filenames[..removed].to_vec(),
            missing: filenames[removed..].to_vec(),
        })
    }

    async fn upload_image(
        &self,
        _assortment_id: &str,
        upload: &PendingUpload,
    ) -> pcf_client::Result<UploadedImage> {
        let image = UploadedImage {
            filename: format!("srv-{}", upload.file_name),
            original_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size: upload.bytes.len() as u64,
            ..UploadedImage::default()
        };
        self.uploads
            .lock()
            .unwrap()
            .push(upload.bucket, upload.pack_index, image.clone());
        Ok(image)
    }
}

fn filenames(loaded: &pcf_client::cache::Loaded) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(images) = loaded.data.uploaded_images() {
        images.for_each(|_, _, _, image| names.push(image.filename.clone()));
    }
    names
}

mod staging_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_invalidates_and_refetches() {
        let server = FakeServer::with_uploads(&["f1.png", "f2.png"]);
        let cache = AssortmentCache::open(MemoryStore::new()).await.unwrap();

        let first = cache
            .load(&server, ResourceKind::IndividualAssortment, "A01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.origin, CacheOrigin::Network);
        assert_eq!(filenames(&first), vec!["f1.png", "f2.png"]);

        let mut staging = ImageStaging::new("A01");
        staging.mark_for_deletion("f1.png");
        staging.stage_upload(PendingUpload::new(
            ImageBucket::Display,
            None,
            "new.png",
            "image/png",
            vec![0x89, 0x50],
        ));

        let report = staging.save(&server, &cache).await;
        assert!(report.all_succeeded());

        let reloaded = cache
            .load(&server, ResourceKind::IndividualAssortment, "A01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.origin, CacheOrigin::Network);
        assert_eq!(filenames(&reloaded), vec!["f2.png", "srv-new.png"]);
        assert_eq!(server.fetches(), 2);
    }

    #[tokio::test]
    async fn test_unmarked_deletion_keeps_cache() {
        let server = FakeServer::with_uploads(&["f1.png"]);
        let cache = AssortmentCache::open(MemoryStore::new()).await.unwrap();
        cache
            .load(&server, ResourceKind::IndividualAssortment, "A01")
            .await
            .unwrap();

        let mut staging = ImageStaging::new("A01");
        staging.mark_for_deletion("f1.png");
        staging.unmark_deletion("f1.png");
        let report = staging.save(&server, &cache).await;
        assert!(report.outcomes.is_empty());

        let loaded = cache
            .load(&server, ResourceKind::IndividualAssortment, "A01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.origin, CacheOrigin::Memory);
        assert_eq!(filenames(&loaded), vec!["f1.png"]);
    }

    #[tokio::test]
    async fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::with_uploads(&["f1.png"]);

        {
            let cache = AssortmentCache::open(FileStore::open(dir.path()).await.unwrap())
                .await
                .unwrap();
            cache
                .load(&server, ResourceKind::IndividualAssortment, "A01")
                .await
                .unwrap();
        }

        let cache = AssortmentCache::open(FileStore::open(dir.path()).await.unwrap())
            .await
            .unwrap();
        let loaded = cache
            .load(&server, ResourceKind::IndividualAssortment, "A01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.origin, CacheOrigin::Durable);
        assert_eq!(filenames(&loaded), vec!["f1.png"]);
        assert_eq!(server.fetches(), 1);
    }
}

// ============================================================================
// Server tests (require a running webhook server)
// ============================================================================

mod server_tests {
    use super::*;

    fn fast_retry(base_url: &str) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 1,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_multiplier: 1.0,
            },
            ..ClientConfig::new(base_url)
        }
    }

    /// Test connection failure to a port nothing listens on.
    #[tokio::test]
    async fn test_connect_failure() {
        let client = AssortmentClient::new(fast_retry("http://127.0.0.1:59999")).unwrap();
        let result = client.get_assortment("A01").await;
        match result {
            Err(ClientError::Http(_)) => {} // Expected
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore = "requires running webhook server"]
    async fn test_health_check() {
        let client = AssortmentClient::new(ClientConfig::new(server_url())).unwrap();
        assert!(client.health_check().await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires running webhook server"]
    async fn test_unknown_assortment_is_none() {
        let client = AssortmentClient::new(fast_retry(&server_url())).unwrap();
        let result = client
            .get_assortment("no-such-assortment-0000")
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
