//! Amazon S3 backend built on `aws-sdk-s3`
//!
//! One `PutObject` per upload and one `GetObject` per download. Checksums
//! are requested through the SDK's own knobs (`ChecksumAlgorithm` for
//! uploads, `ChecksumMode::Enabled` for downloads) rather than computed here.

use super::{DownloadRequest, SinkWriter, StorageBackend, UploadRequest, UploadSource};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ChecksumAlgorithm as SdkChecksumAlgorithm, ChecksumMode};
use benchrunner::{ChecksumAlgorithm, GIBIBYTE, TaskAction, WorkloadConfig};

/// Largest object a single PutObject request can carry
pub const MAX_SINGLE_PUT_SIZE: u64 = 5 * GIBIBYTE;

/// Settings for reaching the bucket
#[derive(Debug, Clone)]
pub struct S3BackendConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Throughput the host is expected to reach, in gigabits per second
    pub target_throughput_gbps: f64,
}

pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl S3Backend {
    /// Load credentials from the default provider chain and build a client
    pub async fn new(config: &S3BackendConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        tracing::info!(
            "S3 client for bucket {} in {} (target throughput {} Gb/s)",
            config.bucket,
            config.region,
            config.target_throughput_gbps
        );

        S3Backend {
            client: Client::from_conf(client_config(&sdk_config, config)),
            bucket: config.bucket.clone(),
        }
    }
}

/// S3 client settings for a benchmark run
///
/// The SDK's default checksum behavior is turned off so that checksums are
/// only computed or validated when a request asks for one.
fn client_config(sdk_config: &SdkConfig, config: &S3BackendConfig) -> aws_sdk_s3::Config {
    let mut s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(config.force_path_style)
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
    if let Some(endpoint_url) = &config.endpoint_url {
        s3_config = s3_config.endpoint_url(endpoint_url);
    }
    s3_config.build()
}

fn sdk_checksum_algorithm(algorithm: ChecksumAlgorithm) -> SdkChecksumAlgorithm {
    match algorithm {
        ChecksumAlgorithm::Crc32 => SdkChecksumAlgorithm::Crc32,
        ChecksumAlgorithm::Crc32c => SdkChecksumAlgorithm::Crc32C,
        ChecksumAlgorithm::Sha1 => SdkChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Sha256 => SdkChecksumAlgorithm::Sha256,
    }
}

/// Reason the single-request S3 backend can't run `workload`, if any
pub fn single_request_limit_reason(workload: &WorkloadConfig) -> Option<String> {
    workload
        .tasks()
        .iter()
        .find(|t| t.action == TaskAction::Upload && t.size > MAX_SINGLE_PUT_SIZE)
        .map(|t| {
            format!(
                "upload of {} bytes ({}) exceeds the single PutObject limit of {} bytes",
                t.size, t.key, MAX_SINGLE_PUT_SIZE
            )
        })
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "sdk-rust-client"
    }

    fn unsupported_reason(&self, workload: &WorkloadConfig) -> Option<String> {
        single_request_limit_reason(workload)
    }

    async fn upload(&self, request: UploadRequest) -> Result<()> {
        let body = match request.source {
            UploadSource::Memory(bytes) => ByteStream::from(bytes),
            UploadSource::File(path) => ByteStream::from_path(&path)
                .await
                .with_context(|| format!("failed opening file: {}", path.display()))?,
        };

        let content_length =
            i64::try_from(request.size).context("object size doesn't fit Content-Length")?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .content_length(content_length)
            .set_checksum_algorithm(request.checksum.map(sdk_checksum_algorithm))
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("PutObject failed: {}", DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn download(&self, request: DownloadRequest) -> Result<u64> {
        let checksum_mode = request.validate_checksum.then_some(ChecksumMode::Enabled);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .set_checksum_mode(checksum_mode)
            .send()
            .await
            .map_err(|e| anyhow!("GetObject failed: {}", DisplayErrorContext(e)))?;

        let mut writer = SinkWriter::open(&request.sink).await?;
        let mut body = output.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| anyhow!("failed reading GetObject body: {}", DisplayErrorContext(e)))?
        {
            writer.write(&chunk).await?;
        }
        writer.finish().await
    }
}
