use crate::config::ClientConfig;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Builds the S3 object store from the ambient AWS credential chain.
///
/// A custom endpoint switches to path-style addressing for MinIO and friends.
pub async fn setup_storage(config: &ClientConfig) -> Arc<S3ObjectStore> {
    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    match &config.s3_endpoint {
        Some(endpoint) => info!("☁️  S3 Storage: {} (Bucket: {})", endpoint, config.bucket),
        None => info!("☁️  S3 Storage: {} (Bucket: {})", config.region, config.bucket),
    }

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3ObjectStore::new(
        s3_client,
        config.bucket.clone(),
        config.multipart_chunk_size,
    ))
}
