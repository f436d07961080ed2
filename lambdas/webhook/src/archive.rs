use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use domain::{
    ports::{Media, MediaArchive},
    ExtractionFailure, ExtractionStage,
};
use ulid::Ulid;

/// Copies every received prescription file to S3.
pub struct S3MediaArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3MediaArchive {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// `prescriptions/{sender}/{ulid}.{ext}`, sender made path-safe.
pub fn object_key(sender_id: &str, media: &Media, id: Ulid) -> String {
    let sender: String = sender_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '+' { c } else { '_' })
        .collect();
    format!("prescriptions/{}/{}.{}", sender, id, media.kind.extension())
}

#[async_trait]
impl MediaArchive for S3MediaArchive {
    async fn store(&self, sender_id: &str, media: &Media) -> Result<String, ExtractionFailure> {
        let key = object_key(sender_id, media, Ulid::new());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&media.content_type)
            .body(ByteStream::from(media.bytes.clone()))
            .send()
            .await
            .map_err(|e| {
                ExtractionFailure::new(ExtractionStage::Archive, e.into_service_error())
            })?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}
