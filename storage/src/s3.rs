use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Config as S3Config, Credentials as S3Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::DateTimeFormat;
use aws_sdk_s3::Client;
use tokio::runtime::{Handle, Runtime};
use utils::error::{Error, Result};

use crate::common::{BucketTarget, Credentials};
use crate::listing::{list_audio_files_with_report, ListObjects, ListPage, ListRequest, ListingReport, RawObject};

/// 基于 S3 协议的 COS 存储桶访问。
///
/// 对外提供阻塞接口。在异步上下文中需要放到 `spawn_blocking` 线程里调用，
/// 否则 `block_on` 会 panic。
pub struct S3Storage {
    client: Client,
    target: BucketTarget,
    handle: Handle,
    // 在运行时之外创建时持有自己的运行时
    _runtime: Option<Runtime>,
}

impl S3Storage {
    pub fn new(credentials: &Credentials, target: BucketTarget) -> Result<Self> {
        credentials.validate()?;

        let config = Self::client_config(credentials, &target).build();

        log::info!(
            "Created COS client: bucket={}, region={}, secret_id={}",
            target.bucket,
            target.region,
            credentials.masked_id()
        );

        Self::with_config(config, target)
    }

    /// 使用已构建好的客户端配置
    pub fn with_config(config: S3Config, target: BucketTarget) -> Result<Self> {
        let (handle, runtime) = match Handle::try_current() {
            Ok(handle) => (handle, None),
            Err(_) => {
                // Handle::block_on 需要工作线程驱动 IO
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .enable_all()
                    .build()?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        Ok(Self {
            client: Client::from_conf(config),
            target,
            handle,
            _runtime: runtime,
        })
    }

    /// 静态凭证，地域 COS 端点
    pub fn client_config(credentials: &Credentials, target: &BucketTarget) -> S3ConfigBuilder {
        let s3_credentials = S3Credentials::new(
            &credentials.secret_id,
            &credentials.secret_key,
            None,
            None,
            "audio-qr",
        );

        S3ConfigBuilder::new()
            .credentials_provider(s3_credentials)
            .region(Region::new(target.region.clone()))
            .endpoint_url(target.endpoint())
    }

    pub fn bucket(&self) -> &str {
        &self.target.bucket
    }

    pub fn region(&self) -> &str {
        &self.target.region
    }

    pub fn target(&self) -> &BucketTarget {
        &self.target
    }

    /// 用一次 1 个 key 的列举请求确认凭证和桶可用
    pub fn check_connection(&self) -> Result<()> {
        let request = ListRequest {
            bucket: self.target.bucket.clone(),
            marker: String::new(),
            max_keys: 1,
        };
        let page = self.list_page(&request)?;
        log::info!(
            "Connection check succeeded, first page has {} object(s)",
            page.contents.len()
        );
        Ok(())
    }

    pub fn list_audio_files_with_report(&self, page_size: i32) -> Result<ListingReport> {
        list_audio_files_with_report(self, &self.target, page_size)
    }

    async fn fetch_page(&self, request: &ListRequest) -> Result<ListPage> {
        let mut call = self
            .client
            .list_objects()
            .bucket(&request.bucket)
            .max_keys(request.max_keys);

        if !request.marker.is_empty() {
            call = call.marker(&request.marker);
        }

        let response = call.send().await.map_err(|e| {
            Error::connection(format!(
                "list_objects on {} failed: {}",
                request.bucket,
                DisplayErrorContext(&e)
            ))
        })?;

        let contents = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(RawObject {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|dt| dt.fmt(DateTimeFormat::DateTime).ok())
                        .unwrap_or_default(),
                })
            })
            .collect();

        Ok(ListPage {
            contents,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_marker: response.next_marker().map(|s| s.to_string()),
        })
    }
}

impl ListObjects for S3Storage {
    fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        self.handle.block_on(self.fetch_page(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_runtime_api::http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use aws_smithy_types::body::SdkBody;

    #[test]
    fn test_new_rejects_missing_credentials() {
        let creds = Credentials::new("", "", "bucket", "ap-chengdu");
        let target = BucketTarget::from_credentials(&creds);
        let err = S3Storage::new(&creds, target).err().unwrap();
        assert_eq!(err.kind(), utils::ErrorKind::Validation);
    }

    #[test]
    fn test_new_outside_runtime() {
        let creds = Credentials::new("AKIDexample", "secret", "audio-qr-1361719303", "ap-chengdu");
        let storage = S3Storage::new(&creds, BucketTarget::from_credentials(&creds)).unwrap();
        assert_eq!(storage.bucket(), "audio-qr-1361719303");
        assert_eq!(storage.region(), "ap-chengdu");
        assert_eq!(storage.target().endpoint(), "https://cos.ap-chengdu.myqcloud.com");
    }

    const BUCKET: &str = "audio-qr-1361719303";

    fn xml_response(status: u16, body: &str) -> HttpResponse<SdkBody> {
        HttpResponse::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from(body.to_string()),
        )
    }

    fn replay_storage(events: Vec<ReplayEvent>) -> (S3Storage, StaticReplayClient) {
        let replay = StaticReplayClient::new(events);
        let creds = Credentials::new("AKIDexample", "secret", BUCKET, "ap-chengdu");
        let target = BucketTarget::from_credentials(&creds);
        let config = S3Storage::client_config(&creds, &target)
            .http_client(replay.clone())
            .build();
        (S3Storage::with_config(config, target).unwrap(), replay)
    }

    const FIRST_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>audio-qr-1361719303</Name>
  <Prefix></Prefix>
  <Marker></Marker>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextMarker>b.txt</NextMarker>
  <Contents>
    <Key>a.mp3</Key>
    <LastModified>2024-05-01T08:30:00.000Z</LastModified>
    <ETag>"aa"</ETag>
    <Size>2048</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>b.txt</Key>
    <LastModified>2024-05-01T08:31:00.000Z</LastModified>
    <ETag>"bb"</ETag>
    <Size>10</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#;

    // 最后一页不带 IsTruncated
    const LAST_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>audio-qr-1361719303</Name>
  <Prefix></Prefix>
  <Marker>b.txt</Marker>
  <MaxKeys>2</MaxKeys>
  <Contents>
    <Key>album/c.WAV</Key>
    <LastModified>2024-06-02T10:00:00.000Z</LastModified>
    <ETag>"cc"</ETag>
    <Size>-5</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>notes.md</Key>
    <LastModified>2024-06-02T10:01:00.000Z</LastModified>
    <ETag>"dd"</ETag>
    <Size>3</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn test_listing_follows_next_marker() {
        let (storage, replay) = replay_storage(vec![
            ReplayEvent::new(HttpRequest::empty(), xml_response(200, FIRST_PAGE)),
            ReplayEvent::new(HttpRequest::empty(), xml_response(200, LAST_PAGE)),
        ]);

        let report = storage.list_audio_files_with_report(2).unwrap();

        let uris: Vec<String> = replay.actual_requests().map(|r| r.uri().to_string()).collect();
        assert_eq!(uris.len(), 2);
        assert!(!uris[0].contains("marker="));
        assert!(uris[1].contains("marker=b.txt"));
        assert!(uris[1].contains("max-keys=2"));

        assert_eq!(report.pages, 2);
        assert_eq!(report.scanned, 4);
        assert_eq!(report.descriptors.len(), 2);

        let first = &report.descriptors[0];
        assert_eq!(first.key, "a.mp3");
        assert_eq!(first.size, 2048);
        assert_eq!(first.modified_short(), "2024-05-01T08:30:00");
        assert_eq!(
            first.url,
            "https://audio-qr-1361719303.cos.ap-chengdu.myqcloud.com/a.mp3"
        );

        let second = &report.descriptors[1];
        assert_eq!(second.key, "album/c.WAV");
        assert_eq!(second.name, "c.WAV");
        assert_eq!(second.size, 0);
        assert_eq!(second.modified_short(), "2024-06-02T10:00:00");
    }

    #[test]
    fn test_access_denied_is_connection_error() {
        let denied = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied.</Message>
  <RequestId>NjU2ZjYxMzBfMTI=</RequestId>
</Error>"#;
        let (storage, replay) =
            replay_storage(vec![ReplayEvent::new(HttpRequest::empty(), xml_response(403, denied))]);

        let err = storage.list_audio_files_with_report(1000).unwrap_err();
        assert_eq!(err.kind(), utils::ErrorKind::Connection);
        assert_eq!(replay.actual_requests().count(), 1);

        let (storage, _) =
            replay_storage(vec![ReplayEvent::new(HttpRequest::empty(), xml_response(403, denied))]);
        assert_eq!(
            storage.check_connection().unwrap_err().kind(),
            utils::ErrorKind::Connection
        );
    }
}
