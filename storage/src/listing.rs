use serde::{Deserialize, Serialize};
use utils::error::{Error, Result};

use crate::common::{is_audio_key, BucketTarget, FileDescriptor};

pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// 单页列举请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub marker: String,
    pub max_keys: i32,
}

/// 列举结果中的一个对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObject {
    pub key: String,
    pub size: u64,
    pub last_modified: String,
}

/// 单页列举响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    pub contents: Vec<RawObject>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

/// 分页列举接口，实现方负责鉴权与网络访问
pub trait ListObjects {
    fn list_page(&self, request: &ListRequest) -> Result<ListPage>;
}

impl<T: ListObjects + ?Sized> ListObjects for &T {
    fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        (**self).list_page(request)
    }
}

/// 一次完整列举的结果与统计
#[derive(Debug, Clone, Default)]
pub struct ListingReport {
    pub descriptors: Vec<FileDescriptor>,
    /// 扫描过的对象总数（含非音频）
    pub scanned: usize,
    /// 发出的请求数
    pub pages: usize,
}

pub fn list_audio_files<L: ListObjects + ?Sized>(
    api: &L, target: &BucketTarget, page_size: i32,
) -> Result<Vec<FileDescriptor>> {
    Ok(list_audio_files_with_report(api, target, page_size)?.descriptors)
}

/// 从空 marker 开始逐页列举，直到不再截断或缺少 NextMarker。
///
/// 任一页失败都会丢弃已取得的结果并返回 `Connection` 错误。
pub fn list_audio_files_with_report<L: ListObjects + ?Sized>(
    api: &L, target: &BucketTarget, page_size: i32,
) -> Result<ListingReport> {
    let mut report = ListingReport::default();
    let mut marker = String::new();
    let max_keys = if page_size > 0 { page_size } else { DEFAULT_PAGE_SIZE };

    log::info!("Listing bucket {} in {}", target.bucket, target.region);

    loop {
        let request = ListRequest {
            bucket: target.bucket.clone(),
            marker: marker.clone(),
            max_keys,
        };
        log::debug!("Requesting page {} with marker {:?}", report.pages + 1, marker);

        let page = api
            .list_page(&request)
            .map_err(|e| into_connection_error(e, report.pages + 1))?;
        report.pages += 1;

        for object in &page.contents {
            report.scanned += 1;
            if is_audio_key(&object.key) {
                log::debug!("Found audio file: {}", object.key);
                report.descriptors.push(FileDescriptor::new(
                    target,
                    &object.key,
                    object.size,
                    &object.last_modified,
                ));
            }
        }

        if !page.is_truncated {
            break;
        }

        match page.next_marker {
            Some(next) if !next.is_empty() => marker = next,
            _ => {
                log::warn!("Listing truncated without NextMarker, stopping");
                break;
            }
        }
    }

    log::info!(
        "Listing finished: {} objects scanned, {} audio files, {} pages",
        report.scanned,
        report.descriptors.len(),
        report.pages
    );

    Ok(report)
}

fn into_connection_error(err: Error, page: usize) -> Error {
    match err {
        Error::Connection { .. } => err,
        other => Error::connection_with_source(
            format!("failed to fetch listing page {}", page),
            Box::new(other),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// 按顺序返回预设页面并记录请求
    struct ScriptedApi {
        pages: Vec<Result<ListPage>>,
        requests: RefCell<Vec<ListRequest>>,
    }

    impl ScriptedApi {
        fn new(pages: Vec<Result<ListPage>>) -> Self {
            Self {
                pages,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ListObjects for ScriptedApi {
        fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
            let index = self.requests.borrow().len();
            self.requests.borrow_mut().push(request.clone());
            match self.pages.get(index) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(e)) => Err(Error::connection(e.to_string())),
                None => Err(Error::new("unexpected request")),
            }
        }
    }

    fn object(key: &str) -> RawObject {
        RawObject {
            key: key.to_string(),
            size: 1024,
            last_modified: "2024-05-01T10:20:30.000Z".to_string(),
        }
    }

    fn page(keys: &[&str], truncated: bool, next: Option<&str>) -> Result<ListPage> {
        Ok(ListPage {
            contents: keys.iter().map(|k| object(k)).collect(),
            is_truncated: truncated,
            next_marker: next.map(str::to_string),
        })
    }

    fn target() -> BucketTarget {
        BucketTarget::new("audio-qr-1361719303", "ap-chengdu")
    }

    #[test]
    fn test_filters_non_audio_keys() {
        let api = ScriptedApi::new(vec![page(&["a.mp3", "b.txt", "C.WAV", "d.flac.bak"], false, None)]);
        let files = list_audio_files(&api, &target(), 1000).unwrap();
        let keys: Vec<&str> = files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["a.mp3", "C.WAV"]);
        assert_eq!(
            files[0].url,
            "https://audio-qr-1361719303.cos.ap-chengdu.myqcloud.com/a.mp3"
        );
    }

    #[test]
    fn test_three_pages_are_merged() {
        let api = ScriptedApi::new(vec![
            page(&["p1/a.mp3", "p1/x.jpg"], true, Some("p1/x.jpg")),
            page(&["p2/b.ogg"], true, Some("p2/b.ogg")),
            page(&["p3/c.m4a", "p3/readme.md"], false, None),
        ]);

        let report = list_audio_files_with_report(&api, &target(), 2).unwrap();
        let keys: Vec<&str> = report.descriptors.iter().map(|f| f.key.as_str()).collect();

        assert_eq!(keys, vec!["p1/a.mp3", "p2/b.ogg", "p3/c.m4a"]);
        assert_eq!(report.pages, 3);
        assert_eq!(report.scanned, 5);

        let requests = api.requests.borrow();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].marker, "");
        assert_eq!(requests[1].marker, "p1/x.jpg");
        assert_eq!(requests[2].marker, "p2/b.ogg");
        assert!(requests.iter().all(|r| r.max_keys == 2 && r.bucket == "audio-qr-1361719303"));
    }

    #[test]
    fn test_second_page_failure_discards_results() {
        let api = ScriptedApi::new(vec![
            page(&["a.mp3"], true, Some("a.mp3")),
            Err(Error::new("network reset")),
        ]);

        let err = list_audio_files(&api, &target(), 1000).unwrap_err();
        assert_eq!(err.kind(), utils::ErrorKind::Connection);
        assert_eq!(api.requests.borrow().len(), 2);
    }

    #[test]
    fn test_non_connection_error_is_wrapped() {
        struct Failing;
        impl ListObjects for Failing {
            fn list_page(&self, _request: &ListRequest) -> Result<ListPage> {
                Err(Error::new("malformed response"))
            }
        }

        let err = list_audio_files(&Failing, &target(), 1000).unwrap_err();
        assert_eq!(err.kind(), utils::ErrorKind::Connection);
        assert!(err.to_string().contains("page 1"));
    }

    #[test]
    fn test_truncated_without_marker_ends_listing() {
        let api = ScriptedApi::new(vec![page(&["a.wma"], true, None)]);
        let files = list_audio_files(&api, &target(), 1000).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(api.requests.borrow().len(), 1);
    }

    #[test]
    fn test_empty_bucket() {
        let api = ScriptedApi::new(vec![page(&[], false, None)]);
        let report = list_audio_files_with_report(&api, &target(), 0).unwrap();
        assert!(report.descriptors.is_empty());
        assert_eq!(report.pages, 1);
        assert_eq!(api.requests.borrow()[0].max_keys, DEFAULT_PAGE_SIZE);
    }
}
