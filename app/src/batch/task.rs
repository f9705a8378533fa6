use std::path::PathBuf;
use storage::{BucketTarget, Credentials, FileDescriptor, ListingReport, S3Storage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utils::error::{Error, Result};

use super::{BatchGenerator, BatchResult, Progress};
use crate::qr::{ArtifactWriter, QrMode};

/// 后台列举任务的参数
#[derive(Debug, Clone)]
pub struct ListingJob {
    pub credentials: Credentials,
    pub target: BucketTarget,
    pub page_size: i32,
    /// 列举前先做一次连接测试
    pub check_connection: bool,
}

/// 在阻塞线程池中执行列举，避免阻塞调用方的事件循环
pub fn spawn_listing(job: ListingJob) -> JoinHandle<Result<ListingReport>> {
    tokio::task::spawn_blocking(move || {
        job.credentials.validate()?;
        let storage = S3Storage::new(&job.credentials, job.target)?;
        if job.check_connection {
            storage.check_connection()?;
        }
        storage.list_audio_files_with_report(job.page_size)
    })
}

/// 在阻塞线程池中执行批量生成，进度通过通道发送。
///
/// 调用方持有描述符快照，任务运行期间不受后续刷新影响。
pub fn spawn_generate<W>(
    generator: BatchGenerator<W>, descriptors: Vec<FileDescriptor>, mode: QrMode,
    output_dir: PathBuf,
) -> (JoinHandle<Result<BatchResult>>, mpsc::UnboundedReceiver<Progress>)
where
    W: ArtifactWriter + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::task::spawn_blocking(move || {
        generator.generate(&descriptors, mode, &output_dir, |progress| {
            // 接收端已关闭时忽略
            let _ = tx.send(progress.clone());
        })
    });

    (handle, rx)
}

/// 等待后台任务结束并展开结果
pub async fn join_task<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    handle
        .await
        .map_err(|e| Error::Task(format!("background task failed: {}", e)))?
}
