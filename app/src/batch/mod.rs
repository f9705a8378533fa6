use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storage::FileDescriptor;
use utils::error::{Error, Result};

use crate::qr::{ArtifactWriter, ContentBuilder, QrMode};

mod task;

pub use task::{join_task, spawn_generate, spawn_listing, ListingJob};

/// 批处理之间共享的取消标志，在两个条目之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 单个条目完成后的进度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 从 1 开始
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub succeeded: bool,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.index as f64 / self.total as f64
        }
    }
}

#[derive(Debug)]
pub struct BatchFailure {
    pub descriptor: FileDescriptor,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
    /// 输出路径与本批次中更早的条目重名，文件已被覆盖
    pub overwritten: Vec<FileDescriptor>,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.succeeded == self.total
    }
}

/// 输出文件路径：`<output_dir>/<去扩展名的文件名>.png`
pub fn output_path(output_dir: &Path, descriptor: &FileDescriptor) -> PathBuf {
    output_dir.join(descriptor.png_name())
}

/// 按显示名称挑选条目，返回选中项和未找到的名称
pub fn select_by_names(
    descriptors: &[FileDescriptor], names: &[String],
) -> (Vec<FileDescriptor>, Vec<String>) {
    let mut selected = Vec::new();
    let mut missing = Vec::new();

    for name in names {
        match descriptors.iter().find(|d| &d.name == name || &d.key == name) {
            Some(d) => selected.push(d.clone()),
            None => missing.push(name.clone()),
        }
    }

    (selected, missing)
}

/// 批量生成二维码，顺序处理，单个失败不影响后续条目
pub struct BatchGenerator<W> {
    builder: ContentBuilder,
    writer: W,
    cancel: CancelFlag,
}

impl<W: ArtifactWriter> BatchGenerator<W> {
    pub fn new(builder: ContentBuilder, writer: W) -> Self {
        Self {
            builder,
            writer,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 只有输出目录无法创建时返回错误，条目失败记录在结果中
    pub fn generate<F>(
        &self, descriptors: &[FileDescriptor], mode: QrMode, output_dir: &Path, mut on_progress: F,
    ) -> Result<BatchResult>
    where
        F: FnMut(&Progress),
    {
        std::fs::create_dir_all(output_dir)?;

        let total = descriptors.len();
        let mut result = BatchResult {
            total,
            ..Default::default()
        };

        log::info!(
            "Generating {} QR code(s) in {} mode into {}",
            total,
            mode,
            output_dir.display()
        );

        let mut written = HashSet::new();

        for (i, descriptor) in descriptors.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Batch cancelled after {} of {} item(s)", i, total);
                result.cancelled = true;
                break;
            }

            let content = self.builder.build(descriptor, mode);
            let destination = output_path(output_dir, descriptor);

            let succeeded = match self.writer.write_qr(&content, &destination) {
                Ok(()) => {
                    result.succeeded += 1;
                    if !written.insert(destination.clone()) {
                        log::warn!(
                            "{} overwrote {} written earlier in this batch",
                            descriptor.key,
                            destination.display()
                        );
                        result.overwritten.push(descriptor.clone());
                    }
                    true
                }
                Err(error) => {
                    log::error!("Failed to generate QR for {}: {}", descriptor.key, error);
                    result.failed.push(BatchFailure {
                        descriptor: descriptor.clone(),
                        error,
                    });
                    false
                }
            };

            on_progress(&Progress {
                index: i + 1,
                total,
                name: descriptor.name.clone(),
                succeeded,
            });
        }

        log::info!(
            "Batch finished: {} succeeded, {} failed",
            result.succeeded,
            result.failed.len()
        );

        Ok(result)
    }
}
