pub mod batch;
pub mod qr;
pub mod settings;

/// 公共API的prelude模块
/// 用户可以通过 `use app::prelude::*` 来导入最常用的类型
pub mod prelude {
    pub use crate::batch::{BatchGenerator, BatchResult, CancelFlag, Progress};
    pub use crate::qr::{build_content, ContentBuilder, QrMode, QrWriter};
    pub use crate::settings::Settings;
    pub use storage::{Credentials, FileDescriptor};
}
