mod content;
mod writer;

pub use content::{build_content, ContentBuilder, QrMode, DEFAULT_HOSTED_PLAYER_URL, DEFAULT_LOCAL_PLAYER_PAGE};
pub use writer::{parse_ec_level, ArtifactWriter, QrWriter, DEFAULT_BORDER, DEFAULT_BOX_SIZE};
