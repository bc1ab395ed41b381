//! Source materializer

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::JudgeError;
use crate::core::languages::LanguageConfig;
use crate::engine::workspace::Workspace;

/// Write submitted source text into the workspace, byte for byte
pub async fn write_source(
    workspace: &Workspace,
    source_text: &str,
    lang_config: &LanguageConfig,
) -> Result<PathBuf, JudgeError> {
    let source_path = workspace.file_path(&lang_config.source_file);

    let mut file = File::create(&source_path).await.map_err(JudgeError::Source)?;
    file.write_all(source_text.as_bytes())
        .await
        .map_err(JudgeError::Source)?;
    // tokio buffers writes in the background; the compiler must see every byte
    file.flush().await.map_err(JudgeError::Source)?;

    debug!(
        "Wrote {} bytes of {} source to workspace {}",
        source_text.len(),
        lang_config.name,
        workspace.id()
    );

    Ok(source_path)
}
