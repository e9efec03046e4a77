use crate::error::{AppError, AppResult, FileError};
use crate::models::attempt::AttemptScript;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 文件里可以是单个作答，也可以是作答列表
#[derive(Deserialize)]
#[serde(untagged)]
enum AttemptFile {
    Many(Vec<AttemptScript>),
    One(AttemptScript),
}

/// 从 JSON 文件加载作答回放
pub async fn load_attempt_file(path: &Path) -> AppResult<Vec<AttemptScript>> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(FileError::NotFound { path: display }.into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&display, e))?;

    let parsed: AttemptFile =
        serde_json::from_str(&content).map_err(|e| AppError::file_parse_failed(&display, e))?;

    Ok(match parsed {
        AttemptFile::Many(attempts) => attempts,
        AttemptFile::One(attempt) => vec![attempt],
    })
}
