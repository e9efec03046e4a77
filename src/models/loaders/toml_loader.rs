use crate::error::{AppError, AppResult, FileError};
use crate::models::problem::{Problem, ProblemCatalog};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载单个题目
pub async fn load_toml_to_problem(toml_file_path: &Path) -> AppResult<Problem> {
    let display = toml_file_path.display().to_string();

    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(&display, e))?;

    let problem: Problem =
        toml::from_str(&content).map_err(|e| AppError::file_parse_failed(&display, e))?;

    Ok(problem.with_file_path(display))
}

/// 从文件夹中加载所有 TOML 题目
///
/// 单个文件解析失败只记录警告，不影响其他文件
pub async fn load_problem_catalog(folder_path: &str) -> AppResult<ProblemCatalog> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::NotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut catalog = ProblemCatalog::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        tracing::debug!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_toml_to_problem(&path).await {
            Ok(problem) => {
                tracing::info!(
                    "✓ 加载题目 {} ({} 个标准步骤)",
                    problem.id,
                    problem.expected_steps.len()
                );
                catalog.insert(problem);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(catalog)
}
