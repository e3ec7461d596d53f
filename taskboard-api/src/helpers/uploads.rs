use shared_types::NewAttachment;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Local directory holding uploaded task files
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_path: String,
    max_file_size: usize,
}

/// Where an upload will be written and how it will be linked to a task
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpload {
    pub path: PathBuf,
    pub attachment: NewAttachment,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        sanitized
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_path: &str, max_file_size: usize) -> Self {
        Self {
            dir: dir.into(),
            public_path: public_path.trim_end_matches('/').to_string(),
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Pick stored names `<millis>-<sanitized name>` for a batch of uploads.
    ///
    /// Names that repeat within the batch or already exist on disk get a
    /// counter after the timestamp.
    pub fn plan(&self, original_names: &[String]) -> Vec<PlannedUpload> {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut taken = HashSet::new();

        original_names
            .iter()
            .map(|original| {
                let sanitized = sanitize_file_name(original);
                let mut file_name = format!("{}-{}", millis, sanitized);
                let mut counter = 1;
                while taken.contains(&file_name) || self.dir.join(&file_name).exists() {
                    file_name = format!("{}-{}-{}", millis, counter, sanitized);
                    counter += 1;
                }
                taken.insert(file_name.clone());

                PlannedUpload {
                    path: self.dir.join(&file_name),
                    attachment: NewAttachment {
                        name: original.clone(),
                        url: format!("{}/{}", self.public_path, file_name),
                    },
                }
            })
            .collect()
    }

    pub async fn write(&self, upload: &PlannedUpload, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&upload.path, bytes).await?;
        tracing::debug!("Stored upload at {}", upload.path.display());
        Ok(())
    }
}
