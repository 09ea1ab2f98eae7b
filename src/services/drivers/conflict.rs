use serde::{Deserialize, Serialize};
use std::future::Future;

use super::{BackendError, BackendResult};

/// Attempts before giving up on finding a free name under `Rename`.
pub const MAX_RENAME_ATTEMPTS: usize = 100;

/// What a provider does when the uploaded name already exists. Set per
/// backend in configuration, never taken from the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Rename,
    Replace,
    Fail,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Rename => "rename",
            ConflictPolicy::Replace => "replace",
            ConflictPolicy::Fail => "fail",
        }
    }
}

/// `report.pdf`, `report (1).pdf`, `report (2).pdf`, ...
pub fn candidate_names(file_name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    };
    std::iter::once(file_name.to_string()).chain(
        (1..MAX_RENAME_ATTEMPTS).map(move |n| format!("{} ({}){}", stem, n, ext)),
    )
}

/// First candidate name for which `exists` reports false.
pub async fn first_free_name<F, Fut>(file_name: &str, mut exists: F) -> BackendResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = BackendResult<bool>>,
{
    for candidate in candidate_names(file_name) {
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(BackendError::Conflict(format!(
        "No free name for {} after {} attempts",
        file_name, MAX_RENAME_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_names() {
        let names: Vec<String> = candidate_names("report.pdf").take(3).collect();
        assert_eq!(names, vec!["report.pdf", "report (1).pdf", "report (2).pdf"]);

        let names: Vec<String> = candidate_names("README").take(2).collect();
        assert_eq!(names, vec!["README", "README (1)"]);

        let names: Vec<String> = candidate_names(".env").take(2).collect();
        assert_eq!(names, vec![".env", ".env (1)"]);

        let names: Vec<String> = candidate_names("archive.tar.gz").take(2).collect();
        assert_eq!(names, vec!["archive.tar.gz", "archive.tar (1).gz"]);

        assert_eq!(candidate_names("a.txt").count(), MAX_RENAME_ATTEMPTS);
    }

    #[test]
    fn test_policy_serde() {
        let p: ConflictPolicy = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(p, ConflictPolicy::Replace);
        assert_eq!(ConflictPolicy::default().as_str(), "rename");
    }

    #[tokio::test]
    async fn test_first_free_name() {
        let taken = ["report.pdf", "report (1).pdf"];
        let name = first_free_name("report.pdf", |c| async move { Ok(taken.contains(&c.as_str())) })
            .await
            .unwrap();
        assert_eq!(name, "report (2).pdf");

        let err = first_free_name("x", |_| async { Ok(true) }).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
    }
}
