use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::prompt::Prompt;

/// Where one generation's request/response artifacts went.
#[derive(Debug, Clone)]
pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: Option<PathBuf>,
    pub response: Option<PathBuf>,
}

#[derive(Serialize)]
struct RequestArtifact<'a> {
    tx: Uuid,
    stage: &'a str,
    provider: &'a str,
    model: &'a str,
    prompt: &'a Prompt,
}

pub fn tx_dir(data_dir: &Path, tx: Uuid) -> PathBuf {
    data_dir.join(".flavia").join("tx").join(tx.to_string())
}

/// What to write for one stage of one transaction.
pub struct Transcript<'a> {
    pub tx: Uuid,
    pub stage: &'a str,
    pub provider: &'a str,
    pub model: &'a str,
    pub prompt: &'a Prompt,
    /// Raw model text, exactly as received.
    pub response: Option<&'a str>,
}

pub fn save_stage(
    data_dir: &Path,
    t: &Transcript<'_>,
    save_request: bool,
    save_response: bool,
) -> anyhow::Result<SavedPaths> {
    let dir = tx_dir(data_dir, t.tx);
    fs::create_dir_all(&dir)?;

    let mut request_path = None;
    let mut response_path = None;

    if save_request {
        let p = dir.join(format!("{}.request.json", t.stage));
        let artifact = RequestArtifact {
            tx: t.tx,
            stage: t.stage,
            provider: t.provider,
            model: t.model,
            prompt: t.prompt,
        };
        fs::write(&p, to_string_pretty(&artifact)?)?;
        request_path = Some(p);
    }

    if let (true, Some(raw)) = (save_response, t.response) {
        let p = dir.join(format!("{}.response.txt", t.stage));
        fs::write(&p, raw)?;
        response_path = Some(p);
    }

    let saved = SavedPaths { dir, request: request_path, response: response_path };
    debug!(
        stage = t.stage,
        dir = %saved.dir.display(),
        request = saved.request.is_some(),
        response = saved.response.is_some(),
        "saved transcript"
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_only_what_was_asked_for() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Prompt { system: "sys".into(), user: "user".into() };
        let t = Transcript {
            tx: Uuid::new_v4(),
            stage: "plan",
            provider: "fake",
            model: "m",
            prompt: &prompt,
            response: Some("{\"days\":[]}"),
        };

        let saved = save_stage(dir.path(), &t, true, false).unwrap();
        assert!(saved.request.as_ref().unwrap().exists());
        assert!(saved.response.is_none());

        let saved = save_stage(dir.path(), &t, false, true).unwrap();
        let body = std::fs::read_to_string(saved.response.unwrap()).unwrap();
        assert_eq!(body, "{\"days\":[]}");
        assert!(saved.dir.starts_with(dir.path().join(".flavia").join("tx")));
    }
}
