use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::bundle::group_secrets;
use crate::error::{ReportError, WriteError};
use crate::model::{SecretRecord, SessionConfig, UploadResult, UploadStatus};
use crate::vault::{SecretTarget, VaultApi};

pub const SUCCESS_MESSAGE: &str = "Successfully stored";
pub const REPORT_HEADER: &str = "Secret Name,Status,Message";

/// Emitted after each secret finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub index: usize,
    pub result: UploadResult,
    pub completed: usize,
    pub total: usize,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        percent(self.completed, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn message(&self) -> String {
        if self.failed == 0 {
            format!("All {} secrets uploaded successfully!", self.succeeded)
        } else {
            format!(
                "{} secrets failed to upload. {} succeeded.",
                self.failed, self.succeeded
            )
        }
    }
}

fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Per-secret upload state for one batch.
///
/// Results hold exactly one entry per unique secret name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct UploadOrchestrator {
    results: Vec<UploadResult>,
    completed: usize,
}

impl UploadOrchestrator {
    pub fn new(records: &[SecretRecord]) -> Self {
        let mut orchestrator = Self::default();
        orchestrator.load(records);
        orchestrator
    }

    /// Replace the batch with pending results for `records`.
    pub fn load(&mut self, records: &[SecretRecord]) {
        self.results = group_secrets(records)
            .names()
            .map(UploadResult::pending)
            .collect();
        self.completed = 0;
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    pub fn progress(&self) -> f64 {
        percent(self.completed, self.results.len())
    }

    pub fn is_complete(&self) -> bool {
        !self.results.is_empty() && self.completed == self.results.len()
    }

    pub fn summary(&self) -> UploadSummary {
        let count = |status: UploadStatus| self.results.iter().filter(|r| r.status == status).count();
        UploadSummary {
            total: self.results.len(),
            succeeded: count(UploadStatus::Success),
            failed: count(UploadStatus::Error),
        }
    }

    /// Record one finished item, as reported by a running batch.
    pub fn apply_progress(&mut self, progress: &UploadProgress) {
        if let Some(slot) = self.results.get_mut(progress.index) {
            *slot = progress.result.clone();
        }
        self.completed = progress.completed;
    }

    /// Return every result to pending and progress to zero.
    pub fn reset(&mut self) {
        for result in &mut self.results {
            result.status = UploadStatus::Pending;
            result.message = None;
        }
        self.completed = 0;
    }

    /// Write every bundle in order, awaiting each write before the next.
    ///
    /// Failures are recorded per secret and never stop the batch. The summary
    /// is taken after the last result has been stored.
    pub async fn run<C, F>(
        &mut self,
        client: &C,
        config: &SessionConfig,
        records: &[SecretRecord],
        mut on_progress: F,
    ) -> UploadSummary
    where
        C: VaultApi + ?Sized,
        F: FnMut(&UploadProgress),
    {
        let bundles = group_secrets(records);
        self.load(records);
        let total = bundles.len();
        if bundles.is_empty() {
            warn!("No secrets to upload");
            return self.summary();
        }
        let target = SecretTarget {
            server_url: &config.server_url,
            secrets_path: &config.secrets_path,
            namespace: config.namespace(),
        };
        info!("Uploading {} secrets to {}", total, config.secrets_path);

        for (index, (name, data)) in bundles.iter().enumerate() {
            let outcome = match config.token() {
                Some(token) => client.write_secret(&target, token, name, data).await,
                None => Err(WriteError::MissingToken),
            };

            let result = match outcome {
                Ok(()) => {
                    debug!("Stored secret '{}' ({} keys)", name, data.len());
                    UploadResult {
                        secret_name: name.to_string(),
                        status: UploadStatus::Success,
                        message: Some(SUCCESS_MESSAGE.to_string()),
                    }
                }
                Err(e) => {
                    warn!("Failed to store secret '{}': {}", name, e);
                    UploadResult {
                        secret_name: name.to_string(),
                        status: UploadStatus::Error,
                        message: Some(e.to_string()),
                    }
                }
            };

            let progress = UploadProgress {
                index,
                result,
                completed: index + 1,
                total,
            };
            self.apply_progress(&progress);
            on_progress(&progress);
        }

        let summary = self.summary();
        info!(
            "Upload finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        summary
    }

    /// Render results as CSV: quoted name, status and message per secret.
    pub fn report(&self) -> Result<String, ReportError> {
        if self.results.is_empty() {
            return Err(ReportError::Empty);
        }
        let mut lines = Vec::with_capacity(self.results.len() + 1);
        lines.push(REPORT_HEADER.to_string());
        for r in &self.results {
            lines.push(format!(
                "{},{},{}",
                quote(&r.secret_name),
                quote(&r.status.to_string()),
                quote(r.message.as_deref().unwrap_or_default())
            ));
        }
        Ok(lines.join("\n"))
    }

    /// Save the report as `vault-upload-report-YYYY-MM-DD.csv` under `dir`.
    pub fn save_report(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let report = self.report()?;
        let date = OffsetDateTime::now_utc().date();
        let path = dir.join(format!("vault-upload-report-{}.csv", date));
        fs::write(&path, report)?;
        debug!("Report written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::SecretData;
    use crate::error::AuthError;
    use crate::model::AuthMode;
    use crate::vault::{HealthStatus, HttpVaultClient};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records start/end of each write; fails names listed in `fail`.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        fail: Vec<&'static str>,
    }

    #[async_trait]
    impl VaultApi for Recorder {
        async fn check_health(&self, _: &str) -> HealthStatus {
            HealthStatus::Active
        }

        async fn lookup_token(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), AuthError> {
            Ok(())
        }

        async fn login_approle(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<String, AuthError> {
            Ok(String::new())
        }

        async fn write_secret(
            &self,
            _: &SecretTarget<'_>,
            _: &str,
            name: &str,
            _: &SecretData,
        ) -> Result<(), WriteError> {
            self.events.lock().unwrap().push(format!("start:{}", name));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.events.lock().unwrap().push(format!("end:{}", name));
            if self.fail.iter().any(|f| *f == name) {
                Err(WriteError::Status {
                    status: 500,
                    body: "disk full".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn record(name: &str, key: &str, value: &str) -> SecretRecord {
        SecretRecord {
            name: name.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    fn config(server_url: &str) -> SessionConfig {
        SessionConfig {
            server_url: server_url.into(),
            secrets_path: "kv/data".into(),
            auth_mode: AuthMode::Token,
            token: Some("hvs.t".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_results_match_bundle_names() {
        let records = vec![
            record("api", "a", "1"),
            record("web", "b", "2"),
            record("api", "c", "3"),
        ];
        let orchestrator = UploadOrchestrator::new(&records);
        let names: Vec<_> = orchestrator
            .results()
            .iter()
            .map(|r| r.secret_name.as_str())
            .collect();
        assert_eq!(names, vec!["api", "web"]);
        assert!(
            orchestrator
                .results()
                .iter()
                .all(|r| r.status == UploadStatus::Pending)
        );
        assert_eq!(orchestrator.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_writes_are_strictly_sequential() {
        let client = Recorder::default();
        let records = vec![
            record("A", "k", "1"),
            record("B", "k", "2"),
            record("C", "k", "3"),
        ];
        let mut orchestrator = UploadOrchestrator::default();
        orchestrator
            .run(&client, &config("http://v"), &records, |_| {})
            .await;

        let events = client.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start:A", "end:A", "start:B", "end:B", "start:C", "end:C"]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_recorded_per_item() {
        let client = Recorder {
            fail: vec!["web"],
            ..Default::default()
        };
        let records = vec![record("api", "k", "1"), record("web", "k", "2")];
        let mut seen = Vec::new();
        let mut orchestrator = UploadOrchestrator::new(&records);

        let summary = orchestrator
            .run(&client, &config("http://v"), &records, |p| {
                seen.push(p.percent())
            })
            .await;

        assert_eq!(seen, vec![50.0, 100.0]);
        assert_eq!(
            summary,
            UploadSummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(summary.message(), "1 secrets failed to upload. 1 succeeded.");
        assert!(orchestrator.is_complete());
        assert_eq!(orchestrator.results()[1].status, UploadStatus::Error);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let client = Recorder::default();
        let mut orchestrator = UploadOrchestrator::default();
        let mut seen = 0;

        let summary = orchestrator
            .run(&client, &config("http://v"), &[], |_| seen += 1)
            .await;
        assert_eq!(summary, UploadSummary::default());
        assert_eq!(seen, 0);
        assert!(client.events.lock().unwrap().is_empty());
        assert!(!orchestrator.is_complete());
        assert_eq!(orchestrator.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_missing_token_fails_each_item() {
        let client = Recorder::default();
        let records = vec![record("api", "k", "1"), record("web", "k", "2")];
        let mut cfg = config("http://v");
        cfg.token = None;
        let mut orchestrator = UploadOrchestrator::default();

        let summary = orchestrator.run(&client, &cfg, &records, |_| {}).await;
        assert_eq!(summary.failed, 2);
        assert!(client.events.lock().unwrap().is_empty());
        assert_eq!(
            orchestrator.results()[0].message.as_deref(),
            Some("No Vault token available; authenticate first")
        );
    }

    #[tokio::test]
    async fn test_second_write_http_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/kv/data/api"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/kv/data/web"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let records = vec![record("api", "db_url", "x"), record("web", "redis_url", "y")];
        let mut orchestrator = UploadOrchestrator::new(&records);
        orchestrator
            .run(&HttpVaultClient::new(), &config(&server.uri()), &records, |_| {})
            .await;

        let results = orchestrator.results();
        assert_eq!(results[0].status, UploadStatus::Success);
        assert_eq!(results[0].message.as_deref(), Some(SUCCESS_MESSAGE));
        assert_eq!(results[1].status, UploadStatus::Error);
        let message = results[1].message.as_deref().unwrap();
        assert!(message.contains("500") && message.contains("disk full"));
        assert_eq!(orchestrator.progress(), 100.0);
    }

    #[tokio::test]
    async fn test_reset_returns_everything_to_pending() {
        let client = Recorder {
            fail: vec!["b"],
            ..Default::default()
        };
        let records = vec![record("a", "k", "1"), record("b", "k", "2")];
        let mut orchestrator = UploadOrchestrator::new(&records);
        orchestrator
            .run(&client, &config("http://v"), &records, |_| {})
            .await;

        orchestrator.reset();
        assert_eq!(orchestrator.progress(), 0.0);
        assert!(!orchestrator.is_complete());
        assert!(
            orchestrator
                .results()
                .iter()
                .all(|r| r.status == UploadStatus::Pending && r.message.is_none())
        );
        assert_eq!(orchestrator.summary().total, 2);
    }

    #[test]
    fn test_report_format() {
        let mut orchestrator =
            UploadOrchestrator::new(&[record("api", "k", "v"), record("web", "k", "v")]);
        orchestrator.apply_progress(&UploadProgress {
            index: 1,
            result: UploadResult {
                secret_name: "web".into(),
                status: UploadStatus::Error,
                message: Some("HTTP 400: bad \"path\"".into()),
            },
            completed: 1,
            total: 2,
        });

        let report = orchestrator.report().unwrap();
        assert_eq!(
            report,
            "Secret Name,Status,Message\n\"api\",\"pending\",\"\"\n\"web\",\"error\",\"HTTP 400: bad \"\"path\"\"\""
        );
    }

    #[test]
    fn test_empty_report_is_refused() {
        let orchestrator = UploadOrchestrator::default();
        assert!(matches!(orchestrator.report(), Err(ReportError::Empty)));
    }

    #[test]
    fn test_save_report_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = UploadOrchestrator::new(&[record("api", "k", "v")]);
        let path = orchestrator.save_report(dir.path()).unwrap();

        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("vault-upload-report-"));
        assert!(file_name.ends_with(".csv"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(REPORT_HEADER));
    }
}
