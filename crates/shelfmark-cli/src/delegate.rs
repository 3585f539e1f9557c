use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use shelfmark_core::{CanonicalRecord, DelegateConfig, SourceRecord};
use shelfmark_match::{CallNumberDelegate, DelegateResponse, MatchError, MergeDelegate};

#[derive(Serialize)]
struct DelegateRequest<'a> {
    records: &'a [SourceRecord],
    provenance: bool,
}

#[derive(Serialize)]
struct CallNumberRequest<'a> {
    record: &'a CanonicalRecord,
}

/// Runs an external program as the preferred merger or call-number source.
///
/// As a merger the program reads `{"records": [...], "provenance": bool}` on
/// stdin and must print `{"merged_metadata": {...}, "provenance": {...}}` on
/// stdout. Asked for a call number it reads `{"record": {...}}` and prints
/// the number as plain text.
pub struct CommandDelegate {
    name: String,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDelegate {
    pub fn from_config(config: &DelegateConfig) -> Self {
        Self {
            name: format!("command:{}", config.command),
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Feeds `input` to the program and collects its stdout. The timeout
    /// covers the whole exchange, including writing the request.
    fn run(&self, input: &[u8]) -> shelfmark_match::Result<Vec<u8>> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    MatchError::DelegateUnavailable(format!("{} is not installed", self.command))
                } else {
                    MatchError::DelegateUnavailable(format!("failed to run {}: {err}", self.command))
                }
            })?;

        let started = Instant::now();
        let stdin = child.stdin.take().map(|pipe| feed(pipe, input.to_vec()));
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(MatchError::DelegateFailed(format!(
                            "{} timed out after {}s",
                            self.command,
                            self.timeout.as_secs()
                        )));
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MatchError::DelegateFailed(format!("{} process failed: {err}", self.command)));
                }
            }
        };

        if let Some(handle) = stdin {
            let _ = handle.join();
        }
        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        if !status.success() {
            let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {status}", self.command)
            } else {
                format!("{} exited with {status}: {stderr}", self.command)
            };
            return Err(MatchError::DelegateFailed(message));
        }
        Ok(stdout)
    }
}

impl MergeDelegate for CommandDelegate {
    fn name(&self) -> &str {
        &self.name
    }

    fn merge(&self, records: &[SourceRecord], want_provenance: bool) -> shelfmark_match::Result<DelegateResponse> {
        let request = DelegateRequest {
            records,
            provenance: want_provenance,
        };
        let input = serde_json::to_vec(&request)
            .map_err(|e| MatchError::DelegateFailed(format!("cannot encode request: {e}")))?;

        let output = self.run(&input)?;
        serde_json::from_slice(&output).map_err(|e| MatchError::DelegateOutput(e.to_string()))
    }
}

impl CallNumberDelegate for CommandDelegate {
    fn name(&self) -> &str {
        &self.name
    }

    fn suggest(&self, record: &CanonicalRecord) -> shelfmark_match::Result<Option<String>> {
        let input = serde_json::to_vec(&CallNumberRequest { record })
            .map_err(|e| MatchError::DelegateFailed(format!("cannot encode request: {e}")))?;
        let output = self.run(&input)?;
        let text = String::from_utf8(output).map_err(|e| MatchError::DelegateOutput(e.to_string()))?;
        Ok(Some(text).filter(|t| !t.trim().is_empty()))
    }
}

fn feed<W: Write + Send + 'static>(mut pipe: W, input: Vec<u8>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        // A program that exits without reading its input is judged by its
        // exit status, not by the broken pipe.
        if let Err(err) = pipe.write_all(&input) {
            tracing::debug!(error = %err, "delegate closed stdin early");
        }
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use shelfmark_core::{BookMetadata, MetadataSource};

    fn delegate(script: &str, timeout_secs: u64) -> CommandDelegate {
        CommandDelegate::from_config(&DelegateConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout_secs,
        })
    }

    fn records() -> Vec<SourceRecord> {
        vec![SourceRecord::new(MetadataSource::Vision, BookMetadata::new("Emma"))]
    }

    #[test]
    fn reads_response_from_stdout() {
        let d = delegate(
            r#"cat >/dev/null; echo '{"merged_metadata":{"title":"Emma"},"provenance":{"title":"vision"}}'"#,
            5,
        );
        let response = d.merge(&records(), true).unwrap();
        assert_eq!(response.merged_metadata.title.as_deref(), Some("Emma"));
        assert!(response.provenance.is_some());
    }

    #[test]
    fn request_carries_records() {
        let d = delegate(
            r#"grep -q '"source":"vision"' && echo '{"merged_metadata":{"title":"seen"}}'"#,
            5,
        );
        let response = d.merge(&records(), false).unwrap();
        assert_eq!(response.merged_metadata.title.as_deref(), Some("seen"));
    }

    #[test]
    fn failure_status_reports_stderr() {
        let d = delegate("cat >/dev/null; echo boom >&2; exit 3", 5);
        match d.merge(&records(), false) {
            Err(MatchError::DelegateFailed(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_output_is_rejected() {
        let d = delegate("cat >/dev/null; echo not json", 5);
        assert!(matches!(d.merge(&records(), false), Err(MatchError::DelegateOutput(_))));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let d = CommandDelegate::from_config(&DelegateConfig {
            command: "shelfmark-no-such-merger".to_string(),
            args: Vec::new(),
            timeout_secs: 1,
        });
        assert!(matches!(d.merge(&records(), false), Err(MatchError::DelegateUnavailable(_))));
    }

    #[test]
    fn suggests_call_number_from_stdout() {
        let d = delegate(r#"grep -q '"record"' && printf 'PZ7.D1515 Mat 1988\n'"#, 5);
        let suggestion = d.suggest(&CanonicalRecord::new("Matilda")).unwrap();
        assert_eq!(suggestion.as_deref().map(str::trim), Some("PZ7.D1515 Mat 1988"));

        let silent = delegate("cat >/dev/null", 5);
        assert_eq!(silent.suggest(&CanonicalRecord::new("Matilda")).unwrap(), None);
    }

    #[test]
    fn slow_delegate_times_out() {
        let d = delegate("sleep 5", 1);
        assert!(matches!(d.merge(&records(), false), Err(MatchError::DelegateFailed(_))));
    }

    #[test]
    fn timeout_holds_when_request_is_never_read() {
        let mut metadata = BookMetadata::new("Emma");
        metadata.additional_text = Some("x".repeat(512 * 1024));
        let large = vec![SourceRecord::new(MetadataSource::Vision, metadata)];

        let d = delegate("sleep 5", 1);
        let started = Instant::now();
        let result = d.merge(&large, false);
        assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
        match result {
            Err(MatchError::DelegateFailed(message)) => assert!(message.contains("timed out")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn large_request_round_trips() {
        let mut metadata = BookMetadata::new("Emma");
        metadata.additional_text = Some("y".repeat(512 * 1024));
        let large = vec![SourceRecord::new(MetadataSource::Vision, metadata)];

        let d = delegate(r#"wc -c >/dev/null; echo '{"merged_metadata":{"title":"Emma"}}'"#, 5);
        let response = d.merge(&large, false).unwrap();
        assert_eq!(response.merged_metadata.title.as_deref(), Some("Emma"));
    }
}
