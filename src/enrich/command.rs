//! External-command enricher

use super::{merge_enrichment, EnrichError, Enricher};
use crate::config::EnrichmentConfig;
use crate::extract::ApplicantRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Argument placeholder replaced by the path of the input file
pub const INPUT_PLACEHOLDER: &str = "{input}";

const DEFAULT_INPUT_FILE: &str = "gradcafe-harvest-enrich.json";

/// Runs a configured command over each batch
///
/// When an argument contains [`INPUT_PLACEHOLDER`] the batch is written to
/// the input file first; otherwise it is piped to the command's stdin.
#[derive(Debug, Clone)]
pub struct CommandEnricher {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    input_path: PathBuf,
}

impl CommandEnricher {
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or(EnrichError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(EnrichError::EmptyCommand);
        }

        // The command may run elsewhere, so the file it reads must be absolute.
        let input_path = match &config.input_path {
            Some(path) => std::path::absolute(path)?,
            None => std::env::temp_dir().join(DEFAULT_INPUT_FILE),
        };

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: config.working_dir.as_ref().map(PathBuf::from),
            input_path,
        })
    }

    fn uses_input_file(&self) -> bool {
        self.args.iter().any(|arg| arg.contains(INPUT_PLACEHOLDER))
    }

    async fn run_command(&self, payload: Vec<u8>) -> Result<String, EnrichError> {
        let uses_file = self.uses_input_file();
        let input = self.input_path.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input))
            .collect();

        if uses_file {
            tokio::fs::write(&self.input_path, &payload).await?;
        }

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(if uses_file {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::info!("Running enrichment command {} {}", self.program, args.join(" "));

        let mut child = command.spawn().map_err(|source| EnrichError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("Enrichment stdin closed early: {}", e),
                Err(e) => tracing::debug!("Enrichment stdin writer aborted: {}", e),
            }
        }

        if !output.status.success() {
            return Err(EnrichError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Enricher for CommandEnricher {
    async fn enrich(
        &self,
        records: Vec<ApplicantRecord>,
    ) -> Result<Vec<ApplicantRecord>, EnrichError> {
        if records.is_empty() {
            return Ok(records);
        }

        let payload = serde_json::to_vec_pretty(&records)?;
        let stdout = self.run_command(payload).await?;
        let rows = parse_enrichment_output(&stdout)?;

        tracing::info!("Enrichment returned {} rows", rows.len());
        merge_enrichment(records, &rows)
    }
}

/// Decodes the command's answer into rows
///
/// Accepted shapes, in order: a JSON array of rows, an object holding a
/// `rows` array, a single row object, and finally newline-delimited rows
/// where lines that fail to decode are skipped.
pub fn parse_enrichment_output(text: &str) -> Result<Vec<Value>, EnrichError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EnrichError::Decode("command produced no output".to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(Value::Object(mut object)) => match object.remove("rows") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => {
                object.insert("rows".to_string(), other);
                Ok(vec![Value::Object(object)])
            }
            None => Ok(vec![Value::Object(object)]),
        },
        Ok(other) => Err(EnrichError::Decode(format!(
            "expected rows, got {}",
            other
        ))),
        Err(_) => parse_json_lines(trimmed),
    }
}

fn parse_json_lines(text: &str) -> Result<Vec<Value>, EnrichError> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(row @ Value::Object(_)) => rows.push(row),
            Ok(_) => tracing::debug!("Skipping non-object line {}", number + 1),
            Err(e) => tracing::debug!("Skipping undecodable line {}: {}", number + 1, e),
        }
    }

    if rows.is_empty() {
        return Err(EnrichError::Decode(
            "no JSON rows found in command output".to_string(),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let rows = parse_enrichment_output(r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_rows_object() {
        let rows = parse_enrichment_output(r#"{"rows": [{"a": 1}]}"#).unwrap();
        assert_eq!(rows, vec![serde_json::json!({"a": 1})]);
    }

    #[test]
    fn test_parse_single_object() {
        let rows = parse_enrichment_output(r#"{"llm-generated-program": "CS"}"#).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_parse_json_lines_skips_bad_lines() {
        let output = "{\"a\": 1}\nloading model...\n\n{\"a\": 2}\n";
        let rows = parse_enrichment_output(output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_enrichment_output("Traceback (most recent call last):"),
            Err(EnrichError::Decode(_))
        ));
        assert!(matches!(
            parse_enrichment_output("   "),
            Err(EnrichError::Decode(_))
        ));
        assert!(matches!(
            parse_enrichment_output("42"),
            Err(EnrichError::Decode(_))
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn shell(script: &str, extra: &[&str]) -> EnrichmentConfig {
            let mut command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
            command.extend(extra.iter().map(|s| s.to_string()));
            EnrichmentConfig {
                command,
                working_dir: None,
                input_path: None,
            }
        }

        fn batch() -> Vec<ApplicantRecord> {
            vec![ApplicantRecord {
                program: Some("CS, MIT".to_string()),
                ..Default::default()
            }]
        }

        #[tokio::test]
        async fn test_stdin_mode() {
            let config = shell(
                r#"grep -q '"CS, MIT"' && echo '[{"llm-generated-program": "Computer Science", "llm-generated-university": "Massachusetts Institute of Technology"}]'"#,
                &[],
            );
            let enricher = CommandEnricher::from_config(&config).unwrap();

            let records = enricher.enrich(batch()).await.unwrap();

            assert_eq!(
                records[0].llm_generated_program.as_deref(),
                Some("Computer Science")
            );
            assert_eq!(
                records[0].llm_generated_university.as_deref(),
                Some("Massachusetts Institute of Technology")
            );
        }

        #[tokio::test]
        async fn test_input_file_mode() {
            let dir = tempfile::tempdir().unwrap();
            let input = dir.path().join("batch.json");
            let mut config = shell(
                r#"grep -q '"CS, MIT"' "$1" && echo '{"llm-generated-program": "Computer Science"}'"#,
                &["sh", "{input}"],
            );
            config.input_path = Some(input.to_string_lossy().into_owned());
            let enricher = CommandEnricher::from_config(&config).unwrap();

            let records = enricher.enrich(batch()).await.unwrap();

            assert_eq!(
                records[0].llm_generated_program.as_deref(),
                Some("Computer Science")
            );
            assert!(input.exists());
        }

        #[tokio::test]
        async fn test_working_dir() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("answer.json"), r#"[{"llm-generated-university": "MIT"}]"#)
                .unwrap();
            let mut config = shell("cat > /dev/null; cat answer.json", &[]);
            config.working_dir = Some(dir.path().to_string_lossy().into_owned());
            let enricher = CommandEnricher::from_config(&config).unwrap();

            let records = enricher.enrich(batch()).await.unwrap();

            assert_eq!(records[0].llm_generated_university.as_deref(), Some("MIT"));
        }

        #[tokio::test]
        async fn test_nonzero_exit() {
            let enricher =
                CommandEnricher::from_config(&shell("echo 'model missing' >&2; exit 3", &[]))
                    .unwrap();

            let err = enricher.enrich(batch()).await.unwrap_err();

            match err {
                EnrichError::Failed { stderr, .. } => assert_eq!(stderr, "model missing"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_row_count_must_match() {
            let enricher =
                CommandEnricher::from_config(&shell("cat > /dev/null; echo '[]'", &[])).unwrap();

            let err = enricher.enrich(batch()).await.unwrap_err();

            assert!(matches!(
                err,
                EnrichError::LengthMismatch {
                    expected: 1,
                    actual: 0
                }
            ));
        }

        #[tokio::test]
        async fn test_missing_program() {
            let config = EnrichmentConfig {
                command: vec!["/nonexistent/standardize".to_string()],
                working_dir: None,
                input_path: None,
            };
            let enricher = CommandEnricher::from_config(&config).unwrap();

            let err = enricher.enrich(batch()).await.unwrap_err();

            assert!(matches!(err, EnrichError::Spawn { .. }));
        }

        #[tokio::test]
        async fn test_empty_batch_skips_command() {
            let config = EnrichmentConfig {
                command: vec!["/nonexistent/standardize".to_string()],
                working_dir: None,
                input_path: None,
            };
            let enricher = CommandEnricher::from_config(&config).unwrap();

            assert!(enricher.enrich(Vec::new()).await.unwrap().is_empty());
        }
    }
}
