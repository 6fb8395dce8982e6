use crate::collector::lag_extractor::GROUP_MISSING_MARKER;
use crate::config::KafkaConfig;
use crate::error::{LagError, Result};
use crate::kafka::{ConsumerGroupSource, parse_group_list};
use std::process::Output;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs the configured `kafka-consumer-groups` command lines.
pub struct CommandGroupSource {
    list_command: Vec<String>,
    describe_command: Vec<String>,
    timeout: Duration,
}

impl CommandGroupSource {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            list_command: config.list_command.clone(),
            describe_command: config.describe_command.clone(),
            timeout: config.command_timeout,
        }
    }

    async fn run(&self, command: &[String]) -> Result<Output> {
        let Some((program, args)) = command.split_first() else {
            return Err(LagError::Config("command cannot be empty".to_string()));
        };

        let start = Instant::now();
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| {
            LagError::Timeout(format!(
                "'{program}' did not finish within {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| LagError::Process(format!("unable to run '{program}': {e}")))?;

        debug!(
            program = %program,
            status = %output.status,
            elapsed_ms = start.elapsed().as_millis(),
            "Command finished"
        );

        Ok(output)
    }
}

#[async_trait::async_trait]
impl ConsumerGroupSource for CommandGroupSource {
    #[instrument(skip(self))]
    async fn list_groups(&self) -> Result<Vec<String>> {
        let output = self.run(&self.list_command).await?;
        if !output.status.success() {
            return Err(process_failure(&self.list_command, &output));
        }

        Ok(parse_group_list(&String::from_utf8_lossy(&output.stdout)))
    }

    #[instrument(skip(self))]
    async fn describe_group(&self, group: &str) -> Result<String> {
        let mut command = self.describe_command.clone();
        command.push("--group".to_string());
        command.push(group.to_string());

        let output = self.run(&command).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Newer tool versions report a missing group on stderr, sometimes with a failing
        // exit code. Pass the message through so the extractor sees the marker.
        if stderr.contains(GROUP_MISSING_MARKER) {
            return Ok(format!("{stdout}{stderr}"));
        }

        if !output.status.success() {
            return Err(process_failure(&command, &output));
        }

        Ok(stdout.into_owned())
    }
}

fn process_failure(command: &[String], output: &Output) -> LagError {
    LagError::Process(format!(
        "'{}' exited with {}: {}",
        command.join(" "),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}
