use crate::config::EngineSettings;
use eveq::core::models::conditions::PhysicalConditions;
use eveq::engine::error::EngineError;
use eveq::engine::simulation::{
    AdvanceOutput, AdvanceRequest, Checkpoint, SimulationEngine, Snapshot,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, ErrorKind, Write};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;
use tracing::{debug, instrument};

const STDERR_TAIL_LINES: usize = 20;

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum EngineRequest<'a> {
    Pack {
        force_field: &'a str,
        conditions: &'a PhysicalConditions,
    },
    Minimize {
        force_field: &'a str,
        snapshot: &'a Snapshot,
    },
    Advance {
        force_field: &'a str,
        snapshot: &'a Snapshot,
        request: &'a AdvanceRequest,
        checkpoint: Option<&'a Checkpoint>,
    },
}

/// Drives an external simulation driver: one process per call, a JSON request
/// on stdin and a JSON response on stdout.
pub struct CommandEngine {
    settings: EngineSettings,
}

impl CommandEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn call<T: DeserializeOwned>(
        &self,
        stage: &'static str,
        request: &EngineRequest<'_>,
    ) -> Result<T, EngineError> {
        let failure = |message: String| EngineError::Simulation { stage, message };

        let payload = serde_json::to_vec(request)
            .map_err(|e| failure(format!("failed to encode request: {}", e)))?;

        debug!(program = %self.settings.program.display(), stage, "Invoking engine driver");
        let mut child = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                failure(format!(
                    "failed to start '{}': {}",
                    self.settings.program.display(),
                    e
                ))
            })?;

        // stdout and stderr are drained while the request is still being written.
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || send_request(stdin, &payload));
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(failure(format!("failed to send request: {}", e))),
            Err(_) => return Err(failure("request writer panicked".to_string())),
        }
        let output = output.map_err(|e| failure(format!("failed to wait for driver: {}", e)))?;

        if !output.status.success() {
            return Err(failure(format!(
                "driver exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| failure(format!("malformed driver response: {}", e)))
    }
}

fn send_request(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(payload) {
        // The exit status explains why the driver stopped reading.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl SimulationEngine for CommandEngine {
    fn force_field_id(&self) -> &str {
        &self.settings.force_field
    }

    #[instrument(skip_all, name = "engine_pack")]
    fn pack(&self, conditions: &PhysicalConditions) -> Result<Snapshot, EngineError> {
        self.call(
            "pack",
            &EngineRequest::Pack {
                force_field: &self.settings.force_field,
                conditions,
            },
        )
    }

    #[instrument(skip_all, name = "engine_minimize")]
    fn minimize(&self, snapshot: &Snapshot) -> Result<Snapshot, EngineError> {
        self.call(
            "minimize",
            &EngineRequest::Minimize {
                force_field: &self.settings.force_field,
                snapshot,
            },
        )
    }

    #[instrument(skip_all, name = "engine_advance")]
    fn advance(
        &self,
        snapshot: &Snapshot,
        request: &AdvanceRequest,
        resume: Option<&Checkpoint>,
    ) -> Result<AdvanceOutput, EngineError> {
        self.call(
            "advance",
            &EngineRequest::Advance {
                force_field: &self.settings.force_field,
                snapshot,
                request,
                checkpoint: resume,
            },
        )
    }
}
