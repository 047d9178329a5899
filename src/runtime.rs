// Command runtime: one motion at a time, driven from zenoh
// Motions block, so each runs on a blocking worker that owns the drive until
// it finishes. Commands arriving meanwhile are rejected, not queued.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::config::{LOOP_HZ, TOPIC_CMD_HALT, TOPIC_CMD_MOTION, TOPIC_STATE_MOTION};
use crate::drive::{CancelToken, DiffDrive, MotionReport, WaitPolicy};
use crate::error::{DriveError, Result};
use crate::messages::{MotionCommand, MotionStatus};
use crate::motor::MotorEncoderChannel;

type Worker<C> = JoinHandle<(DiffDrive<C>, MotionCommand, Result<MotionReport>)>;

pub struct Runtime<C> {
    drive: Option<DiffDrive<C>>,
    worker: Option<Worker<C>>,
    cancel: CancelToken,
    /// Set once a worker dies and takes the drive with it
    fault: Option<String>,
}

impl<C: MotorEncoderChannel + Send + 'static> Runtime<C> {
    pub fn new(drive: DiffDrive<C>) -> Self {
        Self {
            drive: Some(drive),
            worker: None,
            cancel: CancelToken::new(),
            fault: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    /// Start a motion, or reject it if one is already running
    pub fn on_command(&mut self, command: MotionCommand) -> MotionStatus {
        if let Some(fault) = &self.fault {
            warn!("Drive faulted, rejecting {:?}", command);
            return MotionStatus::Rejected {
                reason: format!("drive faulted: {}", fault),
            };
        }
        let Some(mut drive) = self.drive.take() else {
            warn!("Motion in progress, rejecting {:?}", command);
            return MotionStatus::Rejected {
                reason: "motion in progress".to_string(),
            };
        };

        info!("Starting {:?}", command);
        self.cancel.reset();
        let wait = WaitPolicy::blocking().with_cancel(self.cancel.clone());
        self.worker = Some(tokio::task::spawn_blocking(move || {
            let result = drive.execute_with(&command, &wait);
            (drive, command, result)
        }));
        MotionStatus::Running { command }
    }

    /// Ask the running motion to brake and give up
    pub fn on_halt(&mut self) {
        if self.is_busy() {
            info!("Halt requested");
            self.cancel.cancel();
        }
    }

    /// Collect a finished worker; `None` while still running or idle
    pub async fn poll_finished(&mut self) -> Option<MotionStatus> {
        if !self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            return None;
        }
        let worker = self.worker.take()?;
        let status = match worker.await {
            Ok((drive, command, result)) => {
                self.drive = Some(drive);
                Self::status_for(command, result)
            }
            Err(e) => {
                // Worker panicked and took the drive with it
                warn!("Motion worker failed: {}", e);
                let reason = e.to_string();
                self.fault = Some(reason.clone());
                MotionStatus::Fault { reason }
            }
        };
        Some(status)
    }

    fn status_for(command: MotionCommand, result: Result<MotionReport>) -> MotionStatus {
        match result {
            Ok(report) => {
                info!("Finished {:?}: {:?}", command, report);
                MotionStatus::Done { command, report }
            }
            Err(DriveError::Cancelled { .. }) => MotionStatus::Cancelled { command },
            Err(e @ DriveError::InvalidArgument(_)) => {
                warn!("Rejected {:?}: {}", command, e);
                MotionStatus::Rejected {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!("Motion {:?} failed: {}", command, e);
                MotionStatus::Fault {
                    reason: e.to_string(),
                }
            }
        }
    }
}

pub async fn run<C>(drive: DiffDrive<C>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    C: MotorEncoderChannel + Send + 'static,
{
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_motion = session.declare_subscriber(TOPIC_CMD_MOTION).await?;
    let sub_halt = session.declare_subscriber(TOPIC_CMD_HALT).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_MOTION).await?;

    let mut runtime = Runtime::new(drive);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Runtime started: {}Hz loop", LOOP_HZ);
    info!("Subscribed to: {}, {}", TOPIC_CMD_MOTION, TOPIC_CMD_HALT);
    info!("Publishing to: {}", TOPIC_STATE_MOTION);
    pub_status.put(serde_json::to_string(&MotionStatus::Idle)?).await?;

    loop {
        tick.tick().await;

        // 1. Halt requests first, so a halt and a new command in the same tick
        //    stop the old motion before the new one is considered
        while let Ok(Some(_)) = sub_halt.try_recv() {
            runtime.on_halt();
        }

        // 2. Collect a finished motion
        if let Some(status) = runtime.poll_finished().await {
            pub_status.put(serde_json::to_string(&status)?).await?;
        }

        // 3. Drain pending commands (non-blocking)
        while let Ok(Some(sample)) = sub_motion.try_recv() {
            let payload = sample.payload().to_bytes();
            let status = match serde_json::from_slice::<MotionCommand>(&payload) {
                Ok(command) => runtime.on_command(command),
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                    MotionStatus::Rejected {
                        reason: e.to_string(),
                    }
                }
            };
            pub_status.put(serde_json::to_string(&status)?).await?;
        }
    }
}
