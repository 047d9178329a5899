// Keyboard teleop: W/S drive, A/D pivot, R/F step size, Space halt, Q quit
// Each key press publishes one discrete motion; the runtime rejects presses
// that arrive while a motion is still running.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;
use wallaby_drive::config::{TOPIC_CMD_HALT, TOPIC_CMD_MOTION};
use wallaby_drive::messages::MotionCommand;

const DISTANCES: [f64; 3] = [5.0, 15.0, 30.0]; // cm
const ANGLES: [f64; 3] = [15.0, 45.0, 90.0]; // degrees

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_motion = session.declare_publisher(TOPIC_CMD_MOTION).await?;
    let pub_halt = session.declare_publisher(TOPIC_CMD_HALT).await?;

    info!("Controls: W/S=drive, A/D=pivot, R/F=step, Space=halt, Q=quit");
    print_step(0);

    enable_raw_mode()?;
    let result = run_teleop(&pub_motion, &pub_halt).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_motion: &zenoh::pubsub::Publisher<'_>,
    pub_halt: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut step: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        // One motion per press, ignore auto-repeat
        if kind != KeyEventKind::Press {
            continue;
        }

        let command = match code {
            KeyCode::Char('w') => Some(MotionCommand::Forward {
                distance_cm: DISTANCES[step],
                speed: None,
            }),
            KeyCode::Char('s') => Some(MotionCommand::Backward {
                distance_cm: DISTANCES[step],
                speed: None,
            }),
            KeyCode::Char('a') => Some(MotionCommand::Left {
                degrees: ANGLES[step],
                radius_cm: 0.0,
                speed: None,
            }),
            KeyCode::Char('d') => Some(MotionCommand::Right {
                degrees: ANGLES[step],
                radius_cm: 0.0,
                speed: None,
            }),
            KeyCode::Char('r') => {
                step = (step + 1).min(2);
                print_step(step);
                None
            }
            KeyCode::Char('f') => {
                step = step.saturating_sub(1);
                print_step(step);
                None
            }
            KeyCode::Char(' ') => {
                pub_halt.put("halt".to_string()).await?;
                None
            }
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => None,
        };

        if let Some(command) = command {
            pub_motion.put(serde_json::to_string(&command)?).await?;
        }
    }

    Ok(())
}

fn print_step(idx: usize) {
    info!("Step: {} cm / {}°", DISTANCES[idx], ANGLES[idx]);
}
