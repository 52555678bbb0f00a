use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use wirelink_peer::{IntakeBuffer, IntakeStats, Server};

use crate::cmd::ConsumeArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};

/// Simulated per-message processing time.
const PROCESS_DELAY: Duration = Duration::from_millis(15);
/// Sleep between empty polls of the intake buffer.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Consecutive empty polls before a loss report.
const IDLE_REPORT_POLLS: u32 = 2000;

pub fn run(_args: ConsumeArgs) -> CliResult<i32> {
    let intake = Arc::new(IntakeBuffer::new());

    let server = {
        let intake = Arc::clone(&intake);
        Server::start(move |msg| {
            let sequence = msg.sequence;
            let status = if msg.valid { "PASS" } else { "FAIL" };
            info!(sequence, status, "received");
            if !intake.try_push(msg) {
                warn!(sequence, "intake buffer full; message dropped");
            }
        })
        .map_err(|err| peer_error("server start failed", err))?
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    drain(&intake, &running);

    drop(server);
    Ok(SUCCESS)
}

/// Drain loop: pop and "process" messages; when the buffer stays empty for
/// a while, report the cumulative loss ratio since the last report.
fn drain(intake: &IntakeBuffer, running: &AtomicBool) {
    let mut idle_polls = 0u32;
    let mut last_report = intake.stats();

    while running.load(Ordering::SeqCst) {
        match intake.pop() {
            Some(msg) => {
                idle_polls = 0;
                std::thread::sleep(PROCESS_DELAY);
                let status = if msg.valid { "PASS" } else { "FAIL" };
                info!(sequence = msg.sequence, status, "processed");
            }
            None => {
                idle_polls += 1;
                if idle_polls >= IDLE_REPORT_POLLS {
                    idle_polls = 0;
                    last_report = report(intake.stats(), last_report);
                }
                std::thread::sleep(IDLE_POLL_INTERVAL);
            }
        }
    }
}

fn report(stats: IntakeStats, last: IntakeStats) -> IntakeStats {
    let Some(loss_ratio) = window_loss_ratio(stats, last) else {
        return last;
    };
    info!(
        received = stats.received - last.received,
        processed = stats.processed - last.processed,
        dropped = stats.dropped - last.dropped,
        loss_ratio = format!("{loss_ratio:.4}"),
        "intake report"
    );
    stats
}

/// Loss ratio `(received − processed) / received` over the window since
/// the last report. `None` when nothing new arrived.
fn window_loss_ratio(stats: IntakeStats, last: IntakeStats) -> Option<f64> {
    let received = stats.received - last.received;
    if received == 0 {
        return None;
    }
    let processed = stats.processed - last.processed;
    let lost = received.saturating_sub(processed);
    Some(lost as f64 / received as f64)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
