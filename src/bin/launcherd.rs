use std::thread;
use std::time::Duration;

#[macro_use]
extern crate log;

use anyhow::{Context, Result};

use ue_launcher::config::{Args, LauncherConfig};
use ue_launcher::orchestrator::Orchestrator;
use ue_launcher::supervisor::SupervisorEvent;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::init();

    let args: Args = argh::from_env();
    let config = LauncherConfig::from_args(args);

    let mut orchestrator = Orchestrator::new(config).context("failed to initialize launcher")?;
    orchestrator.run().context("no slot could be started")?;

    info!("{}", orchestrator.status());
    run_until_child_exits(&mut orchestrator);

    Ok(())
}

fn run_until_child_exits(orchestrator: &mut Orchestrator) {
    loop {
        let Some(supervisor) = orchestrator.supervisor_mut() else {
            return;
        };

        for event in supervisor.poll_events() {
            match event {
                SupervisorEvent::Heartbeat(at) => debug!("heartbeat at {at}"),
                SupervisorEvent::NotResponding => warn!("application is not responding"),
                SupervisorEvent::Exited(code) => {
                    info!("application exited with code {code:?}");
                    return;
                }
                SupervisorEvent::Spawning | SupervisorEvent::Started => {}
            }
        }

        thread::sleep(STATUS_POLL_INTERVAL);
    }
}

