mod blackboard; // shared run state
mod bus; // broadcast topics
mod navigation; // async navigation loop
mod settings; // TOML configuration
mod sim; // simulated robot and lidar
mod world; // map construction

use anyhow::Context;
use blackboard::{Blackboard, new_blackboard, raise_fault, snapshot};
use bus::Topic;
use navigation::{NavMap, NavReport, NavTask, Outcome};
use parking_lot::RwLock;
use rover_navigation::{MapBounds, Navigator, NavigatorConfig, Pose, RrtConfig, Twist};
use settings::Settings;
use sim::{PhysicsThread, ScanFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use world::World;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args().nth(1);
    let settings = settings::load_settings(config_path.as_deref())?;
    let world = World::build(&settings)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let report = runtime.block_on(run(settings, world))?;

    match report.outcome {
        Outcome::GoalReached => info!(ticks = report.ticks, "Run finished: goal reached"),
        Outcome::TickBudgetExhausted => warn!(ticks = report.ticks, "Run finished: goal not reached"),
        Outcome::Interrupted => info!(ticks = report.ticks, "Run interrupted"),
    }
    info!(
        plans_attempted = report.stats.plans_attempted,
        plans_failed = report.stats.plans_failed,
        replans_triggered = report.stats.replans_triggered,
        "Planner statistics"
    );
    Ok(())
}

fn build_navigator(settings: &Settings, bounds: MapBounds) -> anyhow::Result<Navigator> {
    let rrt = RrtConfig {
        expand_distance: settings.rrt.expand_distance,
        max_iterations: settings.rrt.max_iterations,
        bounds,
        step_policy: settings.rrt.step_policy,
        seed: settings.rrt.seed,
    };
    let navigator = Navigator::new(NavigatorConfig {
        goal: settings.goal,
        rrt,
        controller: settings.controller,
        planning_delay_ticks: settings.sim.planning_delay_ticks(),
        escape_radius: settings.rrt.escape_radius,
    })
    .context("invalid navigation configuration")?;
    Ok(navigator)
}

async fn run(settings: Settings, world: World) -> anyhow::Result<NavReport> {
    info!("Core simulation setup started.");
    let bb: Blackboard = new_blackboard(settings.start);
    let shutdown = Arc::new(AtomicBool::new(false));
    let applied: Arc<RwLock<Twist>> = Arc::new(RwLock::new(Twist::stop()));

    let pose_topic: Topic<Pose> = Topic::new(16);
    let scan_topic: Topic<ScanFrame> = Topic::new(8);
    let twist_topic: Topic<Twist> = Topic::new(4);

    // Subscribe before the producers start so nothing is missed
    let pose_rx = pose_topic.subscribe();
    let scan_rx = scan_topic.subscribe();

    let task = NavTask {
        navigator: build_navigator(&settings, world.known.bounds())?,
        map: NavMap::new(world.known.clone(), world.robot_radius)?,
        period: Duration::from_millis(settings.sim.nav_period_ms),
        max_ticks: settings.sim.max_ticks,
    };

    info!("Spawning control thread...");
    let control = sim::spawn_control(
        Arc::clone(&bb),
        Arc::clone(&applied),
        &twist_topic,
        Arc::clone(&shutdown),
    )?;

    info!("Spawning physics thread...");
    let physics = PhysicsThread {
        start: settings.start,
        dt: settings.sim.dt,
        truth: world.truth,
        lidar: settings.lidar.clone(),
    }
    .spawn(
        Arc::clone(&bb),
        Arc::clone(&applied),
        pose_topic,
        scan_topic,
        Arc::clone(&shutdown),
    )?;

    let watchdog = tokio::spawn(watchdog(
        Arc::clone(&bb),
        Duration::from_millis(settings.sim.cmd_timeout_ms),
    ));

    let result = tokio::select! {
        res = task.run(Arc::clone(&bb), pose_rx, scan_rx, twist_topic) => res,
        res = tokio::signal::ctrl_c() => res.context("failed to listen for Ctrl-C").map(|()| {
            info!("Ctrl-C received, shutting down.");
            NavReport::interrupted(&snapshot(&bb))
        }),
    };

    watchdog.abort();
    shutdown.store(true, Ordering::Relaxed);
    for (name, handle) in [("control", control), ("physics", physics)] {
        if handle.join().is_err() {
            error!("{} thread panicked", name);
        }
    }

    let s = snapshot(&bb);
    info!(pose = %s.pose, state = %s.nav_state, faults = ?s.faults, "Final state");
    result
}

/// Flags a fault when the control thread has not applied a command recently.
async fn watchdog(bb: Blackboard, timeout: Duration) {
    info!("Watchdog task started.");
    let mut tick = tokio::time::interval(timeout / 4);
    loop {
        tick.tick().await;
        let age = snapshot(&bb).last_cmd_ts.elapsed();
        if age > timeout && raise_fault(&bb, "cmd_vel timeout") {
            warn!(?age, "Command velocity timeout!");
        }
    }
}
