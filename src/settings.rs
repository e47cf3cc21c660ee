use anyhow::{Context, bail};
use config::{Config, Environment, File, FileFormat};
use rover_navigation::{
    ControllerConfig, DEFAULT_ESCAPE_RADIUS, Pose, StepPolicy, WallRect, WorldPoint,
};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub map: MapSettings,
    #[serde(default)]
    pub walls: Vec<WallRect>,
    pub start: Pose,
    pub goal: WorldPoint,
    #[serde(default)]
    pub rrt: PlannerSettings,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub sim: SimSettings,
    #[serde(default)]
    pub lidar: LidarSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSettings {
    pub rows: usize,
    pub cols: usize,
    pub resolution: f64,
    pub origin: WorldPoint,
    /// Obstacles are inflated by this margin before planning (m).
    pub robot_radius: f64,
    /// Seed the planning map with the wall list. Otherwise the map starts empty
    /// and is filled from lidar scans only.
    #[serde(default = "default_true")]
    pub walls_known: bool,
}

/// Planner parameters. Sampling bounds come from the map extent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub expand_distance: f64,
    pub max_iterations: usize,
    pub step_policy: StepPolicy,
    pub seed: Option<u64>,
    /// Search distance for a free start cell when the robot is inside an
    /// inflated obstacle (m).
    pub escape_radius: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            expand_distance: 0.5,
            max_iterations: 500,
            step_policy: StepPolicy::Fixed,
            seed: None,
            escape_radius: DEFAULT_ESCAPE_RADIUS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Physics integration step (s).
    pub dt: f64,
    /// Navigation loop period (ms).
    pub nav_period_ms: u64,
    /// Wait before the first plan (s).
    pub planning_delay_secs: f64,
    /// Stop after this many navigation ticks.
    pub max_ticks: u64,
    /// Raise a fault when no command arrives for this long (ms).
    pub cmd_timeout_ms: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            dt: 0.01,
            nav_period_ms: 50,
            planning_delay_secs: 1.0,
            max_ticks: 6000,
            cmd_timeout_ms: 250,
        }
    }
}

impl SimSettings {
    pub fn planning_delay_ticks(&self) -> u64 {
        (self.planning_delay_secs * 1000.0 / self.nav_period_ms as f64).ceil() as u64
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LidarSettings {
    pub enabled: bool,
    pub beams: usize,
    /// Total field of view, centered on the heading (deg).
    pub fov_deg: f64,
    pub max_range: f64,
    /// Publish one scan every this many physics steps.
    pub every_steps: u32,
}

impl Default for LidarSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            beams: 241,
            fov_deg: 240.0,
            max_range: 5.0,
            every_steps: 10,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        if !(self.map.robot_radius.is_finite() && self.map.robot_radius >= 0.0) {
            bail!("map.robot_radius must be non-negative");
        }
        if !(self.sim.dt.is_finite() && self.sim.dt > 0.0) {
            bail!("sim.dt must be positive");
        }
        if self.sim.nav_period_ms == 0 || self.sim.cmd_timeout_ms == 0 {
            bail!("sim.nav_period_ms and sim.cmd_timeout_ms must be non-zero");
        }
        if !(self.sim.planning_delay_secs.is_finite() && self.sim.planning_delay_secs >= 0.0) {
            bail!("sim.planning_delay_secs must be non-negative");
        }
        if self.lidar.enabled {
            if self.lidar.beams == 0 || self.lidar.every_steps == 0 {
                bail!("lidar.beams and lidar.every_steps must be non-zero");
            }
            if !(self.lidar.max_range.is_finite() && self.lidar.max_range > 0.0) {
                bail!("lidar.max_range must be positive");
            }
        }
        Ok(())
    }
}

/// Loads settings from `path` (or the default file), then applies `ROVER__`
/// environment overrides, e.g. `ROVER__SIM__MAX_TICKS=100`.
pub fn load_settings(path: Option<&str>) -> anyhow::Result<Settings> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    info!("Attempting to load configuration from {}", path);

    let settings: Settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("ROVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {path}"))?
        .try_deserialize()
        .context("invalid configuration")?;

    settings.validate()?;
    info!(
        walls = settings.walls.len(),
        start = %settings.start,
        goal = %settings.goal,
        "Successfully loaded configuration"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        start = { x = 0.0, y = 0.0, theta = 0.0 }
        goal = { x = 1.0, y = 1.0 }

        [map]
        rows = 10
        cols = 10
        resolution = 0.1
        origin = { x = 0.0, y = 0.0 }
        robot_radius = 0.1
    "#;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let s = parse(MINIMAL);
        assert!(s.map.walls_known);
        assert!(s.walls.is_empty());
        assert_eq!(s.rrt.max_iterations, 500);
        assert_eq!(s.rrt.escape_radius, DEFAULT_ESCAPE_RADIUS);
        assert_eq!(s.controller, ControllerConfig::default());
        assert_eq!(s.sim.planning_delay_ticks(), 20);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_nested_sections() {
        let toml = format!(
            "{MINIMAL}
            [rrt]
            step_policy = \"clamp_to_sample\"
            seed = 3

            [controller]
            max_speed = 0.2
            idle_behavior = {{ mode = \"stop\" }}

            [[walls]]
            center = {{ x = 0.5, y = 0.5 }}
            length = 1.0
            width = 0.1
            "
        );
        let s = parse(&toml);
        assert_eq!(s.rrt.step_policy, StepPolicy::ClampToSample);
        assert_eq!(s.rrt.seed, Some(3));
        assert_eq!(s.controller.max_speed, 0.2);
        assert_eq!(s.controller.kp_yaw, 0.5);
        assert_eq!(
            s.controller.idle_behavior,
            rover_navigation::IdleBehavior::Stop
        );
        assert_eq!(s.walls.len(), 1);
        assert_eq!(s.walls[0].yaw, 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_sim() {
        let mut s = parse(MINIMAL);
        s.sim.dt = 0.0;
        assert!(s.validate().is_err());

        let mut s = parse(MINIMAL);
        s.lidar.beams = 0;
        assert!(s.validate().is_err());
        s.lidar.enabled = false;
        assert!(s.validate().is_ok());
    }
}
