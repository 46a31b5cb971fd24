use anyhow::Result;
use autorotate_config::{AppConfig, DisplayConfig, SensorBackend, SensorConfig};
use autorotate_display::manager::{CommandRotator, LoggingRotator, RotationManager};
use autorotate_display::DisplayRotator;
use autorotate_sensor::iio::{IioReader, IioSource};
use autorotate_sensor::source::{ScriptedReader, ScriptedSource};
use autorotate_sensor::{Capability, DeviceEvent, DeviceHandle, OrientationService, Vector3};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Rotate the display to follow the device's accelerometer.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (default: ~/.config/autorotate/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay canned accelerometer readings instead of using hardware.
    #[arg(long)]
    mock: bool,

    /// Start with rotation locked, overriding the config.
    #[arg(long, conflicts_with = "unlock")]
    lock: bool,

    /// Start with rotation unlocked, overriding the config.
    #[arg(long)]
    unlock: bool,

    /// Write the effective lock setting back to the config file.
    #[arg(long)]
    save: bool,
}

impl Args {
    fn lock_override(&self) -> Option<bool> {
        match (self.lock, self.unlock) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn build_rotator(display: &DisplayConfig) -> Box<dyn DisplayRotator> {
    match display.rotate_command.as_deref() {
        Some(template) => match CommandRotator::from_template(template) {
            Ok(rotator) => Box::new(rotator),
            Err(e) => {
                warn!(?e, "Invalid rotate command, only logging rotations");
                Box::new(LoggingRotator)
            }
        },
        None => Box::new(LoggingRotator),
    }
}

/// One accelerometer turned through every orientation.
fn demo_script() -> (ScriptedSource, ScriptedReader) {
    let handle = DeviceHandle::new("/dev/iio:device0", 0);
    let readings = [
        Vector3::new(60, 960, 18),
        Vector3::new(936, 162, 180),
        Vector3::new(72, -990, -162),
        Vector3::new(-954, -90, -36),
    ];

    let mut events = vec![DeviceEvent::Appeared {
        handle: handle.clone(),
        capabilities: vec![Capability::Accelerometer],
    }];
    events.extend(readings.iter().map(|_| DeviceEvent::DataChanged(handle.clone())));

    let reader = ScriptedReader::new().with_vectors(&handle, &readings);
    (ScriptedSource::new(events), reader)
}

fn spawn_service(sensor: &SensorConfig, enabled: bool) -> Result<OrientationService> {
    let service = match sensor.backend {
        SensorBackend::Iio => {
            let interval = Duration::from_millis(sensor.poll_interval_ms);
            OrientationService::spawn(
                IioSource::new(&sensor.sysfs_root, interval),
                IioReader::new(&sensor.sysfs_root),
                enabled,
            )?
        }
        SensorBackend::Scripted => {
            let (source, reader) = demo_script();
            OrientationService::spawn(source, reader, enabled)?
        }
    };
    Ok(service)
}

/// Config reload trigger (SIGHUP on unix).
struct ReloadSignal {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            hangup: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        self.hangup.recv().await;
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autorotate=info,autorotate_sensor=info,autorotate_display=info,autorotate_config=info"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();
    info!("autorotate starting");

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => autorotate_config::config_path()?,
    };

    let mut config = autorotate_config::load_config_from(&config_path).unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    let lock_override = args.lock_override();
    let locked = lock_override.unwrap_or(config.rotation_lock);
    if args.save {
        config.rotation_lock = locked;
        if let Err(e) = autorotate_config::save_config_to(&config_path, &config) {
            warn!(?e, "Failed to save config");
        }
    }
    if args.mock {
        config.sensor.backend = SensorBackend::Scripted;
    }
    info!(backend = ?config.sensor.backend, locked, "Config loaded");

    let mut rotations = RotationManager::new(build_rotator(&config.display));
    let mut service = spawn_service(&config.sensor, !locked)?;
    let mut reload = ReloadSignal::new()?;

    loop {
        tokio::select! {
            change = service.next_change() => match change {
                Some(orientation) => {
                    rotations.apply_orientation(orientation);
                }
                None => {
                    warn!("Orientation service stopped");
                    break;
                }
            },
            _ = reload.recv() => {
                match autorotate_config::load_config_from(&config_path) {
                    Ok(reloaded) => {
                        let locked = lock_override.unwrap_or(reloaded.rotation_lock);
                        info!(locked, current = %service.current(), "Config reloaded");
                        service.set_enabled(!locked);
                    }
                    Err(e) => warn!(?e, "Failed to reload config"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    service.shutdown().await;
    info!(rotation = ?rotations.applied(), "autorotate stopped");
    Ok(())
}
