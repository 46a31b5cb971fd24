use crate::{DisplayRotator, Rotation};
use anyhow::{bail, Context, Result};
use autorotate_sensor::Orientation;
use std::process::Command;
use tracing::{info, warn};

/// Placeholder in a rotate command replaced by the rotation name.
pub const ROTATION_PLACEHOLDER: &str = "{rotation}";

/// Rotator that only logs what it would do.
#[derive(Debug, Default)]
pub struct LoggingRotator;

impl DisplayRotator for LoggingRotator {
    fn apply(&mut self, rotation: Rotation) -> Result<()> {
        info!(%rotation, degrees = rotation.degrees(), "Display rotated (log only)");
        Ok(())
    }
}

/// Rotator that runs an external command, e.g. `xrandr -o {rotation}`.
#[derive(Debug, Clone)]
pub struct CommandRotator {
    program: String,
    args: Vec<String>,
}

impl CommandRotator {
    /// Split a whitespace-separated command template.
    pub fn from_template(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Rotate command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Arguments with the placeholder filled in for `rotation`.
    pub fn args_for(&self, rotation: Rotation) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(ROTATION_PLACEHOLDER, rotation.as_str()))
            .collect()
    }
}

impl DisplayRotator for CommandRotator {
    fn apply(&mut self, rotation: Rotation) -> Result<()> {
        let args = self.args_for(rotation);
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .with_context(|| format!("Failed to run rotate command '{}'", self.program))?;

        if !status.success() {
            bail!("Rotate command '{}' exited with {status}", self.program);
        }

        info!(%rotation, program = %self.program, ?args, "Display rotated");
        Ok(())
    }
}

/// Turns orientation notifications into display rotations.
///
/// Repeats of the rotation already on screen are skipped, and a failed
/// rotation is logged and retried on the next notification rather than
/// stopping the daemon.
pub struct RotationManager {
    rotator: Box<dyn DisplayRotator>,
    applied: Option<Rotation>,
}

impl RotationManager {
    pub fn new(rotator: Box<dyn DisplayRotator>) -> Self {
        Self {
            rotator,
            applied: None,
        }
    }

    /// The rotation most recently applied successfully.
    pub fn applied(&self) -> Option<Rotation> {
        self.applied
    }

    /// Rotate the display for `orientation`. Returns the rotation applied, if any.
    pub fn apply_orientation(&mut self, orientation: Orientation) -> Option<Rotation> {
        let rotation = Rotation::from_orientation(orientation)?;
        if self.applied == Some(rotation) {
            return None;
        }

        match self.rotator.apply(rotation) {
            Ok(()) => {
                self.applied = Some(rotation);
                Some(rotation)
            }
            Err(e) => {
                warn!(?e, %rotation, "Failed to rotate display");
                None
            }
        }
    }
}
