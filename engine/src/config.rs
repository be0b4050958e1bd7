use std::time::Duration;

use crate::error::GolError;

/// How many turns a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnLimit {
    Bounded(u64),
    /// Run until a quit command or a collaborator failure.
    Unbounded,
}

impl TurnLimit {
    pub fn reached(self, turn: u64) -> bool {
        match self {
            TurnLimit::Bounded(limit) => turn >= limit,
            TurnLimit::Unbounded => false,
        }
    }
}

impl From<Option<u64>> for TurnLimit {
    fn from(turns: Option<u64>) -> Self {
        turns.map_or(TurnLimit::Unbounded, TurnLimit::Bounded)
    }
}

/// Run configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub turns: TurnLimit,
    pub threads: usize,
    pub image_width: usize,
    pub image_height: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            turns: TurnLimit::Unbounded,
            threads: 8,
            image_width: 512,
            image_height: 512,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), GolError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(GolError::Config(format!(
                "board must be at least 1x1, got {}x{}",
                self.image_width, self.image_height
            )));
        }
        if self.threads == 0 {
            return Err(GolError::Config("at least one worker is required".to_string()));
        }
        if self.threads > self.image_height {
            return Err(GolError::Config(format!(
                "{} workers cannot share {} rows",
                self.threads, self.image_height
            )));
        }
        Ok(())
    }

    /// Name of the initial image, e.g. `512x512`.
    pub fn input_filename(&self) -> String {
        format!("{}x{}", self.image_width, self.image_height)
    }

    /// Name of an image written after `turn` turns, e.g. `512x512x100`.
    pub fn output_filename(&self, turn: u64) -> String {
        format!("{}x{}x{}", self.image_width, self.image_height, turn)
    }
}

/// Knobs of the top-level run that are not part of the board itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    pub report_interval: Duration,
    pub write_final_image: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            report_interval: Duration::from_secs(2),
            write_final_image: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(threads: usize, width: usize, height: usize) -> Params {
        Params {
            turns: TurnLimit::Bounded(1),
            threads,
            image_width: width,
            image_height: height,
        }
    }

    #[test]
    fn validate_rejects_bad_boards() {
        assert!(params(1, 0, 4).validate().is_err());
        assert!(params(1, 4, 0).validate().is_err());
        assert!(params(0, 4, 4).validate().is_err());
        assert!(params(5, 16, 4).validate().is_err());
        assert!(params(4, 16, 4).validate().is_ok());
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn turn_limits() {
        assert!(TurnLimit::Bounded(0).reached(0));
        assert!(!TurnLimit::Bounded(3).reached(2));
        assert!(!TurnLimit::Unbounded.reached(u64::MAX));
        assert_eq!(TurnLimit::from(None), TurnLimit::Unbounded);
    }

    #[test]
    fn filenames() {
        let params = params(2, 64, 32);
        assert_eq!(params.input_filename(), "64x32");
        assert_eq!(params.output_filename(100), "64x32x100");
    }
}
