//! Simulation configuration and validation (ambient concern; not a spec
//! module but required by every backend constructor).

use crate::error::SimError;

/// Grid dimensions and per-frame pass count. Both backends take the same
/// config so swapping one for the other never changes simulation
/// semantics, only where the work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub width: u32,
    pub height: u32,
    /// Number of Margolus passes per simulated frame. Must be a multiple
    /// of 4 (spec §4.7): one full sweep of the four block-offset phases,
    /// repeated `passes_per_frame / 4` times.
    pub passes_per_frame: u32,
}

impl SimConfig {
    pub const fn new(width: u32, height: u32, passes_per_frame: u32) -> SimConfig {
        SimConfig { width, height, passes_per_frame }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.width < 2 || self.height < 2 {
            return Err(SimError::InvalidConfig(format!(
                "grid must be at least 2x2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.passes_per_frame == 0 || self.passes_per_frame % 4 != 0 {
            return Err(SimError::InvalidConfig(format!(
                "passes_per_frame must be a positive multiple of 4, got {}",
                self.passes_per_frame
            )));
        }
        Ok(())
    }

    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig::new(512, 512, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SimConfig::default().validate().is_ok());
    }

    /// §4.7 explicitly handles odd width/height by copying the trailing
    /// row/column each offset's tiling leaves orphaned, so odd dimensions
    /// must validate -- this is what makes the S6 3x3-grid scenario
    /// reachable through the normal `Simulation::new` constructor.
    #[test]
    fn odd_dimensions_are_accepted() {
        assert!(SimConfig::new(3, 4, 4).validate().is_ok());
        assert!(SimConfig::new(3, 3, 4).validate().is_ok());
    }

    #[test]
    fn dimensions_below_two_are_rejected() {
        assert!(SimConfig::new(1, 4, 4).validate().is_err());
        assert!(SimConfig::new(4, 0, 4).validate().is_err());
    }

    #[test]
    fn passes_not_multiple_of_four_rejected() {
        assert!(SimConfig::new(4, 4, 5).validate().is_err());
        assert!(SimConfig::new(4, 4, 0).validate().is_err());
        assert!(SimConfig::new(4, 4, 8).validate().is_ok());
    }
}
