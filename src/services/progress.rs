use rand::Rng;

/// Simulated progress never reaches 100 on its own; only a finished transfer does
pub const SIMULATED_PROGRESS_CAP: u8 = 99;

/// Produces the increment applied to an uploading task at each progress tick
pub trait ProgressStepper: Send + Sync + 'static {
    fn step(&self, current: u8) -> u8;
}

/// Deterministic stepper for tests and predictable displays
#[derive(Debug, Clone, Copy)]
pub struct FixedStepper(pub u8);

impl ProgressStepper for FixedStepper {
    fn step(&self, _current: u8) -> u8 {
        self.0
    }
}

/// Random positive step in `min..=max` percent
#[derive(Debug, Clone, Copy)]
pub struct RandomStepper {
    pub min: u8,
    pub max: u8,
}

impl Default for RandomStepper {
    fn default() -> Self {
        Self { min: 5, max: 20 }
    }
}

impl ProgressStepper for RandomStepper {
    fn step(&self, _current: u8) -> u8 {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Apply a step, keeping progress monotonic and below the cap
pub fn advance(current: u8, step: u8) -> u8 {
    current
        .saturating_add(step.max(1))
        .min(SIMULATED_PROGRESS_CAP)
        .max(current)
}
