//! Simulated upload and identification.
//!
//! Progress climbs in fixed steps on a fixed interval until it reaches exactly 100, then a
//! processing delay runs and the placeholder identification comes back. Image content is
//! never looked at. Every timer of one attempt carries the attempt's `TimerId`; firings for
//! any other id are rejected as stale.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::capabilities::{TimerId, TimerOutput};
use crate::capture::CapturedImage;
use crate::config::SimulationConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("timer {actual} does not belong to the running attempt ({expected})")]
    StaleTimer { expected: TimerId, actual: TimerId },

    #[error("image buffer is empty")]
    EmptyImage,

    #[error("simulation already completed")]
    AlreadyCompleted,

    #[error("timer {0} was cancelled before the simulation finished")]
    TimerInterrupted(TimerId),
}

impl SimulationError {
    /// Stale timers are expected after a cancel or restart and carry no user-facing meaning.
    pub fn is_stale(&self) -> bool {
        matches!(self, SimulationError::StaleTimer { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identification {
    pub label: String,
    pub confidence_percent: u8,
}

impl Identification {
    pub fn placeholder(config: &SimulationConfig) -> Self {
        Self {
            label: config.label.clone(),
            confidence_percent: config.confidence_percent.min(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationPhase {
    Uploading,
    Processing,
    Completed,
}

/// What the caller must do after a timer fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationStep {
    /// Still uploading; schedule the next tick.
    Progress { progress: u8, next_in_ms: u64 },
    /// Progress hit 100; schedule the processing delay.
    EnterProcessing { delay_ms: u64 },
    Completed(Identification),
}

#[derive(Debug, Clone)]
pub struct Simulation {
    timer: TimerId,
    image: CapturedImage,
    config: SimulationConfig,
    progress: u8,
    phase: SimulationPhase,
}

impl Simulation {
    /// The caller starts the first tick timer (`tick_interval_ms`) with `timer`.
    pub fn start(
        timer: TimerId,
        image: CapturedImage,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        if image.is_empty() {
            return Err(SimulationError::EmptyImage);
        }

        info!(
            %timer,
            size_bytes = image.len(),
            mime_type = image.mime_type(),
            "simulated upload started"
        );
        Ok(Self {
            timer,
            image,
            config: config.validated(),
            progress: 0,
            phase: SimulationPhase::Uploading,
        })
    }

    pub fn on_timer(&mut self, output: TimerOutput) -> Result<SimulationStep, SimulationError> {
        let id = output.id();
        if id != self.timer {
            return Err(SimulationError::StaleTimer {
                expected: self.timer,
                actual: id,
            });
        }

        if self.phase == SimulationPhase::Completed {
            return Err(SimulationError::AlreadyCompleted);
        }

        if let TimerOutput::Cancelled { .. } = output {
            return Err(SimulationError::TimerInterrupted(id));
        }

        match self.phase {
            SimulationPhase::Uploading => {
                self.progress = self
                    .progress
                    .saturating_add(self.config.progress_step)
                    .min(100);

                if self.progress == 100 {
                    self.phase = SimulationPhase::Processing;
                    debug!(timer = %self.timer, "upload complete, processing");
                    Ok(SimulationStep::EnterProcessing {
                        delay_ms: self.config.processing_delay_ms,
                    })
                } else {
                    Ok(SimulationStep::Progress {
                        progress: self.progress,
                        next_in_ms: self.config.tick_interval_ms,
                    })
                }
            }
            SimulationPhase::Processing => {
                self.phase = SimulationPhase::Completed;
                let identification = Identification::placeholder(&self.config);
                info!(
                    timer = %self.timer,
                    label = %identification.label,
                    confidence = identification.confidence_percent,
                    "identification complete"
                );
                Ok(SimulationStep::Completed(identification))
            }
            SimulationPhase::Completed => Err(SimulationError::AlreadyCompleted),
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn timer_id(&self) -> TimerId {
        self.timer
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.config.tick_interval_ms
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    pub fn into_image(self) -> CapturedImage {
        self.image
    }
}
