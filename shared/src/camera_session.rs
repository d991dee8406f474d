//! Bookkeeping for the single camera stream the core may hold.
//!
//! This module never talks to hardware. It decides which acquire/release requests the app
//! must send and which shell responses are stale, so that at most one stream is ever live.

use std::mem;

use tracing::debug;

use crate::capabilities::{
    AcquireTicket, CameraError, CameraFacing, StreamId, StreamInfo, StreamRequest,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSession {
    pub stream: StreamId,
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
}

impl From<StreamInfo> for CameraSession {
    fn from(info: StreamInfo) -> Self {
        Self {
            stream: info.stream,
            facing: info.facing,
            width: info.width,
            height: info.height,
        }
    }
}

/// Work for the camera capability, in the order it must be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Acquire {
        ticket: AcquireTicket,
        request: StreamRequest,
    },
    Release {
        stream: StreamId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The stream answers the current request and is now the live session.
    Live(CameraSession),
    /// The current request failed; nothing is live.
    Failed(CameraError),
    /// The response belongs to a request that was abandoned. A stream that was opened for it
    /// anyway must be released right away.
    Stale { release: Option<SessionCommand> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Slot {
    #[default]
    Empty,
    Acquiring {
        ticket: AcquireTicket,
        facing: CameraFacing,
    },
    Live(CameraSession),
}

#[derive(Debug, Default)]
pub struct CameraSessions {
    slot: Slot,
    next_ticket: u64,
}

impl CameraSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release whatever is held, then request a stream for `request.facing`.
    pub fn acquire(&mut self, request: StreamRequest) -> Vec<SessionCommand> {
        let mut commands = self.release();

        self.next_ticket += 1;
        let ticket = AcquireTicket(self.next_ticket);
        self.slot = Slot::Acquiring {
            ticket,
            facing: request.facing,
        };

        commands.push(SessionCommand::Acquire { ticket, request });
        commands
    }

    /// Idempotent. A pending acquire is abandoned: its stream, if one arrives, is stale.
    pub fn release(&mut self) -> Vec<SessionCommand> {
        match mem::take(&mut self.slot) {
            Slot::Live(session) => vec![SessionCommand::Release {
                stream: session.stream,
            }],
            Slot::Acquiring { ticket, .. } => {
                debug!(%ticket, "abandoning pending camera acquire");
                Vec::new()
            }
            Slot::Empty => Vec::new(),
        }
    }

    pub fn on_acquired(
        &mut self,
        ticket: AcquireTicket,
        result: Result<StreamInfo, CameraError>,
    ) -> AcquireOutcome {
        let current = matches!(self.slot, Slot::Acquiring { ticket: t, .. } if t == ticket);

        if !current {
            debug!(%ticket, ok = result.is_ok(), "stale camera acquire response");
            return AcquireOutcome::Stale {
                release: result
                    .ok()
                    .map(|info| SessionCommand::Release { stream: info.stream }),
            };
        }

        match result {
            Ok(info) => {
                let session = CameraSession::from(info);
                self.slot = Slot::Live(session.clone());
                AcquireOutcome::Live(session)
            }
            Err(error) => {
                self.slot = Slot::Empty;
                AcquireOutcome::Failed(error)
            }
        }
    }

    pub fn live(&self) -> Option<&CameraSession> {
        match &self.slot {
            Slot::Live(session) => Some(session),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<(AcquireTicket, CameraFacing)> {
        match self.slot {
            Slot::Acquiring { ticket, facing } => Some((ticket, facing)),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.slot == Slot::Empty
    }
}
