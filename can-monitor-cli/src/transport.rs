//! Bus transport
//!
//! The ingestion loop only needs "block until the next frame arrives". The
//! [`Transport`] trait is that seam; [`SocketCanTransport`] implements it on
//! Linux with the `socketcan` crate.

use anyhow::Context;
use can_monitor_decoder::CanFrame;

/// Errors raised by a bus transport. All of them end the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open CAN channel '{channel}': {source}")]
    Open {
        channel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read from CAN channel '{channel}': {source}")]
    Read {
        channel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CAN channel '{0}' went bus-off")]
    BusOff(String),

    #[error("Transport closed")]
    Closed,

    #[error("SocketCAN is not available on this platform")]
    Unsupported,
}

/// Open the configured channel for monitoring
pub fn open_channel(name: &str, fd: bool) -> anyhow::Result<SocketCanTransport> {
    SocketCanTransport::open(name, fd)
        .with_context(|| format!("Cannot monitor CAN channel {}", name))
}

/// A source of received frames
pub trait Transport: Send {
    /// Block until the next frame is received
    fn receive(&mut self) -> Result<CanFrame, TransportError>;
}

#[cfg(target_os = "linux")]
pub use socketcan_transport::SocketCanTransport;

#[cfg(target_os = "linux")]
mod socketcan_transport {
    use super::{Transport, TransportError};
    use can_monitor_decoder::CanFrame;
    use socketcan::{
        CanAnyFrame, CanError, CanFdSocket, CanFrame as SocketFrame, CanSocket, EmbeddedFrame,
        Id, Socket,
    };

    enum Channel {
        Classic(CanSocket),
        Fd(CanFdSocket),
    }

    /// SocketCAN raw socket bound to one interface (e.g. `can0`, `vcan0`)
    pub struct SocketCanTransport {
        name: String,
        channel: Channel,
    }

    impl SocketCanTransport {
        /// Open a raw socket; `fd` also accepts CAN FD frames (up to 64 bytes)
        pub fn open(name: &str, fd: bool) -> Result<Self, TransportError> {
            let open_error = |source| TransportError::Open {
                channel: name.to_string(),
                source,
            };

            let channel = if fd {
                Channel::Fd(CanFdSocket::open(name).map_err(open_error)?)
            } else {
                Channel::Classic(CanSocket::open(name).map_err(open_error)?)
            };

            log::info!("Opened CAN channel {} ({})", name, if fd { "FD" } else { "classic" });

            Ok(Self {
                name: name.to_string(),
                channel,
            })
        }

        fn read_error(&self, source: std::io::Error) -> TransportError {
            TransportError::Read {
                channel: self.name.clone(),
                source,
            }
        }
    }

    fn raw_id(id: Id) -> (u32, bool) {
        match id {
            Id::Standard(id) => (id.as_raw() as u32, false),
            Id::Extended(id) => (id.as_raw(), true),
        }
    }

    fn data_frame<F: EmbeddedFrame>(frame: &F, is_fd: bool) -> CanFrame {
        let (can_id, is_extended) = raw_id(frame.id());
        CanFrame {
            can_id,
            is_extended,
            dlc: frame.data().len() as u8,
            data: frame.data().to_vec(),
            is_fd,
            is_remote_frame: false,
        }
    }

    fn remote_frame<F: EmbeddedFrame>(frame: &F) -> CanFrame {
        let (can_id, is_extended) = raw_id(frame.id());
        CanFrame {
            can_id,
            is_extended,
            dlc: frame.dlc() as u8,
            data: Vec::new(),
            is_fd: false,
            is_remote_frame: true,
        }
    }

    impl SocketCanTransport {
        /// Map an error frame: bus-off is fatal, anything else is skipped
        fn error_frame(&self, error: CanError) -> Option<TransportError> {
            match error {
                CanError::BusOff => Some(TransportError::BusOff(self.name.clone())),
                other => {
                    log::debug!("Error frame on {}: {}", self.name, other);
                    None
                }
            }
        }
    }

    impl Transport for SocketCanTransport {
        fn receive(&mut self) -> Result<CanFrame, TransportError> {
            loop {
                let received = match &self.channel {
                    Channel::Classic(socket) => socket.read_frame().map(|frame| match frame {
                        SocketFrame::Data(frame) => Ok(data_frame(&frame, false)),
                        SocketFrame::Remote(frame) => Ok(remote_frame(&frame)),
                        SocketFrame::Error(frame) => Err(CanError::from(frame)),
                    }),
                    Channel::Fd(socket) => socket.read_frame().map(|frame| match frame {
                        CanAnyFrame::Normal(frame) => Ok(data_frame(&frame, false)),
                        CanAnyFrame::Fd(frame) => Ok(data_frame(&frame, true)),
                        CanAnyFrame::Remote(frame) => Ok(remote_frame(&frame)),
                        CanAnyFrame::Error(frame) => Err(CanError::from(frame)),
                    }),
                };

                match received {
                    Ok(Ok(frame)) => return Ok(frame),
                    Ok(Err(error)) => {
                        if let Some(fatal) = self.error_frame(error) {
                            return Err(fatal);
                        }
                    }
                    Err(e) => return Err(self.read_error(e)),
                }
            }
        }
    }
}

/// Placeholder so the binary still builds off Linux; opening always fails
#[cfg(not(target_os = "linux"))]
pub struct SocketCanTransport;

#[cfg(not(target_os = "linux"))]
impl SocketCanTransport {
    pub fn open(_name: &str, _fd: bool) -> Result<Self, TransportError> {
        Err(TransportError::Unsupported)
    }
}

#[cfg(not(target_os = "linux"))]
impl Transport for SocketCanTransport {
    fn receive(&mut self) -> Result<CanFrame, TransportError> {
        Err(TransportError::Unsupported)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted transport for tests

    use super::{Transport, TransportError};
    use can_monitor_decoder::CanFrame;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed list of frames, then reports `Closed`
    pub struct ScriptedTransport {
        frames: VecDeque<CanFrame>,
        pub calls: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        pub fn new(frames: Vec<CanFrame>) -> Self {
            Self {
                frames: frames.into(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn receive(&mut self) -> Result<CanFrame, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.frames.pop_front().ok_or(TransportError::Closed)
        }
    }

    /// Yields the same frame forever, counting calls
    pub struct EndlessTransport {
        frame: CanFrame,
        pub calls: Arc<AtomicUsize>,
    }

    impl EndlessTransport {
        pub fn new(frame: CanFrame) -> Self {
            Self {
                frame,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Transport for EndlessTransport {
        fn receive(&mut self) -> Result<CanFrame, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(self.frame.clone())
        }
    }
}
