#![cfg_attr(not(any(test, feature = "std")), no_std)]

// 9600 baud, 1 start bit, no parity, 1 stop bit, no flow control.

mod command;
mod coordinator;
mod device;
mod error;
mod error_code;
mod frame;
mod hooks;
mod opcode;
mod queue;
mod state;
mod transport;

pub use command::{Command, EqProfile};
pub use coordinator::Coordinator;
pub use device::{DeviceChange, DeviceSet, PROBE_ORDER};
pub use error::Error;
pub use error_code::ErrorCode;
pub use frame::{Decoded, Decoder, Frame};
pub use hooks::{Hooks, NullHooks, Parameter};
pub use queue::{CommandQueue, QueueEntry};
pub use state::{State, StateFlags};
pub use transport::Transport;

pub type Result<T> = core::result::Result<T, Error>;
