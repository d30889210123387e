//! Native voice client
//!
//! Adapters that connect the turn controller to the terminal, the
//! microphone, the speakers and the relay backend.

pub mod console;
mod http;
mod mic;
mod speaker;

pub use console::{
    ConsoleCapture, ConsoleLine, parse_line, print_snapshots, read_commands,
    spawn_stdin_reader,
};
pub use http::HttpReplyFetcher;
pub use mic::{ListenLimits, MAX_LISTEN, MicCapture, listen_once};
pub use speaker::{MutedOutput, SpeakerOutput};
