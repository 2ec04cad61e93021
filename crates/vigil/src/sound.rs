//! Audible alerts. Playing a sound is best-effort: failures are logged by
//! the caller and never interrupt alert handling.

use std::fmt::Debug;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("Sound playback was blocked: {0}")]
    Blocked(String),

    #[error("No audio output available")]
    Unavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait AlertSound: Send + Sync + Debug {
    fn play(&self) -> Result<(), SoundError>;
}

/// Rings the terminal bell on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play(&self) -> Result<(), SoundError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// Discards every request
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl AlertSound for Silent {
    fn play(&self) -> Result<(), SoundError> {
        Ok(())
    }
}
