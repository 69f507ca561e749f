//! Per-frame render context shared with the frame hooks.

/// Composition-level video parameters exposed through `useVideoConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Total composition length in frames.
    pub duration_in_frames: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30.0,
            duration_in_frames: 150,
        }
    }
}

/// Context for one frame render, consumed by `useCurrentFrame` and
/// `useVideoConfig`. Absent during top-level evaluation, where the hooks
/// are an error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameContext {
    pub(crate) frame: u32,
    pub(crate) config: VideoConfig,
}
