//! Frame source abstraction consumed by the playback scheduler. Exhaustion
//! is data (`Ok(None)`), never an error or a control-flow signal.

use std::path::Path;

use anyhow::Result;
use mocap_formats::C3dFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source reports nonpositive frame rate {0}")]
    BadFrameRate(f32),
}

/// One marker sample within a frame. Confidence is carried through for
/// exporters and diagnostics; the rendering core only consumes the position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSample {
    pub position: [f32; 3],
    pub confidence: f32,
}

/// One time-sampled snapshot of every marker plus the analog block.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub points: Vec<MarkerSample>,
    pub analog: Vec<f32>,
}

pub trait FrameSource {
    /// Frames per second; always positive.
    fn frame_rate(&self) -> f32;

    fn num_markers(&self) -> usize;

    /// Pull the next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frame source backed by a memory-mapped C3D file.
pub struct C3dSource {
    file: C3dFile,
}

impl C3dSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = C3dFile::open(path)?;
        let rate = file.header().frame_rate;
        if rate <= 0.0 {
            return Err(SourceError::BadFrameRate(rate).into());
        }
        Ok(Self { file })
    }

    pub fn frame_count(&self) -> usize {
        self.file.frame_count()
    }
}

impl FrameSource for C3dSource {
    fn frame_rate(&self) -> f32 {
        self.file.header().frame_rate
    }

    fn num_markers(&self) -> usize {
        self.file.header().point_count as usize
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(raw) = self.file.next_frame()? else {
            return Ok(None);
        };
        let points = raw
            .points
            .iter()
            .map(|point| MarkerSample {
                position: point.position(),
                confidence: point.residual,
            })
            .collect();
        Ok(Some(Frame {
            points,
            analog: raw.analog,
        }))
    }
}
