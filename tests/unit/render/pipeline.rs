use std::sync::Arc;

use super::*;
use crate::background::animator::{BackgroundAnimator, BreathingParams, FitMode};
use crate::encode::sink::InMemorySink;
use crate::foundation::core::{Canvas, Fps};

fn comp(duration: f64) -> Composition {
    let canvas = Canvas {
        width: 32,
        height: 18,
    };
    let mut img = image::RgbaImage::new(8, 8);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 30) as u8, (y * 30) as u8, 90, 255]);
    }
    let bg = BackgroundAnimator::from_rgba(
        img,
        canvas,
        FitMode::Stretch,
        BreathingParams {
            amplitude: 0.1,
            frequency_hz: 0.5,
        },
    )
    .unwrap();
    Composition::new(
        canvas,
        Fps::new(12, 1).unwrap(),
        duration,
        Arc::new(bg),
        vec![],
        None,
    )
    .unwrap()
}

#[test]
fn sequential_pushes_every_frame_in_order() {
    let c = comp(1.0);
    let mut sink = InMemorySink::new();
    let stats = render_to_sink(&c, &mut sink, &RenderThreading::default()).unwrap();
    assert_eq!(stats.frames_total, 12);
    assert!(sink.is_ended());
    let cfg = sink.config().unwrap();
    assert_eq!((cfg.width, cfg.height), (32, 18));
    assert!(cfg.audio.is_none());
    let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, (0..12).collect::<Vec<_>>());
}

#[test]
fn parallel_matches_sequential() {
    let c = comp(1.0);
    let mut seq = InMemorySink::new();
    render_to_sink(&c, &mut seq, &RenderThreading::default()).unwrap();

    let mut par = InMemorySink::new();
    let threading = RenderThreading {
        parallel: true,
        chunk_size: 5,
        threads: Some(3),
    };
    let stats = render_to_sink(&c, &mut par, &threading).unwrap();
    assert_eq!(stats.frames_total, 12);
    assert_eq!(stats.chunks, 3);
    assert_eq!(seq.frames(), par.frames());
}

#[test]
fn breathing_changes_frames_over_time() {
    let c = comp(1.0);
    let mut sink = InMemorySink::new();
    render_to_sink(&c, &mut sink, &RenderThreading::default()).unwrap();
    let frames = sink.frames();
    assert_ne!(frames[0].1, frames[3].1);
}

#[test]
fn zero_threads_is_rejected() {
    assert!(build_thread_pool(Some(0)).is_err());
    assert!(build_thread_pool(Some(1)).is_ok());
}

struct FailingSink {
    fail_at: u64,
    ended: bool,
}

impl FrameSink for FailingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> ReelResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &FrameRGBA) -> ReelResult<()> {
        if idx.0 == self.fail_at {
            return Err(ReelError::media("disk full"));
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        self.ended = true;
        Ok(())
    }
}

#[test]
fn sink_errors_propagate_and_sink_is_ended() {
    let c = comp(1.0);
    let mut sink = FailingSink {
        fail_at: 4,
        ended: false,
    };
    let err = render_to_sink(&c, &mut sink, &RenderThreading::default()).unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert!(sink.ended);
}
