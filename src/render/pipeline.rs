use rayon::prelude::*;

use crate::encode::sink::{AudioInput, FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::compositor::{Composition, FrameCompositor};
use crate::render::frame::FrameRGBA;

/// Frame-level parallelism inside one video.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderThreading {
    /// Render chunks of frames in parallel when `true`.
    pub parallel: bool,
    /// Frames per chunk; each chunk is rendered in parallel and then pushed in order.
    pub chunk_size: usize,
    /// Worker threads for the frame pool; rayon's default when `None`.
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Counters from one [`render_to_sink`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames pushed to the sink.
    pub frames_total: u64,
    /// Chunks scheduled (1 per frame when sequential).
    pub chunks: u64,
}

/// Render every frame of `comp` into `sink` in increasing order.
///
/// The sink is always ended when `begin` succeeded; a render error is returned in preference to an
/// error from `end`.
pub fn render_to_sink(
    comp: &Composition,
    sink: &mut dyn FrameSink,
    threading: &RenderThreading,
) -> ReelResult<RenderStats> {
    let total = comp.duration_frames();
    sink.begin(SinkConfig {
        width: comp.canvas.width,
        height: comp.canvas.height,
        fps: comp.fps,
        audio: comp.audio.as_ref().map(|a| AudioInput {
            path: a.path.clone(),
        }),
    })?;

    let rendered = if threading.parallel {
        render_parallel(comp, sink, threading)
    } else {
        render_sequential(comp, sink)
    };
    let ended = sink.end();

    let stats = rendered?;
    ended?;
    debug_assert_eq!(stats.frames_total, total);
    Ok(stats)
}

fn render_sequential(comp: &Composition, sink: &mut dyn FrameSink) -> ReelResult<RenderStats> {
    let mut compositor = FrameCompositor::new(comp.canvas)?;
    let total = comp.duration_frames();
    for f in 0..total {
        let frame = compositor.render_frame(comp, FrameIndex(f))?;
        sink.push_frame(FrameIndex(f), &frame)?;
    }
    Ok(RenderStats {
        frames_total: total,
        chunks: total,
    })
}

fn render_parallel(
    comp: &Composition,
    sink: &mut dyn FrameSink,
    threading: &RenderThreading,
) -> ReelResult<RenderStats> {
    let pool = build_thread_pool(threading.threads)?;
    let chunk_size = normalized_chunk_size(threading.chunk_size);
    let total = comp.duration_frames();
    let mut stats = RenderStats::default();

    let mut chunk_start = 0u64;
    while chunk_start < total {
        let chunk_end = (chunk_start + chunk_size).min(total);
        let frames = render_chunk_parallel(comp, chunk_start..chunk_end, &pool)?;
        for (offset, frame) in frames.iter().enumerate() {
            sink.push_frame(FrameIndex(chunk_start + offset as u64), frame)?;
        }
        stats.frames_total += chunk_end - chunk_start;
        stats.chunks += 1;
        chunk_start = chunk_end;
    }
    Ok(stats)
}

fn render_chunk_parallel(
    comp: &Composition,
    range: std::ops::Range<u64>,
    pool: &rayon::ThreadPool,
) -> ReelResult<Vec<FrameRGBA>> {
    let indices = range.collect::<Vec<_>>();
    let rendered = pool.install(|| {
        indices
            .par_iter()
            .map_init(
                || FrameCompositor::new(comp.canvas),
                |compositor, &f| -> ReelResult<FrameRGBA> {
                    match compositor {
                        Ok(c) => c.render_frame(comp, FrameIndex(f)),
                        Err(e) => Err(ReelError::render(format!(
                            "failed to create worker compositor: {e}"
                        ))),
                    }
                },
            )
            .collect::<Vec<_>>()
    });
    rendered.into_iter().collect()
}

pub(crate) fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::validation(
            "thread count must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::render(format!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    chunk_size.max(1) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/render/pipeline.rs"]
mod tests;
