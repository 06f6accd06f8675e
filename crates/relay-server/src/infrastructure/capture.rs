//! The capture thread: drives a [`FrameSource`] into the relay service.
//!
//! Frame sources block, so the loop runs on Tokio's blocking pool.  Each
//! frame goes through [`RelayService::process_frame_with_retry`]; an
//! exhausted retry budget stops the source and surfaces as the task's
//! result.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use image::RgbImage;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::application::{CaptureError, FrameSource, RelayService, RetryPolicy};

/// Starts capturing on a blocking thread.
///
/// The returned handle resolves when the source stops: `Ok` for a normal stop
/// (shutdown or exhausted source), `Err` for a fatal pipeline or source error.
pub fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    service: Arc<RelayService>,
    policy: RetryPolicy,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<(), CaptureError>> {
    tokio::task::spawn_blocking(move || {
        info!("capture started from '{}' source", source.name());

        let mut on_frame = |frame: RgbImage| {
            service
                .process_frame_with_retry(&frame, &policy)
                .map(|_| ())
        };
        let result = source.run(&mut on_frame, &running);

        match &result {
            Ok(()) => info!("capture stopped"),
            Err(e) => error!("capture failed: {e}"),
        }
        result
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{FrameSink, Outbound, ViewerNotifier};
    use crate::infrastructure::frame_source::SyntheticFrameSource;
    use crate::infrastructure::input_sink::RecordingInputSink;
    use relay_core::{ConnectionHandle, Viewport};
    use std::time::Duration;

    struct NullNotifier;

    impl ViewerNotifier for NullNotifier {
        fn notify(&self, _to: ConnectionHandle, _message: Outbound) {}
    }

    /// Produces `count` empty frames, then one real frame.
    struct GlitchySource {
        count: usize,
    }

    impl FrameSource for GlitchySource {
        fn name(&self) -> &str {
            "glitchy"
        }

        fn run(&mut self, on_frame: &mut FrameSink<'_>, _running: &AtomicBool) -> Result<(), CaptureError> {
            for _ in 0..self.count {
                on_frame(RgbImage::new(0, 0))?;
            }
            on_frame(RgbImage::new(90, 200))
        }
    }

    /// Fails on its own without producing a frame.
    struct FailingSource;

    impl FrameSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&mut self, _on_frame: &mut FrameSink<'_>, _running: &AtomicBool) -> Result<(), CaptureError> {
            Err(CaptureError::Fatal {
                attempts: 3,
                last: "device gone".to_string(),
            })
        }
    }

    fn service() -> Arc<RelayService> {
        Arc::new(RelayService::new(
            "s3cret",
            Arc::new(NullNotifier),
            Arc::new(RecordingInputSink::new()),
        ))
    }

    #[tokio::test]
    async fn test_capture_updates_device_geometry() {
        // Arrange
        let service = service();
        let source = SyntheticFrameSource::new(90, 200, 1000)
            .unpaced()
            .with_frame_limit(3);

        // Act
        let result = spawn_capture(
            Box::new(source),
            Arc::clone(&service),
            RetryPolicy::default(),
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result, Ok(()));
        assert_eq!(service.device_screen().await, Viewport::new(90, 200));
    }

    #[tokio::test]
    async fn test_empty_frames_do_not_stop_capture() {
        // Arrange: more empty frames than the retry budget allows attempts
        let service = service();
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::ZERO,
        };

        // Act
        let result = spawn_capture(
            Box::new(GlitchySource { count: 20 }),
            Arc::clone(&service),
            policy,
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        // Assert: the real frame after them was still processed
        assert_eq!(result, Ok(()));
        assert_eq!(service.device_screen().await, Viewport::new(90, 200));
    }

    #[tokio::test]
    async fn test_source_failure_ends_capture_with_its_error() {
        let result = spawn_capture(
            Box::new(FailingSource),
            service(),
            RetryPolicy::default(),
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(CaptureError::Fatal { attempts: 3, .. })));
    }
}
