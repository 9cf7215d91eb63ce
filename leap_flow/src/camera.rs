//! Simulated camera and the colour-marker detector that reads it.
//!
//! The camera paints the tracked pose as three coloured discs on a dark
//! background.  The detector finds each colour's centroid and reports a
//! 21-landmark hand built from the three points, so the whole acquisition
//! and detection pipeline runs exactly as it would on a real feed.

use std::task::Poll;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use hand_flow::{DetectionResult, Hand, Landmark};
use landmark_runner::{
    Detector, DetectorError, FrameSource, Image, ImageProcessingOptions, PendingReadback,
    RawImage, ReadbackError, ResultCallback, BYTES_PER_PIXEL,
};
use tracing::{debug, trace};

use crate::tracking::HandPose;

pub const THUMB_RGB:  [u8; 3] = [235, 64, 52];
pub const INDEX_RGB:  [u8; 3] = [64, 205, 90];
pub const LITTLE_RGB: [u8; 3] = [70, 120, 240];
const BACKGROUND_RGB: [u8; 3] = [22, 24, 34];

pub const MARKER_RADIUS: i32 = 3;

// ════════════════════════════════════════════════════════════════════════════
// SimCamera
// ════════════════════════════════════════════════════════════════════════════

pub struct SimCamera {
    width:  u32,
    height: u32,
    pixels: Vec<u8>,
    pose:   Option<HandPose>,
}

impl SimCamera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut cam = SimCamera {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            pose: None,
        };
        cam.paint();
        cam
    }

    pub fn pose(&self) -> Option<HandPose> { self.pose }
    pub fn pixels(&self) -> &[u8]          { &self.pixels }

    /// Show a new pose, or an empty scene for `None`.
    pub fn set_pose(&mut self, pose: Option<HandPose>) {
        self.pose = pose;
        self.paint();
    }

    fn paint(&mut self) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&[BACKGROUND_RGB[0], BACKGROUND_RGB[1], BACKGROUND_RGB[2], 255]);
        }
        if let Some(p) = self.pose {
            // thumb last so it stays visible when it overlaps a reference
            self.disc(p.index_dip, INDEX_RGB);
            self.disc(p.little_tip, LITTLE_RGB);
            self.disc(p.thumb, THUMB_RGB);
        }
    }

    fn disc(&mut self, (nx, ny): (f32, f32), rgb: [u8; 3]) {
        let cx = (nx * self.width as f32).round() as i32;
        let cy = (ny * self.height as f32).round() as i32;
        let r = MARKER_RADIUS;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r { continue; }
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 { continue; }
                let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
                self.pixels[i..i + 3].copy_from_slice(&rgb);
            }
        }
    }
}

/// Readback that is complete by the first poll.
struct ImmediateReadback(Option<Vec<u8>>);

impl PendingReadback for ImmediateReadback {
    fn poll(&mut self) -> Poll<Result<Vec<u8>, ReadbackError>> {
        match self.0.take() {
            Some(data) => Poll::Ready(Ok(data)),
            None => Poll::Ready(Err(ReadbackError::Failed("readback already consumed".into()))),
        }
    }
}

impl FrameSource for SimCamera {
    fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> RawImage<'_> {
        RawImage { width: self.width, height: self.height, pixels: &self.pixels }
    }

    fn request_readback(&mut self) -> Box<dyn PendingReadback> {
        Box::new(ImmediateReadback(Some(self.pixels.clone())))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Marker colour matching
// ════════════════════════════════════════════════════════════════════════════

/// Inclusive per-channel RGB window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub fn around(rgb: [u8; 3], tolerance: u8) -> Self {
        ColorRange {
            lower: rgb.map(|c| c.saturating_sub(tolerance)),
            upper: rgb.map(|c| c.saturating_add(tolerance)),
        }
    }

    pub fn in_range(&self, r: u8, g: u8, b: u8) -> bool {
        r >= self.lower[0] && r <= self.upper[0]
            && g >= self.lower[1] && g <= self.upper[1]
            && b >= self.lower[2] && b <= self.upper[2]
    }
}

/// Centroid of every pixel inside `range`, normalized; `None` if no pixel
/// matches.
fn centroid(pixels: &[u8], width: u32, range: &ColorRange) -> Option<(f32, f32)> {
    let (mut sx, mut sy, mut n) = (0u64, 0u64, 0u64);
    for (i, px) in pixels.chunks_exact(BYTES_PER_PIXEL).enumerate() {
        if range.in_range(px[0], px[1], px[2]) {
            sx += (i % width as usize) as u64;
            sy += (i / width as usize) as u64;
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    let height = pixels.len() / BYTES_PER_PIXEL / width as usize;
    Some((
        (sx as f32 / n as f32) / width as f32,
        (sy as f32 / n as f32) / height as f32,
    ))
}

/// Locate the three markers; `None` unless all three are visible.
pub fn locate_hand(image: &Image, tolerance: u8) -> Option<Hand> {
    let pixels = image.pixels()?;
    if image.width == 0 {
        return None;
    }
    let find = |rgb| centroid(pixels, image.width, &ColorRange::around(rgb, tolerance));
    let thumb  = find(THUMB_RGB)?;
    let index  = find(INDEX_RGB)?;
    let little = find(LITTLE_RGB)?;
    Some(Hand::with_key_points(
        Landmark::xy(thumb.0, thumb.1),
        Landmark::xy(index.0, index.1),
        Landmark::xy(little.0, little.1),
    ))
}

// ════════════════════════════════════════════════════════════════════════════
// MarkerDetector
// ════════════════════════════════════════════════════════════════════════════

struct Job {
    image:        Image,
    timestamp_ms: i64,
}

struct StreamWorker {
    jobs:   Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

/// [`Detector`] over the simulated camera.  In streaming mode detection runs
/// on a worker thread which reports through the registered callback.
pub struct MarkerDetector {
    tolerance: u8,
    worker:    Option<StreamWorker>,
}

impl MarkerDetector {
    pub const DEFAULT_TOLERANCE: u8 = 40;

    /// Synchronous detector for image and video modes.
    pub fn new() -> Self {
        MarkerDetector { tolerance: Self::DEFAULT_TOLERANCE, worker: None }
    }

    /// Live-stream detector; `callback` runs on the worker thread.
    pub fn streaming(mut callback: ResultCallback) -> Self {
        let tolerance = Self::DEFAULT_TOLERANCE;
        let (tx, rx) = unbounded::<Job>();
        let handle = thread::spawn(move || {
            for job in rx {
                let result = match locate_hand(&job.image, tolerance) {
                    Some(hand) => DetectionResult::single(hand),
                    None => DetectionResult::default(),
                };
                trace!(timestamp_ms = job.timestamp_ms, hands = result.hands.len(), "stream detection");
                callback(result, job.image, job.timestamp_ms);
            }
            debug!("marker detector worker finished");
        });
        MarkerDetector {
            tolerance,
            worker: Some(StreamWorker { jobs: Some(tx), handle: Some(handle) }),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MarkerDetector {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            // closing the queue ends the worker loop
            worker.jobs.take();
            if let Some(h) = worker.handle.take() {
                let _ = h.join();
            }
        }
    }
}

impl Detector for MarkerDetector {
    fn detect(
        &mut self,
        image: &Image,
        _timestamp_ms: Option<i64>,
        _options: &ImageProcessingOptions,
        out: &mut DetectionResult,
    ) -> bool {
        out.clear();
        match locate_hand(image, self.tolerance) {
            Some(hand) => {
                out.hands.push(hand);
                true
            }
            None => false,
        }
    }

    fn detect_async(
        &mut self,
        image: Image,
        timestamp_ms: i64,
        _options: &ImageProcessingOptions,
    ) -> Result<(), DetectorError> {
        let jobs = self
            .worker
            .as_ref()
            .and_then(|w| w.jobs.as_ref())
            .ok_or(DetectorError::Closed)?;
        jobs.send(Job { image, timestamp_ms }).map_err(|_| DetectorError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_flow::extract_flow;
    use std::sync::mpsc;

    fn frame_of(cam: &SimCamera) -> Image {
        Image::cpu(cam.width, cam.height, cam.pixels().to_vec())
    }

    #[test]
    fn empty_scene_has_no_hand() {
        let cam = SimCamera::new(64, 48);
        assert!(locate_hand(&frame_of(&cam), 40).is_none());
        let mut out = DetectionResult::single(Hand::default());
        assert!(!MarkerDetector::new().detect(&frame_of(&cam), None, &Default::default(), &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn markers_are_found_near_the_pose() {
        let mut cam = SimCamera::new(320, 240);
        let pose = HandPose::resting();
        cam.set_pose(Some(pose));
        let hand = locate_hand(&frame_of(&cam), 40).unwrap();
        let t = hand.thumb_tip().unwrap();
        assert!((t.x - pose.thumb.0).abs() < 2.0 / 320.0);
        assert!((t.y - pose.thumb.1).abs() < 2.0 / 240.0);
        let f = extract_flow(&[hand]);
        assert!((f - 0.5).abs() < 0.05, "flow = {}", f);
    }

    #[test]
    fn thumb_on_index_reference_reads_high() {
        let mut cam = SimCamera::new(320, 240);
        let mut pose = HandPose::resting();
        pose.thumb = pose.index_reference();
        cam.set_pose(Some(pose));
        let hand = locate_hand(&frame_of(&cam), 40).unwrap();
        assert!(extract_flow(&[hand]) > 0.9);
    }

    #[test]
    fn readback_matches_frame() {
        let mut cam = SimCamera::new(8, 8);
        cam.set_pose(Some(HandPose::resting()));
        let mut pending = cam.request_readback();
        match pending.poll() {
            Poll::Ready(Ok(data)) => assert_eq!(data, cam.pixels()),
            other => panic!("unexpected {:?}", other.map(|r| r.map(|d| d.len()))),
        }
    }

    #[test]
    fn gpu_images_are_not_inspected() {
        let img = Image::gpu(4, 4, landmark_runner::GpuTexture { name: 1 });
        assert!(locate_hand(&img, 40).is_none());
    }

    #[test]
    fn streaming_calls_back_from_worker() {
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        let mut det = MarkerDetector::streaming(Box::new(move |result, _img, ts| {
            let _ = tx.send((thread::current().id(), result.hands.len(), ts));
        }));
        let mut cam = SimCamera::new(64, 48);
        cam.set_pose(Some(HandPose::resting()));
        det.detect_async(frame_of(&cam), 17, &Default::default()).unwrap();
        drop(det);
        let (id, hands, ts) = rx.recv().unwrap();
        assert_ne!(id, caller);
        assert_eq!((hands, ts), (1, 17));
    }

    #[test]
    fn sync_detector_refuses_async() {
        let mut det = MarkerDetector::new();
        let err = det.detect_async(Image::cpu(0, 0, Vec::new()), 0, &Default::default());
        assert!(matches!(err, Err(DetectorError::Closed)));
    }
}
