//! End-to-end test of a mounted gallery.
//!
//! Drives the full pipeline the way a host would:
//! - In-memory sample source paged through the async sample list
//! - Container measurement and scrolling through the viewport tracker
//! - A fake transport with latency, honoring cancellation
//!
//! All tests run on a paused tokio clock inside a `LocalSet`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;

use spark_gallery::{
    BoundingBox, FetchError, GalleryConfig, GridConfig, InMemorySource, Label, LabelKind,
    LoadState, Overlay, Sample, Transport, VisibilityFlags, mount,
};

// =============================================================================
// FAKE TRANSPORT
// =============================================================================

struct SlowTransport {
    delay: Duration,
    calls: RefCell<Vec<String>>,
}

impl SlowTransport {
    fn new(delay_ms: u64) -> Rc<Self> {
        Rc::new(Self {
            delay: Duration::from_millis(delay_ms),
            calls: RefCell::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for SlowTransport {
    async fn fetch(&self, url: &str, cancel: CancellationToken) -> Result<Vec<u8>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Canceled);
        }
        self.calls.borrow_mut().push(url.to_owned());
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Canceled),
            _ = tokio::time::sleep(self.delay) => Ok(url.as_bytes().to_vec()),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn url(id: u64) -> String {
    format!("https://picsum.photos/200/200?random={id}")
}

fn samples(n: u64) -> Vec<Sample> {
    samples_in(0..n)
}

fn samples_in(ids: std::ops::Range<u64>) -> Vec<Sample> {
    ids.map(|i| {
        let confidence = (i % 100) as f64 / 100.0;
        Sample::new(i, url(i))
            .with_label(
                Label::new(
                    LabelKind::Prediction,
                    BoundingBox::new(10.0, 20.0, 50.0, 50.0),
                    "car",
                )
                .with_confidence(confidence),
            )
            .with_label(Label::new(
                LabelKind::GroundTruth,
                BoundingBox::new(12.0, 22.0, 45.0, 45.0),
                "car",
            ))
    })
    .collect()
}

async fn wait_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_visible_cells_load_once_measured() {
    LocalSet::new()
        .run_until(async {
            let transport = SlowTransport::new(100);
            let source = Rc::new(InMemorySource::new(samples(10_000)));
            let handle = mount(GalleryConfig::default(), source, transport.clone()).unwrap();

            handle.samples().resolve().await.unwrap();
            assert!(transport.calls().is_empty());

            handle.tracker().set_container_size(1_000, 300);
            let geometry = handle.tracker().geometry().unwrap();
            assert_eq!(geometry.columns, 10);
            assert_eq!(geometry.rows, 1_000);

            // 3 rows on screen plus 500 of overscan below: rows 0..=7
            assert_eq!(handle.tracker().visible_cells().len(), 80);
            assert_eq!(handle.loader().in_flight(), 24);

            wait_ms(5_000).await;
            let stats = handle.counters().snapshot();
            assert_eq!(stats.total_requested, 80);
            assert_eq!(stats.fully_loaded, 80);
            assert_eq!(stats.canceled, 0);
            assert_eq!(handle.cache().len(), 80);
            assert!(matches!(handle.loader().state(79).get(), LoadState::Loaded(_)));
            assert_eq!(handle.loader().state(80).get(), LoadState::Idle);

            handle.unmount();
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_fast_scroll_cancels_abandoned_requests() {
    LocalSet::new()
        .run_until(async {
            let transport = SlowTransport::new(100);
            let source = Rc::new(InMemorySource::new(samples(10_000)));
            let handle = mount(GalleryConfig::default(), source, transport.clone()).unwrap();
            handle.samples().resolve().await.unwrap();

            handle.tracker().set_container_size(1_000, 300);
            wait_ms(10).await;
            handle.tracker().set_scroll(50_000);

            let stats = handle.counters().snapshot();
            assert_eq!(stats.canceled, 80);
            assert_eq!(handle.loader().state(0).get(), LoadState::Idle);

            wait_ms(10_000).await;
            let stats = handle.counters().snapshot();
            // rows 495..=507 around the new position
            assert_eq!(stats.total_requested, 80 + 130);
            assert_eq!(stats.fully_loaded, 130);
            assert_eq!(stats.unsettled(), 0);

            let cached: HashSet<String> = (0..80).map(url).collect();
            assert!(cached.iter().all(|u| !handle.cache().contains(u)));
            assert!(handle.cache().contains(&url(4_950)));

            // Only the first admitted batch reached the network before the scroll.
            let early = transport
                .calls()
                .iter()
                .filter(|u| cached.contains(*u))
                .count();
            assert_eq!(early, 24);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_scrolling_back_hits_the_cache() {
    LocalSet::new()
        .run_until(async {
            let transport = SlowTransport::new(20);
            let source = Rc::new(InMemorySource::new(samples(2_000)));
            let handle = mount(GalleryConfig::default(), source, transport.clone()).unwrap();
            handle.samples().resolve().await.unwrap();

            handle.tracker().set_container_size(1_000, 300);
            wait_ms(1_000).await;
            handle.tracker().set_scroll(10_000);
            wait_ms(1_000).await;
            let calls = transport.calls().len();

            handle.tracker().set_scroll(0);
            assert!(matches!(handle.loader().state(0).get(), LoadState::Loaded(_)));
            wait_ms(1_000).await;
            assert_eq!(transport.calls().len(), calls);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_refresh_dropping_a_loading_sample_cancels_it() {
    LocalSet::new()
        .run_until(async {
            let config = GalleryConfig {
                grid: GridConfig {
                    overscan: 0,
                    ..GridConfig::default()
                },
                ..GalleryConfig::default()
            };
            let transport = SlowTransport::new(500);
            let source = Rc::new(InMemorySource::new(samples(20)));
            let handle = mount(config, source.clone(), transport.clone()).unwrap();
            handle.samples().resolve().await.unwrap();

            // A single row: ids 0..10 requesting.
            handle.tracker().set_container_size(1_000, 100);
            wait_ms(10).await;
            assert_eq!(handle.loader().in_flight(), 10);

            source.set_samples(samples_in(1..20));
            handle.samples().refresh();
            handle.samples().resolve().await.unwrap();

            // Id 0 left the row and id 10 took its place.
            let stats = handle.counters().snapshot();
            assert_eq!((stats.total_requested, stats.canceled), (11, 1));
            assert_eq!(handle.loader().in_flight(), 10);

            wait_ms(2_000).await;
            let stats = handle.counters().snapshot();
            assert_eq!(stats.fully_loaded, 10);
            assert_eq!(stats.unsettled(), 0);
            assert!(!handle.cache().contains(&url(0)));
            assert!(handle.cache().contains(&url(10)));
            assert_eq!(handle.loader().tracked_states(), 10);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_resize_recomputes_columns() {
    LocalSet::new()
        .run_until(async {
            let source = Rc::new(InMemorySource::new(samples(95)));
            let handle = mount(GalleryConfig::default(), source, SlowTransport::new(10)).unwrap();
            handle.samples().resolve().await.unwrap();

            handle.tracker().set_container_size(1_000, 600);
            assert_eq!(handle.tracker().geometry().map(|g| g.columns), Some(10));

            handle.tracker().set_container_size(950, 600);
            let geometry = handle.tracker().geometry().unwrap();
            assert_eq!((geometry.columns, geometry.column_width), (9, 105));
            assert_eq!(geometry.rows, 11);

            handle.tracker().set_container_size(0, 0);
            assert!(handle.tracker().visible_cells().is_empty());
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_filters_and_selection() {
    LocalSet::new()
        .run_until(async {
            let source = Rc::new(InMemorySource::new(samples(10_000)));
            let handle = mount(GalleryConfig::default(), source, SlowTransport::new(10)).unwrap();
            handle.samples().resolve().await.unwrap();

            let filtered = handle.filtered_samples();
            assert_eq!(filtered.get().map(|s| s.len()), Ok(10_000));
            handle.filters().set_threshold(0.2, 0.8).unwrap();
            // confidences 0.20 ..= 0.80 of every hundred
            assert_eq!(filtered.get().map(|s| s.len()), Ok(6_100));

            let overlays = handle.overlays(15);
            assert_eq!(overlays.get(), Ok(vec![]));
            handle
                .filters()
                .toggle_visibility(VisibilityFlags::GROUND_TRUTH | VisibilityFlags::PREDICTION);
            // Prediction suppressed by the threshold, ground truth has no confidence.
            assert_eq!(overlays.get().map(|o| o.len()), Ok(1));
            assert!(matches!(
                overlays.get().unwrap()[0],
                Overlay::Box {
                    kind: LabelKind::GroundTruth,
                    ..
                }
            ));

            let selection = handle.selection();
            for id in (0..10_000).step_by(2) {
                selection.toggle(id);
            }
            assert_eq!(selection.count().get(), Ok(5_000));
            assert_eq!(selection.is_selected(4).get(), Ok(true));
            assert_eq!(selection.is_selected(5).get(), Ok(false));
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_unmount_cancels_in_flight_work() {
    LocalSet::new()
        .run_until(async {
            let transport = SlowTransport::new(500);
            let source = Rc::new(InMemorySource::new(samples(1_000)));
            let handle = mount(GalleryConfig::default(), source, transport).unwrap();
            handle.samples().resolve().await.unwrap();
            handle.tracker().set_container_size(1_000, 300);
            wait_ms(10).await;

            let gallery = handle.gallery();
            handle.unmount();
            assert_eq!(gallery.loader().in_flight(), 0);
            assert_eq!(gallery.counters().snapshot().canceled, 80);

            wait_ms(5_000).await;
            assert!(gallery.cache().is_empty());
        })
        .await;
}
