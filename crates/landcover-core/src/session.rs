//! Input events and run supersession.
//!
//! Region and category changes arrive as [`InputEvent`]s. Each event folds
//! into an [`InputState`] and, once a region exists, starts a fresh run. Any
//! run still in flight for older inputs is cancelled, and a result that
//! finishes after being superseded is dropped instead of delivered.
//!
//! The generation check and the send happen under the same lock that
//! [`SeriesSession::submit`] takes to bump the generation, so nothing is sent
//! for a generation once it is stale. An update already sitting in the
//! channel when a newer event arrives is not recalled: receivers filter with
//! [`SeriesSession::is_current`].

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::RasterArchive;
use crate::catalog::Category;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::geometry::Region;
use crate::pipeline::{CoverageSeriesBuilder, SeriesRequest};
use crate::series::TimeSeries;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    RegionChanged(Region),
    CategoryChanged(Category),
}

/// Latest user inputs. No region until one has been drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub region: Option<Region>,
    pub category: Category,
}

impl InputState {
    pub fn apply(self, event: InputEvent) -> Self {
        match event {
            InputEvent::RegionChanged(region) => Self { region: Some(region), ..self },
            InputEvent::CategoryChanged(category) => Self { category, ..self },
        }
    }

    pub fn request(&self, config: &PipelineConfig) -> Option<SeriesRequest> {
        self.region
            .clone()
            .map(|region| SeriesRequest::from_config(region, self.category.clone(), config))
    }
}

/// A finished run. Sent only while its generation is current.
#[derive(Debug)]
pub struct SeriesUpdate {
    pub generation: u64,
    pub inputs: InputState,
    pub result: PipelineResult<TimeSeries>,
}

struct InFlight {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the archive handle and the current run for one interactive session.
pub struct SeriesSession {
    builder: Arc<CoverageSeriesBuilder>,
    archive: Arc<dyn RasterArchive>,
    state: InputState,
    generation: Arc<Mutex<u64>>,
    in_flight: Option<InFlight>,
    updates: mpsc::UnboundedSender<SeriesUpdate>,
}

impl SeriesSession {
    pub fn new(
        builder: CoverageSeriesBuilder,
        archive: Arc<dyn RasterArchive>,
    ) -> (Self, mpsc::UnboundedReceiver<SeriesUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            builder: Arc::new(builder),
            archive,
            state: InputState::default(),
            generation: Arc::new(Mutex::new(0)),
            in_flight: None,
            updates: tx,
        };
        (session, rx)
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        *lock(&self.generation)
    }

    /// True if `update` belongs to the latest inputs.
    pub fn is_current(&self, update: &SeriesUpdate) -> bool {
        update.generation == self.generation()
    }

    /// Fold `event` into the inputs and restart the computation.
    ///
    /// Returns the generation of the new run, or `None` while no region has
    /// been drawn yet.
    pub fn submit(&mut self, event: InputEvent) -> Option<u64> {
        self.state = std::mem::take(&mut self.state).apply(event);
        let generation = {
            let mut current = lock(&self.generation);
            *current += 1;
            *current
        };
        self.abandon_in_flight();

        let request = self.state.request(self.builder.config())?;
        let cancel = CancellationToken::new();
        let builder = Arc::clone(&self.builder);
        let archive = Arc::clone(&self.archive);
        let current = Arc::clone(&self.generation);
        let updates = self.updates.clone();
        let inputs = self.state.clone();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = builder.run(&request, archive.as_ref(), &token).await;
            if matches!(result, Err(PipelineError::Cancelled)) {
                return;
            }
            deliver(&current, &updates, SeriesUpdate { generation, inputs, result });
        });
        debug!(generation, "started series run");
        self.in_flight = Some(InFlight { cancel, handle });
        Some(generation)
    }

    fn abandon_in_flight(&mut self) {
        if let Some(prev) = self.in_flight.take() {
            if !prev.handle.is_finished() {
                info!("superseding in-flight series run");
            }
            prev.cancel.cancel();
        }
    }
}

fn lock(generation: &Mutex<u64>) -> std::sync::MutexGuard<'_, u64> {
    generation.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Send `update` if its generation is still current. Returns whether it was sent.
fn deliver(current: &Mutex<u64>, updates: &mpsc::UnboundedSender<SeriesUpdate>, update: SeriesUpdate) -> bool {
    let current = lock(current);
    if *current != update.generation {
        info!(generation = update.generation, latest = *current, "dropping superseded series result");
        return false;
    }
    // A closed receiver means nobody is listening any more.
    updates.send(update).is_ok()
}

impl Drop for SeriesSession {
    fn drop(&mut self) {
        self.abandon_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{InMemoryArchive, Scene};
    use crate::area::PixelAreaReference;
    use crate::error::QueryError;
    use crate::geometry::Bounds;
    use crate::raster::{ClassRaster, RasterSet};
    use crate::window::DateRange;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn builder() -> CoverageSeriesBuilder {
        CoverageSeriesBuilder::new(PipelineConfig {
            start_date: d(2020, 1, 1),
            end_date: d(2021, 1, 1),
            pixel_area: PixelAreaReference::Uniform { m2: 10_000.0 },
            ..PipelineConfig::default()
        })
    }

    fn archive() -> Arc<dyn RasterArchive> {
        let bounds = Bounds::new(-1.0, 1.0, -1.0, 1.0);
        Arc::new(
            InMemoryArchive::new(vec![
                Scene { id: "w".into(), acquired: d(2020, 2, 1), band: "SCL".into(), raster: ClassRaster::new(2, 2, bounds, 5) },
            ])
            .unwrap(),
        )
    }

    /// Archive that never answers for regions west of the prime meridian.
    struct SlowWest(Arc<dyn RasterArchive>);

    #[async_trait]
    impl RasterArchive for SlowWest {
        async fn query(&self, region: &Region, range: &DateRange, band: &str) -> Result<RasterSet, QueryError> {
            if region.bounds().max_lon < 0.0 {
                std::future::pending::<()>().await;
            }
            self.0.query(region, range, band).await
        }
    }

    #[test]
    fn apply_is_pure_and_keeps_other_input() {
        let s0 = InputState::default();
        assert!(s0.request(&PipelineConfig::default()).is_none());
        let s1 = s0.clone().apply(InputEvent::CategoryChanged(Category::name("Vegetation")));
        assert_eq!(s0.category, Category::default());
        let s2 = s1.apply(InputEvent::RegionChanged(Region::point(0.5, 0.5)));
        assert_eq!(s2.category, Category::name("Vegetation"));
        let req = s2.request(&PipelineConfig::default()).unwrap();
        assert_eq!(req.step_months, 3);
    }

    #[tokio::test]
    async fn category_before_region_starts_nothing() {
        let (mut session, _rx) = SeriesSession::new(builder(), archive());
        assert_eq!(session.submit(InputEvent::CategoryChanged(Category::name("Cirrus"))), None);
        assert_eq!(session.generation(), 1);
    }

    #[tokio::test]
    async fn region_event_delivers_a_series() {
        let (mut session, mut rx) = SeriesSession::new(builder(), archive());
        let gen = session.submit(InputEvent::RegionChanged(Region::rectangle(0.0, 0.0, 0.01, 0.01))).unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.generation, gen);
        assert!(session.is_current(&update));
        let series = update.result.unwrap();
        assert_eq!(series.len(), 4);
        assert!(series.entries[0].sum() > 0.0);
    }

    #[tokio::test]
    async fn new_region_supersedes_stalled_run() {
        let (mut session, mut rx) = SeriesSession::new(builder(), Arc::new(SlowWest(archive())));
        let stale = session.submit(InputEvent::RegionChanged(Region::rectangle(-0.5, 0.0, -0.49, 0.01))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fresh = session.submit(InputEvent::RegionChanged(Region::rectangle(0.0, 0.0, 0.01, 0.01))).unwrap();
        assert!(fresh > stale);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.generation, fresh);
        assert!(update.result.is_ok());
        drop(session);
        assert!(rx.recv().await.is_none(), "stale run must not deliver");
    }

    #[tokio::test]
    async fn invalid_category_is_delivered_as_rejection() {
        let (mut session, mut rx) = SeriesSession::new(builder(), archive());
        session.submit(InputEvent::RegionChanged(Region::point(0.5, 0.5)));
        let first = rx.recv().await.unwrap();
        assert!(first.result.is_ok());
        session.submit(InputEvent::CategoryChanged(Category::Index(11)));
        let update = rx.recv().await.unwrap();
        assert!(matches!(update.result, Err(PipelineError::InvalidCategory(_))));
    }

    #[test]
    fn stale_generation_is_never_sent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let current = Mutex::new(2);
        let update = |generation| SeriesUpdate { generation, inputs: InputState::default(), result: Err(PipelineError::Cancelled) };
        assert!(!deliver(&current, &tx, update(1)));
        assert!(rx.try_recv().is_err());
        assert!(deliver(&current, &tx, update(2)));
        assert_eq!(rx.try_recv().unwrap().generation, 2);
    }

    #[tokio::test]
    async fn received_update_goes_stale_on_next_submit() {
        let (mut session, mut rx) = SeriesSession::new(builder(), archive());
        session.submit(InputEvent::RegionChanged(Region::point(0.5, 0.5)));
        let update = rx.recv().await.unwrap();
        assert!(session.is_current(&update));
        session.submit(InputEvent::CategoryChanged(Category::name("Vegetation")));
        assert!(!session.is_current(&update));
    }
}
