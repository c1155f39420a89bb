use std::{
    path::PathBuf,
    sync::Arc,
};

use thiserror::Error;
use tracing::info;

use crate::{
    active::ActiveSetManager,
    cache::{AlbumFileCache, CacheTree, DirectoryCache},
    collage::CollageComposer,
    config::BackendConfig,
    exclusion::ExclusionStore,
    gtfs::{GtfsEngine, GtfsError},
    select::SelectionEngine,
    weather::{WeatherError, WeatherSampler},
};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Media root missing: {0}")]
    MediaRootMissing(PathBuf),
    #[error("Cache dir unusable: {0}")]
    CacheDir(#[from] std::io::Error),
    #[error(transparent)]
    Gtfs(#[from] GtfsError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
}

/// Everything a handler can touch. Built once at startup.
pub struct Backend {
    pub config: BackendConfig,
    pub exclusions: Arc<ExclusionStore>,
    pub active: ActiveSetManager,
    pub composer: CollageComposer,
    pub transit: Option<GtfsEngine>,
    pub weather: Option<Arc<WeatherSampler>>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Result<Arc<Self>, StartupError> {
        let media_root = config.media.root.clone();
        if !media_root.is_dir() {
            return Err(StartupError::MediaRootMissing(media_root));
        }
        let cache_dir = config.media.cache_dir.clone();
        std::fs::create_dir_all(&cache_dir)?;

        let exclusions = Arc::new(ExclusionStore::load(&cache_dir));
        let tree = CacheTree::new(&media_root, &cache_dir);
        let engine = SelectionEngine::new(
            &media_root,
            DirectoryCache::new(tree.clone(), &config.cache),
            AlbumFileCache::new(tree, &config.cache),
            Arc::clone(&exclusions),
            config.slideshow.stream_count,
        );
        let active = ActiveSetManager::new(Arc::new(engine), config.slideshow.window_duration());
        let composer = CollageComposer::from_config(&config.slideshow, &config.collage);

        let transit = if config.transit.enabled {
            Some(GtfsEngine::new(&config.transit, &cache_dir)?)
        } else {
            None
        };
        let weather = if config.weather.enabled {
            Some(Arc::new(WeatherSampler::new(&config.weather, &cache_dir)?))
        } else {
            None
        };

        info!(
            root = %media_root.display(),
            cache_dir = %cache_dir.display(),
            stream_count = config.slideshow.stream_count,
            window_ms = config.slideshow.window_duration().as_millis() as u64,
            transit = transit.is_some(),
            weather = weather.is_some(),
            "backend initialized"
        );

        Ok(Arc::new(Self {
            config,
            exclusions,
            active,
            composer,
            transit,
            weather,
        }))
    }
}
