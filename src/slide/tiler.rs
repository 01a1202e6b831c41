//! Slide-level tile access.
//!
//! A [`Tiler`] opens a container once: it reads every page descriptor,
//! detects the vendor, groups pages into series and classifies the series
//! into branches. [`TiledPage`]s are then built on first access to a
//! `(series, level, page)` triple and kept in an LRU cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{FormatError, TileError};
use crate::format::tiff::{read_pages, PageDescriptor};
use crate::format::{detect_vendor, Vendor};
use crate::io::RangeReader;
use crate::tile::{BlankFill, LevelReference, Size, SizeMm, TiledPage};

use super::series::{classify_series, Branch, Branches, Series};

/// Default number of tiled pages kept per slide.
pub const DEFAULT_PAGE_CACHE_CAPACITY: usize = 64;

type PageKey = (usize, usize, usize);

/// Tile access to every page of one slide.
pub struct Tiler<R: RangeReader> {
    /// Shared with every page built from this slide
    reader: Arc<R>,

    vendor: Vendor,
    pages: Vec<Arc<PageDescriptor>>,
    series: Vec<Series>,
    branches: Branches,

    /// Full-resolution level of the volume
    base: LevelReference,

    fill: Arc<dyn BlankFill>,

    /// Pages built so far
    cache: Mutex<LruCache<PageKey, Arc<TiledPage<R>>>>,
}

impl<R: RangeReader> Tiler<R> {
    /// Open a slide with the default page cache capacity.
    pub async fn open(reader: Arc<R>, fill: Arc<dyn BlankFill>) -> Result<Self, FormatError> {
        Self::with_capacity(reader, fill, DEFAULT_PAGE_CACHE_CAPACITY).await
    }

    /// Open a slide keeping at most `capacity` tiled pages cached.
    pub async fn with_capacity(
        reader: Arc<R>,
        fill: Arc<dyn BlankFill>,
        capacity: usize,
    ) -> Result<Self, FormatError> {
        let pages = read_pages(reader.as_ref()).await?;
        let first = pages.first().ok_or_else(|| FormatError::UnsupportedFormat {
            reason: "file contains no pages".to_string(),
        })?;

        let vendor = detect_vendor(first.description())?;
        let series = vendor.group_series(&pages);
        let branches = classify_series(vendor, &series, &pages)?;

        let base_page = series[branches.volume]
            .first_page()
            .and_then(|index| pages.get(index))
            .ok_or(FormatError::MissingVolume {
                vendor: vendor.name(),
            })?;
        let base = LevelReference::new(base_page.image_size, vendor.base_pixel_spacing(base_page)?);

        info!(
            vendor = vendor.name(),
            pages = pages.len(),
            "Opened {}: {} series, base {} px",
            reader.identifier(),
            series.len(),
            base.size
        );

        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            reader,
            vendor,
            pages: pages.into_iter().map(Arc::new).collect(),
            series,
            branches,
            base,
            fill,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    // =========================================================================
    // Page Access
    // =========================================================================

    /// Get the tiled page at `(series, level, page)`, building it if needed.
    pub async fn get_page(
        &self,
        series: usize,
        level: usize,
        page: usize,
    ) -> Result<Arc<TiledPage<R>>, TileError> {
        let key = (series, level, page);
        let mut cache = self.cache.lock().await;
        if let Some(tiled) = cache.get(&key) {
            return Ok(tiled.clone());
        }

        let not_found = || TileError::PageNotFound {
            series,
            level,
            page,
        };
        let descriptor = self
            .series
            .get(series)
            .and_then(|s| s.page_index(level, page))
            .and_then(|index| self.pages.get(index))
            .ok_or_else(not_found)?;
        let reference = self.reference_for(series).ok_or_else(not_found)?;

        let tiled = Arc::new(TiledPage::new(
            descriptor.clone(),
            self.reader.clone(),
            self.vendor.header_patch(),
            self.fill.clone(),
            &reference,
        )?);

        debug!(
            series,
            level,
            page,
            "Built tiled page {} ({} px, {} tiles)",
            descriptor.index,
            tiled.image_size(),
            tiled.tiled_size()
        );

        cache.put(key, tiled.clone());
        Ok(tiled)
    }

    /// Get a page of the volume pyramid.
    pub async fn get_level(&self, level: usize, page: usize) -> Result<Arc<TiledPage<R>>, TileError> {
        self.get_page(self.branches.volume, level, page).await
    }

    /// Get a page of the label series.
    pub async fn get_label(&self, index: usize, page: usize) -> Result<Arc<TiledPage<R>>, TileError> {
        self.get_branch_page(Branch::Label, index, page).await
    }

    /// Get a page of the overview series.
    pub async fn get_overview(
        &self,
        index: usize,
        page: usize,
    ) -> Result<Arc<TiledPage<R>>, TileError> {
        self.get_branch_page(Branch::Overview, index, page).await
    }

    /// Get a page of any branch.
    pub async fn get_branch_page(
        &self,
        branch: Branch,
        level: usize,
        page: usize,
    ) -> Result<Arc<TiledPage<R>>, TileError> {
        let series = self
            .branches
            .get(branch)
            .ok_or(TileError::MissingBranch(branch))?;
        self.get_page(series, level, page).await
    }

    /// Every page of the volume pyramid, level by level.
    pub async fn levels(&self) -> Result<Vec<Arc<TiledPage<R>>>, TileError> {
        self.branch_pages(Branch::Volume).await
    }

    /// Every label page; empty when the slide has no label.
    pub async fn labels(&self) -> Result<Vec<Arc<TiledPage<R>>>, TileError> {
        self.branch_pages(Branch::Label).await
    }

    /// Every overview page; empty when the slide has no overview.
    pub async fn overviews(&self) -> Result<Vec<Arc<TiledPage<R>>>, TileError> {
        self.branch_pages(Branch::Overview).await
    }

    async fn branch_pages(&self, branch: Branch) -> Result<Vec<Arc<TiledPage<R>>>, TileError> {
        let Some(series) = self.branches.get(branch) else {
            return Ok(Vec::new());
        };

        let mut pages = Vec::new();
        for (level, page) in self.series[series].positions() {
            pages.push(self.get_page(series, level, page).await?);
        }
        Ok(pages)
    }

    /// Get tile `(x, y)` of the page at `(series, level, page)`.
    pub async fn get_tile(
        &self,
        series: usize,
        level: usize,
        page: usize,
        x: u32,
        y: u32,
    ) -> Result<Bytes, TileError> {
        self.get_page(series, level, page).await?.get_tile(x, y).await
    }

    /// The level pages of `series` are measured against.
    ///
    /// The volume uses the full-resolution base. Other series are measured
    /// against their own first page, with the spacing recorded on that page
    /// or, when the vendor records none, one scaled from the base by
    /// relative width.
    pub fn reference_for(&self, series: usize) -> Option<LevelReference> {
        if series == self.branches.volume {
            return Some(self.base);
        }
        let first = self.series.get(series)?.first_page()?;
        let page = self.pages.get(first)?;
        let reference = match self.vendor.associated_pixel_spacing(page) {
            Some(spacing) => LevelReference::new(page.image_size, spacing),
            None => self.base.for_associated(page.image_size),
        };
        Some(reference)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn branches(&self) -> Branches {
        self.branches
    }

    pub fn pages(&self) -> &[Arc<PageDescriptor>] {
        &self.pages
    }

    /// Size of the full-resolution level.
    pub fn base_size(&self) -> Size {
        self.base.size
    }

    /// Pixel spacing of the full-resolution level in millimetres.
    pub fn base_pixel_spacing(&self) -> SizeMm {
        self.base.pixel_spacing
    }

    /// Pixel spacing of the full-resolution level in micrometres.
    pub fn base_mpp(&self) -> SizeMm {
        self.base.pixel_spacing.to_mpp()
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Number of tiled pages currently cached.
    pub async fn cached_pages(&self) -> usize {
        self.cache.lock().await.len()
    }
}
