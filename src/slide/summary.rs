//! Serializable description of an opened slide.
//!
//! Computed from page descriptors and geometry alone: building a summary
//! never reads a frame.

use std::fmt;

use serde::Serialize;

use crate::format::tiff::PageDescriptor;
use crate::io::RangeReader;
use crate::tile::{self, LevelReference, Size, SizeMm};

use super::series::{Branch, Branches};
use super::tiler::Tiler;

/// One page of a series.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub level: usize,
    pub page: usize,

    /// Index of the page in the container
    pub index: usize,

    pub image_size: Size,
    pub tile_size: Size,

    /// Tile columns and rows
    pub tiled_size: Size,

    /// `None` when the page is not a power-of-two downsample of its reference
    pub pyramid_index: Option<u32>,
    pub pixel_spacing: Option<SizeMm>,

    /// Frames of the grid with no data
    pub sparse_frames: u64,
}

/// One series and its branch, if any.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub index: usize,
    pub name: String,
    pub branch: Option<Branch>,
    pub pages: Vec<PageSummary>,
}

/// Everything known about a slide without reading tile data.
#[derive(Debug, Clone, Serialize)]
pub struct SlideSummary {
    pub identifier: String,
    pub vendor: &'static str,
    pub base_size: Size,

    /// Millimetres per pixel at full resolution
    pub base_pixel_spacing: SizeMm,

    /// Micrometres per pixel at full resolution
    pub base_mpp: SizeMm,

    pub branches: Branches,
    pub series: Vec<SeriesSummary>,
}

impl SlideSummary {
    pub fn from_tiler<R: RangeReader>(tiler: &Tiler<R>) -> Self {
        let branches = tiler.branches();
        let pages = tiler.pages();

        let series = tiler
            .series()
            .iter()
            .enumerate()
            .map(|(index, series)| {
                let reference = tiler.reference_for(index);
                let pages = series
                    .positions()
                    .filter_map(|(level, page)| {
                        let descriptor = pages.get(series.page_index(level, page)?)?;
                        Some(summarize_page(level, page, descriptor, reference.as_ref()))
                    })
                    .collect();

                SeriesSummary {
                    index,
                    name: series.name.clone(),
                    branch: branch_of(&branches, index),
                    pages,
                }
            })
            .collect();

        Self {
            identifier: tiler.reader().identifier().to_string(),
            vendor: tiler.vendor().name(),
            base_size: tiler.base_size(),
            base_pixel_spacing: tiler.base_pixel_spacing(),
            base_mpp: tiler.base_mpp(),
            branches,
            series,
        }
    }
}

fn branch_of(branches: &Branches, series: usize) -> Option<Branch> {
    [Branch::Volume, Branch::Label, Branch::Overview]
        .into_iter()
        .find(|&branch| branches.get(branch) == Some(series))
}

fn summarize_page(
    level: usize,
    page: usize,
    descriptor: &PageDescriptor,
    reference: Option<&LevelReference>,
) -> PageSummary {
    let tiled_size = tile::tile_grid(descriptor.image_size, descriptor.tile_size);
    let pyramid_index =
        reference.and_then(|r| tile::pyramid_index(r.size, descriptor.image_size).ok());
    let pixel_spacing = reference
        .zip(pyramid_index)
        .map(|(r, k)| tile::pixel_spacing(r.pixel_spacing, k));

    PageSummary {
        level,
        page,
        index: descriptor.index,
        image_size: descriptor.image_size,
        tile_size: descriptor.tile_size,
        tiled_size,
        pyramid_index,
        pixel_spacing,
        sparse_frames: count_sparse(tiled_size, descriptor),
    }
}

/// Frames of the grid that are missing from either table or have zero length.
fn count_sparse(grid: Size, descriptor: &PageDescriptor) -> u64 {
    let present = descriptor
        .frame_offsets
        .iter()
        .zip(&descriptor.frame_lengths)
        .take(grid.area() as usize)
        .filter(|(_, length)| **length != 0)
        .count() as u64;
    grid.area() - present
}

impl fmt::Display for SlideSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.identifier, self.vendor)?;
        writeln!(f, "  base size: {} px", self.base_size)?;
        writeln!(
            f,
            "  base mpp:  {:.4} x {:.4} um/px",
            self.base_mpp.width, self.base_mpp.height
        )?;

        for series in &self.series {
            let branch = series.branch.map(|b| b.name()).unwrap_or("-");
            writeln!(f, "  series {} {:?} [{}]", series.index, series.name, branch)?;

            for page in &series.pages {
                let pyramid = page
                    .pyramid_index
                    .map(|k| format!("k={}", k))
                    .unwrap_or_else(|| "not a pyramid level".to_string());
                writeln!(
                    f,
                    "    level {} page {} (#{}): {} px, tiles {} of {}, {}, {} sparse",
                    page.level,
                    page.page,
                    page.index,
                    page.image_size,
                    page.tiled_size,
                    page.tile_size,
                    pyramid,
                    page.sparse_frames
                )?;
            }
        }
        Ok(())
    }
}
