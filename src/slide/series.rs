//! Series grouping and branch classification.
//!
//! The pages of a container are grouped into named series (each a list of
//! levels, each level a list of pages), and every series is then assigned
//! to at most one branch: the volume pyramid, the label or the overview.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::FormatError;
use crate::format::tiff::PageDescriptor;
use crate::format::Vendor;

/// A named group of pages, level 0 first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub name: String,

    /// Page indices per level
    pub levels: Vec<Vec<usize>>,
}

impl Series {
    pub fn new(name: impl Into<String>, levels: Vec<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            levels,
        }
    }

    /// A series with a single level holding a single page.
    pub fn single(name: impl Into<String>, page: usize) -> Self {
        Self::new(name, vec![vec![page]])
    }

    /// First page of level 0.
    pub fn first_page(&self) -> Option<usize> {
        self.levels.first().and_then(|level| level.first()).copied()
    }

    /// Container page index at `(level, page)`.
    pub fn page_index(&self, level: usize, page: usize) -> Option<usize> {
        self.levels.get(level).and_then(|l| l.get(page)).copied()
    }

    /// All `(level, page)` pairs in order.
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(level, pages)| (0..pages.len()).map(move |page| (level, page)))
    }
}

/// The role of a series in a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// The multi-resolution pyramid
    Volume,

    /// Photo of the slide label
    Label,

    /// Low-resolution overview (macro) of the whole slide
    Overview,
}

impl Branch {
    pub const fn name(&self) -> &'static str {
        match self {
            Branch::Volume => "volume",
            Branch::Label => "label",
            Branch::Overview => "overview",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Series index of each branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Branches {
    pub volume: usize,
    pub label: Option<usize>,
    pub overview: Option<usize>,
}

impl Branches {
    pub fn get(&self, branch: Branch) -> Option<usize> {
        match branch {
            Branch::Volume => Some(self.volume),
            Branch::Label => self.label,
            Branch::Overview => self.overview,
        }
    }
}

/// Assign each series to a branch using the vendor's rules.
///
/// The first series matching a branch wins; later matches are logged and
/// ignored. A slide without a volume series is rejected.
pub fn classify_series(
    vendor: Vendor,
    series: &[Series],
    pages: &[PageDescriptor],
) -> Result<Branches, FormatError> {
    let mut volume = None;
    let mut label = None;
    let mut overview = None;

    for (index, s) in series.iter().enumerate() {
        let slot = match vendor.classify(s, pages) {
            Some(Branch::Volume) => &mut volume,
            Some(Branch::Label) => &mut label,
            Some(Branch::Overview) => &mut overview,
            None => continue,
        };

        match *slot {
            Some(existing) => warn!(
                vendor = vendor.name(),
                "Series {} ({}) matches a branch already taken by series {}, ignoring",
                index,
                s.name,
                existing
            ),
            None => *slot = Some(index),
        }
    }

    let volume = volume.ok_or(FormatError::MissingVolume {
        vendor: vendor.name(),
    })?;

    Ok(Branches {
        volume,
        label,
        overview,
    })
}
