//! Command-line configuration for wsi-tiler.
//!
//! Global options apply to every subcommand and can also be set through
//! environment variables with the `WSI_TILER_` prefix:
//!
//! - `WSI_TILER_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `WSI_TILER_S3_REGION` - AWS region (default: us-east-1)
//! - `WSI_TILER_PAGE_CACHE` - Tiled pages kept per slide (default: 64)
//! - `WSI_TILER_FILL_QUALITY` - JPEG quality of blank tiles (default: 80)
//!
//! # Example
//!
//! ```text
//! wsi-tiler info slide.svs --json
//! wsi-tiler tile s3://bucket/slide.tiff --level 2 --x 3 --y 1 --output tile.jpg
//! wsi-tiler tile slide.svs --branch label --x 0 --y 0 > label.jpg
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::io::parse_s3_uri;
use crate::slide::{Branch, DEFAULT_PAGE_CACHE_CAPACITY};
use crate::tile::{DEFAULT_FILL_QUALITY, MAX_FILL_QUALITY, MIN_FILL_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// wsi-tiler - Extract standalone JPEG tiles from Whole Slide Images.
///
/// Reads Aperio SVS and Philips TIFF slides from local disk or S3 with
/// range reads, and writes tiles that any JPEG decoder can open.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, global = true, env = "WSI_TILER_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, global = true, default_value = DEFAULT_REGION, env = "WSI_TILER_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Tiling Configuration
    // =========================================================================
    /// Maximum number of tiled pages to keep open per slide.
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_PAGE_CACHE_CAPACITY,
        env = "WSI_TILER_PAGE_CACHE"
    )]
    pub page_cache: usize,

    /// JPEG quality of synthesized blank tiles (1-100).
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_FILL_QUALITY,
        env = "WSI_TILER_FILL_QUALITY"
    )]
    pub fill_quality: u8,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the vendor, series, branches and per-page geometry of a slide.
    Info {
        /// Local path or s3://bucket/key
        slide: String,

        /// Print JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Extract one tile as a standalone JPEG.
    Tile {
        /// Local path or s3://bucket/key
        slide: String,

        /// Branch to read from.
        #[arg(long, value_enum, default_value_t = BranchArg::Volume)]
        branch: BranchArg,

        /// Level within the branch (0 is full resolution).
        #[arg(long, default_value_t = 0)]
        level: usize,

        /// Page within the level.
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Tile column.
        #[arg(long)]
        x: u32,

        /// Tile row.
        #[arg(long)]
        y: u32,

        /// Output file; the tile is written to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Branch names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchArg {
    Volume,
    Label,
    Overview,
}

impl From<BranchArg> for Branch {
    fn from(arg: BranchArg) -> Self {
        match arg {
            BranchArg::Volume => Branch::Volume,
            BranchArg::Label => Branch::Label,
            BranchArg::Overview => Branch::Overview,
        }
    }
}

/// Where a slide is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideLocation {
    Local(PathBuf),
    S3 { bucket: String, key: String },
}

impl SlideLocation {
    /// `s3://bucket/key` is read from S3, anything else from local disk.
    pub fn parse(slide: &str) -> Result<Self, String> {
        if slide.starts_with("s3://") {
            let (bucket, key) = parse_s3_uri(slide)
                .ok_or_else(|| format!("Invalid S3 URI '{}', expected s3://bucket/key", slide))?;
            return Ok(SlideLocation::S3 { bucket, key });
        }
        if slide.is_empty() {
            return Err("Slide path is empty".to_string());
        }
        Ok(SlideLocation::Local(PathBuf::from(slide)))
    }
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_cache == 0 {
            return Err("page_cache must be greater than 0".to_string());
        }

        if !(MIN_FILL_QUALITY..=MAX_FILL_QUALITY).contains(&self.fill_quality) {
            return Err(format!(
                "fill_quality must be between {} and {}",
                MIN_FILL_QUALITY, MAX_FILL_QUALITY
            ));
        }

        if self.s3_region.is_empty() {
            return Err("s3_region must not be empty".to_string());
        }

        self.slide_location().map(|_| ())
    }

    /// The slide named by the subcommand.
    pub fn slide(&self) -> &str {
        match &self.command {
            Command::Info { slide, .. } | Command::Tile { slide, .. } => slide,
        }
    }

    pub fn slide_location(&self) -> Result<SlideLocation, String> {
        SlideLocation::parse(self.slide())
    }
}

// =============================================================================
// Tests
// =============================================================================
