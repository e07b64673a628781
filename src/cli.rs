use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{TransformKind, TrimOptions};

#[derive(Parser, Debug)]
#[command(name = "scantrim")]
#[command(version, about = "Trim and deskew an image of a scanned document")]
pub struct Cli {
    /// Photographed document to straighten
    pub input: PathBuf,

    /// Where to write the result; numbered per region when splitting
    pub output: PathBuf,

    /// Scale intermediate processing images down by this integer factor
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub process_scale: u32,

    /// Split the scanned image into this many sections before trimming and rotating each one
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub num_splits: u32,

    /// Ignore contours no longer than this many pixels (dust, texture)
    #[arg(long, default_value_t = 200.0)]
    pub min_contour_length: f64,

    /// Canny low threshold
    #[arg(long, default_value_t = 100.0)]
    pub canny_low: f32,

    /// Canny high threshold
    #[arg(long, default_value_t = 200.0)]
    pub canny_high: f32,

    /// Map the page's four corners instead of its bounding rectangle
    #[arg(long)]
    pub perspective: bool,

    /// Write edge, contour and cluster renderings into this directory
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,

    /// Show detection details
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only report warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn trim_options(&self) -> TrimOptions {
        TrimOptions {
            process_scale: self.process_scale,
            num_splits: self.num_splits as usize,
            min_contour_length: self.min_contour_length,
            canny_low: self.canny_low,
            canny_high: self.canny_high,
            transform: if self.perspective {
                TransformKind::Perspective
            } else {
                TransformKind::Affine
            },
            ..TrimOptions::default()
        }
    }

    /// Output path for region `index`: the output as given when there is a
    /// single region, otherwise `name_<index>.ext`.
    pub fn output_path(&self, index: usize) -> PathBuf {
        if self.num_splits == 1 {
            return self.output.clone();
        }

        let file_name = match self.output.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return self.output.join(format!("{}", index)),
        };
        let indexed = match file_name.rfind('.') {
            Some(split) => format!("{}_{}{}", &file_name[..split], index, &file_name[split..]),
            None => format!("{}_{}", file_name, index),
        };
        self.output.with_file_name(indexed)
    }
}
