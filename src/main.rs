use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use log::{info, LevelFilter};

use scantrim::{detect_regions, to_output_image, trim_regions, write_previews, Cli};

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    // Load input image
    let img = ImageReader::open(&cli.input)
        .with_context(|| format!("Could not read the image: {:?}", cli.input))?
        .decode()
        .with_context(|| format!("Could not decode the image: {:?}", cli.input))?;

    info!(
        "Loaded image: {:?} ({}x{})",
        cli.input,
        img.width(),
        img.height()
    );

    let options = cli.trim_options();
    let detection = detect_regions(&img, &options)
        .with_context(|| format!("Failed to locate a document in {:?}", cli.input))?;

    if let Some(dir) = &cli.preview_dir {
        write_previews(dir, &detection)?;
    }

    let regions =
        trim_regions(&img, &detection, &options).context("Failed to straighten document")?;

    let keep_alpha = img.color().has_alpha();
    for region in regions {
        let output_path = cli.output_path(region.index);
        let (width, height) = region.image.dimensions();

        to_output_image(region.image, keep_alpha)
            .save(&output_path)
            .with_context(|| format!("Failed to save output: {:?}", output_path))?;

        info!(
            "Saved region {}: {}x{} -> {:?}",
            region.index, width, height, output_path
        );
        println!("{}", output_path.display());
    }

    Ok(())
}
