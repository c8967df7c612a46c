use clap::Parser;
use ich_core::dicom::{fill_channels, CtSlice};
use ich_core::{Result, WindowSetting};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process;

/// CLI tool for rendering CT slices as windowed PNG images
#[derive(Parser, Debug)]
#[command(name = "ichwindow")]
#[command(about = "Convert a directory of CT DICOM slices into windowed PNG images")]
#[command(version)]
struct Cli {
    /// Directory containing DICOM files
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Directory the PNG images are written to
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Window as "center,width" in HU
    #[arg(short, long, default_value = "40,150", value_parser = WindowSetting::parse)]
    window: WindowSetting,

    /// Resize slices to SIZE x SIZE; native resolution if omitted
    #[arg(short, long)]
    size: Option<u32>,

    /// Write three identical channels instead of grayscale
    #[arg(long)]
    rgb: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    // Verify directory exists
    if !cli.directory.is_dir() {
        eprintln!("Error: {} is not a directory", cli.directory.display());
        process::exit(1);
    }

    let dicom_files = match collect_dicom_files(&cli.directory) {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to read directory: {}", e);
            eprintln!("Error: Failed to read directory: {}", e);
            process::exit(1);
        }
    };

    if dicom_files.is_empty() {
        eprintln!("Error: No DICOM files (.dcm) found in directory");
        process::exit(1);
    }

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        eprintln!("Error: Cannot create {}: {}", cli.output.display(), e);
        process::exit(1);
    }

    info!(
        "Converting {} DICOM files with window {}",
        dicom_files.len(),
        cli.window
    );

    let pb = ProgressBar::new(dicom_files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let failures: Vec<(PathBuf, String)> = dicom_files
        .par_iter()
        .progress_with(pb)
        .filter_map(|path| {
            convert_file(path, &cli.output, cli.window, cli.size, cli.rgb)
                .err()
                .map(|e| (path.clone(), e.to_string()))
        })
        .collect();

    for (path, e) in &failures {
        warn!("Skipped {}: {}", path.display(), e);
    }

    let converted = dicom_files.len() - failures.len();
    println!(
        "Converted {} of {} slices into {}",
        converted,
        dicom_files.len(),
        cli.output.display()
    );
    if converted == 0 {
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

/// Renders one slice to `<output>/<stem>.png`
fn convert_file(
    path: &Path,
    output: &Path,
    window: WindowSetting,
    size: Option<u32>,
    rgb: bool,
) -> Result<PathBuf> {
    let slice = CtSlice::from_file(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("No usable file name in {}", path.display()))?;
    let target = output.join(format!("{}.png", stem));

    match (size, rgb) {
        (Some(size), _) if rgb => slice.to_rgb(window, size)?.save(&target)?,
        (Some(size), _) => {
            let luma = slice.to_luma(window)?;
            image::imageops::resize(&luma, size, size, image::imageops::FilterType::Triangle)
                .save(&target)?
        }
        (None, true) => fill_channels(&slice.to_luma(window)?).save(&target)?,
        (None, false) => slice.to_luma(window)?.save(&target)?,
    }
    Ok(target)
}

fn collect_dicom_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                if ext.eq_ignore_ascii_case("dcm") || ext.eq_ignore_ascii_case("dicom") {
                    files.push(path);
                }
            } else if is_dicom_file(&path) {
                info!("Found headerless DICOM file: {}", path.display());
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Checks for the "DICM" magic after the 128-byte preamble
fn is_dicom_file(path: &Path) -> bool {
    use std::fs::File;
    use std::io::Read;

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = [0u8; 132];
    match file.read_exact(&mut buffer) {
        Ok(()) => &buffer[128..132] == b"DICM",
        Err(_) => false,
    }
}
