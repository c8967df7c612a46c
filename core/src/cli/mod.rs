pub mod report;

use crate::error::Result;
use crate::types::{CachePolicy, HeadVariant, ImageFormat, PipelineConfig, WindowSetting};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the hemorrhage pipeline
#[derive(Parser, Debug)]
#[command(name = "ich")]
#[command(about = "Intracranial hemorrhage classification on head CT slices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file; flags below override it
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start from the small debug preset instead of the defaults
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output head layout
    #[arg(long, global = true)]
    pub head: Option<HeadArg>,

    /// Image source format
    #[arg(long, global = true)]
    pub format: Option<FormatArg>,

    /// Window as "center,width" in HU, e.g. "40,150"
    #[arg(long, global = true, value_parser = WindowSetting::parse)]
    pub window: Option<WindowSetting>,

    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    #[arg(long, global = true)]
    pub epochs: Option<usize>,

    /// Directory holding the CSV inputs
    #[arg(long, global = true, value_name = "DIR")]
    pub csv_dir: Option<PathBuf>,

    /// Directory for checkpoints, the final model and the submission
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Rebuild label caches when their inputs change
    #[arg(long, global = true)]
    pub fingerprint: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Pipeline stages
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build the wide label table and the test image list
    Prepare,
    /// Train on the prepared labels
    Train,
    /// Score the test images with the saved model and write a submission
    Predict,
    /// Prepare, train and predict in one go
    Run,
}

/// Head layout options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadArg {
    /// One 5-output head over the subtypes; "any" derived by threshold
    Shared,
    /// Six single-output heads including "any"
    Separate,
}

impl From<HeadArg> for HeadVariant {
    fn from(arg: HeadArg) -> Self {
        match arg {
            HeadArg::Shared => HeadVariant::Shared,
            HeadArg::Separate => HeadVariant::Separate,
        }
    }
}

/// Image source options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Pre-windowed PNG slices
    Png,
    /// Raw DICOM slices, windowed on load
    Dicom,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Dicom => ImageFormat::Dicom,
        }
    }
}

impl Cli {
    /// Builds the effective configuration
    ///
    /// Starts from the JSON file if given, else the debug preset or the
    /// defaults, then applies each flag that was set.
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match (&self.config, self.debug) {
            (Some(path), _) => PipelineConfig::from_json_file(path)?,
            (None, true) => PipelineConfig::debug(),
            (None, false) => PipelineConfig::default(),
        };

        if let Some(head) = self.head {
            config = config.with_head_variant(head.into());
        }
        if let Some(format) = self.format {
            config = config.with_image_format(format.into());
        }
        if let Some(window) = self.window {
            config = config.with_window(window);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(epochs) = self.epochs {
            config = config.with_epochs(epochs);
        }
        if let Some(dir) = &self.csv_dir {
            config = config.with_csv_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if self.fingerprint {
            config = config.with_cache_policy(CachePolicy::Fingerprint);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ich", "run"]);
        assert_eq!(cli.command, Command::Run);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.head_variant, HeadVariant::Separate);
        assert_eq!(config.cache_policy, CachePolicy::Exists);
    }

    #[test]
    fn test_flag_overrides() {
        let cli = Cli::parse_from([
            "ich",
            "train",
            "--debug",
            "--head",
            "shared",
            "--format",
            "dicom",
            "--window",
            "80,200",
            "--epochs",
            "3",
            "--fingerprint",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.head_variant, HeadVariant::Shared);
        assert_eq!(config.image_format, ImageFormat::Dicom);
        assert_eq!(config.window, WindowSetting::new(80.0, 200.0));
        assert_eq!(config.cache_policy, CachePolicy::Fingerprint);
    }

    #[test]
    fn test_json_then_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"batch_size": 16, "epochs": 2}"#).unwrap();

        let cli = Cli::parse_from([
            "ich",
            "predict",
            "--config",
            path.to_str().unwrap(),
            "--epochs",
            "5",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.epochs, 5);
    }

    #[test]
    fn test_bad_window_is_rejected() {
        assert!(Cli::try_parse_from(["ich", "run", "--window", "soft tissue"]).is_err());
    }
}
