use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecg_image_synth::crop_pairs::{self, CropDirs};
use ecg_image_synth::generate::{self, ErrorPolicy, Generator, OutputOptions};
use ecg_image_synth::{wfdb_read, yolo_export, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthetic ECG page images, masks and lead boxes")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render WFDB records into ECG pages
    Generate {
        /// WFDB record (any of .hea/.dat/base path) or directory of records
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for page images and annotation records
        #[arg(short, long)]
        output: PathBuf,

        /// Directory for masks; implies --masks
        #[arg(long)]
        mask_dir: Option<PathBuf>,

        /// Also write trace masks, by default into <output>/../masks
        #[arg(long)]
        masks: bool,

        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Render a single frame starting at this sample
        #[arg(long)]
        start_index: Option<usize>,

        /// Seed for appearance sampling, overrides the config
        #[arg(long)]
        seed: Option<u64>,

        /// Count failed records and continue instead of stopping
        #[arg(long)]
        keep_going: bool,

        /// Stop after this many page images
        #[arg(long)]
        max_images: Option<usize>,
    },

    /// Convert annotation records into YOLO label files
    YoloLabels {
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Crop pages and masks into per-lead pairs
    Crop {
        #[arg(long)]
        image_dir: PathBuf,

        #[arg(long)]
        mask_dir: PathBuf,

        #[arg(long)]
        annotation_dir: PathBuf,

        #[arg(long)]
        image_output_dir: PathBuf,

        #[arg(long)]
        mask_output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Generate {
            input,
            output,
            mask_dir,
            masks,
            config,
            start_index,
            seed,
            keep_going,
            max_images,
        } => {
            let config = Config::load(&config)?;
            let records = wfdb_read::find_records(&input)?;
            log::info!("Found {} records under {}", records.len(), input.display());

            let mask_dir = match mask_dir {
                Some(dir) => Some(dir),
                None if masks => Some(OutputOptions::default_mask_dir(&output)),
                None => None,
            };
            let out = OutputOptions {
                image_dir: output,
                mask_dir,
                start_index,
            };
            let policy = if keep_going {
                ErrorPolicy::KeepGoing
            } else {
                ErrorPolicy::Abort
            };

            let mut generator = Generator::new(&config, seed)?.with_image_limit(max_images);
            let summary = generate::run_batch(&mut generator, &records, &out, policy)
                .context("Batch generation stopped")?;
            println!(
                "Processed {} records ({} skipped, {} failed), {} pages written",
                summary.processed, summary.skipped, summary.failed, summary.frames
            );
        }
        Command::YoloLabels {
            data_dir,
            output_dir,
        } => {
            let summary = yolo_export::export_dir(&data_dir, &output_dir)?;
            println!(
                "Converted {} records ({} skipped) into {}",
                summary.converted,
                summary.skipped,
                output_dir.display()
            );
        }
        Command::Crop {
            image_dir,
            mask_dir,
            annotation_dir,
            image_output_dir,
            mask_output_dir,
        } => {
            let summary = crop_pairs::crop_dir(&CropDirs {
                image_dir,
                mask_dir,
                annotation_dir,
                image_output_dir,
                mask_output_dir,
            })?;
            println!(
                "Cropped {} pages into {} pairs ({} skipped)",
                summary.pages, summary.crops, summary.skipped
            );
        }
    }

    Ok(())
}
