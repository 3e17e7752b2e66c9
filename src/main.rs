use clap::Parser;
use log::{error, info, warn};
use std::error::Error;
use std::process::ExitCode;

use crowd2dataset::cleansing::cleanse_directory;
use crowd2dataset::frames::extract_frames;
use crowd2dataset::io::read_raw_records;
use crowd2dataset::preset::run_preset;
use crowd2dataset::utils::init_logging;
use crowd2dataset::vqa::map_vqa_images;
use crowd2dataset::{run_conversion, run_translation, AnnotationKind, Cli, Command, ProcessingStats};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_dir.as_deref(), command_name(&cli.command)) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Object(_) => "object",
        Command::Scene(_) => "scene",
        Command::Vqa(_) => "vqa",
        Command::Translate(_) => "translate",
        Command::Frames(_) => "frames",
        Command::Cleanse(_) => "cleanse",
        Command::VqaImages(_) => "vqa_images",
        Command::Preset(_) => "preset",
    }
}

fn run(command: &Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Object(args) => {
            run_conversion(args, AnnotationKind::Object)?;
        }
        Command::Scene(args) => {
            run_conversion(args, AnnotationKind::Scene)?;
        }
        Command::Vqa(args) => {
            run_conversion(args, AnnotationKind::Vqa)?;
        }
        Command::Translate(args) => {
            info!("Starting {} label translation...", args.kind.name());
            run_translation(args)?;
        }
        Command::Frames(args) => {
            let saved = extract_frames(&args.video, &args.out_dir, args.interval)?;
            info!("Frame extraction completed: {} frames", saved);
        }
        Command::Cleanse(args) => {
            let files = cleanse_directory(&args.dir)?;
            info!("Cleansed {} files", files.len());
        }
        Command::VqaImages(args) => {
            let mut stats = ProcessingStats::new();
            for record in read_raw_records(&args.input, &mut stats)? {
                info!("=== VQA image mapping for dataID {} ===", record.display_id());
                for selection in map_vqa_images(&record) {
                    for (image, file) in &selection.resolved {
                        match file {
                            Some(file) => info!("VQA_{}: {} -> {}", selection.slot, image, file),
                            None => warn!("VQA_{}: {} -> no matching import file", selection.slot, image),
                        }
                    }
                }
            }
        }
        Command::Preset(args) => {
            let presets = run_preset(args)?;
            info!("Created {} of {} presets", presets.len(), args.videos.len());
        }
    }
    Ok(())
}
