use ortho_vp::config::vp_demo::{self as cfg, VpDemoConfig};
use ortho_vp::io::{load_line_set, save_assignment_overlay, write_json_file};
use ortho_vp::{process_lines, PipelineParams, VpReport};
use rayon::prelude::*;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = cfg::load_config(Path::new(&config_path))?;
    if config.inputs.is_empty() {
        return Err("Config lists no inputs".to_string());
    }

    fs::create_dir_all(&config.output.dir)
        .map_err(|e| format!("Failed to create {}: {e}", config.output.dir.display()))?;

    let params = config.resolve_pipeline_params();
    let results: Vec<(PathBuf, Result<VpReport, String>)> = config
        .inputs
        .par_iter()
        .map(|input| (input.clone(), process_input(input, &config, &params)))
        .collect();

    let mut failures = 0usize;
    for (input, result) in results {
        println!("== {}", input.display());
        match result {
            Ok(report) => {
                report.print_text_summary();
                println!(
                    "Wrote result JSON to {}",
                    config.output.result_path(&input).display()
                );
            }
            Err(err) => {
                failures += 1;
                eprintln!("Error: {err}");
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} input(s) could not be processed"));
    }
    Ok(())
}

fn usage() -> String {
    "Usage: vp_demo <config.json>".to_string()
}

fn process_input(
    input: &Path,
    config: &VpDemoConfig,
    params: &PipelineParams,
) -> Result<VpReport, String> {
    let set = load_line_set(input)?;
    let size = set.image_size();
    let intrinsics = config
        .camera
        .resolve(size)
        .map_err(|e| format!("Invalid camera for {}: {e}", input.display()))?;

    let report = process_lines(&set.lines, size, intrinsics, params);
    write_json_file(&config.output.result_path(input), &report)?;

    if config.output.overlay {
        let (lines, associations) = match &report {
            VpReport::Success {
                lines,
                associations,
                ..
            } => (lines.clone(), associations.clone()),
            _ => (set.lines.clone(), vec![None; set.lines.len()]),
        };
        save_assignment_overlay(
            &config.output.overlay_path(input),
            size,
            set.background.as_deref(),
            &lines,
            &associations,
        )?;
    }
    Ok(report)
}
