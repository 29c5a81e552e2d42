use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use extentcheck::bounds::Margin;
use extentcheck::cli::{render_template, CheckArgs, Cli, Commands, NotebookAction, OutputFormat};
use extentcheck::dataset::{ExtentSource, GeoJsonExtent, NetcdfExtent};
use extentcheck::info::{
    get_netcdf_info, print_file_info_csv, print_file_info_human, print_file_info_json,
    print_file_info_yaml,
};
use extentcheck::masks::{print_mask_summaries_human, summarize_mask_dir};
use extentcheck::notebook::Notebook;
use extentcheck::report::{
    print_overlap_human, print_overlap_json, print_overlap_yaml, print_report_human,
    print_report_json, print_report_yaml, OverlapReport,
};
use extentcheck::{run_bounds_job, JobError};
use log::{debug, error, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let start_time = Instant::now();
    match run(cli) {
        Ok(()) => {
            debug!("Finished in {:.2?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<JobError>() {
                Some(job_error) if job_error.is_missing_input() => {
                    error!("Missing input: {}", job_error)
                }
                _ => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    }
    builder.format_timestamp(None).init();
}

fn run(cli: Cli) -> Result<()> {
    let format = cli.output_format.clone();
    match cli.command {
        Commands::Check(args) => run_check(&args, cli.config.as_deref(), &format),
        Commands::Overlap {
            reference,
            candidate,
            margin,
        } => {
            let margin = Margin::new(margin).context("Invalid --margin")?;
            let report = OverlapReport::new(reference, candidate, margin);
            match format {
                OutputFormat::Json => print_overlap_json(&report)?,
                OutputFormat::Yaml => print_overlap_yaml(&report)?,
                _ => print_overlap_human(&report),
            }
            Ok(())
        }
        Commands::Info {
            file,
            detailed,
            variable,
            format: info_format,
        } => {
            let info = get_netcdf_info(&file, variable.as_deref(), detailed)?;
            match info_format.unwrap_or(format) {
                OutputFormat::Human => print_file_info_human(&info),
                OutputFormat::Json => print_file_info_json(&info)?,
                OutputFormat::Yaml => print_file_info_yaml(&info)?,
                OutputFormat::Csv => print_file_info_csv(&info),
            }
            Ok(())
        }
        Commands::Nearest {
            file,
            point: (x, y),
            x_name,
            y_name,
        } => {
            let extent = NetcdfExtent::new(&file)
                .with_coordinate_names(x_name, y_name)
                .load_extent()
                .with_context(|| format!("Failed to load grid from {}", file))?;
            let Some(grid) = extent.grid else {
                bail!("{} has no grid axes", file);
            };
            match grid.nearest_cell(x, y) {
                Some(cell) => match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cell)?),
                    OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&cell)?),
                    _ => println!(
                        "Nearest cell to ({}, {}): row {}, col {} at ({}, {})",
                        x, y, cell.row, cell.col, cell.x, cell.y
                    ),
                },
                None => {
                    warn!("({}, {}) lies outside {}", x, y, extent.bounds);
                    println!("Point ({}, {}) is outside the grid domain", x, y);
                }
            }
            Ok(())
        }
        Commands::Regions {
            file,
            name_property,
            exclude,
        } => {
            let regions = GeoJsonExtent::new(&file)
                .with_exclude(exclude)
                .feature_extents(&name_property)
                .with_context(|| format!("Failed to read regions from {}", file.display()))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&regions)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&regions)?),
                _ => {
                    println!("Regions in {} ({}):", file.display(), regions.len());
                    for region in &regions {
                        let name = region.name.as_deref().unwrap_or("<unnamed>");
                        match &region.bounds {
                            Some(bounds) => println!("  {}: {}", name, bounds),
                            None => println!("  {}: no geometry", name),
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Masks {
            dir,
            threshold,
            no_progress,
        } => {
            let show_progress = !no_progress && !cli.quiet && format == OutputFormat::Human;
            let summaries = summarize_mask_dir(&dir, threshold, show_progress)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&summaries)?),
                _ => print_mask_summaries_human(&summaries),
            }
            Ok(())
        }
        Commands::Notebook { action } => run_notebook(action),
        Commands::Template { output, format } => {
            let template = render_template(&format)?;
            write_output(output.as_deref(), &template)
        }
        Commands::Completions { shell, output } => {
            let mut cmd = Cli::command();
            let mut buf = Vec::new();
            generate(shell, &mut cmd, "extentcheck", &mut buf);
            write_output(output.as_deref(), &String::from_utf8_lossy(&buf))
        }
    }
}

fn run_check(args: &CheckArgs, config_path: Option<&Path>, format: &OutputFormat) -> Result<()> {
    let config = args.build_job(config_path)?;
    info!(
        "Checking {} candidate(s) against a {} reference",
        config.candidates.len(),
        config.reference.kind()
    );
    let report = run_bounds_job(&config)?;
    match format {
        OutputFormat::Json => print_report_json(&report)?,
        OutputFormat::Yaml => print_report_yaml(&report)?,
        OutputFormat::Human => print_report_human(&report),
        OutputFormat::Csv => {
            warn!("CSV output is not available for reports, using human format");
            print_report_human(&report);
        }
    }
    if !report.all_passed() {
        warn!("Some candidates do not cover the reference");
    }
    Ok(())
}

fn run_notebook(action: NotebookAction) -> Result<()> {
    let load = |path: &PathBuf| {
        Notebook::from_file(path)
            .with_context(|| format!("Failed to read notebook {}", path.display()))
    };
    match action {
        NotebookAction::Find { notebook, needles } => {
            let nb = load(&notebook)?;
            let needles: Vec<&str> = needles.iter().map(String::as_str).collect();
            let cells = nb.find_code_cells(&needles);
            if cells.is_empty() {
                println!("No code cell contains all of: {}", needles.join(", "));
            }
            for cell in cells {
                println!("Cell {}", cell);
            }
        }
        NotebookAction::Lines {
            notebook,
            cell,
            needle,
        } => {
            let nb = load(&notebook)?;
            for (line, text) in nb.find_lines(cell, &needle)? {
                println!("Line {}: {}", line, text);
            }
        }
        NotebookAction::RemoveLine {
            notebook,
            line,
            write,
        } => {
            let mut nb = load(&notebook)?;
            let modified = nb.remove_line(&line);
            if modified.is_empty() {
                println!("Line not found in any code cell");
                return Ok(());
            }
            println!("Line found in cell(s): {:?}", modified);
            if write {
                nb.write_to(&notebook)
                    .with_context(|| format!("Failed to write notebook {}", notebook.display()))?;
                info!("Patched {}", notebook.display());
            } else {
                println!("Dry run, pass --write to save the notebook");
            }
        }
        NotebookAction::Checklist {
            notebook,
            markers,
            items,
        } => {
            let nb = load(&notebook)?;
            let markers: Vec<&str> = markers.iter().map(String::as_str).collect();
            let items: Vec<&str> = items.iter().map(String::as_str).collect();
            let Some(checklist) = nb.section_checklist(&markers, &items) else {
                bail!("No code cell contains all of: {}", markers.join(", "));
            };
            println!("Section found in cell {}", checklist.cell);
            for (item, present) in &checklist.items {
                println!("  [{}] {}", if *present { "x" } else { " " }, item);
            }
        }
    }
    Ok(())
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
