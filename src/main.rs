// Entry point and high-level CLI flow.
//
// - Option [1] loads and normalizes the three extracts, printing diagnostics.
// - Option [2] previews enrolment and update volume over time.
// - Option [3] scores districts and exports the feature and high-risk tables.
// - Option [4] sizes kits and staff for one district under a growth scenario.
// - Option [5] shows what normalization dropped and likely duplicate names.
use anyhow::{Context, Result};
use clap::Parser;
use district_pulse::logging::init_logging;
use district_pulse::quality::{duplicate_district_variants, unrecognized_regions};
use district_pulse::resources::Advisory;
use district_pulse::types::Category;
use district_pulse::util::{format_int, format_number};
use district_pulse::{output, reports, Config, PulseService};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "district_pulse", about = "District load monitoring and risk scoring")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `data_dir` from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where exported reports are written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

/// Read a single trimmed line after printing `prompt`. `None` once input is
/// closed or unreadable.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    next_line(&mut io::stdin().lock())
}

fn next_line(input: &mut impl BufRead) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Handle option [1]: load the extracts. Also used at startup, where a
/// failure is fatal.
fn handle_load(service: &PulseService, force: bool) -> Result<()> {
    let loaded = if force {
        service.rebuild()
    } else {
        service.build()
    };
    let dataset = loaded.context("Failed to load data")?;

    for category in Category::ALL {
        let report = &dataset.table(category).report;
        println!(
            "{}: {} rows read, {} kept",
            category,
            format_int(report.rows_read as u64),
            format_int(report.rows_kept as u64)
        );
        if report.used_fallback_date_parser {
            println!("  Note: dates did not match the configured format; parsed permissively.");
        }
    }
    println!();
    Ok(())
}

fn handle_pulse(service: &PulseService) -> Result<()> {
    let dataset = service.build()?;
    println!("Enrolment Trends (Annual)\n");
    output::preview_table_rows(&reports::enrolment_trend_rows(&dataset), 20);
    println!("Enrolment by Age Bracket\n");
    output::preview_table_rows(&reports::age_split_rows(&dataset), 10);
    println!("Monthly Update Volume (Demographic vs Biometric)\n");
    output::preview_table_rows(&reports::update_trend_rows(&dataset), 48);
    println!("Seasonality\n");
    output::preview_table_rows(&reports::seasonality_rows(&dataset), 3);
    Ok(())
}

/// Handle option [3]: score, export three files, print the ranked list.
fn handle_anomalies(service: &PulseService, out_dir: &Path) -> Result<()> {
    println!("Analyzing district patterns...");
    let report = service.rescore()?;
    let summary = reports::anomaly_summary(&report, &service.config().scoring);

    println!(
        "Total Districts Scanned: {}   Anomalies Detected: {}   Max Risk Score: {}\n",
        format_int(summary.districts_scanned as u64),
        format_int(summary.anomalies_detected as u64),
        format_number(summary.max_risk_score, 2)
    );

    let features = reports::feature_rows(&report);
    let high_risk = reports::high_risk_rows(&report, usize::MAX);
    let file1 = out_dir.join("district_features.csv");
    let file2 = out_dir.join("high_risk_districts.csv");
    let file3 = out_dir.join("anomaly_summary.json");
    for result in [
        output::write_csv(&file1, &features),
        output::write_csv(&file2, &high_risk),
        output::write_json(&file3, &summary),
    ] {
        if let Err(e) = result {
            error!("Write error: {}", e);
        }
    }

    println!("High-Risk Districts\n");
    output::preview_table_rows(&high_risk, 10);
    let peers = reports::peer_rows(&report, 3.0);
    if !peers.is_empty() {
        println!("Unusual Load Within Region (|z| > 3)\n");
        output::preview_table_rows(&peers, 10);
    }
    println!(
        "(Full tables exported to {} and {})\n",
        file1.display(),
        file2.display()
    );
    Ok(())
}

fn handle_allocator(service: &PulseService) -> Result<()> {
    let regions = service.regions()?;
    for (i, r) in regions.iter().enumerate() {
        println!("[{}] {}", i + 1, r);
    }
    let Some(choice) = read_line("Select region: ") else {
        return Ok(());
    };
    let Some(region) = pick(&regions, &choice) else {
        println!("Invalid region.\n");
        return Ok(());
    };
    let districts = service.districts_in(region)?;
    for (i, d) in districts.iter().enumerate() {
        println!("[{}] {}", i + 1, d);
    }
    let Some(choice) = read_line("Select district: ") else {
        return Ok(());
    };
    let Some(district) = pick(&districts, &choice) else {
        println!("Invalid district.\n");
        return Ok(());
    };
    let Some(growth) = read_line("Predicted growth % (default 20): ") else {
        return Ok(());
    };
    let growth_pct: f64 = match growth.as_str() {
        "" => 20.0,
        s => match s.parse() {
            Ok(v) => v,
            Err(_) => {
                println!("Invalid growth.\n");
                return Ok(());
            }
        },
    };

    let plan = match service.recommend(region, district, growth_pct / 100.0) {
        Ok(plan) => plan,
        Err(e) => {
            println!("{}\n", e);
            return Ok(());
        }
    };
    println!();
    println!("Projected Monthly Load: {}", format_int(plan.projected_monthly_load));
    println!("Biometric Kits Needed:  {}", format_int(plan.kits_required));
    println!("Staff Required:         {}", format_int(plan.staff_required));
    match plan.advisory() {
        Advisory::HighDemand => println!("High Resource Demand! Consider deploying Mobile Vans."),
        Advisory::Sufficient => println!("Current infrastructure is sufficient."),
        Advisory::Moderate => {}
    }
    println!();
    Ok(())
}

fn pick<'a>(items: &'a [String], choice: &str) -> Option<&'a String> {
    let idx: usize = choice.parse().ok()?;
    items.get(idx.checked_sub(1)?)
}

fn handle_quality(service: &PulseService) -> Result<()> {
    let dataset = service.build()?;
    println!("Normalization Summary\n");
    output::preview_table_rows(&reports::quality_rows(&dataset), 3);

    for category in Category::ALL {
        let rejected = unrecognized_regions(&dataset.table(category).report);
        if rejected.is_empty() {
            continue;
        }
        println!("Unrecognized regions in {}:", category);
        for (name, count) in rejected.iter().take(15) {
            println!("  '{}' ({} records)", name, format_int(*count as u64));
        }
        println!();
    }

    let duplicates = duplicate_district_variants(&dataset.demographic);
    println!("Possible duplicate districts: {}", duplicates.len());
    for group in duplicates.iter().take(25) {
        let variants: Vec<String> = group
            .variants
            .iter()
            .map(|(v, n)| format!("'{}' ({})", v, n))
            .collect();
        println!("  {}: {}", group.region, variants.join(", "));
    }
    println!();
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let service = PulseService::from_config(config)?;

    // An empty core dataset makes every view misleading, so refuse to start.
    handle_load(&service, false)?;

    loop {
        println!("Select Module:");
        println!("[1] Reload data");
        println!("[2] Pulse Monitor");
        println!("[3] Anomaly Hunter");
        println!("[4] Infrastructure Allocator");
        println!("[5] Data Quality");
        println!("[0] Exit\n");
        let Some(choice) = read_line("Enter choice: ") else {
            println!("\nInput closed, exiting.");
            return Ok(());
        };
        let result = match choice.as_str() {
            "1" => handle_load(&service, true),
            "2" => handle_pulse(&service),
            "3" => handle_anomalies(&service, &args.out_dir),
            "4" => handle_allocator(&service),
            "5" => handle_quality(&service),
            "0" => {
                println!("Exiting the program.");
                return Ok(());
            }
            _ => {
                println!("Invalid choice. Please enter 0-5.\n");
                Ok(())
            }
        };
        // Failures inside a module are reported and the menu stays up, so a
        // failed run can be retried.
        if let Err(e) = result {
            eprintln!("{:#}\n", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closed_input_ends_the_prompt_loop() {
        let mut input = Cursor::new("3\n  2 \n");
        assert_eq!(next_line(&mut input).as_deref(), Some("3"));
        assert_eq!(next_line(&mut input).as_deref(), Some("2"));
        assert_eq!(next_line(&mut input), None);
        assert_eq!(next_line(&mut Cursor::new("")), None);
    }

    #[test]
    fn blank_line_is_not_end_of_input() {
        let mut input = Cursor::new("\n");
        assert_eq!(next_line(&mut input).as_deref(), Some(""));
        assert_eq!(next_line(&mut input), None);
    }

    #[test]
    fn menu_picks_are_one_based() {
        let items = vec!["Goa".to_string(), "Odisha".to_string()];
        assert_eq!(pick(&items, "2").map(String::as_str), Some("Odisha"));
        assert_eq!(pick(&items, "0"), None);
        assert_eq!(pick(&items, "3"), None);
        assert_eq!(pick(&items, "x"), None);
    }
}
