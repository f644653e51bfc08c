// UI layer: provides the interactive menu using `dialoguer`.
// The functions are small and synchronous; each flow gathers its inputs,
// delegates to the submission client or batch driver, and prints the
// outcome.

use crate::api::ReportClient;
use crate::batch::{self, run_batch, BatchOptions, BatchPlan, BatchProgress, BatchSummary};
use crate::config::Config;
use crate::schedule::{self, DateRange};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Main interactive menu. Receives a `ReportClient` and runs a select
/// loop until the user chooses "Exit".
///
/// Note: `Select::interact()` is keyboard-driven: arrow keys and Enter
/// choose an option.
pub fn main_menu(client: ReportClient) -> Result<()> {
    println!("AID report regeneration");

    loop {
        let items = vec![
            "Batch process configured months (daily ranges)",
            "Single date range (custom)",
            "Yesterday's date range",
            "Resume batch from a request number",
            "Exit",
        ];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => batch_flow(&client, 1)?,
            1 => single_range_flow(&client)?,
            2 => yesterday_flow(&client)?,
            3 => resume_flow(&client)?,
            4 => break,
            _ => {}
        }
    }
    Ok(())
}

/// Describe the batch plan, ask for confirmation, then run it with a
/// progress bar. `start_from` is 1 for a fresh run.
fn batch_flow(client: &ReportClient, start_from: usize) -> Result<()> {
    let config = client.config();
    let ranges = schedule::daily_ranges(&config.batch_months);
    let plan = BatchPlan::new(ranges, config.templates.ids());
    let total = plan.total_requests();
    if total == 0 {
        println!("Nothing to do: no batch months configured.");
        return Ok(());
    }

    if start_from > 1 {
        println!("Resuming batch processing from request #{start_from}");
    }
    println!(
        "Will process {} days across {} configured month(s)",
        plan.days(),
        config.batch_months.len()
    );
    let ids = plan
        .template_ids()
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "Each day will have {} requests (template ids: {ids})",
        plan.requests_per_day()
    );
    println!("Total requests: {total}");
    if start_from > 1 {
        println!("Remaining requests: {}", total - start_from + 1);
    }

    let proceed = Confirm::new()
        .with_prompt("Proceed with batch processing?")
        .default(false)
        .interact()?;
    if !proceed {
        println!("Operation cancelled.");
        return Ok(());
    }

    let bar = ProgressBar::new(total as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}").unwrap());
    bar.set_position((start_from - 1) as u64);

    let opts = BatchOptions {
        start_from,
        pause: config.request_pause,
        record_checkpoint: true,
    };
    let outcome = run_batch(client, &plan, &opts, |progress| match progress {
        BatchProgress::Submitting { request, total } => {
            bar.set_message(format!(
                "[{}/{}] template {} for {}",
                request.number, total, request.template_id, request.range
            ));
        }
        BatchProgress::Completed { record } => {
            match &record.result {
                Ok(_) => bar.println(format!(
                    "[{}] template {} for {}: ok ({} attempt(s))",
                    record.number, record.template_id, record.range, record.attempts
                )),
                Err(err) => bar.println(format!(
                    "[{}] template {} for {}: failed: {err}",
                    record.number, record.template_id, record.range
                )),
            }
            bar.inc(1);
        }
        BatchProgress::Pausing { seconds } => {
            bar.set_message(format!("waiting {seconds}s before the next request"));
        }
    });
    bar.finish_and_clear();

    print_summary(&outcome.summary, start_from);
    Ok(())
}

/// Collect a template and custom date range, then submit once.
fn single_range_flow(client: &ReportClient) -> Result<()> {
    let template_id = prompt_template(client.config())?;
    let start = prompt_stamp("Start date (YYYY-MM-DD HH:MM:SS)")?;
    let end = prompt_stamp("End date (YYYY-MM-DD HH:MM:SS)")?;
    submit_one(client, &DateRange::new(start, end), template_id)
}

/// Submit yesterday's full day for one template.
fn yesterday_flow(client: &ReportClient) -> Result<()> {
    let template_id = prompt_template(client.config())?;
    let today = Local::now().date_naive();
    let range =
        schedule::yesterday_range(today).context("no previous day exists for today's date")?;
    submit_one(client, &range, template_id)
}

/// Ask for the last completed request number and continue the batch
/// after it. A persisted checkpoint pre-fills the prompt.
fn resume_flow(client: &ReportClient) -> Result<()> {
    let config = client.config();
    let ranges = schedule::daily_ranges(&config.batch_months);
    let plan = BatchPlan::new(ranges, config.templates.ids());
    let total = plan.total_requests();
    if total == 0 {
        println!("Nothing to resume: no batch months configured.");
        return Ok(());
    }

    let prompt = format!("Last completed request number (1-{total})");
    let validator = move |n: &usize| -> std::result::Result<(), String> {
        if (1..=total).contains(n) {
            Ok(())
        } else {
            Err(format!("Enter a number between 1 and {total}"))
        }
    };
    // A checkpoint from an earlier run pre-fills the prompt.
    let saved = batch::load_checkpoint().filter(|n| (1..=total).contains(n));
    let last_done: usize = match saved {
        Some(saved) => Input::new()
            .with_prompt(prompt)
            .validate_with(validator)
            .default(saved)
            .interact_text()?,
        None => Input::new()
            .with_prompt(prompt)
            .validate_with(validator)
            .interact_text()?,
    };

    if last_done >= total {
        println!("Batch already complete: request {last_done} was the final one.");
        return Ok(());
    }
    batch_flow(client, last_done + 1)
}

/// Pick one of the configured templates.
fn prompt_template(config: &Config) -> Result<u32> {
    let specs = config.templates.specs();
    let labels: Vec<String> = specs
        .iter()
        .map(|spec| format!("{} (template {})", spec.label, spec.id))
        .collect();
    let selection = Select::new()
        .with_prompt("Report template")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(specs[selection].id)
}

/// Prompt for one timestamp, re-asking until it parses.
fn prompt_stamp(prompt: &str) -> Result<NaiveDateTime> {
    let text: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|raw: &String| -> std::result::Result<(), &str> {
            match schedule::parse_stamp(raw) {
                Ok(_) => Ok(()),
                Err(_) => Err("Invalid date format. Use YYYY-MM-DD HH:MM:SS (e.g. 2025-11-16 00:00:00)"),
            }
        })
        .interact_text()?;
    Ok(schedule::parse_stamp(&text)?)
}

/// Submit a single request, showing a spinner while it is in flight.
fn submit_one(client: &ReportClient, range: &DateRange, template_id: u32) -> Result<()> {
    println!("Generating report for date range: {range}");
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(format!("Submitting template {template_id}..."));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = client.submit(range, template_id);
    spinner.finish_and_clear();

    match result {
        Ok(body) => println!("Request completed successfully: {body}"),
        Err(err) => println!("Request failed: {err}"),
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, start_from: usize) {
    println!("Batch processing summary");
    println!("  total requests: {}", summary.total);
    if start_from > 1 {
        println!("  started from request: {start_from}");
    }
    println!("  attempted: {}", summary.attempted);
    println!("  successful: {}", summary.succeeded);
    println!("  failed: {}", summary.failed);
    if summary.attempted > 0 {
        println!("  success rate: {:.1}%", summary.success_rate());
    }
}
