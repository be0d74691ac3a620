//! Bulk JSONL import into an event store

use crate::input::InputReader;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use quiver_core::{Error, Event, EventStore};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Events per transaction
    pub batch_size: usize,
    /// Check ids and signatures with nostr-sdk
    pub verify: bool,
    pub filter_invalid_kinds: bool,
    pub show_progress: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            verify: false,
            filter_invalid_kinds: false,
            show_progress: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub total_lines: u64,
    pub inserted: u64,
    pub ephemeral: u64,
    pub rejected: u64,
    pub expired: u64,
    pub invalid: u64,
    pub skipped_lines: u64,
    pub filtered_lines: u64,
}

impl ImportStats {
    /// Lines that made it through parsing
    pub fn parsed(&self) -> u64 {
        self.inserted + self.ephemeral + self.rejected + self.expired
    }

    pub fn print_summary(&self) {
        println!("\n📊 Import Summary:");
        println!("  Total lines processed: {}", self.total_lines);
        println!("  ✅ Inserted:           {}", self.inserted);
        println!("  💨 Ephemeral:          {}", self.ephemeral);
        println!("  ⏭️  Rejected:           {}", self.rejected);
        println!("  ⌛ Expired:            {}", self.expired);
        println!("  ❌ Invalid:            {}", self.invalid);
        if self.skipped_lines > 0 {
            println!("  Skipped lines:         {}", self.skipped_lines);
        }
        if self.filtered_lines > 0 {
            println!("  Filtered lines:        {}", self.filtered_lines);
        }
    }
}

/// Import every line of `input` into `store`
pub fn import(store: &mut EventStore, input: &str, options: &ImportOptions) -> Result<ImportStats> {
    let mut reader = InputReader::with_options(input, options.filter_invalid_kinds)?;
    let progress = options.show_progress.then(spinner);
    let batch_size = options.batch_size.max(1);

    let mut stats = ImportStats::default();
    let mut batch: Vec<(u64, Event)> = Vec::with_capacity(batch_size);

    for (index, line_result) in reader.by_ref().enumerate() {
        let line_num = index as u64 + 1;
        stats.total_lines += 1;

        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read line {}: {:#}", line_num, e);
                stats.skipped_lines += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            stats.skipped_lines += 1;
            continue;
        }

        let parsed = if options.verify {
            Event::verified_from_json(&line)
        } else {
            Event::try_from(line.as_str())
        };
        match parsed {
            Ok(event) => batch.push((line_num, event)),
            Err(e) => {
                warn!("Failed to parse event on line {}: {}", line_num, e);
                stats.invalid += 1;
            }
        }

        if batch.len() >= batch_size {
            store_batch(store, &mut batch, &mut stats)?;
            if let Some(pb) = &progress {
                pb.set_message(status(&stats));
            }
        }
    }
    store_batch(store, &mut batch, &mut stats)?;
    stats.filtered_lines = reader.filtered_count() as u64;

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Complete! {}", status(&stats)));
    }
    info!(
        inserted = stats.inserted,
        rejected = stats.rejected,
        invalid = stats.invalid,
        "Import complete"
    );
    Ok(stats)
}

/// Write one batch in a single transaction; rejections are counted, not fatal
fn store_batch(store: &mut EventStore, batch: &mut Vec<(u64, Event)>, stats: &mut ImportStats) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    store
        .transaction(|tx| {
            for (line_num, event) in batch.iter() {
                match tx.insert(event) {
                    Ok(true) => stats.inserted += 1,
                    Ok(false) => stats.ephemeral += 1,
                    Err(Error::Rejected(reason)) => {
                        debug!(line = line_num, id = %event.id, %reason, "Rejected event");
                        stats.rejected += 1;
                    }
                    Err(Error::Expired { id, expiration }) => {
                        debug!(line = line_num, %id, expiration, "Skipped expired event");
                        stats.expired += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
        .context("Failed to write batch")?;

    batch.clear();
    Ok(())
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn status(stats: &ImportStats) -> String {
    format!(
        "Processed: {} | Inserted: {} | Rejected: {} | Invalid: {}",
        stats.total_lines, stats.inserted, stats.rejected, stats.invalid
    )
}
