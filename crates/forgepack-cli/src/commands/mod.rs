pub mod build;
pub mod completions;
pub mod inspect;
pub mod man_pages;
pub mod validate;
pub mod watch;

use forgepack_core::{Forge, RunOutput, Stats};
use forgepack_schema::{Mode, RawInput};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::LocalSet;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_BUILD_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_mode(mode: Option<Mode>) -> String {
    use console::Style;
    match mode {
        Some(Mode::Development) => Style::new().yellow().apply_to("development").to_string(),
        Some(Mode::Production) => Style::new().green().apply_to("production").to_string(),
        Some(Mode::None) => Style::new().dim().apply_to("none").to_string(),
        None => "(unset)".to_owned(),
    }
}

/// Run `future` to completion on a current-thread runtime inside a `LocalSet`.
pub fn block_on_local<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    Ok(LocalSet::new().block_on(&runtime, future))
}

/// Start `input` through [`Forge::run`] and print every reported result until
/// the engines stop. Returns the first error message, if any result failed.
pub fn drive(forge: &Forge, input: &RawInput, json: bool, label: &str) -> Result<u8, String> {
    let pb = if json { None } else { Some(spinner(label)) };
    let failure = block_on_local(async {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _forged = forge.run(input, move |result| {
            let _ = tx.send(result);
        });

        let mut failure: Option<String> = None;
        let mut first = true;
        while let Some(result) = rx.recv().await {
            let spin = if first { pb.as_ref() } else { None };
            first = false;
            match result {
                Ok(output) => {
                    if let Some(pb) = spin {
                        spin_ok(pb, "build complete");
                    }
                    print_output(&output, json)?;
                }
                Err(e) => {
                    if let Some(pb) = spin {
                        spin_fail(pb, "build failed");
                    } else {
                        eprintln!("error: {e}");
                    }
                    failure.get_or_insert_with(|| e.to_string());
                }
            }
        }
        Ok::<_, String>(failure)
    })??;

    match failure {
        Some(msg) => Err(msg),
        None => Ok(EXIT_SUCCESS),
    }
}

fn print_output(output: &RunOutput, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(output)?);
        return Ok(());
    }
    for stats in output.stats() {
        print_stats(stats);
    }
    Ok(())
}

fn print_stats(stats: &Stats) {
    let name = stats.name.as_deref().unwrap_or("<unnamed>");
    let short: String = stats.hash.chars().take(12).collect();
    println!(
        "{} [{}] {} in {}ms",
        console::style(name).bold(),
        colorize_mode(stats.mode),
        short,
        stats.duration_ms
    );
    for asset in &stats.assets {
        println!("  {asset}");
    }
    for warning in &stats.warnings {
        println!("  {} {warning}", console::style("warning").yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_mode_names_the_mode() {
        assert!(colorize_mode(Some(Mode::Development)).contains("development"));
        assert!(colorize_mode(Some(Mode::Production)).contains("production"));
        assert_eq!(colorize_mode(None), "(unset)");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_BUILD_ERROR);
    }

    #[test]
    fn block_on_local_runs_spawned_tasks() {
        let value = block_on_local(async {
            tokio::task::spawn_local(async { 7 }).await.unwrap()
        })
        .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
