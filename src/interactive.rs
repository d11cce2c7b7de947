use crate::config::Config;
use crate::pipeline::MAX_REPEAT_COUNT;
use crate::source::SUPPORTED_EXTENSIONS;
use console::style;
use dialoguer::{Confirm, FuzzySelect, Input};
use std::fs;
use std::path::PathBuf;

pub struct InteractiveResult {
    pub input: PathBuf,
    pub repeat_count: u32,
    pub extract: bool,
}

/// Wizard used when no input file is given on the command line: pick a file,
/// pick the job kind, pick a repeat count, confirm.
pub fn run_interactive_wizard(config: &Config) -> anyhow::Result<InteractiveResult> {
    print_header();

    let input = select_source_file()?;
    let extract = select_mode()?;
    let repeat_count = if extract {
        1
    } else {
        prompt_repeat_count(config.repeat_count)?
    };

    println!();
    println!("  Input:  {}", style(input.display()).cyan());
    if extract {
        println!("  Job:    {}", style("extract region").cyan());
    } else {
        println!(
            "  Job:    {} ({} repetitions)",
            style("generate loop").cyan(),
            repeat_count
        );
    }
    println!();

    if !Confirm::new()
        .with_prompt("Proceed with these settings?")
        .default(true)
        .interact()?
    {
        anyhow::bail!("Cancelled by user");
    }

    println!();
    Ok(InteractiveResult {
        input,
        repeat_count,
        extract,
    })
}

fn print_header() {
    println!();
    println!("  {}", style("audioloop").bold().cyan());
    println!("  Loop or extract a region of an audio file");
    println!();
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(".")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    if candidates.is_empty() {
        let path: String = Input::new()
            .with_prompt("Path to an audio file (mp3, wav, ogg, m4a)")
            .interact_text()?;
        return Ok(PathBuf::from(path));
    }

    let labels: Vec<String> = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    let selection = FuzzySelect::new()
        .with_prompt("Select an audio file")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(candidates[selection].clone())
}

fn select_mode() -> anyhow::Result<bool> {
    let selection = FuzzySelect::new()
        .with_prompt("What should be produced?")
        .items(&["Looped audio (region repeated N times)", "Extracted region only"])
        .default(0)
        .interact()?;
    Ok(selection == 1)
}

fn prompt_repeat_count(default: u32) -> anyhow::Result<u32> {
    let count: u32 = Input::new()
        .with_prompt(format!("Repeat count (1-{MAX_REPEAT_COUNT})"))
        .default(default)
        .validate_with(|value: &u32| {
            if (1..=MAX_REPEAT_COUNT).contains(value) {
                Ok(())
            } else {
                Err(format!("must be between 1 and {MAX_REPEAT_COUNT}"))
            }
        })
        .interact_text()?;
    Ok(count)
}
