#[cfg(not(feature = "scope"))]
fn main() {
    eprintln!("tally-scope requires the 'scope' feature to be enabled");
    eprintln!("Please run with: cargo run --bin tally-scope --features scope");
    std::process::exit(1);
}

#[cfg(feature = "scope")]
fn main() {
    use std::path::PathBuf;
    use tally::HistoryLog;
    use tally::data_model::format_number;
    use tally::export::import_json;

    const SHOWN_ENTRIES: usize = 10;

    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <path-to-history-file>", args[0]);
        eprintln!("\nExample: {} ./calculator-history-2026-10-16.json", args[0]);
        std::process::exit(1);
    }

    let file_path = PathBuf::from(&args[1]);
    let text = match std::fs::read_to_string(&file_path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file_path.display(), e);
            std::process::exit(1);
        }
    };

    // an export file, or the bare array the calculator keeps in local storage
    let history = match import_json(&text) {
        Ok(history) => history,
        Err(import_error) => match serde_json::from_str::<HistoryLog>(&text) {
            Ok(history) => history,
            Err(e) => {
                log::debug!("Not a bare history array either: {e}");
                eprintln!("Error parsing '{}': {import_error}", file_path.display());
                std::process::exit(1);
            }
        },
    };

    println!("TallyScope - Calculator History Inspector");
    println!("=========================================");
    println!("File: {}", file_path.display());
    println!("Size: {} bytes ({:.2} KB)", text.len(), text.len() as f64 / 1024.0);
    println!();

    println!("Summary:");
    println!("--------");
    println!("  Entries: {}", history.len());

    let non_finite: Vec<_> = history
        .iter()
        .filter(|entry| !entry.result.is_finite())
        .collect();
    println!("  Non-finite results: {}", non_finite.len());
    for entry in &non_finite {
        println!(
            "    ⚠️  {} = {}",
            entry.expression,
            format_number(entry.result)
        );
    }

    println!();
    println!("Most recent entries:");
    println!("--------------------");
    if history.is_empty() {
        println!("  No entries");
    }
    for (i, entry) in history.iter().take(SHOWN_ENTRIES).enumerate() {
        println!(
            "  {i}: {} = {}  [{}]",
            entry.expression,
            format_number(entry.result),
            entry.timestamp
        );
    }
    if history.len() > SHOWN_ENTRIES {
        println!("  ... and {} more", history.len() - SHOWN_ENTRIES);
    }
}
