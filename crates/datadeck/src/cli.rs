use std::io::{self, Write};
use std::path::PathBuf;

use datadeck_core::{CatalogError, ConfigStore, ExternalSnapshots, FileStorage, load_catalog};
use datadeck_tree::{ExpansionState, build_sections, flatten};
use log::info;

use crate::render::render_row;

const USAGE: &str = "usage: datadeck [--search <query>] [--storage <dir>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    search: Option<String>,
    storage: Option<PathBuf>,
}

pub fn run(args: &[String]) -> i32 {
    let options = match parse_args(args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{}", USAGE);
            return 0;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return 2;
        }
    };

    match print_catalog(&options) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("datadeck: {}", e);
            1
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--search" | "-s" => {
                let query = iter.next().ok_or("--search needs a query")?;
                options.search = Some(query.clone());
            }
            "--storage" => {
                let dir = iter.next().ok_or("--storage needs a directory")?;
                options.storage = Some(PathBuf::from(dir));
            }
            other => return Err(format!("unexpected argument {:?}", other)),
        }
    }

    Ok(Some(options))
}

fn print_catalog(options: &Options) -> Result<(), CatalogError> {
    let config = ConfigStore::new()?.load()?;
    let storage = match &options.storage {
        Some(dir) => FileStorage::open(dir)?,
        None => FileStorage::new()?,
    };

    let entities = load_catalog(&storage, &config.storage_key);
    info!(
        "Loaded {} sources from {}",
        entities.len(),
        storage.root_path().display()
    );

    let query = options.search.as_deref().unwrap_or("");
    let projection = build_sections(&entities, &ExternalSnapshots::default(), query);

    let mut expansion = ExpansionState::new();
    expansion.set_query(query);
    let rows = flatten(&projection, &expansion);

    let mut out = io::stdout().lock();
    if rows.is_empty() {
        let message = if query.trim().is_empty() {
            "No data sources."
        } else {
            "No matches."
        };
        writeln!(out, "{}", message)?;
        return Ok(());
    }

    for row in &rows {
        writeln!(out, "{}", render_row(row, config.max_suffix_badges))?;
    }
    Ok(())
}
