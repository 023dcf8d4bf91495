use clap::Parser;
use docqa::{
    cli::{self, Cli, Command, ConfigAction},
    config_db::KNOWN_KEYS,
    error,
    extract::{PlainTextExtractor, TextExtractor},
    mcp,
    search::{self, QueryParams},
    segmenter,
    settings::{self, Settings},
    ConfigDb,
    DataDir,
    RetrievalEngine,
};
use kdam::BarExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCQA_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Ask(args) => {
            let settings =
                Settings::resolve(&config_db, cli.model.as_deref(), cli.embedder)?;
            cmd_ask(&settings, &args, cli.quiet)?;
        }
        Command::Inspect(args) => {
            cmd_inspect(&args)?;
        }
        Command::Mcp(args) => {
            let settings =
                Settings::resolve(&config_db, cli.model.as_deref(), cli.embedder)?;
            mcp::run_mcp(&settings, &args.file)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => {
                let settings = Settings::resolve(
                    &config_db,
                    cli.model.as_deref(),
                    cli.embedder,
                )?;
                config_show(&config_db, &data_dir, &settings, json)?;
            }
            ConfigAction::Set { key, value } => {
                settings::validate_setting(&key, &value)?;
                config_db.set_setting(&key, value.trim())?;
                println!("Set {key} = {}", value.trim());
            }
            ConfigAction::Unset { key } => {
                config_unset(&config_db, &key)?;
            }
        },
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_ask(
    settings: &Settings,
    args: &cli::AskArgs,
    quiet: bool,
) -> error::Result<()> {
    let pages = PlainTextExtractor.extract(&args.file)?;
    let mut engine = RetrievalEngine::new(settings.build_embedder());

    let summary = if quiet {
        engine.ingest(&pages)?
    } else {
        let mut bar = kdam::tqdm!(desc = "Embedding", unit = " sentences");
        let summary = engine.ingest_with_progress(&pages, |done, total| {
            bar.total = total;
            if let Err(e) = bar.update_to(done) {
                tracing::debug!(error = %e, "progress bar update failed");
            }
        })?;
        eprintln!();
        summary
    };

    if !args.json {
        eprintln!(
            "Pages: {} | Sentences: {}",
            summary.page_count, summary.unit_count
        );
    }

    let count = args.count.unwrap_or(settings.top_k);
    for (i, query) in args.queries.iter().enumerate() {
        let params = QueryParams {
            query: query.clone(),
            count,
            min_confidence: args.min_confidence,
            all: args.all,
        };
        let results = search::execute_query(&mut engine, &params)?;

        if args.json {
            search::format_json(query, &results)?;
        } else {
            if i > 0 {
                println!();
            }
            search::format_human(query, &results);
        }
    }

    Ok(())
}

fn cmd_inspect(args: &cli::InspectArgs) -> error::Result<()> {
    let pages = PlainTextExtractor.extract(&args.file)?;
    let segments = segmenter::segment(&pages);
    if segments.is_empty() {
        return Err(error::Error::NoUnitsFound);
    }

    let blank_pages = pages.iter().filter(|p| p.text.is_none()).count();

    if args.json {
        let mut value = serde_json::json!({
            "file": args.file.display().to_string(),
            "pages": pages.len(),
            "blankPages": blank_pages,
            "units": segments.len(),
        });
        if args.units {
            value["unitList"] = serde_json::json!(
                segments
                    .iter()
                    .enumerate()
                    .map(|(id, s)| serde_json::json!({
                        "id": id,
                        "page": s.page,
                        "text": s.text,
                    }))
                    .collect::<Vec<_>>()
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", args.file.display());
    println!("Pages: {} ({blank_pages} blank)", pages.len());
    println!("Sentences: {}", segments.len());
    if args.units {
        println!();
        for (id, s) in segments.iter().enumerate() {
            println!("{id}\t[Page {}]\t{}", s.page, s.text);
        }
    }
    Ok(())
}

fn config_show(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    settings: &Settings,
    json: bool,
) -> error::Result<()> {
    let stored = config_db.list_settings()?;

    if json {
        let stored: serde_json::Map<String, serde_json::Value> = stored
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        let value = serde_json::json!({
            "dataDir": data_dir.root().display().to_string(),
            "stored": stored,
            "effective": {
                "model_name": settings.model_id,
                "embedder": settings.embedder.as_str(),
                "top_k": settings.top_k,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    println!("Model: {}", settings.model_id);
    println!("Embedder: {}", settings.embedder);
    println!("Top k: {}", settings.top_k);
    if stored.is_empty() {
        println!("No stored settings.");
    } else {
        println!("Stored:");
        for (key, value) in &stored {
            println!("  {key} = {value}");
        }
    }
    Ok(())
}

fn config_unset(config_db: &ConfigDb, key: &str) -> error::Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        return Err(error::Error::Config(format!(
            "unknown setting '{key}' (known: {})",
            KNOWN_KEYS.join(", ")
        )));
    }
    if config_db.remove_setting(key)? {
        println!("Removed {key}");
    } else {
        println!("{key} was not set");
    }
    Ok(())
}
