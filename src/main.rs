use anyhow::{Context, Result};
use nucmix::cli::{parse_args, setup_logging, Commands, ConvertArgs, MixArgs};
use nucmix::mixing::{compute_mixing, neighbors::load_regions, CellTable};
use nucmix::tiles::loader::TileLoader;
use nucmix::tiles::summary::ConversionSummary;
use nucmix::tiles::{writer, ConvertConfig};
use tracing::{error, info, warn};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", nucmix::info());

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Mix(args) => run_mix(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    info!("Converting tiles...");
    info!("Tile directory: {:?}", args.input);
    info!("Output file: {:?}", args.output);

    let config = ConvertConfig {
        prefix: args.prefix,
        output: args.output,
        snapshot: args.snapshot,
        ..ConvertConfig::default()
    };

    let loader = TileLoader::with_config(config.clone());
    let conversion = loader
        .convert_dir(&args.input)
        .with_context(|| format!("Failed to convert tiles in {:?}", args.input))?;

    if conversion.records.is_empty() {
        warn!("No valid cells found; writing an empty table");
    }

    ConversionSummary::from_conversion(&conversion).print();

    nucmix::utils::ensure_parent_dir(&config.output)?;
    writer::write_csv(&conversion.records, &config.output)?;

    if let Some(ref snapshot) = config.snapshot {
        nucmix::utils::ensure_parent_dir(snapshot)?;
        writer::write_snapshot(&conversion.records, snapshot)?;
    }

    Ok(())
}

fn run_mix(args: MixArgs) -> Result<()> {
    info!("Computing neighborhood mixing...");

    let config = args.mixing_config()?;
    info!(
        "Neighborhoods: {} vs {} (column {:?})",
        config.neigh1, config.neigh2, config.neighborhood_column
    );
    if config.neigh1 == config.neigh2 {
        warn!("Both neighborhoods are {}; ratio measures self-adjacency", config.neigh1);
    }

    let table = CellTable::load(&args.cells, &config)?;
    let regions = load_regions(&args.regions)?;

    let (counts, result) = compute_mixing(&table, &regions, &config)
        .context("Neighborhood mixing failed")?;

    result.print();

    let flagged = result.flagged().count();
    if flagged > 0 {
        warn!("{} rows have a mixing ratio above 1", flagged);
    }

    nucmix::utils::ensure_parent_dir(&args.output)?;
    result.save(&args.output, &args.format)?;

    if let Some(ref dir) = args.counts_dir {
        counts.save(dir)?;
    }

    info!("Mixing ratios saved to: {:?}", args.output);

    Ok(())
}
