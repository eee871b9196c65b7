use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isoline_route::geo::plane_distance;
use isoline_route::search::dijkstra::DEFAULT_SNAP_RADIUS_M;
use isoline_route::{
    feature_collection, Attribute, DijkstraTreeFinder, GridSpec, IsochroneMapBuilder, LocationType,
    RangeType, RoadGraph, RoadNetwork, RouteSearchContext, RoutingProfile, SamplingConfig,
    SearchParameters, Units,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "isoline-route")]
#[command(about = "Isochrones over a road network", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute isochrones for one or more locations
    Isochrones {
        /// Road network JSON file
        graph: PathBuf,
        /// Location as 'lon,lat'; repeat for several locations
        #[arg(long = "location", required = true)]
        locations: Vec<String>,
        /// Range values, comma separated (seconds or distance units)
        #[arg(long, value_delimiter = ',')]
        range: Vec<f64>,
        /// Split the single range into steps of this size
        #[arg(long)]
        interval: Option<f64>,
        /// time or distance
        #[arg(long, default_value = "time")]
        range_type: String,
        /// Distance units for ranges: m, km or mi
        #[arg(long, default_value = "m")]
        units: String,
        /// Routing profile name
        #[arg(long, default_value = "driving-car")]
        profile: String,
        /// start or destination
        #[arg(long, default_value = "start")]
        location_type: String,
        /// Attributes to compute: area, reachfactor
        #[arg(long, value_delimiter = ',')]
        attributes: Vec<String>,
        /// Units for the area attribute: m, km or mi
        #[arg(long, default_value = "m")]
        area_units: String,
        /// Hull smoothing between 0 and 100
        #[arg(long)]
        smoothing: Option<f64>,
        /// Sampling overrides (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Largest distance (m) between a location and its network node
        #[arg(long, default_value_t = DEFAULT_SNAP_RADIUS_M)]
        snap_radius: f64,
        /// Output GeoJSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a synthetic grid network
    Grid {
        /// Output network JSON file
        output: PathBuf,
        /// South-west corner as 'lon,lat'
        #[arg(long, default_value = "8.6,49.35")]
        origin: String,
        #[arg(long, default_value = "41")]
        rows: usize,
        #[arg(long, default_value = "41")]
        cols: usize,
        /// Node spacing in degrees
        #[arg(long, default_value = "0.004")]
        spacing: f64,
        /// Speed on every edge (km/h)
        #[arg(long, default_value = "30")]
        speed: f64,
    },
}

fn parse_coord(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Coordinate must be in format 'lon,lat'");
    }
    let lon = parts[0].trim().parse::<f64>()?;
    let lat = parts[1].trim().parse::<f64>()?;
    Ok((lon, lat))
}

/// The single range an `--interval` request splits up
fn interval_max(range: &[f64]) -> Result<f64> {
    match range {
        [max] => Ok(*max),
        _ => anyhow::bail!(
            "--interval needs exactly one --range value, got {}",
            range.len()
        ),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Isochrones {
            graph,
            locations,
            range,
            interval,
            range_type,
            units,
            profile,
            location_type,
            attributes,
            area_units,
            smoothing,
            config,
            snap_radius,
            output,
        } => {
            let range_type: RangeType = range_type.parse()?;
            let units: Units = units.parse()?;
            let area_units: Units = area_units.parse()?;
            let profile: RoutingProfile = profile.parse()?;
            let location_type: LocationType = location_type.parse()?;
            let attributes = attributes
                .iter()
                .map(|a| a.parse::<Attribute>())
                .collect::<Result<Vec<_>, _>>()?;

            let start = Instant::now();
            let network = Arc::new(
                RoadNetwork::load(&graph)
                    .with_context(|| format!("loading network from {}", graph.display()))?,
            );
            tracing::info!(
                nodes = network.node_count(),
                edges = network.edge_count(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "network loaded"
            );

            let sampling = match &config {
                Some(path) => SamplingConfig::load(path)
                    .with_context(|| format!("loading sampling config from {}", path.display()))?,
                None => SamplingConfig::default(),
            };

            let mut requests = Vec::with_capacity(locations.len());
            for location in &locations {
                let (lon, lat) = parse_coord(location)
                    .with_context(|| format!("invalid location '{location}'"))?;
                let center = geo::Coord { x: lon, y: lat };
                let params = match interval {
                    Some(step) => SearchParameters::from_interval(
                        center,
                        interval_max(&range)?,
                        step,
                        range_type,
                        units,
                        profile,
                    )?,
                    None => SearchParameters::new(center, &range, range_type, units, profile)?,
                };
                let mut params = params
                    .with_location_type(location_type)
                    .with_attributes(&attributes)
                    .with_area_units(area_units);
                if let Some(s) = smoothing {
                    params = params.with_smoothing_factor(s)?;
                }
                requests.push(params);
            }

            let finder =
                Arc::new(DijkstraTreeFinder::new(network.clone()).with_snap_radius(snap_radius));
            let mut builder = IsochroneMapBuilder::new(finder).with_sampling_config(sampling);
            builder.initialize(RouteSearchContext::new(network, profile));

            let start = Instant::now();
            let maps = builder
                .compute_batch(&requests)
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            let total: usize = maps.iter().map(|m| m.len()).sum();
            tracing::info!(
                locations = maps.len(),
                isochrones = total,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "isochrones computed"
            );
            for map in maps.iter().filter(|m| m.is_empty()) {
                tracing::warn!(
                    group_index = map.group_index(),
                    "no isochrone for location"
                );
            }

            let geojson = serde_json::to_string_pretty(&feature_collection(&maps))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, geojson)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "GeoJSON written");
                }
                None => println!("{geojson}"),
            }
        }
        Commands::Grid {
            output,
            origin,
            rows,
            cols,
            spacing,
            speed,
        } => {
            let (lon, lat) = parse_coord(&origin)?;
            let spec = GridSpec {
                origin: geo::Coord { x: lon, y: lat },
                rows,
                cols,
                spacing_deg: spacing,
                speed_kmh: speed,
            };
            let network = RoadNetwork::grid(&spec);
            network
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            let corner = geo::Coord {
                x: lon + spacing * cols.saturating_sub(1) as f64,
                y: lat + spacing * rows.saturating_sub(1) as f64,
            };
            tracing::info!(
                nodes = network.node_count(),
                edges = network.edge_count(),
                diagonal_m = plane_distance(spec.origin, corner).round(),
                path = %output.display(),
                "grid network written"
            );
        }
    }

    Ok(())
}
