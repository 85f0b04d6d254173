use clap::{Parser, Subcommand};
use locus_picker::location::providers;
use locus_picker::location::{
    LocationError, NominatimClient, PlaceOrigin, PositionSource, ReplaySource, ResolvedPlace,
    SelectedLocation, UnsupportedSource,
};
use locus_picker::picker::{Notice, Notifier, StderrNotifier};
use locus_picker::{logging, LocationPicker, PickerConfig, PickerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Locus: pick a place by GPS or by name
///
/// Resolves a position or a free-text query into a city and district
/// through OpenStreetMap Nominatim and prints the selection as JSON.
///
/// Examples:
///   locus search Paris
///   locus search "Akpakpa, Cotonou" --language en
///   locus reverse --lat 6.3654 --lon 2.4183
///   locus gps --track walk.json --accuracy 30 --max-wait-ms 8000
#[derive(Parser)]
#[command(name = "locus", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/locus/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Language for place names (accept-language), e.g. fr, en.
    #[arg(long, global = true)]
    language: Option<String>,

    /// Debug logging on stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search a city, district or address.
    Search {
        /// Free-text query; several words are joined with spaces.
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Name the place at a coordinate pair.
    Reverse {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Acquire a GPS position and name it.
    Gps {
        /// Recorded track to replay (JSON array of fixes). Without a track
        /// there is no position source on a terminal.
        #[arg(long)]
        track: Option<PathBuf>,

        /// Stop as soon as a fix is this precise, in meters.
        #[arg(long)]
        accuracy: Option<f64>,

        /// Give up refining after this many milliseconds.
        #[arg(long)]
        max_wait_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN });

    let mut config = match &cli.config {
        Some(path) => PickerConfig::load_from(path),
        None => PickerConfig::load(),
    };
    if let Some(ref lang) = cli.language {
        config.geocoder.language = lang.clone();
    }
    let geocoder = Arc::new(config.geocoder());
    let mut settings = config.picker_settings();

    let result = match cli.command {
        Command::Search { query } => search(geocoder, settings, query.join(" ")).await,
        Command::Reverse { lat, lon } => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                eprintln!("Error: Invalid coordinates. Lat: -90..90, Lon: -180..180");
                std::process::exit(1);
            }
            Ok(reverse(geocoder, settings.radius_m, lat, lon).await)
        }
        Command::Gps { track, accuracy, max_wait_ms } => {
            if let Some(a) = accuracy {
                settings.desired_accuracy_m = a;
            }
            if let Some(ms) = max_wait_ms {
                settings.max_wait = Duration::from_millis(ms);
            }
            match track {
                Some(path) => {
                    let source = ReplaySource::from_file(&path).unwrap_or_else(|e| {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    });
                    gps(Arc::new(source), geocoder, settings).await
                }
                None => gps(Arc::new(UnsupportedSource), geocoder, settings).await,
            }
        }
    };

    // Failures were already shown by the notifier.
    let selection = match result {
        Ok(s) => s,
        Err(_) => std::process::exit(1),
    };

    eprintln!("  {}", selection.place.display_line());
    match serde_json::to_string_pretty(&selection) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn search(
    geocoder: Arc<NominatimClient>,
    settings: PickerSettings,
    query: String,
) -> Result<SelectedLocation, LocationError> {
    let picker = LocationPicker::new(Arc::new(UnsupportedSource), geocoder, settings)
        .with_notifier(StderrNotifier);
    picker.set_input(query)?;
    picker.search().await
}

async fn gps<S: PositionSource>(
    source: Arc<S>,
    geocoder: Arc<NominatimClient>,
    settings: PickerSettings,
) -> Result<SelectedLocation, LocationError> {
    eprintln!(
        "  \u{1F4E1} Acquiring position (target \u{00B1}{:.0} m, up to {:.1}s)...",
        settings.desired_accuracy_m,
        settings.max_wait.as_secs_f64()
    );
    let picker = LocationPicker::new(source, geocoder, settings).with_notifier(StderrNotifier);
    picker.locate().await
}

/// Manual coordinates: a failed lookup still prints the coordinates.
async fn reverse(geocoder: Arc<NominatimClient>, radius_m: f64, lat: f64, lon: f64) -> SelectedLocation {
    let place = match providers::reverse_blocking(geocoder, lat, lon).await {
        Ok(place) => place,
        Err(e) => {
            StderrNotifier.notify(&Notice::from_error(&e));
            // Coordinate-sourced, like every reverse lookup result.
            ResolvedPlace {
                city: None,
                district: None,
                lat,
                lon,
                accuracy_m: None,
                origin: PlaceOrigin::Gps,
            }
        }
    };
    SelectedLocation::new(place, radius_m)
}
