// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Browsing the filter catalogue
//! - Filtering still images
//! - Reading and writing stored parameters, ratings and statistics
//! - Driving the live path from a still image

use framefx::params::{Color, FileStore, ParameterField, ParameterType, ParameterValue};
use framefx::registry::RenderDataRow;
use framefx::storage;
use framefx::{
    ComputeDispatcher, Config, FilterGroup, FilterLocation, FilterRegistry, FilterType, Frame,
    ParameterOverrides, ParameterStore, PixelFormat, Renderer,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs, opened once per invocation
pub struct Context {
    config: Config,
    store: Arc<ParameterStore>,
    registry: FilterRegistry,
}

impl Context {
    pub fn open(
        params: Option<PathBuf>,
        ephemeral: bool,
        use_gpu: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load();

        let store = if ephemeral {
            Arc::new(ParameterStore::in_memory())
        } else {
            let path = params
                .or_else(|| config.parameter_file.clone())
                .or_else(FileStore::default_path)
                .ok_or("No configuration directory for the parameter file; pass --params")?;
            Arc::new(ParameterStore::new(Arc::new(FileStore::open(&path)?)))
        };
        store.set_collect_statistics(config.collect_performance_statistics);

        let dispatcher = if use_gpu && config.use_gpu {
            match ComputeDispatcher::new() {
                Ok(dispatcher) => Some(Arc::new(dispatcher)),
                Err(e) => {
                    warn!(error = %e, "GPU unavailable, compute filters disabled");
                    None
                }
            }
        } else {
            None
        };

        let registry = FilterRegistry::new(Arc::clone(&store), dispatcher);
        registry.seed_missing_fields();
        registry.preload_cache();

        Ok(Self {
            config,
            store,
            registry,
        })
    }

    /// Release renderers and write the parameter file
    pub fn close(&self) -> CliResult {
        self.registry.reset_all();
        self.store.flush()?;
        Ok(())
    }

    fn require_implemented(&self, filter: FilterType) -> CliResult {
        if self.registry.is_implemented(filter) {
            Ok(())
        } else {
            Err(format!(
                "{} needs a GPU and none is available (try without --no-gpu)",
                self.registry.title(filter)
            )
            .into())
        }
    }
}

/// The named filter, else the one configured for `location`
fn pick_filter(filter: Option<FilterType>, config: &Config, location: FilterLocation) -> FilterType {
    filter.unwrap_or_else(|| config.filter_for(location))
}

fn parse_group(name: &str) -> Option<FilterGroup> {
    let wanted = name.trim().replace([' ', '-', '_'], "");
    FilterGroup::ALL.into_iter().find(|g| {
        format!("{:?}", g).eq_ignore_ascii_case(&wanted)
            || g.display_name().replace(' ', "").eq_ignore_ascii_case(&wanted)
    })
}

fn parse_field(name: &str) -> Result<ParameterField, Box<dyn std::error::Error>> {
    ParameterField::from_name(name).ok_or_else(|| format!("Unknown parameter {:?}", name).into())
}

/// Parse command-line text as the field's type; colors also accept `#rrggbb[aa]`
fn parse_value(field: ParameterField, text: &str) -> Result<ParameterValue, Box<dyn std::error::Error>> {
    if field.kind() == ParameterType::Color
        && let Some(color) = Color::from_hex(text)
    {
        return Ok(ParameterValue::Color(color));
    }
    let mut parsed = ParameterOverrides::new();
    parsed.insert_text(field, text)?;
    parsed
        .get(field)
        .cloned()
        .ok_or_else(|| format!("Cannot parse {:?}", text).into())
}

fn parse_overrides(pairs: &[String]) -> Result<ParameterOverrides, Box<dyn std::error::Error>> {
    let mut overrides = ParameterOverrides::new();
    for pair in pairs {
        let (name, text) = pair
            .split_once('=')
            .ok_or_else(|| format!("Override {:?} is not Field=value", pair))?;
        let field = parse_field(name.trim())?;
        overrides.insert(field, parse_value(field, text.trim())?)?;
    }
    Ok(overrides)
}

fn stars(count: u8) -> String {
    let count = count.min(5) as usize;
    format!("{}{}", "*".repeat(count), ".".repeat(5 - count))
}

/// List filters, grouped
pub fn list_filters(context: &Context, group: Option<&str>) -> CliResult {
    let groups: Vec<FilterGroup> = match group {
        Some(name) => vec![parse_group(name).ok_or_else(|| format!("Unknown group {:?}", name))?],
        None => FilterGroup::ALL.to_vec(),
    };

    for group in groups {
        let members = context.registry.filters_in_group(group);
        if members.is_empty() {
            continue;
        }
        println!("{}:", context.registry.group_title(group));
        for d in members {
            let rating = context.store.rating(d.id);
            println!(
                "  {:<22} {:<22} {:<13} {}{}{}",
                d.filter_type.to_string(),
                d.title,
                d.kernel_kind.display_name(),
                stars(rating.stars),
                if rating.favorite { " fav" } else { "" },
                if context.registry.is_implemented(d.filter_type) {
                    ""
                } else {
                    " (unavailable)"
                },
            );
        }
        println!();
    }
    Ok(())
}

/// Filter one image, or two for two-image filters
pub fn apply_filter(
    context: &Context,
    filter: Option<FilterType>,
    input: PathBuf,
    with: Option<PathBuf>,
    output: Option<PathBuf>,
    overrides: &[String],
) -> CliResult {
    let filter = pick_filter(filter, &context.config, FilterLocation::Photo);
    context.require_implemented(filter)?;
    let overrides = parse_overrides(overrides)?;
    let overrides = (!overrides.is_empty()).then_some(&overrides);

    let rt = tokio::runtime::Runtime::new()?;
    let first = rt.block_on(storage::load_image(input.clone()))?;
    let second = match with {
        Some(path) => Some(rt.block_on(storage::load_image(path))?),
        None => None,
    };

    let renderer = context.registry.set_active(filter, FilterLocation::Photo);
    let start = Instant::now();
    let filtered = match second {
        Some(second) => renderer.merge(&[first, second], overrides),
        None => renderer.render_image(&first, overrides),
    }
    .ok_or_else(|| format!("{} produced no image", context.registry.title(filter)))?;
    let elapsed = start.elapsed();

    let output = output.unwrap_or_else(|| {
        storage::default_output_path(&storage::default_output_dir(), &input, &filter.to_string())
    });
    let saved = rt.block_on(storage::save_image(filtered, output))?;
    println!(
        "{} applied in {:.1} ms: {}",
        context.registry.title(filter),
        elapsed.as_secs_f64() * 1000.0,
        saved.display()
    );
    Ok(())
}

/// Print stored parameters of a filter
pub fn get_parameters(context: &Context, filter: FilterType, field: Option<&str>) -> CliResult {
    let d = context.registry.descriptor(filter);
    let fields: Vec<ParameterField> = match field {
        Some(name) => vec![parse_field(name)?],
        None => framefx::filters::program_for(filter)
            .fields()
            .into_iter()
            .map(|spec| spec.field)
            .collect(),
    };

    println!("{} ({})", d.title, d.id);
    for field in fields {
        let shown = match context.store.get(d.id, field)? {
            data if data.is_absent() => "<unset>".to_string(),
            data => data
                .value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<empty>".to_string()),
        };
        println!("  {:<28} {:<7} {}", field.name(), field.kind().to_string(), shown);
    }
    let rating = context.store.rating(d.id);
    println!("  rating: {}{}", stars(rating.stars), if rating.favorite { " fav" } else { "" });
    Ok(())
}

/// Store one parameter
pub fn set_parameter(context: &Context, filter: FilterType, field: &str, value: &str) -> CliResult {
    let field = parse_field(field)?;
    if field.is_statistic() {
        return Err("Statistics are written by renders; use reset-stats to clear them".into());
    }
    let value = parse_value(field, value)?;
    let d = context.registry.descriptor(filter);
    context.store.set(d.id, field, value.clone())?;
    println!("{}: {} = {}", d.title, field.name(), value);
    Ok(())
}

/// Overwrite parameters with defaults and zero statistics
pub fn seed(context: &Context, filter: Option<FilterType>) -> CliResult {
    match filter {
        Some(filter) => {
            context.registry.seed_filter(filter);
            println!("Seeded {}", context.registry.title(filter));
        }
        None => {
            context.registry.seed_initial_storage();
            println!("Seeded {} filters", FilterType::ALL.len());
        }
    }
    Ok(())
}

fn print_rows(heading: &str, rows: &[RenderDataRow]) {
    println!("{}:", heading);
    if rows.is_empty() {
        println!("  (none)");
    }
    for row in rows {
        println!(
            "  {:<22} {:>8} renders {:>10.3} s total {:>9.3} ms mean",
            row.title,
            row.count,
            row.total_duration,
            row.mean_duration() * 1000.0
        );
    }
}

/// Print render statistics
pub fn show_stats(context: &Context, json: bool) -> CliResult {
    let dump = context.registry.dump_render_data();
    if json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }
    print_rows("Still images", &dump.image);
    println!();
    print_rows("Live frames", &dump.live);
    Ok(())
}

pub fn reset_stats(context: &Context) -> CliResult {
    context.registry.reset_performance_statistics();
    println!("Render statistics cleared");
    Ok(())
}

/// Update a filter's rating; unspecified parts are kept
pub fn rate(
    context: &Context,
    filter: FilterType,
    stars_given: Option<u8>,
    favorite: Option<bool>,
) -> CliResult {
    let d = context.registry.descriptor(filter);
    let mut rating = context.store.rating(d.id);
    if let Some(count) = stars_given {
        rating.stars = count;
    }
    if let Some(favorite) = favorite {
        rating.favorite = favorite;
    }
    context.store.set_rating(d.id, rating)?;
    println!(
        "{}: {}{}",
        d.title,
        stars(rating.stars),
        if rating.favorite { " fav" } else { "" }
    );
    Ok(())
}

/// Feed an image through the live path until Ctrl+C or `frames` renders
pub fn stream(
    context: &Context,
    filter: Option<FilterType>,
    input: PathBuf,
    frames: Option<u64>,
    fps: u32,
) -> CliResult {
    let filter = pick_filter(filter, &context.config, FilterLocation::Video);
    context.require_implemented(filter)?;
    let rt = tokio::runtime::Runtime::new()?;
    let image = rt.block_on(storage::load_image(input))?;
    // Cameras usually deliver BGRA
    let frame = Frame::from_rgba_image(&image, PixelFormat::Bgra8);

    let buffers = context.config.buffer_count_hint.max(1);
    let renderer = context.registry.set_active(filter, FilterLocation::Video);
    renderer.initialize(frame.descriptor, buffers)?;
    if !renderer.is_initialized() {
        return Err(format!("{} could not be initialized", context.registry.title(filter)).into());
    }

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!(
        "Streaming {} at {} fps (press Ctrl+C to stop)",
        context.registry.title(filter),
        fps
    );

    let interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let start = Instant::now();
    let mut in_flight = VecDeque::new();
    let (mut submitted, mut completed, mut dropped) = (0u64, 0u64, 0u64);
    let mut last_results = None;

    while !stop_flag.load(Ordering::SeqCst) && frames.is_none_or(|n| submitted < n) {
        let tick = Instant::now();
        submitted += 1;
        match renderer.render(&frame, None) {
            Some(pending) => in_flight.push_back(pending),
            None => dropped += 1,
        }
        // Keep one buffer free so the next frame is not dropped
        while in_flight.len() >= buffers {
            if let Some(done) = in_flight.pop_front().and_then(|p| p.wait()) {
                completed += 1;
                last_results = Some(*done.results());
            }
        }

        print!(
            "\rFrames: {} done, {} dropped, {:.1} fps",
            completed,
            dropped,
            completed as f64 / start.elapsed().as_secs_f64().max(f64::EPSILON)
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        if let Some(rest) = interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    for pending in in_flight {
        if let Some(done) = pending.wait() {
            completed += 1;
            last_results = Some(*done.results());
        }
    }
    println!();
    renderer.reset();

    println!(
        "{} frames rendered, {} dropped in {:.1} s",
        completed,
        dropped,
        start.elapsed().as_secs_f64()
    );
    if let Some(results) = last_results.filter(|r| r.iter().any(|v| *v != 0)) {
        println!("Kernel results: {:?}", results);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_accepts_both_names() {
        assert_eq!(parse_group("photo effects"), Some(FilterGroup::PhotoEffects));
        assert_eq!(parse_group("Gray"), Some(FilterGroup::Gray));
        assert_eq!(parse_group("grayscale"), Some(FilterGroup::Gray));
        assert_eq!(parse_group("five-star"), Some(FilterGroup::FiveStar));
        assert_eq!(parse_group("nope"), None);
    }

    #[test]
    fn test_pick_filter_falls_back_to_config() {
        let config = Config {
            photo_filter: FilterType::Noir,
            video_filter: FilterType::Comic,
            ..Config::default()
        };
        assert_eq!(pick_filter(None, &config, FilterLocation::Photo), FilterType::Noir);
        assert_eq!(pick_filter(None, &config, FilterLocation::Video), FilterType::Comic);
        assert_eq!(
            pick_filter(Some(FilterType::Sobel), &config, FilterLocation::Video),
            FilterType::Sobel
        );
    }

    #[test]
    fn test_parse_overrides() {
        let pairs = vec!["BlockWidth=8".to_string(), "MergeWithBackground = true".to_string()];
        let overrides = parse_overrides(&pairs).unwrap();
        assert_eq!(
            overrides.get(ParameterField::BlockWidth),
            Some(&ParameterValue::Int(8))
        );
        assert_eq!(
            overrides.get(ParameterField::MergeWithBackground),
            Some(&ParameterValue::Bool(true))
        );
        assert!(parse_overrides(&["BlockWidth".to_string()]).is_err());
        assert!(parse_overrides(&["BlockWidth=wide".to_string()]).is_err());
    }

    #[test]
    fn test_color_values_accept_hex() {
        let value = parse_value(ParameterField::Color0, "#ff0000").unwrap();
        assert_eq!(value, ParameterValue::Color(Color::rgb(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(0), ".....");
        assert_eq!(stars(3), "***..");
        assert_eq!(stars(9), "*****");
    }
}
