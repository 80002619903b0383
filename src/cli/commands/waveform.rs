//! Waveform rendering command.

use serde::Serialize;
use tokio::runtime::Runtime;

use super::build_cache;
use crate::config::PlayerConfig;
use crate::metadata::TrackInfo;
use crate::player::format_duration;
use crate::source::resolve_url;
use crate::waveform::{self, Bar, Resolution};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const LINE_WIDTH: usize = 100;

#[derive(Serialize)]
struct WaveformReport<'a> {
    url: &'a str,
    title: &'a str,
    creator: Option<&'a str>,
    duration_secs: Option<f64>,
    resolution: Resolution,
    stroke_width: f32,
    bars: &'a [Bar],
}

/// Decode a source and print its waveform
pub fn cmd_waveform(
    rt: &Runtime,
    config: &PlayerConfig,
    url: &str,
    sample_data: Option<&str>,
    reduced: bool,
    json: bool,
) -> anyhow::Result<()> {
    let base = config.resolve_base_url()?;
    let url = resolve_url(&base, url)?;
    let sample_data_url = sample_data.map(|raw| resolve_url(&base, raw)).transpose()?;

    let cache = build_cache(config);
    let entry = rt.block_on(cache.fetch_and_decode(&url, sample_data_url.as_ref()))?;

    let resolution = if reduced {
        Resolution::Reduced
    } else {
        Resolution::Regular
    };
    let bars = waveform::render(&entry.samples, resolution);
    let info = TrackInfo::resolve(&url, None);

    if json {
        let report = WaveformReport {
            url: url.as_str(),
            title: &info.title,
            creator: info.creator.as_deref(),
            duration_secs: entry.duration.map(|d| d.as_secs_f64()),
            resolution,
            stroke_width: resolution.stroke_width(),
            bars: &bars,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} - {}", info.display_creator(), info.title);
    if let Some(duration) = entry.duration {
        println!("Duration: {}", format_duration(duration));
    }
    println!("Resolution: {:?} ({} bars)\n", resolution, bars.len());
    for line in sparkline(&bars) {
        println!("{}", line);
    }
    Ok(())
}

/// Bars as block characters, wrapped at [`LINE_WIDTH`].
fn sparkline(bars: &[Bar]) -> Vec<String> {
    bars.chunks(LINE_WIDTH)
        .map(|chunk| {
            chunk
                .iter()
                .map(|bar| {
                    let level = (bar.height / 100.0 * (LEVELS.len() - 1) as f32).round() as usize;
                    LEVELS[level.min(LEVELS.len() - 1)]
                })
                .collect()
        })
        .collect()
}
