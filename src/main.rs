use std::fs;
use std::path::PathBuf;

use bclick::{
    build_abc_tokens, render_abc, AlphaTexInput, BeatSlot, DivisionRules, MeasureRhythm, ScoreData,
    ScoreSettings,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "bclick")]
#[command(about = "Rhythm and chord notation tools for B.Click scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a settings file (YAML or JSON) to alphaTex
    Render {
        /// Settings file
        settings: PathBuf,

        /// Write the markup here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the per-beat patterns of one bar as JSON
    Beats {
        /// Settings file
        settings: PathBuf,

        /// Bar index, starting at 0
        bar: usize,
    },
}

#[derive(Serialize)]
struct BeatView {
    beat: usize,
    slot: BeatSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    abc: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { settings, output } => {
            let settings = ScoreSettings::load(&settings)?;
            let tex = bclick::build_alpha_tex(&AlphaTexInput::from(&settings));
            match output {
                Some(path) => {
                    fs::write(&path, &tex)?;
                    info!(path = %path.display(), "wrote alphaTex");
                }
                None => print!("{}", tex),
            }
        }
        Commands::Beats { settings, bar } => {
            let settings = ScoreSettings::load(&settings)?;
            let data = ScoreData::from_settings(&settings);
            let mut bars = settings.bars.clone().unwrap_or_else(|| data.build_bars());
            data.ensure_bar(&mut bars, bar);

            let rhythm: Vec<String> = data
                .bar_rhythm(&bars[bar])
                .iter()
                .map(ToString::to_string)
                .collect();
            let rules = DivisionRules::for_time_signature(&data.time_signature());
            let measure = MeasureRhythm::from_rhythm(&rhythm, rules);

            let beats: Vec<BeatView> = measure
                .slots()
                .iter()
                .enumerate()
                .map(|(beat, slot)| BeatView {
                    beat,
                    slot: slot.clone(),
                    abc: slot.descriptor().map(|d| render_abc(&build_abc_tokens(d))),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&beats)?);
        }
    }

    Ok(())
}
