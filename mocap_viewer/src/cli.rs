use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(about = "Marker trail viewer for C3D capture files", version)]
pub struct Args {
    /// Capture files to view, one interactive session each in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Optional palette preset JSON overriding the built-in marker colors
    #[arg(long)]
    pub palette: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PalettePreset {
    pub colors: Vec<[f32; 3]>,
}

pub fn load_palette_preset(path: &Path) -> Result<Vec<[f32; 3]>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading palette preset {}", path.display()))?;
    let preset: PalettePreset = serde_json::from_str(&data)
        .with_context(|| format!("parsing palette preset {}", path.display()))?;
    ensure!(
        !preset.colors.is_empty(),
        "palette preset {} lists no colors",
        path.display()
    );
    Ok(preset.colors)
}
