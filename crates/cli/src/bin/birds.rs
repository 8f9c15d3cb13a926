use std::path::PathBuf;

use argparcel::{Choice, Record};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Choice, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Bird {
    Puffin,
    Lark,
    GreatAuk,
}

/// Choose a number and a bird.
#[derive(Debug, Record, Serialize)]
#[parcel(name = "birds")]
struct Birds {
    #[parcel(choices(1, 2, 3))]
    a: i64,
    #[parcel(default = Bird::Puffin)]
    b: Bird,
    #[parcel(default, help = "specify a path")]
    c: Option<PathBuf>,
    /// Extra sightings, as many as you like.
    #[parcel(default)]
    seen: Vec<Bird>,
    #[parcel(default)]
    window: Option<(f64, f64)>,
}

fn main() -> anyhow::Result<()> {
    argparcel_demo::run::<Birds>()
}
