use argparcel::Record;
use serde::Serialize;

/// Parse a few scalars and a flag.
#[derive(Debug, Record, Serialize)]
struct Basic {
    a: i64,
    b: f64,
    c: bool,
    #[parcel(default)]
    d: Option<String>,
}

fn main() -> anyhow::Result<()> {
    argparcel_demo::run::<Basic>()
}
