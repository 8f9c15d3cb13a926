use std::fmt;
use std::str::FromStr;

use argparcel::{Record, Registry};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
struct Port(u16);

impl FromStr for Port {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u16>() {
            Ok(0) => Err(PortError::Reserved),
            Ok(port) => Ok(Self(port)),
            Err(_) => Err(PortError::NotANumber),
        }
    }
}

#[derive(Debug)]
enum PortError {
    Reserved,
    NotANumber,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved => f.write_str("port 0 is reserved"),
            Self::NotANumber => f.write_str("expected a number between 1 and 65535"),
        }
    }
}

argparcel::scalar_type!(Port => "port");

/// Pick a listening port and some fallbacks.
#[derive(Debug, Record, Serialize)]
#[parcel(name = "ports")]
struct Ports {
    port: Port,
    #[parcel(default)]
    fallbacks: Vec<Port>,
    #[parcel(default = "localhost")]
    host: String,
}

fn main() -> anyhow::Result<()> {
    let registry = Registry::default().with_from_str::<Port>("port");
    argparcel_demo::run_with::<Ports>(&registry)
}
