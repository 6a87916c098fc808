//! Dumps the relay's OpenAPI document. Usage: `openapi [OUTPUT]`.

use chatrelay_server::router::write_openapi;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));
    write_openapi(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
