//! # Marching Terrain Entry Point
//!
//! Calls into the library's `run()` to stream terrain headlessly.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- terrain.json
//! ```

fn main() {
    marching_terrain::run();
}
