//! Build script for Tauri native target.

fn main() {
    tauri_build::build()
}
