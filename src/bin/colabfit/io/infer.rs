use std::path::Path;

use colabfit::io::Format;

pub fn input(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "xyz" | "extxyz" => Some(Format::ExtXyz),
        _ => None,
    }
}
