//! File classification by extension

/// Compiled into a library
const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "cxx", "cc", "s", "dat", "cogc", "ecogc", "spin"];

const HEADER_EXTENSIONS: &[&str] = &["h", "hpp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Source,
    Header,
    Other,
}

/// Text after the last dot, or `None` when there is no dot or the stem is
/// empty (dotfiles such as `.c`)
pub fn extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&file_name[idx + 1..]),
    }
}

pub fn classify(file_name: &str) -> FileClass {
    let Some(ext) = extension(file_name) else {
        return FileClass::Other;
    };
    let ext = ext.to_ascii_lowercase();

    if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
        FileClass::Source
    } else if HEADER_EXTENSIONS.contains(&ext.as_str()) {
        FileClass::Header
    } else {
        FileClass::Other
    }
}

/// `.s` / `.S` files
pub fn is_assembly(file_name: &str) -> bool {
    matches!(extension(file_name), Some("s" | "S"))
}
