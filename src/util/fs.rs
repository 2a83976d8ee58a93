use std::fs;
use std::io;
use std::path::Path;

/// Ensure a file exists by creating parent directories as needed.
pub fn ensure_file_exists(p: &Path) -> io::Result<()> {
    if !p.exists() {
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(p)?;
    }
    Ok(())
}

/// Write `content` to `p` (creating parents) unless the file already holds exactly that content.
pub fn write_if_changed(p: &Path, content: &[u8]) -> io::Result<bool> {
    if let Ok(existing) = fs::read(p) {
        if existing == content {
            return Ok(false);
        }
    }
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(p, content)?;
    Ok(true)
}
