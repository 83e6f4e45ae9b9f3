use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusttype::Font;
use std::{collections::HashMap, path::Path, path::PathBuf, sync::Arc};

use super::GenError;

// Font files never change during process lifetime, so decoded fonts are
// cached by absolute path for the life of the process.
static FONT_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<Font<'static>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn load(path: &Path) -> Result<Arc<Font<'static>>, GenError> {
    if let Some(f) = FONT_CACHE.lock().get(path) {
        return Ok(Arc::clone(f));
    }

    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GenError::MissingAsset(format!("font not found: {}", path.display()))
        } else {
            GenError::Internal(format!("failed to read font {}: {e}", path.display()))
        }
    })?;
    let f = Font::try_from_vec(bytes)
        .ok_or_else(|| GenError::MissingAsset(format!("failed to parse font {}", path.display())))?;

    let f = Arc::new(f);
    FONT_CACHE.lock().insert(path.to_path_buf(), Arc::clone(&f));
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_is_a_missing_asset() {
        let err = load(Path::new("/definitely/not/here.ttf")).unwrap_err();
        assert!(matches!(err, GenError::MissingAsset(_)), "got {err:?}");
    }
}
