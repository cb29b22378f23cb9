// UI module - cross-thread signal dispatch and the host surface seam
//
// This module contains:
// - UiDispatcher / UiEventQueue: marshals background-thread events onto the
//   host's UI thread, in emission order
// - UiSurface: the seam the host implements (webview bridge, dialogs,
//   file picker); tests bind recording stubs instead

pub mod dispatcher;

pub use dispatcher::{UiDispatcher, UiEventQueue, UiSignal, ui_channel};

use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;
use std::fs;

/// Informational text shown when no API key is configured at startup.
pub const NO_CREDENTIAL_NOTICE: &str =
    "chathost has loaded. There is no API key detected, please set one before using the app.";

/// The host-side seam every dispatched signal lands on.
///
/// Implementations run exclusively on the UI thread; the queue draining in
/// [`UiEventQueue`] guarantees handlers are never invoked concurrently.
pub trait UiSurface {
    /// Reset the host UI to a clean state.
    fn reset_ui(&mut self);

    /// Open a native file picker and return the selection (empty when the
    /// user cancels).
    fn pick_files(&mut self) -> Vec<camino::Utf8PathBuf>;

    /// Show a one-off informational notice.
    fn show_notice(&mut self, message: &str);

    /// Relay a payload to the embedded UI surface (webview or equivalent).
    fn send_to_surface(&mut self, payload: Value);
}

/// File metadata forwarded to the UI surface after a file-picker selection.
///
/// The field names and the leading-dot extension format are part of the UI
/// surface contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub file_name_with_extension: String,
    pub file_name: String,
    pub extension: String,
    pub path: String,
    pub size: u64,
}

impl FileMetadata {
    /// Build metadata for a picked file, reading its size from disk.
    pub fn from_path(path: &Utf8Path) -> std::io::Result<Self> {
        let file_name_with_extension = path.file_name().unwrap_or_default().to_string();
        let file_name = path.file_stem().unwrap_or_default().to_string();
        let extension = path
            .extension()
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let size = fs::metadata(path.as_std_path())?.len();

        Ok(Self {
            file_name_with_extension,
            file_name,
            extension,
            path: path.to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;

    #[test]
    fn test_file_metadata_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        let file_path = dir.path().join("notes.md");
        let mut f = fs::File::create(&file_path).unwrap();
        f.write_all(b"hello").unwrap();

        let utf8 = Utf8PathBuf::try_from(file_path).unwrap();
        let meta = FileMetadata::from_path(&utf8).unwrap();

        assert_eq!(meta.file_name_with_extension, "notes.md");
        assert_eq!(meta.file_name, "notes");
        assert_eq!(meta.extension, ".md");
        assert_eq!(meta.size, 5);
        assert!(meta.path.ends_with("notes.md"));
    }

    #[test]
    fn test_file_metadata_no_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let file_path = dir.path().join("README");
        fs::File::create(&file_path).unwrap();

        let utf8 = Utf8PathBuf::try_from(file_path).unwrap();
        let meta = FileMetadata::from_path(&utf8).unwrap();

        assert_eq!(meta.file_name, "README");
        assert_eq!(meta.extension, "");
    }

    #[test]
    fn test_file_metadata_missing_file() {
        let result = FileMetadata::from_path(Utf8Path::new("/nonexistent/file.txt"));
        assert!(result.is_err());
    }
}
