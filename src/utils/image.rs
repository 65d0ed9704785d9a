//! Reading the program image from disk.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};

use crate::transfer::Payload;

/// Read the whole image at `path` into a [`Payload`].
///
/// The file is read once, before the session starts. Images too large for the
/// 32 bit length header are loaded fine and rejected by the session itself.
pub fn load_image(path: impl AsRef<Path>) -> io::Result<Payload> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        debug!("`{}` error: {}", path.display(), e);
        io::Error::new(e.kind(), format!("could not read `{}`: {}", path.display(), e))
    })?;
    info!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(Payload::from(bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&content).unwrap();

        let payload = load_image(file.path()).unwrap();

        assert_eq!(payload.as_bytes(), &content[..]);
    }

    #[test]
    fn empty_file_is_an_empty_payload() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_image(file.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_file_keeps_error_kind() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(dir.path().join("kernel8.img")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("kernel8.img"));
    }
}
