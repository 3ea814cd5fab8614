//! Record files on disk

use super::{Error, Result, TransactionRecord};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a record as pretty-printed JSON
///
/// The file appears under its final name only once it is complete.
pub fn save(dir: &Path, filename: &str, record: &TransactionRecord) -> Result<PathBuf> {
    let mut data = serde_json::to_vec_pretty(record)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    data.push(b'\n');

    let path = dir.join(filename);
    let tmp = dir.join(format!(".{}.tmp", filename));
    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&data)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, &path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), bytes = data.len(), "record written");
    Ok(path)
}

/// Read a record file
pub fn load(path: &Path) -> Result<TransactionRecord> {
    let data = fs::read(path)?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::InvalidRecordFile(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Body, FoldedHeaders, Message};
    use chrono::{FixedOffset, TimeZone};

    fn record() -> TransactionRecord {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .unwrap();
        let mut record = TransactionRecord::new("PUT", "/x", time, "HTTP/1.1");
        let mut header = FoldedHeaders::new();
        header.set("X-Test", "1");
        record.request = Some(Message {
            header,
            original_content_encoding: String::new(),
            body: Body::Text("hi there".to_string()),
        });
        record
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), "0001_x.json", &record()).unwrap();
        assert_eq!(path, dir.path().join("0001_x.json"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"method\": \"PUT\",\n"));
        assert!(text.contains("\"time\": \"2024-05-06T07:08:09Z\""));
        assert!(text.ends_with("}\n"));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.method, "PUT");
        assert_eq!(loaded.url, "/x");
        let request = loaded.request.unwrap();
        assert_eq!(request.header.first("x-test"), Some("1"));
        assert!(matches!(request.body, Body::Text(ref t) if t == "hi there"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Io(_))));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, b"{\"method\": 5}").unwrap();
        assert!(matches!(load(&bad), Err(Error::InvalidRecordFile(_))));

        fs::write(&bad, b"not json").unwrap();
        assert!(matches!(load(&bad), Err(Error::InvalidRecordFile(_))));
    }
}
