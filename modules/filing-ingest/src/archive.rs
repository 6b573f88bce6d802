use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use filing_common::{FilingDocument, FilingError, FilingResult};

/// Filings decoded from an archive, plus the entries that could not be.
#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub filings: Vec<FilingDocument>,
    /// (entry name, reason)
    pub skipped: Vec<(String, String)>,
}

/// On-disk shape of one pre-parsed 10-K entry. Only the fields the pipeline
/// reads are declared.
#[derive(Debug, Deserialize)]
struct RawFiling {
    #[serde(default)]
    item1: Option<String>,
    #[serde(default, alias = "companyName", alias = "name")]
    company_name: Option<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    cusip: Option<OneOrMany>,
    #[serde(default)]
    cusip6: Option<OneOrMany>,
}

/// Identifier fields appear both as a bare string and as a list of
/// candidates; the first candidate wins.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> Option<String> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.into_iter().next(),
        }
    }
}

/// Decode one archive entry into a filing.
pub fn parse_filing(filing_id: &str, bytes: &[u8]) -> FilingResult<FilingDocument> {
    let malformed = |reason: String| FilingError::MalformedFiling {
        filing_id: filing_id.to_string(),
        reason,
    };

    let raw: RawFiling =
        serde_json::from_slice(bytes).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let business_description = raw
        .item1
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| malformed("missing business description (item1)".into()))?;

    let company_name = raw
        .company_name
        .or_else(|| raw.names.into_iter().next())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed("missing company name".into()))?;

    let cusip = raw
        .cusip
        .and_then(OneOrMany::first)
        .or_else(|| raw.cusip6.and_then(OneOrMany::first))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| malformed("missing company key (cusip)".into()))?;

    Ok(FilingDocument {
        filing_id: filing_id.to_string(),
        company_name,
        cusip,
        business_description,
    })
}

/// Read every `.json` entry of a zip archive. Malformed entries are skipped
/// and reported, not fatal.
pub fn read_archive<R: Read + Seek>(reader: R) -> FilingResult<ArchiveContents> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| FilingError::Archive(e.to_string()))?;
    let mut contents = ArchiveContents::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| FilingError::Archive(e.to_string()))?;

        let name = entry.name().to_string();
        if entry.is_dir() || name.starts_with("__MACOSX") || !name.ends_with(".json") {
            continue;
        }

        let filing_id = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&name)
            .to_string();

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut bytes) {
            warn!(entry = %name, error = %e, "Unreadable archive entry, skipping");
            contents.skipped.push((name, e.to_string()));
            continue;
        }

        match parse_filing(&filing_id, &bytes) {
            Ok(filing) => contents.filings.push(filing),
            Err(e) => {
                warn!(entry = %name, error = %e, "Malformed filing, skipping");
                contents.skipped.push((name, e.to_string()));
            }
        }
    }

    contents.filings.sort_by(|a, b| a.filing_id.cmp(&b.filing_id));
    Ok(contents)
}

pub fn open_archive(path: &Path) -> FilingResult<ArchiveContents> {
    let file = File::open(path)
        .map_err(|e| FilingError::Archive(format!("{}: {e}", path.display())))?;
    let contents = read_archive(file)?;
    info!(
        path = %path.display(),
        filings = contents.filings.len(),
        skipped = contents.skipped.len(),
        "Archive opened"
    );
    Ok(contents)
}

/// Decode an archive off the async runtime.
pub async fn load_filings(path: PathBuf) -> FilingResult<ArchiveContents> {
    tokio::task::spawn_blocking(move || open_archive(&path))
        .await
        .map_err(|e| FilingError::Archive(format!("archive task failed: {e}")))?
}

/// Download the archive at `url` into `cache_dir`, reusing an earlier
/// download of the same file name.
pub async fn fetch_archive(url: &str, cache_dir: &Path) -> FilingResult<PathBuf> {
    let parsed = url::Url::parse(url)
        .map_err(|e| FilingError::Config(format!("invalid archive URL {url}: {e}")))?;
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("filings.zip")
        .to_string();
    let dest = cache_dir.join(file_name);

    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        info!(path = %dest.display(), "Archive already downloaded");
        return Ok(dest);
    }

    info!(url, "Downloading filings archive");
    let response = reqwest::get(parsed)
        .await
        .map_err(|e| FilingError::Archive(format!("download failed: {e}")))?;
    if !response.status().is_success() {
        return Err(FilingError::Archive(format!(
            "download failed with status {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FilingError::Archive(format!("download interrupted: {e}")))?;

    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|e| FilingError::Archive(e.to_string()))?;
    // Write to a temp name first so an interrupted run never leaves a
    // truncated file that looks cached.
    let partial = dest.with_extension("partial");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| FilingError::Archive(e.to_string()))?;
    tokio::fs::rename(&partial, &dest)
        .await
        .map_err(|e| FilingError::Archive(e.to_string()))?;

    info!(path = %dest.display(), bytes = bytes.len(), "Archive downloaded");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            for (name, body) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn filing_fields_are_extracted() {
        let json = r#"{"item1": "We make anvils.", "names": ["Acme Corp", "ACME"], "cusip": "000123105"}"#;
        let filing = parse_filing("0001-23", json.as_bytes()).unwrap();
        assert_eq!(filing.company_name, "Acme Corp");
        assert_eq!(filing.cusip, "000123105");
        assert_eq!(filing.business_description, "We make anvils.");
        assert_eq!(filing.filing_id, "0001-23");
    }

    #[test]
    fn explicit_company_name_wins_over_names_list() {
        let json = r#"{"item1": "x", "companyName": "Globex", "names": ["Other"], "cusip6": "G1"}"#;
        let filing = parse_filing("g", json.as_bytes()).unwrap();
        assert_eq!(filing.company_name, "Globex");
        assert_eq!(filing.cusip, "G1");
    }

    #[test]
    fn listed_cusips_take_the_first_entry() {
        let json = r#"{"item1": "x", "names": ["Acme"], "cusip": ["000123105", "X"]}"#;
        let filing = parse_filing("a", json.as_bytes()).unwrap();
        assert_eq!(filing.cusip, "000123105");

        let json = r#"{"item1": "x", "names": ["Acme"], "cusip": [], "cusip6": ["000123"]}"#;
        let filing = parse_filing("a", json.as_bytes()).unwrap();
        assert_eq!(filing.cusip, "000123");
    }

    #[test]
    fn missing_text_is_malformed() {
        let json = r#"{"item1": "  ", "names": ["Acme"], "cusip": "C1"}"#;
        let err = parse_filing("a", json.as_bytes()).unwrap_err();
        assert!(matches!(err, FilingError::MalformedFiling { ref filing_id, .. } if filing_id == "a"));
    }

    #[test]
    fn archive_entries_are_decoded_and_bad_ones_skipped() {
        let bytes = zip_of(&[
            ("form10k/b.json", r#"{"item1": "B text", "names": ["Beta"], "cusip": "B1"}"#),
            ("form10k/a.json", r#"{"item1": "A text", "names": ["Alpha"], "cusip": "A1"}"#),
            ("form10k/broken.json", "{not json"),
            ("form10k/README.txt", "ignored"),
            ("__MACOSX/form10k/._a.json", "ignored"),
        ]);

        let contents = read_archive(Cursor::new(bytes)).unwrap();

        let ids: Vec<_> = contents.filings.iter().map(|f| f.filing_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(contents.skipped.len(), 1);
        assert_eq!(contents.skipped[0].0, "form10k/broken.json");
    }

    #[tokio::test]
    async fn load_filings_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filings.zip");
        std::fs::write(
            &path,
            zip_of(&[("x.json", r#"{"item1": "X", "names": ["Xeno"], "cusip": "X1"}"#)]),
        )
        .unwrap();

        let contents = load_filings(path).await.unwrap();
        assert_eq!(contents.filings.len(), 1);
    }

    #[tokio::test]
    async fn missing_archive_is_an_archive_error() {
        let err = load_filings(PathBuf::from("/nonexistent/filings.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, FilingError::Archive(_)));
    }

    #[tokio::test]
    async fn cached_download_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("form10k.zip"), b"cached").unwrap();

        // Unroutable host: only succeeds if the cache short-circuits the fetch.
        let path = fetch_archive("http://127.0.0.1:9/data/form10k.zip", dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("form10k.zip"));
    }
}
