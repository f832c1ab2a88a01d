use std::fs::OpenOptions;
use std::path::Path;

/// Append one row to a CSV file, writing the header first if the file is new
/// or empty. Mirrors the plain `csv.DictWriter` append pattern, just made
/// safe for concurrent appenders at the OS file-append level.
pub fn append_row(path: &Path, headers: &[&str], row: &[String]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let write_header = !path.exists() || std::fs::metadata(path)?.len() == 0;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if write_header {
        writer.write_record(headers)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_append_writes_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        append_row(&path, &["symbol", "side"], &["SPY".into(), "buy".into()]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("symbol,side"));
        assert_eq!(lines.next(), Some("SPY,buy"));
    }

    #[test]
    fn second_append_does_not_repeat_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        append_row(&path, &["symbol", "side"], &["SPY".into(), "buy".into()]).unwrap();
        append_row(&path, &["symbol", "side"], &["QQQ".into(), "sell".into()]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
