//! Instrument list source
//!
//! Newline-delimited tokens. Surrounding whitespace is trimmed; blank lines
//! and lines starting with `#` are ignored.

use crate::core::{ConfigurationError, Instrument};
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

/// Read instruments from a file
pub fn load_instruments(path: impl AsRef<Path>) -> Result<Vec<Instrument>, ConfigurationError> {
    let path = path.as_ref();
    let unreadable = |source| ConfigurationError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(path).map_err(unreadable)?;
    let instruments = parse_instruments(std::io::BufReader::new(file)).map_err(unreadable)?;

    if instruments.is_empty() {
        return Err(ConfigurationError::EmptyInstrumentList);
    }

    info!(
        path = %path.display(),
        count = instruments.len(),
        "Loaded instruments"
    );
    Ok(instruments)
}

/// Parse instrument tokens from any line source
pub fn parse_instruments(reader: impl BufRead) -> std::io::Result<Vec<Instrument>> {
    let mut instruments = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        debug!(line = index + 1, instrument = token, "Instrument loaded");
        instruments.push(Instrument::new(token));
    }

    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_trims_and_skips() {
        let input = "  CS.D.EURUSD.CFD.IP  \n\n# majors\nIX.D.FTSE.DAILY.IP\n   \n";
        let instruments = parse_instruments(input.as_bytes()).unwrap();

        assert_eq!(
            instruments,
            vec![Instrument::new("CS.D.EURUSD.CFD.IP"), Instrument::new("IX.D.FTSE.DAILY.IP")]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "EURUSD").unwrap();
        writeln!(file, "GBPUSD").unwrap();

        let instruments = load_instruments(file.path()).unwrap();
        assert_eq!(instruments.len(), 2);
    }

    #[test]
    fn test_load_empty_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();

        assert!(matches!(
            load_instruments(file.path()),
            Err(ConfigurationError::EmptyInstrumentList)
        ));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(matches!(
            load_instruments("/no/such/instruments.txt"),
            Err(ConfigurationError::Unreadable { .. })
        ));
    }
}
