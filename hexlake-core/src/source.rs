use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File formats the ingestor can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Parquet,
    Csv,
}

impl SourceFormat {
    /// Infer the format from a URL or path. CSV-like extensions select CSV,
    /// anything else is treated as Parquet.
    pub fn infer(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .to_ascii_lowercase();
        if path.ends_with(".csv") || path.ends_with(".tsv") || path.ends_with(".txt") {
            Self::Csv
        } else {
            Self::Parquet
        }
    }

    /// Fixed name the buffer is registered under before materialization.
    pub fn buffer_name(self) -> &'static str {
        match self {
            Self::Parquet => "data.parquet",
            Self::Csv => "data.csv",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unsupported source format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(SourceFormat::infer("/data/subset.csv"), SourceFormat::Csv);
        assert_eq!(
            SourceFormat::infer("https://host/h3_binary_matrix.CSV?v=2"),
            SourceFormat::Csv
        );
        assert_eq!(
            SourceFormat::infer("/data/volledige_tijdreeks_met_namen.parquet"),
            SourceFormat::Parquet
        );
        assert_eq!(SourceFormat::infer("/data/blob"), SourceFormat::Parquet);
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("CSV".parse::<SourceFormat>(), Ok(SourceFormat::Csv));
        assert_eq!(" parquet ".parse::<SourceFormat>(), Ok(SourceFormat::Parquet));
        assert!("arrow".parse::<SourceFormat>().is_err());
    }
}
