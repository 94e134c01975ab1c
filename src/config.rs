use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};

use crate::export::ExportOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub ingest: IngestConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// "auto", "semicolon" or "tab"
    pub delimiter: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { delimiter: "auto".into() }
    }
}

impl IngestConfig {
    /// `None` means sniff the delimiter from the header line.
    pub fn delimiter_byte(&self) -> Option<u8> {
        parse_delimiter(&self.delimiter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub delimiter: String,
    pub decimal_comma: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: "semicolon".into(),
            decimal_comma: true,
        }
    }
}

impl ExportConfig {
    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            delimiter: parse_delimiter(&self.delimiter).unwrap_or(b';'),
            decimal_comma: self.decimal_comma,
        }
    }
}

fn parse_delimiter(name: &str) -> Option<u8> {
    match name {
        "auto" => None,
        ";" | "semicolon" => Some(b';'),
        "\t" | "tab" => Some(b'\t'),
        other => other.bytes().next(),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EWB__").split("__"));
        Ok(figment.extract()?)
    }
}
