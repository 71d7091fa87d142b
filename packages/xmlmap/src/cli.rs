//! Command-line interface: JSON ↔ XML over stdin/stdout.

use std::io::{self, Read, Write};

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::value::Value;

/// xmlmap - Convert between nested JSON maps and XML documents.
#[derive(Parser)]
#[command(name = "xmlmap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read JSON from stdin and write XML to stdout.
    Encode {
        #[command(flatten)]
        shared: SharedArgs,

        /// Indent the XML output
        #[arg(long)]
        format_output: bool,

        /// XML version written in the declaration
        #[arg(long)]
        xml_version: Option<String>,

        /// Encoding named in the declaration
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Read XML from stdin and write JSON to stdout.
    Decode {
        #[command(flatten)]
        shared: SharedArgs,

        /// Add namespace declarations to the root attributes
        #[arg(long)]
        use_namespaces: bool,

        /// Keep single child elements wrapped in a list
        #[arg(long)]
        force_one_element_array: bool,

        /// Write JSON on a single line
        #[arg(long)]
        compact: bool,
    },
}

/// Options accepted by both directions.
#[derive(Args, Debug, Default)]
pub struct SharedArgs {
    /// Configuration overrides as a JSON object (e.g. '{"valueKey":"#text"}')
    #[arg(long)]
    pub config: Option<String>,

    /// Marker key for attributes (default: @attributes)
    #[arg(long)]
    pub attributes_key: Option<String>,

    /// Marker key for element text (default: @value)
    #[arg(long)]
    pub value_key: Option<String>,

    /// Marker key for CDATA sections (default: @cdata)
    #[arg(long)]
    pub cdata_key: Option<String>,
}

impl SharedArgs {
    /// Build a configuration: `--config` overrides first, then the flags.
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(json) => Config::from_overrides(serde_json::from_str(json)?)?,
            None => Config::default(),
        };
        if let Some(key) = &self.attributes_key {
            config.attributes_key = key.clone();
        }
        if let Some(key) = &self.value_key {
            config.value_key = key.clone();
        }
        if let Some(key) = &self.cdata_key {
            config.cdata_key = key.clone();
        }
        Ok(config)
    }
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let output = execute(&cli.command, &input)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    Ok(())
}

/// Run a command on its input and return the bytes that go to stdout.
///
/// XML output is in the encoding named by its declaration.
pub fn execute(command: &Commands, input: &str) -> Result<Vec<u8>> {
    match command {
        Commands::Encode {
            shared,
            format_output,
            xml_version,
            encoding,
        } => {
            let mut config = shared.to_config()?;
            if *format_output {
                config.format_output = true;
            }
            if let Some(version) = xml_version {
                config.version = version.clone();
            }
            if let Some(encoding) = encoding {
                config.encoding = encoding.clone();
            }
            encode_command(input, config)
        }
        Commands::Decode {
            shared,
            use_namespaces,
            force_one_element_array,
            compact,
        } => {
            let mut config = shared.to_config()?;
            if *use_namespaces {
                config.use_namespaces = true;
            }
            if *force_one_element_array {
                config.force_one_element_array = true;
            }
            decode_command(input, config, *compact).map(String::into_bytes)
        }
    }
}

/// Convert a JSON document into encoded XML.
fn encode_command(input: &str, config: Config) -> Result<Vec<u8>> {
    let json: serde_json::Value = serde_json::from_str(input)?;
    let value = Value::from(json);
    Encoder::new(config).build_xml_value(&value)?.to_xml_bytes()
}

/// Convert XML text into a JSON document.
fn decode_command(input: &str, config: Config, compact: bool) -> Result<String> {
    let map = Decoder::new(config).build_from_str(input)?;
    let mut json = if compact {
        serde_json::to_string(&map)?
    } else {
        serde_json::to_string_pretty(&map)?
    };
    json.push('\n');
    Ok(json)
}
