//! Seeding configuration.
//!
//! A run is described by a [`SeedConfig`], read from YAML and then overridden by
//! command-line flags. Every field is optional:
//!
//! ```yaml
//! file: database/seeds/users.csv   # required, here or via --input
//! table: users                     # defaults to the file stem
//! truncate: true
//! suspend_foreign_keys: false
//! header: true                    # with `mapping`, unset means no header row
//! mapping: []                      # explicit column names
//! aliases: { Name: name }
//! skipper: "%"                     # null disables skipping
//! transforms: { email: lowercase(trim(value)) }
//! hashable: [password]            # salted bcrypt
//! hash_cost: 12
//! validate: { email: [required, email] }
//! keep_empty_strings: false
//! defaults: { role: user }
//! timestamps: true                 # false, or a fixed "Y-m-d H:i:s" string
//! offset: 0
//! chunk: 50
//! encode: true
//! delimiter: ";"
//! fallback_encoding: windows-1252
//! ```
//!
//! [`SeedConfig::compile`] checks the whole configuration and produces the
//! immutable [`LoadOptions`] and [`TransformRules`] a run works with.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Deserializer, de};

use crate::{
    cli::{self, SeedOverrides},
    data::{self, Value},
    error::{SeedError, SeedResult},
    io_utils::{self, EncodingPolicy},
    seed::{DEFAULT_CHUNK_SIZE, HeaderSource, LoadOptions},
    transform::{EmptyStringPolicy, TimestampPolicy, TransformRules, ValidationRules, hash},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    pub file: Option<PathBuf>,
    pub table: Option<String>,
    pub truncate: bool,
    pub suspend_foreign_keys: bool,
    pub header: Option<bool>,
    pub mapping: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub skipper: Option<String>,
    pub transforms: BTreeMap<String, String>,
    pub hashable: Vec<String>,
    pub hash_cost: u32,
    pub validate: BTreeMap<String, Vec<String>>,
    pub keep_empty_strings: bool,
    pub defaults: BTreeMap<String, Value>,
    #[serde(deserialize_with = "deserialize_timestamps")]
    pub timestamps: TimestampPolicy,
    pub offset: u64,
    pub chunk: usize,
    pub encode: bool,
    #[serde(deserialize_with = "deserialize_delimiter")]
    pub delimiter: u8,
    pub fallback_encoding: Option<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            file: None,
            table: None,
            truncate: true,
            suspend_foreign_keys: false,
            header: None,
            mapping: Vec::new(),
            aliases: BTreeMap::new(),
            skipper: Some("%".to_string()),
            transforms: BTreeMap::new(),
            hashable: vec!["password".to_string()],
            hash_cost: hash::DEFAULT_COST,
            validate: BTreeMap::new(),
            keep_empty_strings: false,
            defaults: BTreeMap::new(),
            timestamps: TimestampPolicy::CurrentTime,
            offset: 0,
            chunk: DEFAULT_CHUNK_SIZE,
            encode: true,
            delimiter: io_utils::DEFAULT_DELIMITER,
            fallback_encoding: None,
        }
    }
}

/// Everything a run needs, checked and ready.
#[derive(Debug)]
pub struct SeedPlan {
    pub file: PathBuf,
    pub delimiter: u8,
    pub options: LoadOptions,
    pub rules: TransformRules,
}

impl SeedConfig {
    pub fn load(path: &Path) -> SeedResult<Self> {
        let file = File::open(path).map_err(|source| SeedError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SeedConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| SeedError::config(format!("Parsing configuration {path:?}: {err}")))?;
        debug!("Loaded seeding configuration from {path:?}");
        Ok(config)
    }

    pub fn from_args(path: Option<&Path>, overrides: &SeedOverrides) -> SeedResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides)?;
        Ok(config)
    }

    /// Applies command-line flags on top of the file configuration. Map-valued
    /// flags merge entry by entry; `--hash` replaces the hashable list.
    pub fn apply(&mut self, overrides: &SeedOverrides) -> SeedResult<()> {
        if let Some(file) = &overrides.file {
            self.file = Some(file.clone());
        }
        if let Some(table) = &overrides.table {
            self.table = Some(table.clone());
        }
        if overrides.no_truncate {
            self.truncate = false;
        }
        if overrides.suspend_foreign_keys {
            self.suspend_foreign_keys = true;
        }
        if overrides.no_header {
            self.header = Some(false);
        } else if overrides.skip_header {
            self.header = Some(true);
        }
        if !overrides.mapping.is_empty() {
            self.mapping = overrides
                .mapping
                .iter()
                .map(|column| column.trim().to_string())
                .collect();
        }
        for raw in &overrides.aliases {
            let (from, to) = split_assignment(raw, "--alias")?;
            self.aliases.insert(from, to);
        }
        if overrides.no_skipper {
            self.skipper = None;
        } else if let Some(skipper) = &overrides.skipper {
            self.skipper = Some(skipper.clone());
        }
        for raw in &overrides.transforms {
            let (column, expression) = split_assignment(raw, "--transform")?;
            self.transforms.insert(column, expression);
        }
        if overrides.no_hash {
            self.hashable.clear();
        } else if !overrides.hashable.is_empty() {
            self.hashable = overrides.hashable.clone();
        }
        if let Some(cost) = overrides.hash_cost {
            self.hash_cost = cost;
        }
        for raw in &overrides.validate {
            let (column, rule) = split_assignment(raw, "--validate")?;
            self.validate.entry(column).or_default().push(rule);
        }
        if overrides.keep_empty_strings {
            self.keep_empty_strings = true;
        }
        for raw in &overrides.defaults {
            let (column, value) = split_assignment(raw, "--default")?;
            self.defaults.insert(column, data::parse_literal(&value));
        }
        if overrides.no_timestamps {
            self.timestamps = TimestampPolicy::Off;
        } else if let Some(stamp) = &overrides.timestamp {
            self.timestamps = TimestampPolicy::Fixed(stamp.clone());
        }
        if let Some(offset) = overrides.offset {
            self.offset = offset;
        }
        if let Some(chunk) = overrides.chunk {
            self.chunk = chunk;
        }
        if overrides.no_encode {
            self.encode = false;
        }
        if let Some(delimiter) = overrides.delimiter {
            self.delimiter = delimiter;
        }
        if let Some(label) = &overrides.fallback_encoding {
            self.fallback_encoding = Some(label.clone());
        }
        Ok(())
    }

    pub fn compile(&self) -> SeedResult<SeedPlan> {
        let file = self
            .file
            .clone()
            .ok_or_else(|| SeedError::config("No CSV file given"))?;
        let table = match &self.table {
            Some(table) if !table.trim().is_empty() => table.trim().to_string(),
            _ => io_utils::table_name_from_path(&file).ok_or_else(|| {
                SeedError::config(format!("Cannot derive a table name from {file:?}"))
            })?,
        };
        if self.chunk == 0 {
            return Err(SeedError::config("Chunk size must be at least 1"));
        }

        if !(hash::MIN_COST..=hash::MAX_COST).contains(&self.hash_cost) {
            return Err(SeedError::config(format!(
                "Hash cost must be between {} and {}, got {}",
                hash::MIN_COST,
                hash::MAX_COST,
                self.hash_cost
            )));
        }

        // An explicit mapping describes a headerless file unless a header is declared.
        let header = if self.mapping.is_empty() {
            if self.header == Some(false) {
                return Err(SeedError::config(
                    "A file without a header row needs an explicit column mapping",
                ));
            }
            HeaderSource::File
        } else {
            HeaderSource::Explicit {
                columns: self.mapping.clone(),
                skip_file_header: self.header.unwrap_or(false),
            }
        };

        let options = LoadOptions {
            table,
            truncate: self.truncate,
            suspend_integrity: self.suspend_foreign_keys,
            header,
            aliases: self.aliases.clone(),
            skip_prefix: self.skipper.clone().filter(|prefix| !prefix.is_empty()),
            offset: self.offset,
            chunk: self.chunk,
        };

        let fallback = io_utils::resolve_encoding(self.fallback_encoding.as_deref())?;
        let mut rules = TransformRules {
            defaults: self.defaults.clone(),
            hashable: self.hashable.iter().cloned().collect::<BTreeSet<_>>(),
            hash_cost: self.hash_cost,
            validation: ValidationRules::parse(&self.validate)?,
            empty_strings: if self.keep_empty_strings {
                EmptyStringPolicy::Preserve
            } else {
                EmptyStringPolicy::Null
            },
            encoding: if self.encode {
                EncodingPolicy::ForceUtf8 { fallback }
            } else {
                EncodingPolicy::AsIs
            },
            timestamps: self.timestamps.clone(),
            ..TransformRules::default()
        };
        for (column, expression) in &self.transforms {
            rules.transforms.register_expression(column.clone(), expression)?;
        }

        Ok(SeedPlan {
            file,
            delimiter: self.delimiter,
            options,
            rules,
        })
    }
}

fn split_assignment(raw: &str, flag: &str) -> SeedResult<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| SeedError::config(format!("{flag} expects 'column=value', got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(SeedError::config(format!("{flag} is missing a column name in '{raw}'")));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn deserialize_timestamps<'de, D>(deserializer: D) -> Result<TimestampPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Bool(true) => Ok(TimestampPolicy::CurrentTime),
        serde_yaml::Value::Bool(false) | serde_yaml::Value::Null => Ok(TimestampPolicy::Off),
        serde_yaml::Value::String(s) if s.trim().is_empty() => Ok(TimestampPolicy::Off),
        serde_yaml::Value::String(s) => Ok(TimestampPolicy::Fixed(s)),
        other => Err(de::Error::custom(format!(
            "timestamps must be true, false or a fixed value, found {other:?}"
        ))),
    }
}

fn deserialize_delimiter<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    cli::parse_delimiter(&raw).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    fn parse(yaml: &str) -> SeedConfig {
        serde_yaml::from_str(yaml).expect("valid configuration")
    }

    #[test]
    fn empty_document_uses_documented_defaults() {
        let config = parse("{}");
        assert!(config.truncate);
        assert!(!config.suspend_foreign_keys);
        assert_eq!(config.header, None);
        assert_eq!(config.hash_cost, hash::DEFAULT_COST);
        assert_eq!(config.skipper.as_deref(), Some("%"));
        assert_eq!(config.hashable, vec!["password"]);
        assert_eq!(config.timestamps, TimestampPolicy::CurrentTime);
        assert_eq!(config.chunk, 50);
        assert_eq!(config.offset, 0);
        assert_eq!(config.delimiter, b';');
        assert!(config.encode);
    }

    #[test]
    fn yaml_fields_are_read() {
        let config = parse(
            r#"
file: seeds/users.csv
skipper: null
timestamps: "2024-01-01 00:00:00"
delimiter: tab
defaults:
  active: true
  role: user
validate:
  email: [required, email]
"#,
        );
        assert_eq!(config.skipper, None);
        assert_eq!(
            config.timestamps,
            TimestampPolicy::Fixed("2024-01-01 00:00:00".into())
        );
        assert_eq!(config.delimiter, b'\t');
        assert_eq!(config.defaults["active"], Value::Boolean(true));
        assert_eq!(config.validate["email"].len(), 2);
        assert_eq!(parse("timestamps: false").timestamps, TimestampPolicy::Off);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<SeedConfig>("tablename: users").is_err());
    }

    #[test]
    fn compile_derives_table_from_file_stem() {
        let config = SeedConfig {
            file: Some(PathBuf::from("database/seeds/users.csv")),
            ..SeedConfig::default()
        };
        let plan = config.compile().unwrap();
        assert_eq!(plan.options.table, "users");
        assert_eq!(plan.options.header, HeaderSource::File);
        assert_eq!(plan.options.skip_prefix.as_deref(), Some("%"));
        assert_eq!(
            plan.rules.encoding,
            EncodingPolicy::ForceUtf8 {
                fallback: WINDOWS_1252
            }
        );
        assert!(plan.rules.hashable.contains("password"));
    }

    #[test]
    fn compile_rejects_incomplete_configuration() {
        let missing_file = SeedConfig::default().compile().unwrap_err();
        assert_eq!(missing_file.to_string(), "No CSV file given");

        let base = SeedConfig {
            file: Some(PathBuf::from("users.csv")),
            ..SeedConfig::default()
        };
        let zero_chunk = SeedConfig {
            chunk: 0,
            ..base.clone()
        };
        assert!(zero_chunk.compile().is_err());
        let headerless = SeedConfig {
            header: Some(false),
            ..base.clone()
        };
        assert!(headerless.compile().is_err());
        let cheap_hash = SeedConfig {
            hash_cost: 3,
            ..base.clone()
        };
        assert!(cheap_hash.compile().is_err());
        let bad_rule = SeedConfig {
            validate: BTreeMap::from([("id".to_string(), vec!["unique".to_string()])]),
            ..base.clone()
        };
        assert!(bad_rule.compile().is_err());
        let bad_encoding = SeedConfig {
            fallback_encoding: Some("klingon".into()),
            ..base
        };
        assert!(bad_encoding.compile().is_err());
    }

    #[test]
    fn overrides_merge_into_file_configuration() {
        let mut config = parse("file: users.csv\naliases: { Name: name }\nhashable: [password]");
        let overrides = SeedOverrides {
            table: Some("members".into()),
            aliases: vec!["Mail=email".into()],
            hashable: vec!["pin".into()],
            defaults: vec!["active=true".into()],
            validate: vec!["email=email".into()],
            mapping: vec![" name".into(), "email ".into()],
            no_timestamps: true,
            chunk: Some(10),
            hash_cost: Some(4),
            ..SeedOverrides::default()
        };
        config.apply(&overrides).unwrap();
        assert_eq!(config.table.as_deref(), Some("members"));
        assert_eq!(config.aliases.len(), 2);
        assert_eq!(config.hashable, vec!["pin"]);
        assert_eq!(config.defaults["active"], Value::Boolean(true));
        assert_eq!(config.mapping, vec!["name", "email"]);
        assert_eq!(config.timestamps, TimestampPolicy::Off);

        let plan = config.compile().unwrap();
        assert_eq!(
            plan.options.header,
            HeaderSource::Explicit {
                columns: vec!["name".into(), "email".into()],
                skip_file_header: false,
            }
        );
        assert_eq!(plan.options.chunk, 10);
        assert_eq!(plan.rules.hash_cost, 4);
    }

    #[test]
    fn mapping_reads_every_record_unless_a_header_is_declared() {
        let mapped = parse("file: users.csv\nmapping: [id, name]");
        assert_eq!(
            mapped.compile().unwrap().options.header,
            HeaderSource::Explicit {
                columns: vec!["id".into(), "name".into()],
                skip_file_header: false,
            }
        );

        let declared = parse("file: users.csv\nmapping: [id, name]\nheader: true");
        assert_eq!(
            declared.compile().unwrap().options.header,
            HeaderSource::Explicit {
                columns: vec!["id".into(), "name".into()],
                skip_file_header: true,
            }
        );

        let mut flagged = mapped.clone();
        flagged
            .apply(&SeedOverrides {
                skip_header: true,
                ..SeedOverrides::default()
            })
            .unwrap();
        assert_eq!(flagged.header, Some(true));

        let explicit_file_header = parse("file: users.csv\nheader: true");
        assert_eq!(
            explicit_file_header.compile().unwrap().options.header,
            HeaderSource::File
        );
    }

    #[test]
    fn malformed_assignments_are_config_errors() {
        let mut config = SeedConfig::default();
        let overrides = SeedOverrides {
            aliases: vec!["nope".into()],
            ..SeedOverrides::default()
        };
        assert!(matches!(config.apply(&overrides), Err(SeedError::Config(_))));
    }
}
