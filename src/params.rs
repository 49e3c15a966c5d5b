use std::{fs::File, io::Read, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    maxent::{
        context::{ContextGenerator, FeatureTemplates, GeneratorKind},
        model::{DEFAULT_BEAM_SIZE, DEFAULT_LANGUAGE},
        trainer::Algorithm,
    },
    Error, Result,
};

/// Training and decoding parameters.
///
/// Missing keys in a JSON file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub algorithm: Algorithm,
    /// maximum number of training iterations
    pub iterations: usize,
    /// minimum number of events a feature must occur in
    pub cutoff: usize,
    pub beam_size: usize,
    pub language: String,
    pub generator: GeneratorKind,
    /// templates of the `conf` generator
    pub features: FeatureTemplates,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            iterations: 100,
            cutoff: 3,
            beam_size: DEFAULT_BEAM_SIZE,
            language: DEFAULT_LANGUAGE.to_string(),
            generator: GeneratorKind::default(),
            features: FeatureTemplates::default(),
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidParameter { name: name.to_string(), value: value.to_string() }),
    }
}

impl TrainingParams {
    /// Sets one parameter from its string form, e.g. `("cutoff", "5")` or
    /// `("feature.t_2", "false")`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "algorithm" => self.algorithm = value.parse()?,
            "iterations" | "max_iterations" => self.iterations = parse(name, value)?,
            "cutoff" | "feature.minfreq" => self.cutoff = parse(name, value)?,
            "beam_size" => {
                let size: usize = parse(name, value)?;
                if size == 0 {
                    return Err(Error::InvalidParameter { name: name.to_string(), value: value.to_string() });
                }
                self.beam_size = size;
            }
            "language" => self.language = value.trim().to_string(),
            "feature.class" => self.generator = value.parse()?,
            _ => match FeatureTemplates::from_key(name) {
                Some(flag) => self.features.set(flag, parse_flag(name, value)?),
                None => {
                    return Err(Error::InvalidParameter { name: name.to_string(), value: value.to_string() })
                }
            },
        }
        Ok(())
    }

    /// Applies a `name=value` assignment.
    pub fn set_pair(&mut self, pair: &str) -> Result<()> {
        match pair.split_once('=') {
            Some((name, value)) => self.set(name.trim(), value),
            None => Err(Error::InvalidParameter { name: pair.to_string(), value: String::new() }),
        }
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        Ok(serde_json::from_reader(rdr)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn context_generator(&self) -> Box<dyn ContextGenerator> {
        self.generator.build(self.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = TrainingParams::default();
        assert_eq!(params.algorithm, Algorithm::Gis);
        assert_eq!(params.iterations, 100);
        assert_eq!(params.cutoff, 3);
        assert_eq!(params.beam_size, 3);
        assert_eq!(params.features, FeatureTemplates::all());
    }

    #[test]
    fn set_by_name() {
        let mut params = TrainingParams::default();
        params.set("algorithm", "perceptron").unwrap();
        params.set("cutoff", "5").unwrap();
        params.set("feature.class", "conf").unwrap();
        params.set("feature.t_2", "false").unwrap();
        params.set_pair("beam_size=8").unwrap();
        assert_eq!(params.algorithm, Algorithm::Perceptron);
        assert_eq!(params.cutoff, 5);
        assert_eq!(params.beam_size, 8);
        assert_eq!(params.generator, GeneratorKind::Conf);
        assert!(!params.features.contains(FeatureTemplates::T_2));
        assert!(params.features.contains(FeatureTemplates::T_1));
    }

    #[test]
    fn invalid_values() {
        let mut params = TrainingParams::default();
        assert!(matches!(params.set("cutoff", "many"), Err(Error::InvalidParameter { .. })));
        assert!(matches!(params.set("beam_size", "0"), Err(Error::InvalidParameter { .. })));
        assert!(matches!(params.set("feature.c9", "true"), Err(Error::InvalidParameter { .. })));
        assert!(matches!(params.set("feature.c0", "maybe"), Err(Error::InvalidParameter { .. })));
        assert!(matches!(params.set("algorithm", "crf"), Err(Error::UnsupportedAlgorithm(..))));
        assert!(matches!(params.set_pair("cutoff"), Err(Error::InvalidParameter { .. })));
        assert_eq!(params, TrainingParams::default());
    }

    #[test]
    fn from_json() {
        let json = r#"{"algorithm": "perceptron", "iterations": 7, "language": "zh-tw"}"#;
        let params = TrainingParams::from_reader(json.as_bytes()).unwrap();
        assert_eq!(params.algorithm, Algorithm::Perceptron);
        assert_eq!(params.iterations, 7);
        assert_eq!(params.language, "zh-tw");
        assert_eq!(params.cutoff, 3);
    }
}
