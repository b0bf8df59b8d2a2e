use crate::error::ConfigError;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

/// Colon-separated directories searched for noise files given by relative path.
pub(crate) const SEARCH_PATH_VARIABLE: &str = "WIRESIM_SEARCH_PATH";

/// Frequency-domain noise magnitudes, one per bin from DC to Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NoiseTemplate {
    magnitudes: Vec<f64>,
}

impl NoiseTemplate {
    pub(crate) fn new(magnitudes: Vec<f64>) -> Self {
        Self { magnitudes }
    }

    pub(crate) fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub(crate) fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// The template must supply exactly one magnitude per bin of a real
    /// transform of length `fft_size`.
    pub(crate) fn check_fft_size(&self, fft_size: usize) -> Result<(), ConfigError> {
        let expected = fft_size / 2 + 1;
        if self.len() == expected {
            Ok(())
        } else {
            Err(ConfigError::TemplateLength {
                bins: self.len(),
                fft_size,
                expected,
            })
        }
    }
}

/// Where a template is read from: a JSON file mapping histogram names to
/// their bin contents.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct NoiseSource {
    pub(crate) file: PathBuf,
    pub(crate) histogram: String,
}

/// Loads each noise template once and hands out shared, read-only copies.
#[derive(Default)]
pub(crate) struct NoiseSpectrumStore {
    search_path: Vec<PathBuf>,
    templates: HashMap<NoiseSource, Arc<NoiseTemplate>>,
}

impl NoiseSpectrumStore {
    pub(crate) fn from_env() -> Self {
        let search_path = env::var_os(SEARCH_PATH_VARIABLE)
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self::with_search_path(search_path)
    }

    pub(crate) fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            templates: HashMap::new(),
        }
    }

    #[tracing::instrument(skip_all, fields(file = ?source.file, histogram = %source.histogram))]
    pub(crate) fn load(&mut self, source: &NoiseSource) -> Result<Arc<NoiseTemplate>, ConfigError> {
        if let Some(template) = self.templates.get(source) {
            debug!("Reusing loaded template");
            return Ok(template.clone());
        }
        let path = self.find_file(&source.file)?;
        let file = File::open(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let mut histograms: HashMap<String, Vec<f64>> =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                ConfigError::Malformed {
                    path: path.clone(),
                    source,
                }
            })?;
        let magnitudes = histograms.remove(&source.histogram).ok_or_else(|| {
            ConfigError::MissingHistogram {
                name: source.histogram.clone(),
                path: path.clone(),
            }
        })?;
        info!("Loaded noise template with {} bins", magnitudes.len());
        let template = Arc::new(NoiseTemplate::new(magnitudes));
        self.templates.insert(source.clone(), template.clone());
        Ok(template)
    }

    fn find_file(&self, file: &Path) -> Result<PathBuf, ConfigError> {
        if file.is_absolute() || file.exists() {
            return Ok(file.to_path_buf());
        }
        self.search_path
            .iter()
            .map(|dir| dir.join(file))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| ConfigError::NotInSearchPath(file.to_path_buf()))
    }
}
