//! Remote elevation lookup.
//!
//! Coordinates are sent in fixed-size batches to an
//! [Open Topo Data](https://www.opentopodata.org/) style endpoint:
//!
//! ```text
//! GET <endpoint>?locations=lat,lon|lat,lon|...
//! {"results": [{"elevation": 1203.4, ...}, ...]}
//! ```

use crate::{
    coord::{Coordinate, ElevatedPoint},
    error::{FetchError, ResolutionError},
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{thread, time::Duration};

pub const DEFAULT_ENDPOINT: &str = "https://api.opentopodata.org/v1/srtm90m";

/// Largest number of locations the public endpoint accepts per
/// request.
pub const MAX_BATCH: usize = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Lookup URL, without query string.
    pub endpoint: String,

    /// Locations per request, clamped to `1..=MAX_BATCH`.
    pub batch_size: usize,

    /// Wait before the single retry of a failed request.
    pub retry_backoff: Duration,

    /// Pause between consecutive batches.
    pub batch_delay: Duration,

    /// Per-request timeout for the HTTP client.
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: MAX_BATCH,
            retry_backoff: Duration::from_secs(1),
            batch_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Performs one elevation request.
pub trait Transport {
    /// Returns the response body for `locations` (`lat,lon|...`), or
    /// why no successful response was received.
    fn fetch(&self, endpoint: &str, locations: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ResolutionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolutionError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, endpoint: &str, locations: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("locations", locations)])
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    results: Option<Vec<LookupResult>>,
}

#[derive(Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

pub struct Resolver<T = HttpTransport> {
    transport: T,
    config: ResolverConfig,
}

impl Resolver<HttpTransport> {
    /// Returns a resolver backed by a blocking HTTP client.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolutionError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> Resolver<T> {
    pub fn with_transport(transport: T, config: ResolverConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns `coords` with elevations, in the same order.
    pub fn resolve(&self, coords: &[Coordinate]) -> Result<Vec<ElevatedPoint>, ResolutionError> {
        self.resolve_with_progress(coords, |_, _| {})
    }

    /// Like [Self::resolve], calling `progress(processed, total)`
    /// after each batch.
    pub fn resolve_with_progress<F>(
        &self,
        coords: &[Coordinate],
        mut progress: F,
    ) -> Result<Vec<ElevatedPoint>, ResolutionError>
    where
        F: FnMut(usize, usize),
    {
        let now = std::time::Instant::now();
        let total = coords.len();
        let mut elevations = Vec::with_capacity(total);

        let batch_size = self.config.batch_size.clamp(1, MAX_BATCH);
        for (batch, chunk) in coords.chunks(batch_size).enumerate() {
            if batch > 0 && !self.config.batch_delay.is_zero() {
                thread::sleep(self.config.batch_delay);
            }
            let batch_elevations = self.fetch_batch(batch, chunk)?;
            elevations.extend(batch_elevations);
            info!("elevations: {}/{}", elevations.len(), total);
            progress(elevations.len(), total);
        }

        if elevations.len() != total {
            return Err(ResolutionError::CountMismatch {
                expected: total,
                got: elevations.len(),
            });
        }

        debug!("resolve; len: {}, exec: {:?}", total, now.elapsed());

        Ok(coords
            .iter()
            .zip(elevations)
            .map(|(coord, elevation)| ElevatedPoint::new(*coord, elevation))
            .collect())
    }

    /// Fetches one batch, retrying a failed request exactly once.
    fn fetch_batch(&self, batch: usize, chunk: &[Coordinate]) -> Result<Vec<f64>, ResolutionError> {
        let locations = locations_param(chunk);
        let body = match self.transport.fetch(&self.config.endpoint, &locations) {
            Ok(body) => body,
            Err(e) => {
                warn!("batch {batch}: {e}, retrying in {:?}", self.config.retry_backoff);
                thread::sleep(self.config.retry_backoff);
                self.transport
                    .fetch(&self.config.endpoint, &locations)
                    .map_err(|source| ResolutionError::Request { batch, source })?
            }
        };

        let response: LookupResponse = serde_json::from_str(&body)
            .map_err(|source| ResolutionError::Json { batch, source })?;
        let elevations = response
            .results
            .ok_or(ResolutionError::MissingResults { batch })?
            .into_iter()
            .map(|result| result.elevation)
            .collect::<Option<Vec<f64>>>()
            .ok_or(ResolutionError::MissingResults { batch })?;

        if elevations.len() != chunk.len() {
            return Err(ResolutionError::CountMismatch {
                expected: chunk.len(),
                got: elevations.len(),
            });
        }
        Ok(elevations)
    }
}

/// Formats `coords` as `lat,lon|lat,lon|...`.
pub fn locations_param(coords: &[Coordinate]) -> String {
    coords
        .iter()
        .map(|coord| format!("{},{}", coord.lat(), coord.lon()))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
pub(crate) mod fake {
    use super::Transport;
    use crate::error::FetchError;
    use std::{cell::RefCell, collections::VecDeque};

    /// Answers requests with elevations derived from each location
    /// (`round(lat * 1000)`), except for scripted failures.
    #[derive(Default)]
    pub struct FakeTransport {
        pub failures: RefCell<VecDeque<Option<FetchError>>>,
        pub requests: RefCell<Vec<String>>,
        pub body_override: Option<String>,
    }

    impl FakeTransport {
        /// Fails the first requests with `errs`, in order.
        pub fn failing(errs: Vec<FetchError>) -> Self {
            Self {
                failures: RefCell::new(errs.into_iter().map(Some).collect()),
                ..Default::default()
            }
        }

        pub fn with_body(body: &str) -> Self {
            Self {
                body_override: Some(body.to_string()),
                ..Default::default()
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for FakeTransport {
        fn fetch(&self, _endpoint: &str, locations: &str) -> Result<String, FetchError> {
            self.requests.borrow_mut().push(locations.to_string());
            if let Some(Some(e)) = self.failures.borrow_mut().pop_front() {
                return Err(e);
            }
            if let Some(body) = &self.body_override {
                return Ok(body.clone());
            }
            let results: Vec<String> = locations
                .split('|')
                .map(|pair| {
                    let (lat, lon) = pair.split_once(',').unwrap_or(("0", "0"));
                    let lat: f64 = lat.parse().unwrap_or_default();
                    let lon: f64 = lon.parse().unwrap_or_default();
                    format!(
                        r#"{{"dataset":"srtm90m","elevation":{},"location":{{"lat":{lat},"lng":{lon}}}}}"#,
                        (lat * 1000.0).round()
                    )
                })
                .collect();
            Ok(format!(
                r#"{{"results":[{}],"status":"OK"}}"#,
                results.join(",")
            ))
        }
    }
}
