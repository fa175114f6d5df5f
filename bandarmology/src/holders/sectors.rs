use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::errors::{BandarmologyError, Result};

/// Sector name -> stock codes.
pub type SectorTable = BTreeMap<String, Vec<String>>;

const TOP_CAPS: &[(&str, &[&str])] = &[
    ("Financials", &["BBCA", "BBRI", "BMRI", "BBNI", "ARTO", "BRIS", "BBTN", "MEGA"]),
    (
        "Consumer Non-Cyclicals",
        &["ICBP", "INDF", "MYOR", "UNVR", "GGRM", "HMSP", "KLBF", "SIDO", "CPIN", "JPFA"],
    ),
    (
        "Basic Materials",
        &["MDKA", "ANTM", "INCO", "TINS", "BRMS", "MBMA", "INKP", "TKIM", "SMGR", "INTP"],
    ),
    ("Energy", &["ADRO", "PTBA", "ITMG", "PGAS", "AKRA", "MEDC", "BUMI", "HRUM", "INDY"]),
    ("Technology", &["GOTO", "BUKA", "EMTK", "DCII", "MTDL"]),
    ("Healthcare", &["MIKA", "HEAL", "SILO", "SAME"]),
    ("Infrastructures", &["TLKM", "ISAT", "EXCL", "JSMR", "TBIG", "TOWR"]),
    ("Properties & Real Estate", &["BSDE", "CTRA", "PWON", "SMRA", "ASRI", "PANI"]),
    ("Industrials", &["ASII", "UNTR", "HEXA"]),
    ("Transportation & Logistic", &["BIRD", "ASSA", "TMAS", "SMDR"]),
];

/// One tier of the sector map fallback chain.
#[async_trait]
pub trait SectorSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means "nothing here, try the next tier".
    async fn load(&self) -> Result<Option<SectorTable>>;
}

pub struct DiskSectorSource {
    path: PathBuf,
}

impl DiskSectorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DiskSectorSource { path: path.into() }
    }
}

#[async_trait]
impl SectorSource for DiskSectorSource {
    fn name(&self) -> &str {
        "disk"
    }

    async fn load(&self) -> Result<Option<SectorTable>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let table: SectorTable = serde_json::from_slice(&bytes)?;
        Ok(Some(table))
    }
}

/// Fetches the table as JSON and writes a copy to the disk tier's file.
pub struct RemoteSectorSource {
    client: Client,
    url: String,
    write_back: Option<PathBuf>,
}

impl RemoteSectorSource {
    pub fn new(client: Client, url: impl Into<String>, write_back: Option<PathBuf>) -> Self {
        RemoteSectorSource {
            client,
            url: url.into(),
            write_back,
        }
    }

    async fn persist(&self, table: &SectorTable) -> Result<()> {
        let Some(path) = &self.write_back else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(table)?).await?;
        Ok(())
    }
}

#[async_trait]
impl SectorSource for RemoteSectorSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn load(&self) -> Result<Option<SectorTable>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BandarmologyError::ApiError(format!("sector map error: {}", status)));
        }

        let table: SectorTable = response.json().await?;
        if let Err(e) = self.persist(&table).await {
            tracing::warn!(error = %e, "could not write sector map to disk");
        }
        Ok(Some(table))
    }
}

pub struct StaticSectorSource;

#[async_trait]
impl SectorSource for StaticSectorSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> Result<Option<SectorTable>> {
        let table = TOP_CAPS
            .iter()
            .map(|(sector, codes)| (sector.to_string(), codes.iter().map(|c| c.to_string()).collect()))
            .collect();
        Ok(Some(table))
    }
}

#[derive(Debug, Default)]
pub struct SectorIndex {
    by_code: HashMap<String, String>,
    origin: String,
}

impl SectorIndex {
    fn build(by_sector: SectorTable, origin: &str) -> Self {
        let mut by_code = HashMap::new();
        for (sector, codes) in &by_sector {
            for code in codes {
                by_code.entry(code.trim().to_uppercase()).or_insert_with(|| sector.clone());
            }
        }
        SectorIndex {
            by_code,
            origin: origin.to_string(),
        }
    }

    pub fn sector_of(&self, code: &str) -> Option<&str> {
        self.by_code.get(&code.trim().to_uppercase()).map(String::as_str)
    }

    /// Which tier populated the index.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn all_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.by_code.keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Stock-to-sector reference data, populated once from the first tier that answers.
#[derive(Clone)]
pub struct SectorMap {
    index: Arc<OnceCell<SectorIndex>>,
    sources: Arc<Vec<Box<dyn SectorSource>>>,
}

impl SectorMap {
    pub fn new(sources: Vec<Box<dyn SectorSource>>) -> Self {
        SectorMap {
            index: Arc::new(OnceCell::new()),
            sources: Arc::new(sources),
        }
    }

    /// Disk, then remote (when configured), then the built-in table.
    pub fn with_default_chain(client: Client, cache_file: PathBuf, remote_url: Option<String>) -> Self {
        let mut sources: Vec<Box<dyn SectorSource>> = vec![Box::new(DiskSectorSource::new(cache_file.clone()))];
        if let Some(url) = remote_url {
            sources.push(Box::new(RemoteSectorSource::new(client, url, Some(cache_file))));
        }
        sources.push(Box::new(StaticSectorSource));
        SectorMap::new(sources)
    }

    pub async fn get_or_init(&self) -> &SectorIndex {
        self.index
            .get_or_init(|| async {
                for source in self.sources.iter() {
                    match source.load().await {
                        Ok(Some(table)) if !table.is_empty() => {
                            let index = SectorIndex::build(table, source.name());
                            tracing::info!(source = source.name(), codes = index.by_code.len(), "sector map loaded");
                            return index;
                        }
                        Ok(_) => tracing::debug!(source = source.name(), "sector source empty"),
                        Err(e) => tracing::warn!(source = source.name(), error = %e, "sector source failed"),
                    }
                }
                tracing::warn!("no sector source answered, using empty sector map");
                SectorIndex::default()
            })
            .await
    }

    pub async fn sector_of(&self, code: &str) -> Option<String> {
        self.get_or_init().await.sector_of(code).map(str::to_string)
    }
}
