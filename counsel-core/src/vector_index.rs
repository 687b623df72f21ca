//! Exhaustive (flat) L2 nearest-neighbour index and the two quality-tier
//! example pools built on top of it.
//!
//! Indexes are built offline by `counsel-ingest`, persisted as MessagePack,
//! and loaded read-only at startup. Each tier pairs an index with a JSON array
//! of the source texts, one per stored vector, in insertion order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HIGH_INDEX_FILE: &str = "high_quality.index";
pub const LOW_INDEX_FILE: &str = "low_quality.index";
pub const HIGH_TEXTS_FILE: &str = "high_texts.json";
pub const LOW_TEXTS_FILE: &str = "low_texts.json";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to encode index: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode index: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Invalid texts file: {0}")]
    Texts(#[from] serde_json::Error),

    #[error("Dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{tier} index has dimension {index} but embeddings have {embedding}")]
    TierDimension {
        tier: &'static str,
        index: usize,
        embedding: usize,
    },

    #[error("Corrupt index: {len} values is not a multiple of dimension {dimensions}")]
    Corrupt { len: usize, dimensions: usize },

    #[error("Index holds {vectors} vectors but texts file has {texts} entries")]
    TextCountMismatch { vectors: usize, texts: usize },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IndexError + '_ {
    move |source| IndexError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A search hit: position in insertion order plus squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Flat index storing vectors row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.vectors.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dimensions(vector)?;
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// The `k` nearest stored vectors by squared L2 distance, closest first.
    /// Equal distances keep insertion order. `k` is clamped to `len()`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimensions(query)?;
        if self.dimensions == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance: squared_l2(row, query),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let bytes = rmp_serde::to_vec_named(self)?;
        fs::write(path, bytes).map_err(io_err(path))
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = fs::read(path).map_err(io_err(path))?;
        let index: Self = rmp_serde::from_slice(&bytes)?;
        if index.dimensions == 0 || index.vectors.len() % index.dimensions != 0 {
            return Err(IndexError::Corrupt {
                len: index.vectors.len(),
                dimensions: index.dimensions,
            });
        }
        Ok(index)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// One quality tier: an index plus the raw text behind each vector.
#[derive(Debug, Clone)]
pub struct TieredIndex {
    index: FlatIndex,
    texts: Vec<String>,
}

impl TieredIndex {
    pub fn new(index: FlatIndex, texts: Vec<String>) -> Result<Self, IndexError> {
        if index.len() != texts.len() {
            return Err(IndexError::TextCountMismatch {
                vectors: index.len(),
                texts: texts.len(),
            });
        }
        Ok(Self { index, texts })
    }

    pub fn load(index_path: &Path, texts_path: &Path) -> Result<Self, IndexError> {
        let index = FlatIndex::load(index_path)?;
        let raw = fs::read_to_string(texts_path).map_err(io_err(texts_path))?;
        let texts: Vec<String> = serde_json::from_str(&raw)?;
        Self::new(index, texts)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// Texts of the `k` nearest neighbours, closest first.
    pub fn search_texts(&self, query: &[f32], k: usize) -> Result<Vec<String>, IndexError> {
        Ok(self
            .index
            .search(query, k)?
            .into_iter()
            .map(|n| self.texts[n.index].clone())
            .collect())
    }
}

/// Matched conversation texts from each tier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExampleMatches {
    pub high_quality: Vec<String>,
    pub low_quality: Vec<String>,
}

/// The two disjoint example pools, searched independently.
#[derive(Debug, Clone)]
pub struct ExampleStore {
    high: TieredIndex,
    low: TieredIndex,
}

impl ExampleStore {
    pub fn new(high: TieredIndex, low: TieredIndex) -> Self {
        Self { high, low }
    }

    /// Load both tiers from the standard file names inside `dir`.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let high = TieredIndex::load(&dir.join(HIGH_INDEX_FILE), &dir.join(HIGH_TEXTS_FILE))?;
        let low = TieredIndex::load(&dir.join(LOW_INDEX_FILE), &dir.join(LOW_TEXTS_FILE))?;

        tracing::info!(
            dir = %dir.display(),
            high = high.len(),
            low = low.len(),
            dimensions = high.dimensions(),
            "Loaded example indexes"
        );

        Ok(Self { high, low })
    }

    /// Fail unless both tiers were built with `embedding`-sized vectors.
    pub fn ensure_dimensions(&self, embedding: usize) -> Result<(), IndexError> {
        for (tier, index) in [("high quality", &self.high), ("low quality", &self.low)] {
            if index.dimensions() != embedding {
                return Err(IndexError::TierDimension {
                    tier,
                    index: index.dimensions(),
                    embedding,
                });
            }
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<ExampleMatches, IndexError> {
        Ok(ExampleMatches {
            high_quality: self.high.search_texts(query, k)?,
            low_quality: self.low.search_texts(query, k)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(rows: &[[f32; 2]]) -> FlatIndex {
        let mut index = FlatIndex::new(2);
        for row in rows {
            index.add(row).unwrap();
        }
        index
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = index_of(&[[5.0, 5.0], [0.0, 1.0], [2.0, 2.0]]);
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 8.0);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let index = index_of(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
    }

    #[test]
    fn test_k_is_clamped() {
        let index = index_of(&[[1.0, 1.0]]);
        assert_eq!(index.search(&[0.0, 0.0], 5).unwrap().len(), 1);
        assert!(FlatIndex::new(2).search(&[0.0, 0.0], 1).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(&[1.0]),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
        assert!(index.search(&[0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.index");
        let index = index_of(&[[1.0, 2.0], [3.0, 4.0]]);
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_tier_rejects_text_count_mismatch() {
        let index = index_of(&[[1.0, 2.0]]);
        let result = TieredIndex::new(index, vec!["a".into(), "b".into()]);
        assert!(matches!(
            result,
            Err(IndexError::TextCountMismatch {
                vectors: 1,
                texts: 2
            })
        ));
    }

    #[test]
    fn test_example_store_searches_tiers_independently() {
        let dir = tempfile::tempdir().unwrap();

        index_of(&[[0.0, 0.0], [10.0, 10.0]])
            .save(&dir.path().join(HIGH_INDEX_FILE))
            .unwrap();
        index_of(&[[9.0, 9.0], [1.0, 1.0], [4.0, 4.0]])
            .save(&dir.path().join(LOW_INDEX_FILE))
            .unwrap();
        fs::write(
            dir.path().join(HIGH_TEXTS_FILE),
            r#"["high near", "high far"]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(LOW_TEXTS_FILE),
            r#"["low far", "low near", "low mid"]"#,
        )
        .unwrap();

        let store = ExampleStore::load(dir.path()).unwrap();
        let matches = store.search(&[0.5, 0.5], 1).unwrap();
        assert_eq!(matches.high_quality, vec!["high near".to_string()]);
        assert_eq!(matches.low_quality, vec!["low near".to_string()]);
    }

    #[test]
    fn test_ensure_dimensions_checks_both_tiers() {
        let tier = |dims: usize| TieredIndex::new(FlatIndex::new(dims), Vec::new()).unwrap();

        assert!(ExampleStore::new(tier(2), tier(2)).ensure_dimensions(2).is_ok());

        let err = ExampleStore::new(tier(2), tier(2))
            .ensure_dimensions(1536)
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::TierDimension {
                tier: "high quality",
                index: 2,
                embedding: 1536
            }
        ));

        let err = ExampleStore::new(tier(2), tier(3))
            .ensure_dimensions(2)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "low quality index has dimension 3 but embeddings have 2"
        );
    }

    #[test]
    fn test_load_missing_dir_reports_path() {
        let err = ExampleStore::load(Path::new("/nonexistent/embeddings")).unwrap_err();
        assert!(err.to_string().contains("high_quality.index"), "got: {err}");
    }
}
