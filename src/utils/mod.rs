//! Dataset readers, result writers and small helpers

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::graph::Graph;
use crate::{Result, SeedGrowError};

/// Datasets with a row in the seed and community-index files, in row order
pub const DATASETS: [&str; 6] = ["amazon", "dblp", "lj", "youtube", "twitter", "facebook"];

/// Save object to JSON file
pub fn save_json<T: Serialize, P: AsRef<Path>>(obj: &T, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(obj)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Load object from JSON file
pub fn load_json<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let obj = serde_json::from_str(&contents)?;
    Ok(obj)
}

fn parse_ids(line: &str, path: &Path, lineno: usize) -> Result<Vec<usize>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<usize>().map_err(|e| {
                SeedGrowError::Parse(format!("{}:{}: '{}': {}", path.display(), lineno + 1, tok, e))
            })
        })
        .collect()
}

/// Read whitespace-separated integer rows, skipping blank and `#` lines
fn read_rows(path: &Path) -> Result<Vec<Vec<usize>>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        rows.push(parse_ids(line, path, lineno)?);
    }
    Ok(rows)
}

/// Read an edge list with one `u v` pair per line
pub fn read_edge_list<P: AsRef<Path>>(path: P) -> Result<Vec<(usize, usize)>> {
    let path = path.as_ref();
    read_rows(path)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [u, v, ..] => Ok((*u, *v)),
            _ => Err(SeedGrowError::Parse(format!(
                "{}: edge {} has fewer than two endpoints",
                path.display(),
                i + 1
            ))),
        })
        .collect()
}

/// Read a community list with one community per line
pub fn read_communities<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<usize>>> {
    read_rows(path.as_ref())
}

/// Row of `dataset` in the seed and community-index files
pub fn dataset_row_index(dataset: &str) -> Result<usize> {
    DATASETS
        .iter()
        .position(|&d| d == dataset)
        .ok_or_else(|| SeedGrowError::Config(format!("unknown dataset '{}'", dataset)))
}

/// The row of a per-dataset file (seed nodes or community indices) for `dataset`
pub fn read_dataset_row<P: AsRef<Path>>(path: P, dataset: &str) -> Result<Vec<usize>> {
    let path = path.as_ref();
    let index = dataset_row_index(dataset)?;
    read_rows(path)?.into_iter().nth(index).ok_or_else(|| {
        SeedGrowError::Parse(format!("{} has no row {} for dataset '{}'", path.display(), index, dataset))
    })
}

/// Locations of one dataset's graph and community files under `root`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetFiles {
    /// Edge list
    pub edges: PathBuf,
    /// Community list
    pub communities: PathBuf,
    /// Query seeds, one row per dataset
    pub seeds: PathBuf,
    /// Reference community indices, one row per dataset
    pub com_indices: PathBuf,
}

impl DatasetFiles {
    /// Standard layout: `{root}/{name}/{name}-1.90.ungraph.txt` and friends
    pub fn new<P: AsRef<Path>>(root: P, dataset: &str) -> Self {
        let root = root.as_ref();
        let dir = root.join(dataset);
        DatasetFiles {
            edges: dir.join(format!("{}-1.90.ungraph.txt", dataset)),
            communities: dir.join(format!("{}-1.90.cmty.txt", dataset)),
            seeds: root.join("seed12"),
            com_indices: root.join("com_index12"),
        }
    }

    /// Load the graph and its community list
    pub fn load(&self) -> Result<(Graph, Vec<Vec<usize>>)> {
        let graph = Graph::from_edges(&read_edge_list(&self.edges)?)?;
        let communities = read_communities(&self.communities)?;
        Ok((graph, communities))
    }

    /// Query seeds and their reference community indices, paired by position
    pub fn queries(&self, dataset: &str) -> Result<Vec<(usize, usize)>> {
        let seeds = read_dataset_row(&self.seeds, dataset)?;
        let indices = read_dataset_row(&self.com_indices, dataset)?;
        if seeds.len() != indices.len() {
            return Err(SeedGrowError::Parse(format!(
                "{} seeds but {} community indices for dataset '{}'",
                seeds.len(),
                indices.len(),
                dataset
            )));
        }
        Ok(seeds.into_iter().zip(indices).collect())
    }
}

/// Append-only result files of one dataset
///
/// Each recorded run appends `{seed} ` to `{dataset}_seed.txt`, `{index} ` to
/// `{dataset}_com_index.txt` and one line of members to `{dataset}_pred_com.txt`.
#[derive(Clone, Debug)]
pub struct ResultWriter {
    dir: PathBuf,
    dataset: String,
}

impl ResultWriter {
    /// Writer into `dir`, created on first use
    pub fn new<P: AsRef<Path>>(dir: P, dataset: &str) -> Self {
        ResultWriter {
            dir: dir.as_ref().to_path_buf(),
            dataset: dataset.to_string(),
        }
    }

    /// Path of one result file, e.g. `suffix = "seed"`
    pub fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", self.dataset, suffix))
    }

    fn append(&self, suffix: &str, text: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(self.path(suffix))?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Record one detection
    pub fn write(&self, seed: usize, com_index: usize, community: &[usize]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.append("seed", &format!("{} ", seed))?;
        self.append("com_index", &format!("{} ", com_index))?;
        let mut line: String = community.iter().map(|v| format!("{} ", v)).collect();
        line.push('\n');
        self.append("pred_com", &line)
    }
}

/// Timing utilities
pub mod timing {
    use std::time::{Duration, Instant};
    use tracing::info;

    /// Wall-clock timer that logs on drop
    #[derive(Debug)]
    pub struct Timer {
        start: Instant,
        name: String,
    }

    impl Timer {
        /// Start new timer
        pub fn new(name: &str) -> Self {
            Timer {
                start: Instant::now(),
                name: name.to_string(),
            }
        }

        /// Get elapsed time
        pub fn elapsed(&self) -> Duration {
            self.start.elapsed()
        }

        /// Log elapsed time
        pub fn log(&self) {
            info!(timer = %self.name, elapsed_s = self.elapsed().as_secs_f32(), "elapsed");
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            self.log();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DetectorConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seedgrow-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_json_serialization() {
        let dir = scratch_dir("json");
        let path = dir.join("config.json");
        let config = DetectorConfig::quick();

        save_json(&config, &path).unwrap();
        let loaded: DetectorConfig = load_json(&path).unwrap();
        assert_eq!(config, loaded);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dataset_readers() {
        let dir = scratch_dir("dataset");
        let files = DatasetFiles::new(&dir, "dblp");
        fs::create_dir_all(dir.join("dblp")).unwrap();
        fs::write(&files.edges, "# comment\n0\t1\n1 2\n\n2 3\n").unwrap();
        fs::write(&files.communities, "0 1\n1 2 3\n").unwrap();
        fs::write(&files.seeds, "5 6\n1 2\n").unwrap();
        fs::write(&files.com_indices, "0 0\n1 0\n").unwrap();

        let (graph, communities) = files.load().unwrap();
        assert_eq!(graph.n_nodes(), 4);
        assert_eq!(graph.n_edges(), 3);
        assert_eq!(communities, vec![vec![0, 1], vec![1, 2, 3]]);
        assert_eq!(files.queries("dblp").unwrap(), vec![(1, 1), (2, 0)]);
        assert!(files.queries("youtube").is_err());
        assert!(files.queries("cora").is_err());

        fs::write(&files.edges, "0 x\n").unwrap();
        assert!(matches!(read_edge_list(&files.edges), Err(SeedGrowError::Parse(_))));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_result_writer_appends() {
        let dir = scratch_dir("results");
        let writer = ResultWriter::new(dir.join("res"), "amazon");
        writer.write(7, 3, &[7, 8, 9]).unwrap();
        writer.write(11, 4, &[11]).unwrap();

        assert_eq!(fs::read_to_string(writer.path("seed")).unwrap(), "7 11 ");
        assert_eq!(fs::read_to_string(writer.path("com_index")).unwrap(), "3 4 ");
        assert_eq!(fs::read_to_string(writer.path("pred_com")).unwrap(), "7 8 9 \n11 \n");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dataset_rows() {
        assert_eq!(dataset_row_index("amazon").unwrap(), 0);
        assert_eq!(dataset_row_index("facebook").unwrap(), 5);
        assert!(dataset_row_index("").is_err());
    }
}
