//! Re-select training communities that resemble the current prediction

use tracing::{info, warn};

use crate::core::CurriculumConfig;
use crate::graph::{community_graph, CommunityGraph, Graph};
use crate::{Result, SeedGrowError};

use super::kernel::{GraphKernel, ShortestPathKernel};

/// Kernel similarity plus clustering over known communities
pub struct CurriculumSelector {
    kernel: Box<dyn GraphKernel>,
    config: CurriculumConfig,
}

impl CurriculumSelector {
    /// Selector with the default shortest-path kernel
    pub fn new(config: CurriculumConfig) -> Self {
        Self::with_kernel(Box::new(ShortestPathKernel::new()), config)
    }

    /// Selector with a custom similarity oracle
    pub fn with_kernel(kernel: Box<dyn GraphKernel>, config: CurriculumConfig) -> Self {
        CurriculumSelector { kernel, config }
    }

    /// Configuration
    pub fn config(&self) -> &CurriculumConfig {
        &self.config
    }

    /// Known communities that fall in the same cluster as `partial`
    ///
    /// `partial` is clustered at index 0 together with every known community. When no
    /// known community shares its label, `previous` is returned unchanged.
    pub fn select(
        &self,
        graph: &Graph,
        partial: &[usize],
        known: &[Vec<usize>],
        previous: &[Vec<usize>],
    ) -> Result<Vec<Vec<usize>>> {
        let graphs: Vec<CommunityGraph> = std::iter::once(partial)
            .chain(known.iter().map(Vec::as_slice))
            .map(|members| community_graph(graph, members))
            .collect();

        let similarity = self.kernel.similarity(&graphs)?;
        if similarity.dim() != (graphs.len(), graphs.len()) {
            return Err(SeedGrowError::Kernel(format!(
                "kernel returned a {:?} matrix for {} graphs",
                similarity.dim(),
                graphs.len()
            )));
        }

        let labels = self
            .config
            .backend
            .cluster(&similarity, self.config.n_clusters, self.config.seed)?;
        let target = labels
            .first()
            .copied()
            .ok_or_else(|| SeedGrowError::Clustering("no labels returned".to_string()))?;
        if labels.len() != graphs.len() {
            return Err(SeedGrowError::Clustering(format!(
                "{} labels for {} communities",
                labels.len(),
                graphs.len()
            )));
        }

        let selected: Vec<Vec<usize>> = known
            .iter()
            .zip(&labels[1..])
            .filter(|&(_, &label)| label == target)
            .map(|(community, _)| community.clone())
            .collect();

        if selected.is_empty() {
            warn!(
                backend = %self.config.backend,
                known = known.len(),
                "no known community shares the prediction's cluster, keeping previous training set"
            );
            return Ok(previous.to_vec());
        }

        info!(
            backend = %self.config.backend,
            selected = selected.len(),
            known = known.len(),
            "re-selected training communities"
        );
        Ok(selected)
    }
}

impl std::fmt::Debug for CurriculumSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurriculumSelector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
