use std::collections::BTreeMap;

use super::{AnyIngestor, IngestReport, IngestionContext, Ingestor};
use crate::{
    codec::{BlockType, ParsedBlock},
    error::NetsnapError,
    store::NetworkStore,
};

/// Applies ingestors to a device's blocks in dependency order.
#[derive(Debug, Clone)]
pub struct IngestionOrchestrator {
    ingestors: Vec<AnyIngestor>,
}

impl Default for IngestionOrchestrator {
    fn default() -> Self {
        IngestionOrchestrator::builtin()
    }
}

impl IngestionOrchestrator {
    pub fn builtin() -> Self {
        let mut ingestors: Vec<AnyIngestor> = BlockType::all()
            .iter()
            .map(AnyIngestor::for_block)
            .collect();
        ingestors.sort_by_key(|i| (i.priority(), i.block_type()));
        IngestionOrchestrator { ingestors }
    }

    /// Block types in the order they are ingested.
    pub fn order(&self) -> Vec<BlockType> {
        self.ingestors.iter().map(|i| i.block_type()).collect()
    }

    /// Ingest every block. Types are visited in ascending priority; blocks of one type keep their
    /// arrival order. Returns one report per block, in visiting order.
    pub async fn ingest<S: NetworkStore>(
        &self,
        blocks: &[ParsedBlock],
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<Vec<IngestReport>, NetsnapError> {
        let mut grouped: BTreeMap<BlockType, Vec<&ParsedBlock>> = BTreeMap::new();
        for block in blocks {
            grouped.entry(block.block_type).or_default().push(block);
        }

        let mut reports = Vec::with_capacity(blocks.len());
        for ingestor in self.ingestors.iter() {
            let Some(group) = grouped.remove(&ingestor.block_type()) else {
                continue;
            };
            for block in group {
                let report = ingestor.ingest(block, ctx, store).await?;
                tracing::debug!(
                    "[IngestionOrchestrator] {} on {}: {} upserted, {} skipped, {} errors",
                    report.block_type,
                    ctx.device().hostname,
                    report.upserted,
                    report.skipped,
                    report.errors.len()
                );
                reports.push(report);
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_then_interfaces_then_facts() {
        let order = IngestionOrchestrator::builtin().order();
        assert_eq!(order.len(), 12);
        assert_eq!(&order[..2], &[BlockType::Sysname, BlockType::Version]);
        assert_eq!(
            &order[2..4],
            &[BlockType::InterfaceBrief, BlockType::IpInterfaceBrief]
        );
        assert_eq!(order[4], BlockType::Device);
        assert_eq!(order[11], BlockType::Alarm);
        let arp = order.iter().position(|t| *t == BlockType::Arp).unwrap();
        let route = order.iter().position(|t| *t == BlockType::RoutingTable).unwrap();
        assert!(arp < route);
    }
}
