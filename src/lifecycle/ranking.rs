//! Dense ordering of active automatic workflows.
//!
//! Every active automatic workflow holds exactly one rank and ranks run
//! contiguously from 1. The manager loads the ranked workflows inside a
//! transaction, applies one list operation here, and writes back the rows
//! whose rank changed.

use super::types::{SortDirection, Workflow, WorkflowId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortRanking {
    order: Vec<WorkflowId>,
}

impl SortRanking {
    /// Build the ranking from active automatic workflows.
    ///
    /// Workflows are ordered by their stored sortindex (missing ranks last,
    /// ties broken by id), so a snapshot with gaps comes back dense.
    pub fn from_workflows(workflows: &[Workflow]) -> Self {
        let mut ranked: Vec<(Option<u32>, WorkflowId)> = workflows
            .iter()
            .filter_map(|w| w.id.map(|id| (w.sortindex, id)))
            .collect();
        ranked.sort_by_key(|(sortindex, id)| (sortindex.is_none(), *sortindex, *id));

        Self {
            order: ranked.into_iter().map(|(_, id)| id).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 1-based rank of a workflow
    pub fn sortindex_of(&self, id: WorkflowId) -> Option<u32> {
        self.order
            .iter()
            .position(|candidate| *candidate == id)
            .map(|pos| pos as u32 + 1)
    }

    /// Put a workflow at the end of the ranking and return its rank
    pub fn append(&mut self, id: WorkflowId) -> u32 {
        if let Some(existing) = self.sortindex_of(id) {
            return existing;
        }
        self.order.push(id);
        self.order.len() as u32
    }

    /// Drop a workflow; everything ranked below it moves up one place
    pub fn remove(&mut self, id: WorkflowId) -> bool {
        match self.order.iter().position(|candidate| *candidate == id) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Swap a workflow with its neighbour in the given direction.
    ///
    /// Returns false when the workflow is unranked or already at that edge.
    pub fn move_entry(&mut self, id: WorkflowId, direction: SortDirection) -> bool {
        let Some(pos) = self.order.iter().position(|candidate| *candidate == id) else {
            return false;
        };
        let other = match direction {
            SortDirection::Up if pos > 0 => pos - 1,
            SortDirection::Down if pos + 1 < self.order.len() => pos + 1,
            _ => return false,
        };
        self.order.swap(pos, other);
        true
    }

    /// Workflow ids paired with their rank, best first
    pub fn assignments(&self) -> impl Iterator<Item = (WorkflowId, u32)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos as u32 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(id: i64, sortindex: Option<u32>) -> Workflow {
        let mut workflow = Workflow::new(format!("wf{id}"));
        workflow.id = Some(WorkflowId(id));
        workflow.active = true;
        workflow.manual = Some(false);
        workflow.sortindex = sortindex;
        workflow
    }

    #[test]
    fn test_from_workflows_orders_by_sortindex() {
        let ranking = SortRanking::from_workflows(&[
            ranked(1, Some(3)),
            ranked(2, Some(1)),
            ranked(3, Some(2)),
        ]);
        assert_eq!(ranking.sortindex_of(WorkflowId(2)), Some(1));
        assert_eq!(ranking.sortindex_of(WorkflowId(3)), Some(2));
        assert_eq!(ranking.sortindex_of(WorkflowId(1)), Some(3));
    }

    #[test]
    fn test_from_workflows_closes_gaps() {
        let ranking = SortRanking::from_workflows(&[
            ranked(1, Some(5)),
            ranked(2, None),
            ranked(3, Some(2)),
        ]);
        let assignments: Vec<_> = ranking.assignments().collect();
        assert_eq!(
            assignments,
            vec![(WorkflowId(3), 1), (WorkflowId(1), 2), (WorkflowId(2), 3)]
        );
    }

    #[test]
    fn test_append_goes_to_end() {
        let mut ranking = SortRanking::from_workflows(&[ranked(1, Some(1))]);
        assert_eq!(ranking.append(WorkflowId(7)), 2);
        assert_eq!(ranking.append(WorkflowId(7)), 2);
        assert_eq!(ranking.len(), 2);
    }

    #[test]
    fn test_remove_compacts() {
        let mut ranking = SortRanking::from_workflows(&[
            ranked(1, Some(1)),
            ranked(2, Some(2)),
            ranked(3, Some(3)),
        ]);
        assert!(ranking.remove(WorkflowId(2)));
        assert!(!ranking.remove(WorkflowId(2)));
        assert_eq!(ranking.sortindex_of(WorkflowId(3)), Some(2));
    }

    #[test]
    fn test_move_entry_respects_edges() {
        let mut ranking = SortRanking::from_workflows(&[ranked(1, Some(1)), ranked(2, Some(2))]);
        assert!(!ranking.move_entry(WorkflowId(1), SortDirection::Up));
        assert!(!ranking.move_entry(WorkflowId(2), SortDirection::Down));
        assert!(!ranking.move_entry(WorkflowId(9), SortDirection::Up));

        assert!(ranking.move_entry(WorkflowId(2), SortDirection::Up));
        assert_eq!(ranking.sortindex_of(WorkflowId(2)), Some(1));
        assert!(ranking.move_entry(WorkflowId(2), SortDirection::Down));
        assert_eq!(ranking.sortindex_of(WorkflowId(2)), Some(2));
    }
}
