//! Role-scoped work queues over a set of patents.
//!
//! Queues are recomputed on demand and hold no state.

use crate::engine::eligibility::{drafting_tasks, filing_tasks, review_tasks, TaskDescriptor};
use crate::model::patent::Patent;

/// Pending drafting work for `actor_name` across `patents`.
pub fn drafting_queue<'a, I>(patents: I, actor_name: &str) -> Vec<TaskDescriptor>
where
    I: IntoIterator<Item = &'a Patent>,
{
    patents
        .into_iter()
        .filter(|patent| patent.is_open())
        .flat_map(|patent| drafting_tasks(patent, actor_name))
        .collect()
}

/// Pending filing work for `actor_name` across `patents`.
pub fn filing_queue<'a, I>(patents: I, actor_name: &str) -> Vec<TaskDescriptor>
where
    I: IntoIterator<Item = &'a Patent>,
{
    patents
        .into_iter()
        .filter(|patent| patent.is_open())
        .flat_map(|patent| filing_tasks(patent, actor_name))
        .collect()
}

/// Stages awaiting admin review across `patents`.
pub fn review_queue<'a, I>(patents: I) -> Vec<TaskDescriptor>
where
    I: IntoIterator<Item = &'a Patent>,
{
    patents
        .into_iter()
        .filter(|patent| patent.is_open())
        .flat_map(review_tasks)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::eligibility::TaskKind;
    use crate::model::patent::{Assignment, Slot};

    #[test]
    fn queues_span_patents_and_skip_closed_ones() {
        let mut first = Patent::new("A-1", 0);
        first.idf_received = true;
        first.ps.drafter = Some(Assignment::new("dana", None));
        first.ps.filer = Some(Assignment::new("farid", None));

        let mut second = first.clone();
        second.id = uuid::Uuid::new_v4();
        second.tracking_code = "A-2".to_string();
        second.ps.flags.drafting_done = true;
        second.ps.flags.drafting_under_review = true;

        let mut closed = first.clone();
        closed.id = uuid::Uuid::new_v4();
        closed.withdrawn = true;

        let patents = vec![first, second, closed];

        let drafting = drafting_queue(&patents, "dana");
        assert_eq!(drafting.len(), 1);
        assert_eq!(drafting[0].tracking_code, "A-1");

        let filing = filing_queue(&patents, "farid");
        assert_eq!(filing.len(), 1);
        assert_eq!(filing[0].tracking_code, "A-2");

        let review = review_queue(&patents);
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].slot, Slot::PS);
        assert_eq!(review[0].kind, TaskKind::Review(crate::model::patent::StageKind::Draft));
    }
}
