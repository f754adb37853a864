use std::collections::BTreeMap;

use crate::task::{Task, DEFAULT_CATEGORY};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup<'a> {
    pub category: &'a str,
    pub tasks: Vec<&'a Task>,
}

/// Groups in ascending label order; each group keeps collection order.
pub fn group_by_category(tasks: &[Task]) -> Vec<CategoryGroup<'_>> {
    let mut groups: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        let category = if task.category.is_empty() {
            DEFAULT_CATEGORY
        } else {
            task.category.as_str()
        };
        groups.entry(category).or_default().push(task);
    }
    groups
        .into_iter()
        .map(|(category, tasks)| CategoryGroup { category, tasks })
        .collect()
}

/// Tasks in the order they appear on screen (group by group).
pub fn display_order(tasks: &[Task]) -> Vec<&Task> {
    group_by_category(tasks)
        .into_iter()
        .flat_map(|g| g.tasks)
        .collect()
}

pub fn focus_pick(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|t| t.is_focus).or_else(|| tasks.first())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
}

pub fn progress(tasks: &[Task]) -> Progress {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.done).count();
    Progress {
        total,
        completed,
        percent: completion_ratio(completed, total),
    }
}

/// `round(100 * completed / total)` with halves rounded up; 0 when empty.
pub fn completion_ratio(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn task(id: &str, category: &str, created_at_ms: u64) -> Task {
        Task {
            id: id.to_owned(),
            title: id.to_owned(),
            done: false,
            category: category.to_owned(),
            is_focus: false,
            created_at_ms,
            importance: 2,
            estimated_minutes: 0,
            count: 0,
            comfort_message: String::new(),
            extra: Map::new(),
        }
    }

    #[test]
    fn groups_sorted_by_label_with_creation_order_inside() {
        let tasks = vec![task("b1", "B", 1), task("a1", "A", 2), task("a2", "A", 3)];
        let groups = group_by_category(&tasks);
        let labels: Vec<&str> = groups.iter().map(|g| g.category).collect();
        assert_eq!(labels, vec!["A", "B"]);
        let a: Vec<&str> = groups[0].tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(a, vec!["a1", "a2"]);

        let order: Vec<&str> = display_order(&tasks).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn focus_prefers_flagged_then_first_then_none() {
        let mut tasks = vec![task("x", "A", 1), task("y", "A", 2)];
        assert_eq!(focus_pick(&tasks).unwrap().id, "x");
        tasks[1].is_focus = true;
        assert_eq!(focus_pick(&tasks).unwrap().id, "y");
        assert!(focus_pick(&[]).is_none());
    }

    #[test]
    fn completion_ratio_rounds() {
        assert_eq!(completion_ratio(1, 4), 25);
        assert_eq!(completion_ratio(0, 0), 0);
        assert_eq!(completion_ratio(1, 3), 33);
        assert_eq!(completion_ratio(2, 3), 67);
        assert_eq!(completion_ratio(1, 8), 13);
        assert_eq!(completion_ratio(1, 1), 100);
    }

    #[test]
    fn progress_counts_done_tasks() {
        let mut tasks = vec![
            task("a", "A", 1),
            task("b", "A", 2),
            task("c", "A", 3),
            task("d", "A", 4),
        ];
        tasks[2].done = true;
        assert_eq!(
            progress(&tasks),
            Progress {
                total: 4,
                completed: 1,
                percent: 25
            }
        );
    }
}
