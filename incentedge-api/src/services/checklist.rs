//! Default task checklist generation.
//!
//! When a workflow starts (draft -> in-progress) the application gets a
//! starter checklist derived from the program type. The first three entries
//! are the required ones: urgent/high priority in the gating categories.

use crate::types::CreateTaskRequest;
use incentedge_core::{Program, ProgramType, TaskCategory, TaskPriority};

fn task(title: &str, category: TaskCategory, priority: TaskPriority) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: None,
        category,
        priority,
        assignee: None,
        due_date: None,
    }
}

/// Build the default checklist for an application to the given program.
pub fn default_tasks(program: &Program) -> Vec<CreateTaskRequest> {
    let mut tasks = vec![
        task(
            "Gather project documentation",
            TaskCategory::Documentation,
            TaskPriority::High,
        ),
        task(
            "Confirm eligibility requirements",
            TaskCategory::Eligibility,
            TaskPriority::Urgent,
        ),
        task(
            "Prepare submission package",
            TaskCategory::Submission,
            TaskPriority::High,
        ),
    ];

    match program.program_type {
        ProgramType::TaxCredit => {
            tasks.push(task(
                "Collect cost basis records",
                TaskCategory::Financial,
                TaskPriority::Medium,
            ));
        }
        ProgramType::Grant => {
            tasks.push(task(
                "Draft project narrative",
                TaskCategory::General,
                TaskPriority::Medium,
            ));
        }
        ProgramType::Loan => {
            tasks.push(task(
                "Assemble financial statements",
                TaskCategory::Financial,
                TaskPriority::Medium,
            ));
        }
        ProgramType::Rebate => {
            tasks.push(task(
                "Document equipment specifications",
                TaskCategory::Documentation,
                TaskPriority::Medium,
            ));
        }
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use incentedge_core::{new_entity_id, tasks::is_required_task, Task, TaskStatus};

    fn sample_program(program_type: ProgramType) -> Program {
        let now = Utc::now();
        Program {
            id: new_entity_id(),
            name: "Clean Energy Fund".to_string(),
            provider: "NYSERDA".to_string(),
            program_type,
            funding_amount: Some("Up to $5M".to_string()),
            deadline: None,
            default_window_days: None,
            eligibility: None,
            source_url: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn materialize(req: &CreateTaskRequest) -> Task {
        let now = Utc::now();
        Task {
            id: new_entity_id(),
            application_id: new_entity_id(),
            org_id: new_entity_id(),
            title: req.title.clone(),
            description: req.description.clone(),
            category: req.category,
            priority: req.priority,
            status: TaskStatus::Pending,
            assignee: req.assignee,
            due_date: req.due_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_every_program_type_gets_four_tasks() {
        for pt in [
            ProgramType::TaxCredit,
            ProgramType::Grant,
            ProgramType::Loan,
            ProgramType::Rebate,
        ] {
            assert_eq!(default_tasks(&sample_program(pt)).len(), 4);
        }
    }

    #[test]
    fn test_default_checklist_has_exactly_three_required_tasks() {
        let tasks = default_tasks(&sample_program(ProgramType::Grant));
        let required = tasks
            .iter()
            .map(materialize)
            .filter(is_required_task)
            .count();
        assert_eq!(required, 3);
    }
}
