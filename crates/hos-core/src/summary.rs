//! Summary construction

use hos_api::{BudgetView, DutyStatus, EligibilityResult, HosState, Summary};
use hos_util::{add_duration, decimal_hours, format_hours_minutes};
use std::time::Duration;

use crate::evaluator::{self, Budgets};
use crate::Projection;

/// Build the dispatcher-facing summary for a projected ledger
pub fn build_summary(state: &HosState, projection: &Projection) -> Summary {
    let budgets = Budgets::from_projection(projection);
    let fresh = evaluator::evaluate(projection, projection.as_of);
    let violations = evaluator::merge_violations(&state.open_violations, fresh);

    let break_due_in = if budgets.break_required {
        "Break required now".to_string()
    } else {
        format_hours_minutes(budgets.break_remaining)
    };
    let next_break_due = (projection.status == DutyStatus::Driving && !budgets.break_required)
        .then(|| add_duration(projection.as_of, budgets.break_remaining));

    // Closed entries from an earlier day are no longer "today"
    let today_log = if projection.crossed_midnight {
        Vec::new()
    } else {
        state.today_log.clone()
    };

    Summary {
        driver_id: state.driver_id.clone(),
        status: projection.status,
        status_started_at: projection.started_at,
        as_of: projection.as_of,

        driving: budget_view(budgets.driving_used, crate::rules::DRIVING_LIMIT),
        on_duty: budget_view(budgets.on_duty_used, crate::rules::ON_DUTY_WINDOW),
        cycle: budget_view(budgets.cycle_used, budgets.cycle_limit),
        cycle_days: projection.cycle_days,

        driving_hours_today: decimal_hours(projection.driving_today),
        on_duty_hours_today: decimal_hours(projection.on_duty_today),

        break_required: budgets.break_required,
        break_due_in,
        next_break_due,

        last_break_at: state.last_break_at,
        last_off_duty_at: state.last_off_duty_at,
        last_restart_at: state.last_restart_at,

        can_drive: evaluator::can_drive(&budgets, &violations),
        can_accept_load: evaluator::can_accept_load(&budgets),
        violations,
        today_log,
    }
}

/// Answer the load-acceptance gate for a projected ledger
pub fn build_eligibility(state: &HosState, projection: &Projection) -> EligibilityResult {
    let budgets = Budgets::from_projection(projection);
    let allowed = evaluator::can_accept_load(&budgets);

    EligibilityResult {
        allowed,
        reason: if allowed {
            None
        } else {
            evaluator::ineligibility_reason(&budgets)
        },
        summary: build_summary(state, projection),
    }
}

fn budget_view(used: Duration, limit: Duration) -> BudgetView {
    let remaining = limit.saturating_sub(used);
    BudgetView {
        used_hours: decimal_hours(used),
        limit_hours: limit.as_secs_f64() / 3600.0,
        remaining: format_hours_minutes(remaining),
        remaining_hours: decimal_hours(remaining),
    }
}
