use chrono::{NaiveDate, Utc};
use planwise::ai::fallback::*;
use planwise::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

fn task(title: &str, priority: Priority, due: Option<NaiveDate>) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        goal_id: None,
        title: title.to_string(),
        description: None,
        priority,
        status: TaskStatus::Todo,
        due_date: due,
        created_at: now,
        updated_at: now,
    }
}

speculate! {
    before {
        let today = day(5, 12);
    }

    describe "plan fallback" {
        it "turns each line into a goal with three template tasks" {
            let result = generate_plan_fallback("Run 5k\nRead books", today);

            assert!(result.success);
            assert!(result.fallback_used);
            let plan = result.data.expect("plan data");
            let titles: Vec<_> = plan.goals.iter().map(|g| g.title.as_str()).collect();
            assert_eq!(titles, ["Run 5k", "Read books"]);
            assert!(plan.goals.iter().all(|g| g.tasks.len() == 3));
        }

        it "is deterministic" {
            let first = generate_plan_fallback("Run 5k\nRead books", today);
            let second = generate_plan_fallback("Run 5k\nRead books", today);
            assert_eq!(first, second);
        }

        it "orders template priorities high to low and spaces goals by week" {
            let plan = generate_plan_fallback("- Run 5k\n- Read books", today).data.unwrap();

            let priorities: Vec<_> = plan.goals[0].tasks.iter().map(|t| t.priority).collect();
            assert_eq!(priorities, [Priority::High, Priority::Medium, Priority::Low]);
            assert_eq!(plan.goals[0].tasks[0].due_date, Some(day(5, 14)));
            assert_eq!(plan.goals[1].tasks[0].due_date, Some(day(5, 21)));
        }

        it "splits a single line into sentences and caps the goal count" {
            let plan = generate_plan_fallback("One. Two. Three. Four. Five. Six.", today).data.unwrap();
            assert_eq!(plan.goals.len(), MAX_FALLBACK_GOALS);
            assert_eq!(plan.goals[0].title, "One");
        }

        it "keeps decimals inside a single sentence" {
            let plan = generate_plan_fallback("Lose 2.5 kg this month", today).data.unwrap();
            let titles: Vec<_> = plan.goals.iter().map(|g| g.title.as_str()).collect();
            assert_eq!(titles, ["Lose 2.5 kg this month"]);
        }

        it "does not read a leading decimal as a list number" {
            let plan = generate_plan_fallback("3.5 km run every week\nRead books", today).data.unwrap();
            let titles: Vec<_> = plan.goals.iter().map(|g| g.title.as_str()).collect();
            assert_eq!(titles, ["3.5 km run every week", "Read books"]);
        }

        it "still strips numbered markers" {
            let plan = generate_plan_fallback("1. Run 5k\n2) Read books", today).data.unwrap();
            let titles: Vec<_> = plan.goals.iter().map(|g| g.title.as_str()).collect();
            assert_eq!(titles, ["Run 5k", "Read books"]);
        }

        it "splits sentences that end a line or are followed by a space" {
            let plan = generate_plan_fallback("Save $1.50 a day! Walk 7.5k daily. Sleep more", today).data.unwrap();
            let titles: Vec<_> = plan.goals.iter().map(|g| g.title.as_str()).collect();
            assert_eq!(titles, ["Save $1.50 a day", "Walk 7.5k daily", "Sleep more"]);
        }

        it "uses a generic goal for blank input" {
            let plan = generate_plan_fallback("   ", today).data.unwrap();
            assert_eq!(plan.goals.len(), 1);
            assert_eq!(plan.goals[0].tasks.len(), 3);
        }

        it "reports dates out of range instead of panicking" {
            let result = generate_plan_fallback("Run\nRead", NaiveDate::MAX);
            assert!(!result.success);
            assert!(result.data.is_none());
            assert!(result.message.contains("out of range"));
        }
    }

    describe "briefing fallback" {
        it "emphasises high-priority work" {
            let tasks = vec![
                task("Pay rent", Priority::High, Some(today)),
                task("Tidy desk", Priority::Low, None),
            ];

            let briefing = generate_briefing_fallback(&tasks, today).data.unwrap();

            assert!(briefing.summary.starts_with("You have 2 open task(s)"));
            assert!(briefing.summary.contains("Focus on 1 high-priority task(s) first."));
            assert_eq!(briefing.todays_tasks.len(), 2);
            assert!(briefing.upcoming_deadlines.is_empty());
            assert!(briefing.habit_reminders.is_empty());
        }

        it "falls back to medium-priority phrasing" {
            let tasks = vec![task("Email landlord", Priority::Medium, Some(today))];

            let briefing = generate_briefing_fallback(&tasks, today).data.unwrap();

            assert!(briefing.summary.contains("1 medium-priority task(s)"));
        }

        it "handles an empty day" {
            let briefing = generate_briefing_fallback(&[], today).data.unwrap();
            assert!(briefing.summary.contains("No high-priority tasks"));
        }
    }

    describe "reschedule fallback" {
        it "spreads the backlog one per day, most urgent first" {
            let backlog = vec![
                task("Low, oldest", Priority::Low, Some(day(5, 1))),
                task("High, newer", Priority::High, Some(day(5, 10))),
                task("High, older", Priority::High, Some(day(5, 3))),
                task("High, undated", Priority::High, None),
            ];

            let reschedule = generate_reschedule_fallback(&backlog, today).data.unwrap();

            let plan: Vec<_> = reschedule
                .affected_tasks
                .iter()
                .map(|t| (t.title.as_deref().unwrap(), t.suggested_due_date.unwrap()))
                .collect();
            assert_eq!(plan, [
                ("High, older", day(5, 13)),
                ("High, newer", day(5, 14)),
                ("High, undated", day(5, 15)),
                ("Low, oldest", day(5, 16)),
            ]);
            assert!(reschedule.affected_events.is_empty());
        }

        it "proposes nothing for an empty backlog" {
            let reschedule = generate_reschedule_fallback(&[], today).data.unwrap();
            assert!(reschedule.affected_tasks.is_empty());
        }
    }
}
