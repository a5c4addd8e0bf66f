//! Store round-trip specs

use crate::prelude::*;
use rota_core::{
    Audience, FrequencyConstraint, JsonMatcher, JsonPredicate, ScheduleDelay, ValueMatcher,
};
use similar_asserts::assert_eq;
use std::collections::BTreeMap;

fn detailed_schedule() -> Schedule {
    let trigger = Trigger::new(TriggerType::CustomEventValue, 25.0).with_predicate(
        JsonPredicate::Matcher(JsonMatcher {
            scope: vec!["properties".to_string()],
            key: Some("sku".to_string()),
            value: ValueMatcher::Equals {
                equals: json!("coffee"),
                ignore_case: true,
            },
        }),
    );
    let mut definition = ScheduleInfo::new(
        ScheduleData::InAppMessage(json!({"body": "thanks", "buttons": [1, 2]})),
        vec![trigger],
    );
    definition.id = Some("loyalty".to_string());
    definition.group = Some("rewards".to_string());
    definition.delay = Some(ScheduleDelay {
        seconds: 5,
        screens: vec!["checkout".to_string()],
        cancellation_triggers: vec![Trigger::new(TriggerType::Background, 1.0)],
        ..ScheduleDelay::default()
    });
    definition.end_ms = Some(i64::MAX);
    definition.priority = -3;
    definition.limit = 4;
    definition.interval = Duration::from_secs(90);
    definition.edit_grace_period = Duration::from_secs(86_400);
    definition.audience = Some(Audience {
        notification_opt_in: Some(true),
        language_tags: vec!["en".to_string(), "fr-CA".to_string()],
        ..Audience::default()
    });
    definition.frequency_constraint_ids = vec!["daily".to_string(), "weekly".to_string()];
    definition.metadata = BTreeMap::from([
        ("campaign".to_string(), json!("spring")),
        ("weight".to_string(), json!(1.5)),
    ]);
    definition.reporting_context = Some(json!({"source": "remote-data"}));

    Schedule::new(definition, &SequentialIdGen::default(), 1_000).unwrap()
}

#[test]
fn schedule_survives_store_reopen_field_for_field() {
    let dir = temp_dir();
    let schedule = detailed_schedule();
    {
        let store = open_store(&dir);
        let mut store = store.lock().unwrap();
        store
            .apply(&rota_core::Operation::ConstraintsReplace {
                constraints: vec![FrequencyConstraint::new(
                    "daily",
                    Duration::from_secs(86_400),
                    1,
                )],
            })
            .unwrap();
        store.upsert(&schedule).unwrap();
    }

    let store = open_store(&dir);
    let store = store.lock().unwrap();

    assert_eq!(store.get("loyalty"), Some(&schedule));
    assert_eq!(store.by_group("rewards", None), vec![schedule]);
}
